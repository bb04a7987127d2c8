//! Minimal ASN.1 TLV reading and writing for PKCS#7 bundles and OCSP.
//!
//! Reading is delegated to `asn1-rs` (through x509-parser); every element
//! keeps a slice of its complete encoding so signed structures can be
//! verified over the exact bytes that were received.

use std::borrow::Cow;
use x509_parser::der_parser::asn1_rs::{Any, Class, FromBer, Oid, Tag};

/// One decoded element together with its full encoding.
#[derive(Debug, Clone)]
pub(crate) struct Tlv<'a> {
    pub any: Any<'a>,
    pub raw: &'a [u8],
}

impl<'a> Tlv<'a> {
    /// Content octets.
    pub fn data(&self) -> &'a [u8] {
        self.any.data
    }

    pub fn is(&self, class: Class, tag: Tag) -> bool {
        self.any.header.class() == class && self.any.header.tag() == tag
    }

    pub fn is_universal(&self, tag: Tag) -> bool {
        self.is(Class::Universal, tag)
    }

    /// Context-specific element `[n]`.
    pub fn is_context(&self, n: u32) -> bool {
        self.is(Class::ContextSpecific, Tag(n))
    }

    /// Dotted form of an OBJECT IDENTIFIER element.
    pub fn oid_string(&self) -> Option<String> {
        if !self.is_universal(Tag::Oid) {
            return None;
        }
        Some(Oid::new(Cow::Borrowed(self.data())).to_id_string())
    }

    /// Elements nested inside a constructed element.
    pub fn children(&self) -> Result<Vec<Tlv<'a>>, String> {
        read_all(self.data())
    }
}

/// Read one element from the front of `input`.
pub(crate) fn read_tlv(input: &[u8]) -> Result<(Tlv<'_>, &[u8]), String> {
    let (rest, any) = Any::from_ber(input).map_err(|e| format!("{}", e))?;
    let len = input.len() - rest.len();
    let raw = input.get(..len).unwrap_or(input);
    Ok((Tlv { any, raw }, rest))
}

/// Read consecutive elements until `input` is exhausted.
pub(crate) fn read_all(mut input: &[u8]) -> Result<Vec<Tlv<'_>>, String> {
    let mut items = Vec::new();
    while !input.is_empty() {
        let (tlv, rest) = read_tlv(input)?;
        items.push(tlv);
        input = rest;
    }
    Ok(items)
}

/// Read a SEQUENCE that must span the whole input and return its elements.
pub(crate) fn read_sequence(input: &[u8]) -> Result<Vec<Tlv<'_>>, String> {
    let (tlv, rest) = read_tlv(input)?;
    if !tlv.is_universal(Tag::Sequence) {
        return Err(format!("expected SEQUENCE, found tag {:?}", tlv.any.header.tag()));
    }
    if !rest.is_empty() {
        return Err(format!("{} bytes of trailing data", rest.len()));
    }
    tlv.children()
}

pub(crate) const TAG_INTEGER: u8 = 0x02;
pub(crate) const TAG_OCTET_STRING: u8 = 0x04;
pub(crate) const TAG_SEQUENCE: u8 = 0x30;

/// DER encoding of NULL.
pub(crate) const NULL: &[u8] = &[0x05, 0x00];

/// Wrap content bytes in a DER tag-length-value envelope.
pub(crate) fn wrap(tag: u8, content: &[u8]) -> Vec<u8> {
    let len = content.len();
    let mut buf = Vec::with_capacity(1 + 9 + len);
    buf.push(tag);
    if len < 0x80 {
        buf.push(len as u8);
    } else {
        let be = len.to_be_bytes();
        let significant = crate::util::strip_leading_zeros(&be);
        buf.push(0x80 | significant.len() as u8);
        buf.extend_from_slice(significant);
    }
    buf.extend_from_slice(content);
    buf
}

/// SEQUENCE of already-encoded elements.
pub(crate) fn sequence(parts: &[&[u8]]) -> Vec<u8> {
    wrap(TAG_SEQUENCE, &parts.concat())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn wrap_uses_short_form_below_128() {
        assert_eq!(wrap(0x04, &[1, 2, 3]), vec![0x04, 0x03, 1, 2, 3]);
    }

    #[test]
    fn wrap_uses_long_form_lengths() {
        let content = vec![0u8; 300];
        let out = wrap(0x30, &content);
        assert_eq!(&out[..4], &[0x30, 0x82, 0x01, 0x2c]);
        assert_eq!(out.len(), 304);

        let out = wrap(0x30, &[0u8; 200]);
        assert_eq!(&out[..3], &[0x30, 0x81, 200]);
    }

    #[test]
    fn read_sequence_keeps_raw_encodings() {
        let int = wrap(TAG_INTEGER, &[0x01]);
        let oct = wrap(TAG_OCTET_STRING, &[0xaa, 0xbb]);
        let seq = sequence(&[&int, &oct]);
        let items = read_sequence(&seq).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].raw, int.as_slice());
        assert!(items[1].is_universal(Tag::OctetString));
        assert_eq!(items[1].data(), &[0xaa, 0xbb]);
    }

    #[test]
    fn read_sequence_rejects_trailing_bytes() {
        let mut seq = sequence(&[NULL]);
        seq.push(0);
        assert!(read_sequence(&seq).is_err());
    }

    #[test]
    fn oid_elements_decode_to_dotted_form() {
        let sha1 = [0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a];
        let (tlv, rest) = read_tlv(&sha1).unwrap();
        assert!(rest.is_empty());
        assert_eq!(tlv.oid_string().as_deref(), Some("1.3.14.3.2.26"));
        assert_eq!(read_tlv(NULL).unwrap().0.oid_string(), None);
    }
}
