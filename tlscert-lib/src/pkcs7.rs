//! Certificates carried in a PKCS#7 / CMS signed-data bundle.
//!
//! Only the `certificates` field of `SignedData` is read; the bundle's
//! signer infos (degenerate in `.p7c` files anyway) are ignored.

use crate::der::{self, Tlv};
use crate::fields::CertificateInfo;
use crate::parser::parse_der;
use crate::{oid, util, TlscertError};
use x509_parser::der_parser::asn1_rs::Tag;
use x509_parser::pem::Pem;

/// Every certificate of a DER or PEM (`PKCS7` label) bundle, in bundle order.
pub(crate) fn certificates(data: &[u8]) -> Result<Vec<CertificateInfo>, TlscertError> {
    if util::is_pem(data) {
        let pem = Pem::iter_from_buffer(data)
            .map_while(Result::ok)
            .find(|p| p.label == "PKCS7")
            .ok_or_else(|| TlscertError::Pkcs7("no PKCS7 block found".into()))?;
        return certificates_der(&pem.contents);
    }
    certificates_der(data)
}

fn certificates_der(data: &[u8]) -> Result<Vec<CertificateInfo>, TlscertError> {
    let content_info = der::read_sequence(data).map_err(TlscertError::Pkcs7)?;
    let (content_type, content) = match content_info.as_slice() {
        [content_type, content, ..] => (content_type, content),
        _ => return Err(TlscertError::Pkcs7("truncated ContentInfo".into())),
    };
    if content_type.oid_string().as_deref() != Some(oid::PKCS7_SIGNED_DATA) {
        return Err(TlscertError::Pkcs7("content is not signed-data".into()));
    }
    if !content.is_context(0) {
        return Err(TlscertError::Pkcs7("missing signed-data content".into()));
    }

    let signed_data = single(content)?;
    if !signed_data.is_universal(Tag::Sequence) {
        return Err(TlscertError::Pkcs7("SignedData is not a SEQUENCE".into()));
    }
    let fields = signed_data.children().map_err(TlscertError::Pkcs7)?;

    // version, digestAlgorithms, encapContentInfo, then [0] certificates.
    let certs = fields
        .iter()
        .skip(3)
        .find(|f| f.is_context(0))
        .ok_or_else(|| TlscertError::Pkcs7("bundle carries no certificates".into()))?;

    let mut out = Vec::new();
    for item in certs.children().map_err(TlscertError::Pkcs7)? {
        if !item.is_universal(Tag::Sequence) {
            // attribute certificates and other choices
            continue;
        }
        out.push(parse_der(item.raw).map_err(|e| TlscertError::Pkcs7(e.to_string()))?);
    }
    if out.is_empty() {
        return Err(TlscertError::Pkcs7("bundle carries no certificates".into()));
    }
    Ok(out)
}

fn single<'a>(explicit: &Tlv<'a>) -> Result<Tlv<'a>, TlscertError> {
    let mut inner = explicit.children().map_err(TlscertError::Pkcs7)?;
    match inner.len() {
        1 => Ok(inner.remove(0)),
        n => Err(TlscertError::Pkcs7(format!(
            "expected one element in explicit tag, found {}",
            n
        ))),
    }
}
