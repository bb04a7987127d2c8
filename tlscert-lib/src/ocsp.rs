//! OCSP revocation checking (RFC 6960).
//!
//! A request for (certificate, issuer) is POSTed to the first responder the
//! certificate names. The response must be signed by the issuer, or by a
//! responder certificate that the issuer signed for OCSP signing, and must
//! carry a single response for the certificate's serial number.

use crate::certificate::Certificate;
use crate::der::{self, Tlv, TAG_INTEGER, TAG_OCTET_STRING};
use crate::fields::{CertificateInfo, DateTime};
use crate::fingerprint::sha1_digest;
use crate::{crl, oid, parser};
use ring::signature::{self, UnparsedPublicKey, VerificationAlgorithm};
use serde::Serialize;
use x509_parser::der_parser::asn1_rs::Tag;
use x509_parser::prelude::*;

/// DER AlgorithmIdentifier for SHA-1 with NULL parameters.
const SHA1_ALGORITHM: &[u8] = &[
    0x30, 0x09, 0x06, 0x05, 0x2b, 0x0e, 0x03, 0x02, 0x1a, 0x05, 0x00,
];

/// Revocation check failures. None of these means "not revoked".
#[derive(Debug, thiserror::Error)]
pub enum OcspError {
    #[error("no OCSP server present")]
    NoServer,

    #[error("issuer not present in chain")]
    IssuerNotInChain,

    #[error("failed to create OCSP request: {0}")]
    Request(String),

    #[error("OCSP request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("OCSP request to {url} failed: got status code {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("OCSP responder returned {0}")]
    ResponseStatus(&'static str),

    #[error("malformed OCSP response: {0}")]
    Response(String),

    #[error("bad OCSP signature: {0}")]
    Signature(String),

    #[error("OCSP response does not cover the certificate")]
    NoMatchingResponse,
}

/// Sends DER OCSP requests to a responder.
pub trait OcspTransport {
    /// POST `body` to `url` and return the response body of a `200 OK`.
    fn post(&self, url: &str, body: &[u8]) -> Result<Vec<u8>, OcspError>;
}

/// Revocation state reported by the responder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum OcspStatus {
    Good,
    Revoked {
        time: DateTime,
        reason: Option<String>,
    },
    Unknown,
}

impl std::fmt::Display for OcspStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OcspStatus::Good => write!(f, "good"),
            OcspStatus::Revoked {
                time,
                reason: Some(reason),
            } => write!(f, "revoked at {} ({})", time, reason),
            OcspStatus::Revoked { time, reason: None } => write!(f, "revoked at {}", time),
            OcspStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A verified single response for one certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OcspResponse {
    pub status: OcspStatus,
    pub produced_at: DateTime,
    pub this_update: DateTime,
    pub next_update: Option<DateTime>,
}

impl OcspResponse {
    /// Anything but an explicit "good" counts as revoked.
    pub fn is_revoked(&self) -> bool {
        self.status != OcspStatus::Good
    }
}

/// Ask the certificate's OCSP responder about it.
///
/// Only the first responder URL is used, and the issuer is looked up in the
/// chain by the certificate's issuer name.
pub fn check<T: OcspTransport + ?Sized>(
    cert: &Certificate,
    transport: &T,
) -> Result<OcspResponse, OcspError> {
    let info = cert.info();
    let url = info.ocsp_urls().first().ok_or(OcspError::NoServer)?;
    let issuer = cert.issuer().ok_or(OcspError::IssuerNotInChain)?;

    let request = build_request(info, issuer)?;
    let body = transport.post(url, &request)?;
    parse_response(&body, info, issuer)
}

/// Whether the certificate is revoked according to its OCSP responder.
pub fn ocsp_status<T: OcspTransport + ?Sized>(
    cert: &Certificate,
    transport: &T,
) -> Result<bool, OcspError> {
    check(cert, transport).map(|r| r.is_revoked())
}

/// DER `OCSPRequest` for one certificate, SHA-1 CertID, no nonce.
pub fn build_request(
    cert: &CertificateInfo,
    issuer: &CertificateInfo,
) -> Result<Vec<u8>, OcspError> {
    let issuer_x509 = x509(&issuer.raw_der).map_err(OcspError::Request)?;

    let name_hash = sha1_digest(issuer_x509.subject().as_raw());
    let key_hash = sha1_digest(&issuer_x509.public_key().subject_public_key.data);

    let cert_id = der::sequence(&[
        SHA1_ALGORITHM,
        &der::wrap(TAG_OCTET_STRING, &name_hash),
        &der::wrap(TAG_OCTET_STRING, &key_hash),
        &der::wrap(TAG_INTEGER, &cert.raw_serial),
    ]);
    let request = der::sequence(&[&cert_id]);
    let request_list = der::sequence(&[&request]);
    let tbs_request = der::sequence(&[&request_list]);
    Ok(der::sequence(&[&tbs_request]))
}

/// Parse and verify a DER `OCSPResponse` about `cert`, issued by `issuer`.
pub fn parse_response(
    data: &[u8],
    cert: &CertificateInfo,
    issuer: &CertificateInfo,
) -> Result<OcspResponse, OcspError> {
    let top = der::read_sequence(data).map_err(OcspError::Response)?;
    let status = top
        .first()
        .filter(|t| t.is_universal(Tag::Enumerated))
        .ok_or_else(|| malformed("missing responseStatus"))?;
    match status.data() {
        [0] => {}
        [code] => return Err(OcspError::ResponseStatus(response_status_name(*code))),
        _ => return Err(malformed("bad responseStatus")),
    }

    let response_bytes = top
        .get(1)
        .filter(|t| t.is_context(0))
        .ok_or_else(|| malformed("missing responseBytes"))?;
    let response_bytes = explicit(response_bytes)?.children().map_err(OcspError::Response)?;
    let (kind, body) = match response_bytes.as_slice() {
        [kind, body] => (kind, body),
        _ => return Err(malformed("bad responseBytes")),
    };
    if kind.oid_string().as_deref() != Some(oid::OCSP_BASIC_RESPONSE) {
        return Err(malformed("not a basic OCSP response"));
    }

    let basic = der::read_sequence(body.data()).map_err(OcspError::Response)?;
    let (tbs, sig_alg, sig) = match basic.as_slice() {
        [tbs, sig_alg, sig, ..] => (tbs, sig_alg, sig),
        _ => return Err(malformed("truncated BasicOCSPResponse")),
    };
    let sig_oid = sig_alg
        .children()
        .map_err(OcspError::Response)?
        .first()
        .and_then(Tlv::oid_string)
        .ok_or_else(|| malformed("bad signatureAlgorithm"))?;
    if !sig.is_universal(Tag::BitString) {
        return Err(malformed("signature is not a BIT STRING"));
    }
    let signature = sig.data().get(1..).unwrap_or_default();
    let embedded: Vec<Tlv<'_>> = match basic.get(3) {
        Some(certs) if certs.is_context(0) => {
            explicit(certs)?.children().map_err(OcspError::Response)?
        }
        _ => Vec::new(),
    };

    verify_signer(issuer, embedded.first(), &sig_oid, tbs.raw, signature)?;

    read_response_data(tbs, &cert.raw_serial)
}

fn read_response_data(tbs: &Tlv<'_>, serial: &[u8]) -> Result<OcspResponse, OcspError> {
    let fields = tbs.children().map_err(OcspError::Response)?;
    let mut fields = fields.iter().skip_while(|f| f.is_context(0));
    let _responder_id = fields.next();
    let produced_at = time(fields.next().ok_or_else(|| malformed("missing producedAt"))?)?;
    let responses = fields
        .next()
        .ok_or_else(|| malformed("missing responses"))?
        .children()
        .map_err(OcspError::Response)?;

    for single in &responses {
        let parts = single.children().map_err(OcspError::Response)?;
        let (cert_id, cert_status, this_update) = match parts.as_slice() {
            [cert_id, cert_status, this_update, ..] => (cert_id, cert_status, this_update),
            _ => return Err(malformed("truncated SingleResponse")),
        };
        let id_fields = cert_id.children().map_err(OcspError::Response)?;
        let matches = id_fields
            .get(3)
            .is_some_and(|s| s.is_universal(Tag::Integer) && s.data() == serial);
        if !matches {
            continue;
        }

        let next_update = match parts.get(3) {
            Some(t) if t.is_context(0) => Some(time(&explicit(t)?)?),
            _ => None,
        };
        return Ok(OcspResponse {
            status: cert_status_of(cert_status)?,
            produced_at,
            this_update: time(this_update)?,
            next_update,
        });
    }
    Err(OcspError::NoMatchingResponse)
}

fn cert_status_of(tlv: &Tlv<'_>) -> Result<OcspStatus, OcspError> {
    if tlv.is_context(0) {
        return Ok(OcspStatus::Good);
    }
    if tlv.is_context(2) {
        return Ok(OcspStatus::Unknown);
    }
    if !tlv.is_context(1) {
        return Err(malformed("bad certStatus"));
    }
    let revoked = tlv.children().map_err(OcspError::Response)?;
    let time = time(revoked.first().ok_or_else(|| malformed("missing revocationTime"))?)?;
    let reason = match revoked.get(1) {
        Some(r) if r.is_context(0) => explicit(r)?
            .data()
            .last()
            .map(|code| crl::reason_name(*code).to_string()),
        _ => None,
    };
    Ok(OcspStatus::Revoked { time, reason })
}

fn verify_signer(
    issuer: &CertificateInfo,
    embedded: Option<&Tlv<'_>>,
    sig_oid: &str,
    tbs: &[u8],
    signature: &[u8],
) -> Result<(), OcspError> {
    let issuer_x509 = x509(&issuer.raw_der).map_err(OcspError::Signature)?;

    let delegated = match embedded {
        Some(responder) if responder.raw != issuer.raw_der.as_slice() => {
            let responder = x509(responder.raw).map_err(OcspError::Signature)?;
            responder
                .verify_signature(Some(issuer_x509.public_key()))
                .map_err(|e| {
                    OcspError::Signature(format!("responder certificate not signed by issuer: {}", e))
                })?;
            let authorized = matches!(
                responder.extended_key_usage(),
                Ok(Some(eku)) if eku.value.ocsp_signing
            );
            if !authorized {
                return Err(OcspError::Signature(
                    "responder certificate is not authorized to sign OCSP responses".into(),
                ));
            }
            Some(responder)
        }
        _ => None,
    };

    let signer = delegated.as_ref().unwrap_or(&issuer_x509);
    verify_with_key(signer.public_key(), sig_oid, tbs, signature)
}

fn verify_with_key(
    spki: &SubjectPublicKeyInfo,
    sig_oid: &str,
    message: &[u8],
    sig: &[u8],
) -> Result<(), OcspError> {
    let curve = parser::extract_ec_curve(&spki.algorithm);
    let algorithm: &'static dyn VerificationAlgorithm = match (sig_oid, curve.as_str()) {
        (oid::ECDSA_WITH_SHA256, "P-256") => &signature::ECDSA_P256_SHA256_ASN1,
        (oid::ECDSA_WITH_SHA256, "P-384") => &signature::ECDSA_P384_SHA256_ASN1,
        (oid::ECDSA_WITH_SHA384, "P-256") => &signature::ECDSA_P256_SHA384_ASN1,
        (oid::ECDSA_WITH_SHA384, "P-384") => &signature::ECDSA_P384_SHA384_ASN1,
        (oid::SHA1_WITH_RSA, _) => &signature::RSA_PKCS1_2048_8192_SHA1_FOR_LEGACY_USE_ONLY,
        (oid::SHA256_WITH_RSA, _) => &signature::RSA_PKCS1_2048_8192_SHA256,
        (oid::SHA384_WITH_RSA, _) => &signature::RSA_PKCS1_2048_8192_SHA384,
        (oid::SHA512_WITH_RSA, _) => &signature::RSA_PKCS1_2048_8192_SHA512,
        (oid::ED25519, _) => &signature::ED25519,
        (other, _) => {
            return Err(OcspError::Signature(format!(
                "unsupported signature algorithm {}",
                other
            )))
        }
    };
    UnparsedPublicKey::new(algorithm, &spki.subject_public_key.data)
        .verify(message, sig)
        .map_err(|_| OcspError::Signature("signature does not match".into()))
}

fn x509(der: &[u8]) -> Result<X509Certificate<'_>, String> {
    X509Certificate::from_der(der)
        .map(|(_, cert)| cert)
        .map_err(|e| e.to_string())
}

/// The element inside an explicit context tag.
fn explicit<'a>(tlv: &Tlv<'a>) -> Result<Tlv<'a>, OcspError> {
    let (inner, rest) = der::read_tlv(tlv.data()).map_err(OcspError::Response)?;
    if !rest.is_empty() {
        return Err(malformed("trailing data in explicit tag"));
    }
    Ok(inner)
}

fn time(tlv: &Tlv<'_>) -> Result<DateTime, OcspError> {
    let (_, t) = ASN1Time::from_der(tlv.raw).map_err(|e| OcspError::Response(e.to_string()))?;
    Ok(DateTime::from_timestamp(t.timestamp()))
}

fn response_status_name(code: u8) -> &'static str {
    match code {
        1 => "malformedRequest",
        2 => "internalError",
        3 => "tryLater",
        5 => "sigRequired",
        6 => "unauthorized",
        _ => "an unknown response status",
    }
}

fn malformed(what: &str) -> OcspError {
    OcspError::Response(what.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn responder_error_statuses() {
        let try_later = [0x30, 0x03, 0x0a, 0x01, 0x03];
        let leaf = parser::parse_der(include_bytes!("../../tests/certs/leaf.cer"));
        let int2 = parser::parse_der(include_bytes!("../../tests/certs/int2.cer"));
        let (Ok(leaf), Ok(int2)) = (leaf, int2) else {
            panic!("fixtures do not parse");
        };
        let err = parse_response(&try_later, &leaf, &int2).unwrap_err();
        assert_eq!(err.to_string(), "OCSP responder returned tryLater");
    }

    #[test]
    fn garbage_is_malformed() {
        let leaf = parser::parse_der(include_bytes!("../../tests/certs/leaf.cer"));
        let Ok(leaf) = leaf else {
            panic!("fixture does not parse");
        };
        assert!(matches!(
            parse_response(b"nope", &leaf, &leaf),
            Err(OcspError::Response(_))
        ));
    }
}
