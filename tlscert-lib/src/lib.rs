//! tlscert-lib: retrieve X.509 certificates and check what they are worth.
//!
//! A certificate is obtained from a live TLS handshake, a local file or an
//! HTTP download, decoded from DER, PEM, PKCS#7 or PKCS#12, and wrapped in a
//! [`Certificate`] that owns its trust chain. The chain can be extended by
//! following Authority Information Access links ([`ChainResolver`]), checked
//! against a trust store ([`Validator`]) and queried for revocation over
//! OCSP ([`ocsp`]).

mod certificate;
pub mod crl;
mod decode;
mod der;
mod display;
mod fields;
mod fingerprint;
pub mod ocsp;
mod oid;
mod parser;
mod pkcs7;
mod resolve;
mod retrieve;
pub mod sct;
mod util;
pub mod validate;

pub use certificate::Certificate;
pub use decode::{decode, decode_format, Format};
pub use display::{
    display_table, format_octets, to_json, Badge, CertificateReport, RevocationReport, SctReport,
};
pub use fields::{
    AccessLocations, AltName, CertificateInfo, DateTime, DistinguishedName,
};
pub use fingerprint::compute_fingerprint;
pub use ocsp::{OcspError, OcspResponse, OcspStatus, OcspTransport};
pub use parser::{parse_der, parse_pem_blocks};
pub use resolve::{CertificateSource, ChainResolver, ResolverConfig};
pub use retrieve::{Locator, Retriever, RetrieverConfig, Transport};
pub use sct::{CtLog, LogList, Sct};
pub use validate::{find_system_ca_bundle, TrustStore, ValidationError, Validator, Validity};

/// Errors returned by tlscert-lib.
#[derive(Debug, thiserror::Error)]
pub enum TlscertError {
    #[error("invalid locator {locator:?}: {reason}")]
    InvalidLocator { locator: String, reason: String },

    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("hostname is not specified")]
    MissingHostname,

    #[error("port is not specified")]
    MissingPort,

    #[error("unknown format {0:?}")]
    UnknownFormat(String),

    #[error("failed to parse DER: {0}")]
    Der(String),

    #[error("failed to parse PEM: no CERTIFICATE block found")]
    NoPemCertificate,

    #[error("failed to parse PEM: {0}")]
    Pem(String),

    #[error("data is neither DER or PEM")]
    NeitherDerNorPem,

    #[error("failed to parse P7C: {0}")]
    Pkcs7(String),

    #[error("failed to parse PKCS#12: {0}")]
    Pkcs12(String),

    #[error("failed to parse PKCS#12: decryption password incorrect")]
    Pkcs12Password,

    #[error("failed to parse certificate: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS handshake with {host} failed: {reason}")]
    Tls { host: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("failed to get certificate from {url:?}: got status code {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("no certificate presented by {0}")]
    NoPeerCertificate(String),

    #[error("trust store error: {0}")]
    TrustStore(String),

    #[error("CT log list error: {0}")]
    LogList(String),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
