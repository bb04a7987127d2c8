//! Path validation of a certificate against a trust store.
//!
//! The whole discovered chain is offered as intermediates, and the host name
//! captured during a handshake (if any) must match the leaf. The outcome is a
//! [`Validity`]: a yes/no answer that keeps the reason around for display.

mod trust_store;

pub use trust_store::{find_system_ca_bundle, TrustStore};

use crate::certificate::Certificate;
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use std::time::{SystemTime, UNIX_EPOCH};

/// Why a certificate did not validate.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("trust store is empty")]
    EmptyTrustStore,

    #[error("malformed certificate: {0}")]
    Malformed(String),

    #[error("invalid hostname {0:?}")]
    InvalidHostname(String),

    #[error("certificate has expired")]
    Expired,

    #[error("certificate is not yet valid")]
    NotYetValid,

    #[error("certificate signed by unknown authority")]
    UnknownAuthority,

    #[error("certificate is not valid for {hostname}")]
    NameMismatch { hostname: String },

    #[error("{0}")]
    Path(String),
}

/// Result of validating one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Validity {
    error: Option<ValidationError>,
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }

    /// The reason validation failed.
    pub fn error(&self) -> Option<&ValidationError> {
        self.error.as_ref()
    }
}

impl std::fmt::Display for Validity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.error {
            None => write!(f, "yes"),
            Some(e) => write!(f, "no ({})", e),
        }
    }
}

/// Validates certificates against a [`TrustStore`].
#[derive(Debug, Clone)]
pub struct Validator<'a> {
    trust_store: &'a TrustStore,
    at_time: Option<SystemTime>,
}

impl<'a> Validator<'a> {
    pub fn new(trust_store: &'a TrustStore) -> Self {
        Validator {
            trust_store,
            at_time: None,
        }
    }

    /// Validate as of `time` instead of now.
    pub fn at_time(mut self, time: SystemTime) -> Self {
        self.at_time = Some(time);
        self
    }

    pub fn validate(&self, cert: &Certificate) -> Validity {
        Validity {
            error: self.check(cert).err(),
        }
    }

    fn check(&self, cert: &Certificate) -> Result<(), ValidationError> {
        if self.trust_store.is_empty() {
            return Err(ValidationError::EmptyTrustStore);
        }

        let roots: Vec<CertificateDer<'_>> =
            self.trust_store.roots().map(CertificateDer::from).collect();
        let anchors: Vec<_> = roots
            .iter()
            .filter_map(|der| webpki::anchor_from_trusted_cert(der).ok())
            .collect();
        let intermediates: Vec<CertificateDer<'_>> = cert
            .chain()
            .into_iter()
            .map(|info| CertificateDer::from(info.raw_der.as_slice()))
            .collect();

        let leaf = CertificateDer::from(cert.info().raw_der.as_slice());
        let end_entity = webpki::EndEntityCert::try_from(&leaf)
            .map_err(|e| ValidationError::Malformed(format!("{:?}", e)))?;

        end_entity
            .verify_for_usage(
                webpki::ALL_VERIFICATION_ALGS,
                &anchors,
                &intermediates,
                self.now(),
                webpki::KeyUsage::server_auth(),
                None,
                None,
            )
            .map_err(path_error)?;

        if let Some(hostname) = cert.hostname() {
            let name = ServerName::try_from(hostname)
                .map_err(|_| ValidationError::InvalidHostname(hostname.to_string()))?;
            end_entity
                .verify_is_valid_for_subject_name(&name)
                .map_err(|_| ValidationError::NameMismatch {
                    hostname: hostname.to_string(),
                })?;
        }
        Ok(())
    }

    fn now(&self) -> UnixTime {
        match self.at_time {
            Some(time) => {
                UnixTime::since_unix_epoch(time.duration_since(UNIX_EPOCH).unwrap_or_default())
            }
            None => UnixTime::now(),
        }
    }
}

fn path_error(e: webpki::Error) -> ValidationError {
    match e {
        webpki::Error::CertExpired { .. } => ValidationError::Expired,
        webpki::Error::CertNotValidYet { .. } => ValidationError::NotYetValid,
        webpki::Error::UnknownIssuer => ValidationError::UnknownAuthority,
        other => ValidationError::Path(format!("{:?}", other)),
    }
}
