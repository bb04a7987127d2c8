//! Trusted root certificates.
//!
//! The system store is found the way OpenSSL finds it, so `tlscert` trusts
//! exactly what `openssl s_client` trusts on the same machine.

use crate::TlscertError;
use std::path::{Path, PathBuf};
use x509_parser::pem::Pem;
use x509_parser::prelude::*;

/// Bundle files tried after `SSL_CERT_FILE` and `openssl-probe`.
const BUNDLE_FILES: &[&str] = &[
    "/etc/ssl/certs/ca-certificates.crt",
    "/etc/pki/tls/certs/ca-bundle.crt",
    "/etc/ssl/ca-bundle.pem",
    "/etc/ssl/cert.pem",
];

const CERT_DIRS: &[&str] = &["/etc/ssl/certs"];

/// A set of trusted root certificates, kept as DER.
#[derive(Clone, Default)]
pub struct TrustStore {
    roots: Vec<Vec<u8>>,
}

impl std::fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TrustStore({} roots)", self.roots.len())
    }
}

impl TrustStore {
    pub fn new() -> Self {
        TrustStore::default()
    }

    /// The system trust store: the bundle from [`find_system_ca_bundle`],
    /// or else the first certificate directory that holds anything
    /// (`SSL_CERT_DIR`, then `openssl-probe`, then `/etc/ssl/certs`).
    pub fn system() -> Result<Self, TlscertError> {
        let mut store = TrustStore::new();

        let from_bundle = find_system_ca_bundle()
            .and_then(|path| std::fs::read(path).ok())
            .map(|data| store.add_pem_bundle(&data))
            .unwrap_or(0);
        if from_bundle > 0 {
            return Ok(store);
        }

        let dirs = std::env::var_os("SSL_CERT_DIR")
            .map(PathBuf::from)
            .into_iter()
            .chain(openssl_probe::probe().cert_dir)
            .chain(CERT_DIRS.iter().map(PathBuf::from));
        for dir in dirs {
            if store.add_pem_directory(&dir).unwrap_or(0) > 0 {
                return Ok(store);
            }
        }

        Err(TlscertError::TrustStore("no system trust store found".into()))
    }

    /// Trust store holding every certificate of a PEM bundle.
    pub fn from_pem(pem_data: &[u8]) -> Result<Self, TlscertError> {
        let mut store = TrustStore::new();
        match store.add_pem_bundle(pem_data) {
            0 => Err(TlscertError::TrustStore(
                "no certificate found in CA bundle".into(),
            )),
            _ => Ok(store),
        }
    }

    /// Trust store loaded from a PEM file (`--ca-file`). Errors name the file.
    pub fn from_pem_file(path: &Path) -> Result<Self, TlscertError> {
        let with_path = |reason: String| format!("{}: {}", path.display(), reason);
        let data = std::fs::read(path)
            .map_err(|e| std::io::Error::new(e.kind(), with_path(e.to_string())))?;
        Self::from_pem(&data).map_err(|e| match e {
            TlscertError::TrustStore(reason) => TlscertError::TrustStore(with_path(reason)),
            other => other,
        })
    }

    /// Add one DER certificate. Duplicates are stored once.
    pub fn add_der(&mut self, der: &[u8]) -> Result<(), TlscertError> {
        X509Certificate::from_der(der).map_err(|e| TlscertError::Der(e.to_string()))?;
        if !self.contains(der) {
            self.roots.push(der.to_vec());
        }
        Ok(())
    }

    /// Add every certificate of a PEM bundle, skipping entries that do not
    /// parse. Returns how many certificates were accepted.
    pub fn add_pem_bundle(&mut self, pem_data: &[u8]) -> usize {
        Pem::iter_from_buffer(pem_data)
            .map_while(Result::ok)
            .filter(|pem| pem.label == "CERTIFICATE")
            .filter(|pem| self.add_der(&pem.contents).is_ok())
            .count()
    }

    /// Add the certificates of every PEM file in a directory, like
    /// OpenSSL's `-CApath`.
    pub fn add_pem_directory(&mut self, dir: &Path) -> Result<usize, TlscertError> {
        let mut added = 0;
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !looks_like_cert_file(&path) {
                continue;
            }
            if let Ok(data) = std::fs::read(&path) {
                added += self.add_pem_bundle(&data);
            }
        }
        Ok(added)
    }

    /// Whether this exact DER certificate is trusted.
    pub fn contains(&self, der: &[u8]) -> bool {
        self.roots.iter().any(|root| root == der)
    }

    pub(crate) fn roots(&self) -> impl Iterator<Item = &[u8]> {
        self.roots.iter().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// `.pem`, `.crt`, `.cer`, or an OpenSSL hash link such as `a1b2c3d4.0`.
fn looks_like_cert_file(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some("pem" | "crt" | "cer") => true,
        Some(ext) => ext.len() == 1 && ext.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

/// Path of the CA bundle OpenSSL would load: `SSL_CERT_FILE`, the file
/// reported by `openssl-probe`, or the first well-known bundle that exists.
pub fn find_system_ca_bundle() -> Option<PathBuf> {
    std::env::var_os("SSL_CERT_FILE")
        .map(PathBuf::from)
        .into_iter()
        .chain(openssl_probe::probe().cert_file)
        .chain(BUNDLE_FILES.iter().map(PathBuf::from))
        .find(|path| path.exists())
}
