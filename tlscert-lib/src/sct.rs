//! Signed Certificate Timestamps and the CT log list used to name their logs.

use crate::fields::CertificateInfo;
use crate::retrieve::Retriever;
use crate::TlscertError;
use base64::Engine;
use serde::Deserialize;
use std::collections::HashMap;
use url::Url;
use x509_parser::prelude::*;

/// Google's published list of known CT logs (v3 schema).
pub const DEFAULT_LOG_LIST_URL: &str = "https://www.gstatic.com/ct/log_list/v3/log_list.json";

/// One SCT embedded in a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sct {
    pub version: u8,
    pub log_id: [u8; 32],
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub hash_algorithm: u8,
    pub signature_algorithm: u8,
    pub signature: Vec<u8>,
}

impl Sct {
    pub fn version_name(&self) -> String {
        match self.version {
            0 => "V1".into(),
            v => format!("unknown({})", v),
        }
    }

    /// Hash and signature algorithm, e.g. `SHA256-ECDSA`.
    pub fn signature_algorithm_name(&self) -> String {
        let hash = match self.hash_algorithm {
            0 => "NONE",
            1 => "MD5",
            2 => "SHA1",
            3 => "SHA224",
            4 => "SHA256",
            5 => "SHA384",
            6 => "SHA512",
            _ => "UNKNOWN",
        };
        let sig = match self.signature_algorithm {
            0 => "ANONYMOUS",
            1 => "RSA",
            2 => "DSA",
            3 => "ECDSA",
            _ => "UNKNOWN",
        };
        format!("{}-{}", hash, sig)
    }
}

/// SCTs from the certificate's SCT list extension, in order.
pub fn extract_scts(info: &CertificateInfo) -> Vec<Sct> {
    let Ok((_, x509)) = X509Certificate::from_der(&info.raw_der) else {
        return Vec::new();
    };
    x509.extensions()
        .iter()
        .filter_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SCT(list) => Some(list),
            _ => None,
        })
        .flatten()
        .map(|sct| Sct {
            version: sct.version.0,
            log_id: *sct.id.key_id,
            timestamp: sct.timestamp,
            hash_algorithm: sct.signature.hash_alg_id,
            signature_algorithm: sct.signature.sign_alg_id,
            signature: sct.signature.data.to_vec(),
        })
        .collect()
}

/// A known Certificate Transparency log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CtLog {
    pub description: String,
    pub operator: String,
    pub url: String,
}

/// Known CT logs by log ID.
#[derive(Debug, Clone, Default)]
pub struct LogList {
    logs: HashMap<[u8; 32], CtLog>,
}

#[derive(Deserialize)]
struct LogListJson {
    #[serde(default)]
    operators: Vec<OperatorJson>,
}

#[derive(Deserialize)]
struct OperatorJson {
    #[serde(default)]
    name: String,
    #[serde(default)]
    logs: Vec<LogJson>,
}

#[derive(Deserialize)]
struct LogJson {
    #[serde(default)]
    description: String,
    log_id: String,
    #[serde(default)]
    url: String,
}

impl LogList {
    /// A list that knows no logs.
    pub fn empty() -> Self {
        LogList::default()
    }

    /// Parse a v3 `log_list.json`. Logs whose ID is not base64 of 32 bytes
    /// are skipped.
    pub fn from_json(data: &[u8]) -> Result<Self, TlscertError> {
        let parsed: LogListJson = serde_json::from_slice(data)?;
        let mut logs = HashMap::new();
        for operator in parsed.operators {
            for log in operator.logs {
                let Ok(id) = base64::engine::general_purpose::STANDARD.decode(&log.log_id) else {
                    continue;
                };
                let Ok(id) = <[u8; 32]>::try_from(id.as_slice()) else {
                    continue;
                };
                logs.insert(
                    id,
                    CtLog {
                        description: log.description,
                        operator: operator.name.clone(),
                        url: log.url,
                    },
                );
            }
        }
        Ok(LogList { logs })
    }

    /// Load a log list from a URL or a local file.
    pub fn load(source: &str, retriever: &Retriever) -> Result<Self, TlscertError> {
        let data = if source.contains("://") {
            let url = Url::parse(source).map_err(|e| TlscertError::LogList(e.to_string()))?;
            retriever.get_bytes(&url)?
        } else {
            std::fs::read(source).map_err(|e| TlscertError::LogList(format!("{}: {}", source, e)))?
        };
        Self::from_json(&data).map_err(|e| TlscertError::LogList(e.to_string()))
    }

    pub fn find(&self, log_id: &[u8; 32]) -> Option<&CtLog> {
        self.logs.get(log_id)
    }

    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names() {
        let sct = Sct {
            version: 0,
            log_id: [0; 32],
            timestamp: 0,
            hash_algorithm: 4,
            signature_algorithm: 3,
            signature: Vec::new(),
        };
        assert_eq!(sct.version_name(), "V1");
        assert_eq!(sct.signature_algorithm_name(), "SHA256-ECDSA");
    }

    #[test]
    fn malformed_log_ids_are_skipped() {
        let json = br#"{"operators":[{"name":"x","logs":[
            {"description":"short","log_id":"AAAA","url":""},
            {"description":"bad","log_id":"!!","url":""}]}]}"#;
        assert!(LogList::from_json(json).unwrap().is_empty());
    }
}
