//! The certificate fields tlscert reports on.

use serde::Serialize;
use time::OffsetDateTime;

/// One parsed certificate.
///
/// Only what the report, the chain builder and the revocation check need is
/// extracted; everything else stays available through `raw_der`.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateInfo {
    /// Serial number as space-separated uppercase hex octets.
    pub serial: String,
    /// Serial number content octets as encoded.
    #[serde(skip)]
    pub raw_serial: Vec<u8>,
    pub subject: DistinguishedName,
    pub issuer: DistinguishedName,
    pub not_before: DateTime,
    pub not_after: DateTime,
    /// OpenSSL name of the signature algorithm, or its OID.
    pub signature_algorithm: String,
    /// Key type and size, e.g. `EC P-256` or `RSA 2048`.
    pub public_key: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alt_names: Vec<AltName>,
    #[serde(skip_serializing_if = "AccessLocations::is_empty")]
    pub access: AccessLocations,
    #[serde(skip)]
    pub raw_der: Vec<u8>,
}

/// Distinguished name with ordered components.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DistinguishedName {
    /// `(attribute, value)` pairs in certificate order. Attributes use
    /// OpenSSL short names where known (`CN`, `O`, `C`, ...).
    pub components: Vec<(String, String)>,
}

impl DistinguishedName {
    /// OpenSSL-style one-line form: `C = US, O = Org, CN = example.com`.
    ///
    /// Commas, equals signs and backslashes in values are escaped so two
    /// different names never print the same. Chain membership is keyed by
    /// this string.
    pub fn to_oneline(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.components {
            if !out.is_empty() {
                out.push_str(", ");
            }
            out.push_str(key);
            out.push_str(" = ");
            for ch in value.chars() {
                if matches!(ch, '\\' | ',' | '=') {
                    out.push('\\');
                }
                out.push(ch);
            }
        }
        out
    }

    /// Value of the first component with the given short name.
    pub fn first(&self, key: &str) -> Option<&str> {
        self.components
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }
}

impl std::fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_oneline())
    }
}

/// Subject Alternative Name entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum AltName {
    Dns(String),
    Ip(String),
    Email(String),
    Uri(String),
    Other(String),
}

/// URLs a certificate points to for its issuer and revocation status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccessLocations {
    /// AIA "OCSP" locations.
    pub ocsp: Vec<String>,
    /// AIA "CA Issuers" locations.
    pub ca_issuers: Vec<String>,
    /// Full-name URIs of the CRL distribution points.
    pub crl: Vec<String>,
}

impl AccessLocations {
    pub fn is_empty(&self) -> bool {
        self.ocsp.is_empty() && self.ca_issuers.is_empty() && self.crl.is_empty()
    }
}

/// A point in time, kept both as a Unix timestamp and in ISO 8601.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateTime {
    pub iso8601: String,
    pub timestamp: i64,
}

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

impl DateTime {
    pub fn from_timestamp(timestamp: i64) -> Self {
        let iso8601 = match OffsetDateTime::from_unix_timestamp(timestamp) {
            Ok(dt) => format!(
                "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
                dt.year(),
                u8::from(dt.month()),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second()
            ),
            Err(_) => timestamp.to_string(),
        };
        DateTime { iso8601, timestamp }
    }

    /// OpenSSL's date style: `Feb  3 23:57:06 2026 GMT`.
    pub fn to_openssl(&self) -> String {
        let Ok(dt) = OffsetDateTime::from_unix_timestamp(self.timestamp) else {
            return self.iso8601.clone();
        };
        let month = MONTHS
            .get(usize::from(u8::from(dt.month())).saturating_sub(1))
            .copied()
            .unwrap_or("???");
        format!(
            "{} {:2} {:02}:{:02}:{:02} {} GMT",
            month,
            dt.day(),
            dt.hour(),
            dt.minute(),
            dt.second(),
            dt.year()
        )
    }
}

impl std::fmt::Display for DateTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_openssl())
    }
}

impl CertificateInfo {
    pub fn subject_string(&self) -> String {
        self.subject.to_oneline()
    }

    pub fn issuer_string(&self) -> String {
        self.issuer.to_oneline()
    }

    /// Subject common name, or an empty string when there is none.
    pub fn common_name(&self) -> &str {
        self.subject.first("CN").unwrap_or_default()
    }

    /// SHA-256 fingerprint of the DER encoding.
    pub fn fingerprint(&self) -> String {
        crate::fingerprint::compute_fingerprint(&self.raw_der)
    }

    pub fn dns_names(&self) -> Vec<&str> {
        self.alt_names
            .iter()
            .filter_map(|name| match name {
                AltName::Dns(dns) => Some(dns.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn ip_addresses(&self) -> Vec<&str> {
        self.alt_names
            .iter()
            .filter_map(|name| match name {
                AltName::Ip(ip) => Some(ip.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn ocsp_urls(&self) -> &[String] {
        &self.access.ocsp
    }

    pub fn ca_issuer_urls(&self) -> &[String] {
        &self.access.ca_issuers
    }

    pub fn crl_distribution_points(&self) -> &[String] {
        &self.access.crl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oneline_escapes_separators() {
        let dn = DistinguishedName {
            components: vec![
                ("O".into(), "Acme, Inc.".into()),
                ("CN".into(), "a=b".into()),
            ],
        };
        assert_eq!(dn.to_oneline(), "O = Acme\\, Inc., CN = a\\=b");
        assert_eq!(dn.first("CN"), Some("a=b"));
        assert_eq!(dn.first("OU"), None);
    }

    #[test]
    fn openssl_dates_pad_the_day() {
        let dt = DateTime::from_timestamp(1_770_163_026);
        assert_eq!(dt.iso8601, "2026-02-03T23:57:06Z");
        assert_eq!(dt.to_string(), "Feb  3 23:57:06 2026 GMT");
    }
}
