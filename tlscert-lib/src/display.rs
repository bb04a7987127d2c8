//! Table and JSON rendering of certificate reports.

use crate::certificate::Certificate;
use crate::fields::{CertificateInfo, DateTime};
use crate::ocsp::{OcspError, OcspResponse};
use crate::sct::{LogList, Sct};
use crate::validate::Validity;
use crate::TlscertError;
use serde::Serialize;

/// Octets per line in wrapped hex output.
const OCTETS_PER_LINE: usize = 16;

/// Everything shown for one certificate.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateReport {
    pub certificate: CertificateInfo,
    pub sha256_fingerprint: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revocation: Option<RevocationReport>,
    pub crl_distribution_points: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scts: Vec<SctReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub chain: Vec<CertificateReport>,
}

/// Outcome of an OCSP check.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum RevocationReport {
    Checked(OcspResponse),
    Failed { error: String },
}

impl From<Result<OcspResponse, OcspError>> for RevocationReport {
    fn from(result: Result<OcspResponse, OcspError>) -> Self {
        match result {
            Ok(response) => RevocationReport::Checked(response),
            Err(e) => RevocationReport::Failed {
                error: e.to_string(),
            },
        }
    }
}

/// One SCT with its log resolved against a [`LogList`].
#[derive(Debug, Clone, Serialize)]
pub struct SctReport {
    pub version: String,
    pub log: String,
    pub log_id: String,
    pub timestamp: DateTime,
    pub signature_algorithm: String,
    pub signature: String,
}

impl SctReport {
    pub fn new(sct: &Sct, logs: &LogList) -> Self {
        let seconds = i64::try_from(sct.timestamp / 1000).unwrap_or(i64::MAX);
        SctReport {
            version: sct.version_name(),
            log: logs
                .find(&sct.log_id)
                .map(|log| log.description.clone())
                .unwrap_or_else(|| "Unknown".into()),
            log_id: format_octets(&sct.log_id),
            timestamp: DateTime::from_timestamp(seconds),
            signature_algorithm: sct.signature_algorithm_name(),
            signature: format_octets(&sct.signature),
        }
    }
}

/// Status shown next to the certificate's common name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Valid,
    NotValid,
    Revoked,
}

impl Badge {
    /// Padded label, meant to be printed on a coloured background.
    pub fn label(&self) -> &'static str {
        match self {
            Badge::Valid => "   VALID   ",
            Badge::NotValid => " NOT VALID ",
            Badge::Revoked => "  REVOKED  ",
        }
    }
}

impl CertificateReport {
    pub fn new(
        cert: &Certificate,
        validity: &Validity,
        revocation: Option<RevocationReport>,
        scts: Vec<SctReport>,
    ) -> Self {
        let info = cert.info();
        CertificateReport {
            sha256_fingerprint: info.fingerprint(),
            valid: validity.is_valid(),
            validation_error: validity.error().map(|e| e.to_string()),
            revocation,
            crl_distribution_points: info.crl_distribution_points().to_vec(),
            scts,
            chain: Vec::new(),
            certificate: info.clone(),
        }
    }

    /// A successful OCSP "revoked" (or "unknown") answer wins over validity.
    pub fn badge(&self) -> Badge {
        match &self.revocation {
            Some(RevocationReport::Checked(r)) if r.is_revoked() => Badge::Revoked,
            _ if !self.valid => Badge::NotValid,
            _ => Badge::Valid,
        }
    }
}

/// Uppercase hex octets separated by spaces, 16 per line. Leading zero
/// octets are dropped, as for an integer.
pub fn format_octets(bytes: &[u8]) -> String {
    crate::util::strip_leading_zeros(bytes)
        .chunks(OCTETS_PER_LINE)
        .map(crate::util::hex_spaced_upper)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the field table of a report (without the badge line).
pub fn display_table(report: &CertificateReport) -> String {
    let cert = &report.certificate;
    let mut table = Table::default();

    table.row("Subject", name_lines(&cert.subject.components));
    table.row("Issuer", name_lines(&cert.issuer.components));
    table.row("Not Valid Before", cert.not_before.to_string());
    table.row("Not Valid After", cert.not_after.to_string());

    let dns = cert.dns_names();
    if !dns.is_empty() {
        table.row("DNS Names", dns.join("\n"));
    }
    let ips = cert.ip_addresses();
    if !ips.is_empty() {
        table.row("IP Addresses", ips.join("\n"));
    }

    table.row("Serial Number", format_octets(&cert.raw_serial));
    table.row("SHA-256 Fingerprint", report.sha256_fingerprint.clone());

    table.row(
        "Valid",
        match &report.validation_error {
            None => "yes".to_string(),
            Some(e) => format!("no ({})", e),
        },
    );
    match &report.revocation {
        Some(RevocationReport::Checked(r)) => table.row("Revocation", r.status.to_string()),
        Some(RevocationReport::Failed { error }) => {
            table.row("Revocation", format!("not checked ({})", error))
        }
        None => {}
    }
    if !report.crl_distribution_points.is_empty() {
        table.row(
            "CRL Distribution Points",
            report.crl_distribution_points.join("\n"),
        );
    }

    for (i, sct) in report.scts.iter().enumerate() {
        table.row(
            format!("SCT #{}", i + 1),
            format!(
                "Version: {}\nLog Operator and Key ID:\n{}\n{}\nTimestamp: {}\nSignature Algorithm: {}\nSignature:\n{}",
                sct.version,
                indent(&sct.log),
                indent(&sct.log_id),
                sct.timestamp,
                sct.signature_algorithm,
                indent(&sct.signature),
            ),
        );
    }

    table.render()
}

/// Serialize a report to pretty-printed JSON.
pub fn to_json(report: &CertificateReport) -> Result<String, TlscertError> {
    serde_json::to_string_pretty(report).map_err(TlscertError::Json)
}

fn name_lines(components: &[(String, String)]) -> String {
    components
        .iter()
        .map(|(k, v)| format!("{} = {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

fn indent(text: &str) -> String {
    text.lines()
        .map(|line| format!("  {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Two-column table: labels padded to a common width, ` | `, then the value.
/// Multi-line values continue under the value column.
#[derive(Default)]
struct Table {
    rows: Vec<(String, String)>,
}

impl Table {
    fn row(&mut self, label: impl Into<String>, value: impl Into<String>) {
        self.rows.push((label.into(), value.into()));
    }

    fn render(&self) -> String {
        let width = self
            .rows
            .iter()
            .map(|(label, _)| label.chars().count())
            .max()
            .unwrap_or(0);
        let mut out = String::new();
        for (label, value) in &self.rows {
            let mut lines = value.lines();
            let first = lines.next().unwrap_or("");
            out.push_str(&format!("{:<width$} | {}\n", label, first, width = width));
            for line in lines {
                out.push_str(&format!("{:<width$} | {}\n", "", line, width = width));
            }
        }
        out
    }
}
