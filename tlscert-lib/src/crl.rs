//! CRL helpers.
//!
//! CRLs are not downloaded; a certificate is only reported as pointing to
//! one, and revocation reasons (shared with OCSP) are named.

use crate::fields::CertificateInfo;

/// Whether the certificate names at least one CRL distribution point.
pub fn has_crl(info: &CertificateInfo) -> bool {
    !info.crl_distribution_points().is_empty()
}

/// RFC 5280 name of a `CRLReason` value.
pub fn reason_name(code: u8) -> &'static str {
    match code {
        1 => "keyCompromise",
        2 => "cACompromise",
        3 => "affiliationChanged",
        4 => "superseded",
        5 => "cessationOfOperation",
        6 => "certificateHold",
        // 7 is unused per RFC 5280
        8 => "removeFromCRL",
        9 => "privilegeWithdrawn",
        10 => "aACompromise",
        _ => "unspecified",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_names() {
        assert_eq!(reason_name(1), "keyCompromise");
        assert_eq!(reason_name(7), "unspecified");
        assert_eq!(reason_name(200), "unspecified");
    }
}
