#![no_main]

use libfuzzer_sys::fuzz_target;
use tlscert_lib::{parse_der, parse_pem_blocks, sct};

fuzz_target!(|data: &[u8]| {
    // Neither parser may panic, whatever the input.
    let certs = match parse_der(data) {
        Ok(cert) => vec![cert],
        Err(_) => parse_pem_blocks(data).unwrap_or_default(),
    };
    for cert in &certs {
        let _ = cert.subject_string();
        let _ = cert.issuer_string();
        let _ = cert.common_name();
        let _ = cert.fingerprint();
        let _ = cert.dns_names();
        let _ = cert.ip_addresses();
        let _ = cert.ocsp_urls();
        let _ = cert.ca_issuer_urls();
        let _ = cert.crl_distribution_points();
        let _ = sct::extract_scts(cert);
    }
});
