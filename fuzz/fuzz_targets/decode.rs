#![no_main]

use libfuzzer_sys::fuzz_target;
use tlscert_lib::{decode, display_table, CertificateReport, TrustStore, Validator};

const HINTS: &[&str] = &["", "der", "pem", "p7c", "pfx"];

fuzz_target!(|data: &[u8]| {
    let store = TrustStore::new();
    for hint in HINTS {
        if let Ok(cert) = decode(data, hint) {
            let _ = cert.chain();
            let _ = cert.issuer();
            let validity = Validator::new(&store).validate(&cert);
            let report = CertificateReport::new(&cert, &validity, None, Vec::new());
            let _ = display_table(&report);
        }
    }
});
