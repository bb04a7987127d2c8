//! Certificate fingerprints and the digests OCSP needs.

use digest::Digest;

/// SHA-256 fingerprint of DER-encoded certificate bytes, as colon-separated
/// uppercase hex (`AB:CD:EF:...`).
pub fn compute_fingerprint(der_bytes: &[u8]) -> String {
    crate::util::hex_colon_upper(&der_digest(der_bytes))
}

/// SHA-256 of the DER encoding; the identity of a certificate record.
pub(crate) fn der_digest(der_bytes: &[u8]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&sha2::Sha256::digest(der_bytes));
    out
}

/// SHA-1 as used by OCSP CertID hashes.
pub(crate) fn sha1_digest(data: &[u8]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&sha1::Sha1::digest(data));
    out
}
