#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! Chain attachment and AIA resolution.
//!
//! The test PKI is root -> intermediate 1 -> intermediate 2 -> leaf, with
//! AIA "CA Issuers" URLs under `http://ca.tlscert.test/`. Resolution is
//! exercised against an in-memory [`CertificateSource`].

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::PathBuf;
use tlscert_lib::*;
use url::Url;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fixture(name: &str) -> Vec<u8> {
    let mut p = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    p.pop();
    p.push("tests");
    p.push("certs");
    p.push(name);
    std::fs::read(&p).unwrap_or_else(|e| panic!("{}: {}", p.display(), e))
}

fn load(name: &str) -> Certificate {
    decode(&fixture(name), "").unwrap()
}

fn chain_cns(cert: &Certificate) -> Vec<String> {
    cert.chain()
        .iter()
        .map(|c| c.common_name().to_string())
        .collect()
}

const ROOT: &str = "tlscert Test Root CA";
const INT1: &str = "tlscert Test Intermediate CA 1";
const INT2: &str = "tlscert Test Intermediate CA 2";

/// Serves fixture files by URL and records every fetch.
struct FakeSource {
    files: HashMap<String, &'static str>,
    fetched: RefCell<Vec<String>>,
}

impl FakeSource {
    fn new(routes: &[(&str, &'static str)]) -> Self {
        FakeSource {
            files: routes
                .iter()
                .map(|(url, file)| (url.to_string(), *file))
                .collect(),
            fetched: RefCell::new(Vec::new()),
        }
    }

    /// The PKI as published: every AIA URL resolves.
    fn full() -> Self {
        FakeSource::new(&[
            ("http://ca.tlscert.test/int2.cer", "int2.cer"),
            ("http://ca.tlscert.test/int1.cer", "int1.cer"),
            ("http://ca.tlscert.test/root.cer", "root.cer"),
        ])
    }
}

impl CertificateSource for FakeSource {
    fn fetch(&self, url: &Url) -> Result<Certificate, TlscertError> {
        self.fetched.borrow_mut().push(url.to_string());
        match self.files.get(url.as_str()) {
            Some(file) => decode(&fixture(file), "der"),
            None => Err(TlscertError::HttpStatus {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

fn resolve_with(source: &FakeSource, max_hops: usize) -> Certificate {
    let mut cert = load("leaf.cer");
    ChainResolver::new(source, ResolverConfig { max_hops }).resolve(&mut cert);
    cert
}

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

#[test]
fn attaching_self_is_a_no_op() {
    let mut leaf = load("leaf.cer");
    assert!(!leaf.add_to_chain(load("leaf.pem")));
    assert!(leaf.chain().is_empty());
}

#[test]
fn attaching_twice_is_a_no_op() {
    let mut leaf = load("leaf.cer");
    assert!(leaf.add_to_chain(load("int2.cer")));
    assert!(!leaf.add_to_chain(load("int2.pem")));
    assert_eq!(chain_cns(&leaf), vec![INT2]);
}

#[test]
fn chain_is_transitive() {
    let mut int1 = load("int1.cer");
    assert!(int1.add_to_chain(load("root.cer")));
    let mut int2 = load("int2.cer");
    assert!(int2.add_to_chain(int1));

    let mut leaf = load("leaf.cer");
    assert!(leaf.add_to_chain(int2));
    assert_eq!(chain_cns(&leaf), vec![INT2, INT1, ROOT]);
    assert_eq!(leaf.issuer().unwrap().common_name(), INT2);
}

#[test]
fn shared_members_are_stored_once() {
    // int2 arrives twice: directly, and nested below int1.
    let mut int1 = load("int1.cer");
    int1.add_to_chain(load("int2.cer"));
    let mut leaf = load("leaf.cer");
    leaf.add_to_chain(load("int2.cer"));
    leaf.add_to_chain(int1);
    assert_eq!(chain_cns(&leaf), vec![INT2, INT1]);
}

#[test]
fn first_certificate_per_subject_wins() {
    let mut leaf = load("leaf.cer");
    assert!(leaf.add_to_chain(load("impostor.cer")));
    assert!(!leaf.add_to_chain(load("int2.cer")));
    assert_eq!(leaf.chain().len(), 1);
    assert_eq!(leaf.issuer().unwrap().serial, "50 05");
}

#[test]
fn nearer_member_shadows_deeper_one() {
    // The real int2 is only reachable below int1; the impostor sits
    // directly below the leaf and keeps the subject name.
    let mut int1 = load("int1.cer");
    int1.add_to_chain(load("int2.cer"));
    let mut leaf = load("leaf.cer");
    leaf.add_to_chain(load("impostor.cer"));
    leaf.add_to_chain(int1);
    assert_eq!(chain_cns(&leaf), vec![INT2, INT1]);
    assert_eq!(leaf.issuer().unwrap().serial, "50 05");
}

#[test]
fn chain_member_lookup_by_subject() {
    let leaf = decode(&fixture("bundle.p7c"), "p7c").unwrap();
    let int1 = leaf.chain()[1].subject_string();
    assert_eq!(leaf.chain_member(&int1).unwrap().common_name(), INT1);
    assert!(leaf.chain_member("CN = nobody").is_none());
}

#[test]
fn chain_certificates_keep_nested_chains() {
    let cert = resolve_with(&FakeSource::full(), 8);
    let members = cert.chain_certificates();
    assert_eq!(members.len(), 3);
    assert_eq!(members[0].info().common_name(), INT2);
    assert_eq!(chain_cns(&members[0]), vec![INT1, ROOT]);
    assert_eq!(members[1].issuer().unwrap().common_name(), ROOT);
    assert!(members[2].chain().is_empty());
}

#[test]
fn crl_presence() {
    let leaf = load("leaf.cer");
    assert!(leaf.has_crl());
    assert_eq!(
        leaf.info().crl_distribution_points(),
        vec!["http://crl.tlscert.test/int2.crl"]
    );
    assert!(!load("int2.cer").has_crl());
}

// ---------------------------------------------------------------------------
// AIA resolution
// ---------------------------------------------------------------------------

#[test]
fn resolves_up_to_the_root() {
    let source = FakeSource::full();
    let cert = resolve_with(&source, 8);
    assert_eq!(chain_cns(&cert), vec![INT2, INT1, ROOT]);
    assert_eq!(
        *source.fetched.borrow(),
        vec![
            "http://ca.tlscert.test/int2.cer",
            "http://ca.tlscert.test/int1.cer",
            "http://ca.tlscert.test/root.cer",
        ]
    );
}

#[test]
fn failed_fetch_is_skipped() {
    let source = FakeSource::new(&[("http://ca.tlscert.test/int2.cer", "int2.cer")]);
    let cert = resolve_with(&source, 8);
    assert_eq!(chain_cns(&cert), vec![INT2]);
    assert_eq!(source.fetched.borrow().len(), 2);
}

#[test]
fn hop_limit_stops_the_walk() {
    let source = FakeSource::full();
    let cert = resolve_with(&source, 1);
    assert_eq!(chain_cns(&cert), vec![INT2]);
    assert_eq!(source.fetched.borrow().len(), 1);

    let source = FakeSource::full();
    let cert = resolve_with(&source, 0);
    assert!(cert.chain().is_empty());
    assert!(source.fetched.borrow().is_empty());
}

#[test]
fn circular_aia_terminates() {
    // int1 points back to int2 instead of the root.
    let source = FakeSource::new(&[
        ("http://ca.tlscert.test/int2.cer", "int2.cer"),
        ("http://ca.tlscert.test/int1.cer", "int1.cer"),
        ("http://ca.tlscert.test/root.cer", "int2.cer"),
    ]);
    let cert = resolve_with(&source, 100);
    assert_eq!(chain_cns(&cert), vec![INT2, INT1]);
    assert_eq!(source.fetched.borrow().len(), 3);
}

#[test]
fn aia_loop_back_to_leaf_terminates() {
    let source = FakeSource::new(&[("http://ca.tlscert.test/int2.cer", "leaf.cer")]);
    let cert = resolve_with(&source, 100);
    assert!(cert.chain().is_empty());
    assert_eq!(source.fetched.borrow().len(), 1);
}
