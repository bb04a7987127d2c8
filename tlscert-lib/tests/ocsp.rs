#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::indexing_slicing
)]
//! OCSP request construction and response verification.
//!
//! Responses in `tests/certs/` were produced by `openssl ocsp` for the leaf:
//! `ocsp-good.der` and `ocsp-revoked.der` are signed by intermediate 2 (the
//! latter embedding it), `ocsp-delegated.der` by a delegated responder.

use std::cell::RefCell;
use std::path::PathBuf;
use tlscert_lib::ocsp::{self, build_request, parse_response};
use tlscert_lib::*;

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

fn info(name: &str) -> CertificateInfo {
    decode(&fixture(name), "").unwrap().info().clone()
}

/// Leaf with intermediate 2 in its chain.
fn leaf_with_issuer() -> Certificate {
    decode(&fixture("chain.pem"), "pem").unwrap()
}

/// Answers every request with a canned body and records what was sent.
struct FakeResponder {
    answer: Result<Vec<u8>, u16>,
    requests: RefCell<Vec<(String, Vec<u8>)>>,
}

impl FakeResponder {
    fn new(response: &str) -> Self {
        FakeResponder {
            answer: Ok(fixture(response)),
            requests: RefCell::new(Vec::new()),
        }
    }

    fn failing(status: u16) -> Self {
        FakeResponder {
            answer: Err(status),
            requests: RefCell::new(Vec::new()),
        }
    }
}

impl OcspTransport for FakeResponder {
    fn post(&self, url: &str, body: &[u8]) -> Result<Vec<u8>, OcspError> {
        self.requests
            .borrow_mut()
            .push((url.to_string(), body.to_vec()));
        match &self.answer {
            Ok(body) => Ok(body.clone()),
            Err(status) => Err(OcspError::HttpStatus {
                url: url.to_string(),
                status: *status,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Preconditions
// ---------------------------------------------------------------------------

#[test]
fn no_ocsp_server() {
    let root = decode(&fixture("root.cer"), "der").unwrap();
    let responder = FakeResponder::new("ocsp-good.der");
    let err = ocsp::check(&root, &responder).unwrap_err();
    assert!(matches!(err, OcspError::NoServer));
    assert_eq!(err.to_string(), "no OCSP server present");
    assert!(responder.requests.borrow().is_empty());
}

#[test]
fn issuer_missing_from_chain() {
    let leaf = decode(&fixture("leaf.cer"), "der").unwrap();
    let responder = FakeResponder::new("ocsp-good.der");
    let err = ocsp::ocsp_status(&leaf, &responder).unwrap_err();
    assert!(matches!(err, OcspError::IssuerNotInChain));
    assert_eq!(err.to_string(), "issuer not present in chain");
    assert!(responder.requests.borrow().is_empty());
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

#[test]
fn request_matches_openssl() {
    let request = build_request(&info("leaf.cer"), &info("int2.cer")).unwrap();
    assert_eq!(request, fixture("ocsp-request.der"));
}

#[test]
fn request_goes_to_first_responder() {
    let responder = FakeResponder::new("ocsp-good.der");
    ocsp::check(&leaf_with_issuer(), &responder).unwrap();
    let requests = responder.requests.borrow();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "http://ocsp.tlscert.test");
    assert_eq!(requests[0].1, fixture("ocsp-request.der"));
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[test]
fn good_response() {
    let responder = FakeResponder::new("ocsp-good.der");
    let response = ocsp::check(&leaf_with_issuer(), &responder).unwrap();
    assert_eq!(response.status, OcspStatus::Good);
    assert!(!response.is_revoked());
    assert!(response.next_update.is_some());
    assert!(response.this_update.timestamp <= response.next_update.unwrap().timestamp);
    assert!(!ocsp::ocsp_status(&leaf_with_issuer(), &responder).unwrap());
}

#[test]
fn revoked_response_with_embedded_issuer() {
    let responder = FakeResponder::new("ocsp-revoked.der");
    let response = ocsp::check(&leaf_with_issuer(), &responder).unwrap();
    match &response.status {
        OcspStatus::Revoked { time, reason } => {
            assert_eq!(time.iso8601, "2026-01-01T00:00:00Z");
            assert_eq!(reason.as_deref(), Some("keyCompromise"));
        }
        other => panic!("expected revoked, got {:?}", other),
    }
    assert!(response.is_revoked());
    assert_eq!(
        response.status.to_string(),
        "revoked at Jan  1 00:00:00 2026 GMT (keyCompromise)"
    );
    assert!(ocsp::ocsp_status(&leaf_with_issuer(), &responder).unwrap());
}

#[test]
fn delegated_responder() {
    let responder = FakeResponder::new("ocsp-delegated.der");
    let response = ocsp::check(&leaf_with_issuer(), &responder).unwrap();
    assert_eq!(response.status, OcspStatus::Good);
}

#[test]
fn signature_must_come_from_issuer() {
    let err = parse_response(&fixture("ocsp-good.der"), &info("leaf.cer"), &info("int1.cer"))
        .unwrap_err();
    assert!(matches!(err, OcspError::Signature(_)));
    assert!(err.to_string().starts_with("bad OCSP signature"));
}

#[test]
fn delegated_responder_must_be_certified_by_issuer() {
    let err = parse_response(
        &fixture("ocsp-delegated.der"),
        &info("leaf.cer"),
        &info("int1.cer"),
    )
    .unwrap_err();
    assert!(matches!(err, OcspError::Signature(_)));
}

#[test]
fn response_for_another_certificate() {
    // Correctly signed by intermediate 2, but about the leaf's serial.
    let err = parse_response(&fixture("ocsp-good.der"), &info("sct.pem"), &info("int2.cer"))
        .unwrap_err();
    assert!(matches!(err, OcspError::NoMatchingResponse));
}

#[test]
fn transport_errors_are_not_coerced() {
    let responder = FakeResponder::failing(500);
    let err = ocsp::ocsp_status(&leaf_with_issuer(), &responder).unwrap_err();
    assert!(matches!(err, OcspError::HttpStatus { status: 500, .. }));
}

#[test]
fn truncated_response_is_malformed() {
    let mut body = fixture("ocsp-good.der");
    body.truncate(body.len() / 2);
    let err = parse_response(&body, &info("leaf.cer"), &info("int2.cer")).unwrap_err();
    assert!(matches!(err, OcspError::Response(_)));
}
