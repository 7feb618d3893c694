// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

mod common;

use common::{identity, signed_registration, text_record};
use vns::core::config::{LEASE_MS, POW_DIFFICULTY, RATE_LIMIT_WINDOW_MS};
use vns::core::naming;
use vns::core::security::admission::{Admission, AdmissionError, SigMode};
use vns::core::security::pow::{pow_hash_hex, verify_pow};
use vns::core::security::rate_limit::SlidingWindowLimiter;
use vns::core::types::{canonical_sign_bytes, now_ms, Record, Registration};

#[test]
fn name_grammar_boundaries() {
    // 3 and 63 character labels accepted; 2 and 64 rejected.
    assert!(naming::validate("abc.vfs").is_ok());
    assert!(naming::validate(&format!("{}.vfs", "a".repeat(63))).is_ok());
    assert!(naming::validate("ab.vfs").is_err());
    assert!(naming::validate(&format!("{}.vfs", "a".repeat(64))).is_err());

    assert!(naming::validate("under_score-9.vfs").is_ok());
    assert!(naming::validate("-edge.vfs").is_err());
    assert!(naming::validate("edge-.vfs").is_err());
    assert!(naming::validate("UPPER.vfs").is_err());
    assert!(naming::validate("dot.ted.vfs").is_err());
    assert!(naming::validate("noext").is_err());
}

#[test]
fn normalization_lowercases_and_appends_tld() {
    assert_eq!(naming::normalize("  Alice  "), "alice.vfs");
    assert_eq!(naming::normalize("Bob.VFS"), "bob.vfs");
    assert!(naming::is_reserved("root.vfs"));
    assert!(naming::is_reserved(&naming::normalize("ADMIN")));
    assert!(!naming::is_reserved("rooty.vfs"));
}

#[test]
fn canonical_form_is_byte_exact() {
    let reg = Registration {
        name: "alice.vfs".into(),
        owner: "OA".into(),
        records: vec![text_record("hi")],
        timestamp_ms: 1000,
        expires_ms: 1000 + LEASE_MS,
        nonce: "n".into(),
        signature: "unused".into(),
        public_key: "unused".into(),
    };
    let bytes = canonical_sign_bytes(&reg).unwrap();
    let expected = format!(
        "{{\"name\":\"alice.vfs\",\"owner\":\"OA\",\"records\":[{{\"type\":\"TEXT\",\"value\":\"hi\",\"ttl\":3600}}],\"timestamp\":1000,\"expires\":{},\"nonce\":\"n\"}}",
        1000u64 + LEASE_MS
    );
    assert_eq!(String::from_utf8(bytes).unwrap(), expected);
}

#[test]
fn record_ttl_defaults_on_decode() {
    let rec: Record =
        serde_json::from_str("{\"type\":\"TEXT\",\"value\":\"hi\"}").unwrap();
    assert_eq!(rec.ttl_seconds, 3600);
}

#[test]
fn record_count_bounds() {
    let id = identity();
    let now = now_ms();
    let admission = Admission::new(POW_DIFFICULTY);

    let twenty: Vec<Record> = (0..20).map(|i| text_record(&i.to_string())).collect();
    let reg = signed_registration(&id, "bounds.vfs", twenty, now);
    assert!(admission.validate(&reg, "p1", now, SigMode::Canonical).is_ok());

    let twenty_one: Vec<Record> = (0..21).map(|i| text_record(&i.to_string())).collect();
    let reg = signed_registration(&id, "bounds2.vfs", twenty_one, now);
    assert_eq!(
        admission.validate(&reg, "p2", now, SigMode::Canonical),
        Err(AdmissionError::TooManyRecords)
    );
}

#[test]
fn lease_window_tolerance() {
    let id = identity();
    let now = now_ms();
    let admission = Admission::new(POW_DIFFICULTY);

    let sign = |expires_ms: u64, label: &str| {
        let mut reg = signed_registration(&id, label, vec![], now);
        reg.expires_ms = expires_ms;
        let msg = canonical_sign_bytes(&reg).unwrap();
        reg.signature = hex::encode(id.keypair.sign(&msg).as_ref());
        reg
    };

    // Exactly at the +-60s edges is accepted.
    let reg = sign(now + LEASE_MS + 60_000, "lease-a.vfs");
    assert!(admission.validate(&reg, "p1", now, SigMode::Canonical).is_ok());
    let reg = sign(now + LEASE_MS - 60_000, "lease-b.vfs");
    assert!(admission.validate(&reg, "p2", now, SigMode::Canonical).is_ok());

    // One ms past the tolerance is rejected.
    let reg = sign(now + LEASE_MS + 60_001, "lease-c.vfs");
    assert_eq!(
        admission.validate(&reg, "p3", now, SigMode::Canonical),
        Err(AdmissionError::LeaseOutOfRange)
    );
    let reg = sign(now + LEASE_MS - 60_001, "lease-d.vfs");
    assert_eq!(
        admission.validate(&reg, "p4", now, SigMode::Canonical),
        Err(AdmissionError::LeaseOutOfRange)
    );
}

#[test]
fn pow_hex_prefix_boundaries() {
    // Find a nonce with exactly two leading zero hex digits: passes at
    // difficulty 2, fails at 3.
    let (name, owner) = ("powtest.vfs", "OA");
    let mut two_zero_nonce = None;
    for i in 0..2_000_000u64 {
        let nonce = i.to_string();
        let h = pow_hash_hex(name, owner, &nonce);
        if h.starts_with("00") && !h.starts_with("000") {
            two_zero_nonce = Some(nonce);
            break;
        }
    }
    let nonce = two_zero_nonce.expect("two-zero nonce exists");
    assert!(verify_pow(name, owner, &nonce, 2));
    assert!(!verify_pow(name, owner, &nonce, 3));
}

#[test]
fn bad_pow_and_bad_signature_rejected() {
    let id = identity();
    let now = now_ms();
    let admission = Admission::new(POW_DIFFICULTY);

    let mut reg = signed_registration(&id, "tamper.vfs", vec![text_record("x")], now);
    reg.nonce = "1".into(); // almost certainly fails difficulty 3
    if verify_pow(&reg.name, &reg.owner, &reg.nonce, POW_DIFFICULTY) {
        return; // astronomically unlikely; nothing to assert against
    }
    assert_eq!(
        admission.validate(&reg, "p1", now, SigMode::Canonical),
        Err(AdmissionError::BadProofOfWork)
    );

    // Valid PoW but a flipped record invalidates the signature.
    let mut reg = signed_registration(&id, "tamper2.vfs", vec![text_record("x")], now);
    reg.records[0].value = "y".into();
    assert_eq!(
        admission.validate(&reg, "p2", now, SigMode::Canonical),
        Err(AdmissionError::BadSignature)
    );

    // Missing public key.
    let mut reg = signed_registration(&id, "tamper3.vfs", vec![], now);
    reg.public_key = String::new();
    assert_eq!(
        admission.validate(&reg, "p3", now, SigMode::Canonical),
        Err(AdmissionError::MissingKey)
    );
}

#[test]
fn rate_limit_window() {
    let limiter = SlidingWindowLimiter::new(5, RATE_LIMIT_WINDOW_MS, 100);
    let t0 = 1_000_000u64;

    for i in 0..5 {
        assert!(limiter.check("peer", t0 + i), "attempt {i} within quota");
        limiter.commit("peer", t0 + i);
    }
    // The 6th attempt within the window is refused.
    assert!(!limiter.check("peer", t0 + 10));
    // Another peer is unaffected.
    assert!(limiter.check("other", t0 + 10));

    // Once the oldest attempt ages out, one new attempt is admitted.
    let after = t0 + RATE_LIMIT_WINDOW_MS + 1;
    assert!(limiter.check("peer", after));
    limiter.commit("peer", after);
    assert!(!limiter.check("peer", after + 1));
}

#[test]
fn rate_limit_commits_only_after_full_validation() {
    let id = identity();
    let now = now_ms();
    let admission = Admission::new(POW_DIFFICULTY);

    // Malformed traffic (bad signature) must not spend quota.
    for i in 0..20 {
        let mut reg =
            signed_registration(&id, &format!("spam{i}.vfs"), vec![], now);
        reg.signature = hex::encode([0u8; 64]);
        assert_eq!(
            admission.validate(&reg, "noisy", now, SigMode::Canonical),
            Err(AdmissionError::BadSignature)
        );
    }
    // Honest quota is still intact: five accepted validations.
    for i in 0..5 {
        let reg = signed_registration(&id, &format!("ok{i}.vfs"), vec![], now);
        assert!(admission.validate(&reg, "noisy", now, SigMode::Canonical).is_ok());
    }
    let reg = signed_registration(&id, "ok6.vfs", vec![], now);
    assert_eq!(
        admission.validate(&reg, "noisy", now, SigMode::Canonical),
        Err(AdmissionError::RateLimited)
    );
}
