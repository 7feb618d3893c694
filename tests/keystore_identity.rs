// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

use vns::core::security::keystore::{verify_ed25519, AuditAction, Keystore};
use vns::core::types::Signature;

#[test]
fn keystore_identity_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().to_str().unwrap();

    let ks = Keystore::open(path).expect("create keystore");
    let pk = ks.public_key();
    let owner = ks.owner_fingerprint();
    drop(ks);

    assert!(dir.path().join("owner.key").exists());

    let ks = Keystore::open(path).expect("reopen keystore");
    assert_eq!(ks.public_key(), pk);
    assert_eq!(ks.owner_fingerprint(), owner);
}

#[test]
fn signatures_verify_and_are_audited() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ks = Keystore::open(dir.path().to_str().unwrap()).expect("keystore");

    let msg = b"alice.vfs:OB:1234";
    let sig = ks
        .sign(
            AuditAction::Transfer {
                name: "alice.vfs",
                new_owner: "OB",
            },
            msg,
        )
        .expect("sign");

    let pk = ks.public_key();
    verify_ed25519(&pk, msg, &sig).expect("signature verifies");
    assert!(verify_ed25519(&pk, b"tampered", &sig).is_err());

    // One JSON audit line per signature: the action taxonomy plus a digest
    // of the payload, never the payload itself.
    let audit = std::fs::read_to_string(dir.path().join("audit.log")).expect("audit log");
    let line: serde_json::Value =
        serde_json::from_str(audit.lines().next().expect("one line")).expect("json line");
    assert_eq!(line["action"], "transfer");
    assert_eq!(line["name"], "alice.vfs");
    assert_eq!(line["new_owner"], "OB");
    assert!(line["payload_sha256"].as_str().unwrap().len() == 64);
    assert!(
        !audit.contains("alice.vfs:OB:1234"),
        "payload must not be logged"
    );
}

#[test]
fn malformed_signatures_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let ks = Keystore::open(dir.path().to_str().unwrap()).expect("keystore");
    let pk = ks.public_key();

    // Wrong length is refused before ring sees it.
    let short = Signature(vec![0u8; 63]);
    assert!(verify_ed25519(&pk, b"msg", &short).is_err());
    let zeros = Signature(vec![0u8; 64]);
    assert!(verify_ed25519(&pk, b"msg", &zeros).is_err());
}
