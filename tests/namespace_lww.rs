// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

mod common;

use common::{identity, remote_delta, signed_registration, test_store, text_record};
use vns::core::store::namespace::{ApplyOutcome, RejectReason, ResolveOutcome, StoreError};
use vns::core::types::{now_ms, DeltaOp};

#[test]
fn fresh_register_then_resolve() {
    let mut t = test_store(None);
    let oa = identity();
    let now = now_ms();

    let before = t.store.digest();
    let reg = signed_registration(&oa, "alice.vfs", vec![text_record("hi")], now);
    let receipt = t.store.register(reg, "peer-a").expect("register");

    assert_eq!(receipt.version, 1);
    assert_eq!(receipt.op, DeltaOp::Register);
    assert_ne!(t.store.digest(), before, "digest must change");

    match t.store.resolve("alice.vfs") {
        ResolveOutcome::Found {
            records,
            owner,
            ttl_hint,
            ..
        } => {
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].value, "hi");
            assert_eq!(owner, oa.owner);
            assert_eq!(ttl_hint, 3600);
        }
        other => panic!("expected Found, got {other:?}"),
    }

    // Exactly one REGISTER delta emitted toward the replicator.
    let out = t.outbound_rx.try_recv().expect("delta emitted");
    assert_eq!(out.op, DeltaOp::Register);
    assert_eq!(out.entry.registration.name, "alice.vfs");
    assert!(t.outbound_rx.try_recv().is_err());

    assert_eq!(t.store.names_owned_by(&oa.owner), vec!["alice.vfs"]);
}

#[test]
fn lww_accepts_newer_inbound_and_keeps_versions_monotone() {
    let mut t = test_store(None);
    let oa = identity();
    let ob = identity();
    let now = now_ms();

    let reg_a = signed_registration(&oa, "alice.vfs", vec![text_record("a")], now);
    t.store.register(reg_a, "peer-a").unwrap();
    let _ = t.outbound_rx.try_recv();
    let digest_after_a = t.store.digest();

    // Inbound delta with a strictly newer timestamp wins the name.
    let reg_b = signed_registration(&ob, "alice.vfs", vec![text_record("b")], now + 1000);
    let delta = remote_delta(DeltaOp::Update, &reg_b, 2, "node-b");
    match t.store.apply_delta(&delta, "node-b") {
        ApplyOutcome::Applied { op, reemitted } => {
            assert_eq!(op, DeltaOp::Update);
            assert!(!reemitted, "owner is not local; no re-emit");
        }
        other => panic!("expected Applied, got {other:?}"),
    }
    assert!(t.outbound_rx.try_recv().is_err(), "inbound merge must not re-emit");
    assert_ne!(t.store.digest(), digest_after_a);

    let entry = t.store.entry("alice.vfs").unwrap();
    assert_eq!(entry.registration.owner, ob.owner);
    assert_eq!(entry.version, 2);
    assert_eq!(entry.last_modified_ms, now + 1000);

    // Owner index followed the change.
    assert!(t.store.names_owned_by(&oa.owner).is_empty());
    assert_eq!(t.store.names_owned_by(&ob.owner), vec!["alice.vfs"]);
}

#[test]
fn stale_delta_rejected_without_state_change() {
    let t = test_store(None);
    let oa = identity();
    let ob = identity();
    let now = now_ms();

    let reg_a = signed_registration(&oa, "alice.vfs", vec![text_record("a")], now + 1000);
    t.store.register(reg_a, "peer-a").unwrap();
    let digest = t.store.digest();

    // Older candidate loses.
    let reg_old = signed_registration(&ob, "alice.vfs", vec![text_record("old")], now + 500);
    let delta = remote_delta(DeltaOp::Update, &reg_old, 1, "node-b");
    assert!(matches!(
        t.store.apply_delta(&delta, "node-b"),
        ApplyOutcome::Rejected(RejectReason::Stale)
    ));

    // Equal timestamp keeps the incumbent (first-writer stable).
    let reg_tie = signed_registration(&ob, "alice.vfs", vec![text_record("tie")], now + 1000);
    let delta = remote_delta(DeltaOp::Update, &reg_tie, 1, "node-c");
    assert!(matches!(
        t.store.apply_delta(&delta, "node-c"),
        ApplyOutcome::Rejected(RejectReason::Stale)
    ));

    assert_eq!(t.store.digest(), digest, "rejections leave the digest alone");
    let entry = t.store.entry("alice.vfs").unwrap();
    assert_eq!(entry.registration.owner, oa.owner);
}

#[test]
fn duplicate_delta_is_idempotent() {
    let t = test_store(None);
    let oa = identity();
    let now = now_ms();

    let reg = signed_registration(&oa, "dup.vfs", vec![], now);
    let delta = remote_delta(DeltaOp::Register, &reg, 1, "node-b");

    assert!(matches!(
        t.store.apply_delta(&delta, "node-b"),
        ApplyOutcome::Applied { .. }
    ));
    let digest = t.store.digest();
    let entry = t.store.entry("dup.vfs").unwrap();

    // Second application of the same delta changes nothing.
    assert!(matches!(
        t.store.apply_delta(&delta, "node-b"),
        ApplyOutcome::Rejected(RejectReason::Stale)
    ));
    assert_eq!(t.store.digest(), digest);
    assert_eq!(t.store.entry("dup.vfs").unwrap(), entry);
}

#[test]
fn reserved_names_refuse_mutation() {
    let t = test_store(None);
    let oa = identity();
    let now = now_ms();

    let before = t.store.digest();
    for name in ["root.vfs", "admin.vfs", "sync.vfs", "bootstrap.vfs"] {
        let reg = signed_registration(&oa, name, vec![], now);
        assert!(matches!(
            t.store.register(reg, "peer-a"),
            Err(StoreError::Reserved)
        ));

        let reg = signed_registration(&oa, name, vec![], now + 5000);
        let delta = remote_delta(DeltaOp::Update, &reg, 9, "node-b");
        assert!(matches!(
            t.store.apply_delta(&delta, "node-b"),
            ApplyOutcome::Rejected(RejectReason::Reserved)
        ));
    }
    assert_eq!(t.store.digest(), before);

    // Reserved names resolve with the genesis sentinel and never expire.
    match t.store.resolve("root.vfs") {
        ResolveOutcome::Found { owner, .. } => assert_eq!(owner, "genesis"),
        other => panic!("expected Found, got {other:?}"),
    }
}

#[test]
fn corrupt_delta_content_id_rejected() {
    let t = test_store(None);
    let oa = identity();
    let now = now_ms();

    let reg = signed_registration(&oa, "honest.vfs", vec![], now);
    let mut delta = remote_delta(DeltaOp::Register, &reg, 1, "node-b");
    delta.entry.content_id = "deadbeef".into();
    assert!(matches!(
        t.store.apply_delta(&delta, "node-b"),
        ApplyOutcome::Rejected(RejectReason::Corrupt(_))
    ));
    assert!(t.store.entry("honest.vfs").is_none());
}

#[test]
fn transfer_to_local_owner_reemits() {
    let local = identity();
    let remote = identity();
    let mut t = test_store(Some(local.owner.clone()));
    let now = now_ms();

    // A registration owned by this node's identity arrives from the mesh.
    let mut reg = signed_registration(&remote, "forme.vfs", vec![], now);
    reg.owner = local.owner.clone();
    // Re-mine and re-sign for the new owner string.
    let reg = {
        use vns::core::config::POW_DIFFICULTY;
        use vns::core::security::pow::mine_pow;
        use vns::core::types::canonical_sign_bytes;
        let mut reg = reg;
        reg.nonce = mine_pow(&reg.name, &reg.owner, POW_DIFFICULTY, u64::MAX).unwrap();
        let msg = canonical_sign_bytes(&reg).unwrap();
        reg.signature = hex::encode(remote.keypair.sign(&msg).as_ref());
        reg.public_key = remote.public_key_hex.clone();
        reg
    };
    let delta = remote_delta(DeltaOp::Register, &reg, 1, "node-b");

    match t.store.apply_delta(&delta, "node-b") {
        ApplyOutcome::Applied { reemitted, .. } => assert!(reemitted),
        other => panic!("expected Applied, got {other:?}"),
    }
    let out = t.outbound_rx.try_recv().expect("re-emitted delta");
    assert_eq!(out.entry.registration.name, "forme.vfs");
}

#[test]
fn local_reregistration_must_be_newer() {
    let t = test_store(None);
    let oa = identity();
    let now = now_ms();

    let reg = signed_registration(&oa, "stale.vfs", vec![], now);
    t.store.register(reg, "peer-a").unwrap();

    let same_ts = signed_registration(&oa, "stale.vfs", vec![text_record("x")], now);
    assert!(matches!(
        t.store.register(same_ts, "peer-b"),
        Err(StoreError::Stale)
    ));

    let newer = signed_registration(&oa, "stale.vfs", vec![text_record("x")], now + 1);
    let receipt = t.store.register(newer, "peer-c").unwrap();
    assert_eq!(receipt.version, 2);
    assert_eq!(receipt.op, DeltaOp::Update);
}
