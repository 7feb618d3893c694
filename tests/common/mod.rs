// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![allow(dead_code)]

//! Shared helpers for integration tests: real Ed25519 identities, signed
//! registrations with mined proof-of-work, and an in-memory store.

use std::sync::Arc;

use ring::signature::{Ed25519KeyPair, KeyPair};
use tokio::sync::mpsc;

use vns::core::config::{LEASE_MS, POW_DIFFICULTY};
use vns::core::naming;
use vns::core::security::admission::Admission;
use vns::core::security::keystore::fingerprint_of;
use vns::core::security::pow::mine_pow;
use vns::core::store::blob::{content_id_for, MemoryBlobStore};
use vns::core::store::namespace::{NamespaceStore, OutboundDelta};
use vns::core::types::{
    canonical_sign_bytes, now_ms, registration_wire_bytes, Delta, DeltaOp, Entry, Record,
    RecordKind, Registration,
};
use vns::monitoring::metrics::Metrics;

/// A signing identity as a client would hold it.
pub struct Identity {
    pub keypair: Ed25519KeyPair,
    pub owner: String,
    pub public_key_hex: String,
}

pub fn identity() -> Identity {
    let rng = ring::rand::SystemRandom::new();
    let pkcs8 = Ed25519KeyPair::generate_pkcs8(&rng).expect("pkcs8");
    let keypair = Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).expect("keypair");
    let pk = keypair.public_key().as_ref().to_vec();
    let mut pk_bytes = [0u8; 32];
    pk_bytes.copy_from_slice(&pk);
    Identity {
        owner: fingerprint_of(&pk_bytes),
        public_key_hex: hex::encode(&pk),
        keypair,
    }
}

pub fn text_record(value: &str) -> Record {
    Record {
        kind: RecordKind::Text,
        value: value.to_string(),
        ttl_seconds: 3600,
    }
}

/// Fully valid registration: normalized name, mined PoW, canonical-form
/// Ed25519 signature, full lease.
pub fn signed_registration(
    id: &Identity,
    name: &str,
    records: Vec<Record>,
    timestamp_ms: u64,
) -> Registration {
    let name = naming::normalize(name);
    let nonce = mine_pow(&name, &id.owner, POW_DIFFICULTY, u64::MAX).expect("pow");
    let mut reg = Registration {
        name,
        owner: id.owner.clone(),
        records,
        timestamp_ms,
        expires_ms: timestamp_ms + LEASE_MS,
        nonce,
        signature: String::new(),
        public_key: id.public_key_hex.clone(),
    };
    let msg = canonical_sign_bytes(&reg).expect("canonical");
    reg.signature = hex::encode(id.keypair.sign(&msg).as_ref());
    reg
}

/// The delta another node would emit for this registration.
pub fn remote_delta(op: DeltaOp, reg: &Registration, version: u64, origin_peer: &str) -> Delta {
    let bytes = registration_wire_bytes(reg).expect("wire");
    Delta {
        op,
        entry: Entry {
            registration: reg.clone(),
            content_id: content_id_for(&bytes),
            last_modified_ms: reg.timestamp_ms,
            version,
        },
        digest_at_sender: String::new(),
        origin_peer: origin_peer.to_string(),
        emitted_ms: now_ms(),
    }
}

pub struct TestStore {
    pub store: Arc<NamespaceStore>,
    pub outbound_rx: mpsc::UnboundedReceiver<OutboundDelta>,
    pub blobs: Arc<MemoryBlobStore>,
    pub metrics: Arc<Metrics>,
}

pub fn test_store(local_owner: Option<String>) -> TestStore {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let blobs = Arc::new(MemoryBlobStore::new());
    let metrics = Arc::new(Metrics::new().expect("metrics"));
    let store = Arc::new(NamespaceStore::new(
        blobs.clone(),
        Admission::new(POW_DIFFICULTY),
        local_owner,
        false,
        outbound_tx,
        metrics.clone(),
    ));
    TestStore {
        store,
        outbound_rx,
        blobs,
        metrics,
    }
}
