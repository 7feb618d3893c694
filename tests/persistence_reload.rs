// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

mod common;

use common::{identity, signed_registration, test_store, text_record};
use std::sync::Arc;
use tokio::sync::mpsc;

use vns::core::config::POW_DIFFICULTY;
use vns::core::security::admission::Admission;
use vns::core::store::blob::{BlobStore, MemoryBlobStore, SledBlobStore};
use vns::core::store::manifest::{Manifest, ManifestEntry, MANIFEST_VERSION};
use vns::core::store::namespace::{NamespaceStore, ResolveOutcome};
use vns::core::types::{now_ms, registration_wire_bytes};
use vns::monitoring::metrics::Metrics;

fn fresh_store(blobs: Arc<dyn BlobStore>) -> NamespaceStore {
    let (outbound_tx, _outbound_rx) = mpsc::unbounded_channel();
    NamespaceStore::new(
        blobs,
        Admission::new(POW_DIFFICULTY),
        None,
        false,
        outbound_tx,
        Arc::new(Metrics::new().unwrap()),
    )
}

#[test]
fn persist_then_reload_yields_identical_namespace() {
    let dir = tempfile::tempdir().expect("tempdir");
    let blobs: Arc<SledBlobStore> =
        Arc::new(SledBlobStore::open(dir.path().to_str().unwrap()).expect("sled open"));

    let store1 = fresh_store(blobs.clone());
    let oa = identity();
    let ob = identity();
    let now = now_ms();
    store1
        .register(
            signed_registration(&oa, "alice.vfs", vec![text_record("a")], now),
            "p1",
        )
        .unwrap();
    store1
        .register(
            signed_registration(&ob, "bob.vfs", vec![text_record("b")], now + 1),
            "p2",
        )
        .unwrap();
    let digest1 = store1.digest();
    let entries1 = store1.status().entries;
    drop(store1);

    // A second store over the same blobs rebuilds from the manifest.
    let store2 = fresh_store(blobs);
    assert_eq!(store2.load_from_manifest().expect("reload"), 2);

    assert_eq!(store2.digest(), digest1, "digest recomputed to the same value");
    assert_eq!(store2.status().entries, entries1);
    assert!(!store2.status().degraded);

    match store2.resolve("alice.vfs") {
        ResolveOutcome::Found { owner, records, .. } => {
            assert_eq!(owner, oa.owner);
            assert_eq!(records[0].value, "a");
        }
        other => panic!("expected Found, got {other:?}"),
    }
    assert_eq!(store2.names_owned_by(&ob.owner), vec!["bob.vfs"]);
}

#[test]
fn corrupted_manifest_entries_are_skipped_and_flagged() {
    let blobs = Arc::new(MemoryBlobStore::new());
    let id = identity();
    let now = now_ms();

    // One valid persisted entry.
    let good = signed_registration(&id, "good.vfs", vec![], now);
    let good_bytes = registration_wire_bytes(&good).unwrap();
    let good_id = blobs.put(&good_bytes).unwrap();

    // One blob that is not a registration at all.
    let junk_id = blobs.put(b"not json at all").unwrap();

    // One entry with a broken signature.
    let mut forged = signed_registration(&id, "forged.vfs", vec![], now);
    forged.signature = hex::encode([7u8; 64]);
    let forged_bytes = registration_wire_bytes(&forged).unwrap();
    let forged_id = blobs.put(&forged_bytes).unwrap();

    let manifest = Manifest {
        version: MANIFEST_VERSION,
        digest: String::new(),
        entries: vec![
            ManifestEntry {
                name: "good.vfs".into(),
                content_id: good_id,
            },
            ManifestEntry {
                name: "junk.vfs".into(),
                content_id: junk_id,
            },
            ManifestEntry {
                name: "forged.vfs".into(),
                content_id: forged_id,
            },
            ManifestEntry {
                name: "missing.vfs".into(),
                content_id: "0".repeat(64),
            },
        ],
        saved_ms: now,
    };
    let manifest_id = blobs.put(&serde_json::to_vec(&manifest).unwrap()).unwrap();
    blobs.set_manifest_head(&manifest_id).unwrap();

    let store = fresh_store(blobs);
    assert_eq!(store.load_from_manifest().unwrap(), 1);
    assert!(store.status().degraded, "corrupt entries leave the node degraded");
    assert!(matches!(
        store.resolve("good.vfs"),
        ResolveOutcome::Found { .. }
    ));
    assert!(matches!(
        store.resolve("forged.vfs"),
        ResolveOutcome::NotFound
    ));
}

#[test]
fn missing_manifest_starts_empty() {
    let store = fresh_store(Arc::new(MemoryBlobStore::new()));
    assert_eq!(store.load_from_manifest().unwrap(), 0);
    assert!(!store.status().degraded);
    // The four reserved seeds are always present.
    assert_eq!(store.status().entries, 4);
}

#[test]
fn mutations_update_the_manifest_head() {
    let t = test_store(None);
    let id = identity();
    assert!(t.blobs.manifest_head().unwrap().is_none());

    t.store
        .register(signed_registration(&id, "head.vfs", vec![], now_ms()), "p1")
        .unwrap();
    let head1 = t.blobs.manifest_head().unwrap().expect("head written");

    t.store
        .register(
            signed_registration(&id, "head2.vfs", vec![], now_ms() + 1),
            "p2",
        )
        .unwrap();
    let head2 = t.blobs.manifest_head().unwrap().unwrap();
    assert_ne!(head1, head2, "each mutation writes a fresh manifest");

    // The manifest lists only non-reserved entries.
    let manifest: Manifest =
        serde_json::from_slice(&t.blobs.get(&head2).unwrap().unwrap()).unwrap();
    let names: Vec<_> = manifest.entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["head.vfs", "head2.vfs"]);
    assert!(manifest.entries.iter().all(|e| !e.name.starts_with("root")));
}
