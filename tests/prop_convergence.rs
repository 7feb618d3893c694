// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]

mod common;

use common::{identity, remote_delta, signed_registration, test_store, Identity};
use proptest::prelude::*;
use vns::core::store::digest::namespace_digest;
use vns::core::store::namespace::ResolveOutcome;
use vns::core::types::DeltaOp;

proptest! {
    #[test]
    fn digest_is_order_independent(mut ids in proptest::collection::vec("[0-9a-f]{64}", 1..32)) {
        let forward = namespace_digest(ids.iter());
        ids.reverse();
        let backward = namespace_digest(ids.iter());
        prop_assert_eq!(forward, backward);
    }
}

// Each case: up to six registrations over three names and three owners with
// strictly distinct timestamps, delivered to two stores in different orders.
// LWW must make both converge to the same digest and owner assignment.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]
    #[test]
    fn lww_converges_under_reordered_delivery(
        (picks, order) in proptest::collection::vec((0usize..3, 0usize..3), 1..6)
            .prop_flat_map(|v| {
                let len = v.len();
                (Just(v), Just((0..len).collect::<Vec<usize>>()).prop_shuffle())
            })
    ) {
        let owners: Vec<Identity> = (0..3).map(|_| identity()).collect();
        let names = ["conv-a.vfs", "conv-b.vfs", "conv-c.vfs"];
        let base = vns::core::types::now_ms();

        let deltas: Vec<_> = picks
            .iter()
            .enumerate()
            .map(|(i, (name_idx, owner_idx))| {
                let reg = signed_registration(
                    &owners[*owner_idx],
                    names[*name_idx],
                    vec![],
                    base + (i as u64 + 1) * 1000,
                );
                remote_delta(DeltaOp::Register, &reg, 1, format!("origin{i}").as_str())
            })
            .collect();

        let a = test_store(None);
        let b = test_store(None);

        for (i, delta) in deltas.iter().enumerate() {
            // Unique delivering peers keep the quota out of the picture.
            let _ = a.store.apply_delta(delta, &format!("pa{i}"));
        }
        for (i, &j) in order.iter().enumerate() {
            let _ = b.store.apply_delta(&deltas[j], &format!("pb{i}"));
        }

        prop_assert_eq!(a.store.digest(), b.store.digest());

        for name in names {
            let ra = a.store.resolve(name);
            let rb = b.store.resolve(name);
            prop_assert_eq!(&ra, &rb);

            // Owner index consistency on both stores.
            if let ResolveOutcome::Found { owner, .. } = ra {
                prop_assert!(a.store.names_owned_by(&owner).contains(&name.to_string()));
                prop_assert!(b.store.names_owned_by(&owner).contains(&name.to_string()));
            }
        }

        // Replaying the full multiset once more changes nothing.
        let digest = a.store.digest();
        for (i, delta) in deltas.iter().enumerate() {
            let _ = a.store.apply_delta(delta, &format!("pc{i}"));
        }
        prop_assert_eq!(a.store.digest(), digest);
    }
}
