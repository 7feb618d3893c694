// Copyright (c) 2026 VNS Project
// Licensed under the Apache-2.0 License.

#![no_main]
#![forbid(unsafe_code)]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Best-effort: normalization and validation must never panic, and a
    // normalized accepted name must normalize to itself.
    if let Ok(s) = std::str::from_utf8(data) {
        let normalized = vns::core::naming::normalize(s);
        if vns::core::naming::validate(&normalized).is_ok() {
            assert_eq!(vns::core::naming::normalize(&normalized), normalized);
        }
        let _ = vns::core::naming::is_reserved(&normalized);
    }
});
