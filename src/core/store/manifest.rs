// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Persistence manifest: the blob the store writes after every successful
//! mutation and reloads at boot. Reserved seeds are never listed; they are
//! re-seeded. The digest recorded here is informational only - boot always
//! recomputes it from scratch.

use serde::{Deserialize, Serialize};

/// Current manifest format version.
pub const MANIFEST_VERSION: u32 = 1;

/// One live, non-reserved namespace entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Normalized name.
    pub name: String,
    /// Content identifier of the canonical serialized registration.
    pub content_id: String,
}

/// Manifest blob payload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Manifest {
    /// Format version.
    pub version: u32,
    /// Namespace digest (hex) at save time.
    pub digest: String,
    /// Live non-reserved entries.
    pub entries: Vec<ManifestEntry>,
    /// Save wall-clock timestamp in ms.
    pub saved_ms: u64,
}
