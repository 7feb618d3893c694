// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! Wire types and canonical encoding helpers.
//!
//! The canonical signing form is the single choke point every signer and
//! verifier goes through: a compact JSON object with fields in the fixed
//! order `name, owner, records, timestamp, expires, nonce` (records as
//! `type, value, ttl`, with `ttl` default-filled to 3600). Any deviation
//! invalidates signatures across the network.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::core::config::DEFAULT_RECORD_TTL_SECS;

/// Canonical serialization error.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("serialization")]
    Serialize,
    #[error("deserialization")]
    Deserialize,
    #[error("size limit exceeded")]
    TooLarge,
}

/// Typed record kinds. The kind governs only interpretation by clients,
/// never by the store itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordKind {
    /// IPv4 address.
    Addr4,
    /// IPv6 address.
    Addr6,
    /// Free-form text metadata.
    Text,
    /// Content identifier pointing into a blob store.
    ContentId,
    /// Peer endpoint used for sync (multiaddr or URL).
    SyncEndpoint,
}

impl RecordKind {
    /// Parse a CLI-style lowercase kind name.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "addr4" => Some(Self::Addr4),
            "addr6" => Some(Self::Addr6),
            "text" => Some(Self::Text),
            "content_id" => Some(Self::ContentId),
            "sync_endpoint" => Some(Self::SyncEndpoint),
            _ => None,
        }
    }
}

fn default_ttl() -> u32 {
    DEFAULT_RECORD_TTL_SECS
}

/// A single typed record bound to a name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Record kind tag.
    #[serde(rename = "type")]
    pub kind: RecordKind,
    /// Opaque value, interpreted per kind by clients.
    pub value: String,
    /// Client cache TTL in seconds (default 3600).
    #[serde(rename = "ttl", default = "default_ttl")]
    pub ttl_seconds: u32,
}

/// The signed unit: a name bound to an owner, a record set and a lease window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Normalized name (`<label>.vfs`).
    pub name: String,
    /// Opaque owner identity, typically a public-key fingerprint.
    pub owner: String,
    /// Ordered record set (bounded).
    pub records: Vec<Record>,
    /// Creation wall-clock timestamp in ms since the UNIX epoch.
    #[serde(rename = "timestamp")]
    pub timestamp_ms: u64,
    /// Lease end in ms since the UNIX epoch.
    #[serde(rename = "expires")]
    pub expires_ms: u64,
    /// Proof-of-work nonce over `name:owner:nonce`.
    pub nonce: String,
    /// Hex Ed25519 signature (64 bytes). Empty only for reserved seeds.
    pub signature: String,
    /// Hex Ed25519 public key (32 bytes). Empty only for reserved seeds.
    #[serde(rename = "publicKey")]
    pub public_key: String,
}

/// The stored unit: the latest accepted registration plus store metadata.
///
/// Serializes as the registration fields (canonical order) followed by
/// `content_id`, `last_modified_ms`, `version`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Latest accepted registration.
    #[serde(flatten)]
    pub registration: Registration,
    /// Blob-store identifier of the canonical serialized registration.
    pub content_id: String,
    /// Mirrors the accepted registration's timestamp.
    pub last_modified_ms: u64,
    /// Monotone per-name counter, starting at 1.
    pub version: u64,
}

/// Replicated operation tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaOp {
    /// First registration of a name.
    Register,
    /// Re-registration of an existing name.
    Update,
    /// Ownership transfer.
    Transfer,
    /// Lease expiry removal.
    Expire,
}

/// The only inter-node mutation carrier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    /// Operation tag.
    #[serde(rename = "type")]
    pub op: DeltaOp,
    /// Entry snapshot the operation applies to.
    pub entry: Entry,
    /// Sender's namespace digest (hex) at emission time.
    #[serde(rename = "merkleRoot")]
    pub digest_at_sender: String,
    /// Peer id of the node that originated the mutation.
    #[serde(rename = "peerId")]
    pub origin_peer: String,
    /// Emission wall-clock timestamp in ms.
    #[serde(rename = "timestamp")]
    pub emitted_ms: u64,
}

// Borrowed mirror of the signed payload. Field order here IS the canonical
// field order; serde_json emits struct fields in declaration order.
#[derive(Serialize)]
struct SignRecord<'a> {
    #[serde(rename = "type")]
    kind: RecordKind,
    value: &'a str,
    ttl: u32,
}

#[derive(Serialize)]
struct SignPayload<'a> {
    name: &'a str,
    owner: &'a str,
    records: Vec<SignRecord<'a>>,
    timestamp: u64,
    expires: u64,
    nonce: &'a str,
}

/// Canonical signing bytes for a registration (compact JSON, fixed order).
pub fn canonical_sign_bytes(reg: &Registration) -> Result<Vec<u8>, CodecError> {
    let payload = SignPayload {
        name: &reg.name,
        owner: &reg.owner,
        records: reg
            .records
            .iter()
            .map(|r| SignRecord {
                kind: r.kind,
                value: &r.value,
                ttl: if r.ttl_seconds == 0 {
                    DEFAULT_RECORD_TTL_SECS
                } else {
                    r.ttl_seconds
                },
            })
            .collect(),
        timestamp: reg.timestamp_ms,
        expires: reg.expires_ms,
        nonce: &reg.nonce,
    };
    serde_json::to_vec(&payload).map_err(|_| CodecError::Serialize)
}

/// Authorization bytes for an ownership transfer: the colon-joined tuple
/// `name:new_owner:timestamp_ms`, signed by the current owner.
pub fn transfer_auth_bytes(name: &str, new_owner: &str, timestamp_ms: u64) -> Vec<u8> {
    format!("{name}:{new_owner}:{timestamp_ms}").into_bytes()
}

/// Stored form of a registration: the canonical field order followed by
/// `signature` and `publicKey`. Content identifiers are computed over these
/// bytes, so the blob a peer fetches can be re-verified end to end.
pub fn registration_wire_bytes(reg: &Registration) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(reg).map_err(|_| CodecError::Serialize)
}

/// Encode a delta as canonical JSON wire bytes.
pub fn encode_delta(delta: &Delta) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(delta).map_err(|_| CodecError::Serialize)
}

/// Decode a delta with a hard size cap on the raw payload.
pub fn decode_delta_limited(bytes: &[u8], max: usize) -> Result<Delta, CodecError> {
    if bytes.len() > max {
        return Err(CodecError::TooLarge);
    }
    serde_json::from_slice(bytes).map_err(|_| CodecError::Deserialize)
}

/// Ed25519 signature bytes (expected 64).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Signature(pub Vec<u8>);

/// Wall-clock ms since the UNIX epoch (0 if the clock is unavailable).
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
