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

//! The replicated namespace: a signature-verified map from normalized name
//! to the latest accepted registration, with a reverse owner index, a flat
//! namespace digest, lease expiry and manifest persistence.
//!
//! Every public operation runs under one store-wide exclusive section that
//! covers the map mutation, the owner index, and the digest recomputation.
//! Blob puts and transport emission never hold the section; the only
//! permitted mutation shape is: encode -> put blob -> enter section -> LWW
//! check -> install -> exit -> emit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::core::config::{
    DEFAULT_RECORD_TTL_SECS, LEASE_MS, RESERVED_OWNER, TRANSFER_AUTH_SKEW_MS,
};
use crate::core::naming;
use crate::core::security::admission::{
    decode_public_key, decode_signature, Admission, AdmissionError, SigMode,
};
use crate::core::security::keystore::verify_ed25519;
use crate::core::security::pow::mine_pow;
use crate::core::store::blob::{content_id_for, BlobStore, ContentId};
use crate::core::store::digest::{digest_hex, namespace_digest, Hash32};
use crate::core::store::manifest::{Manifest, ManifestEntry, MANIFEST_VERSION};
use crate::core::types::{
    now_ms, registration_wire_bytes, transfer_auth_bytes, Delta, DeltaOp, Entry, Record,
    Registration,
};
use crate::monitoring::metrics::Metrics;

/// Store operation failures surfaced to callers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Admission refused the mutation; no state changed.
    #[error(transparent)]
    Admission(#[from] AdmissionError),
    /// Attempt to mutate a reserved name.
    #[error("reserved name")]
    Reserved,
    /// Candidate timestamp not newer than the incumbent's.
    #[error("stale registration")]
    Stale,
    /// Name absent from the namespace.
    #[error("name not found")]
    NotFound,
    /// Lease elapsed.
    #[error("registration expired")]
    Expired,
    /// `strict_transfer` is set and only one signature was provided.
    #[error("multi-signature transfer required")]
    MultiSigRequired,
    /// Blob store failure; the mutation aborted before in-memory changes.
    #[error("blob io: {0}")]
    BlobIo(String),
    /// Loaded state failed re-validation.
    #[error("corrupt: {0}")]
    Corrupt(String),
}

/// Why an inbound delta was discarded.
#[derive(Debug, Error)]
pub enum RejectReason {
    /// Delta originated from this node.
    #[error("self-origin delta")]
    SelfOrigin,
    /// Reserved names never accept deltas.
    #[error("reserved name")]
    Reserved,
    /// Not newer than the incumbent (or a premature expire).
    #[error("stale delta")]
    Stale,
    /// Expire for a name this node does not hold.
    #[error("name not found")]
    NotFound,
    /// Embedded entry failed integrity checks.
    #[error("corrupt delta: {0}")]
    Corrupt(String),
    /// Blob store failure while persisting the entry.
    #[error("blob io: {0}")]
    BlobIo(String),
    /// Admission refused the embedded registration.
    #[error(transparent)]
    Admission(AdmissionError),
}

/// Result of applying an inbound delta.
#[derive(Debug)]
pub enum ApplyOutcome {
    /// Delta merged into the namespace.
    Applied {
        /// Operation that was merged.
        op: DeltaOp,
        /// True when the accepted owner is this node's identity and the
        /// delta was re-emitted to aid mesh convergence.
        reemitted: bool,
    },
    /// Delta discarded.
    Rejected(RejectReason),
}

/// Resolution result. Lookup only; never touches the network.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// Name present and within its lease.
    Found {
        /// Record set of the latest registration.
        records: Vec<Record>,
        /// Current owner.
        owner: String,
        /// Lease end in ms.
        expires_ms: u64,
        /// Smallest record TTL, or the default when no records exist.
        ttl_hint: u32,
    },
    /// Name absent.
    NotFound,
    /// Lease elapsed; the sweep removes it.
    Expired,
}

/// Receipt for an accepted local mutation.
#[derive(Clone, Debug)]
pub struct MutationReceipt {
    /// Content identifier of the stored registration.
    pub content_id: ContentId,
    /// Version installed for the name.
    pub version: u64,
    /// Operation that was emitted.
    pub op: DeltaOp,
}

/// Payload handed from the store to the replication worker.
#[derive(Clone, Debug)]
pub struct OutboundDelta {
    /// Operation tag.
    pub op: DeltaOp,
    /// Entry snapshot at emission time.
    pub entry: Entry,
    /// Namespace digest (hex) right after the mutation.
    pub digest_hex: String,
}

struct NamespaceState {
    entries: BTreeMap<String, Entry>,
    owners: BTreeMap<String, BTreeSet<String>>,
    digest: Hash32,
    manifest_id: Option<ContentId>,
    corrupt_skipped: u64,
}

// (name, registration, content_id) triples of live non-reserved entries,
// snapshotted inside the section and persisted outside it.
type ManifestSnapshot = Vec<(String, Registration, ContentId)>;

/// Store-wide status for `/status`.
#[derive(Clone, Debug)]
pub struct StoreStatus {
    /// Live entries, reserved included.
    pub entries: usize,
    /// Current namespace digest (hex).
    pub digest: String,
    /// True when manifest reload skipped corrupted entries.
    pub degraded: bool,
}

/// The canonical replicated namespace map.
pub struct NamespaceStore {
    state: Mutex<NamespaceState>,
    blobs: Arc<dyn BlobStore>,
    admission: Admission,
    /// This node's owner fingerprint, if it has a keystore identity.
    local_owner: Option<String>,
    strict_transfer: bool,
    outbound: mpsc::UnboundedSender<OutboundDelta>,
    metrics: Arc<Metrics>,
}

impl NamespaceStore {
    /// Create a store and seed the four reserved names.
    pub fn new(
        blobs: Arc<dyn BlobStore>,
        admission: Admission,
        local_owner: Option<String>,
        strict_transfer: bool,
        outbound: mpsc::UnboundedSender<OutboundDelta>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let mut state = NamespaceState {
            entries: BTreeMap::new(),
            owners: BTreeMap::new(),
            digest: [0u8; 32],
            manifest_id: None,
            corrupt_skipped: 0,
        };
        Self::seed_reserved(&mut state);
        metrics.entries.set(state.entries.len() as i64);
        Self {
            state: Mutex::new(state),
            blobs,
            admission,
            local_owner,
            strict_transfer,
            outbound,
            metrics,
        }
    }

    // Reserved seeds: materialized at init, never expire, never mutate,
    // never propagate, never persisted.
    fn seed_reserved(state: &mut NamespaceState) {
        for label in naming::RESERVED_LABELS {
            let name = format!("{label}{}", crate::core::config::TLD);
            let reg = Registration {
                name: name.clone(),
                owner: RESERVED_OWNER.to_string(),
                records: Vec::new(),
                timestamp_ms: 0,
                expires_ms: u64::MAX,
                nonce: RESERVED_OWNER.to_string(),
                signature: String::new(),
                public_key: String::new(),
            };
            let content_id = registration_wire_bytes(&reg)
                .map(|b| content_id_for(&b))
                .unwrap_or_default();
            let entry = Entry {
                registration: reg,
                content_id,
                last_modified_ms: 0,
                version: 1,
            };
            state
                .owners
                .entry(RESERVED_OWNER.to_string())
                .or_default()
                .insert(name.clone());
            state.entries.insert(name, entry);
        }
        state.digest = Self::compute_digest(&state.entries);
    }

    fn compute_digest(entries: &BTreeMap<String, Entry>) -> Hash32 {
        namespace_digest(entries.values().map(|e| e.content_id.as_str()))
    }

    // Replace-or-insert under the section: owner index reconciliation plus
    // digest recomputation belong to the same critical section as the map.
    fn install(state: &mut NamespaceState, name: &str, entry: Entry) {
        if let Some(old) = state.entries.get(name) {
            let old_owner = old.registration.owner.clone();
            if old_owner != entry.registration.owner {
                if let Some(set) = state.owners.get_mut(&old_owner) {
                    set.remove(name);
                    if set.is_empty() {
                        state.owners.remove(&old_owner);
                    }
                }
            }
        }
        state
            .owners
            .entry(entry.registration.owner.clone())
            .or_default()
            .insert(name.to_string());
        state.entries.insert(name.to_string(), entry);
        state.digest = Self::compute_digest(&state.entries);
    }

    fn remove(state: &mut NamespaceState, name: &str) -> Option<Entry> {
        let entry = state.entries.remove(name)?;
        if let Some(set) = state.owners.get_mut(&entry.registration.owner) {
            set.remove(name);
            if set.is_empty() {
                state.owners.remove(&entry.registration.owner);
            }
        }
        state.digest = Self::compute_digest(&state.entries);
        Some(entry)
    }

    fn manifest_snapshot(state: &NamespaceState) -> ManifestSnapshot {
        state
            .entries
            .iter()
            .filter(|(name, _)| !naming::is_reserved(name))
            .map(|(name, e)| (name.clone(), e.registration.clone(), e.content_id.clone()))
            .collect()
    }

    /// Register or re-register a name. `caller_peer` is the quota subject.
    pub fn register(
        &self,
        reg: Registration,
        caller_peer: &str,
    ) -> Result<MutationReceipt, StoreError> {
        let mut reg = reg;
        reg.name = naming::normalize(&reg.name);
        if naming::is_reserved(&reg.name) {
            return Err(StoreError::Reserved);
        }

        let now = now_ms();
        self.admission
            .validate(&reg, caller_peer, now, SigMode::Canonical)
            .map_err(|e| self.count_admission(e))?;

        let bytes =
            registration_wire_bytes(&reg).map_err(|e| StoreError::BlobIo(e.to_string()))?;
        let content_id = self
            .blobs
            .put(&bytes)
            .map_err(|e| StoreError::BlobIo(e.to_string()))?;

        let (entry, op, digest, snapshot) = {
            let mut state = self.lock_state();
            if let Some(incumbent) = state.entries.get(&reg.name) {
                if reg.timestamp_ms <= incumbent.registration.timestamp_ms {
                    return Err(StoreError::Stale);
                }
            }
            let version = state
                .entries
                .get(&reg.name)
                .map(|e| e.version + 1)
                .unwrap_or(1);
            let op = if version == 1 {
                DeltaOp::Register
            } else {
                DeltaOp::Update
            };
            let entry = Entry {
                last_modified_ms: reg.timestamp_ms,
                version,
                content_id: content_id.clone(),
                registration: reg,
            };
            let name = entry.registration.name.clone();
            Self::install(&mut state, &name, entry.clone());
            self.metrics.entries.set(state.entries.len() as i64);
            (
                entry,
                op,
                digest_hex(&state.digest),
                Self::manifest_snapshot(&state),
            )
        };

        info!(
            name = %entry.registration.name,
            owner = %entry.registration.owner,
            version = entry.version,
            ?op,
            "name registered"
        );
        self.metrics.registrations_total.inc();

        self.persist(snapshot, &digest);
        self.emit(op, entry.clone(), digest);

        Ok(MutationReceipt {
            content_id,
            version: entry.version,
            op,
        })
    }

    /// Resolve a name from local state only.
    pub fn resolve(&self, name: &str) -> ResolveOutcome {
        let name = naming::normalize(name);
        let now = now_ms();
        let state = self.lock_state();
        match state.entries.get(&name) {
            None => ResolveOutcome::NotFound,
            Some(entry) => {
                if now >= entry.registration.expires_ms && !naming::is_reserved(&name) {
                    // The sweep removes it; resolution only reports.
                    ResolveOutcome::Expired
                } else {
                    let ttl_hint = entry
                        .registration
                        .records
                        .iter()
                        .map(|r| r.ttl_seconds)
                        .min()
                        .unwrap_or(DEFAULT_RECORD_TTL_SECS);
                    ResolveOutcome::Found {
                        records: entry.registration.records.clone(),
                        owner: entry.registration.owner.clone(),
                        expires_ms: entry.registration.expires_ms,
                        ttl_hint,
                    }
                }
            }
        }
    }

    /// Transfer a name to a new owner.
    ///
    /// `auth_signature` is the current owner's Ed25519 signature (hex) over
    /// `name:new_owner:auth_timestamp_ms`; the timestamp must be within the
    /// transfer skew tolerance of local time.
    pub fn transfer(
        &self,
        name: &str,
        new_owner: &str,
        auth_signature: &str,
        auth_timestamp_ms: u64,
        caller_peer: &str,
    ) -> Result<MutationReceipt, StoreError> {
        let name = naming::normalize(name);
        if naming::is_reserved(&name) {
            return Err(StoreError::Reserved);
        }
        if self.strict_transfer {
            // Multi-signature transfer is a declared extension point; under
            // strict mode a single signature is not sufficient.
            return Err(StoreError::MultiSigRequired);
        }

        let now = now_ms();
        if now.abs_diff(auth_timestamp_ms) > TRANSFER_AUTH_SKEW_MS {
            return Err(StoreError::Admission(AdmissionError::BadSignature));
        }

        let incumbent = {
            let state = self.lock_state();
            state.entries.get(&name).cloned()
        }
        .ok_or(StoreError::NotFound)?;
        if now >= incumbent.registration.expires_ms {
            return Err(StoreError::Expired);
        }

        let pk = decode_public_key(&incumbent.registration.public_key)?;
        let sig = decode_signature(auth_signature)?;
        let msg = transfer_auth_bytes(&name, new_owner, auth_timestamp_ms);
        verify_ed25519(&pk, &msg, &sig)
            .map_err(|_| StoreError::Admission(AdmissionError::BadSignature))?;

        // The propagated registration must satisfy the PoW predicate for its
        // new owner; at the protocol difficulty this is a few thousand hashes.
        let nonce = mine_pow(
            &name,
            new_owner,
            self.admission.difficulty(),
            u64::MAX,
        )
        .ok_or_else(|| StoreError::Corrupt("proof-of-work search exhausted".into()))?;

        let reg = Registration {
            name: name.clone(),
            owner: new_owner.to_string(),
            records: incumbent.registration.records.clone(),
            timestamp_ms: auth_timestamp_ms,
            expires_ms: auth_timestamp_ms.saturating_add(LEASE_MS),
            nonce,
            signature: auth_signature.to_string(),
            public_key: incumbent.registration.public_key.clone(),
        };
        self.admission
            .validate(&reg, caller_peer, now, SigMode::TransferAuth)
            .map_err(|e| self.count_admission(e))?;

        let bytes =
            registration_wire_bytes(&reg).map_err(|e| StoreError::BlobIo(e.to_string()))?;
        let content_id = self
            .blobs
            .put(&bytes)
            .map_err(|e| StoreError::BlobIo(e.to_string()))?;

        let (entry, digest, snapshot) = {
            let mut state = self.lock_state();
            let Some(current) = state.entries.get(&name) else {
                return Err(StoreError::NotFound);
            };
            if reg.timestamp_ms <= current.registration.timestamp_ms {
                return Err(StoreError::Stale);
            }
            let entry = Entry {
                last_modified_ms: reg.timestamp_ms,
                version: current.version + 1,
                content_id: content_id.clone(),
                registration: reg,
            };
            Self::install(&mut state, &name, entry.clone());
            self.metrics.entries.set(state.entries.len() as i64);
            (
                entry,
                digest_hex(&state.digest),
                Self::manifest_snapshot(&state),
            )
        };

        info!(
            %name,
            new_owner,
            version = entry.version,
            "name transferred"
        );
        self.metrics.transfers_total.inc();

        self.persist(snapshot, &digest);
        self.emit(DeltaOp::Transfer, entry.clone(), digest);

        Ok(MutationReceipt {
            content_id,
            version: entry.version,
            op: DeltaOp::Transfer,
        })
    }

    /// Snapshot of the stored entry for a name, if present.
    pub fn entry(&self, name: &str) -> Option<Entry> {
        let name = naming::normalize(name);
        self.lock_state().entries.get(&name).cloned()
    }

    /// Names currently owned by `owner` (via the reverse index).
    pub fn names_owned_by(&self, owner: &str) -> Vec<String> {
        let state = self.lock_state();
        state
            .owners
            .get(owner)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Current namespace digest.
    pub fn digest(&self) -> Hash32 {
        self.lock_state().digest
    }

    /// Identifier of the most recently persisted manifest, if any.
    pub fn manifest_id(&self) -> Option<ContentId> {
        self.lock_state().manifest_id.clone()
    }

    /// Store status snapshot.
    pub fn status(&self) -> StoreStatus {
        let state = self.lock_state();
        StoreStatus {
            entries: state.entries.len(),
            digest: digest_hex(&state.digest),
            degraded: state.corrupt_skipped > 0,
        }
    }

    /// Apply an inbound delta, charging quota to the delivering peer.
    pub fn apply_delta(&self, delta: &Delta, source_peer: &str) -> ApplyOutcome {
        let outcome = self.apply_delta_inner(delta, source_peer);
        match &outcome {
            ApplyOutcome::Applied { .. } => self.metrics.deltas_applied_total.inc(),
            ApplyOutcome::Rejected(reason) => {
                if matches!(reason, RejectReason::Admission(AdmissionError::RateLimited)) {
                    self.metrics.rate_limited_total.inc();
                }
                self.metrics.deltas_rejected_total.inc();
                debug!(
                    name = %delta.entry.registration.name,
                    op = ?delta.op,
                    %reason,
                    "delta discarded"
                );
            }
        }
        outcome
    }

    fn apply_delta_inner(&self, delta: &Delta, source_peer: &str) -> ApplyOutcome {
        let mut reg = delta.entry.registration.clone();
        reg.name = naming::normalize(&reg.name);
        if naming::is_reserved(&reg.name) {
            return ApplyOutcome::Rejected(RejectReason::Reserved);
        }
        let now = now_ms();

        if delta.op == DeltaOp::Expire {
            return self.apply_expire(delta, &reg.name, now);
        }

        let mode = if delta.op == DeltaOp::Transfer {
            SigMode::TransferAuth
        } else {
            SigMode::Canonical
        };
        if let Err(e) = self.admission.validate(&reg, source_peer, now, mode) {
            return ApplyOutcome::Rejected(RejectReason::Admission(e));
        }

        let Ok(bytes) = registration_wire_bytes(&reg) else {
            return ApplyOutcome::Rejected(RejectReason::Corrupt("encode".into()));
        };
        let content_id = content_id_for(&bytes);
        if content_id != delta.entry.content_id {
            return ApplyOutcome::Rejected(RejectReason::Corrupt(
                "content id does not match registration".into(),
            ));
        }
        if let Err(e) = self.blobs.put(&bytes) {
            return ApplyOutcome::Rejected(RejectReason::BlobIo(e.to_string()));
        }

        let (entry, digest, snapshot) = {
            let mut state = self.lock_state();
            let version = match state.entries.get(&reg.name) {
                Some(incumbent) => {
                    // Last-write-wins: strictly newer replaces; ties keep
                    // the incumbent (first-writer stable, cluster-wide).
                    if reg.timestamp_ms <= incumbent.registration.timestamp_ms {
                        return ApplyOutcome::Rejected(RejectReason::Stale);
                    }
                    delta.entry.version.max(incumbent.version + 1)
                }
                None => delta.entry.version.max(1),
            };
            let entry = Entry {
                last_modified_ms: reg.timestamp_ms,
                version,
                content_id: content_id.clone(),
                registration: reg,
            };
            let name = entry.registration.name.clone();
            Self::install(&mut state, &name, entry.clone());
            self.metrics.entries.set(state.entries.len() as i64);
            (
                entry,
                digest_hex(&state.digest),
                Self::manifest_snapshot(&state),
            )
        };

        info!(
            name = %entry.registration.name,
            owner = %entry.registration.owner,
            version = entry.version,
            op = ?delta.op,
            peer = %source_peer,
            "delta merged"
        );
        self.persist(snapshot, &digest);

        // A transfer *to* this node is re-emitted to aid mesh convergence.
        let reemitted = self
            .local_owner
            .as_deref()
            .is_some_and(|o| o == entry.registration.owner);
        if reemitted {
            self.emit(delta.op, entry, digest);
        }

        ApplyOutcome::Applied {
            op: delta.op,
            reemitted,
        }
    }

    fn apply_expire(&self, delta: &Delta, name: &str, now: u64) -> ApplyOutcome {
        let (digest, snapshot) = {
            let mut state = self.lock_state();
            let Some(incumbent) = state.entries.get(name) else {
                return ApplyOutcome::Rejected(RejectReason::NotFound);
            };
            // A newer registration supersedes the expire claim.
            if incumbent.registration.timestamp_ms > delta.entry.registration.timestamp_ms {
                return ApplyOutcome::Rejected(RejectReason::Stale);
            }
            if now < delta.entry.registration.expires_ms {
                return ApplyOutcome::Rejected(RejectReason::Stale);
            }
            let _ = Self::remove(&mut state, name);
            self.metrics.entries.set(state.entries.len() as i64);
            (
                digest_hex(&state.digest),
                Self::manifest_snapshot(&state),
            )
        };
        info!(%name, "expired entry removed via delta");
        self.persist(snapshot, &digest);
        ApplyOutcome::Applied {
            op: DeltaOp::Expire,
            reemitted: false,
        }
    }

    /// Remove entries past their lease; emits one EXPIRE delta per removal.
    /// Idempotent; runs on a fixed cadence and on demand.
    pub fn sweep_expired(&self) -> usize {
        let now = now_ms();
        let (removed, digest, snapshot) = {
            let mut state = self.lock_state();
            let expired: Vec<String> = state
                .entries
                .iter()
                .filter(|(name, entry)| {
                    !naming::is_reserved(name) && now >= entry.registration.expires_ms
                })
                .map(|(name, _)| name.clone())
                .collect();
            let mut removed = Vec::with_capacity(expired.len());
            for name in &expired {
                if let Some(entry) = Self::remove(&mut state, name) {
                    removed.push(entry);
                }
            }
            self.metrics.entries.set(state.entries.len() as i64);
            (
                removed,
                digest_hex(&state.digest),
                Self::manifest_snapshot(&state),
            )
        };

        if removed.is_empty() {
            return 0;
        }
        for entry in &removed {
            info!(name = %entry.registration.name, "lease expired, entry swept");
        }
        self.metrics.expired_swept_total.inc_by(removed.len() as u64);
        self.persist(snapshot, &digest);
        let count = removed.len();
        for entry in removed {
            self.emit(DeltaOp::Expire, entry, digest.clone());
        }
        count
    }

    /// Rebuild state from the persisted manifest, if one is known.
    ///
    /// Each entry is re-validated offline; corrupted blobs are skipped and
    /// counted, leaving the node degraded but serving. The digest is always
    /// recomputed from scratch, never trusted from the manifest.
    pub fn load_from_manifest(&self) -> Result<usize, StoreError> {
        let head = self
            .blobs
            .manifest_head()
            .map_err(|e| StoreError::BlobIo(e.to_string()))?;
        let Some(head) = head else {
            return Ok(0);
        };

        let bytes = self
            .blobs
            .get(&head)
            .map_err(|e| StoreError::BlobIo(e.to_string()))?;
        let Some(bytes) = bytes else {
            warn!(manifest = %head, "manifest blob missing; starting empty");
            self.lock_state().corrupt_skipped += 1;
            return Ok(0);
        };
        let manifest: Manifest = match serde_json::from_slice(&bytes) {
            Ok(m) => m,
            Err(e) => {
                warn!(manifest = %head, err = %e, "manifest undecodable; starting empty");
                self.lock_state().corrupt_skipped += 1;
                return Ok(0);
            }
        };

        let now = now_ms();
        let mut loaded: Vec<(String, Entry)> = Vec::with_capacity(manifest.entries.len());
        let mut corrupt = 0u64;
        for me in &manifest.entries {
            let name = naming::normalize(&me.name);
            if naming::is_reserved(&name) {
                continue;
            }
            let blob = match self.blobs.get(&me.content_id) {
                Ok(Some(b)) => b,
                Ok(None) => {
                    warn!(%name, content_id = %me.content_id, "entry blob missing; skipped");
                    corrupt += 1;
                    continue;
                }
                Err(e) => return Err(StoreError::BlobIo(e.to_string())),
            };
            if content_id_for(&blob) != me.content_id {
                warn!(%name, "entry blob does not hash to its content id; skipped");
                corrupt += 1;
                continue;
            }
            let reg: Registration = match serde_json::from_slice(&blob) {
                Ok(r) => r,
                Err(_) => {
                    warn!(%name, "entry blob undecodable; skipped");
                    corrupt += 1;
                    continue;
                }
            };
            match self.admission.validate_offline(&reg, now, SigMode::Either) {
                Ok(()) => {}
                Err(AdmissionError::Expired) => {
                    debug!(%name, "persisted entry already expired; dropped");
                    continue;
                }
                Err(e) => {
                    warn!(%name, err = %e, "persisted entry failed re-validation; skipped");
                    corrupt += 1;
                    continue;
                }
            }
            let entry = Entry {
                last_modified_ms: reg.timestamp_ms,
                version: 1,
                content_id: me.content_id.clone(),
                registration: reg,
            };
            loaded.push((name, entry));
        }

        let count = loaded.len();
        {
            let mut state = self.lock_state();
            for (name, entry) in loaded {
                Self::install(&mut state, &name, entry);
            }
            state.manifest_id = Some(head);
            state.corrupt_skipped += corrupt;
            self.metrics.entries.set(state.entries.len() as i64);
        }
        if corrupt > 0 {
            warn!(skipped = corrupt, "namespace degraded after reload");
        }
        info!(entries = count, "namespace restored from manifest");
        Ok(count)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, NamespaceState> {
        // A poisoned lock means a panic mid-section; propagating the panic
        // is preferable to serving a torn namespace.
        self.state.lock().expect("namespace lock poisoned")
    }

    fn count_admission(&self, e: AdmissionError) -> StoreError {
        if e == AdmissionError::RateLimited {
            self.metrics.rate_limited_total.inc();
        }
        StoreError::Admission(e)
    }

    // Persistence runs outside the section: re-put every live non-reserved
    // entry (idempotent, content-addressed), then the manifest, then the
    // well-known head key. Failures here leave memory authoritative; the
    // next mutation retries.
    fn persist(&self, snapshot: ManifestSnapshot, digest: &str) {
        let mut entries = Vec::with_capacity(snapshot.len());
        for (name, reg, content_id) in &snapshot {
            match registration_wire_bytes(reg) {
                Ok(bytes) => {
                    if let Err(e) = self.blobs.put(&bytes) {
                        warn!(%name, err = %e, "entry blob persist failed");
                        return;
                    }
                }
                Err(e) => {
                    warn!(%name, err = %e, "entry blob encode failed");
                    return;
                }
            }
            entries.push(ManifestEntry {
                name: name.clone(),
                content_id: content_id.clone(),
            });
        }
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            digest: digest.to_string(),
            entries,
            saved_ms: now_ms(),
        };
        let bytes = match serde_json::to_vec(&manifest) {
            Ok(b) => b,
            Err(e) => {
                warn!(err = %e, "manifest encode failed");
                return;
            }
        };
        let id = match self.blobs.put(&bytes) {
            Ok(id) => id,
            Err(e) => {
                warn!(err = %e, "manifest persist failed");
                return;
            }
        };
        if let Err(e) = self.blobs.set_manifest_head(&id) {
            warn!(err = %e, "manifest head update failed");
            return;
        }
        self.lock_state().manifest_id = Some(id);
    }

    fn emit(&self, op: DeltaOp, entry: Entry, digest_hex: String) {
        if self
            .outbound
            .send(OutboundDelta {
                op,
                entry,
                digest_hex,
            })
            .is_err()
        {
            debug!("replication worker gone; delta not emitted");
        }
    }
}
