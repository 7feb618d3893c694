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
#![deny(missing_docs)]

//! Admission: every mutation, local or remote, passes through here.
//!
//! Check order: rate-limit peek, structural bounds, proof-of-work,
//! signature, stake hook. The rate limiter commits only on the final `Ok`,
//! after every other check has passed.

use thiserror::Error;

use crate::core::config::{
    LEASE_MS, LEASE_TOLERANCE_MS, MAX_RECORDS_PER_NAME, POW_DIFFICULTY, RATE_LIMIT_MAX_ATTEMPTS,
    RATE_LIMIT_MAX_PEERS, RATE_LIMIT_WINDOW_MS,
};
use crate::core::naming;
use crate::core::security::keystore::verify_ed25519;
use crate::core::security::pow::verify_pow;
use crate::core::security::rate_limit::SlidingWindowLimiter;
use crate::core::types::{canonical_sign_bytes, transfer_auth_bytes, Registration, Signature};

/// Admission failures. None of these mutate store state.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    /// Peer exceeded its mutation quota.
    #[error("rate limited")]
    RateLimited,
    /// Name grammar violation.
    #[error("invalid name: {0}")]
    InvalidName(String),
    /// Record count exceeds the per-name bound.
    #[error("too many records")]
    TooManyRecords,
    /// `expires - timestamp` outside the lease tolerance.
    #[error("lease out of range")]
    LeaseOutOfRange,
    /// Registration already past its lease.
    #[error("registration expired")]
    Expired,
    /// Proof-of-work predicate failed.
    #[error("bad proof of work")]
    BadProofOfWork,
    /// Signature does not verify over the canonical payload.
    #[error("bad signature")]
    BadSignature,
    /// Public key absent or malformed.
    #[error("missing public key")]
    MissingKey,
}

/// Which payload the registration's signature covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SigMode {
    /// Canonical signing form (register / update).
    Canonical,
    /// Transfer tuple `name:new_owner:timestamp` under the previous
    /// owner's key (transfer deltas).
    TransferAuth,
    /// Accept either form (manifest reload, where the originating op is
    /// no longer known).
    Either,
}

/// Admission pipeline state.
pub struct Admission {
    limiter: SlidingWindowLimiter,
    difficulty: usize,
}

impl Default for Admission {
    fn default() -> Self {
        Self::new(POW_DIFFICULTY)
    }
}

impl Admission {
    /// Create with the protocol rate-limit window and a PoW difficulty.
    pub fn new(difficulty: usize) -> Self {
        Self {
            limiter: SlidingWindowLimiter::new(
                RATE_LIMIT_MAX_ATTEMPTS,
                RATE_LIMIT_WINDOW_MS,
                RATE_LIMIT_MAX_PEERS,
            ),
            difficulty,
        }
    }

    /// Configured proof-of-work difficulty.
    pub fn difficulty(&self) -> usize {
        self.difficulty
    }

    /// Validate a registration attributed to `source_peer`, charging the
    /// peer's quota on success.
    pub fn validate(
        &self,
        reg: &Registration,
        source_peer: &str,
        now_ms: u64,
        mode: SigMode,
    ) -> Result<(), AdmissionError> {
        if !self.limiter.check(source_peer, now_ms) {
            return Err(AdmissionError::RateLimited);
        }
        self.check_structural(reg, now_ms)?;
        self.check_pow(reg)?;
        self.check_signature(reg, mode)?;
        self.stake_check(reg)?;
        self.limiter.commit(source_peer, now_ms);
        Ok(())
    }

    /// Validate without touching the rate limiter. Used when rebuilding the
    /// namespace from a manifest, which must not spend local quota.
    pub fn validate_offline(
        &self,
        reg: &Registration,
        now_ms: u64,
        mode: SigMode,
    ) -> Result<(), AdmissionError> {
        self.check_structural(reg, now_ms)?;
        self.check_pow(reg)?;
        self.check_signature(reg, mode)?;
        self.stake_check(reg)
    }

    fn check_structural(&self, reg: &Registration, now_ms: u64) -> Result<(), AdmissionError> {
        naming::validate(&reg.name).map_err(|e| AdmissionError::InvalidName(e.to_string()))?;
        if reg.records.len() > MAX_RECORDS_PER_NAME {
            return Err(AdmissionError::TooManyRecords);
        }
        let lease = reg.expires_ms.saturating_sub(reg.timestamp_ms);
        if lease < LEASE_MS.saturating_sub(LEASE_TOLERANCE_MS)
            || lease > LEASE_MS.saturating_add(LEASE_TOLERANCE_MS)
        {
            return Err(AdmissionError::LeaseOutOfRange);
        }
        if now_ms >= reg.expires_ms {
            return Err(AdmissionError::Expired);
        }
        Ok(())
    }

    fn check_pow(&self, reg: &Registration) -> Result<(), AdmissionError> {
        if verify_pow(&reg.name, &reg.owner, &reg.nonce, self.difficulty) {
            Ok(())
        } else {
            Err(AdmissionError::BadProofOfWork)
        }
    }

    fn check_signature(&self, reg: &Registration, mode: SigMode) -> Result<(), AdmissionError> {
        let pk = decode_public_key(&reg.public_key)?;
        let sig = decode_signature(&reg.signature)?;

        let canonical = || -> Result<(), AdmissionError> {
            let msg = canonical_sign_bytes(reg).map_err(|_| AdmissionError::BadSignature)?;
            verify_ed25519(&pk, &msg, &sig).map_err(|_| AdmissionError::BadSignature)
        };
        let transfer = || -> Result<(), AdmissionError> {
            let msg = transfer_auth_bytes(&reg.name, &reg.owner, reg.timestamp_ms);
            verify_ed25519(&pk, &msg, &sig).map_err(|_| AdmissionError::BadSignature)
        };

        match mode {
            SigMode::Canonical => canonical(),
            SigMode::TransferAuth => transfer(),
            SigMode::Either => canonical().or_else(|_| transfer()),
        }
    }

    // Stake hook: declared for a future settlement layer, always Ok.
    fn stake_check(&self, _reg: &Registration) -> Result<(), AdmissionError> {
        Ok(())
    }
}

/// Decode a hex Ed25519 public key (32 bytes).
pub fn decode_public_key(hex_pk: &str) -> Result<[u8; 32], AdmissionError> {
    if hex_pk.is_empty() {
        return Err(AdmissionError::MissingKey);
    }
    let bytes = hex::decode(hex_pk).map_err(|_| AdmissionError::MissingKey)?;
    if bytes.len() != 32 {
        return Err(AdmissionError::MissingKey);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Decode a hex Ed25519 signature (64 bytes).
pub fn decode_signature(hex_sig: &str) -> Result<Signature, AdmissionError> {
    if hex_sig.is_empty() {
        return Err(AdmissionError::BadSignature);
    }
    let bytes = hex::decode(hex_sig).map_err(|_| AdmissionError::BadSignature)?;
    if bytes.len() != 64 {
        return Err(AdmissionError::BadSignature);
    }
    Ok(Signature(bytes))
}
