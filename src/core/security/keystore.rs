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

//! Owner keystore: the Ed25519 identity that signs registrations and
//! transfer authorizations.
//!
//! Key material lives at `<data_dir>/owner.key`. Plaintext keys are raw
//! PKCS#8; when `VNS_KEY_PASSPHRASE` is set, new keys are written *sealed*:
//! a JSON envelope `{v, kdf, iters, salt, nonce, sealed}` whose payload is
//! AES-256-GCM over the PKCS#8 bytes, keyed by PBKDF2-HMAC-SHA256 with the
//! iteration count recorded in the envelope. Recording `iters` in the file
//! means an operator can raise `VNS_PBKDF2_ITERS` for future keys without
//! locking themselves out of existing ones. The two on-disk forms are told
//! apart by shape: DER starts with 0x30, the envelope with `{`.
//!
//! Every signature is recorded in `<data_dir>/audit.log` as one JSON line
//! carrying the action (`register` of a name, `transfer` of a name to a new
//! owner) and the SHA-256 of the signed payload, never the payload itself.
//! A token-bucket signing budget bounds how fast the key can be exercised.
//!
//! All secret files in this crate (owner key, gossip identity) go through
//! [`write_secret`]: created 0600, written to a sibling temp file, fsynced,
//! renamed over the target.

use ring::{
    aead, pbkdf2,
    rand::{SecureRandom, SystemRandom},
    signature::{Ed25519KeyPair, KeyPair, UnparsedPublicKey, ED25519},
};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    io::Write,
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::Mutex,
    time::Instant,
};
use thiserror::Error;
use zeroize::Zeroizing;

use crate::core::types::{now_ms, Signature};

const OWNER_KEY_FILE: &str = "owner.key";
const AUDIT_FILE: &str = "audit.log";
const AUDIT_ROLLOVER_BYTES: u64 = 16 * 1024 * 1024;

const SEAL_VERSION: u32 = 1;
const SEAL_KDF: &str = "pbkdf2-sha256";
const SEAL_AAD: &[u8] = b"vns-owner-seal-v1";
const SEAL_SALT_LEN: usize = 16;
const SEAL_NONCE_LEN: usize = 12;
const SEAL_ITERS_DEFAULT: u32 = 100_000;
const SEAL_ITERS_MIN: u32 = 10_000;
const SEAL_ITERS_MAX: u32 = 10_000_000;

// Signing budget: burst headroom for CLI bursts, steady refill well above
// anything the rate-limited admission path can demand.
const SIGN_BURST: u32 = 64;
const SIGN_REFILL_PER_SEC: u32 = 16;

/// Keystore errors.
#[derive(Debug, Error)]
pub enum KeystoreError {
    /// Underlying filesystem operation failed.
    #[error("keystore io: {0}")]
    Io(String),
    /// Key material on disk could not be parsed.
    #[error("malformed key material")]
    InvalidKey,
    /// Key is sealed and no passphrase was provided to unseal it.
    #[error("key is sealed; set VNS_KEY_PASSPHRASE")]
    SealedKey,
    /// Sealing or unsealing the key material failed.
    #[error("seal failure")]
    Seal,
    /// Signing budget exhausted; caller must wait for refill.
    #[error("signing budget exhausted")]
    Budget,
    /// Signature verification failed.
    #[error("bad signature")]
    BadSignature,
}

fn io_err(e: std::io::Error) -> KeystoreError {
    KeystoreError::Io(e.to_string())
}

/// What a signature was produced for; one audit line per signature.
#[derive(Debug, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AuditAction<'a> {
    /// A registration of `name` was signed.
    Register {
        /// Normalized name being registered.
        name: &'a str,
    },
    /// A transfer of `name` to `new_owner` was authorized.
    Transfer {
        /// Normalized name being transferred.
        name: &'a str,
        /// Fingerprint of the receiving owner.
        new_owner: &'a str,
    },
}

#[derive(Serialize)]
struct AuditLine<'a> {
    ts: u64,
    #[serde(flatten)]
    action: &'a AuditAction<'a>,
    payload_sha256: String,
}

// Sealed owner.key envelope. Hex throughout so the file stays greppable.
#[derive(Serialize, Deserialize)]
struct SealedKey {
    v: u32,
    kdf: String,
    iters: u32,
    salt: String,
    nonce: String,
    sealed: String,
}

/// Write secret material atomically: parent directories created, the file
/// opened 0600 from the start, contents fsynced to a sibling temp file and
/// renamed over the target.
pub fn write_secret(path: &Path, bytes: &[u8]) -> Result<(), KeystoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let tmp = path.with_extension("partial");
    {
        let mut opts = fs::OpenOptions::new();
        opts.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            opts.mode(0o600);
        }
        let mut f = opts.open(&tmp).map_err(io_err)?;
        f.write_all(bytes).map_err(io_err)?;
        f.sync_all().map_err(io_err)?;
    }
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

fn passphrase_from_env() -> Option<String> {
    std::env::var("VNS_KEY_PASSPHRASE")
        .ok()
        .filter(|p| !p.trim().is_empty())
}

fn seal_iters() -> u32 {
    std::env::var("VNS_PBKDF2_ITERS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .map(|n| n.clamp(SEAL_ITERS_MIN, SEAL_ITERS_MAX))
        .unwrap_or(SEAL_ITERS_DEFAULT)
}

fn derive_seal_key(passphrase: &str, salt: &[u8], iters: u32) -> Zeroizing<[u8; 32]> {
    let iters = NonZeroU32::new(iters.clamp(SEAL_ITERS_MIN, SEAL_ITERS_MAX))
        .unwrap_or_else(|| NonZeroU32::new(SEAL_ITERS_DEFAULT).expect("nonzero"));
    let mut out = Zeroizing::new([0u8; 32]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iters,
        salt,
        passphrase.as_bytes(),
        &mut *out,
    );
    out
}

fn seal_key(passphrase: &str, pkcs8: &[u8]) -> Result<SealedKey, KeystoreError> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SEAL_SALT_LEN];
    rng.fill(&mut salt).map_err(|_| KeystoreError::Seal)?;
    let mut nonce = [0u8; SEAL_NONCE_LEN];
    rng.fill(&mut nonce).map_err(|_| KeystoreError::Seal)?;

    let iters = seal_iters();
    let key = derive_seal_key(passphrase, &salt, iters);
    let unbound =
        aead::UnboundKey::new(&aead::AES_256_GCM, &key[..]).map_err(|_| KeystoreError::Seal)?;

    // In-place: the plaintext copy is overwritten by the ciphertext.
    let mut buf = pkcs8.to_vec();
    aead::LessSafeKey::new(unbound)
        .seal_in_place_append_tag(
            aead::Nonce::assume_unique_for_key(nonce),
            aead::Aad::from(SEAL_AAD),
            &mut buf,
        )
        .map_err(|_| KeystoreError::Seal)?;

    Ok(SealedKey {
        v: SEAL_VERSION,
        kdf: SEAL_KDF.to_string(),
        iters,
        salt: hex::encode(salt),
        nonce: hex::encode(nonce),
        sealed: hex::encode(&buf),
    })
}

fn unseal_key(passphrase: &str, envelope: &SealedKey) -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
    if envelope.v != SEAL_VERSION || envelope.kdf != SEAL_KDF {
        return Err(KeystoreError::InvalidKey);
    }
    let salt = hex::decode(&envelope.salt).map_err(|_| KeystoreError::InvalidKey)?;
    let nonce: [u8; SEAL_NONCE_LEN] = hex::decode(&envelope.nonce)
        .map_err(|_| KeystoreError::InvalidKey)?
        .try_into()
        .map_err(|_| KeystoreError::InvalidKey)?;
    let mut buf = hex::decode(&envelope.sealed).map_err(|_| KeystoreError::InvalidKey)?;

    let key = derive_seal_key(passphrase, &salt, envelope.iters);
    let unbound =
        aead::UnboundKey::new(&aead::AES_256_GCM, &key[..]).map_err(|_| KeystoreError::Seal)?;
    let plain = aead::LessSafeKey::new(unbound)
        .open_in_place(
            aead::Nonce::assume_unique_for_key(nonce),
            aead::Aad::from(SEAL_AAD),
            &mut buf,
        )
        .map_err(|_| KeystoreError::Seal)?;
    Ok(Zeroizing::new(plain.to_vec()))
}

fn load_or_create_owner_key(path: &Path) -> Result<Ed25519KeyPair, KeystoreError> {
    match fs::read(path) {
        Ok(bytes) => {
            if let Ok(envelope) = serde_json::from_slice::<SealedKey>(&bytes) {
                let pass = passphrase_from_env().ok_or(KeystoreError::SealedKey)?;
                let pkcs8 = unseal_key(&pass, &envelope)?;
                Ed25519KeyPair::from_pkcs8(&pkcs8).map_err(|_| KeystoreError::InvalidKey)
            } else {
                Ed25519KeyPair::from_pkcs8(&bytes).map_err(|_| KeystoreError::InvalidKey)
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let rng = SystemRandom::new();
            let pkcs8 =
                Ed25519KeyPair::generate_pkcs8(&rng).map_err(|_| KeystoreError::Seal)?;
            let on_disk = match passphrase_from_env().as_deref() {
                Some(pass) => serde_json::to_vec(&seal_key(pass, pkcs8.as_ref())?)
                    .map_err(|_| KeystoreError::Seal)?,
                None => pkcs8.as_ref().to_vec(),
            };
            write_secret(path, &on_disk)?;
            Ed25519KeyPair::from_pkcs8(pkcs8.as_ref()).map_err(|_| KeystoreError::InvalidKey)
        }
        Err(e) => Err(io_err(e)),
    }
}

// Token bucket over monotonic time.
struct SignBudget {
    tokens: u32,
    last_refill: Instant,
}

impl SignBudget {
    fn new() -> Self {
        Self {
            tokens: SIGN_BURST,
            last_refill: Instant::now(),
        }
    }

    fn take(&mut self) -> bool {
        let elapsed_ms = self.last_refill.elapsed().as_millis();
        let refill = elapsed_ms.saturating_mul(SIGN_REFILL_PER_SEC as u128) / 1000;
        if refill > 0 {
            self.tokens = self
                .tokens
                .saturating_add(refill.min(SIGN_BURST as u128) as u32)
                .min(SIGN_BURST);
            self.last_refill = Instant::now();
        }
        if self.tokens == 0 {
            return false;
        }
        self.tokens -= 1;
        true
    }
}

/// The node's owner identity.
pub struct Keystore {
    keypair: Ed25519KeyPair,
    budget: Mutex<SignBudget>,
    audit_path: PathBuf,
}

impl Keystore {
    /// Load (or create) the owner key under `data_dir`; the audit log is
    /// written next to it.
    pub fn open(data_dir: &str) -> Result<Self, KeystoreError> {
        let dir = PathBuf::from(data_dir);
        let keypair = load_or_create_owner_key(&dir.join(OWNER_KEY_FILE))?;
        Ok(Self {
            keypair,
            budget: Mutex::new(SignBudget::new()),
            audit_path: dir.join(AUDIT_FILE),
        })
    }

    /// Public key bytes (Ed25519, 32 bytes).
    pub fn public_key(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out.copy_from_slice(self.keypair.public_key().as_ref());
        out
    }

    /// Owner fingerprint of this identity.
    pub fn owner_fingerprint(&self) -> String {
        fingerprint_of(&self.public_key())
    }

    /// Sign `msg`, debiting the signing budget and appending an audit line.
    pub fn sign(&self, action: AuditAction<'_>, msg: &[u8]) -> Result<Signature, KeystoreError> {
        {
            let mut budget = self.budget.lock().map_err(|_| KeystoreError::Budget)?;
            if !budget.take() {
                return Err(KeystoreError::Budget);
            }
        }
        self.append_audit(&action, msg);
        Ok(Signature(self.keypair.sign(msg).as_ref().to_vec()))
    }

    // Best-effort: a full disk must not block signing.
    fn append_audit(&self, action: &AuditAction<'_>, payload: &[u8]) {
        let digest = ring::digest::digest(&ring::digest::SHA256, payload);
        let line = AuditLine {
            ts: now_ms(),
            action,
            payload_sha256: hex::encode(digest.as_ref()),
        };
        let Ok(mut json) = serde_json::to_vec(&line) else {
            return;
        };
        json.push(b'\n');

        self.roll_audit_if_oversized();
        let _ = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_path)
            .and_then(|mut f| f.write_all(&json));
    }

    // One previous generation is enough for an operator postmortem.
    fn roll_audit_if_oversized(&self) {
        let Ok(md) = fs::metadata(&self.audit_path) else {
            return;
        };
        if md.len() >= AUDIT_ROLLOVER_BYTES {
            let _ = fs::rename(&self.audit_path, self.audit_path.with_extension("log.old"));
        }
    }
}

/// Owner fingerprint for raw public key bytes: bs58 of SHA-256.
pub fn fingerprint_of(pk_bytes: &[u8; 32]) -> String {
    let d = ring::digest::digest(&ring::digest::SHA256, pk_bytes);
    bs58::encode(d.as_ref()).into_string()
}

/// Verify a detached Ed25519 signature under raw public key bytes.
pub fn verify_ed25519(
    pk_bytes: &[u8; 32],
    msg: &[u8],
    sig: &Signature,
) -> Result<(), KeystoreError> {
    if sig.0.len() != 64 {
        return Err(KeystoreError::BadSignature);
    }
    UnparsedPublicKey::new(&ED25519, pk_bytes)
        .verify(msg, &sig.0)
        .map_err(|_| KeystoreError::BadSignature)
}
