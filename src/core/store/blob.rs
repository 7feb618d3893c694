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

//! Content-addressed blob storage.
//!
//! The content identifier is the hex SHA-256 of the stored bytes; `put` must
//! return exactly that identifier for those bytes, so concurrent writers of
//! the same payload are safe and identifiers can be recomputed without a
//! store round-trip. The store also keeps a single `manifest_head` meta key,
//! the well-known discovery point for the persistence manifest.

use ring::digest;
use std::collections::BTreeMap;
use std::sync::Mutex;
use thiserror::Error;

/// Stable content identifier (hex SHA-256 of the bytes).
pub type ContentId = String;

/// Blob store errors.
#[derive(Debug, Error)]
pub enum BlobError {
    /// Underlying storage failure; mutations abort before in-memory changes.
    #[error("blob io: {0}")]
    Io(String),
}

/// Content identifier for the given bytes, with or without storing them.
pub fn content_id_for(bytes: &[u8]) -> ContentId {
    let d = digest::digest(&digest::SHA256, bytes);
    hex::encode(d.as_ref())
}

/// Opaque byte storage keyed by content identifier.
pub trait BlobStore: Send + Sync {
    /// Store bytes, returning their content identifier.
    fn put(&self, bytes: &[u8]) -> Result<ContentId, BlobError>;
    /// Fetch bytes by identifier.
    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, BlobError>;
    /// Remember the current manifest identifier under the well-known key.
    fn set_manifest_head(&self, id: &str) -> Result<(), BlobError>;
    /// Read the manifest identifier, if one was ever written.
    fn manifest_head(&self) -> Result<Option<ContentId>, BlobError>;
}

const META_MANIFEST_HEAD: &[u8] = b"manifest_head";

/// Sled-backed blob store (directory of content-addressed values).
#[derive(Clone)]
pub struct SledBlobStore {
    blobs: sled::Tree,
    meta: sled::Tree,
}

impl SledBlobStore {
    /// Open (or create) the store under `path`.
    pub fn open(path: &str) -> Result<Self, BlobError> {
        let db = sled::open(path).map_err(|e| BlobError::Io(e.to_string()))?;
        let blobs = db
            .open_tree("blobs")
            .map_err(|e| BlobError::Io(e.to_string()))?;
        let meta = db
            .open_tree("meta")
            .map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(Self { blobs, meta })
    }
}

impl BlobStore for SledBlobStore {
    fn put(&self, bytes: &[u8]) -> Result<ContentId, BlobError> {
        let id = content_id_for(bytes);
        self.blobs
            .insert(id.as_bytes(), bytes)
            .map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, BlobError> {
        let v = self
            .blobs
            .get(id.as_bytes())
            .map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(v.map(|iv| iv.to_vec()))
    }

    fn set_manifest_head(&self, id: &str) -> Result<(), BlobError> {
        self.meta
            .insert(META_MANIFEST_HEAD, id.as_bytes())
            .map_err(|e| BlobError::Io(e.to_string()))?;
        self.meta
            .flush()
            .map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(())
    }

    fn manifest_head(&self) -> Result<Option<ContentId>, BlobError> {
        let v = self
            .meta
            .get(META_MANIFEST_HEAD)
            .map_err(|e| BlobError::Io(e.to_string()))?;
        Ok(v.map(|iv| String::from_utf8_lossy(&iv).into_owned()))
    }
}

/// In-memory blob store for tests and ephemeral nodes.
#[derive(Default)]
pub struct MemoryBlobStore {
    inner: Mutex<BTreeMap<ContentId, Vec<u8>>>,
    head: Mutex<Option<ContentId>>,
}

impl MemoryBlobStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl BlobStore for MemoryBlobStore {
    fn put(&self, bytes: &[u8]) -> Result<ContentId, BlobError> {
        let id = content_id_for(bytes);
        self.inner
            .lock()
            .map_err(|_| BlobError::Io("poisoned".into()))?
            .insert(id.clone(), bytes.to_vec());
        Ok(id)
    }

    fn get(&self, id: &str) -> Result<Option<Vec<u8>>, BlobError> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| BlobError::Io("poisoned".into()))?
            .get(id)
            .cloned())
    }

    fn set_manifest_head(&self, id: &str) -> Result<(), BlobError> {
        *self
            .head
            .lock()
            .map_err(|_| BlobError::Io("poisoned".into()))? = Some(id.to_string());
        Ok(())
    }

    fn manifest_head(&self) -> Result<Option<ContentId>, BlobError> {
        Ok(self
            .head
            .lock()
            .map_err(|_| BlobError::Io("poisoned".into()))?
            .clone())
    }
}
