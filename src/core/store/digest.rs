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

//! Namespace digest: `SHA-256(sort(content_id).join(":"))` over all live
//! entries. A flat fingerprint for convergence checks, not a Merkle tree;
//! the wire carries it as a single hex string, which stays forward
//! compatible should inclusion proofs ever require a real tree.

use ring::digest;

/// 32-byte hash.
pub type Hash32 = [u8; 32];

/// Compute the namespace digest over the given content identifiers.
pub fn namespace_digest<I, S>(content_ids: I) -> Hash32
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut ids: Vec<String> = content_ids
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect();
    ids.sort();
    let joined = ids.join(":");
    let d = digest::digest(&digest::SHA256, joined.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(d.as_ref());
    out
}

/// Hex encoding of a digest.
pub fn digest_hex(h: &Hash32) -> String {
    hex::encode(h)
}
