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

//! Registration proof-of-work.
//!
//! The predicate is checked on the *hex* encoding of
//! `SHA-256("{name}:{owner}:{nonce}")`: the string must begin with the
//! configured number of `'0'` digits. Testing the hex string rather than raw
//! bytes keeps independent implementations interoperable at odd difficulties.

use ring::digest;

/// Hex SHA-256 of the PoW preimage `name:owner:nonce`.
pub fn pow_hash_hex(name: &str, owner: &str, nonce: &str) -> String {
    let preimage = format!("{name}:{owner}:{nonce}");
    let d = digest::digest(&digest::SHA256, preimage.as_bytes());
    hex::encode(d.as_ref())
}

/// Whether the nonce satisfies the difficulty for `(name, owner)`.
pub fn verify_pow(name: &str, owner: &str, nonce: &str, difficulty: usize) -> bool {
    let hash = pow_hash_hex(name, owner, nonce);
    hash.bytes().take(difficulty).filter(|b| *b == b'0').count() == difficulty
}

/// Grind a nonce for `(name, owner)` at the given difficulty.
///
/// Nonces are decimal counters; at difficulty 3 this averages ~4096 hashes.
/// Returns `None` only when `max_iters` is exhausted.
pub fn mine_pow(name: &str, owner: &str, difficulty: usize, max_iters: u64) -> Option<String> {
    for i in 0..max_iters {
        let nonce = i.to_string();
        if verify_pow(name, owner, &nonce, difficulty) {
            return Some(nonce);
        }
    }
    None
}
