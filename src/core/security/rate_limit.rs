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

//! Per-peer sliding-window rate limiting.
//!
//! `check` is a read-only peek; `commit` records an accepted attempt. The
//! split lets the admission pipeline refuse over-quota peers up front while
//! charging quota only for registrations that pass every other check, so
//! malformed traffic cannot exhaust an honest peer's allowance.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// Sliding-window attempt counter keyed by peer id.
pub struct SlidingWindowLimiter {
    limit: usize,
    window_ms: u64,
    max_peers: usize,
    peers: Mutex<BTreeMap<String, VecDeque<u64>>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter allowing `limit` accepted attempts per `window_ms`,
    /// tracking at most `max_peers` peers (oldest evicted beyond that).
    pub fn new(limit: usize, window_ms: u64, max_peers: usize) -> Self {
        Self {
            limit,
            window_ms,
            max_peers,
            peers: Mutex::new(BTreeMap::new()),
        }
    }

    fn prune(window_ms: u64, attempts: &mut VecDeque<u64>, now_ms: u64) {
        let floor = now_ms.saturating_sub(window_ms);
        while let Some(&front) = attempts.front() {
            if front <= floor {
                attempts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Whether the peer has quota left at `now_ms`. Does not record anything.
    pub fn check(&self, peer: &str, now_ms: u64) -> bool {
        let mut peers = match self.peers.lock() {
            Ok(g) => g,
            Err(_) => return false,
        };
        match peers.get_mut(peer) {
            Some(attempts) => {
                Self::prune(self.window_ms, attempts, now_ms);
                attempts.len() < self.limit
            }
            None => true,
        }
    }

    /// Record an accepted attempt for the peer.
    pub fn commit(&self, peer: &str, now_ms: u64) {
        let Ok(mut peers) = self.peers.lock() else {
            return;
        };
        if !peers.contains_key(peer) && peers.len() >= self.max_peers {
            Self::evict_stalest(&mut peers);
        }
        let attempts = peers.entry(peer.to_string()).or_default();
        Self::prune(self.window_ms, attempts, now_ms);
        attempts.push_back(now_ms);
    }

    // Evict the peer whose newest attempt is oldest.
    fn evict_stalest(peers: &mut BTreeMap<String, VecDeque<u64>>) {
        let victim = peers
            .iter()
            .min_by_key(|(_, attempts)| attempts.back().copied().unwrap_or(0))
            .map(|(peer, _)| peer.clone());
        if let Some(victim) = victim {
            peers.remove(&victim);
        }
    }

    /// Number of peers currently tracked (stale entries pruned lazily).
    pub fn tracked_peers(&self) -> usize {
        self.peers.lock().map(|g| g.len()).unwrap_or(0)
    }
}
