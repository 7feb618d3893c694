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

//! The transport seam between the replicator and the outside world.
//!
//! Implementations deliver inbound `(delta, source_peer)` pairs on an mpsc
//! channel handed over at construction; delivery is at-least-once and
//! duplicates are tolerated (the store's LWW rule makes application
//! idempotent).

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::core::types::Delta;

/// Transport failures.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No peer reachable; the delta should be queued for replay.
    #[error("transport unavailable")]
    Unavailable,
    /// Publish attempt failed.
    #[error("publish failed: {0}")]
    Failed(String),
}

/// Inbound delta stream: `(delta, delivering_peer)`.
pub type InboundRx = mpsc::Receiver<(Delta, String)>;
/// Sender half handed to transports (and the HTTP `/push-delta` route).
pub type InboundTx = mpsc::Sender<(Delta, String)>;

/// Outbound delta publication plus an availability signal.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish a delta to peers.
    async fn publish(&self, delta: &Delta) -> Result<(), TransportError>;

    /// Availability watch; a flip to `true` triggers a queue drain.
    fn availability(&self) -> watch::Receiver<bool>;
}
