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

use prometheus::{IntCounter, IntGauge, Registry};
use thiserror::Error;

/// Metrics errors.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus")]
    Prom,
}

/// Metrics container.
#[derive(Clone)]
pub struct Metrics {
    /// Registry.
    pub registry: Registry,

    /// Live namespace entries gauge (reserved included).
    pub entries: IntGauge,
    /// Connected gossip peers gauge.
    pub p2p_peers: IntGauge,
    /// Pending outbound deltas in the offline queue.
    pub delta_queue_depth: IntGauge,

    /// Accepted local registrations (register + update).
    pub registrations_total: IntCounter,
    /// Accepted ownership transfers.
    pub transfers_total: IntCounter,
    /// Entries removed by the expiry sweep.
    pub expired_swept_total: IntCounter,
    /// Inbound deltas merged.
    pub deltas_applied_total: IntCounter,
    /// Inbound deltas discarded.
    pub deltas_rejected_total: IntCounter,
    /// Deltas dropped from a full offline queue.
    pub queue_dropped_total: IntCounter,
    /// Mutations refused by the per-peer rate limit.
    pub rate_limited_total: IntCounter,
    /// Undecodable wire payloads.
    pub invalid_delta_total: IntCounter,
}

impl Metrics {
    /// Create and register metrics.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let entries = IntGauge::new("vns_entries", "Live namespace entries")
            .map_err(|_| MetricsError::Prom)?;
        let p2p_peers =
            IntGauge::new("vns_p2p_peers", "Connected gossip peers").map_err(|_| MetricsError::Prom)?;
        let delta_queue_depth = IntGauge::new("vns_delta_queue_depth", "Queued outbound deltas")
            .map_err(|_| MetricsError::Prom)?;

        let registrations_total =
            IntCounter::new("vns_registrations_total", "Accepted local registrations")
                .map_err(|_| MetricsError::Prom)?;
        let transfers_total = IntCounter::new("vns_transfers_total", "Accepted ownership transfers")
            .map_err(|_| MetricsError::Prom)?;
        let expired_swept_total =
            IntCounter::new("vns_expired_swept_total", "Entries removed by expiry sweep")
                .map_err(|_| MetricsError::Prom)?;
        let deltas_applied_total =
            IntCounter::new("vns_deltas_applied_total", "Inbound deltas merged")
                .map_err(|_| MetricsError::Prom)?;
        let deltas_rejected_total =
            IntCounter::new("vns_deltas_rejected_total", "Inbound deltas discarded")
                .map_err(|_| MetricsError::Prom)?;
        let queue_dropped_total =
            IntCounter::new("vns_delta_queue_dropped_total", "Deltas dropped from full queue")
                .map_err(|_| MetricsError::Prom)?;
        let rate_limited_total =
            IntCounter::new("vns_rate_limited_total", "Rate-limited mutations")
                .map_err(|_| MetricsError::Prom)?;
        let invalid_delta_total =
            IntCounter::new("vns_invalid_delta_total", "Undecodable wire payloads")
                .map_err(|_| MetricsError::Prom)?;

        registry
            .register(Box::new(entries.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(p2p_peers.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(delta_queue_depth.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(registrations_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(transfers_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(expired_swept_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(deltas_applied_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(deltas_rejected_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(queue_dropped_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(rate_limited_total.clone()))
            .map_err(|_| MetricsError::Prom)?;
        registry
            .register(Box::new(invalid_delta_total.clone()))
            .map_err(|_| MetricsError::Prom)?;

        Ok(Self {
            registry,
            entries,
            p2p_peers,
            delta_queue_depth,
            registrations_total,
            transfers_total,
            expired_swept_total,
            deltas_applied_total,
            deltas_rejected_total,
            queue_dropped_total,
            rate_limited_total,
            invalid_delta_total,
        })
    }
}
