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

//! The replication worker: binds store mutations to the transport and feeds
//! inbound deltas back into the store.
//!
//! One task owns the transport handle and the bounded offline queue. The
//! store hands it `(op, entry, digest)` on a channel, which keeps store and
//! transport free of reentrancy; a delta that cannot be published is queued
//! (drop-oldest beyond capacity) and replayed in FIFO order when the
//! transport signals availability. A drain failure re-enqueues the offending
//! delta at the tail and stops until the next availability event.

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::core::store::namespace::{ApplyOutcome, NamespaceStore, OutboundDelta};
use crate::core::types::{now_ms, Delta};
use crate::monitoring::metrics::Metrics;
use crate::networking::transport::{InboundRx, Transport};

/// Bounded FIFO of deltas awaiting a reachable transport.
pub struct DeltaQueue {
    capacity: usize,
    inner: VecDeque<Delta>,
}

impl DeltaQueue {
    /// Empty queue with the given capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: VecDeque::new(),
        }
    }

    /// Append a delta, dropping the oldest when full. Returns the dropped
    /// delta, if any.
    pub fn push(&mut self, delta: Delta) -> Option<Delta> {
        let dropped = if self.inner.len() >= self.capacity {
            self.inner.pop_front()
        } else {
            None
        };
        self.inner.push_back(delta);
        dropped
    }

    /// Pop the oldest delta.
    pub fn pop(&mut self) -> Option<Delta> {
        self.inner.pop_front()
    }

    /// Queued delta count.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Replication worker configuration.
pub struct ReplicatorConfig {
    /// This node's peer id, stamped into emitted deltas and used to drop
    /// self-origin inbound traffic.
    pub local_peer: String,
    /// Offline queue capacity.
    pub queue_capacity: usize,
}

/// Spawn the replication worker.
pub fn spawn_replicator(
    cfg: ReplicatorConfig,
    transport: Arc<dyn Transport>,
    store: Arc<NamespaceStore>,
    mut outbound_rx: mpsc::UnboundedReceiver<OutboundDelta>,
    mut inbound_rx: InboundRx,
    metrics: Arc<Metrics>,
) -> JoinHandle<()> {
    let mut availability = transport.availability();

    tokio::spawn(async move {
        let mut queue = DeltaQueue::new(cfg.queue_capacity);
        metrics.delta_queue_depth.set(0);
        info!(peer = %cfg.local_peer, "replication worker started");

        loop {
            tokio::select! {
                out = outbound_rx.recv() => {
                    let Some(out) = out else {
                        info!("store closed; replication worker stopping");
                        break;
                    };
                    let delta = Delta {
                        op: out.op,
                        entry: out.entry,
                        digest_at_sender: out.digest_hex,
                        origin_peer: cfg.local_peer.clone(),
                        emitted_ms: now_ms(),
                    };
                    publish_or_enqueue(&*transport, delta, &mut queue, &metrics).await;
                }

                inb = inbound_rx.recv() => {
                    let Some((delta, source_peer)) = inb else {
                        info!("inbound channel closed; replication worker stopping");
                        break;
                    };
                    if delta.origin_peer == cfg.local_peer {
                        debug!("self-origin delta dropped");
                        continue;
                    }
                    if let ApplyOutcome::Applied { reemitted, op } =
                        store.apply_delta(&delta, &source_peer)
                    {
                        debug!(?op, reemitted, peer = %source_peer, "inbound delta merged");
                    }
                }

                changed = availability.changed() => {
                    if changed.is_err() {
                        warn!("transport availability channel closed");
                        break;
                    }
                    if *availability.borrow() && !queue.is_empty() {
                        drain_queue(&*transport, &mut queue, &metrics).await;
                    }
                }
            }
        }
    })
}

async fn publish_or_enqueue(
    transport: &dyn Transport,
    delta: Delta,
    queue: &mut DeltaQueue,
    metrics: &Metrics,
) {
    match transport.publish(&delta).await {
        Ok(()) => {
            debug!(op = ?delta.op, name = %delta.entry.registration.name, "delta published");
        }
        Err(e) => {
            debug!(err = %e, "publish failed; queueing delta");
            if let Some(dropped) = queue.push(delta) {
                warn!(
                    name = %dropped.entry.registration.name,
                    "offline queue full; oldest delta dropped"
                );
                metrics.queue_dropped_total.inc();
            }
            metrics.delta_queue_depth.set(queue.len() as i64);
        }
    }
}

async fn drain_queue(transport: &dyn Transport, queue: &mut DeltaQueue, metrics: &Metrics) {
    info!(pending = queue.len(), "transport available; draining delta queue");
    while let Some(delta) = queue.pop() {
        if let Err(e) = transport.publish(&delta).await {
            debug!(err = %e, "drain publish failed; stopping until next availability");
            // Re-enqueue at the tail and wait for the next availability
            // event rather than spinning on a flapping transport.
            if queue.push(delta).is_some() {
                metrics.queue_dropped_total.inc();
            }
            break;
        }
    }
    metrics.delta_queue_depth.set(queue.len() as i64);
}
