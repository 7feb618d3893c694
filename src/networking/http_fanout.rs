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

//! HTTP fan-out transport: publish is a parallel POST of the delta JSON to
//! every configured peer base URL with a per-peer timeout. One accepting
//! peer counts as success; total failure flips the availability signal so
//! the replicator queues instead of back-pressuring callers. Inbound deltas
//! arrive through the node's own `/push-delta` route, not through this type.

use async_trait::async_trait;
use futures::future::join_all;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::core::config::PUBLISH_TIMEOUT;
use crate::core::types::Delta;
use crate::networking::transport::{Transport, TransportError};

/// Fan-out publisher over configured peer URLs.
pub struct HttpFanout {
    peers: Vec<String>,
    client: reqwest::Client,
    available_tx: watch::Sender<bool>,
    available_rx: watch::Receiver<bool>,
}

impl HttpFanout {
    /// Create a fan-out transport over `peers` (base URLs).
    pub fn new(peers: Vec<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(PUBLISH_TIMEOUT)
            .build()
            .unwrap_or_default();
        // Optimistic start: the first failed publish flips to unavailable.
        let (available_tx, available_rx) = watch::channel(!peers.is_empty());
        Self {
            peers,
            client,
            available_tx,
            available_rx,
        }
    }

    fn push_url(peer: &str) -> String {
        format!("{}/push-delta", peer.trim_end_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpFanout {
    async fn publish(&self, delta: &Delta) -> Result<(), TransportError> {
        if self.peers.is_empty() {
            return Err(TransportError::Unavailable);
        }

        let posts = self.peers.iter().map(|peer| {
            let url = Self::push_url(peer);
            let client = self.client.clone();
            async move {
                let res = client.post(&url).json(delta).send().await;
                match res {
                    Ok(resp) if resp.status().is_success() => true,
                    Ok(resp) => {
                        debug!(%url, status = %resp.status(), "peer refused delta");
                        false
                    }
                    Err(e) => {
                        debug!(%url, err = %e, "peer unreachable");
                        false
                    }
                }
            }
        });

        let accepted = join_all(posts).await.into_iter().filter(|ok| *ok).count();
        if accepted > 0 {
            let _ = self.available_tx.send(true);
            Ok(())
        } else {
            warn!(peers = self.peers.len(), "no peer accepted delta");
            let _ = self.available_tx.send(false);
            Err(TransportError::Unavailable)
        }
    }

    fn availability(&self) -> watch::Receiver<bool> {
        self.available_rx.clone()
    }
}
