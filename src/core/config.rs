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

//! Protocol constants and node configuration.
//!
//! Settings come from an optional TOML file (`<data_dir>/vns.toml`) with
//! environment variables taking precedence.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Top-level label served by this network.
pub const TLD: &str = ".vfs";
/// Leading zero hex digits required of the proof-of-work hash.
pub const POW_DIFFICULTY: usize = 3;
/// Accepted mutations per peer per rate window.
pub const RATE_LIMIT_MAX_ATTEMPTS: usize = 5;
/// Rate window in ms.
pub const RATE_LIMIT_WINDOW_MS: u64 = 3_600_000;
/// Cap on tracked rate-limiter peers; oldest evicted beyond this.
pub const RATE_LIMIT_MAX_PEERS: usize = 10_000;
/// Registration lease (365 days) in ms.
pub const LEASE_MS: u64 = 365 * 24 * 3_600_000;
/// Allowed deviation of `expires - timestamp` from the lease period.
pub const LEASE_TOLERANCE_MS: u64 = 60_000;
/// Allowed skew of a transfer authorization timestamp from local time.
pub const TRANSFER_AUTH_SKEW_MS: u64 = 60_000;
/// Default record TTL hint in seconds.
pub const DEFAULT_RECORD_TTL_SECS: u32 = 3600;
/// Maximum records per name.
pub const MAX_RECORDS_PER_NAME: usize = 20;
/// Outbound delta queue capacity (drop-oldest beyond this).
pub const DELTA_QUEUE_CAPACITY: usize = 1000;
/// Per-peer HTTP publish timeout.
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(5);
/// Expiry sweep cadence in seconds.
pub const SWEEP_PERIOD_SECS: u64 = 3600;
/// Minimum label length.
pub const LABEL_MIN_LEN: usize = 3;
/// Maximum label length.
pub const LABEL_MAX_LEN: usize = 63;
/// Hard cap on an inbound delta payload.
pub const MAX_DELTA_BYTES: usize = 128 * 1024;
/// Sentinel owner of the reserved seeds; no real peer may assume it.
pub const RESERVED_OWNER: &str = "genesis";
/// Lease days, surfaced in `/status`.
pub const LEASE_DAYS: u64 = 365;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file: {0}")]
    Read(String),
    #[error("parse config file: {0}")]
    Parse(String),
}

/// Optional file-backed settings; every field may be overridden by env.
#[derive(Clone, Debug, Default, Deserialize)]
struct FileConfig {
    enabled: Option<bool>,
    api_port: Option<u16>,
    http_bootstrap_peers: Option<Vec<String>>,
    public_url: Option<String>,
    strict_transfer: Option<bool>,
    sweep_period_secs: Option<u64>,
    gossip_listen_addr: Option<String>,
    gossip_topic: Option<String>,
    gossip_bootstrap: Option<Vec<String>>,
    gossip_allow_peers: Option<Vec<String>>,
}

/// Resolved node configuration.
#[derive(Clone, Debug)]
pub struct VnsConfig {
    /// Whether the name service accepts mutations.
    pub enabled: bool,
    /// Blob store root (env `DATA_DIR`).
    pub data_dir: String,
    /// HTTP API port (env `API_PORT`).
    pub api_port: u16,
    /// Peer base URLs for the HTTP fan-out transport
    /// (env `HTTP_BOOTSTRAP_PEERS`, comma separated). Empty => gossip.
    pub http_bootstrap_peers: Vec<String>,
    /// Self-advertised URL (env `BOOTSTRAP_PUBLIC_URL`).
    pub public_url: Option<String>,
    /// Reject single-signature transfers when set.
    pub strict_transfer: bool,
    /// Expiry sweep cadence in seconds.
    pub sweep_period_secs: u64,
    /// Gossip listen multiaddr.
    pub gossip_listen_addr: String,
    /// Gossipsub topic carrying namespace deltas.
    pub gossip_topic: String,
    /// Gossip bootstrap multiaddrs.
    pub gossip_bootstrap: Vec<String>,
    /// Optional gossip peer-id allowlist (empty => allow all).
    pub gossip_allow_peers: Vec<String>,
}

fn env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    env(key).map(|v| !matches!(v.trim(), "0" | "false" | "no" | "off"))
}

fn split_list(v: &str) -> Vec<String> {
    v.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl VnsConfig {
    /// Load configuration: defaults, then `<data_dir>/vns.toml`, then env.
    pub fn load() -> Result<Self, ConfigError> {
        let data_dir = env("DATA_DIR").unwrap_or_else(|| "./data".to_string());

        let file = Self::read_file(&Path::new(&data_dir).join("vns.toml"))?;

        let enabled = env_bool("ENABLE_VNS")
            .or(file.enabled)
            .unwrap_or(true);
        let api_port = env("API_PORT")
            .and_then(|v| v.parse().ok())
            .or(file.api_port)
            .unwrap_or(8460);
        let http_bootstrap_peers = env("HTTP_BOOTSTRAP_PEERS")
            .map(|v| split_list(&v))
            .or(file.http_bootstrap_peers)
            .unwrap_or_default();
        let public_url = env("BOOTSTRAP_PUBLIC_URL").or(file.public_url);
        let strict_transfer = env_bool("VNS_STRICT_TRANSFER")
            .or(file.strict_transfer)
            .unwrap_or(false);
        let sweep_period_secs = env("VNS_SWEEP_PERIOD_SECS")
            .and_then(|v| v.parse().ok())
            .or(file.sweep_period_secs)
            .unwrap_or(SWEEP_PERIOD_SECS);
        let gossip_listen_addr = env("VNS_GOSSIP_LISTEN")
            .or(file.gossip_listen_addr)
            .unwrap_or_else(|| "/ip4/0.0.0.0/tcp/4460".to_string());
        let gossip_topic = env("VNS_GOSSIP_TOPIC")
            .or(file.gossip_topic)
            .unwrap_or_else(|| "vns-namespace".to_string());
        let gossip_bootstrap = env("VNS_GOSSIP_BOOTSTRAP")
            .map(|v| split_list(&v))
            .or(file.gossip_bootstrap)
            .unwrap_or_default();
        let gossip_allow_peers = env("VNS_GOSSIP_ALLOW_PEERS")
            .map(|v| split_list(&v))
            .or(file.gossip_allow_peers)
            .unwrap_or_default();

        Ok(Self {
            enabled,
            data_dir,
            api_port,
            http_bootstrap_peers,
            public_url,
            strict_transfer,
            sweep_period_secs,
            gossip_listen_addr,
            gossip_topic,
            gossip_bootstrap,
            gossip_allow_peers,
        })
    }

    fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
        if !path.exists() {
            return Ok(FileConfig::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(e.to_string()))?;
        toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }
}
