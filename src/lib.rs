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

//! VNS - a peer-to-peer name service for the `.vfs` top-level label.
//!
//! This crate provides:
//! - A replicated, signature-verified namespace store with an owner index,
//!   a flat namespace digest, lease expiry and manifest persistence
//! - An admission layer (proof-of-work, per-peer rate limiting, canonical-form
//!   Ed25519 verification, structural bounds)
//! - Last-write-wins delta replication over pluggable transports
//!   (libp2p gossipsub or HTTP fan-out) with an offline delta queue
//! - An HTTP API, Prometheus metrics and structured logging

/// HTTP surface (axum routes for register/resolve/transfer/query/status).
pub mod api;
/// Core protocol primitives (types, naming, config, security, store).
pub mod core;
/// Observability (Prometheus metrics).
pub mod monitoring;
/// Replication stack (transports, replicator, delta queue).
pub mod networking;
