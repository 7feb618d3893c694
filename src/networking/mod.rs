// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Replication: transports, delta queue and the replication worker.

pub mod gossip;
pub mod http_fanout;
pub mod replicator;
pub mod transport;
