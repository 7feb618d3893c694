// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Monitoring: Prometheus metrics.

pub mod metrics;
