// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Security: admission pipeline, proof-of-work, rate limiting, keystore.

pub mod admission;
pub mod keystore;
pub mod pow;
pub mod rate_limit;
