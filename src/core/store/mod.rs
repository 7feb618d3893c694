// Copyright (c) 2026 VNS Project
// Licensed under the Apache License, Version 2.0

#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Store: content-addressed blobs, namespace digest, manifest, namespace map.

pub mod blob;
pub mod digest;
pub mod manifest;
pub mod namespace;
