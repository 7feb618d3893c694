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

//! Name grammar for the `.vfs` namespace.
//!
//! Canonical form is lowercase `<label>.vfs`, label 3-63 characters from
//! `[a-z0-9_-]`, not beginning or ending with `-`. Input is case-insensitive
//! and the TLD is appended when missing.

use thiserror::Error;

use crate::core::config::{LABEL_MAX_LEN, LABEL_MIN_LEN, TLD};

/// Labels that are pre-seeded at genesis and refused on register.
pub const RESERVED_LABELS: [&str; 4] = ["root", "admin", "sync", "bootstrap"];

/// Name grammar violations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NameError {
    /// Name does not end with the `.vfs` TLD or has a dotted label.
    #[error("name must be a single label under {TLD}")]
    BadShape,
    /// Label length outside 3-63.
    #[error("label length must be {LABEL_MIN_LEN}-{LABEL_MAX_LEN} characters")]
    BadLength,
    /// Character outside `[a-z0-9_-]`.
    #[error("label characters must be [a-z0-9_-]")]
    BadChar,
    /// Label begins or ends with a hyphen.
    #[error("label must not begin or end with '-'")]
    HyphenEdge,
}

/// Normalize a raw name: trim, lowercase, append the TLD when missing.
pub fn normalize(input: &str) -> String {
    let trimmed = input.trim().to_ascii_lowercase();
    if trimmed.ends_with(TLD) {
        trimmed
    } else {
        format!("{trimmed}{TLD}")
    }
}

/// Validate a normalized name against the grammar.
pub fn validate(name: &str) -> Result<(), NameError> {
    let Some(label) = name.strip_suffix(TLD) else {
        return Err(NameError::BadShape);
    };
    if label.is_empty() || label.contains('.') {
        return Err(NameError::BadShape);
    }
    if label.len() < LABEL_MIN_LEN || label.len() > LABEL_MAX_LEN {
        return Err(NameError::BadLength);
    }
    if !label
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
    {
        return Err(NameError::BadChar);
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(NameError::HyphenEdge);
    }
    Ok(())
}

/// Whether a normalized name is one of the four reserved seeds.
pub fn is_reserved(name: &str) -> bool {
    name.strip_suffix(TLD)
        .map(|label| RESERVED_LABELS.contains(&label))
        .unwrap_or(false)
}
