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

//! Create (or reveal) the owner identity for a data directory.
//!
//! Opening the keystore creates `owner.key` when it does not exist yet,
//! sealed at rest when `VNS_KEY_PASSPHRASE` is set; an existing key is
//! loaded and reprinted unchanged.

use anyhow::Result;
use vns::core::security::keystore::Keystore;

fn main() -> Result<()> {
    let data_dir = std::env::args().nth(1).unwrap_or_else(|| "data".to_string());
    let ks = Keystore::open(&data_dir)?;

    println!("public_key: {}", hex::encode(ks.public_key()));
    println!("owner: {}", ks.owner_fingerprint());
    Ok(())
}
