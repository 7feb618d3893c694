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

#![no_main]
#![forbid(unsafe_code)]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use vns::core::types::{canonical_sign_bytes, Record, RecordKind, Registration};

#[derive(Clone, Debug, Arbitrary)]
struct Input {
    name: String,
    owner: String,
    records: Vec<(u8, String, u32)>,
    timestamp_ms: u64,
    expires_ms: u64,
    nonce: String,
}

fn kind_of(tag: u8) -> RecordKind {
    match tag % 5 {
        0 => RecordKind::Addr4,
        1 => RecordKind::Addr6,
        2 => RecordKind::Text,
        3 => RecordKind::ContentId,
        _ => RecordKind::SyncEndpoint,
    }
}

fuzz_target!(|inp: Input| {
    let reg = Registration {
        name: inp.name,
        owner: inp.owner,
        records: inp
            .records
            .into_iter()
            .take(32)
            .map(|(tag, value, ttl)| Record {
                kind: kind_of(tag),
                value,
                ttl_seconds: ttl,
            })
            .collect(),
        timestamp_ms: inp.timestamp_ms,
        expires_ms: inp.expires_ms,
        nonce: inp.nonce,
        signature: String::new(),
        public_key: String::new(),
    };

    // The canonical form is the signing choke point: it must be total over
    // arbitrary field content and byte-for-byte deterministic.
    let a = canonical_sign_bytes(&reg).expect("canonical encode");
    let b = canonical_sign_bytes(&reg).expect("canonical encode");
    assert_eq!(a, b);
});
