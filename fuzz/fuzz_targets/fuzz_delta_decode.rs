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

use libfuzzer_sys::fuzz_target;
use vns::core::config::MAX_DELTA_BYTES;
use vns::core::types::{decode_delta_limited, encode_delta};

fuzz_target!(|data: &[u8]| {
    // Wire decoding must never panic, and anything that decodes must
    // re-encode and decode to the same delta.
    if let Ok(delta) = decode_delta_limited(data, MAX_DELTA_BYTES) {
        let bytes = encode_delta(&delta).expect("re-encode");
        let again = decode_delta_limited(&bytes, MAX_DELTA_BYTES).expect("round trip");
        assert_eq!(delta, again);
    }
});
