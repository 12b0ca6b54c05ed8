//! Fuzz target for ACK/NAK response decoding.

#![no_main]

use gitwire_protocol::{PeekReader, ServerResponse};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for multi_ack in [false, true] {
        let mut reader = PeekReader::new(data);
        let _ = ServerResponse::decode(&mut reader, multi_ack);
    }
});
