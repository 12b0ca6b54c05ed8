//! Fuzz target for pkt-line parsing.
//!
//! Tests that the pkt-line reader and the side-band demuxer handle
//! arbitrary input without panicking.

#![no_main]

use gitwire_protocol::{Demuxer, PktLineReader, Sideband, LEN_SIZE, MAX_PAYLOAD_SIZE};
use libfuzzer_sys::fuzz_target;
use std::io::{Cursor, Read};

fuzz_target!(|data: &[u8]| {
    let mut reader = PktLineReader::new(Cursor::new(data));

    // Whatever decodes must encode back to the same bytes.
    for _ in 0..100 {
        let start = reader.get_ref().position() as usize;
        match reader.read() {
            Ok(Some(pkt)) => {
                let end = reader.get_ref().position() as usize;
                // Lax decode accepts a few frames the encoder refuses.
                if pkt.payload().len() > MAX_PAYLOAD_SIZE {
                    continue;
                }
                let consumed = &data[start..end];
                let encoded = pkt.encode().expect("decoded frame re-encodes");
                assert!(encoded[..LEN_SIZE].eq_ignore_ascii_case(&consumed[..LEN_SIZE]));
                assert_eq!(&encoded[LEN_SIZE..], &consumed[LEN_SIZE..]);
            }
            Ok(None) | Err(_) => break,
        }
    }

    for profile in [Sideband::Sideband, Sideband::Sideband64k] {
        let mut demuxer = Demuxer::new(profile, Cursor::new(data));
        let mut out = Vec::new();
        let _ = demuxer.read_to_end(&mut out);
    }
});
