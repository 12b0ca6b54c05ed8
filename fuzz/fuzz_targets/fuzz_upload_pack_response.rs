//! Fuzz target for upload-pack response decoding.
//!
//! Runs the decoder under each request shape that changes how the
//! response is read: shallow, side-band and multi_ack.

#![no_main]

use gitwire_protocol::{Capability, Depth, NopCloser, UploadPackResponse, UploadRequest};
use libfuzzer_sys::fuzz_target;
use std::io::Read;

fuzz_target!(|data: &[u8]| {
    let shapes = [
        (Depth::Commits(0), None),
        (Depth::Commits(1), None),
        (Depth::Commits(0), Some(Capability::Sideband)),
        (Depth::Commits(0), Some(Capability::Sideband64k)),
        (Depth::Commits(1), Some(Capability::MultiAck)),
    ];

    for (depth, capability) in shapes {
        let mut request = UploadRequest::new();
        request.depth = depth;
        if let Some(capability) = capability {
            let _ = request.capabilities.set(capability, None::<&str>);
        }

        let mut response = UploadPackResponse::new(&request);
        if response.decode(NopCloser(data)).is_ok() {
            let mut pack = Vec::new();
            let _ = response.read_to_end(&mut pack);
        }
        let _ = response.close();
    }
});
