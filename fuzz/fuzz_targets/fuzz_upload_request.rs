//! Fuzz target for upload request decoding.

#![no_main]

use gitwire_protocol::UploadRequest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // A request that decodes must re-encode and decode to itself.
    if let Ok(request) = UploadRequest::decode(data) {
        let mut wire = Vec::new();
        if request.encode(&mut wire).is_ok() {
            let again = UploadRequest::decode(wire.as_slice()).expect("re-encoded request decodes");
            assert_eq!(again, request);
        }
    }
});
