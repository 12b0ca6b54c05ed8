//! Fuzz target for report-status decoding.

#![no_main]

use gitwire_protocol::ReportStatus;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(report) = ReportStatus::decode(data) {
        let _ = report.error();
        let mut wire = Vec::new();
        let _ = report.encode(&mut wire);
    }
});
