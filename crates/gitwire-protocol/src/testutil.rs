//! Helpers shared by the unit tests.

use crate::pktline::PktLineWriter;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Encodes `payloads` as pkt-lines; empty strings become flush-pkts.
pub fn pktlines(payloads: &[&str]) -> Vec<u8> {
    let mut buf = Vec::new();
    PktLineWriter::new(&mut buf)
        .encode(payloads)
        .expect("building pkt-lines");
    buf
}

/// A cloneable in-memory sink, for progress output.
#[derive(Clone, Default)]
pub struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    pub fn contents(&self) -> Vec<u8> {
        self.0.lock().expect("poisoned").clone()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("poisoned").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A reader whose every call fails with "foo".
pub struct FailingReader;

impl io::Read for FailingReader {
    fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::Other, "foo"))
    }
}
