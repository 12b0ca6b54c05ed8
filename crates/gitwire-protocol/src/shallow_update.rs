//! Shallow-update section of an upload-pack response.
//!
//! On a shallow fetch the server first tells the client which commits
//! become shallow boundaries and which stop being ones:
//!
//! ```text
//! shallow <hash>
//! unshallow <hash>
//! 0000
//! ```

use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::{ProtocolError, Result};
use gitwire_types::{ObjectId, HEX_LEN};
use std::io::{Read, Write};
use tracing::debug;

const SHALLOW: &[u8] = b"shallow ";
const UNSHALLOW: &[u8] = b"unshallow ";

/// Boundary changes announced by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShallowUpdate {
    /// Commits that are now shallow.
    pub shallows: Vec<ObjectId>,
    /// Commits that are no longer shallow.
    pub unshallows: Vec<ObjectId>,
}

impl ShallowUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when there is nothing to announce.
    pub fn is_empty(&self) -> bool {
        self.shallows.is_empty() && self.unshallows.is_empty()
    }

    /// Decodes lines up to the flush-pkt. A stream that ends first yields
    /// whatever was read.
    pub fn decode<R: Read>(reader: R) -> Result<Self> {
        let mut update = Self::new();
        for pkt in PktLineReader::new(reader) {
            let line = match pkt? {
                PktLine::Flush => break,
                PktLine::Delimiter => Vec::new(),
                PktLine::Data(data) => data,
            };
            let line = line.strip_suffix(b"\n").unwrap_or(line.as_slice());

            if let Some(hex) = line.strip_prefix(SHALLOW) {
                update.shallows.push(parse_hash(line, hex)?);
            } else if let Some(hex) = line.strip_prefix(UNSHALLOW) {
                update.unshallows.push(parse_hash(line, hex)?);
            } else {
                return Err(malformed(line));
            }
        }

        debug!(
            shallows = update.shallows.len(),
            unshallows = update.unshallows.len(),
            "decoded shallow-update"
        );
        Ok(update)
    }

    /// Writes the section, ending with a flush-pkt.
    pub fn encode<W: Write>(&self, writer: W) -> Result<()> {
        let mut pkt = PktLineWriter::new(writer);
        for id in &self.shallows {
            pkt.encode_fmt(format_args!("shallow {id}\n"))?;
        }
        for id in &self.unshallows {
            pkt.encode_fmt(format_args!("unshallow {id}\n"))?;
        }
        pkt.flush_pkt()?;
        pkt.flush()
    }
}

fn parse_hash(line: &[u8], hex: &[u8]) -> Result<ObjectId> {
    if hex.len() != HEX_LEN {
        return Err(malformed(line));
    }
    ObjectId::from_hex_bytes(hex).map_err(|_| malformed(line))
}

fn malformed(line: &[u8]) -> ProtocolError {
    ProtocolError::MalformedShallowUpdate(String::from_utf8_lossy(line).into_owned())
}
