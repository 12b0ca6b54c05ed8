//! Upload-pack requests.
//!
//! The client's first message to upload-pack lists the objects it wants,
//! the shallow boundary it already has and how deep the fetch goes:
//!
//! ```text
//! want <hash> <capabilities>
//! want <hash>
//! shallow <hash>
//! deepen <n> | deepen-since <secs> | deepen-not <ref>
//! 0000
//! ```
//!
//! See: https://git-scm.com/docs/pack-protocol#_packfile_negotiation

use crate::capability::{Capability, CapabilityList};
use crate::config::ProtocolConfig;
use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::sideband::Sideband;
use crate::{ProtocolError, Result};
use chrono::{DateTime, Utc};
use gitwire_types::{ObjectId, ReferenceName, HEX_LEN};
use std::io::{Read, Write};
use tracing::debug;

const WANT: &[u8] = b"want ";
const SHALLOW: &[u8] = b"shallow ";
const DEEPEN: &[u8] = b"deepen";
const DEEPEN_COMMITS: &[u8] = b"deepen ";
const DEEPEN_SINCE: &[u8] = b"deepen-since ";
const DEEPEN_REFERENCE: &[u8] = b"deepen-not ";

/// How much history the client asks for.
///
/// `Commits(0)` is both the default and what `deepen 0` decodes to: the
/// wire format cannot tell an explicit infinite depth from an absent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Depth {
    /// At most this many commits from each want; 0 means unlimited.
    Commits(u32),
    /// Only commits newer than this time.
    Since(DateTime<Utc>),
    /// Only commits not reachable from this reference.
    Reference(ReferenceName),
}

impl Default for Depth {
    fn default() -> Self {
        Self::Commits(0)
    }
}

impl Depth {
    /// Returns true for the unlimited depth.
    pub fn is_infinite(&self) -> bool {
        matches!(self, Self::Commits(0))
    }
}

/// A decoded upload request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadRequest {
    /// Objects the client wants, without duplicates.
    pub wants: Vec<ObjectId>,
    /// Shallow boundary commits the client has.
    pub shallows: Vec<ObjectId>,
    /// Requested depth.
    pub depth: Depth,
    /// Capabilities sent on the first want line.
    pub capabilities: CapabilityList,
}

impl UploadRequest {
    /// Creates an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a want unless it is already present.
    pub fn add_want(&mut self, id: ObjectId) {
        if !self.wants.contains(&id) {
            self.wants.push(id);
        }
    }

    /// Returns the negotiated side-band profile, if any.
    pub fn sideband(&self) -> Option<Sideband> {
        if self.capabilities.supports(&Capability::Sideband64k) {
            Some(Sideband::Sideband64k)
        } else if self.capabilities.supports(&Capability::Sideband) {
            Some(Sideband::Sideband)
        } else {
            None
        }
    }

    /// Returns true if either multi_ack flavour was negotiated.
    pub fn is_multi_ack(&self) -> bool {
        self.capabilities.supports(&Capability::MultiAck)
            || self.capabilities.supports(&Capability::MultiAckDetailed)
    }

    /// Decodes a request from a pkt-line stream.
    pub fn decode<R: Read>(reader: R) -> Result<Self> {
        UploadRequestDecoder::new(reader).decode()
    }

    /// Checks the request against the protocol rules.
    pub fn validate(&self) -> Result<()> {
        if self.wants.is_empty() {
            return Err(ProtocolError::InvalidRequest(
                "want can't be empty".to_string(),
            ));
        }

        let required = match &self.depth {
            Depth::Commits(0) => None,
            Depth::Commits(_) => Some(Capability::Shallow),
            Depth::Since(_) => Some(Capability::DeepenSince),
            Depth::Reference(_) => Some(Capability::DeepenNot),
        };
        if let Some(capability) = required {
            if !self.capabilities.supports(&capability) {
                return Err(ProtocolError::InvalidRequest(format!(
                    "depth requires the {capability} capability"
                )));
            }
        }

        for (a, b) in [
            (Capability::Sideband, Capability::Sideband64k),
            (Capability::MultiAck, Capability::MultiAckDetailed),
        ] {
            if self.capabilities.supports(&a) && self.capabilities.supports(&b) {
                return Err(ProtocolError::InvalidRequest(format!(
                    "capabilities {a} and {b} are mutually exclusive"
                )));
            }
        }
        Ok(())
    }

    /// Encodes the request as pkt-lines, ending with a flush-pkt.
    pub fn encode<W: Write>(&self, writer: W) -> Result<()> {
        let (first, rest) = self.wants.split_first().ok_or_else(|| {
            ProtocolError::InvalidRequest("empty wants provided".to_string())
        })?;

        let mut pkt = PktLineWriter::new(writer);
        if self.capabilities.is_empty() {
            pkt.encode_fmt(format_args!("want {first}\n"))?;
        } else {
            pkt.encode_fmt(format_args!("want {first} {}\n", self.capabilities))?;
        }
        for want in rest {
            pkt.encode_fmt(format_args!("want {want}\n"))?;
        }
        for shallow in &self.shallows {
            pkt.encode_fmt(format_args!("shallow {shallow}\n"))?;
        }
        match &self.depth {
            Depth::Commits(0) => {}
            Depth::Commits(n) => pkt.encode_fmt(format_args!("deepen {n}\n"))?,
            Depth::Since(t) => pkt.encode_fmt(format_args!("deepen-since {}\n", t.timestamp()))?,
            Depth::Reference(r) => pkt.encode_fmt(format_args!("deepen-not {r}\n"))?,
        }
        pkt.flush_pkt()?;
        pkt.flush()
    }
}

/// Decodes an [`UploadRequest`] line by line.
pub struct UploadRequestDecoder<'a, R> {
    scanner: PktLineReader<R>,
    config: Option<&'a ProtocolConfig>,
    line_no: usize,
    /// The current line without its trailing newline; `None` for a flush.
    line: Option<Vec<u8>>,
}

impl<'a, R: Read> UploadRequestDecoder<'a, R> {
    /// Creates a decoder that accepts any capability name.
    pub fn new(reader: R) -> Self {
        Self {
            scanner: PktLineReader::new(reader),
            config: None,
            line_no: 0,
            line: None,
        }
    }

    /// Checks capability names against the registry in `config`.
    pub fn with_config(mut self, config: &'a ProtocolConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Runs the decoder up to and including the closing flush-pkt.
    pub fn decode(mut self) -> Result<UploadRequest> {
        let mut req = UploadRequest::new();

        self.decode_first_want(&mut req)?;

        self.next_line()?;
        while let Some(rest) = self.strip(WANT) {
            let (id, tail) = self.read_hash(&rest)?;
            if tail.first() == Some(&b' ') {
                return Err(self.unexpected("unexpected payload, capabilities already sent"));
            }
            if !tail.is_empty() {
                return Err(malformed_hash(&rest));
            }
            req.add_want(id);
            self.next_line()?;
        }

        while let Some(rest) = self.strip(SHALLOW) {
            let (id, tail) = self.read_hash(&rest)?;
            if !tail.is_empty() {
                return Err(malformed_hash(&rest));
            }
            req.shallows.push(id);
            self.next_line()?;
        }

        if self.strip(DEEPEN).is_some() {
            req.depth = self.decode_deepen()?;
            self.next_line()?;
            if self.line.is_some() {
                return Err(self.unexpected("unexpected payload while expecting a flush-pkt"));
            }
        }

        if self.line.is_some() {
            return Err(self.unexpected("unexpected payload"));
        }

        debug!(
            wants = req.wants.len(),
            shallows = req.shallows.len(),
            depth = ?req.depth,
            capabilities = %req.capabilities,
            "decoded upload request"
        );
        Ok(req)
    }

    fn decode_first_want(&mut self, req: &mut UploadRequest) -> Result<()> {
        self.next_line()?;
        let Some(rest) = self.strip(WANT) else {
            return Err(self.unexpected("missing 'want ' prefix"));
        };

        let (id, tail) = self.read_hash(&rest)?;
        let caps = match tail.split_first() {
            None => &[][..],
            Some((b' ', caps)) => caps,
            Some(_) => return Err(malformed_hash(&rest)),
        };
        req.add_want(id);

        req.capabilities.decode(caps).map_err(|e| {
            ProtocolError::unexpected_data(self.line_no, format!("invalid capabilities: {e}"))
        })?;

        if let Some(config) = self.config.filter(|c| c.strict_capabilities) {
            if let Some((unknown, _)) = req.capabilities.iter().find(|(c, _)| !config.recognizes(c)) {
                return Err(ProtocolError::InvalidCapability(format!(
                    "unsupported capability {unknown}"
                )));
            }
        }
        Ok(())
    }

    fn decode_deepen(&self) -> Result<Depth> {
        if let Some(rest) = self.strip(DEEPEN_COMMITS) {
            let text = String::from_utf8_lossy(&rest);
            let n: i64 = text
                .parse()
                .map_err(|e| ProtocolError::InvalidNumber(format!("{text:?}: {e}")))?;
            if n < 0 {
                return Err(ProtocolError::NegativeDepth);
            }
            let n = u32::try_from(n)
                .map_err(|e| ProtocolError::InvalidNumber(format!("{text:?}: {e}")))?;
            return Ok(Depth::Commits(n));
        }

        if let Some(rest) = self.strip(DEEPEN_SINCE) {
            let text = String::from_utf8_lossy(&rest);
            let secs: i64 = text
                .parse()
                .map_err(|e| ProtocolError::InvalidNumber(format!("{text:?}: {e}")))?;
            let since =
                DateTime::from_timestamp(secs, 0).ok_or(ProtocolError::InvalidTimestamp(secs))?;
            return Ok(Depth::Since(since));
        }

        if let Some(rest) = self.strip(DEEPEN_REFERENCE) {
            let name = String::from_utf8_lossy(&rest).into_owned();
            return Ok(Depth::Reference(ReferenceName::new(name)));
        }

        let line = self.line.as_deref().unwrap_or_default();
        Err(self.unexpected(format!(
            "unexpected deepen specification: {:?}",
            String::from_utf8_lossy(line)
        )))
    }

    /// Advances to the next pkt-line; running out of input is an error.
    fn next_line(&mut self) -> Result<()> {
        self.line_no += 1;
        self.line = match self.scanner.read()? {
            None => return Err(ProtocolError::unexpected_data(self.line_no, "EOF")),
            Some(PktLine::Flush) => None,
            Some(PktLine::Delimiter) => Some(Vec::new()),
            Some(PktLine::Data(mut data)) => {
                if data.last() == Some(&b'\n') {
                    data.pop();
                }
                Some(data)
            }
        };
        Ok(())
    }

    /// Returns what follows `prefix` on the current line, if it matches.
    fn strip(&self, prefix: &[u8]) -> Option<Vec<u8>> {
        self.line
            .as_deref()
            .and_then(|line| line.strip_prefix(prefix))
            .map(<[u8]>::to_vec)
    }

    fn read_hash<'b>(&self, rest: &'b [u8]) -> Result<(ObjectId, &'b [u8])> {
        if rest.len() < HEX_LEN {
            return Err(malformed_hash(rest));
        }
        let id = ObjectId::from_hex_bytes(&rest[..HEX_LEN]).map_err(|e| {
            ProtocolError::unexpected_data(self.line_no, format!("invalid hash text: {e}"))
        })?;
        Ok((id, &rest[HEX_LEN..]))
    }

    fn unexpected(&self, message: impl Into<String>) -> ProtocolError {
        let line = self.line.as_deref().unwrap_or_default();
        ProtocolError::unexpected_data(
            self.line_no,
            format!("{}: {:?}", message.into(), String::from_utf8_lossy(line)),
        )
    }
}

fn malformed_hash(text: &[u8]) -> ProtocolError {
    ProtocolError::MalformedHash(String::from_utf8_lossy(text).into_owned())
}
