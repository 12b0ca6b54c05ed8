//! pkt-line framing.
//!
//! Every message in the smart protocol travels in pkt-lines. Each one is prefixed with a 4-character hex length that counts the
//! prefix itself, or is one of the special markers "0000" (flush) and
//! "0001" (delimiter).

use crate::{ProtocolError, Result};
use std::fmt;
use std::io::{self, Read, Write};
use tracing::trace;

/// Size of the length prefix.
pub const LEN_SIZE: usize = 4;

/// Largest payload the encoder will frame.
pub const MAX_PAYLOAD_SIZE: usize = 65516;

/// Largest length header accepted on decode. Real servers emit up to four
/// bytes more than `MAX_PAYLOAD_SIZE`, so decoding is deliberately lax.
pub const MAX_DECODE_LEN: usize = 0xfff4;

/// Encoded flush packet.
pub const FLUSH_PKT: &[u8; LEN_SIZE] = b"0000";

/// Encoded delimiter packet.
pub const DELIM_PKT: &[u8; LEN_SIZE] = b"0001";

/// One frame read from or written to the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PktLine {
    /// Frame carrying 1 to 65516 payload bytes.
    Data(Vec<u8>),
    /// Flush packet (0000).
    Flush,
    /// Delimiter packet (0001).
    Delimiter,
}

impl PktLine {
    /// Creates a data packet from a string slice.
    pub fn from_string(s: &str) -> Self {
        Self::Data(s.as_bytes().to_vec())
    }

    /// Creates a data packet from bytes.
    pub fn from_bytes(b: impl Into<Vec<u8>>) -> Self {
        Self::Data(b.into())
    }

    /// Returns the wire form. An empty `Data` payload is framed as a
    /// flush-pkt.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Self::Data(data) => {
                let mut result = header(data.len())?.to_vec();
                result.extend_from_slice(data);
                Ok(result)
            }
            Self::Flush => Ok(FLUSH_PKT.to_vec()),
            Self::Delimiter => Ok(DELIM_PKT.to_vec()),
        }
    }

    /// Returns true if this is a flush packet.
    pub fn is_flush(&self) -> bool {
        matches!(self, Self::Flush)
    }

    /// Returns true if this is a delimiter packet.
    pub fn is_delimiter(&self) -> bool {
        matches!(self, Self::Delimiter)
    }

    /// Returns the data content, or None for special packets.
    pub fn data(&self) -> Option<&[u8]> {
        match self {
            Self::Data(data) => Some(data),
            _ => None,
        }
    }

    /// Returns the raw payload; special packets have an empty payload.
    pub fn payload(&self) -> &[u8] {
        self.data().unwrap_or_default()
    }

    /// Returns the data as a string, trimming any trailing newline.
    pub fn as_str(&self) -> Option<&str> {
        self.data()
            .and_then(|d| std::str::from_utf8(d).ok())
            .map(|s| s.trim_end_matches('\n'))
    }
}

/// Computes the length header for a payload of `len` bytes. A payload of
/// zero bytes has no frame of its own and becomes a flush-pkt.
fn header(len: usize) -> Result<[u8; LEN_SIZE]> {
    if len == 0 {
        return Ok(*FLUSH_PKT);
    }
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::PayloadTooLong(len));
    }
    let mut out = [0u8; LEN_SIZE];
    out.copy_from_slice(format!("{:04x}", len + LEN_SIZE).as_bytes());
    Ok(out)
}

/// Parses a length header. Both hex cases are accepted.
fn parse_len(buf: &[u8; LEN_SIZE]) -> Result<usize> {
    let mut len = 0usize;
    for &b in buf {
        let digit = match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => return Err(ProtocolError::InvalidPktLen),
        };
        len = (len << 4) | usize::from(digit);
    }
    Ok(len)
}

/// Pulls frames off a byte stream without reading ahead.
///
/// Also usable as an iterator of packets; iteration stops at a clean end
/// of stream and after the first error.
pub struct PktLineReader<R> {
    reader: R,
    done: bool,
}

impl<R: Read> PktLineReader<R> {
    /// Wraps `reader`.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }

    /// Reads the next packet. Returns `None` once the stream ends cleanly
    /// on a packet boundary.
    pub fn read(&mut self) -> Result<Option<PktLine>> {
        let mut len_buf = [0u8; LEN_SIZE];
        match read_full(&mut self.reader, &mut len_buf)? {
            0 => return Ok(None),
            LEN_SIZE => {}
            n if len_buf[..n].iter().all(u8::is_ascii_hexdigit) => {
                return Err(ProtocolError::UnexpectedEof)
            }
            _ => return Err(ProtocolError::InvalidPktLen),
        }

        let len = parse_len(&len_buf)?;
        match len {
            0 => {
                trace!("read flush-pkt");
                Ok(Some(PktLine::Flush))
            }
            1 => Ok(Some(PktLine::Delimiter)),
            2..=LEN_SIZE => Err(ProtocolError::InvalidPktLen),
            _ if len > MAX_DECODE_LEN => Err(ProtocolError::InvalidPktLen),
            _ => {
                let mut data = vec![0u8; len - LEN_SIZE];
                if read_full(&mut self.reader, &mut data)? != data.len() {
                    return Err(ProtocolError::UnexpectedEof);
                }
                trace!(len = data.len(), "read pkt-line");
                Ok(Some(PktLine::Data(data)))
            }
        }
    }

    /// Collects data and delimiter frames up to the next flush-pkt or the
    /// end of the stream. The flush-pkt itself is consumed.
    pub fn read_until_flush(&mut self) -> Result<Vec<PktLine>> {
        let mut packets = Vec::new();
        loop {
            match self.read()? {
                Some(PktLine::Flush) | None => break,
                Some(pkt) => packets.push(pkt),
            }
        }
        Ok(packets)
    }

    /// Advances past `n` frames without keeping their payloads. Fails with
    /// [`ProtocolError::UnexpectedEof`] if the stream ends first.
    pub fn skip_packets(&mut self, n: usize) -> Result<()> {
        for _ in 0..n {
            if self.read()?.is_none() {
                return Err(ProtocolError::UnexpectedEof);
            }
        }
        Ok(())
    }

    /// Returns a reference to the inner reader.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Returns a mutable reference to the inner reader.
    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consumes the reader and returns the inner reader.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: Read> Iterator for PktLineReader<R> {
    type Item = Result<PktLine>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read() {
            Ok(Some(pkt)) => Some(Ok(pkt)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fills `buf` as far as the stream allows and returns how much was read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Frames payloads onto a byte stream.
pub struct PktLineWriter<W> {
    writer: W,
}

impl<W: Write> PktLineWriter<W> {
    /// Wraps `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Writes a packet.
    pub fn write(&mut self, pkt: &PktLine) -> Result<()> {
        match pkt {
            PktLine::Data(data) => self.write_data(data),
            PktLine::Flush => self.flush_pkt(),
            PktLine::Delimiter => self.delim_pkt(),
        }
    }

    /// Writes one data frame, or a flush-pkt when `data` is empty. The
    /// length is checked before anything is written.
    pub fn write_data(&mut self, data: &[u8]) -> Result<()> {
        let header = header(data.len())?;
        self.writer.write_all(&header)?;
        self.writer.write_all(data)?;
        Ok(())
    }

    /// Writes each payload as one packet; an empty payload is written as
    /// a flush packet.
    ///
    /// Packets written before a failing payload stay written.
    pub fn encode<I, P>(&mut self, payloads: I) -> Result<()>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        for payload in payloads {
            self.write_data(payload.as_ref())?;
        }
        Ok(())
    }

    /// Renders the format arguments and writes the result as one packet.
    pub fn encode_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        self.write_data(fmt::format(args).as_bytes())
    }

    /// Writes `s` as one frame, appending `\n` if it is missing.
    pub fn write_line(&mut self, s: &str) -> Result<()> {
        let mut data = s.as_bytes().to_vec();
        if !s.ends_with('\n') {
            data.push(b'\n');
        }
        self.write_data(&data)
    }

    /// Writes a flush packet.
    pub fn flush_pkt(&mut self) -> Result<()> {
        self.writer.write_all(FLUSH_PKT)?;
        Ok(())
    }

    /// Writes a delimiter packet.
    pub fn delim_pkt(&mut self) -> Result<()> {
        self.writer.write_all(DELIM_PKT)?;
        Ok(())
    }

    /// Flushes the underlying writer.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    /// Returns a mutable reference to the inner writer.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Returns the inner writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}
