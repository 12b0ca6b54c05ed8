//! Side-band multiplexing.
//!
//! With `side-band` or `side-band-64k` negotiated, a server interleaves
//! pack data with progress and error text on one pkt-line stream. The
//! first byte of every pkt-line names the channel.
//! See: https://git-scm.com/docs/protocol-capabilities#_side_band_side_band_64k

use crate::pktline::{PktLine, PktLineReader, PktLineWriter, MAX_PAYLOAD_SIZE};
use crate::{ProtocolError, Result};
use bytes::{Buf, Bytes};
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use tracing::{debug, trace};

/// Maximum pkt-line payload, channel byte included, with `side-band`.
pub const MAX_PACKED_SIZE: usize = 1000;

/// Maximum pkt-line payload, channel byte included, with `side-band-64k`.
pub const MAX_PACKED_SIZE_64K: usize = 65520;

/// Side-band size profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Sideband {
    /// `side-band`: frames of at most 1000 bytes.
    Sideband,
    /// `side-band-64k`: frames of at most 65520 bytes.
    Sideband64k,
}

impl Sideband {
    /// Largest frame payload allowed, channel byte included.
    pub const fn max_packed_size(self) -> usize {
        match self {
            Self::Sideband => MAX_PACKED_SIZE,
            Self::Sideband64k => MAX_PACKED_SIZE_64K,
        }
    }
}

/// A side-band channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Channel {
    /// Pack data.
    PackData = 1,
    /// Progress text for the user.
    ProgressMessage = 2,
    /// Fatal error text; the stream ends after it.
    ErrorMessage = 3,
}

impl Channel {
    /// Parses a channel byte.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::PackData),
            2 => Some(Self::ProgressMessage),
            3 => Some(Self::ErrorMessage),
            _ => None,
        }
    }

    /// Prefixes `payload` with this channel's byte.
    pub fn with_payload(self, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(payload.len() + 1);
        out.push(self as u8);
        out.extend_from_slice(payload);
        out
    }
}

/// Reads pack data out of a side-band stream.
///
/// Progress frames go to the optional progress sink. A flush-pkt ends
/// the stream; anything after it is left unread in the source.
pub struct Demuxer<R> {
    scanner: PktLineReader<R>,
    max: usize,
    pending: Bytes,
    progress: Option<Box<dyn Write + Send>>,
    deferred: Option<io::Error>,
    finished: bool,
}

impl<R: Read> Demuxer<R> {
    /// Creates a demuxer over a pkt-line stream.
    pub fn new(profile: Sideband, reader: R) -> Self {
        Self {
            scanner: PktLineReader::new(reader),
            max: profile.max_packed_size(),
            pending: Bytes::new(),
            progress: None,
            deferred: None,
            finished: false,
        }
    }

    /// Sends progress text to `sink` instead of dropping it.
    pub fn with_progress(mut self, sink: impl Write + Send + 'static) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    /// Replaces the progress sink.
    pub fn set_progress(&mut self, sink: Option<Box<dyn Write + Send>>) {
        self.progress = sink;
    }

    /// Returns true once the flush-pkt or the end of the source was seen.
    pub fn is_finished(&self) -> bool {
        self.finished && self.pending.is_empty()
    }

    /// Returns the underlying stream.
    pub fn into_inner(self) -> R {
        self.scanner.into_inner()
    }

    /// Returns a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        self.scanner.inner_mut()
    }

    /// Makes pack data available in `pending`. Returns false at the end of
    /// the side-band stream.
    fn next_pack_data(&mut self) -> Result<bool> {
        loop {
            if !self.pending.is_empty() {
                return Ok(true);
            }
            if self.finished {
                return Ok(false);
            }

            let content = match self.scanner.read()? {
                None | Some(PktLine::Flush) | Some(PktLine::Delimiter) => {
                    debug!("side-band stream ended");
                    self.finished = true;
                    return Ok(false);
                }
                Some(PktLine::Data(content)) => content,
            };

            if content.len() > self.max {
                return Err(ProtocolError::MaxPackedExceeded);
            }

            match Channel::from_byte(content[0]) {
                Some(Channel::PackData) => {
                    self.pending = Bytes::from(content).slice(1..);
                }
                Some(Channel::ProgressMessage) => {
                    trace!(len = content.len() - 1, "side-band progress");
                    if let Some(progress) = self.progress.as_mut() {
                        progress.write_all(&content[1..])?;
                    }
                }
                Some(Channel::ErrorMessage) => {
                    let text = String::from_utf8_lossy(&content[1..]).into_owned();
                    debug!(message = %text.trim_end(), "side-band error");
                    return Err(ProtocolError::SidebandError(text));
                }
                None => {
                    return Err(ProtocolError::UnknownChannel(
                        String::from_utf8_lossy(&content).into_owned(),
                    ));
                }
            }
        }
    }
}

impl<R: Read> Read for Demuxer<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }

        let mut read = 0;
        while read < buf.len() {
            match self.next_pack_data() {
                Ok(true) => {
                    let n = (buf.len() - read).min(self.pending.len());
                    buf[read..read + n].copy_from_slice(&self.pending[..n]);
                    self.pending.advance(n);
                    read += n;
                }
                Ok(false) => break,
                // Hand out what was read; the error surfaces on the next call.
                Err(err) if read > 0 => {
                    self.deferred = Some(err.into());
                    break;
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(read)
    }
}

/// Writes data into a side-band stream.
///
/// `Write` sends pack data; `write_channel` reaches the other channels.
/// Data is split so no frame exceeds the profile limit.
pub struct Muxer<W> {
    writer: PktLineWriter<W>,
    chunk: usize,
}

impl<W: Write> Muxer<W> {
    /// Creates a muxer writing pkt-lines to `writer`.
    pub fn new(profile: Sideband, writer: W) -> Self {
        Self {
            writer: PktLineWriter::new(writer),
            chunk: profile.max_packed_size().min(MAX_PAYLOAD_SIZE) - 1,
        }
    }

    /// Writes `data` on `channel`, in as many frames as needed.
    pub fn write_channel(&mut self, channel: Channel, data: &[u8]) -> Result<usize> {
        for chunk in data.chunks(self.chunk) {
            self.writer.write_data(&channel.with_payload(chunk))?;
        }
        Ok(data.len())
    }

    /// Ends the side-band stream with a flush-pkt.
    pub fn finish(&mut self) -> Result<()> {
        self.writer.flush_pkt()?;
        self.writer.flush()
    }

    /// Returns the inner writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write> Write for Muxer<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_channel(Channel::PackData, buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(self.writer.flush()?)
    }
}
