//! Upload-pack response: shallow update, ACK/NAK and the packfile.

use crate::config::ProtocolConfig;
use crate::io::{PeekReader, ReadClose};
use crate::server_response::ServerResponse;
use crate::shallow_update::ShallowUpdate;
use crate::sideband::{Demuxer, Sideband};
use crate::upload_request::UploadRequest;
use crate::{ProtocolError, Result};
use std::io::{self, Read, Write};
use tracing::debug;

/// Where the packfile bytes come from.
enum Body<T> {
    /// Nothing decoded yet.
    Pending,
    /// A packfile handed over for encoding.
    Packfile(T),
    /// The rest of a decoded stream.
    Raw(PeekReader<T>),
    /// The rest of a decoded stream, side-band encoded.
    Demuxed(Demuxer<PeekReader<T>>),
    /// Released; reads return end of stream.
    Closed,
}

/// The server's answer to an [`UploadRequest`].
///
/// The response owns the transport stream. [`close`](Self::close) must be
/// called to release it and may be called any number of times.
pub struct UploadPackResponse<T> {
    /// Boundary changes, present on shallow fetches.
    pub shallow_update: ShallowUpdate,
    /// ACK/NAK header.
    pub server_response: ServerResponse,
    is_shallow: bool,
    is_multi_ack: bool,
    sideband: Option<Sideband>,
    progress: Option<Box<dyn Write + Send>>,
    forward_progress: bool,
    body: Body<T>,
}

impl<T: ReadClose> UploadPackResponse<T> {
    /// Creates a response to be filled by [`decode`](Self::decode).
    pub fn new(request: &UploadRequest) -> Self {
        Self {
            shallow_update: ShallowUpdate::new(),
            server_response: ServerResponse::new(),
            is_shallow: !request.depth.is_infinite(),
            is_multi_ack: request.is_multi_ack(),
            sideband: request.sideband(),
            progress: None,
            forward_progress: true,
            body: Body::Pending,
        }
    }

    /// Creates a response that will send `packfile` when encoded.
    pub fn with_packfile(request: &UploadRequest, packfile: T) -> Self {
        let mut response = Self::new(request);
        response.body = Body::Packfile(packfile);
        response
    }

    /// Sends side-band progress text to `sink`.
    pub fn with_progress(mut self, sink: impl Write + Send + 'static) -> Self {
        self.progress = Some(Box::new(sink));
        self
    }

    /// Applies the progress setting from `config`.
    pub fn with_config(mut self, config: &ProtocolConfig) -> Self {
        self.forward_progress = config.progress;
        self
    }

    /// Returns true once the response can be read.
    pub fn is_decoded(&self) -> bool {
        !matches!(self.body, Body::Pending)
    }

    /// Reads the response headers from `stream`, leaving the packfile to
    /// be read through this response. Any stream the response already
    /// held is closed first. The new stream is closed if decoding fails.
    pub fn decode(&mut self, stream: T) -> Result<()> {
        let mut reader = PeekReader::new(stream);
        if let Err(err) = self.close() {
            if let Err(close_err) = reader.close() {
                debug!(error = %close_err, "closing stream after failed release");
            }
            return Err(err);
        }
        if let Err(err) = self.decode_headers(&mut reader) {
            if let Err(close_err) = reader.close() {
                debug!(error = %close_err, "closing stream after failed decode");
            }
            return Err(err);
        }

        self.body = match self.sideband {
            Some(profile) => {
                let mut demuxer = Demuxer::new(profile, reader);
                let forward = self.forward_progress;
                demuxer.set_progress(self.progress.take().filter(|_| forward));
                Body::Demuxed(demuxer)
            }
            None => Body::Raw(reader),
        };

        debug!(
            shallows = self.shallow_update.shallows.len(),
            acks = self.server_response.acks.len(),
            sideband = ?self.sideband,
            "decoded upload-pack response"
        );
        Ok(())
    }

    fn decode_headers(&mut self, reader: &mut PeekReader<T>) -> Result<()> {
        if self.is_shallow {
            self.shallow_update = ShallowUpdate::decode(&mut *reader)?;
        }
        self.server_response = ServerResponse::decode(reader, self.is_multi_ack)?;
        Ok(())
    }

    /// Writes the headers and then the packfile, unmodified. The packfile
    /// is closed afterwards.
    pub fn encode<W: Write>(&mut self, mut writer: W) -> Result<()> {
        if matches!(self.body, Body::Pending | Body::Closed) {
            return Err(ProtocolError::ResponseNotDecoded);
        }

        if self.is_shallow {
            self.shallow_update.encode(&mut writer)?;
        }
        self.server_response.encode(&mut writer, self.is_multi_ack)?;

        let copied = io::copy(&mut *self, &mut writer);
        let closed = self.close();
        let copied = copied?;
        closed?;
        writer.flush()?;

        debug!(bytes = copied, "encoded upload-pack response");
        Ok(())
    }

    /// Releases the transport stream. Later calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        let body = match self.body {
            Body::Pending => return Ok(()),
            _ => std::mem::replace(&mut self.body, Body::Closed),
        };
        match body {
            Body::Packfile(mut packfile) => packfile.close()?,
            Body::Raw(mut reader) => reader.close()?,
            Body::Demuxed(demuxer) => demuxer.into_inner().close()?,
            Body::Pending | Body::Closed => return Ok(()),
        }
        debug!("closed upload-pack response");
        Ok(())
    }
}

impl<T: ReadClose> Read for UploadPackResponse<T> {
    /// Reads packfile bytes. Fails with
    /// [`ProtocolError::ResponseNotDecoded`] before a decode; returns end
    /// of stream once closed.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.body {
            Body::Pending => Err(ProtocolError::ResponseNotDecoded.into()),
            Body::Packfile(packfile) => packfile.read(buf),
            Body::Raw(reader) => reader.read(buf),
            Body::Demuxed(demuxer) => demuxer.read(buf),
            Body::Closed => Ok(0),
        }
    }
}
