//! Git protocol error types.

use std::io;
use thiserror::Error;

/// Errors that can occur while encoding or decoding protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A pkt-line length header is not valid hex or is out of range.
    #[error("invalid pkt-len found")]
    InvalidPktLen,

    /// The stream ended inside a pkt-line.
    #[error("unexpected EOF")]
    UnexpectedEof,

    /// A payload does not fit in a single pkt-line.
    #[error("payload is too long: {0} bytes")]
    PayloadTooLong(usize),

    /// A line of a decoded message does not fit the grammar.
    #[error("pkt-line {line}: {message}")]
    UnexpectedData {
        /// One-based index of the offending pkt-line.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// A hash token is too short or not terminated.
    #[error("malformed hash: {0:?}")]
    MalformedHash(String),

    /// A `deepen` line carries a negative number.
    #[error("negative depth")]
    NegativeDepth,

    /// A number could not be parsed.
    #[error("invalid number: {0}")]
    InvalidNumber(String),

    /// A `deepen-since` timestamp is out of range.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(i64),

    /// A capability token is invalid or not allowed.
    #[error("invalid capability: {0}")]
    InvalidCapability(String),

    /// A request breaks a protocol rule.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A server response line is neither ACK nor NAK.
    #[error("unexpected content {0:?}")]
    UnexpectedContent(String),

    /// A flush arrived where a line was required.
    #[error("unexpected flush")]
    UnexpectedFlush,

    /// An ACK line is too short to hold a hash.
    #[error("malformed ACK {0:?}")]
    MalformedAck(String),

    /// The first report-status line is not an unpack status.
    #[error("malformed unpack status: {0}")]
    MalformedUnpackStatus(String),

    /// A report-status command line is neither `ok` nor `ng`.
    #[error("malformed command status: {0}")]
    MalformedCommandStatus(String),

    /// A shallow-update line is neither `shallow` nor `unshallow`.
    #[error("malformed shallow-update: {0:?}")]
    MalformedShallowUpdate(String),

    /// A message ended without its flush-pkt.
    #[error("missing flush")]
    MissingFlush,

    /// A flush-pkt arrived before any content.
    #[error("premature flush")]
    PrematureFlush,

    /// The upload-pack response was read before being decoded.
    #[error("response not decoded")]
    ResponseNotDecoded,

    /// More than one ACK without multi_ack.
    #[error("multi_ack and multi_ack_detailed are not supported")]
    MultiAckUnsupported,

    /// A side-band frame exceeds the negotiated maximum.
    #[error("max. packed size exceeded")]
    MaxPackedExceeded,

    /// A side-band frame names an unknown channel.
    #[error("unknown channel {0}")]
    UnknownChannel(String),

    /// The peer sent a message on the error channel.
    #[error("unexpected error: {0}")]
    SidebandError(String),

    /// The remote failed to unpack the pushed objects.
    #[error("unpack error: {0}")]
    UnpackError(String),

    /// The remote rejected a reference update.
    #[error("command error on {reference}: {status}")]
    CommandError {
        /// Reference that failed.
        reference: String,
        /// Status text sent by the remote.
        status: String,
    },

    /// A value could not be parsed.
    #[error(transparent)]
    Types(#[from] gitwire_types::TypesError),

    /// A configuration document could not be loaded.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl ProtocolError {
    pub(crate) fn unexpected_data(line: usize, message: impl Into<String>) -> Self {
        Self::UnexpectedData {
            line,
            message: message.into(),
        }
    }

    /// Recovers a protocol error carried inside an `io::Error`, as returned
    /// by the `Read` implementations of this crate.
    #[must_use]
    pub fn from_io_ref(err: &io::Error) -> Option<&Self> {
        err.get_ref().and_then(|inner| inner.downcast_ref::<Self>())
    }
}

impl From<ProtocolError> for io::Error {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => e,
            ProtocolError::UnexpectedEof => io::Error::new(io::ErrorKind::UnexpectedEof, err),
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
