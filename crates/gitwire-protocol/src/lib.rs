//! Git smart protocol codecs for gitwire.
//!
//! This crate implements the wire grammars exchanged by a Git client and
//! server during fetch (upload-pack) and push (receive-pack): pkt-line
//! framing, side-band multiplexing, upload requests, ACK/NAK responses,
//! shallow updates, report-status and the upload-pack response that
//! carries the packfile.
//!
//! Everything works over plain [`std::io::Read`] and [`std::io::Write`]
//! streams; establishing the transport is left to the caller.

mod capability;
mod config;
mod error;
mod io;
mod pktline;
mod report_status;
mod server_response;
mod shallow_update;
mod sideband;
mod upload_pack_response;
mod upload_request;

#[cfg(test)]
mod testutil;

pub use capability::{Capability, CapabilityList, KNOWN as KNOWN_CAPABILITIES};
pub use config::ProtocolConfig;
pub use error::ProtocolError;
pub use io::{NopCloser, PeekReader, ReadClose};
pub use pktline::{
    PktLine, PktLineReader, PktLineWriter, DELIM_PKT, FLUSH_PKT, LEN_SIZE, MAX_DECODE_LEN,
    MAX_PAYLOAD_SIZE,
};
pub use report_status::{CommandStatus, ReportStatus};
pub use server_response::ServerResponse;
pub use shallow_update::ShallowUpdate;
pub use sideband::{Channel, Demuxer, Muxer, Sideband, MAX_PACKED_SIZE, MAX_PACKED_SIZE_64K};
pub use upload_pack_response::UploadPackResponse;
pub use upload_request::{Depth, UploadRequest, UploadRequestDecoder};

/// Result type for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
