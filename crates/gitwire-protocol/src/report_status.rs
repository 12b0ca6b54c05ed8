//! Push results reported by receive-pack.
//!
//! ```text
//! unpack ok | unpack <error>
//! ok <ref> | ng <ref> <error>
//! 0000
//! ```
//!
//! See: https://git-scm.com/docs/pack-protocol#_report_status

use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::{ProtocolError, Result};
use gitwire_types::ReferenceName;
use std::io::{Read, Write};
use tracing::debug;

const OK: &str = "ok";

/// Result of a push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportStatus {
    /// `ok`, or why unpacking failed.
    pub unpack_status: String,
    /// One entry per reference update, in the order received.
    pub command_statuses: Vec<CommandStatus>,
}

/// Result of updating one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatus {
    /// Reference that was updated.
    pub reference_name: ReferenceName,
    /// `ok`, or why the update failed.
    pub status: String,
}

impl CommandStatus {
    /// Creates a status entry.
    pub fn new(reference_name: impl Into<ReferenceName>, status: impl Into<String>) -> Self {
        Self {
            reference_name: reference_name.into(),
            status: status.into(),
        }
    }

    /// Returns the rejection as an error, if the update failed.
    pub fn error(&self) -> Option<ProtocolError> {
        if self.status == OK {
            return None;
        }
        Some(ProtocolError::CommandError {
            reference: self.reference_name.to_string(),
            status: self.status.clone(),
        })
    }
}

impl ReportStatus {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the first failure in the report: the unpack status, then
    /// each command in order.
    pub fn error(&self) -> Option<ProtocolError> {
        if self.unpack_status != OK {
            return Some(ProtocolError::UnpackError(self.unpack_status.clone()));
        }
        self.command_statuses.iter().find_map(CommandStatus::error)
    }

    /// Decodes a report up to and including its flush-pkt.
    pub fn decode<R: Read>(reader: R) -> Result<Self> {
        let mut scanner = PktLineReader::new(reader);

        let first = match scanner.read()? {
            None => return Err(ProtocolError::UnexpectedEof),
            Some(PktLine::Flush) => return Err(ProtocolError::PrematureFlush),
            Some(pkt) => pkt,
        };
        let mut report = Self {
            unpack_status: decode_unpack_status(first.payload())?,
            command_statuses: Vec::new(),
        };

        loop {
            match scanner.read()? {
                None => return Err(ProtocolError::MissingFlush),
                Some(PktLine::Flush) => break,
                Some(pkt) => report
                    .command_statuses
                    .push(decode_command_status(pkt.payload())?),
            }
        }

        debug!(
            unpack = %report.unpack_status,
            commands = report.command_statuses.len(),
            failed = report.command_statuses.iter().filter(|c| c.status != OK).count(),
            "decoded report-status"
        );
        Ok(report)
    }

    /// Writes the report, ending with a flush-pkt.
    pub fn encode<W: Write>(&self, writer: W) -> Result<()> {
        let mut pkt = PktLineWriter::new(writer);
        pkt.encode_fmt(format_args!("unpack {}\n", self.unpack_status))?;
        for command in &self.command_statuses {
            if command.status == OK {
                pkt.encode_fmt(format_args!("ok {}\n", command.reference_name))?;
            } else {
                pkt.encode_fmt(format_args!(
                    "ng {} {}\n",
                    command.reference_name, command.status
                ))?;
            }
        }
        pkt.flush_pkt()?;
        pkt.flush()
    }
}

fn line_text(payload: &[u8]) -> String {
    let line = payload.strip_suffix(b"\n").unwrap_or(payload);
    String::from_utf8_lossy(line).into_owned()
}

fn decode_unpack_status(payload: &[u8]) -> Result<String> {
    let line = line_text(payload);
    match line.split_once(' ') {
        Some(("unpack", status)) => Ok(status.to_string()),
        _ => Err(ProtocolError::MalformedUnpackStatus(line.clone())),
    }
}

fn decode_command_status(payload: &[u8]) -> Result<CommandStatus> {
    let line = line_text(payload);
    let fields: Vec<&str> = line.splitn(3, ' ').collect();
    match fields.as_slice() {
        ["ng", reference, status] => Ok(CommandStatus::new(*reference, *status)),
        ["ok", reference] => Ok(CommandStatus::new(*reference, OK)),
        _ => Err(ProtocolError::MalformedCommandStatus(line.clone())),
    }
}
