//! ACK/NAK server response.
//!
//! Sent by upload-pack after negotiation, right before the packfile.

use crate::io::PeekReader;
use crate::pktline::{PktLine, PktLineReader, PktLineWriter};
use crate::{ProtocolError, Result};
use gitwire_types::{ObjectId, HEX_LEN};
use std::io::{Read, Write};
use tracing::{debug, trace};

const ACK: &[u8] = b"ACK";
const NAK: &[u8] = b"NAK";

/// Bytes needed to tell another ACK/NAK line from the packfile.
const LOOKAHEAD: usize = 7;

/// Shortest ACK line: `ACK <40 hex>`.
const MIN_ACK_LEN: usize = ACK.len() + 1 + HEX_LEN;

/// ACKs sent by the server, in order. Empty means a plain NAK.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerResponse {
    /// Acknowledged objects.
    pub acks: Vec<ObjectId>,
}

impl ServerResponse {
    /// Creates an empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes ACK/NAK lines, leaving whatever follows them unread.
    ///
    /// Extra ACKs are accepted whether or not multi_ack was negotiated;
    /// some servers repeat the last ACK even without it.
    pub fn decode<R: Read>(reader: &mut PeekReader<R>, is_multi_ack: bool) -> Result<Self> {
        let mut response = Self::new();
        let mut scanner = PktLineReader::new(reader);

        while let Some(pkt) = scanner.read()? {
            response.decode_line(&pkt)?;
            if stop_reading(scanner.inner_mut())? {
                break;
            }
        }

        debug!(acks = response.acks.len(), is_multi_ack, "decoded server response");
        Ok(response)
    }

    fn decode_line(&mut self, pkt: &PktLine) -> Result<()> {
        let line = match pkt {
            PktLine::Data(data) => data.strip_suffix(b"\n").unwrap_or(data.as_slice()),
            PktLine::Flush | PktLine::Delimiter => return Err(ProtocolError::UnexpectedFlush),
        };

        if line.starts_with(ACK) {
            let id = decode_ack(line)?;
            trace!(%id, "ACK");
            self.acks.push(id);
            return Ok(());
        }
        if line.starts_with(NAK) {
            trace!("NAK");
            return Ok(());
        }
        Err(ProtocolError::UnexpectedContent(
            String::from_utf8_lossy(line).into_owned(),
        ))
    }

    /// Writes the response. Only a single ACK can be sent without
    /// multi_ack.
    pub fn encode<W: Write>(&self, writer: W, is_multi_ack: bool) -> Result<()> {
        if self.acks.len() > 1 && !is_multi_ack {
            return Err(ProtocolError::MultiAckUnsupported);
        }

        let mut pkt = PktLineWriter::new(writer);
        match self.acks.first() {
            None => pkt.write_line("NAK\n")?,
            Some(id) => pkt.encode_fmt(format_args!("ACK {id}\n"))?,
        }
        pkt.flush()
    }
}

fn decode_ack(line: &[u8]) -> Result<ObjectId> {
    let malformed = || ProtocolError::MalformedAck(String::from_utf8_lossy(line).into_owned());
    if line.len() < MIN_ACK_LEN {
        return Err(malformed());
    }
    let start = line.iter().position(|&b| b == b' ').ok_or_else(malformed)? + 1;
    let hex = line.get(start..start + HEX_LEN).ok_or_else(malformed)?;
    Ok(ObjectId::from_hex_bytes(hex)?)
}

/// Peeks at the next header to decide whether another ACK/NAK follows.
fn stop_reading<R: Read>(reader: &mut PeekReader<R>) -> Result<bool> {
    let ahead = reader.peek(LOOKAHEAD)?;
    if ahead.len() < LOOKAHEAD {
        return Ok(true);
    }
    let is_command = |b: &[u8]| b == ACK || b == NAK;
    Ok(!(is_command(&ahead[..3]) || is_command(&ahead[4..])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HASH: &str = "6ecf0ef2c2dffb796033e5a02219af86ec6584e5";
    const ONES: &str = "1111111111111111111111111111111111111111";

    fn decode(raw: &[u8], is_multi_ack: bool) -> (Result<ServerResponse>, Vec<u8>) {
        let mut reader = PeekReader::new(raw);
        let result = ServerResponse::decode(&mut reader, is_multi_ack);
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).unwrap();
        (result, rest)
    }

    #[test]
    fn nak() {
        let (result, rest) = decode(b"0008NAK\n", false);
        assert!(result.unwrap().acks.is_empty());
        assert!(rest.is_empty());
    }

    #[test]
    fn newline_is_invalid_pkt_len() {
        let (result, _) = decode(b"\n", false);
        assert_eq!(result.unwrap_err().to_string(), "invalid pkt-len found");
    }

    #[test]
    fn empty_stream_is_an_empty_response() {
        let (result, _) = decode(b"", false);
        assert_eq!(result.unwrap(), ServerResponse::new());
    }

    #[test]
    fn partial_line_is_unexpected_content() {
        let (result, _) = decode(b"000600\n", false);
        assert_eq!(result.unwrap_err().to_string(), r#"unexpected content "00""#);
    }

    #[test]
    fn single_ack() {
        let raw = format!("0031ACK {HASH}\n");
        let (result, _) = decode(raw.as_bytes(), false);
        assert_eq!(result.unwrap().acks, vec![ObjectId::from_hex(HASH).unwrap()]);
    }

    #[test]
    fn multiple_acks_stop_before_the_packfile() {
        for multi_ack in [false, true] {
            let raw = format!("0031ACK {ONES}\n0031ACK {HASH}\n00080PACK\n");
            let (result, rest) = decode(raw.as_bytes(), multi_ack);
            assert_eq!(
                result.unwrap().acks,
                vec![
                    ObjectId::from_hex(ONES).unwrap(),
                    ObjectId::from_hex(HASH).unwrap()
                ]
            );
            assert_eq!(rest, b"00080PACK\n");
        }
    }

    #[test]
    fn multiple_acks_stop_before_sideband_data() {
        let raw = format!("0031ACK {ONES}\n0031ACK {HASH}\n00080aaaa\n");
        let (result, rest) = decode(raw.as_bytes(), false);
        assert_eq!(result.unwrap().acks.len(), 2);
        assert_eq!(rest, b"00080aaaa\n");
    }

    #[test]
    fn nak_then_raw_pack() {
        let (result, rest) = decode(b"0008NAK\nPACK\x00\x00\x00\x02", false);
        assert!(result.unwrap().acks.is_empty());
        assert_eq!(rest, b"PACK\x00\x00\x00\x02");
    }

    #[test]
    fn short_ack_is_malformed() {
        let raw = "0029ACK 6ecf0ef2c2dffb796033e5a02219af86ec6584e\n";
        let (result, _) = decode(raw.as_bytes(), false);
        assert!(matches!(result, Err(ProtocolError::MalformedAck(_))));
    }

    #[test]
    fn flush_is_unexpected() {
        let (result, _) = decode(b"0000", false);
        assert!(matches!(result, Err(ProtocolError::UnexpectedFlush)));
    }

    #[test]
    fn encode_nak() {
        let mut buf = Vec::new();
        ServerResponse::new().encode(&mut buf, false).unwrap();
        assert_eq!(buf, b"0008NAK\n");
    }

    #[test]
    fn encode_single_ack() {
        let response = ServerResponse {
            acks: vec![ObjectId::from_hex(HASH).unwrap()],
        };
        let mut buf = Vec::new();
        response.encode(&mut buf, false).unwrap();
        assert_eq!(buf, format!("0031ACK {HASH}\n").into_bytes());
    }

    #[test]
    fn encode_many_acks_needs_multi_ack() {
        let response = ServerResponse {
            acks: vec![
                ObjectId::from_hex(ONES).unwrap(),
                ObjectId::from_hex(HASH).unwrap(),
            ],
        };
        let mut buf = Vec::new();
        let err = response.encode(&mut buf, false).unwrap_err();
        assert_eq!(
            err.to_string(),
            "multi_ack and multi_ack_detailed are not supported"
        );
        assert!(buf.is_empty());
    }
}
