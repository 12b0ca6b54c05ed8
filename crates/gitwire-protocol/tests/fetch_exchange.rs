//! End-to-end fetch exchange.
//!
//! A client encodes an upload request, a server decodes it and answers
//! with an upload-pack response, and the client reads the packfile back.

use gitwire_protocol::{
    Capability, Channel, Depth, Muxer, NopCloser, ProtocolConfig, ProtocolError, ServerResponse,
    ShallowUpdate, Sideband, UploadPackResponse, UploadRequest, UploadRequestDecoder,
};
use gitwire_types::ObjectId;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, Mutex};

const PACK: &[u8] = b"PACK\x00\x00\x00\x02\x00\x00\x00\x00 pretend objects";

fn oid(byte: u8) -> ObjectId {
    ObjectId::from_bytes([byte; 20])
}

fn client_request(caps: &[Capability], depth: Depth) -> UploadRequest {
    let mut request = UploadRequest::new();
    request.add_want(oid(0x11));
    request.add_want(oid(0x22));
    request.add_want(oid(0x11));
    request.depth = depth;
    for cap in caps {
        request.capabilities.set(cap.clone(), None::<&str>).unwrap();
    }
    request
}

#[derive(Clone, Default)]
struct Progress(Arc<Mutex<Vec<u8>>>);

impl Write for Progress {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

// ============================================================================
// Plain fetch
// ============================================================================

#[test]
fn full_fetch_without_sideband() {
    let request = client_request(&[Capability::OfsDelta], Depth::default());
    request.validate().unwrap();

    let mut wire = Vec::new();
    request.encode(&mut wire).unwrap();

    // Server side.
    let received = UploadRequest::decode(wire.as_slice()).unwrap();
    assert_eq!(received, request);
    assert_eq!(received.wants, vec![oid(0x11), oid(0x22)]);

    let mut answer = Vec::new();
    let mut response = UploadPackResponse::with_packfile(&received, NopCloser(PACK));
    response.encode(&mut answer).unwrap();
    response.close().unwrap();
    assert!(answer.starts_with(b"0008NAK\n"));

    // Client side.
    let mut response = UploadPackResponse::new(&request);
    response.decode(NopCloser(Cursor::new(answer))).unwrap();
    let mut pack = Vec::new();
    response.read_to_end(&mut pack).unwrap();
    response.close().unwrap();
    response.close().unwrap();

    assert!(response.server_response.acks.is_empty());
    assert_eq!(pack, PACK);
}

#[test]
fn shallow_fetch_carries_the_shallow_update() {
    let request = client_request(&[Capability::Shallow], Depth::Commits(1));
    request.validate().unwrap();

    let mut wire = Vec::new();
    request.encode(&mut wire).unwrap();
    let received = UploadRequest::decode(wire.as_slice()).unwrap();
    assert_eq!(received.depth, Depth::Commits(1));

    let mut answer = Vec::new();
    let mut response = UploadPackResponse::with_packfile(&received, NopCloser(PACK));
    response.shallow_update = ShallowUpdate {
        shallows: vec![oid(0x33)],
        unshallows: Vec::new(),
    };
    response.server_response = ServerResponse {
        acks: vec![oid(0x44)],
    };
    response.encode(&mut answer).unwrap();

    let mut response = UploadPackResponse::new(&request);
    response.decode(NopCloser(Cursor::new(answer))).unwrap();
    assert_eq!(response.shallow_update.shallows, vec![oid(0x33)]);
    assert_eq!(response.server_response.acks, vec![oid(0x44)]);

    let mut pack = Vec::new();
    response.read_to_end(&mut pack).unwrap();
    assert_eq!(pack, PACK);
}

// ============================================================================
// Side-band fetch
// ============================================================================

#[test]
fn sideband_fetch_splits_progress_from_pack_data() {
    let request = client_request(&[Capability::Sideband64k, Capability::OfsDelta], Depth::default());
    assert_eq!(request.sideband(), Some(Sideband::Sideband64k));

    let mut body = Vec::new();
    {
        let mut muxer = Muxer::new(Sideband::Sideband64k, &mut body);
        muxer
            .write_channel(Channel::ProgressMessage, b"Enumerating objects: 3\n")
            .unwrap();
        muxer.write_all(&PACK[..8]).unwrap();
        muxer
            .write_channel(Channel::ProgressMessage, b"Total 3\n")
            .unwrap();
        muxer.write_all(&PACK[8..]).unwrap();
        muxer.finish().unwrap();
    }

    let mut answer = Vec::new();
    let mut server = UploadPackResponse::with_packfile(&request, NopCloser(body.as_slice()));
    server.encode(&mut answer).unwrap();

    let progress = Progress::default();
    let mut client = UploadPackResponse::new(&request).with_progress(progress.clone());
    client.decode(NopCloser(Cursor::new(answer))).unwrap();

    let mut pack = Vec::new();
    client.read_to_end(&mut pack).unwrap();
    assert_eq!(pack, PACK);
    assert_eq!(
        progress.0.lock().unwrap().as_slice(),
        b"Enumerating objects: 3\nTotal 3\n"
    );
}

#[test]
fn sideband_error_reaches_the_reader() {
    let request = client_request(&[Capability::Sideband], Depth::default());

    let mut answer = b"0008NAK\n".to_vec();
    {
        let mut muxer = Muxer::new(Sideband::Sideband, &mut answer);
        muxer.write_all(b"PACK").unwrap();
        muxer
            .write_channel(Channel::ErrorMessage, b"upload-pack: aborting\n")
            .unwrap();
    }

    let mut client = UploadPackResponse::new(&request);
    client.decode(NopCloser(Cursor::new(answer))).unwrap();

    let mut pack = Vec::new();
    let err = client.read_to_end(&mut pack).unwrap_err();
    assert_eq!(pack, b"PACK");
    match ProtocolError::from_io_ref(&err) {
        Some(ProtocolError::SidebandError(text)) => assert_eq!(text, "upload-pack: aborting\n"),
        other => panic!("unexpected error: {other:?}"),
    }
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn strict_server_rejects_unknown_capabilities() {
    let mut request = client_request(&[Capability::OfsDelta], Depth::default());
    request
        .capabilities
        .set(Capability::parse("x-experimental"), None::<&str>)
        .unwrap();
    let mut wire = Vec::new();
    request.encode(&mut wire).unwrap();

    let config = ProtocolConfig::from_json(r#"{"strict_capabilities": true}"#).unwrap();
    let err = UploadRequestDecoder::new(wire.as_slice())
        .with_config(&config)
        .decode()
        .unwrap_err();
    assert!(matches!(err, ProtocolError::InvalidCapability(_)));
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn object_id_strategy() -> impl Strategy<Value = ObjectId> {
    prop::array::uniform20(any::<u8>()).prop_map(ObjectId::from_bytes)
}

fn depth_strategy() -> impl Strategy<Value = Depth> {
    prop_oneof![
        Just(Depth::Commits(0)),
        (1u32..10_000).prop_map(Depth::Commits),
        ("[a-z]{1,20}").prop_map(|s| Depth::Reference(format!("refs/heads/{s}").into())),
    ]
}

proptest! {
    /// Property: a request survives the wire unchanged.
    #[test]
    fn prop_upload_request_roundtrip(
        wants in prop::collection::vec(object_id_strategy(), 1..20),
        shallows in prop::collection::vec(object_id_strategy(), 0..10),
        depth in depth_strategy(),
        multi_ack in any::<bool>(),
    ) {
        let mut request = UploadRequest::new();
        for want in wants {
            request.add_want(want);
        }
        request.shallows = shallows;
        request.depth = depth;
        if multi_ack {
            request.capabilities.set(Capability::MultiAck, None::<&str>).unwrap();
        }

        let mut wire = Vec::new();
        request.encode(&mut wire).unwrap();
        let decoded = UploadRequest::decode(wire.as_slice()).unwrap();
        prop_assert_eq!(decoded, request);
    }

    /// Property: decoding arbitrary bytes never panics.
    #[test]
    fn prop_upload_request_decode_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = UploadRequest::decode(data.as_slice());
    }
}
