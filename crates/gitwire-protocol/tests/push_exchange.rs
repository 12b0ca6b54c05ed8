//! End-to-end push status exchange.

use gitwire_protocol::{CommandStatus, PktLineReader, ProtocolError, ReportStatus};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn report(unpack: &str, commands: &[(&str, &str)]) -> ReportStatus {
    ReportStatus {
        unpack_status: unpack.to_string(),
        command_statuses: commands
            .iter()
            .map(|(r, s)| CommandStatus::new(*r, *s))
            .collect(),
    }
}

#[test]
fn successful_push() {
    let sent = report(
        "ok",
        &[("refs/heads/main", "ok"), ("refs/tags/v1.0.0", "ok")],
    );
    let mut wire = Vec::new();
    sent.encode(&mut wire).unwrap();

    let received = ReportStatus::decode(wire.as_slice()).unwrap();
    assert_eq!(received, sent);
    assert!(received.error().is_none());
}

#[test]
fn rejected_reference() {
    let sent = report(
        "ok",
        &[
            ("refs/heads/main", "ok"),
            ("refs/heads/protected", "pre-receive hook declined"),
        ],
    );
    let mut wire = Vec::new();
    sent.encode(&mut wire).unwrap();

    let received = ReportStatus::decode(wire.as_slice()).unwrap();
    match received.error() {
        Some(ProtocolError::CommandError { reference, status }) => {
            assert_eq!(reference, "refs/heads/protected");
            assert_eq!(status, "pre-receive hook declined");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn failed_unpack() {
    let sent = report("index-pack abnormal exit", &[("refs/heads/main", "unpacker error")]);
    let mut wire = Vec::new();
    sent.encode(&mut wire).unwrap();

    let received = ReportStatus::decode(wire.as_slice()).unwrap();
    assert_eq!(
        received.error().unwrap().to_string(),
        "unpack error: index-pack abnormal exit"
    );
}

#[test]
fn report_is_pkt_line_framed() {
    let mut wire = Vec::new();
    report("ok", &[("refs/heads/main", "ok")])
        .encode(&mut wire)
        .unwrap();

    let packets = PktLineReader::new(wire.as_slice()).read_until_flush().unwrap();
    let lines: Vec<&str> = packets.iter().filter_map(|p| p.as_str()).collect();
    assert_eq!(lines, ["unpack ok", "ok refs/heads/main"]);
    assert!(packets.iter().all(|p| p.payload().ends_with(b"\n")));
}

#[test]
fn truncated_report() {
    let mut wire = Vec::new();
    report("ok", &[("refs/heads/main", "ok")])
        .encode(&mut wire)
        .unwrap();
    wire.truncate(wire.len() - 4);

    let err = ReportStatus::decode(wire.as_slice()).unwrap_err();
    assert!(matches!(err, ProtocolError::MissingFlush));
}

fn ref_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("refs/heads/main".to_string()),
        Just("refs/tags/v1.0.0".to_string()),
        ("[a-z]{1,30}").prop_map(|s| format!("refs/heads/{s}")),
    ]
}

fn status_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("ok".to_string()),
        ("[a-z]{1,10}( [a-z]{1,10}){0,3}"),
    ]
}

proptest! {
    /// Property: encode then decode is the identity.
    #[test]
    fn prop_report_status_roundtrip(
        unpack in status_strategy(),
        commands in prop::collection::vec((ref_name_strategy(), status_strategy()), 0..20),
    ) {
        let sent = ReportStatus {
            unpack_status: unpack,
            command_statuses: commands
                .into_iter()
                .map(|(r, s)| CommandStatus::new(r, s))
                .collect(),
        };
        let mut wire = Vec::new();
        sent.encode(&mut wire).unwrap();
        prop_assert_eq!(ReportStatus::decode(wire.as_slice()).unwrap(), sent);
    }
}
