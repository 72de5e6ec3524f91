//! Transport event frame decoding.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::BTreeMap;

use bytes::Bytes;

use swmlink_core::protocol::event::{PeerEvent, RawEvent};

#[test]
fn enter_carries_headers_and_address() {
    let mut headers = BTreeMap::new();
    headers.insert("type".to_string(), "ground_station".to_string());
    let raw = RawEvent::enter("A1B2", "operator0", &headers, "tcp://10.0.0.2:49152");

    match PeerEvent::decode(&raw).unwrap() {
        PeerEvent::PeerJoined { peer_id, name, headers, address } => {
            assert_eq!(peer_id, "A1B2");
            assert_eq!(name, "operator0");
            assert_eq!(headers.get("type").map(String::as_str), Some("ground_station"));
            assert_eq!(address, "tcp://10.0.0.2:49152");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn lifecycle_and_message_kinds() {
    let cases = [
        (RawEvent::exit("p", "n"), "exit"),
        (RawEvent::evasive("p", "n"), "evasive"),
        (RawEvent::join("p", "n", "local"), "join"),
        (RawEvent::leave("p", "n", "local"), "leave"),
        (RawEvent::whisper("p", "n", "hi"), "whisper"),
        (RawEvent::shout("p", "n", "local", "{}"), "shout"),
    ];

    for (raw, label) in cases {
        let ev = PeerEvent::decode(&raw).unwrap();
        assert_eq!(ev.peer_id(), Some("p"), "case={label}");
        let ok = matches!(
            (label, &ev),
            ("exit", PeerEvent::PeerLeft { .. })
                | ("evasive", PeerEvent::PeerUnresponsive { .. })
                | ("join", PeerEvent::GroupJoined { .. })
                | ("leave", PeerEvent::GroupLeft { .. })
                | ("whisper", PeerEvent::DirectMessage { .. })
                | ("shout", PeerEvent::GroupMessage { .. })
        );
        assert!(ok, "case={label} got {ev:?}");
    }
}

#[test]
fn unknown_kind_is_unrecognized_not_error() {
    let raw = RawEvent::new("STOP", vec![]);
    assert_eq!(
        PeerEvent::decode(&raw).unwrap(),
        PeerEvent::Unrecognized { kind: "STOP".into() }
    );
}

#[test]
fn malformed_frames_are_rejected() {
    // SHOUT with a missing body frame
    let short = RawEvent::new("SHOUT", vec![Bytes::from_static(b"p"), Bytes::from_static(b"n")]);
    assert_eq!(PeerEvent::decode(&short).unwrap_err().code().as_str(), "BAD_MESSAGE");

    // invalid utf-8 in the name frame
    let bad_utf8 = RawEvent::new(
        "EXIT",
        vec![Bytes::from_static(b"p"), Bytes::from_static(&[0xff, 0xfe])],
    );
    assert!(PeerEvent::decode(&bad_utf8).is_err());

    // headers frame that is not a JSON object of strings
    let bad_headers = RawEvent::new(
        "ENTER",
        vec![
            Bytes::from_static(b"p"),
            Bytes::from_static(b"n"),
            Bytes::from_static(b"[1,2]"),
            Bytes::from_static(b"inproc://p"),
        ],
    );
    assert!(PeerEvent::decode(&bad_headers).is_err());
}
