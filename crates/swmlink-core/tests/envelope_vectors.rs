//! Envelope decode vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use swmlink_core::protocol::envelope::{correlation_id, Envelope, ReplyKind};

use vector_loader::load;

#[test]
fn envelope_vectors() {
    let files = [
        "query_result_inline.json",
        "query_result_text_payload.json",
        "mediator_reply.json",
        "missing_payload.json",
        "missing_type.json",
        "non_string_model.json",
        "not_json.json",
        "array_root.json",
    ];

    for f in files {
        let v = load(f);
        let res = Envelope::decode(&v.wire);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.code().as_str(), err.code, "vector={}", v.description);
            continue;
        }

        let env = res.expect("expected ok envelope");
        let ex = v.expect.expect("missing expect block");

        assert_eq!(env.metamodel, ex["metamodel"].as_str().unwrap(), "vector={}", v.description);
        assert_eq!(env.model, ex["model"].as_str().unwrap(), "vector={}", v.description);
        assert_eq!(env.msg_type, ex["type"].as_str().unwrap(), "vector={}", v.description);

        let kind = ReplyKind::from_type(&env.msg_type).expect("known reply type");
        let key = kind.correlation_key().expect("correlated reply");
        let doc = env.payload_document().unwrap();

        let want_id = ex
            .get("query_id")
            .or_else(|| ex.get("uid"))
            .and_then(|v| v.as_str())
            .unwrap();
        assert_eq!(correlation_id(&doc, key), Some(want_id), "vector={}", v.description);

        if let Some(root) = ex.get("root_id") {
            assert_eq!(doc["rootId"], *root, "vector={}", v.description);
        }
    }
}

#[test]
fn unknown_type_is_not_a_reply_kind() {
    assert!(ReplyKind::from_type("SomethingUnheardOf").is_none());
    assert!(ReplyKind::from_type("RSGQuery").is_none());
    assert_eq!(ReplyKind::Monitor.correlation_key(), None);
    assert_eq!(ReplyKind::MediatorUuid.correlation_key(), Some("UID"));
}

#[test]
fn wire_has_exactly_four_keys() {
    let env = Envelope::decode(
        r#"{"metamodel":"SHERPA","model":"RSGQuery","type":"RSGUpdateResult","payload":{"queryId":"q"}}"#,
    )
    .unwrap();
    let back: serde_json::Value = serde_json::from_str(&env.to_wire().unwrap()).unwrap();
    let obj = back.as_object().unwrap();
    assert_eq!(obj.len(), 4);
    assert_eq!(obj["type"], "RSGUpdateResult");
}

#[test]
fn bad_payload_text_is_rejected() {
    let env = Envelope::decode(
        r#"{"metamodel":"SHERPA","model":"RSGQuery","type":"RSGMonitor","payload":"not json"}"#,
    )
    .unwrap();
    let err = env.payload_document().expect_err("payload text must be json");
    assert_eq!(err.code().as_str(), "BAD_MESSAGE");
}
