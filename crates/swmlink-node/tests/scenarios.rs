#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::join_all;
use serde_json::json;
use tokio::time::Instant;

use swmlink_core::protocol::{MessageFamily, RawEvent};
use swmlink_node::actor::LoopState;
use swmlink_node::config::ComponentConfig;
use swmlink_node::transport::{GroupTransport, LocalBus};

use harness::*;

fn root_query() -> serde_json::Value {
    json!({"@worldmodeltype": "RSGQuery", "query": "GET_ROOT_NODE"})
}

#[tokio::test]
async fn reply_within_deadline_is_returned() {
    let bus = LocalBus::new();
    let mut wm = fake_world_model(&bus).await;
    let c = component(&bus, 2000).await;

    let started = Instant::now();
    let handle = c.send(MessageFamily::Rsg, root_query()).await.unwrap();
    let id = request_id(&next_shout(&mut wm).await);
    assert_eq!(id, handle.query_id());

    tokio::time::sleep(Duration::from_millis(100)).await;
    let reply = reply_wire("RSGQueryResult", json!({"queryId": id, "rootId": "abc-123"}));
    wm.shout(GROUP, &reply).await.unwrap();

    let got = c
        .wait_for_reply(handle, Duration::from_millis(2000))
        .await
        .unwrap();
    assert_eq!(got["rootId"], "abc-123");
    assert!(started.elapsed() < Duration::from_millis(2000));
    assert_eq!(c.pending_count(), 0);

    c.shutdown().await;
}

#[tokio::test]
async fn silent_peer_times_out_and_late_reply_is_ignored() {
    let bus = LocalBus::new();
    let mut wm = fake_world_model(&bus).await;
    let c = component(&bus, 2000).await;

    let started = Instant::now();
    let handle = c.send(MessageFamily::Rsg, root_query()).await.unwrap();
    let id = handle.query_id().to_owned();
    let _ = next_shout(&mut wm).await;

    let err = c
        .wait_for_reply(handle, Duration::from_millis(2000))
        .await
        .expect_err("no reply was sent");
    let elapsed = started.elapsed();
    assert!(err.is_timeout());
    assert_eq!(err.code().as_str(), "TIMEOUT");
    assert!(elapsed >= Duration::from_millis(2000), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(2500), "{elapsed:?}");

    assert!(!c.registry().resolve(&id, json!({"rootId": "late"})));

    // a late reply over the wire is dropped as well
    let reply = reply_wire("RSGQueryResult", json!({"queryId": id, "rootId": "late"}));
    wm.shout(GROUP, &reply).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // per-request timeout leaves the component up
    assert!(c.is_alive());
    assert_eq!(c.loop_state(), LoopState::Running);
    c.shutdown().await;
}

#[tokio::test]
async fn reply_for_second_request_leaves_first_pending() {
    let bus = LocalBus::new();
    let mut wm = fake_world_model(&bus).await;
    let c = component(&bus, 2000).await;

    let first = c.send(MessageFamily::Rsg, root_query()).await.unwrap();
    let second = c.send(MessageFamily::Rsg, root_query()).await.unwrap();
    assert_ne!(first.query_id(), second.query_id());
    let _ = next_shout(&mut wm).await;
    let second_id = request_id(&next_shout(&mut wm).await);
    assert_eq!(second_id, second.query_id());

    let reply = reply_wire("RSGQueryResult", json!({"queryId": second_id, "rootId": "two"}));
    wm.shout(GROUP, &reply).await.unwrap();

    let got = c
        .wait_for_reply(second, Duration::from_millis(2000))
        .await
        .unwrap();
    assert_eq!(got["rootId"], "two");
    assert!(c.registry().contains(first.query_id()));
    assert_eq!(c.pending_count(), 1);

    let err = c
        .wait_for_reply(first, Duration::from_millis(300))
        .await
        .expect_err("first never answered");
    assert!(err.is_timeout());
    assert_eq!(c.pending_count(), 0);
    c.shutdown().await;
}

#[tokio::test]
async fn timeout_counts_from_registration() {
    let bus = LocalBus::new();
    let _wm = fake_world_model(&bus).await;
    let c = component(&bus, 1000).await;

    let handle = c.send(MessageFamily::Rsg, root_query()).await.unwrap();
    let registered = handle.registered_at();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let waiting = Instant::now();
    let err = c
        .wait_for_reply(handle, Duration::from_millis(300))
        .await
        .expect_err("no reply");
    assert!(err.is_timeout());
    assert!(registered.elapsed() >= Duration::from_millis(300));
    assert!(waiting.elapsed() < Duration::from_millis(250), "{:?}", waiting.elapsed());
    c.shutdown().await;
}

#[tokio::test]
async fn unbounded_timeout_waits_for_reply() {
    let bus = LocalBus::new();
    let _wm = fake_world_model(&bus).await;
    let c = component(&bus, 1000).await;

    let handle = c.send(MessageFamily::Rsg, root_query()).await.unwrap();
    let id = handle.query_id().to_owned();
    let registry = c.registry().clone();
    let resolver = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        registry.resolve(&id, json!({"rootId": "forever"}))
    });

    let got = c.wait_for_reply(handle, Duration::MAX).await.unwrap();
    assert_eq!(got["rootId"], "forever");
    assert!(resolver.await.unwrap());
    c.shutdown().await;
}

#[tokio::test]
async fn request_uses_configured_timeout() {
    let bus = LocalBus::new();
    let _wm = fake_world_model(&bus).await;
    let c = component(&bus, 250).await;

    let started = Instant::now();
    let err = c
        .request(MessageFamily::Rsg, root_query())
        .await
        .expect_err("nobody answers");
    assert!(err.is_timeout());
    assert!(started.elapsed() >= Duration::from_millis(250));
    c.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_waiters_get_their_own_replies() {
    const N: usize = 8;
    let bus = LocalBus::new();
    let mut wm = fake_world_model(&bus).await;
    let c = component(&bus, 2000).await;

    let mut handles = Vec::new();
    for n in 0..N {
        let payload = json!({"@worldmodeltype": "RSGQuery", "query": "GET_NODES", "n": n});
        handles.push(c.send(MessageFamily::Rsg, payload).await.unwrap());
    }

    let mut ids = Vec::new();
    for _ in 0..N {
        ids.push(request_id(&next_shout(&mut wm).await));
    }
    for (n, id) in ids.iter().enumerate().rev() {
        let reply = reply_wire("RSGQueryResult", json!({"queryId": id, "n": n}));
        wm.shout(GROUP, &reply).await.unwrap();
    }

    let waits = handles
        .into_iter()
        .map(|h| c.wait_for_reply(h, Duration::from_millis(2000)));
    let replies = join_all(waits).await;
    for (n, reply) in replies.into_iter().enumerate() {
        assert_eq!(reply.unwrap()["n"], n);
    }
    c.shutdown().await;
}

#[tokio::test]
async fn shutdown_releases_blocked_waiter() {
    let bus = LocalBus::new();
    let _wm = fake_world_model(&bus).await;
    let c = Arc::new(component(&bus, 10_000).await);

    let handle = c.send(MessageFamily::Rsg, root_query()).await.unwrap();
    let waiter_c = c.clone();
    let waiter = tokio::spawn(async move {
        waiter_c
            .wait_for_reply(handle, Duration::from_secs(10))
            .await
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    c.shutdown().await;
    let err = waiter.await.unwrap().expect_err("released without reply");
    assert_eq!(err.code().as_str(), "STOPPED");
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(c.pending_count(), 0);
    assert_eq!(c.loop_state(), LoopState::Stopped);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn registrations_racing_shutdown_are_released() {
    let bus = LocalBus::new();
    let c = Arc::new(component(&bus, 10_000).await);

    let mut senders = Vec::new();
    for _ in 0..4 {
        let c = c.clone();
        senders.push(tokio::spawn(async move {
            let mut handles = Vec::new();
            for _ in 0..500 {
                if let Ok((h, _)) = c.encode_request(MessageFamily::Rsg, root_query()) {
                    handles.push(h);
                }
                tokio::task::yield_now().await;
            }
            handles
        }));
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
    c.shutdown().await;

    let mut registered = Vec::new();
    for s in senders {
        registered.extend(s.await.unwrap());
    }
    assert_eq!(c.pending_count(), 0);

    // every registration that succeeded was drained, none waits for a deadline
    for h in registered {
        let err = tokio::time::timeout(Duration::from_secs(1), h.reply())
            .await
            .expect("waiter must be released")
            .expect_err("no reply was ever sent");
        assert_eq!(err.code().as_str(), "STOPPED");
    }
}

#[tokio::test]
async fn shutdown_is_idempotent_and_leaves_the_bus() {
    let bus = LocalBus::new();
    let _wm = fake_world_model(&bus).await;
    let c = component(&bus, 1000).await;
    let node_id = c.node_id().to_owned();
    assert!(bus.members(GROUP).contains(&node_id));
    assert_eq!(bus.peer_count(), 2);

    c.shutdown().await;
    c.shutdown().await;

    assert!(!c.is_alive());
    assert!(!bus.members(GROUP).contains(&node_id));
    assert_eq!(bus.peer_count(), 1);

    let err = c
        .send(MessageFamily::Rsg, root_query())
        .await
        .expect_err("stopped");
    assert_eq!(err.code().as_str(), "STOPPED");
    assert!(c.shout("{}").await.is_err());
}

#[tokio::test]
async fn shutdown_on_timeout_is_opt_in() {
    let bus = LocalBus::new();
    let _wm = fake_world_model(&bus).await;
    let mut cfg = ComponentConfig::new("strict", 200);
    cfg.shutdown_on_timeout = true;
    let c = component_with(&bus, cfg).await;

    let err = c
        .request(MessageFamily::Rsg, root_query())
        .await
        .expect_err("no reply");
    assert!(err.is_timeout());
    assert!(!c.is_alive());
    assert_eq!(c.loop_state(), LoopState::Stopped);
}

#[tokio::test]
async fn malformed_events_do_not_stop_the_loop() {
    let bus = LocalBus::new();
    let mut wm = fake_world_model(&bus).await;
    let c = component(&bus, 2000).await;
    let me = c.node_id().to_owned();

    assert!(bus.inject(&me, RawEvent::new("SHOUT", vec![Bytes::from_static(b"one frame")])));
    assert!(bus.inject(
        &me,
        RawEvent::new(
            "WHISPER",
            vec![
                Bytes::from_static(b"P"),
                Bytes::from_static(b"n"),
                Bytes::from_static(&[0xff, 0xfe]),
            ],
        ),
    ));
    assert!(bus.inject(&me, RawEvent::new("STOP", vec![])));
    assert!(bus.inject(&me, RawEvent::shout("P", "n", GROUP, "not json")));
    assert!(bus.inject(&me, RawEvent::shout("P", "n", GROUP, r#"{"type":"RSGQueryResult"}"#)));

    let handle = c.send(MessageFamily::Rsg, root_query()).await.unwrap();
    let id = request_id(&next_shout(&mut wm).await);
    let reply = reply_wire("RSGQueryResult", json!({"queryId": id, "rootId": "still-here"}));
    wm.shout(GROUP, &reply).await.unwrap();

    let got = c
        .wait_for_reply(handle, Duration::from_millis(2000))
        .await
        .unwrap();
    assert_eq!(got["rootId"], "still-here");
    assert_eq!(c.loop_state(), LoopState::Running);
    c.shutdown().await;
}

#[tokio::test]
async fn rejected_requests_leave_nothing_pending() {
    let bus = LocalBus::new();
    let c = component(&bus, 1000).await;
    let err = c.whisper("NO-SUCH-PEER", "{}").await.expect_err("unknown peer");
    assert_eq!(err.code().as_str(), "TRANSPORT");

    let err = c
        .send(MessageFamily::Rsg, json!(["not", "an", "object"]))
        .await
        .expect_err("payload must be an object");
    assert_eq!(err.code().as_str(), "BAD_MESSAGE");
    assert_eq!(c.pending_count(), 0);
    c.shutdown().await;
}

#[tokio::test]
async fn encode_request_registers_without_sending() {
    let bus = LocalBus::new();
    let c = component(&bus, 1000).await;

    let payload = json!({"@worldmodeltype": "RSGQuery", "query": "GET_NODES", "queryId": "fixed-1"});
    let (handle, wire) = c.encode_request(MessageFamily::Rsg, payload.clone()).unwrap();
    assert_eq!(handle.query_id(), "fixed-1");
    assert_eq!(request_id(&wire), "fixed-1");
    assert_eq!(c.pending_count(), 1);

    let err = c
        .encode_request(MessageFamily::Rsg, payload)
        .expect_err("id still live");
    assert_eq!(err.code().as_str(), "DUPLICATE_ID");

    assert!(c.cancel(&handle));
    assert!(!c.cancel(&handle));
    c.shutdown().await;
}

#[tokio::test]
async fn direct_reply_matches_when_enabled() {
    let bus = LocalBus::new();
    let mut wm = fake_world_model(&bus).await;
    let mut cfg = ComponentConfig::new("client", 2000);
    cfg.match_direct_messages = true;
    let c = component_with(&bus, cfg).await;

    let handle = c.send(MessageFamily::Rsg, root_query()).await.unwrap();
    let id = request_id(&next_shout(&mut wm).await);
    let reply = reply_wire("RSGQueryResult", json!({"queryId": id, "rootId": "direct"}));
    wm.whisper(c.node_id(), &reply).await.unwrap();

    let got = c
        .wait_for_reply(handle, Duration::from_millis(2000))
        .await
        .unwrap();
    assert_eq!(got["rootId"], "direct");
    c.shutdown().await;
}
