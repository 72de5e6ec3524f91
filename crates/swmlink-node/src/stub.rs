//! Minimal world-model peer for the in-process bus.
//!
//! Answers just enough of the scene-graph vocabulary to exercise the request
//! path end to end (demo binary, tests). Replies carry their payload as JSON
//! text, the way the real world model sends them.

use serde_json::{json, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use swmlink_core::error::Result;
use swmlink_core::protocol::envelope::{MEDIATOR_ID_KEY, QUERY_ID_KEY};
use swmlink_core::protocol::{Envelope, MessageFamily, PeerEvent, ReplyKind};

use crate::api::{RSG_FUNCTION_BLOCK, RSG_QUERY, RSG_UPDATE, WORLD_MODEL_TYPE};
use crate::transport::{GroupTransport, LocalBus, MemoryTransport};

/// Name the stub announces on the bus.
pub const STUB_NAME: &str = "swm-stub";

pub struct WorldModelStub {
    uuid: String,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl WorldModelStub {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Leave the bus and wait for the task to finish.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for WorldModelStub {
    fn drop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Start a stub peer on `bus` that joins `group` and reports `root_id` as the
/// root node.
pub async fn spawn_world_model(bus: &LocalBus, group: &str, root_id: &str) -> Result<WorldModelStub> {
    let mut transport = bus.node(STUB_NAME);
    transport.set_header("type", "world_model");
    transport.start().await?;
    transport.join(group).await?;

    let uuid = transport.uuid().to_owned();
    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(serve(transport, group.to_owned(), root_id.to_owned(), stop_rx));

    tracing::info!(peer_id = %uuid, group, root_id, "world model stub started");
    Ok(WorldModelStub {
        uuid,
        stop_tx: Some(stop_tx),
        task: Some(task),
    })
}

async fn serve(
    mut transport: MemoryTransport,
    group: String,
    root_id: String,
    mut stop_rx: oneshot::Receiver<()>,
) {
    loop {
        let raw = tokio::select! {
            _ = &mut stop_rx => break,
            raw = transport.recv() => match raw {
                Some(raw) => raw,
                None => break,
            },
        };

        let body = match PeerEvent::decode(&raw) {
            Ok(PeerEvent::GroupMessage { body, .. }) => body,
            Ok(PeerEvent::DirectMessage { body, .. }) => body,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "stub skipped malformed event");
                continue;
            }
        };

        let Ok(request) = Envelope::decode(&body) else {
            continue;
        };
        let Some(reply) = answer(&request, &root_id, transport.uuid()) else {
            continue;
        };
        match reply.to_wire() {
            Ok(wire) => {
                if let Err(e) = transport.shout(&group, &wire).await {
                    tracing::warn!(error = %e, "stub reply failed");
                }
            }
            Err(e) => tracing::warn!(error = %e, "stub reply encode failed"),
        }
    }

    let _ = transport.leave(&group).await;
    transport.stop().await;
    tracing::info!("world model stub stopped");
}

/// Reply the stub would give to `request`, if any.
pub fn answer(request: &Envelope, root_id: &str, self_id: &str) -> Option<Envelope> {
    let payload = request.payload_document().ok()?;

    if request.msg_type == MessageFamily::Mediator.msg_type() {
        let uid = payload.get(MEDIATOR_ID_KEY)?.clone();
        return Some(reply(
            ReplyKind::MediatorUuid,
            MessageFamily::Mediator,
            json!({ MEDIATOR_ID_KEY: uid, "remote": self_id }),
        ));
    }
    if request.msg_type != MessageFamily::Rsg.msg_type() {
        return None;
    }

    let query_id = payload.get(QUERY_ID_KEY)?.clone();
    let kind = payload.get(WORLD_MODEL_TYPE).and_then(Value::as_str)?;
    match kind {
        RSG_QUERY => {
            let body = match payload.get("query").and_then(Value::as_str) {
                Some("GET_ROOT_NODE") => json!({
                    QUERY_ID_KEY: query_id,
                    "querySuccess": true,
                    "rootId": root_id,
                }),
                Some("GET_NODES") => json!({
                    QUERY_ID_KEY: query_id,
                    "querySuccess": true,
                    "ids": [],
                }),
                _ => json!({
                    QUERY_ID_KEY: query_id,
                    "querySuccess": false,
                }),
            };
            Some(reply(ReplyKind::QueryResult, MessageFamily::Rsg, body))
        }
        RSG_UPDATE => Some(reply(
            ReplyKind::UpdateResult,
            MessageFamily::Rsg,
            json!({ QUERY_ID_KEY: query_id, "updateSuccess": true }),
        )),
        RSG_FUNCTION_BLOCK => Some(reply(
            ReplyKind::FunctionBlockResult,
            MessageFamily::Rsg,
            json!({ QUERY_ID_KEY: query_id, "querySuccess": true, "output": {} }),
        )),
        _ => None,
    }
}

fn reply(kind: ReplyKind, family: MessageFamily, body: Value) -> Envelope {
    Envelope {
        metamodel: family.metamodel().to_owned(),
        model: family.model().to_owned(),
        msg_type: kind.as_str().to_owned(),
        payload: Value::String(body.to_string()),
    }
}
