//! Scene-graph convenience calls on top of [`Component::request`].
//!
//! All of these go out as `MessageFamily::Rsg` (correlated by `queryId`),
//! except [`Component::get_mediator_id`] which uses the mediator family.

use serde_json::{json, Map, Value};

use swmlink_core::error::{Result, SwmError};
use swmlink_core::protocol::MessageFamily;

use crate::component::Component;

pub const RSG_QUERY: &str = "RSGQuery";
pub const RSG_UPDATE: &str = "RSGUpdate";
pub const RSG_FUNCTION_BLOCK: &str = "RSGFunctionBlock";

/// Key naming the payload's semantic kind.
pub const WORLD_MODEL_TYPE: &str = "@worldmodeltype";

impl Component {
    /// Typed query (`GET_NODES`, `GET_ROOT_NODE`, ...). `params` keys are merged
    /// into the payload.
    pub async fn query(&self, query_type: &str, params: Map<String, Value>) -> Result<Value> {
        let mut payload = params;
        payload.insert(WORLD_MODEL_TYPE.into(), Value::String(RSG_QUERY.into()));
        payload.insert("query".into(), Value::String(query_type.into()));
        self.request(MessageFamily::Rsg, Value::Object(payload)).await
    }

    /// Graph update. `params` must carry a `node` entry.
    pub async fn update(&self, operation: &str, params: Map<String, Value>) -> Result<Value> {
        if !params.contains_key("node") {
            return Err(SwmError::Encode(format!(
                "update {operation} requires a `node` entry"
            )));
        }
        let mut payload = params;
        payload.insert(WORLD_MODEL_TYPE.into(), Value::String(RSG_UPDATE.into()));
        payload.insert("operation".into(), Value::String(operation.into()));
        self.request(MessageFamily::Rsg, Value::Object(payload)).await
    }

    pub async fn function_block(&self, name: &str, operation: &str, input: Value) -> Result<Value> {
        let payload = json!({
            WORLD_MODEL_TYPE: RSG_FUNCTION_BLOCK,
            "name": name,
            "operation": operation,
            "input": input,
        });
        self.request(MessageFamily::Rsg, payload).await
    }

    /// Id of the world model's root node. `None` when the reply reports no
    /// success or carries no `rootId`.
    pub async fn get_root_node_id(&self) -> Result<Option<String>> {
        let reply = self.query("GET_ROOT_NODE", Map::new()).await?;
        if !query_succeeded(&reply) {
            tracing::debug!(node = %self.name(), "GET_ROOT_NODE reported no success");
            return Ok(None);
        }
        Ok(reply.get("rootId").and_then(Value::as_str).map(str::to_owned))
    }

    /// First node whose attribute `key` equals `value`.
    pub async fn get_node_by_attribute(&self, key: &str, value: &str) -> Result<Option<String>> {
        let mut params = Map::new();
        params.insert("attributes".into(), json!([{ "key": key, "value": value }]));
        let reply = self.query("GET_NODES", params).await?;
        Ok(first_id(&reply))
    }

    /// Same as [`Component::get_node_by_attribute`], restricted to the
    /// subgraph below `subgraph_id`.
    pub async fn get_node_by_attribute_in_subgraph(
        &self,
        key: &str,
        value: &str,
        subgraph_id: &str,
    ) -> Result<Option<String>> {
        let mut params = Map::new();
        params.insert("subgraphId".into(), Value::String(subgraph_id.into()));
        params.insert("attributes".into(), json!([{ "key": key, "value": value }]));
        let reply = self.query("GET_NODES", params).await?;
        Ok(first_id(&reply))
    }

    /// Id of the mediator serving this group, read from the reply's `remote`.
    pub async fn get_mediator_id(&self) -> Result<Option<String>> {
        let reply = self.request(MessageFamily::Mediator, json!({})).await?;
        Ok(reply.get("remote").and_then(Value::as_str).map(str::to_owned))
    }
}

fn query_succeeded(reply: &Value) -> bool {
    reply.get("querySuccess").and_then(Value::as_bool).unwrap_or(false)
}

fn first_id(reply: &Value) -> Option<String> {
    reply
        .get("ids")
        .and_then(Value::as_array)
        .and_then(|ids| ids.first())
        .and_then(Value::as_str)
        .map(str::to_owned)
}
