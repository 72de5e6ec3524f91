//! Wire envelope (JSON) and correlation-id handling.
//!
//! Every message on the group is `{metamodel, model, type, payload}`. Requests
//! carry a correlation id inside `payload` (`queryId`, or `UID` for the
//! mediator family) and the matching reply echoes it back.
//!
//! Decoding rules:
//! - All four envelope fields are mandatory; `metamodel`/`model`/`type` must be strings.
//! - A message missing any of them is rejected as a whole, never partially read.
//! - Extra top-level keys are ignored.

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Result, SwmError};

/// Correlation key used by all RSG message families.
pub const QUERY_ID_KEY: &str = "queryId";
/// Correlation key used by the legacy mediator family.
pub const MEDIATOR_ID_KEY: &str = "UID";

/// Outgoing message family; fixes the envelope header and the correlation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFamily {
    /// RSG queries, updates and function-block calls.
    Rsg,
    /// Mediator uuid lookup.
    Mediator,
}

impl MessageFamily {
    pub fn metamodel(self) -> &'static str {
        match self {
            MessageFamily::Rsg => "SHERPA",
            MessageFamily::Mediator => "sherpa_mgs",
        }
    }

    pub fn model(self) -> &'static str {
        match self {
            MessageFamily::Rsg => "RSGQuery",
            MessageFamily::Mediator => "http://kul/query_mediator_uuid.json",
        }
    }

    pub fn msg_type(self) -> &'static str {
        match self {
            MessageFamily::Rsg => "RSGQuery",
            MessageFamily::Mediator => "query_mediator_uuid",
        }
    }

    pub fn correlation_key(self) -> &'static str {
        match self {
            MessageFamily::Rsg => QUERY_ID_KEY,
            MessageFamily::Mediator => MEDIATOR_ID_KEY,
        }
    }
}

/// Reply vocabulary understood by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    QueryResult,
    UpdateResult,
    FunctionBlockResult,
    /// Unsolicited broadcast; never resolves a request.
    Monitor,
    /// Legacy mediator reply, correlated by `UID`.
    MediatorUuid,
}

impl ReplyKind {
    /// Map an envelope `type` to a reply kind. Unknown types yield `None`.
    pub fn from_type(msg_type: &str) -> Option<Self> {
        match msg_type {
            "RSGQueryResult" => Some(ReplyKind::QueryResult),
            "RSGUpdateResult" => Some(ReplyKind::UpdateResult),
            "RSGFunctionBlockResult" => Some(ReplyKind::FunctionBlockResult),
            "RSGMonitor" => Some(ReplyKind::Monitor),
            "mediator_uuid" => Some(ReplyKind::MediatorUuid),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReplyKind::QueryResult => "RSGQueryResult",
            ReplyKind::UpdateResult => "RSGUpdateResult",
            ReplyKind::FunctionBlockResult => "RSGFunctionBlockResult",
            ReplyKind::Monitor => "RSGMonitor",
            ReplyKind::MediatorUuid => "mediator_uuid",
        }
    }

    /// Payload key holding the correlation id; `None` for monitor messages.
    pub fn correlation_key(self) -> Option<&'static str> {
        match self {
            ReplyKind::Monitor => None,
            ReplyKind::MediatorUuid => Some(MEDIATOR_ID_KEY),
            _ => Some(QUERY_ID_KEY),
        }
    }
}

/// Four-field wire envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub metamodel: String,
    pub model: String,
    /// Message type (field name is `type` in JSON).
    #[serde(rename = "type")]
    pub msg_type: String,
    /// Domain content, opaque to the protocol engine.
    pub payload: Value,
}

impl Envelope {
    /// Wrap a payload with the fixed header of `family`.
    pub fn wrap(family: MessageFamily, payload: Value) -> Self {
        Self {
            metamodel: family.metamodel().to_owned(),
            model: family.model().to_owned(),
            msg_type: family.msg_type().to_owned(),
            payload,
        }
    }

    /// Decode wire text. Either all four fields are present or this fails.
    pub fn decode(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)
            .map_err(|e| SwmError::Decode(format!("invalid envelope json: {e}")))?;
        let Value::Object(mut obj) = root else {
            return Err(SwmError::Decode("envelope must be a JSON object".into()));
        };

        let metamodel = take_str(&mut obj, "metamodel")?;
        let model = take_str(&mut obj, "model")?;
        let msg_type = take_str(&mut obj, "type")?;
        let payload = obj
            .remove("payload")
            .ok_or_else(|| SwmError::Decode("missing field `payload`".into()))?;

        Ok(Self {
            metamodel,
            model,
            msg_type,
            payload,
        })
    }

    /// Serialize to wire text.
    pub fn to_wire(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|e| SwmError::Encode(format!("envelope json encode failed: {e}")))
    }

    /// Payload as a JSON document.
    ///
    /// Peers send the payload either inline or as embedded JSON text; both
    /// forms resolve to the same document here.
    pub fn payload_document(&self) -> Result<Value> {
        match &self.payload {
            Value::String(text) => serde_json::from_str(text)
                .map_err(|e| SwmError::Decode(format!("payload text is not json: {e}"))),
            other => Ok(other.clone()),
        }
    }
}

fn take_str(obj: &mut Map<String, Value>, key: &'static str) -> Result<String> {
    match obj.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(SwmError::Decode(format!("field `{key}` must be a string"))),
        None => Err(SwmError::Decode(format!("missing field `{key}`"))),
    }
}

/// Read the correlation id stored under `key`, if it is a string.
pub fn correlation_id<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

/// Result of [`encode`]: the envelope plus the id it was registered under.
#[derive(Debug, Clone)]
pub struct Encoded {
    pub envelope: Envelope,
    pub correlation_id: String,
}

impl Encoded {
    pub fn to_wire(&self) -> Result<String> {
        self.envelope.to_wire()
    }
}

/// Wrap `payload` for `family`, reusing its correlation id or injecting a new one.
///
/// The returned `correlation_id` is exactly the value written into the payload.
pub fn encode(family: MessageFamily, mut payload: Value) -> Result<Encoded> {
    let key = family.correlation_key();
    let obj = payload
        .as_object_mut()
        .ok_or_else(|| SwmError::Encode("payload must be a JSON object".into()))?;

    let correlation_id = match obj.get(key) {
        Some(Value::String(id)) if !id.is_empty() => id.clone(),
        Some(_) => {
            return Err(SwmError::Encode(format!(
                "`{key}` must be a non-empty string"
            )))
        }
        None => {
            let id = Uuid::new_v4().to_string();
            obj.insert(key.to_owned(), Value::String(id.clone()));
            tracing::trace!(query_id = %id, key, "injected correlation id");
            id
        }
    };

    Ok(Encoded {
        envelope: Envelope::wrap(family, payload),
        correlation_id,
    })
}

/// [`encode`] for a payload given as JSON text.
pub fn encode_str(family: MessageFamily, payload: &str) -> Result<Encoded> {
    let value: Value = serde_json::from_str(payload)
        .map_err(|e| SwmError::Encode(format!("payload is not json: {e}")))?;
    encode(family, value)
}
