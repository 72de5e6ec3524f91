use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use swmlink_core::error::{Result, SwmError};

/// Group joined when the config names none.
pub const DEFAULT_GROUP: &str = "local";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ComponentConfig {
    /// Node name announced to peers.
    pub short_name: String,

    /// Default request timeout in milliseconds.
    pub timeout: i64,

    #[serde(default = "default_group")]
    pub group: String,

    #[serde(default = "default_poll_quantum_ms")]
    pub poll_quantum_ms: u64,

    #[serde(default)]
    pub join_settle_ms: u64,

    #[serde(default)]
    pub match_direct_messages: bool,

    /// Tear the whole component down when any request times out.
    #[serde(default)]
    pub shutdown_on_timeout: bool,

    /// Remaining keys, published verbatim as transport headers.
    #[serde(flatten)]
    pub headers: BTreeMap<String, Value>,
}

impl ComponentConfig {
    pub fn new(short_name: impl Into<String>, timeout_ms: i64) -> Self {
        Self {
            short_name: short_name.into(),
            timeout: timeout_ms,
            group: default_group(),
            poll_quantum_ms: default_poll_quantum_ms(),
            join_settle_ms: 0,
            match_direct_messages: false,
            shutdown_on_timeout: false,
            headers: BTreeMap::new(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.short_name.trim().is_empty() {
            return Err(SwmError::InvalidConfig("short-name must not be empty".into()));
        }
        if self.timeout <= 0 {
            return Err(SwmError::InvalidConfig(format!(
                "timeout must be > 0 (got {})",
                self.timeout
            )));
        }
        if self.group.trim().is_empty() {
            return Err(SwmError::InvalidConfig("group must not be empty".into()));
        }
        if !(1..=1000).contains(&self.poll_quantum_ms) {
            return Err(SwmError::InvalidConfig(
                "poll-quantum-ms must be between 1 and 1000".into(),
            ));
        }
        if self.join_settle_ms > 10_000 {
            return Err(SwmError::InvalidConfig(
                "join-settle-ms must be at most 10000".into(),
            ));
        }
        Ok(())
    }

    /// Request timeout (validated positive).
    pub fn timeout_ms(&self) -> u64 {
        self.timeout.max(1) as u64
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms())
    }

    pub fn poll_quantum(&self) -> Duration {
        Duration::from_millis(self.poll_quantum_ms)
    }

    /// Header pairs: strings as-is, any other value as compact JSON.
    pub fn header_pairs(&self) -> Vec<(String, String)> {
        self.headers
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

fn default_group() -> String {
    DEFAULT_GROUP.into()
}
fn default_poll_quantum_ms() -> u64 {
    50
}
