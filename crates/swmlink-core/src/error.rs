//! Shared error type across swmlink crates.

use thiserror::Error;

/// Stable error codes (used in logs and asserted by tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Missing or invalid component configuration.
    InvalidConfig,
    /// Malformed wire message or outgoing payload.
    BadMessage,
    /// A live request already uses this correlation id.
    DuplicateId,
    /// No reply arrived before the deadline.
    Timeout,
    /// The component (or its event loop) is stopped.
    Stopped,
    /// The group transport failed.
    Transport,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in logs and test vectors.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::BadMessage => "BAD_MESSAGE",
            ErrorCode::DuplicateId => "DUPLICATE_ID",
            ErrorCode::Timeout => "TIMEOUT",
            ErrorCode::Stopped => "STOPPED",
            ErrorCode::Transport => "TRANSPORT",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, SwmError>;

/// Unified error type used by core and node.
#[derive(Debug, Error)]
pub enum SwmError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("decode failed: {0}")]
    Decode(String),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("correlation id already pending: {0}")]
    DuplicateCorrelationId(String),
    #[error("no reply to {query_id} within {timeout_ms} ms")]
    Timeout { query_id: String, timeout_ms: u64 },
    #[error("component stopped")]
    Stopped,
    #[error("transport: {0}")]
    Transport(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl SwmError {
    /// Map to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            SwmError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            SwmError::Decode(_) | SwmError::Encode(_) => ErrorCode::BadMessage,
            SwmError::DuplicateCorrelationId(_) => ErrorCode::DuplicateId,
            SwmError::Timeout { .. } => ErrorCode::Timeout,
            SwmError::Stopped => ErrorCode::Stopped,
            SwmError::Transport(_) => ErrorCode::Transport,
            SwmError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// True for the "no reply" outcome of a request.
    pub fn is_timeout(&self) -> bool {
        matches!(self, SwmError::Timeout { .. })
    }
}
