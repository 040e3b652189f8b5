//! Typed errors for the upstream clients and the picks store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0} API circuit breaker is open")]
    CircuitOpen(String),

    #[error("{source_name} returned HTTP {status} for {url}")]
    Status {
        source_name: String,
        status: u16,
        url: String,
    },

    #[error("{source_name} request failed: {message}")]
    Transport { source_name: String, message: String },

    #[error("Unexpected {source_name} payload: {message}")]
    Decode { source_name: String, message: String },
}

impl ClientError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Status { status, .. } => *status == 429 || *status >= 500,
            ClientError::Transport { .. } => true,
            ClientError::CircuitOpen(_) | ClientError::Decode { .. } => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No {kind} stored for {key}")]
    NotFound { kind: &'static str, key: String },

    #[error("Store I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt {kind} blob at {path}: {source}")]
    Serialization {
        kind: &'static str,
        path: String,
        #[source]
        source: serde_json::Error,
    },
}
