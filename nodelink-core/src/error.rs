//! src/error.rs
//! ============================================================================
//! # `LinkError`: Unified Error Type for the Node Bridge
//!
//! This module defines the comprehensive error enum (`LinkError`) used across
//! the entire crate. Each variant carries enough context for diagnostics, and
//! all major modules are expected to use `Result<T, LinkError>` for
//! consistency. Node-side request rejections have their own small type,
//! [`NodeError`], so callers can match on them without string parsing.

use std::{io, path::PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::channel::events::{NodeEvent, Seq, Signal};

/// Unified error type for all bridge operations.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Standard IO error, auto-converted from `io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// TOML config parsing error.
    #[error("Config parse error: {0}")]
    Config(#[from] toml::de::Error),

    /// Config file I/O error with path.
    #[error("Failed to read config file {path:?}: {source}")]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Serialization or deserialization error (JSON payloads).
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The channel buffer was full; the signal is handed back to the caller
    /// so nothing is lost silently.
    #[error("Channel buffer full, signal for '{}' returned to caller", .0.event)]
    ChannelFull(Box<Signal>),

    /// The channel was closed while sending or receiving.
    #[error("Channel closed")]
    ChannelClosed,

    /// No handler is registered for the event (strict dispatch policy only).
    #[error("No handler registered for '{0}'")]
    NoHandler(NodeEvent),

    /// A registered handler reported a failure.
    #[error("Handler for '{event}' failed: {reason}")]
    Handler { event: NodeEvent, reason: String },

    /// A pending request was not answered within the configured window.
    #[error("Request '{event}' (seq {seq}) timed out after {timeout_secs}s")]
    ResponseTimeout {
        event: NodeEvent,
        seq: Seq,
        timeout_secs: u64,
    },

    /// The node rejected a request.
    #[error(transparent)]
    Node(#[from] NodeError),

    /// Operation cancelled, e.g. the transport was dropped mid-request.
    #[error("Operation was cancelled")]
    Cancelled,

    /// Any other error, with description.
    #[error("Unexpected error: {0}")]
    Other(String),
}

impl LinkError {
    /// Create a handler failure error.
    pub fn handler<S: Into<String>>(event: NodeEvent, reason: S) -> Self {
        Self::Handler {
            event,
            reason: reason.into(),
        }
    }

    /// Create a config I/O error with path context.
    pub fn config_io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Self::ConfigIo {
            path: path.into(),
            source,
        }
    }

    /// Create a response timeout error.
    pub fn response_timeout(event: NodeEvent, seq: Seq, timeout: std::time::Duration) -> Self {
        Self::ResponseTimeout {
            event,
            seq,
            timeout_secs: timeout.as_secs(),
        }
    }

    /// Any other error, with description.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }
}

// Allow conversion from `anyhow::Error` as fallback.
impl From<anyhow::Error> for LinkError {
    fn from(e: anyhow::Error) -> Self {
        Self::Other(e.to_string())
    }
}

/// A rejection delivered by the node for a specific request.
///
/// The node reports failures as an opaque JSON value; the well-known
/// `message`/`msg` and `validationError` fields are lifted out when present
/// and the rest is kept verbatim in `validation`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Node rejected request: {message}")]
pub struct NodeError {
    pub message: String,
    pub validation: Option<Value>,
}

impl NodeError {
    /// Lenient extraction from the raw rejection value.
    pub fn from_value(error: Value) -> Self {
        let message = error
            .get("message")
            .or_else(|| error.get("msg"))
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string());

        let validation = error.get("validationError").cloned();

        Self {
            message,
            validation,
        }
    }
}
