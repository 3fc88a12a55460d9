//! Simulator RPC error taxonomy, mirroring the shape used elsewhere in this
//! workspace: a small `thiserror` enum, named constructors, and a
//! `category()`/`is_retryable()` pair so callers can decide how to react
//! without matching on variants directly.

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum SimulatorError {
    /// Send or receive failed or timed out at the transport layer.
    #[error("transport error talking to simulator at {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// The simulator's response envelope carried a truthy `error` field.
    #[error("simulator reported an error for {method}: {message}")]
    Protocol { method: String, message: String },

    /// The response envelope was not valid JSON, or `result` was not the
    /// type the caller expected for this method.
    #[error("malformed simulator response for {method}: {message}")]
    Codec { method: String, message: String },

    /// The pool has no client available (capacity exhausted, or an index
    /// requested that was never populated).
    #[error("simulator pool error: {message}")]
    Pool { message: String },
}

impl SimulatorError {
    pub fn transport(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn protocol(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            method: method.into(),
            message: message.into(),
        }
    }

    pub fn codec(method: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Codec {
            method: method.into(),
            message: message.into(),
        }
    }

    pub fn pool(message: impl Into<String>) -> Self {
        Self::Pool {
            message: message.into(),
        }
    }

    /// Transport errors are the only kind a caller might reasonably retry;
    /// protocol and codec errors mean the request itself was bad.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SimulatorError::Transport { .. })
    }

    pub fn category(&self) -> &'static str {
        match self {
            SimulatorError::Transport { .. } => "transport",
            SimulatorError::Protocol { .. } => "protocol",
            SimulatorError::Codec { .. } => "codec",
            SimulatorError::Pool { .. } => "pool",
        }
    }
}

pub type Result<T> = std::result::Result<T, SimulatorError>;
