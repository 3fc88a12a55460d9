//! Error types for the topology model.
//!
//! Mirrors the error kinds a caller needs to distinguish: malformed input at
//! parse time is a configuration error (fatal at startup), anything that
//! shows up while routing a live request is a topology error (aborts the
//! current request, never the process).

use thiserror::Error;

/// Errors raised while building or querying the topology.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// The topology document itself is malformed or internally inconsistent.
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// A runtime topology operation failed against an otherwise valid graph
    /// (unknown node, routing dead end, self-loop trap).
    #[error("topology error: {message}")]
    Topology { message: String },

    /// The node registry has no constructor for the given model name.
    #[error("type not found: {model}")]
    TypeNotFound { model: String },

    /// A model name was registered twice.
    #[error("registration failure: {model} is already registered")]
    RegistrationFailure { model: String },
}

impl ModelError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn topology(message: impl Into<String>) -> Self {
        Self::Topology {
            message: message.into(),
        }
    }

    pub fn type_not_found(model: impl Into<String>) -> Self {
        Self::TypeNotFound {
            model: model.into(),
        }
    }

    pub fn registration_failure(model: impl Into<String>) -> Self {
        Self::RegistrationFailure {
            model: model.into(),
        }
    }

    pub fn trap(node: u64) -> Self {
        Self::Topology {
            message: format!("node {node} is a self-loop (network trap)"),
        }
    }

    /// True for errors that should be reported at startup and abort the
    /// process before any component comes up; false for errors that abort
    /// only the request or worker scope that triggered them.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, ModelError::Configuration { .. })
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
