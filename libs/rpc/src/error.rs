use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("transport error on {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// An ingress request named a method we don't recognize.
    #[error("protocol error: unknown method {method:?}")]
    Protocol { method: String },

    #[error("malformed request: {message}")]
    Codec { message: String },
}

impl RpcError {
    pub fn transport(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    pub fn protocol(method: impl Into<String>) -> Self {
        Self::Protocol {
            method: method.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RpcError>;
