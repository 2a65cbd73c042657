use mind_core::{CredentialError, ErrorCode};
use serde_json::Value;
use thiserror::Error;

use crate::session::SessionState;

/// Transport, framing and handshake failures for Mind RPC operations.
#[derive(Debug, Error)]
pub enum RpcError {
    /// Caller-supplied configuration is unusable.
    #[error("invalid configuration: {0}")]
    Configuration(String),
    /// Credential could not be constructed.
    #[error(transparent)]
    Credential(#[from] CredentialError),
    /// Underlying socket I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Peer closed the connection before a new frame started.
    #[error("connection closed by peer")]
    ConnectionClosed,
    /// Frame preamble, headers or length accounting were malformed.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Frame size exceeded maximum allowed payload.
    #[error("frame too large: {size} > {max}")]
    FrameTooLarge { size: usize, max: usize },
    /// Response did not match request identifier.
    #[error("request id mismatch: expected {expected}, got {actual}")]
    RequestIdMismatch { expected: u64, actual: u64 },
    /// Request payload could not be serialized.
    #[error("failed to encode json payload: {0}")]
    Encode(String),
    /// Response body was not valid JSON.
    #[error("failed to decode json body: {0}")]
    Decode(String),
    /// Device rejected the credential; `body` is the device's answer.
    #[error("authentication failed: {body}")]
    Authentication { body: Value },
    /// Operation not allowed in the current session state.
    #[error("session is {actual}, expected {expected}")]
    IllegalState {
        expected: SessionState,
        actual: SessionState,
    },
    /// A request was sent while the previous one still awaits its response.
    #[error("request {rpc_id} is still awaiting its response")]
    RequestPending { rpc_id: u64 },
}

impl RpcError {
    /// Maps the error onto its failure category.
    pub fn code(&self) -> ErrorCode {
        match self {
            RpcError::Configuration(_) | RpcError::Credential(_) => ErrorCode::Configuration,
            RpcError::Io(_) | RpcError::ConnectionClosed => ErrorCode::Transport,
            RpcError::Protocol(_)
            | RpcError::FrameTooLarge { .. }
            | RpcError::RequestIdMismatch { .. }
            | RpcError::Encode(_)
            | RpcError::Decode(_) => ErrorCode::Protocol,
            RpcError::Authentication { .. } => ErrorCode::Authentication,
            RpcError::IllegalState { .. } | RpcError::RequestPending { .. } => {
                ErrorCode::IllegalState
            }
        }
    }

    /// True when the connection that produced this error can no longer be trusted.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(self.code(), ErrorCode::Transport | ErrorCode::Protocol)
    }
}
