use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure categories surfaced by every layer of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Caller-supplied inputs are malformed; fix them before retrying.
    Configuration,
    /// Socket-level failure: refused, reset or closed connection.
    Transport,
    /// Malformed or unexpected frame; the connection must be replaced.
    Protocol,
    /// The device rejected the credential.
    Authentication,
    /// An operation was invoked in a session state that does not allow it.
    IllegalState,
}

/// Credential construction failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    /// A field required by the credential variant was absent or blank.
    #[error("{field} is required for {kind} credentials")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },
    /// The variant tag is not one of the supported credential kinds.
    #[error("unknown credential kind '{0}'")]
    UnknownKind(String),
}

impl CredentialError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Configuration
    }
}
