pub mod config;
pub mod credential;
pub mod errors;
pub mod ids;
pub mod protocol;

pub use config::{DEFAULT_LOCAL_PORT, SessionConfig, WEB_ADDRESS, WEB_PORT};
pub use credential::{Credential, CredentialKind};
pub use errors::{CredentialError, ErrorCode};
pub use ids::{AppSessionId, BodyId, RpcId};
pub use protocol::{
    APPLICATION_NAME, APPLICATION_VERSION, CONTENT_TYPE, LevelOfDetail, PREAMBLE_TOKEN, Request,
    ResponseCount, SCHEMA_VERSION,
};
