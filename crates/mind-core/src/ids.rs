use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-session request counter value, echoed by the device in the `RpcId` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RpcId(
    /// Monotonic request number, starting at zero for each session.
    pub u64,
);

impl fmt::Display for RpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the addressable device body a session talks to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BodyId(
    /// Device body identifier, e.g. `tsn:7460001902C0A1B`.
    pub String,
);

impl BodyId {
    /// Placeholder the device accepts when the body could not be resolved.
    pub const UNRESOLVED: &'static str = "-";

    pub fn unresolved() -> Self {
        Self(Self::UNRESOLVED.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_resolved(&self) -> bool {
        !self.0.is_empty() && self.0 != Self::UNRESOLVED
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Random identifier chosen once per session and sent as `X-ApplicationSessionId`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppSessionId(pub u32);

impl fmt::Display for AppSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{AppSessionId, BodyId};

    #[test]
    fn app_session_id_renders_lower_hex() {
        assert_eq!(AppSessionId(0xBEEF).to_string(), "0xbeef");
        assert_eq!(AppSessionId(0).to_string(), "0x0");
    }

    #[test]
    fn body_id_resolution() {
        assert!(!BodyId::default().is_resolved());
        assert!(!BodyId::unresolved().is_resolved());
        assert!(BodyId("tsn:123".to_string()).is_resolved());
    }
}
