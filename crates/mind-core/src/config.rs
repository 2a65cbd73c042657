/// Port a device listens on for local-network sessions.
pub const DEFAULT_LOCAL_PORT: u16 = 1413;
/// Host of the web-facing service used with account credentials.
pub const WEB_ADDRESS: &str = "middlemind.tivo.com";
/// Port of the web-facing service.
pub const WEB_PORT: u16 = 443;

/// Network target for a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub address: String,
    pub port: u16,
}

impl SessionConfig {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Targets a device on the local network at its default port.
    pub fn local(address: impl Into<String>) -> Self {
        Self::new(address, DEFAULT_LOCAL_PORT)
    }

    /// Targets the web-facing service.
    pub fn web() -> Self {
        Self::new(WEB_ADDRESS, WEB_PORT)
    }
}
