use std::{env, time::Duration};

use mind_core::{LevelOfDetail, SessionConfig};

/// Idle period after which a managed session is closed.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Resolves the idle timeout from `MIND_IDLE_TIMEOUT_SECS`, falling back to the default.
pub fn default_idle_timeout() -> Duration {
    idle_timeout_from(env::var("MIND_IDLE_TIMEOUT_SECS").ok().as_deref())
}

fn idle_timeout_from(value: Option<&str>) -> Duration {
    value
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_IDLE_TIMEOUT)
}

/// Settings for a [`crate::MindManager`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Network target of every session the manager opens.
    pub session: SessionConfig,
    /// How long a released session stays open before it is closed.
    pub idle_timeout: Duration,
    /// Level of detail applied to searches that do not shape their response.
    pub level_of_detail: LevelOfDetail,
}

impl ManagerConfig {
    pub fn new(session: SessionConfig) -> Self {
        Self {
            session,
            idle_timeout: default_idle_timeout(),
            level_of_detail: LevelOfDetail::default(),
        }
    }

    pub fn local(address: impl Into<String>) -> Self {
        Self::new(SessionConfig::local(address))
    }

    pub fn web() -> Self {
        Self::new(SessionConfig::web())
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn with_level_of_detail(mut self, level_of_detail: LevelOfDetail) -> Self {
        self.level_of_detail = level_of_detail;
        self
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{DEFAULT_IDLE_TIMEOUT, ManagerConfig, idle_timeout_from};

    #[test]
    fn idle_timeout_override_is_whole_seconds() {
        assert_eq!(idle_timeout_from(Some(" 45 ")), Duration::from_secs(45));
        assert_eq!(idle_timeout_from(Some("1.5")), DEFAULT_IDLE_TIMEOUT);
        assert_eq!(idle_timeout_from(None), DEFAULT_IDLE_TIMEOUT);
    }

    #[test]
    fn local_config_targets_device_port() {
        let config = ManagerConfig::local("192.0.2.1").with_idle_timeout(Duration::from_secs(5));
        assert_eq!(config.session.port, 1413);
        assert_eq!(config.idle_timeout, Duration::from_secs(5));
    }
}
