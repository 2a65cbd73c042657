//! Paginated searches, one-shot commands and idle-managed sessions for Mind devices.

pub mod config;
pub mod manager;
pub mod mind;
pub mod paging;

pub use config::{DEFAULT_IDLE_TIMEOUT, ManagerConfig, default_idle_timeout};
pub use manager::{IdleTimer, MindLease, MindManager};
pub use mind::{Filter, Mind};
pub use paging::{DEFAULT_PAGE_SIZE, PageRequest, fetch_pages};

pub use mind_core::{Credential, ErrorCode, LevelOfDetail, SessionConfig};
pub use mind_rpc::{Connector, MindSession, RpcError, TcpConnector};
