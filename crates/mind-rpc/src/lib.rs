//! Framed JSON RPC transport and authenticated session for Mind devices.

mod error;

pub mod codec;
pub mod connector;
pub mod framing;
pub mod session;

pub use connector::{BoxedStream, Connector, MindStream, TcpConnector};
pub use error::RpcError;
pub use mind_core::ErrorCode;
pub use framing::{Frame, FrameReader};
pub use session::{MindSession, SessionState};
