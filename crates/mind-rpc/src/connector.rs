use async_trait::async_trait;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tracing::debug;

use crate::RpcError;

/// Bidirectional byte stream a session can own.
pub trait MindStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> MindStream for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

/// Type-erased stream handed out by a [`Connector`].
pub type BoxedStream = Box<dyn MindStream>;

/// Opens authenticated, encrypted byte streams to a device.
///
/// Certificate handling lives behind this seam; sessions only see the stream.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establishes a stream to `address:port`.
    async fn connect(&self, address: &str, port: u16) -> Result<BoxedStream, RpcError>;
}

/// Plain TCP connector, for peers reached through a TLS-terminating tunnel.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, address: &str, port: u16) -> Result<BoxedStream, RpcError> {
        let stream = TcpStream::connect((address, port)).await?;
        stream.set_nodelay(true)?;
        debug!(address, port, "tcp stream connected");
        Ok(Box::new(stream))
    }
}
