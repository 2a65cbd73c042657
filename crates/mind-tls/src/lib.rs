//! TLS [`Connector`] that presents a client certificate to the device.

use std::{
    fmt, fs,
    path::Path,
    sync::Arc,
    time::SystemTime,
};

use async_trait::async_trait;
use mind_rpc::{BoxedStream, Connector, RpcError};
use rustls::{
    Certificate, ClientConfig, PrivateKey, ServerName,
    client::{ServerCertVerified, ServerCertVerifier},
};
use rustls_pemfile::Item;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;

/// Opens TLS streams authenticated with a client certificate.
///
/// Devices present self-signed certificates, so the server chain is not verified.
#[derive(Clone)]
pub struct RustlsConnector {
    config: Arc<ClientConfig>,
}

impl RustlsConnector {
    /// Builds a connector from a client certificate chain and private key.
    pub fn new(certs: Vec<Certificate>, key: PrivateKey) -> Result<Self, RpcError> {
        let config = ClientConfig::builder()
            .with_safe_defaults()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
            .with_client_auth_cert(certs, key)
            .map_err(|err| RpcError::Configuration(format!("invalid client certificate: {err}")))?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    /// Loads the certificate chain and key from PEM files. Both may be the same file.
    pub fn from_pem_files(
        cert_path: impl AsRef<Path>,
        key_path: impl AsRef<Path>,
    ) -> Result<Self, RpcError> {
        let certs = load_certs(cert_path.as_ref())?;
        let key = load_key(key_path.as_ref())?;
        Self::new(certs, key)
    }
}

impl fmt::Debug for RustlsConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RustlsConnector").finish_non_exhaustive()
    }
}

#[async_trait]
impl Connector for RustlsConnector {
    async fn connect(&self, address: &str, port: u16) -> Result<BoxedStream, RpcError> {
        let server_name = ServerName::try_from(address)
            .map_err(|err| RpcError::Configuration(format!("invalid address '{address}': {err}")))?;

        let tcp = TcpStream::connect((address, port)).await?;
        tcp.set_nodelay(true)?;
        let stream = TlsConnector::from(Arc::clone(&self.config))
            .connect(server_name, tcp)
            .await?;

        debug!(address, port, "tls stream connected");
        Ok(Box::new(stream))
    }
}

fn read_pem(path: &Path) -> Result<Vec<Item>, RpcError> {
    let pem = fs::read(path).map_err(|err| {
        RpcError::Configuration(format!("failed to read {}: {err}", path.display()))
    })?;
    rustls_pemfile::read_all(&mut pem.as_slice()).map_err(|err| {
        RpcError::Configuration(format!("failed to parse PEM in {}: {err}", path.display()))
    })
}

fn load_certs(path: &Path) -> Result<Vec<Certificate>, RpcError> {
    let certs: Vec<Certificate> = read_pem(path)?
        .into_iter()
        .filter_map(|item| match item {
            Item::X509Certificate(der) => Some(Certificate(der)),
            _ => None,
        })
        .collect();

    if certs.is_empty() {
        return Err(RpcError::Configuration(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path) -> Result<PrivateKey, RpcError> {
    read_pem(path)?
        .into_iter()
        .find_map(|item| match item {
            Item::PKCS8Key(der) | Item::RSAKey(der) | Item::ECKey(der) => Some(PrivateKey(der)),
            _ => None,
        })
        .ok_or_else(|| {
            RpcError::Configuration(format!("no private key found in {}", path.display()))
        })
}

struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &Certificate,
        _intermediates: &[Certificate],
        _server_name: &ServerName,
        _scts: &mut dyn Iterator<Item = &[u8]>,
        _ocsp_response: &[u8],
        _now: SystemTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }
}
