#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use mind_rpc::{
    BoxedStream, Connector, RpcError,
    framing::{Frame, FrameReader, encode_frame, write_frame},
};
use serde_json::{Value, json};
use tokio::io::{DuplexStream, duplex};

/// What the fake device does with one request.
pub enum Reply {
    /// Answers with the request's own RpcId.
    Body(Value),
    /// Answers with an explicit RpcId header.
    WithRpcId(String, Value),
    /// Answers with several frames carrying the request's RpcId.
    Many(Vec<Value>),
    /// Drops the connection without answering.
    HangUp,
}

impl From<Value> for Reply {
    fn from(body: Value) -> Self {
        Reply::Body(body)
    }
}

type Handler = Arc<dyn Fn(&Frame) -> Reply + Send + Sync>;

/// In-memory device reachable through its own [`Connector`] implementation.
#[derive(Clone)]
pub struct FakeDevice {
    handler: Handler,
    requests: Arc<Mutex<Vec<Frame>>>,
    connects: Arc<AtomicUsize>,
}

impl FakeDevice {
    pub fn new(handler: impl Fn(&Frame) -> Reply + Send + Sync + 'static) -> Self {
        Self {
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    pub fn requests(&self) -> Vec<Frame> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn request_types(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|frame| request_type(frame).to_string())
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for FakeDevice {
    async fn connect(&self, _address: &str, _port: u16) -> Result<BoxedStream, RpcError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let (client, server) = duplex(64 * 1024);
        tokio::spawn(serve(
            server,
            Arc::clone(&self.handler),
            Arc::clone(&self.requests),
        ));
        Ok(Box::new(client))
    }
}

/// Connector whose every attempt is refused.
pub struct RefusingConnector;

#[async_trait]
impl Connector for RefusingConnector {
    async fn connect(&self, _address: &str, _port: u16) -> Result<BoxedStream, RpcError> {
        Err(RpcError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    }
}

async fn serve(stream: DuplexStream, handler: Handler, requests: Arc<Mutex<Vec<Frame>>>) {
    let mut reader = FrameReader::new(stream);
    loop {
        let Ok(frame) = reader.read_frame().await else {
            return;
        };
        let reply = handler(&frame);
        let echoed = frame.header("RpcId").unwrap_or_default().to_string();
        requests.lock().expect("requests lock").push(frame);

        let (rpc_id, bodies) = match reply {
            Reply::Body(body) => (echoed, vec![body]),
            Reply::WithRpcId(rpc_id, body) => (rpc_id, vec![body]),
            Reply::Many(bodies) => (echoed, bodies),
            Reply::HangUp => return,
        };
        let last = bodies.len().saturating_sub(1);
        for (index, body) in bodies.iter().enumerate() {
            let body = serde_json::to_vec(body).expect("reply body should encode");
            let is_final = if index == last { "true" } else { "false" };
            let response = encode_frame(
                &[
                    ("Type", "response"),
                    ("RpcId", rpc_id.as_str()),
                    ("Content-Type", "application/json"),
                    ("IsFinal", is_final),
                ],
                &body,
            );
            if write_frame(reader.get_mut(), &response).await.is_err() {
                return;
            }
        }
    }
}

pub fn request_type(frame: &Frame) -> &str {
    frame.header("RequestType").unwrap_or_default()
}

pub fn auth_ok() -> Value {
    json!({ "type": "bodyAuthenticateResponse", "status": "success" })
}
