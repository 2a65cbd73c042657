use std::{collections::VecDeque, fmt, sync::Arc};

use mind_core::{AppSessionId, BodyId, Credential, Request, RpcId, SessionConfig};
use serde_json::{Map, Value, json};
use tokio::io::AsyncWriteExt;
use tracing::{debug, trace, warn};

use crate::{
    BoxedStream, Connector, RpcError,
    codec::encode_request,
    framing::{Frame, FrameReader, write_frame},
};

/// Responses that may wait for their request id before the connection is deemed broken.
pub const MAX_QUEUED_RESPONSES: usize = 256;

/// Lifecycle position of a [`MindSession`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Authenticating,
    ResolvingIdentity,
    Ready,
}

impl SessionState {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Authenticating => "authenticating",
            SessionState::ResolvingIdentity => "resolving_identity",
            SessionState::Ready => "ready",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One authenticated connection to a device.
///
/// The protocol allows a single outstanding request; a second send before the
/// first response has been read is rejected with [`RpcError::RequestPending`].
/// Responses read while waiting for a different request id are queued and
/// handed out by later [`MindSession::get_response`] calls.
pub struct MindSession {
    /// Opens the underlying stream on connect.
    connector: Arc<dyn Connector>,
    /// Network target.
    config: SessionConfig,
    /// Authentication material.
    credential: Credential,
    /// Live stream, present from connect until close.
    stream: Option<FrameReader<BoxedStream>>,
    /// Current lifecycle state.
    state: SessionState,
    /// Random id chosen at construction.
    session_id: AppSessionId,
    /// Next request id to assign.
    next_rpc_id: u64,
    /// Request still awaiting its response.
    pending: Option<RpcId>,
    /// Responses read ahead of the request they answer, in arrival order.
    queue: VecDeque<(RpcId, Frame)>,
    /// Device body resolved during the handshake.
    body_id: BodyId,
}

impl MindSession {
    /// Creates a disconnected session.
    pub fn new(connector: Arc<dyn Connector>, config: SessionConfig, credential: Credential) -> Self {
        Self {
            connector,
            config,
            credential,
            stream: None,
            state: SessionState::Disconnected,
            session_id: AppSessionId(rand::random()),
            next_rpc_id: 0,
            pending: None,
            queue: VecDeque::new(),
            body_id: BodyId::default(),
        }
    }

    /// Session against a device on the local network, authenticated by media access key.
    pub fn local(
        connector: Arc<dyn Connector>,
        address: impl Into<String>,
        mak: impl Into<String>,
    ) -> Result<Self, RpcError> {
        Ok(Self::new(
            connector,
            SessionConfig::local(address),
            Credential::mak(mak)?,
        ))
    }

    /// Session against the web-facing service, authenticated by account.
    pub fn web(
        connector: Arc<dyn Connector>,
        username: impl Into<String>,
        password: impl Into<String>,
        unit_name: impl Into<String>,
    ) -> Result<Self, RpcError> {
        Ok(Self::new(
            connector,
            SessionConfig::web(),
            Credential::web(username, password, unit_name)?,
        ))
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn body_id(&self) -> &BodyId {
        &self.body_id
    }

    pub fn session_id(&self) -> AppSessionId {
        self.session_id
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Number of responses read but not yet claimed by their request id.
    pub fn queued_responses(&self) -> usize {
        self.queue.len()
    }

    /// Id the next request will carry.
    pub fn next_rpc_id(&self) -> RpcId {
        RpcId(self.next_rpc_id)
    }

    /// Opens the stream, authenticates and resolves the device body.
    ///
    /// Any failure releases the stream and leaves the session disconnected.
    pub async fn connect(&mut self) -> Result<(), RpcError> {
        if self.state != SessionState::Disconnected {
            return Err(RpcError::IllegalState {
                expected: SessionState::Disconnected,
                actual: self.state,
            });
        }

        match self.handshake().await {
            Ok(()) => {
                self.state = SessionState::Ready;
                debug!(
                    address = %self.config.address,
                    port = self.config.port,
                    body_id = %self.body_id,
                    "session ready"
                );
                Ok(())
            }
            Err(err) => {
                debug!(error = %err, state = %self.state, "handshake failed");
                self.release().await;
                Err(err)
            }
        }
    }

    /// Sends one request and returns its correlation token.
    pub async fn send_request(&mut self, request: Request) -> Result<RpcId, RpcError> {
        self.ensure_ready()?;
        let result = self.write_request(request).await;
        self.settle(result).await
    }

    /// Returns the next response for `token`, or the oldest response when `token` is `None`.
    ///
    /// Responses for other requests read along the way are queued for later calls.
    pub async fn get_response(&mut self, token: Option<RpcId>) -> Result<Frame, RpcError> {
        self.ensure_ready()?;
        let result = self.read_response(token).await;
        self.settle(result).await
    }

    /// Sends `request` and waits for its response.
    pub async fn call(&mut self, request: Request) -> Result<Frame, RpcError> {
        let rpc_id = self.send_request(request).await?;
        self.get_response(Some(rpc_id)).await
    }

    /// Shuts the stream down. Calling it on a closed session does nothing.
    pub async fn close(&mut self) {
        if self.stream.is_some() {
            debug!(body_id = %self.body_id, "closing session");
        }
        self.release().await;
    }

    async fn handshake(&mut self) -> Result<(), RpcError> {
        self.state = SessionState::Connecting;
        self.body_id = BodyId::default();
        let stream = self
            .connector
            .connect(&self.config.address, self.config.port)
            .await?;
        self.stream = Some(FrameReader::new(stream));

        self.state = SessionState::Authenticating;
        let auth = self.authenticate().await?;
        if auth.body.get("status").and_then(Value::as_str) != Some("success") {
            warn!(kind = %self.credential.kind(), "device rejected credential");
            return Err(RpcError::Authentication { body: auth.body });
        }

        self.state = SessionState::ResolvingIdentity;
        let unit_name = self.credential.unit_name().map(str::to_owned);
        self.body_id = match unit_name {
            Some(unit_name) => resolve_device(&auth.body, &unit_name),
            None => self.resolve_body_config().await?,
        };
        Ok(())
    }

    async fn authenticate(&mut self) -> Result<Frame, RpcError> {
        let request = Request::new("bodyAuthenticate", self.credential.payload());
        self.exchange(request).await
    }

    async fn resolve_body_config(&mut self) -> Result<BodyId, RpcError> {
        let response = self
            .exchange(Request::new(
                "bodyConfigSearch",
                object(json!({ "bodyId": BodyId::UNRESOLVED })),
            ))
            .await?;

        let body_id = response
            .body
            .get("bodyConfig")
            .and_then(|configs| configs.get(0))
            .and_then(|config| config.get("bodyId"))
            .and_then(Value::as_str);

        Ok(body_id.map_or_else(BodyId::unresolved, |id| BodyId(id.to_string())))
    }

    async fn exchange(&mut self, request: Request) -> Result<Frame, RpcError> {
        let rpc_id = self.write_request(request).await?;
        self.read_response(Some(rpc_id)).await
    }

    async fn write_request(&mut self, request: Request) -> Result<RpcId, RpcError> {
        if let Some(pending) = self.pending {
            return Err(RpcError::RequestPending { rpc_id: pending.0 });
        }

        let rpc_id = RpcId(self.next_rpc_id);
        self.next_rpc_id = self.next_rpc_id.saturating_add(1);

        let request_type = request.request_type.clone();
        let frame = encode_request(request, rpc_id, self.session_id)?;
        let state = self.state;
        let stream = self.stream.as_mut().ok_or(RpcError::IllegalState {
            expected: SessionState::Ready,
            actual: state,
        })?;

        trace!(rpc_id = rpc_id.0, request_type = %request_type, bytes = frame.len(), "sending request");
        write_frame(stream.get_mut(), &frame).await?;
        self.pending = Some(rpc_id);
        Ok(rpc_id)
    }

    async fn read_response(&mut self, token: Option<RpcId>) -> Result<Frame, RpcError> {
        let queued = self
            .queue
            .iter()
            .position(|(rpc_id, _)| token.is_none_or(|token| *rpc_id == token));
        if let Some((rpc_id, frame)) = queued.and_then(|index| self.queue.remove(index)) {
            self.claim(Some(rpc_id));
            return Ok(frame);
        }

        loop {
            let state = self.state;
            let stream = self.stream.as_mut().ok_or(RpcError::IllegalState {
                expected: SessionState::Ready,
                actual: state,
            })?;
            let frame = stream.read_frame().await?;
            let rpc_id = frame.rpc_id()?.map(RpcId);

            if let Some(actual) = rpc_id
                && actual.0 >= self.next_rpc_id
            {
                return Err(RpcError::RequestIdMismatch {
                    expected: token.map_or(self.next_rpc_id, |token| token.0),
                    actual: actual.0,
                });
            }

            let (Some(token), Some(rpc_id)) = (token, rpc_id) else {
                self.claim(rpc_id);
                return Ok(frame);
            };
            if rpc_id == token {
                self.claim(Some(rpc_id));
                return Ok(frame);
            }

            if self.queue.len() >= MAX_QUEUED_RESPONSES {
                return Err(RpcError::Protocol(format!(
                    "more than {MAX_QUEUED_RESPONSES} unclaimed responses"
                )));
            }
            trace!(
                rpc_id = rpc_id.0,
                awaiting = token.0,
                queued = self.queue.len() + 1,
                "queueing response for another request"
            );
            self.queue.push_back((rpc_id, frame));
        }
    }

    /// Marks the pending request answered once a response for it is handed out.
    fn claim(&mut self, rpc_id: Option<RpcId>) {
        if rpc_id.is_none() || rpc_id == self.pending {
            self.pending = None;
        }
    }

    fn ensure_ready(&self) -> Result<(), RpcError> {
        if self.state != SessionState::Ready {
            return Err(RpcError::IllegalState {
                expected: SessionState::Ready,
                actual: self.state,
            });
        }
        Ok(())
    }

    /// Drops the connection when `result` shows it can no longer be trusted.
    async fn settle<T>(&mut self, result: Result<T, RpcError>) -> Result<T, RpcError> {
        if let Err(err) = &result
            && err.is_fatal_to_connection()
        {
            warn!(error = %err, body_id = %self.body_id, "dropping broken connection");
            self.release().await;
        }
        result
    }

    async fn release(&mut self) {
        if let Some(reader) = self.stream.take() {
            let mut stream = reader.into_inner();
            if let Err(err) = stream.shutdown().await {
                debug!(error = %err, "stream shutdown failed");
            }
        }
        self.pending = None;
        self.queue.clear();
        self.state = SessionState::Disconnected;
    }
}

impl fmt::Debug for MindSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MindSession")
            .field("config", &self.config)
            .field("credential", &self.credential)
            .field("state", &self.state)
            .field("session_id", &self.session_id)
            .field("next_rpc_id", &self.next_rpc_id)
            .field("queued", &self.queue.len())
            .field("body_id", &self.body_id)
            .finish_non_exhaustive()
    }
}

/// Picks the device whose friendly name matches `unit_name` from an auth response.
fn resolve_device(auth: &Value, unit_name: &str) -> BodyId {
    let device = auth
        .get("deviceId")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .find(|device| device.get("friendlyName").and_then(Value::as_str) == Some(unit_name));

    match device.and_then(|device| device.get("id")).and_then(Value::as_str) {
        Some(id) => BodyId(id.to_string()),
        None => {
            warn!(unit_name, "no device matches the configured unit name");
            BodyId::unresolved()
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use mind_core::BodyId;
    use serde_json::json;

    use super::resolve_device;

    #[test]
    fn resolve_device_without_device_list() {
        let auth = json!({ "status": "success" });
        assert_eq!(resolve_device(&auth, "Den"), BodyId::unresolved());
    }

    #[test]
    fn resolve_device_takes_first_match() {
        let auth = json!({
            "status": "success",
            "deviceId": [
                { "id": "tsn:1", "friendlyName": "Den" },
                { "id": "tsn:2", "friendlyName": "Den" }
            ]
        });
        assert_eq!(resolve_device(&auth, "Den"), BodyId("tsn:1".to_string()));
    }
}
