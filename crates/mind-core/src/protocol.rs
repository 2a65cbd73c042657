use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{AppSessionId, RpcId};

/// Literal token opening every frame preamble.
pub const PREAMBLE_TOKEN: &str = "MRPC/2";
/// Schema version advertised on every request.
pub const SCHEMA_VERSION: &str = "17";
/// Body encoding advertised on every request.
pub const CONTENT_TYPE: &str = "application/json";
/// Client identity advertised in `X-ApplicationName`.
pub const APPLICATION_NAME: &str = "Quicksilver";
/// Client identity advertised in `X-ApplicationVersion`.
pub const APPLICATION_VERSION: &str = "1.2";

pub const HEADER_TYPE: &str = "Type";
pub const HEADER_RPC_ID: &str = "RpcId";
pub const HEADER_SCHEMA_VERSION: &str = "SchemaVersion";
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_REQUEST_TYPE: &str = "RequestType";
pub const HEADER_RESPONSE_COUNT: &str = "ResponseCount";
pub const HEADER_BODY_ID: &str = "BodyId";
pub const HEADER_APPLICATION_NAME: &str = "X-ApplicationName";
pub const HEADER_APPLICATION_VERSION: &str = "X-ApplicationVersion";
pub const HEADER_APPLICATION_SESSION_ID: &str = "X-ApplicationSessionId";

/// Whether the device should answer with one or several responses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCount {
    #[default]
    Single,
    Multiple,
}

impl ResponseCount {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseCount::Single => "single",
            ResponseCount::Multiple => "multiple",
        }
    }
}

/// Response shaping hint; mutually exclusive with an explicit `responseTemplate`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelOfDetail {
    Low,
    #[default]
    Medium,
    High,
}

impl LevelOfDetail {
    pub fn as_str(self) -> &'static str {
        match self {
            LevelOfDetail::Low => "low",
            LevelOfDetail::Medium => "medium",
            LevelOfDetail::High => "high",
        }
    }
}

/// One outgoing RPC: a request type plus its JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    /// Value of the `RequestType` header and of the injected `type` field.
    pub request_type: String,
    /// Payload object; key order is preserved on the wire.
    pub payload: Map<String, Value>,
    /// Expected number of responses.
    pub response_count: ResponseCount,
}

impl Request {
    pub fn new(request_type: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            request_type: request_type.into(),
            payload,
            response_count: ResponseCount::Single,
        }
    }

    /// Asks the device for a stream of responses instead of a single one.
    pub fn with_multiple_responses(mut self) -> Self {
        self.response_count = ResponseCount::Multiple;
        self
    }

    /// Body id carried by the payload, or empty when the payload does not name one.
    pub fn body_id(&self) -> &str {
        self.payload
            .get("bodyId")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    /// Ordered header set for this request as sent at `rpc_id` within `session_id`.
    pub fn headers(&self, rpc_id: RpcId, session_id: AppSessionId) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_TYPE, "request".to_string()),
            (HEADER_RPC_ID, rpc_id.to_string()),
            (HEADER_SCHEMA_VERSION, SCHEMA_VERSION.to_string()),
            (HEADER_CONTENT_TYPE, CONTENT_TYPE.to_string()),
            (HEADER_REQUEST_TYPE, self.request_type.clone()),
            (
                HEADER_RESPONSE_COUNT,
                self.response_count.as_str().to_string(),
            ),
            (HEADER_BODY_ID, self.body_id().to_string()),
            (HEADER_APPLICATION_NAME, APPLICATION_NAME.to_string()),
            (HEADER_APPLICATION_VERSION, APPLICATION_VERSION.to_string()),
            (HEADER_APPLICATION_SESSION_ID, session_id.to_string()),
        ]
    }

    /// Consumes the request, returning the payload with `type` injected.
    pub fn into_body(self) -> Map<String, Value> {
        let mut payload = self.payload;
        payload.insert("type".to_string(), Value::String(self.request_type));
        payload
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Map, Value, json};

    use super::{Request, ResponseCount};
    use crate::{AppSessionId, RpcId};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn headers_follow_fixed_order() {
        let request = Request::new(
            "recordingSearch",
            object(json!({ "bodyId": "tsn:1", "count": 5 })),
        );
        let names: Vec<&str> = request
            .headers(RpcId(3), AppSessionId(0xabc))
            .into_iter()
            .map(|(name, _)| name)
            .collect();

        assert_eq!(
            names,
            [
                "Type",
                "RpcId",
                "SchemaVersion",
                "Content-Type",
                "RequestType",
                "ResponseCount",
                "BodyId",
                "X-ApplicationName",
                "X-ApplicationVersion",
                "X-ApplicationSessionId",
            ]
        );
    }

    #[test]
    fn body_id_header_is_empty_without_payload_body_id() {
        let request = Request::new("keyEventSend", object(json!({ "event": "play" })));
        let headers = request.headers(RpcId(0), AppSessionId(1));
        assert_eq!(headers[6], ("BodyId", String::new()));
        assert_eq!(headers[9], ("X-ApplicationSessionId", "0x1".to_string()));
    }

    #[test]
    fn multiple_responses_flag_changes_response_count() {
        let request = Request::new("tunerStateEventRegister", Map::new()).with_multiple_responses();
        assert_eq!(request.response_count, ResponseCount::Multiple);
        assert_eq!(
            request.headers(RpcId(0), AppSessionId(1))[5].1,
            "multiple".to_string()
        );
    }

    #[test]
    fn type_is_appended_after_existing_keys() {
        let request = Request::new("channelChange", object(json!({ "channelId": "c1" })));
        let body = request.into_body();
        let keys: Vec<&String> = body.keys().collect();
        assert_eq!(keys, ["channelId", "type"]);
        assert_eq!(body["type"], "channelChange");
    }
}
