#![allow(dead_code)]

use mind_rpc::Frame;
use serde_json::{Value, json};

use crate::support::request_type;

pub fn body_config(body_id: &str) -> Value {
    json!({ "type": "bodyConfigList", "bodyConfig": [{ "bodyId": body_id }] })
}

/// Slice of `items` selected by the request's `offset` and `count`, and whether it is the last.
pub fn page_of(frame: &Frame, items: &[Value]) -> (Vec<Value>, bool) {
    let field = |name: &str| frame.body.get(name).and_then(Value::as_u64).unwrap_or(0) as usize;
    let start = field("offset").min(items.len());
    let end = start.saturating_add(field("count")).min(items.len());
    (items[start..end].to_vec(), end == items.len())
}

/// Numbered items `{ "<key>": "<key>-<n>" }` for n in `0..total`.
pub fn numbered(key: &str, total: usize) -> Vec<Value> {
    (0..total)
        .map(|n| json!({ key: format!("{key}-{n}") }))
        .collect()
}

pub fn search_requests<'a>(frames: &'a [Frame], request_type_name: &'a str) -> Vec<&'a Frame> {
    frames
        .iter()
        .filter(|frame| request_type(frame) == request_type_name)
        .collect()
}
