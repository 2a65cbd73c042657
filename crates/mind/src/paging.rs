use mind_core::Request;
use mind_rpc::{MindSession, RpcError};
use serde_json::{Map, Value, json};
use tracing::debug;

/// Results requested per page when the caller does not say otherwise.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Paging controls for one search call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// `count` sent with every page request.
    pub page_size: u32,
    /// Offset of the first requested result.
    pub offset: u64,
    /// Keep requesting pages until the device reports the bottom.
    pub fetch_all: bool,
    /// Stop once more than this many results have been accumulated.
    pub limit: Option<usize>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            offset: 0,
            fetch_all: false,
            limit: None,
        }
    }
}

impl PageRequest {
    /// Exhaustive fetch with default page size.
    pub fn all() -> Self {
        Self {
            fetch_all: true,
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn starting_at(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Issues `request_type` page by page, accumulating the `result_field` arrays.
///
/// Stops when a page is empty or lacks the field, when `isBottom` is true or
/// absent, when more than `limit` results have accumulated, or after the first
/// page unless `fetch_all` is set. Results keep the device's order.
pub async fn fetch_pages(
    session: &mut MindSession,
    request_type: &str,
    result_field: &str,
    mut payload: Map<String, Value>,
    page: PageRequest,
) -> Result<Vec<Value>, RpcError> {
    let mut results = Vec::new();
    let mut pages = 0_usize;

    loop {
        let offset = page.offset.saturating_add(results.len() as u64);
        payload.insert("count".to_string(), json!(page.page_size));
        payload.insert("offset".to_string(), json!(offset));

        let response = session
            .call(Request::new(request_type, payload.clone()))
            .await?;
        pages += 1;

        let mut body = response.body;
        let batch = match body.get_mut(result_field).map(Value::take) {
            Some(Value::Array(batch)) if !batch.is_empty() => batch,
            _ => break,
        };
        results.extend(batch);

        let at_bottom = body
            .get("isBottom")
            .is_none_or(|flag| flag.as_bool().unwrap_or(false));
        let over_limit = page.limit.is_some_and(|limit| results.len() > limit);
        if at_bottom || over_limit || !page.fetch_all {
            break;
        }
    }

    debug!(
        request_type,
        pages,
        results = results.len(),
        "paged search finished"
    );
    Ok(results)
}
