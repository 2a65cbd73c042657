use mind_core::{BodyId, LevelOfDetail, Request};
use mind_rpc::{MindSession, RpcError};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::paging::{PageRequest, fetch_pages};

/// Caller-supplied search criteria, merged into the request payload.
pub type Filter = Map<String, Value>;

const LEVEL_OF_DETAIL: &str = "levelOfDetail";
const RESPONSE_TEMPLATE: &str = "responseTemplate";

/// Typed searches and commands over a ready [`MindSession`].
#[derive(Debug)]
pub struct Mind {
    session: MindSession,
    level_of_detail: LevelOfDetail,
}

impl Mind {
    /// Wraps an already connected session.
    pub fn new(session: MindSession) -> Self {
        Self::with_level_of_detail(session, LevelOfDetail::default())
    }

    pub fn with_level_of_detail(session: MindSession, level_of_detail: LevelOfDetail) -> Self {
        Self {
            session,
            level_of_detail,
        }
    }

    /// Connects `session` and wraps it.
    pub async fn connect(
        mut session: MindSession,
        level_of_detail: LevelOfDetail,
    ) -> Result<Self, RpcError> {
        session.connect().await?;
        Ok(Self::with_level_of_detail(session, level_of_detail))
    }

    pub fn session(&self) -> &MindSession {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut MindSession {
        &mut self.session
    }

    pub fn into_session(self) -> MindSession {
        self.session
    }

    pub fn level_of_detail(&self) -> LevelOfDetail {
        self.level_of_detail
    }

    pub fn body_id(&self) -> &BodyId {
        self.session.body_id()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub async fn close(&mut self) {
        self.session.close().await;
    }

    /// Runs a paged search after merging `filter` with the endpoint's fixed `options`.
    ///
    /// The default level of detail is added only when neither map already
    /// shapes the response with `levelOfDetail` or `responseTemplate`.
    pub async fn search(
        &mut self,
        request_type: &str,
        result_field: &str,
        filter: Filter,
        options: Filter,
        page: PageRequest,
    ) -> Result<Vec<Value>, RpcError> {
        let shaped = [LEVEL_OF_DETAIL, RESPONSE_TEMPLATE]
            .iter()
            .any(|key| filter.contains_key(*key) || options.contains_key(*key));

        let mut payload = filter;
        payload.extend(options);
        if !shaped {
            payload.insert(
                LEVEL_OF_DETAIL.to_string(),
                json!(self.level_of_detail.as_str()),
            );
        }

        fetch_pages(&mut self.session, request_type, result_field, payload, page).await
    }

    pub async fn channel_search(
        &mut self,
        filter: Filter,
        no_limit: bool,
        page: PageRequest,
    ) -> Result<Vec<Value>, RpcError> {
        let options = self.options(json!({ "flatten": true, "noLimit": no_limit }));
        self.search("channelSearch", "channel", filter, options, page)
            .await
    }

    pub async fn recording_folder_item_search(
        &mut self,
        filter: Filter,
        page: PageRequest,
    ) -> Result<Vec<Value>, RpcError> {
        let options = self.options(json!({ "flatten": true }));
        self.search(
            "recordingFolderItemSearch",
            "recordingFolderItem",
            filter,
            options,
            page,
        )
        .await
    }

    /// Recordings that are in progress or scheduled.
    pub async fn recording_search(
        &mut self,
        filter: Filter,
        page: PageRequest,
    ) -> Result<Vec<Value>, RpcError> {
        let options = self.options(json!({ "state": ["inProgress", "scheduled"] }));
        self.search("recordingSearch", "recording", filter, options, page)
            .await
    }

    pub async fn offer_search(
        &mut self,
        filter: Filter,
        page: PageRequest,
    ) -> Result<Vec<Value>, RpcError> {
        let options = self.options(json!({}));
        self.search("offerSearch", "offer", filter, options, page)
            .await
    }

    pub async fn content_search(
        &mut self,
        filter: Filter,
        page: PageRequest,
    ) -> Result<Vec<Value>, RpcError> {
        let options = self.options(json!({}));
        self.search("contentSearch", "content", filter, options, page)
            .await
    }

    pub async fn collection_search(
        &mut self,
        filter: Filter,
        page: PageRequest,
    ) -> Result<Vec<Value>, RpcError> {
        let options = self.options(json!({ "omitPgdImages": true }));
        self.search("collectionSearch", "collection", filter, options, page)
            .await
    }

    pub async fn category_search(
        &mut self,
        filter: Filter,
        top_level_only: bool,
        page: PageRequest,
    ) -> Result<Vec<Value>, RpcError> {
        let options = self.options(json!({ "topLevelOnly": top_level_only }));
        self.search("categorySearch", "category", filter, options, page)
            .await
    }

    /// What each tuner is currently showing.
    pub async fn whats_on_search(&mut self, page: PageRequest) -> Result<Vec<Value>, RpcError> {
        let options = self.options(json!({}));
        self.search("whatsOnSearch", "whatsOn", Filter::new(), options, page)
            .await
    }

    pub async fn tuner_state(&mut self) -> Result<Vec<Value>, RpcError> {
        let options = self.options(json!({}));
        self.search(
            "tunerStateEventRegister",
            "state",
            Filter::new(),
            options,
            PageRequest::default(),
        )
        .await
    }

    /// Sends a remote-control key press, e.g. `"pause"` or `"channelUp"`.
    pub async fn send_key(&mut self, event: &str) -> Result<Value, RpcError> {
        self.command("keyEventSend", json!({ "event": event })).await
    }

    /// Types `value` as an ascii key event.
    pub async fn send_ascii(&mut self, value: &str) -> Result<Value, RpcError> {
        self.command("keyEventSend", json!({ "event": "ascii", "value": value }))
            .await
    }

    pub async fn change_channel(&mut self, channel_id: &str) -> Result<Value, RpcError> {
        self.command("channelChange", json!({ "channelId": channel_id }))
            .await
    }

    async fn command(&mut self, request_type: &str, fields: Value) -> Result<Value, RpcError> {
        let payload = self.options(fields);
        debug!(request_type, body_id = %self.body_id(), "sending command");
        let response = self
            .session
            .call(Request::new(request_type, payload))
            .await?;
        Ok(response.body)
    }

    /// Endpoint options: the resolved body id followed by `extra`.
    fn options(&self, extra: Value) -> Filter {
        let mut options = Filter::new();
        options.insert(
            "bodyId".to_string(),
            json!(self.session.body_id().as_str()),
        );
        if let Value::Object(extra) = extra {
            options.extend(extra);
        }
        options
    }
}
