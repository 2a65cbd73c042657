#[path = "../../mind-rpc/tests/support/mod.rs"]
mod support;
mod fixtures;

use fixtures::body_config;
use mind::{Filter, LevelOfDetail, Mind, MindSession, PageRequest};
use serde_json::{Value, json};
use support::{FakeDevice, Reply, auth_ok, request_type};

const BODY_ID: &str = "tsn:7D8000190000000";

/// Device answering every search with one item under `field` and echoing commands.
fn device() -> FakeDevice {
    FakeDevice::new(|frame| {
        let single = |field: &str, item: Value| -> Reply {
            json!({ field: [item], "isBottom": true }).into()
        };
        match request_type(frame) {
            "bodyAuthenticate" => auth_ok().into(),
            "bodyConfigSearch" => body_config(BODY_ID).into(),
            "channelSearch" => single("channel", json!({ "channelNumber": "702" })),
            "recordingFolderItemSearch" => single("recordingFolderItem", json!({ "title": "News" })),
            "categorySearch" => single("category", json!({ "label": "Movies" })),
            "whatsOnSearch" => single("whatsOn", json!({ "playbackType": "liveCache" })),
            "tunerStateEventRegister" => single("state", json!({ "tunerId": "0" })),
            "keyEventSend" | "channelChange" => json!({ "type": "success" }).into(),
            other => json!({ "type": "error", "text": format!("unsupported {other}") }).into(),
        }
    })
}

async fn connected(device: &FakeDevice) -> Mind {
    let session =
        MindSession::local(device.connector(), "192.0.2.30", "8675309").expect("session");
    Mind::connect(session, LevelOfDetail::Medium)
        .await
        .expect("connect should succeed")
}

fn last_body(device: &FakeDevice) -> Value {
    device
        .requests()
        .pop()
        .map(|frame| frame.body)
        .expect("device saw a request")
}

#[tokio::test]
async fn channel_search_flattens_and_passes_no_limit() {
    let device = device();
    let mut mind = connected(&device).await;

    let channels = mind
        .channel_search(Filter::new(), true, PageRequest::all())
        .await
        .expect("channel search");

    assert_eq!(channels, vec![json!({ "channelNumber": "702" })]);
    let body = last_body(&device);
    assert_eq!(body["type"], json!("channelSearch"));
    assert_eq!(body["bodyId"], json!(BODY_ID));
    assert_eq!(body["flatten"], json!(true));
    assert_eq!(body["noLimit"], json!(true));
    assert_eq!(body["levelOfDetail"], json!("medium"));
}

#[tokio::test]
async fn recording_search_restricts_state() {
    let device = FakeDevice::new(|frame| match request_type(frame) {
        "bodyAuthenticate" => auth_ok().into(),
        "bodyConfigSearch" => body_config(BODY_ID).into(),
        _ => json!({ "recording": [], "isBottom": true }).into(),
    });
    let mut mind = connected(&device).await;

    mind.recording_search(Filter::new(), PageRequest::default())
        .await
        .expect("recording search");

    let body = last_body(&device);
    assert_eq!(body["state"], json!(["inProgress", "scheduled"]));
    assert_eq!(body["bodyId"], json!(BODY_ID));
}

#[tokio::test]
async fn folder_and_category_searches_carry_their_options() {
    let device = device();
    let mut mind = connected(&device).await;

    let items = mind
        .recording_folder_item_search(Filter::new(), PageRequest::default())
        .await
        .expect("folder search");
    assert_eq!(items.len(), 1);
    assert_eq!(last_body(&device)["flatten"], json!(true));

    let categories = mind
        .category_search(Filter::new(), true, PageRequest::default())
        .await
        .expect("category search");
    assert_eq!(categories, vec![json!({ "label": "Movies" })]);
    assert_eq!(last_body(&device)["topLevelOnly"], json!(true));
}

#[tokio::test]
async fn filter_keys_are_merged_ahead_of_options() {
    let device = device();
    let mut mind = connected(&device).await;

    let mut filter = Filter::new();
    filter.insert("channelNumber".to_string(), json!("702"));
    mind.channel_search(filter, false, PageRequest::default())
        .await
        .expect("channel search");

    let body = last_body(&device);
    let keys: Vec<&str> = body
        .as_object()
        .expect("object body")
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(
        keys,
        vec![
            "channelNumber",
            "bodyId",
            "flatten",
            "noLimit",
            "levelOfDetail",
            "count",
            "offset",
            "type"
        ]
    );
}

#[tokio::test]
async fn whats_on_and_tuner_state_use_body_id_only() {
    let device = device();
    let mut mind = connected(&device).await;

    let on_now = mind
        .whats_on_search(PageRequest::default())
        .await
        .expect("whats on");
    assert_eq!(on_now, vec![json!({ "playbackType": "liveCache" })]);

    let tuners = mind.tuner_state().await.expect("tuner state");
    assert_eq!(tuners, vec![json!({ "tunerId": "0" })]);
    let body = last_body(&device);
    assert_eq!(body["type"], json!("tunerStateEventRegister"));
    assert_eq!(body["bodyId"], json!(BODY_ID));
}

#[tokio::test]
async fn commands_return_the_response_body() {
    let device = device();
    let mut mind = connected(&device).await;

    let reply = mind.send_key("pause").await.expect("send key");
    assert_eq!(reply, json!({ "type": "success" }));
    let body = last_body(&device);
    assert_eq!(body["type"], json!("keyEventSend"));
    assert_eq!(body["event"], json!("pause"));
    assert!(body.get("value").is_none());

    mind.send_ascii("a").await.expect("send ascii");
    let body = last_body(&device);
    assert_eq!(body["event"], json!("ascii"));
    assert_eq!(body["value"], json!("a"));

    mind.change_channel("tivo:ch.702").await.expect("change channel");
    let body = last_body(&device);
    assert_eq!(body["type"], json!("channelChange"));
    assert_eq!(body["channelId"], json!("tivo:ch.702"));
    assert_eq!(body["bodyId"], json!(BODY_ID));

    let session = mind.into_session();
    assert!(session.is_ready());
    assert_eq!(session.body_id().as_str(), BODY_ID);
}
