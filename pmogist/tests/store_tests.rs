//! Integration tests for the gist-backed catalog store

use pmogist::{GistError, RemoteConfigStore, VideoEntry};
use pmoutils::RetryPolicy;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GIST_PATH: &str = "/gists/abc123";

fn catalog() -> Value {
    json!({
        "categories": [
            {
                "id": "x",
                "subcategories": [
                    { "id": "y", "videos": [
                        { "id": "y_1", "youtubeId": "aaa" },
                        { "id": "y_3", "youtubeId": "bbb" }
                    ] }
                ]
            },
            {
                "id": "music",
                "videos": [ { "id": "intro", "youtubeId": "ccc", "title": "Intro" } ]
            }
        ]
    })
}

fn gist_body(file_name: &str, document: &Value) -> Value {
    let mut files = serde_json::Map::new();
    files.insert("README.md".into(), json!({ "content": "# catalog" }));
    files.insert(file_name.into(), json!({ "content": document.to_string() }));
    json!({ "id": "abc123", "files": files })
}

fn store_for(server: &MockServer) -> RemoteConfigStore {
    RemoteConfigStore::builder()
        .api_base(server.uri())
        .gist_id("abc123")
        .token("test-token")
        .retry(RetryPolicy::new(2, Duration::from_millis(10)))
        .request_timeout(Duration::from_millis(500))
        .build()
        .unwrap()
}

async fn mount_gist(server: &MockServer, file_name: &str, document: &Value) {
    Mock::given(method("GET"))
        .and(path(GIST_PATH))
        .and(header("Authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(gist_body(file_name, document)))
        .mount(server)
        .await;
}

async fn mount_patch(server: &MockServer, expected_calls: u64) {
    Mock::given(method("PATCH"))
        .and(path(GIST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "abc123" })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

/// Document written by the last PATCH request
async fn written_document(server: &MockServer) -> (String, Value) {
    let requests = server.received_requests().await.unwrap();
    let patch = requests
        .iter()
        .rev()
        .find(|r| r.method.as_str() == "PATCH")
        .expect("a PATCH request was sent");
    let body: Value = serde_json::from_slice(&patch.body).unwrap();
    let (name, file) = body["files"].as_object().unwrap().iter().next().unwrap();
    let content = file["content"].as_str().unwrap();
    assert!(content.contains("\n  \""), "content is pretty-printed");
    (name.clone(), serde_json::from_str(content).unwrap())
}

#[tokio::test]
async fn test_get_config_uses_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GIST_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gist_body("videos-config.json", &catalog())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let first = store.get_config(true).await.unwrap();
    let second = store.get_config(true).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.categories.len(), 2);
    assert_eq!(first.video_count(), 3);
}

#[tokio::test]
async fn test_bypassing_or_expired_cache_refetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GIST_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gist_body("videos-config.json", &catalog())),
        )
        .expect(3)
        .mount(&server)
        .await;

    let store = RemoteConfigStore::builder()
        .api_base(server.uri())
        .gist_id("abc123")
        .token("test-token")
        .cache_ttl(Duration::from_millis(50))
        .build()
        .unwrap();

    store.get_config(true).await.unwrap();
    store.get_config(false).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;
    store.get_config(true).await.unwrap();
}

#[tokio::test]
async fn test_fetch_failure_falls_back_to_last_known_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GIST_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(gist_body("videos-config.json", &catalog())),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(GIST_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let loaded = store.get_config(true).await.unwrap();
    let fallback = store.get_config(false).await.unwrap();
    assert_eq!(loaded, fallback);
}

#[tokio::test]
async fn test_fetch_failure_without_cache_is_surfaced_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GIST_PATH))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;

    let result = store_for(&server).get_config(true).await;
    assert!(matches!(result, Err(GistError::ApiError { code: 500, .. })));
}

#[tokio::test]
async fn test_not_found_and_unauthorized_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GIST_PATH))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "Not Found" })))
        .expect(1)
        .mount(&server)
        .await;

    let result = store_for(&server).get_config(true).await;
    assert!(matches!(result, Err(GistError::NotFound(ref m)) if m == "Not Found"));

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GIST_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let result = store_for(&server).get_config(true).await;
    assert!(matches!(result, Err(GistError::Unauthorized(_))));
}

#[tokio::test]
async fn test_missing_config_file_lists_available_files() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(GIST_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": { "README.md": { "content": "# catalog" }, "notes.txt": { "content": "x" } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    match store_for(&server).get_config(true).await {
        Err(GistError::ConfigFileNotFound { available }) => {
            assert_eq!(available, "README.md, notes.txt");
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_credentials_fail_without_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = RemoteConfigStore::builder()
        .api_base(server.uri())
        .gist_id("abc123")
        .build()
        .unwrap();

    assert!(!store.is_configured());
    assert!(matches!(
        store.get_config(true).await,
        Err(GistError::Configuration(_))
    ));
}

#[tokio::test]
async fn test_add_video_generates_id_and_writes_document() {
    let server = MockServer::start().await;
    mount_gist(&server, "videos-config.json", &catalog()).await;
    mount_patch(&server, 1).await;

    let store = store_for(&server);
    let notified = Arc::new(AtomicU32::new(0));
    let counter = notified.clone();
    store.on_update(move |document| {
        assert_eq!(document.video_count(), 4);
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let id = store
        .add_video("x", Some("y"), VideoEntry::new("ddd"))
        .await
        .unwrap();
    assert_eq!(id, "y_4");
    assert_eq!(notified.load(Ordering::SeqCst), 1);

    let (file_name, written) = written_document(&server).await;
    assert_eq!(file_name, "videos-config.json");
    let videos = &written["categories"][0]["subcategories"][0]["videos"];
    assert_eq!(videos[2], json!({ "id": "y_4", "youtubeId": "ddd" }));

    // Le cache est remplacé par le document écrit
    let cached = store.get_config(true).await.unwrap();
    assert!(cached.contains_video_id("y_4"));
}

#[tokio::test]
async fn test_add_video_rejects_id_present_elsewhere_in_the_tree() {
    let server = MockServer::start().await;
    mount_gist(&server, "videos-config.json", &catalog()).await;
    mount_patch(&server, 0).await;

    let store = store_for(&server);
    let result = store
        .add_video("x", Some("y"), VideoEntry::new("ddd").with_id("intro"))
        .await;
    assert!(matches!(result, Err(GistError::Validation(_))));
}

#[tokio::test]
async fn test_edits_on_unknown_targets_are_not_found() {
    let server = MockServer::start().await;
    mount_gist(&server, "videos-config.json", &catalog()).await;
    mount_patch(&server, 0).await;

    let store = store_for(&server);
    let patch = json!({ "title": "New" });
    let patch = patch.as_object().unwrap();

    assert!(matches!(
        store.update_video("x", Some("y"), "intro", patch).await,
        Err(GistError::NotFound(_))
    ));
    assert!(matches!(
        store.remove_video("missing", None, "intro").await,
        Err(GistError::NotFound(_))
    ));
    assert!(matches!(
        store.add_video("x", Some("nope"), VideoEntry::new("eee")).await,
        Err(GistError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_update_and_remove_write_back_to_pattern_file() {
    let server = MockServer::start().await;
    mount_gist(&server, "videos-config-prod.json", &catalog()).await;
    mount_patch(&server, 2).await;

    let store = store_for(&server);
    let patch = json!({ "title": "Live intro" });
    store
        .update_video("music", None, "intro", patch.as_object().unwrap())
        .await
        .unwrap();

    let (file_name, written) = written_document(&server).await;
    assert_eq!(file_name, "videos-config-prod.json");
    assert_eq!(
        written["categories"][1]["videos"][0],
        json!({ "id": "intro", "youtubeId": "ccc", "title": "Live intro" })
    );

    store.remove_video("x", Some("y"), "y_1").await.unwrap();
    let (_, written) = written_document(&server).await;
    assert_eq!(
        written["categories"][0]["subcategories"][0]["videos"],
        json!([{ "id": "y_3", "youtubeId": "bbb" }])
    );
}

#[tokio::test]
async fn test_failed_write_keeps_cache_and_skips_callbacks() {
    let server = MockServer::start().await;
    mount_gist(&server, "videos-config.json", &catalog()).await;
    Mock::given(method("PATCH"))
        .and(path(GIST_PATH))
        .respond_with(ResponseTemplate::new(502))
        .expect(2)
        .mount(&server)
        .await;

    let store = store_for(&server);
    let notified = Arc::new(AtomicU32::new(0));
    let counter = notified.clone();
    store.on_update(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let result = store.add_video("x", Some("y"), VideoEntry::new("ddd")).await;
    assert!(matches!(result, Err(GistError::ApiError { code: 502, .. })));
    assert_eq!(notified.load(Ordering::SeqCst), 0);
    assert!(!store.cached().unwrap().contains_video_id("y_4"));
}

#[tokio::test]
async fn test_panicking_subscriber_does_not_block_others() {
    let server = MockServer::start().await;
    mount_patch(&server, 1).await;

    let store = store_for(&server);
    let notified = Arc::new(AtomicU32::new(0));
    let counter = notified.clone();

    store.on_update(|_| panic!("subscriber failure"));
    let removed = store.on_update(|_| panic!("never called"));
    store.on_update(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert!(store.unsubscribe(removed));
    assert!(!store.unsubscribe(removed));

    store
        .update_config_json(&catalog().to_string())
        .await
        .unwrap();
    assert_eq!(notified.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_invalid_document_is_rejected_before_writing() {
    let server = MockServer::start().await;
    mount_patch(&server, 0).await;

    let result = store_for(&server)
        .update_config_json(r#"{ "videos": [] }"#)
        .await;
    assert!(matches!(result, Err(GistError::Validation(_))));
}

#[tokio::test]
async fn test_check_connection() {
    let server = MockServer::start().await;
    mount_gist(&server, "videos-config.json", &catalog()).await;

    let status = store_for(&server).check_connection().await;
    assert!(status.success);
    assert_eq!(status.message, "Connection OK");

    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    let status = store_for(&server).check_connection().await;
    assert!(!status.success);
    assert!(status.message.contains("Access denied"));
}
