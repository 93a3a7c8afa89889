//! Integration tests for pmoyoutube

use pmoutils::RetryPolicy;
use pmoyoutube::{ItemReference, MetadataFetcher, Stat, YoutubeError};
use serde_json::json;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Create a mock `/videos` item
fn mock_video_json(id: &str, title: &str) -> serde_json::Value {
    json!({
        "id": id,
        "snippet": {
            "title": title,
            "description": "A fairly long description of the video",
            "publishedAt": "2024-03-01T12:00:00Z",
            "channelTitle": "PMO Channel",
            "thumbnails": {
                "default": { "url": format!("https://i.ytimg.com/vi/{}/default.jpg", id), "width": 120, "height": 90 }
            }
        },
        "statistics": {
            "viewCount": "1500",
            "likeCount": "42"
        },
        "contentDetails": { "duration": "PT1H2M3S" }
    })
}

fn fetcher_for(server: &MockServer) -> MetadataFetcher {
    MetadataFetcher::builder()
        .api_base(server.uri())
        .api_key("test-key")
        .retry(RetryPolicy::new(2, Duration::from_millis(10)))
        .request_timeout(Duration::from_millis(500))
        .max_description_length(9)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_fetch_batch_normalizes_and_fills_placeholders() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .and(query_param("part", "snippet,statistics,contentDetails"))
        .and(query_param("id", "aaa,bbb"))
        .and(query_param("key", "test-key"))
        .and(query_param("maxResults", "50"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "items": [mock_video_json("aaa", "First")] })),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server);
    let refs = vec![
        ItemReference::new("music_1", "aaa"),
        ItemReference::new("music_2", "bbb"),
    ];

    let videos = fetcher.fetch_batch(&refs, None).await.unwrap();

    assert_eq!(videos.len(), 2);
    assert_eq!(videos[0].internal_id, "music_1");
    assert_eq!(videos[0].title, "First");
    assert_eq!(videos[0].description, "A fairly...");
    assert_eq!(videos[0].views, Stat::Count(1500));
    assert_eq!(videos[0].comments, Stat::Unavailable);
    assert_eq!(videos[0].duration, "1:02:03");
    assert!(!videos[0].placeholder);

    // Absent de la réponse : placeholder sans erreur
    assert_eq!(videos[1].internal_id, "music_2");
    assert!(videos[1].placeholder);
    assert_eq!(
        videos[1].thumbnails["default"].url,
        "https://img.youtube.com/vi/bbb/default.jpg"
    );
}

#[tokio::test]
async fn test_cache_hit_skips_network_regardless_of_order() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [mock_video_json("aaa", "A"), mock_video_json("bbb", "B")]
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server);
    let first = vec![
        ItemReference::new("x_1", "bbb"),
        ItemReference::new("x_2", "aaa"),
    ];
    let second = vec![
        ItemReference::new("x_2", "aaa"),
        ItemReference::new("x_1", "bbb"),
    ];

    let fetched = fetcher.fetch_batch(&first, None).await.unwrap();
    let cached = fetcher.fetch_batch(&second, None).await.unwrap();

    // Le lot en cache est retourné tel quel
    assert_eq!(fetched, cached);
    assert_eq!(fetcher.stats().cache.total, 1);
}

#[tokio::test]
async fn test_retry_exhaustion_makes_exactly_two_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server);
    let result = fetcher
        .fetch_batch(&[ItemReference::new("x_1", "aaa")], None)
        .await;

    assert!(matches!(
        result,
        Err(YoutubeError::ApiError { code: 503, .. })
    ));
    assert_eq!(fetcher.stats().pending_requests, 0);
}

#[tokio::test]
async fn test_not_found_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server);
    let result = fetcher
        .fetch_batch(&[ItemReference::new("x_1", "aaa")], None)
        .await;

    assert!(matches!(result, Err(YoutubeError::NotFound(_))));
}

#[tokio::test]
async fn test_forbidden_is_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(403).set_body_string("quotaExceeded"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server);
    let result = fetcher
        .fetch_batch(&[ItemReference::new("x_1", "aaa")], None)
        .await;

    assert!(matches!(result, Err(YoutubeError::Unauthorized(_))));
}

#[tokio::test]
async fn test_cancelled_signal_makes_no_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server);
    let token = CancellationToken::new();
    token.cancel();

    let result = fetcher
        .fetch_batch(&[ItemReference::new("x_1", "aaa")], Some(&token))
        .await;

    assert!(matches!(result, Err(YoutubeError::Cancelled)));
}

#[tokio::test]
async fn test_timeout_is_retried_then_surfaced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "items": [] }))
                .set_delay(Duration::from_secs(2)),
        )
        .expect(2)
        .mount(&mock_server)
        .await;

    let fetcher = MetadataFetcher::builder()
        .api_base(mock_server.uri())
        .api_key("test-key")
        .retry(RetryPolicy::new(2, Duration::from_millis(10)))
        .request_timeout(Duration::from_millis(100))
        .build()
        .unwrap();

    let result = fetcher
        .fetch_batch(&[ItemReference::new("x_1", "aaa")], None)
        .await;

    assert!(matches!(result, Err(YoutubeError::Timeout(100))));
}

#[tokio::test]
async fn test_missing_api_key_is_a_configuration_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let fetcher = MetadataFetcher::builder()
        .api_base(mock_server.uri())
        .build()
        .unwrap();

    let result = fetcher
        .fetch_batch(&[ItemReference::new("x_1", "aaa")], None)
        .await;

    assert!(matches!(result, Err(YoutubeError::Configuration(_))));
}

#[tokio::test]
async fn test_abort_all_cancels_in_flight_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/videos"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "items": [] }))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let fetcher = std::sync::Arc::new(
        MetadataFetcher::builder()
            .api_base(mock_server.uri())
            .api_key("test-key")
            .request_timeout(Duration::from_secs(10))
            .build()
            .unwrap(),
    );

    let task = {
        let fetcher = fetcher.clone();
        tokio::spawn(async move {
            fetcher
                .fetch_batch(&[ItemReference::new("x_1", "aaa")], None)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fetcher.stats().pending_requests, 1);
    fetcher.abort_all();

    let result = task.await.unwrap();
    assert!(matches!(result, Err(YoutubeError::Cancelled)));
    assert_eq!(fetcher.stats().pending_requests, 0);
}
