//! Integration tests for the GraphQL client against a mock server

use cliptwitch::{Error, PaginationCursor, QueryMode, TimeFilter, TwitchClient};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn clip_node(id: &str, views: u64) -> serde_json::Value {
    json!({
        "id": id,
        "slug": format!("Slug{}", id),
        "title": format!("Clip {}", id),
        "viewCount": views,
        "durationSeconds": 30,
        "createdAt": "2024-06-01T12:00:00Z",
        "thumbnailURL": format!("https://static.example/{}.jpg", id),
        "curator": { "login": "clipper", "displayName": "Clipper" },
        "game": { "id": "33", "name": "Speedrunning" }
    })
}

async fn client_for(server: &MockServer, mode: QueryMode) -> TwitchClient {
    TwitchClient::builder()
        .endpoint(format!("{}/gql", server.uri()))
        .query_mode(mode)
        .build()
        .await
        .unwrap()
}

#[tokio::test]
async fn test_fetch_page_reads_cursor_from_last_edge() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/gql"))
        .and(header("Client-ID", "kd1unb4b3q4t58fwlpcbzcbnm76a8fp"))
        .and(body_partial_json(json!({
            "operationName": "ClipsCards__User",
            "variables": { "login": "somechannel", "limit": 2, "criteria": { "filter": "LAST_WEEK" } }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "user": { "clips": {
                "pageInfo": { "hasNextPage": true },
                "edges": [
                    { "cursor": "MQ==", "node": clip_node("1", 500) },
                    { "cursor": "Mg==", "node": clip_node("2", 20) }
                ]
            }}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, QueryMode::Persisted).await;
    let page = client
        .fetch_page("somechannel", 2, TimeFilter::LastWeek, None)
        .await
        .unwrap();

    assert_eq!(page.clips.len(), 2);
    assert_eq!(page.clips[0].view_count, 500);
    assert_eq!(page.clips[1].url, "https://www.twitch.tv/somechannel/clip/Slug2");
    assert!(page.has_next_page);
    assert_eq!(page.end_cursor, Some(PaginationCursor::new("Mg==")));
}

#[tokio::test]
async fn test_fetch_page_sends_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/gql"))
        .and(body_partial_json(json!({ "variables": { "cursor": "MTAw" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "user": { "clips": {
                "pageInfo": { "hasNextPage": false },
                "edges": [{ "cursor": null, "node": clip_node("9", 1) }]
            }}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, QueryMode::Persisted).await;
    let cursor = PaginationCursor::new("MTAw");
    let page = client
        .fetch_page("somechannel", 100, TimeFilter::AllTime, Some(&cursor))
        .await
        .unwrap();

    assert_eq!(page.clips.len(), 1);
    assert!(!page.has_next_page);
}

#[tokio::test]
async fn test_literal_query_reads_page_info_cursor() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/gql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "user": { "clips": {
                "pageInfo": { "hasNextPage": true, "endCursor": "from-page-info" },
                "edges": [{ "cursor": "from-edge", "node": clip_node("1", 1) }]
            }}}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, QueryMode::Literal).await;
    let page = client
        .fetch_page("somechannel", 100, TimeFilter::AllTime, None)
        .await
        .unwrap();

    assert_eq!(page.end_cursor.unwrap().as_str(), "from-page-info");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["query"].as_str().unwrap().contains("endCursor"));
    assert!(body.get("extensions").is_none());
}

#[tokio::test]
async fn test_error_status_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = client_for(&server, QueryMode::Persisted).await;
    let err = client
        .fetch_page("somechannel", 100, TimeFilter::AllTime, None)
        .await
        .unwrap_err();

    match err {
        Error::Status { code, message } => {
            assert_eq!(code, 503);
            assert_eq!(message, "upstream down");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, QueryMode::Persisted).await;
    let err = client
        .fetch_page("somechannel", 100, TimeFilter::AllTime, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Json(_)));
}

#[tokio::test]
async fn test_graphql_errors_are_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "PersistedQueryNotFound" }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, QueryMode::Persisted).await;
    let err = client
        .fetch_page("somechannel", 100, TimeFilter::AllTime, None)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::GraphQl(_)));
    assert!(err.to_string().contains("PersistedQueryNotFound"));
}

#[tokio::test]
async fn test_unknown_channel_is_an_empty_page() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "user": null }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server, QueryMode::Persisted).await;
    let page = client
        .fetch_page("nobody", 100, TimeFilter::AllTime, None)
        .await
        .unwrap();
    assert!(page.clips.is_empty());
    assert!(!page.has_next_page);
    assert!(page.end_cursor.is_none());
}

#[tokio::test]
async fn test_resolve_playback_url() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/gql"))
        .and(body_partial_json(json!([{
            "operationName": "ClipsDownloadButton",
            "variables": { "slug": "FunnySlug" }
        }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "data": { "clip": {
                "videoQualities": [
                    { "quality": "1080", "sourceURL": "https://cdn.example/v/clip-1080.mp4" },
                    { "quality": "720", "sourceURL": "https://cdn.example/v/clip-720.mp4" }
                ],
                "playbackAccessToken": {
                    "signature": "deadbeef",
                    "value": "{\"clip_uri\":\"x y\"}"
                }
            }}
        }])))
        .mount(&server)
        .await;

    let client = client_for(&server, QueryMode::Persisted).await;
    let url = client.resolve_playback_url("FunnySlug").await.unwrap().unwrap();

    let parsed = url::Url::parse(&url).unwrap();
    assert_eq!(parsed.path(), "/v/clip-1080.mp4");
    let pairs: Vec<(String, String)> = parsed.query_pairs().into_owned().collect();
    assert_eq!(
        pairs,
        vec![
            ("sig".to_string(), "deadbeef".to_string()),
            ("token".to_string(), "{\"clip_uri\":\"x y\"}".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_unplayable_clip_is_none() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "data": { "clip": null }
        }])))
        .mount(&server)
        .await;

    let client = client_for(&server, QueryMode::Persisted).await;
    assert_eq!(client.resolve_playback_url("Gone").await.unwrap(), None);
}

#[tokio::test]
async fn test_playback_transport_failure_is_an_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let client = client_for(&server, QueryMode::Persisted).await;
    assert!(client.resolve_playback_url("Any").await.is_err());
}
