//! Health endpoint and unknown paths.

use crate::helpers::*;
use reqwest::StatusCode;

#[tokio::test]
async fn test_health() {
    let server = TestServer::start().await;
    let resp = server.get("/health").await;

    assert_status(&resp, StatusCode::OK);
    assert_header(&resp, "content-type", "application/json");
    assert_has_header(&resp, "x-request-id");

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body["timestamp"].as_u64().unwrap() > 0);
}

#[tokio::test]
async fn test_404_not_found() {
    let server = TestServer::start().await;
    let resp = server.get("/index.php").await;

    assert_status(&resp, StatusCode::NOT_FOUND);
    assert_header_starts_with(&resp, "content-type", "text/plain");
    assert_has_header(&resp, "x-request-id");
    assert!(resp.headers().get("server-timing").is_none());
}
