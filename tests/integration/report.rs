//! Report endpoints: formats, headers and recommendations.

use crate::helpers::*;
use reqwest::StatusCode;

#[tokio::test]
async fn test_html_report() {
    let server = TestServer::start().await;
    let resp = server.get("/").await;

    assert_status(&resp, StatusCode::OK);
    assert_header_starts_with(&resp, "content-type", "text/html");
    assert_header_starts_with(&resp, "server-timing", "handler_called;dur=");
    assert_body_contains(resp, "<h1>Request diagnostics</h1>").await;
}

#[tokio::test]
async fn test_text_report() {
    let server = TestServer::start().await;
    let resp = server.get("/report.txt").await;

    assert_status(&resp, StatusCode::OK);
    assert_header_starts_with(&resp, "content-type", "text/plain");
    assert_body_contains(resp, "[recommendations]").await;
}

#[tokio::test]
async fn test_json_report_shape() {
    let server = TestServer::start().await;
    let body = server.get_json("/report.json?probe=1", &[]).await;

    let report = &body["report"];
    assert_eq!(report["stages"][0]["name"], "handler_called");
    assert_eq!(report["stages"][1]["name"], "end");
    assert_eq!(report["spans"][1]["label"], "handler");
    assert_eq!(report["pre_handler"]["kind"], "estimated");
    assert!(report["total_ms"].as_f64().unwrap() >= 0.0);

    let snapshot = &report["snapshot"];
    assert_eq!(snapshot["protocol"]["method"], "GET");
    assert_eq!(snapshot["protocol"]["uri"], "/report.json?probe=1");
    assert_eq!(snapshot["protocol"]["protocol_version"], "HTTP/1.1");
    assert_eq!(snapshot["connection"]["client_addr"], "127.0.0.1");
    assert_eq!(snapshot["runtime"]["handler"], "embedded");
    assert!(snapshot["runtime"]["cpu_count"].as_i64().unwrap() >= 1);

    assert_eq!(body["benchmark"]["iterations"], 100);
}

#[tokio::test]
async fn test_request_id_round_trip() {
    let server = TestServer::start().await;

    let resp = server
        .get_with_headers("/report.json", &[("X-Request-Id", "trace-42")])
        .await;
    assert_header(&resp, "x-request-id", "trace-42");
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["request_id"], "trace-42");
    assert_eq!(body["report"]["snapshot"]["server"]["request_id"], "trace-42");

    let resp = server.get("/report.json").await;
    let generated = resp.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(generated.len(), 36);
}

#[tokio::test]
async fn test_recommendations_follow_request() {
    let server = TestServer::start().await;

    let bare = server.get_json("/report.json", &[]).await;
    let codes = recommendation_codes(&bare);
    assert!(codes.contains(&"missing_keep_alive".to_string()));
    assert!(codes.contains(&"compression_unsupported".to_string()));
    assert!(codes.contains(&"bytecode_cache_disabled".to_string()));

    let tuned = server
        .get_json(
            "/report.json",
            &[("Connection", "keep-alive"), ("Accept-Encoding", "br")],
        )
        .await;
    let codes = recommendation_codes(&tuned);
    assert!(!codes.contains(&"missing_keep_alive".to_string()));
    assert!(!codes.contains(&"compression_unsupported".to_string()));
}

#[tokio::test]
async fn test_bytecode_cache_and_bench_config() {
    let server = TestServer::start_with(|config| {
        config.diagnostics.bytecode_cache = true;
        config.diagnostics.bench_iterations = 0;
    })
    .await;

    let body = server.get_json("/report.json", &[]).await;
    assert!(!recommendation_codes(&body).contains(&"bytecode_cache_disabled".to_string()));
    assert_eq!(body["report"]["snapshot"]["runtime"]["bytecode_cache"], true);
    assert!(body.get("benchmark").is_none());
}
