//! HTTP contract tests against a live gateway on an ephemeral port.

use crate::common::{setup_test_logging, TestGateway};
use serde_json::{json, Value};

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

async fn execute(
    gateway: &TestGateway,
    path: &str,
    body: Value,
) -> (reqwest::StatusCode, Value) {
    let response = client()
        .post(gateway.url(path))
        .json(&body)
        .send()
        .await
        .expect("request failed");
    let status = response.status();
    let body: Value = response.json().await.expect("non-JSON response");
    (status, body)
}

#[tokio::test]
async fn test_execute_happy_path() {
    setup_test_logging();
    let gateway = TestGateway::spawn().await.unwrap();

    let (status, body) = execute(
        &gateway,
        "/api/code/execute",
        json!({"code": "echo hi", "language": "shell"}),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["output"]["stdout"], "hi\n");
    assert_eq!(body["data"]["output"]["exitCode"], 0);
    assert_eq!(body["data"]["output"]["truncated"], false);
    assert!(body["data"]["executionTime"].is_u64());
    assert!(body["data"]["memoryUsage"].is_u64());
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_versioned_route_is_equivalent() {
    let gateway = TestGateway::spawn().await.unwrap();

    let (status, body) = execute(
        &gateway,
        "/api/v1/code/execute",
        json!({"code": "echo v1", "language": "shell"}),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["data"]["output"]["stdout"], "v1\n");
}

#[tokio::test]
async fn test_runtime_error_is_200_with_envelope() {
    let gateway = TestGateway::spawn().await.unwrap();

    let (status, body) = execute(
        &gateway,
        "/api/code/execute",
        json!({"code": "exit 3", "language": "shell"}),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["output"]["exitCode"], 3);
    assert_eq!(body["error"]["kind"], "runtime_error");
}

#[tokio::test]
async fn test_unknown_language_is_400() {
    let gateway = TestGateway::spawn().await.unwrap();

    let (status, body) = execute(
        &gateway,
        "/api/code/execute",
        json!({"code": "x", "language": "malbolge"}),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["kind"], "validation");
    assert!(body.get("data").is_none());
}

#[tokio::test]
async fn test_empty_code_is_400() {
    let gateway = TestGateway::spawn().await.unwrap();

    let (status, body) = execute(
        &gateway,
        "/api/code/execute",
        json!({"code": "   ", "language": "shell"}),
    )
    .await;

    assert_eq!(status, 400);
    assert_eq!(body["error"]["kind"], "validation");
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let gateway = TestGateway::spawn().await.unwrap();

    let response = client()
        .post(gateway.url("/api/code/execute"))
        .json(&json!({"language": "shell"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn test_validate_endpoint_accepts_and_rejects() {
    let gateway = TestGateway::spawn().await.unwrap();

    let (status, body) = execute(
        &gateway,
        "/api/code/validate",
        json!({"code": "echo fine", "language": "shell"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["valid"], true);

    let (status, body) = execute(
        &gateway,
        "/api/code/validate",
        json!({"code": "if true; then echo broken", "language": "shell"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["valid"], false);
    assert!(!body["data"]["errors"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_history_reflects_executions() {
    let gateway = TestGateway::spawn().await.unwrap();

    let _ = execute(
        &gateway,
        "/api/code/execute",
        json!({"code": "echo first", "language": "shell"}),
    )
    .await;

    let body: Value = client()
        .get(gateway.url("/api/code/history?limit=10"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    let records = body["data"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["language"], "shell");
    assert_eq!(records[0]["outcome"], "success");
    assert!(records[0]["submissionId"].is_string());
}

#[tokio::test]
async fn test_stats_aggregate_outcomes() {
    let gateway = TestGateway::spawn().await.unwrap();

    for code in ["echo ok", "exit 1"] {
        let _ = execute(
            &gateway,
            "/api/code/execute",
            json!({"code": code, "language": "shell"}),
        )
        .await;
    }

    let body: Value = client()
        .get(gateway.url("/api/code/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["totalExecutions"], 2);
    assert_eq!(body["data"]["byOutcome"]["success"], 1);
    assert_eq!(body["data"]["byOutcome"]["runtime_error"], 1);
    assert_eq!(body["data"]["byLanguage"]["shell"], 2);
}

#[tokio::test]
async fn test_health_reports_idle_service() {
    let gateway = TestGateway::spawn().await.unwrap();

    let body: Value = client()
        .get(gateway.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["status"], "ok");
    assert_eq!(body["activeSandboxes"], 0);
    assert_eq!(body["queueLength"], 0);
    assert!(body["languages"].as_array().unwrap().len() >= 10);
    assert_eq!(gateway.state.service.active_sandboxes(), 0);
}
