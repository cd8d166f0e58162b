use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use rawhistory::prelude::*;
use serde_json::{Value, json};
use tower::ServiceExt;

#[path = "support/mock_backend.rs"]
mod support;

use support::MockHistoryBackend;

fn history_uri(namespace: &str, workflow: &str, run_id: &str) -> String {
    format!("/api/v1/namespaces/{namespace}/workflows/{workflow}/run/{run_id}/history.json")
}

async fn get(backend: Arc<MockHistoryBackend>, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = router(backend)
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn happy_path_streams_events() {
    let backend = Arc::new(
        MockHistoryBackend::new().respond(Ok(HistoryPage::last(vec![HistoryEvent::new(1, 1)]))),
    );

    let (status, content_type, body) = get(
        backend.clone(),
        &history_uri("test-namespace", "test-workflow", "test-runid"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    assert_eq!(body, r#"[{"event_id":1,"event_type":1,"Attributes":null}]"#);
    assert_eq!(backend.calls(), 1);

    let request = &backend.requests()[0];
    assert_eq!(request.identity.namespace(), "test-namespace");
    assert_eq!(request.identity.workflow_id(), "test-workflow");
    assert_eq!(request.identity.run_id(), "test-runid");
}

#[tokio::test]
async fn workflow_id_is_url_decoded() {
    let backend = Arc::new(
        MockHistoryBackend::new().respond(Ok(HistoryPage::last(vec![HistoryEvent::new(1, 1)]))),
    );

    let (status, _, _) = get(
        backend.clone(),
        &history_uri("test-namespace", "test%2Fworkflow%2Bid", "test-runid"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(backend.requests()[0].identity.workflow_id(), "test/workflow+id");
}

#[tokio::test]
async fn invalid_url_encoding_is_rejected_before_fetching() {
    let backend = Arc::new(MockHistoryBackend::new());

    let (status, _, body) = get(
        backend.clone(),
        &history_uri("test-namespace", "invalid%2", "test-runid"),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert!(
        body["message"]
            .as_str()
            .unwrap()
            .contains("Invalid workflow ID")
    );
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn fetch_failure_is_embedded_with_success_status() {
    let backend =
        Arc::new(MockHistoryBackend::new().respond(Err(HistoryError::backend("fetch error"))));

    let (status, _, body) = get(backend.clone(), &history_uri("ns", "wf", "run")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"[{"error":"fetch error"}]"#);
    assert_eq!(backend.calls(), 1);
}

#[tokio::test]
async fn multi_page_history_is_one_array() {
    let token = ContinuationToken::new(b"page-2".to_vec());
    let backend = Arc::new(
        MockHistoryBackend::new()
            .respond(Ok(HistoryPage::with_next(
                vec![HistoryEvent::new(1, 1), HistoryEvent::new(2, 5)],
                token.clone(),
            )))
            .respond(Ok(HistoryPage::last(vec![
                HistoryEvent::new(3, 6).with_attributes(EventAttributes::new(
                    "WorkflowTaskStartedEventAttributes",
                    json!({"identity": "worker-1"}),
                )),
            ]))),
    );

    let (status, _, body) = get(backend.clone(), &history_uri("ns", "wf", "run")).await;

    assert_eq!(status, StatusCode::OK);
    let events: Vec<Value> = serde_json::from_str(&body).unwrap();
    assert_eq!(
        events,
        vec![
            json!({"event_id": 1, "event_type": 1, "Attributes": null}),
            json!({"event_id": 2, "event_type": 5, "Attributes": null}),
            json!({
                "event_id": 3,
                "event_type": 6,
                "Attributes": {"WorkflowTaskStartedEventAttributes": {"identity": "worker-1"}}
            }),
        ]
    );

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    assert!(requests[0].next_page_token.is_empty());
    assert_eq!(requests[1].next_page_token, token);
}

#[tokio::test]
async fn namespace_and_run_id_are_taken_literally() {
    let backend = Arc::new(MockHistoryBackend::new().respond(Ok(HistoryPage::last(vec![]))));

    let (status, _, body) = get(backend.clone(), &history_uri("my%2Dns", "wf", "run%2D1")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
    let request = &backend.requests()[0];
    assert_eq!(request.identity.namespace(), "my%2Dns");
    assert_eq!(request.identity.run_id(), "run%2D1");
}

#[tokio::test]
async fn health_route_responds() {
    let response = router(Arc::new(MockHistoryBackend::new()))
        .oneshot(Request::get("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
