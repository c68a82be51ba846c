//! End-to-end tests of the HTTP surface

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request as HttpRequest, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use missive_server::{Executor, MemoryStore, router};

async fn post(store: MemoryStore, body: String) -> (StatusCode, Value) {
    let app = router(Arc::new(Executor::new(Arc::new(store))));
    let response = app
        .oneshot(
            HttpRequest::builder()
                .method("POST")
                .uri("/graphql")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_query(store: MemoryStore, query: &str) -> (StatusCode, Value) {
    post(store, json!({ "query": query, "variables": {} }).to_string()).await
}

#[tokio::test]
async fn test_users_query_over_http() {
    let (status, body) =
        post_query(MemoryStore::demo(), "{ users { id name messages { body } } }").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "data": {
                "users": [{
                    "id": "1",
                    "name": "Prisma Fan",
                    "messages": [
                        { "body": "Prisma rocks!" },
                        { "body": "Did I mention I Love Prisma?" }
                    ]
                }]
            }
        })
    );
}

#[tokio::test]
async fn test_empty_store_over_http() {
    let (status, body) = post_query(MemoryStore::new(), "{ users { id name } }").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "data": { "users": [] } }));
}

#[tokio::test]
async fn test_unreachable_store_is_not_a_transport_failure() {
    let store = MemoryStore::demo();
    store.set_available(false);
    let (status, body) = post_query(store, "{ users { id name messages { body } } }").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "data": { "users": null },
            "errors": [{ "message": "DataSourceUnavailable", "path": ["users"] }]
        })
    );
}

#[tokio::test]
async fn test_operation_name_and_variables() {
    let body = json!({
        "query": "query Names($full: Boolean!) { users { name messages @include(if: $full) { body } } } query Ids { users { id } }",
        "variables": { "full": false },
        "operationName": "Names",
    });
    let (status, body) = post(MemoryStore::demo(), body.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "data": { "users": [{ "name": "Prisma Fan" }] } }));
}

#[tokio::test]
async fn test_malformed_json_body() {
    let (status, body) = post(MemoryStore::demo(), "{ not json".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["data"], Value::Null);
    assert_eq!(body["errors"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_sandbox_page() {
    let app = router(Arc::new(Executor::new(Arc::new(MemoryStore::demo()))));
    let response = app
        .oneshot(
            HttpRequest::builder()
                .uri("/graphql")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert!(String::from_utf8_lossy(&bytes).contains("EmbeddedSandbox"));
}
