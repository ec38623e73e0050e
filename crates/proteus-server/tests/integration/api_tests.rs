use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use proteus_core::SourceAdapter;

use crate::integration::common::{
    DownAdapter, StubAdapter, TEST_API_TOKEN, quarantine_all, setup_test_app,
};

fn stub_tiers() -> Vec<Arc<dyn SourceAdapter>> {
    vec![Arc::new(StubAdapter)]
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app(stub_tiers());

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["total_endpoints"], 3);
    assert_eq!(json["healthy_endpoints"], 3);
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app(stub_tiers());

    let response = app
        .router
        .oneshot(Request::get("/v1/pool").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn wrong_api_token_returns_401() {
    let app = setup_test_app(stub_tiers());

    let response = app
        .router
        .oneshot(
            Request::get("/v1/pool")
                .header("authorization", "Bearer wrong-token")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn search_resolves_batch() {
    let app = setup_test_app(stub_tiers());

    let request_body = serde_json::json!({
        "queries": ["vaccine adjuvant", "sorbitan ester"]
    });

    let response = app
        .router
        .oneshot(
            Request::post("/v1/search")
                .header("authorization", format!("Bearer {TEST_API_TOKEN}"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&request_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(json["batch_id"].is_string());
    assert_eq!(json["total"], 2);
    assert_eq!(json["succeeded"], 2);
    assert_eq!(json["failed"], 0);

    let first = &json["results"][0];
    assert_eq!(first["query"], "vaccine adjuvant");
    assert_eq!(first["status"], "success");
    assert_eq!(first["tier"], "stub");
    assert_eq!(first["attempts"], 1);
    assert_eq!(first["records"]["wo"], serde_json::json!(["WO2024/123456"]));
    assert_eq!(
        first["records"]["br"],
        serde_json::json!(["BR112023012345"])
    );
    // Raw page text stays out of API responses.
    assert!(first.get("content").is_none());

    assert_eq!(json["pool"]["total_requests"], 2);
    assert_eq!(json["pool"]["healthy"], 3);
}

#[tokio::test]
async fn failed_queries_reported_per_query() {
    let app = setup_test_app(vec![Arc::new(DownAdapter)]);

    let request_body = serde_json::json!({ "queries": ["polysorbate"] });

    let response = app
        .router
        .oneshot(
            Request::post("/v1/search")
                .header("authorization", format!("Bearer {TEST_API_TOKEN}"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&request_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["succeeded"], 0);
    assert_eq!(json["failed"], 1);

    let first = &json["results"][0];
    assert_eq!(first["status"], "failed");
    assert_eq!(first["tiers_tried"], serde_json::json!(["down"]));
    assert!(first["error"].as_str().unwrap().contains("exhausted"));
    assert!(first["records"].is_null());
}

#[tokio::test]
async fn search_rejects_empty_queries() {
    let app = setup_test_app(stub_tiers());

    let request_body = serde_json::json!({ "queries": [] });

    let response = app
        .router
        .oneshot(
            Request::post("/v1/search")
                .header("authorization", format!("Bearer {TEST_API_TOKEN}"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&request_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn search_rejects_oversized_batch() {
    let app = setup_test_app(stub_tiers());

    let request_body = serde_json::json!({ "queries": vec!["sorbitol"; 51] });

    let response = app
        .router
        .oneshot(
            Request::post("/v1/search")
                .header("authorization", format!("Bearer {TEST_API_TOKEN}"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&request_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "validation_error");
    assert!(json["message"].as_str().unwrap().contains("Batch too large"));
}

#[tokio::test]
async fn search_with_quarantined_pool_returns_503() {
    let app = setup_test_app(stub_tiers());
    quarantine_all(&app.pool);

    let request_body = serde_json::json!({ "queries": ["vaccine adjuvant"] });

    let response = app
        .router
        .oneshot(
            Request::post("/v1/search")
                .header("authorization", format!("Bearer {TEST_API_TOKEN}"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&request_body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "pool_exhausted");
    assert_eq!(json["message"], "No healthy endpoint available");
}

#[tokio::test]
async fn health_degrades_when_pool_quarantined() {
    let app = setup_test_app(stub_tiers());
    quarantine_all(&app.pool);

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["healthy_endpoints"], 0);
}

#[tokio::test]
async fn pool_endpoint_reports_snapshot() {
    let app = setup_test_app(stub_tiers());

    let response = app
        .router
        .oneshot(
            Request::get("/v1/pool")
                .header("authorization", format!("Bearer {TEST_API_TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total_endpoints"], 3);
    assert_eq!(json["healthy"], 3);
    assert_eq!(json["total_requests"], 0);
    assert_eq!(json["success_rate"], 0.0);
    assert_eq!(json["quarantined"], serde_json::json!([]));
    assert_eq!(json["credentials"], serde_json::json!([]));
}
