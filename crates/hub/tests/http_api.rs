//! Integration tests for the HTTP surface, through the same router and
//! middleware stack the binary serves.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use http_body_util::BodyExt;
use livetext_hub::config::ServerConfig;
use livetext_hub::router::build_app_router;
use livetext_hub::state::AppState;
use sqlx::PgPool;
use tower::ServiceExt;

fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 30,
    }
}

/// Router backed by a real pool, as production runs.
fn app_with_pool(pool: PgPool) -> Router {
    let config = test_config();
    build_app_router(AppState::new(Some(pool), config.clone()), &config)
}

/// Router in degraded mode (no storage configured).
fn app_degraded() -> Router {
    let config = test_config();
    build_app_router(AppState::new(None, config.clone()), &config)
}

async fn get(app: Router, uri: &str) -> Response {
    app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response {
    app.oneshot(
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

// ---------------------------------------------------------------------------
// Test: GET /health reports ok with storage, degraded without
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn health_reports_ok_with_storage(pool: PgPool) {
    let response = get(app_with_pool(pool), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(json["storage_healthy"], true);
}

#[tokio::test]
async fn health_reports_degraded_without_storage() {
    let response = get(app_degraded(), "/health").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "degraded");
    assert_eq!(json["storage_healthy"], false);
}

// ---------------------------------------------------------------------------
// Test: GET /metrics reports connection bookkeeping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn metrics_reports_zero_connections_on_fresh_hub() {
    let response = get(app_degraded(), "/metrics").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["connections"], 0);
    assert_eq!(json["presence_records"], 0);
}

// ---------------------------------------------------------------------------
// Test: storage-backed endpoints return 503 in degraded mode
// ---------------------------------------------------------------------------

#[tokio::test]
async fn storage_endpoints_are_unavailable_in_degraded_mode() {
    let response = get(app_degraded(), "/content/s1").await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

    let json = body_json(response).await;
    assert_eq!(json["code"], "STORAGE_UNAVAILABLE");
}

// ---------------------------------------------------------------------------
// Test: GET /content/{site_id} returns the site's current content
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn content_endpoint_lists_site_elements(pool: PgPool) {
    sqlx::query(
        "INSERT INTO content_elements \
         (site_id, element_id, selector, original_content, current_content, element_type) \
         VALUES ('s1', 'h1-1', 'h1', 'Hello', 'Edited', 'h1')",
    )
    .execute(&pool)
    .await
    .unwrap();

    let response = get(app_with_pool(pool), "/content/s1").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    let items = json.as_array().expect("array response");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["elementId"], "h1-1");
    assert_eq!(items[0]["content"], "Edited");
    assert_eq!(items[0]["language"], "en");
    assert_eq!(items[0]["variant"], "default");
}

// ---------------------------------------------------------------------------
// Test: session start validates the caller and the element id
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn session_start_rejects_unknown_user(pool: PgPool) {
    let response = post_json(
        app_with_pool(pool),
        "/api/v1/sessions/start",
        serde_json::json!({ "userId": 999, "elementId": "h1-1" }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(response).await;
    assert_eq!(json["code"], "NOT_FOUND");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn session_start_rejects_blank_element(pool: PgPool) {
    sqlx::query("INSERT INTO users (email) VALUES ('alice@example.com')")
        .execute(&pool)
        .await
        .unwrap();

    let response = post_json(
        app_with_pool(pool),
        "/api/v1/sessions/start",
        serde_json::json!({ "userId": 1, "elementId": "  " }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: permission check validates the roles parameter
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../db/migrations")]
async fn permission_check_rejects_unknown_role(pool: PgPool) {
    let response = get(
        app_with_pool(pool),
        "/api/v1/permissions/check?userId=1&siteId=s1&roles=editor,superuser",
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[sqlx::test(migrations = "../db/migrations")]
async fn permission_check_denies_without_grants(pool: PgPool) {
    sqlx::query("INSERT INTO users (email) VALUES ('alice@example.com')")
        .execute(&pool)
        .await
        .unwrap();

    let response = get(
        app_with_pool(pool),
        "/api/v1/permissions/check?userId=1&siteId=s1&roles=editor,manager,owner",
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["granted"], false);
    assert!(json["reason"].is_string());
}

// ---------------------------------------------------------------------------
// Test: unknown route returns 404; responses carry x-request-id
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let response = get(app_degraded(), "/this-route-does-not-exist").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn responses_carry_x_request_id() {
    let response = get(app_degraded(), "/health").await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

// ---------------------------------------------------------------------------
// Test: presence snapshot is empty on a fresh hub
// ---------------------------------------------------------------------------

#[tokio::test]
async fn presence_snapshot_starts_empty() {
    let response = get(app_degraded(), "/api/v1/presence/s1").await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"], serde_json::json!([]));
}

// ---------------------------------------------------------------------------
// Test: WebSocket handshake without site_id is rejected pre-upgrade
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ws_handshake_without_site_id_is_rejected() {
    // A well-formed upgrade request, just missing the site_id parameter.
    // The handler answers 400 before performing the upgrade.
    let request = Request::get("/api/v1/ws")
        .header("connection", "upgrade")
        .header("upgrade", "websocket")
        .header("sec-websocket-version", "13")
        .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
        .body(Body::empty())
        .unwrap();

    let response = app_degraded().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
