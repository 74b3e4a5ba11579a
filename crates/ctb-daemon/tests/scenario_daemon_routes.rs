//! In-process scenario tests for ctb-daemon HTTP endpoints.
//!
//! These tests spin up the Axum router **without** binding a TCP socket.
//! Each test calls `routes::build_router` and drives it via
//! `tower::ServiceExt::oneshot`; upstream traffic goes to an in-memory fake.

use std::sync::Arc;

use axum::http::{Request, StatusCode};
use ctb_config::{BridgeConfig, ResolvedSecret};
use ctb_daemon::{routes, state};
use ctb_session::Bridge;
use ctb_transport::{
    testkit::{fake_upstream, RefusingConnector},
    Connector,
};
use ctb_wire::{Framing, PayloadType};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // oneshot

const SECRET: &str = "bridge-shared-secret";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_router(connector: Arc<dyn Connector>) -> axum::Router {
    let bridge = Bridge::new(connector, Arc::new(BridgeConfig::default()));
    let st = Arc::new(state::AppState::new(
        bridge,
        ResolvedSecret::new(SECRET).unwrap(),
        "test-config-hash",
    ));
    routes::build_router(st)
}

fn refusing_router() -> (axum::Router, Arc<RefusingConnector>) {
    let refusing = Arc::new(RefusingConnector::default());
    (make_router(Arc::clone(&refusing) as Arc<dyn Connector>), refusing)
}

/// Drive the router with a single request and return (status, body_bytes).
async fn call(router: axum::Router, req: Request<axum::body::Body>) -> (StatusCode, bytes::Bytes) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .expect("body collect failed")
        .to_bytes();
    (status, body)
}

/// Parse body bytes as a `serde_json::Value`.
fn parse_json(b: bytes::Bytes) -> Value {
    serde_json::from_slice(&b).expect("body is not valid JSON")
}

fn sync_request(secret_header: Option<&str>, body: Value) -> Request<axum::body::Body> {
    let mut b = Request::builder()
        .method("POST")
        .uri("/v1/sync")
        .header("content-type", "application/json");
    if let Some(s) = secret_header {
        b = b.header(routes::SECRET_HEADER, s);
    }
    b.body(axum::body::Body::from(body.to_string())).unwrap()
}

fn full_body() -> Value {
    json!({
        "host": "demo",
        "clientId": "123_abc",
        "clientSecret": "app-secret",
        "accessToken": "acc-token",
        "ctidAccountId": "4455667",
        "fromTimestamp": 1_700_000_000_000_i64,
        "toTimestamp": 1_700_086_400_000_i64
    })
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_returns_200_without_a_secret() {
    let (router, _) = refusing_router();
    let req = Request::builder()
        .method("GET")
        .uri("/v1/health")
        .body(axum::body::Body::empty())
        .unwrap();

    let (status, body) = call(router, req).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse_json(body);
    assert_eq!(json["ok"], true);
    assert_eq!(json["service"], "ctb-daemon");
    assert_eq!(json["config_hash"], "test-config-hash");
}

// ---------------------------------------------------------------------------
// Shared-secret gate
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sync_without_secret_is_401_and_never_connects() {
    let (router, refusing) = refusing_router();
    let (status, body) = call(router, sync_request(None, full_body())).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(parse_json(body), json!({ "ok": false, "error": "unauthorized" }));
    assert_eq!(refusing.opens(), 0);
}

#[tokio::test]
async fn sync_with_wrong_header_secret_is_401() {
    let (router, refusing) = refusing_router();
    let (status, body) = call(router, sync_request(Some("nope"), full_body())).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(parse_json(body)["error"], "unauthorized");
    assert_eq!(refusing.opens(), 0);
}

#[tokio::test]
async fn secret_in_body_is_accepted() {
    let (router, refusing) = refusing_router();
    let mut body = full_body();
    body["secret"] = json!(SECRET);
    let (status, _) = call(router, sync_request(None, body)).await;

    // Past the gate; the refusing upstream makes it an upstream failure.
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(refusing.opens(), 1);
}

#[tokio::test]
async fn unreadable_body_with_good_secret_is_400() {
    let (router, _) = refusing_router();
    let req = Request::builder()
        .method("POST")
        .uri("/v1/sync")
        .header(routes::SECRET_HEADER, SECRET)
        .body(axum::body::Body::from("{not json"))
        .unwrap();

    let (status, body) = call(router, req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json = parse_json(body);
    assert_eq!(json["ok"], false);
    assert!(json["error"].as_str().unwrap().starts_with("invalid JSON body"));
}

// ---------------------------------------------------------------------------
// POST /v1/sync status mapping
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_fields_are_400_and_never_connect() {
    let (router, refusing) = refusing_router();
    let (status, body) = call(
        router,
        sync_request(Some(SECRET), json!({ "host": "live", "clientId": "x" })),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        parse_json(body),
        json!({
            "ok": false,
            "error": "missing required fields: clientSecret, accessToken, ctidAccountId, fromTimestamp, toTimestamp"
        })
    );
    assert_eq!(refusing.opens(), 0);
}

#[tokio::test]
async fn upstream_failure_is_502() {
    let (router, _) = refusing_router();
    let (status, body) = call(router, sync_request(Some(SECRET), full_body())).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    let json = parse_json(body);
    assert_eq!(json["ok"], false);
    assert!(json["error"].as_str().unwrap().starts_with("connect failed:"));
    assert!(json.get("deals").is_none());
}

#[tokio::test]
async fn successful_sync_is_200_with_flattened_result() {
    let (connector, mut server) = fake_upstream(Framing::LengthPrefixed);
    let router = make_router(Arc::new(connector));

    let upstream = tokio::spawn(async move {
        for (req, res) in [
            (PayloadType::ApplicationAuthReq, PayloadType::ApplicationAuthRes),
            (PayloadType::AccountAuthReq, PayloadType::AccountAuthRes),
        ] {
            let m = server.expect(req).await;
            server.reply(&m, res, json!({})).await;
        }
        let list = server.expect(PayloadType::SymbolsListReq).await;
        server
            .reply(
                &list,
                PayloadType::SymbolsListRes,
                json!({ "symbol": [{ "symbolId": 1, "symbolName": "EURUSD" }] }),
            )
            .await;
        let page = server.expect(PayloadType::DealListReq).await;
        server
            .reply(
                &page,
                PayloadType::DealListRes,
                json!({ "deal": [{ "dealId": 10, "symbolId": 1, "executionTimestamp": 1_700_000_000_500_i64 }] }),
            )
            .await;
        let detail = server.expect(PayloadType::SymbolByIdReq).await;
        server
            .reply(
                &detail,
                PayloadType::SymbolByIdRes,
                json!({ "symbol": [{ "symbolId": 1, "lotSize": 100000 }] }),
            )
            .await;
        server.drain_until_closed().await
    });

    let (status, body) = call(router, sync_request(Some(SECRET), full_body())).await;
    assert!(upstream.await.unwrap().is_empty());

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        parse_json(body),
        json!({
            "ok": true,
            "deals": [{ "dealId": 10, "symbolId": 1, "executionTimestamp": 1_700_000_000_500_i64 }],
            "symbols": { "1": "EURUSD" },
            "lotSizes": { "1": 100000 },
            "pages": 1,
            "total": 1
        })
    );
}
