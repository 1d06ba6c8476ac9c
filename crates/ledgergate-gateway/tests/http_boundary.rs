#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

mod common;

use std::collections::HashMap;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{Request, StatusCode};
use axum::{Extension, Json, Router};
use tower::ServiceExt;

use common::{policy_body, token, Fixture, CONTRACT_A};
use ledgergate_gateway::app_state::AppState;
use ledgergate_gateway::router::build_router;
use ledgergate_gateway::transport::http::{authorize, Authorized, VerifiedContract};

fn app(fx: &Fixture) -> (AppState, Router) {
    let (state, _pump) = AppState::new(common::config(), fx.backends());
    let router = build_router(state.clone());
    (state, router)
}

fn fixture() -> Fixture {
    let fx = Fixture::new();
    fx.deploy(CONTRACT_A, &common::key(1));
    fx.publish_policy(
        CONTRACT_A,
        "temperature",
        &policy_body(r#""devices":"dev1,dev2","max_items":10"#),
    );
    fx
}

async fn get(router: &Router, uri: &str, token: Option<&str>) -> (StatusCode, serde_json::Value) {
    let mut req = Request::builder().uri(uri);
    if let Some(t) = token {
        req = req.header("Token", t);
    }
    let resp = router
        .clone()
        .oneshot(req.body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

const AUTHORIZE: &str = "/v1/resources/temperature/authorize";

#[tokio::test]
async fn authorized_request_passes_every_check() {
    let fx = fixture();
    let (state, router) = app(&fx);
    let tok = token(CONTRACT_A, &common::key(1));

    let (status, body) = get(&router, &format!("{AUTHORIZE}?count=5&deviceNames=dev1,dev2"), Some(&tok)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["contract"], CONTRACT_A);
    assert_eq!(body["resource"], "temperature");
    assert_eq!(
        state
            .metrics()
            .http_decisions
            .get(&[("route", "authorize"), ("status", "200")]),
        1
    );
}

#[tokio::test]
async fn authorize_handler_is_usable_outside_the_router() {
    let fx = fixture();
    let (state, _router) = app(&fx);
    let query = HashMap::from([
        ("count".to_string(), "2".to_string()),
        ("deviceNames".to_string(), "dev1".to_string()),
    ]);

    let Json(Authorized { contract, resource }) = authorize(
        State(state),
        Path("temperature".to_string()),
        Extension(VerifiedContract(CONTRACT_A.to_string())),
        Query(query),
    )
    .await
    .unwrap();
    assert_eq!((contract.as_str(), resource.as_str()), (CONTRACT_A, "temperature"));
}

#[tokio::test]
async fn status_codes_follow_the_error_class() {
    let fx = fixture();
    let (_state, router) = app(&fx);
    let tok = token(CONTRACT_A, &common::key(1));
    let ok_query = "count=5&deviceNames=dev1";

    // No header at all.
    let (status, body) = get(&router, &format!("{AUTHORIZE}?{ok_query}"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    // Wrong signer for the contract.
    let other = token(CONTRACT_A, &common::key(2));
    let (status, _) = get(&router, &format!("{AUTHORIZE}?{ok_query}"), Some(&other)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Malformed token.
    let (status, _) = get(&router, &format!("{AUTHORIZE}?{ok_query}"), Some("a|b")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Rule violations.
    let (status, body) = get(&router, &format!("{AUTHORIZE}?count=11&deviceNames=dev1"), Some(&tok)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["msg"].as_str().unwrap().contains("max_items"));
    let (status, _) = get(&router, &format!("{AUTHORIZE}?count=1&deviceNames=dev1,dev3"), Some(&tok)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Missing query parameter.
    let (status, _) = get(&router, &format!("{AUTHORIZE}?count=1"), Some(&tok)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // No policy for the resource.
    let (status, _) = get(&router, "/v1/resources/humidity/authorize", Some(&tok)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn ingest_rejects_unknown_queues() {
    let fx = fixture();
    let (_state, router) = app(&fx);

    let req = Request::builder()
        .method("POST")
        .uri("/v1/ingest/pressureRT")
        .body(Body::from(r#"{"Device":"dev1"}"#))
        .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn ops_endpoints() {
    let fx = fixture();
    let (state, router) = app(&fx);

    let (status, _) = get(&router, "/healthz", None).await;
    assert_eq!(status, StatusCode::OK);

    // The ledger probe has not run yet.
    let (status, _) = get(&router, "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    state.metrics().set_draining();
    let resp = router
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    assert!(String::from_utf8(bytes.to_vec()).unwrap().contains("ledgergate_draining 1"));
}
