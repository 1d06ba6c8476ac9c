//! Axum router wiring.

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use crate::{app_state::AppState, ops, transport};

pub fn build_router(state: AppState) -> Router {
    let gated = Router::new()
        .route(
            "/v1/resources/:resource/authorize",
            get(transport::http::authorize),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            transport::http::require_token,
        ));

    Router::new()
        .merge(gated)
        .route("/v1/realtime", get(transport::ws::realtime_upgrade))
        .route("/v1/ingest/:queue", post(transport::http::ingest))
        .route("/healthz", get(ops::healthz))
        .route("/readyz", get(ops::readyz))
        .route("/metrics", get(ops::metrics))
        .with_state(state)
}
