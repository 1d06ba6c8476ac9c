//! HTTP boundary: token middleware, resource authorization, ingestion and
//! the error-to-status mapping.

use std::collections::HashMap;

use axum::{
    body::Bytes,
    extract::{Extension, Path, Query, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;

use ledgergate_core::error::LedgerGateError;

use crate::app_state::AppState;
use crate::policy::checks::build_rules;

pub const TOKEN_HEADER: &str = "Token";

/// Contract address a request's token was verified against.
#[derive(Debug, Clone)]
pub struct VerifiedContract(pub String);

/// [`LedgerGateError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub LedgerGateError);

impl From<LedgerGateError> for ApiError {
    fn from(e: LedgerGateError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.client_code();
        let status =
            StatusCode::from_u16(code.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), error = %self.0, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "request refused");
        }
        let body = json!({ "code": code.as_str(), "msg": self.0.to_string() });
        (status, Json(body)).into_response()
    }
}

/// Verify the `Token` header and attach the contract to the request.
pub async fn require_token(
    State(app): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(TOKEN_HEADER)
        .ok_or(LedgerGateError::MissingToken)?
        .to_str()
        .map_err(|_| LedgerGateError::MalformedToken("header is not ASCII".into()))?
        .to_owned();

    let contract = app.verifier().verify_token(&token).await?;
    req.extensions_mut().insert(VerifiedContract(contract));
    Ok(next.run(req).await)
}

/// Body of a successful authorization.
#[derive(Debug, Serialize)]
pub struct Authorized {
    pub contract: String,
    pub resource: String,
}

/// `GET /v1/resources/{resource}/authorize?...`
pub async fn authorize(
    State(app): State<AppState>,
    Path(resource): Path<String>,
    Extension(VerifiedContract(contract)): Extension<VerifiedContract>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Json<Authorized>, ApiError> {
    let outcome = authorize_resource(&app, &contract, &resource, &query).await;
    let status = match &outcome {
        Ok(()) => "200".to_string(),
        Err(e) => e.client_code().http_status().to_string(),
    };
    app.metrics()
        .http_decisions
        .inc(&[("route", "authorize"), ("status", status.as_str())]);
    outcome?;

    tracing::info!(contract = %contract, resource = %resource, "resource authorized");
    Ok(Json(Authorized { contract, resource }))
}

async fn authorize_resource(
    app: &AppState,
    contract: &str,
    resource: &str,
    query: &HashMap<String, String>,
) -> Result<(), LedgerGateError> {
    let checks = app
        .cfg()
        .resource(resource)
        .map(|r| r.checks.as_slice())
        .unwrap_or_default();
    let rules = build_rules(checks, query)?;
    app.resolver().verify_policy(contract, resource, &rules).await
}

/// `POST /v1/ingest/{queue}`: publish one reading onto a stream.
pub async fn ingest(
    State(app): State<AppState>,
    Path(queue): Path<String>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if app.cfg().realtime.resource_for(&queue).is_none() {
        return Err(LedgerGateError::BadRequest(format!("unknown queue {queue}")).into());
    }
    app.source().publish(&queue, body).await?;
    Ok(StatusCode::ACCEPTED)
}
