use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::application::{LedgerService, SubmitError};
use crate::domain::AccountId;

/// Shared state for the HTTP shell.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LedgerService>,
    pub account_id: AccountId,
}

/// Inbound settlement payload. `transactionID` is accepted as a legacy
/// spelling of the ID field.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    pub state: String,
    pub amount: String,
    #[serde(alias = "transactionID")]
    pub transaction_id: String,
}

#[derive(Debug, Serialize)]
struct SubmitResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Build the ingestion API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/transaction", post(submit_transaction))
        .route("/health", get(health))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn submit_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<TransactionPayload>,
) -> Result<Json<SubmitResponse>, ApiError> {
    // A missing header resolves like any unregistered label.
    let source = headers
        .get("Source-Type")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    state
        .service
        .submit_transaction(
            state.account_id,
            source,
            &payload.state,
            &payload.amount,
            &payload.transaction_id,
        )
        .await
        .map(|_| Json(SubmitResponse { status: "accepted" }))
        .map_err(ApiError)
}

/// Maps ingestion errors onto HTTP statuses: requests the caller got wrong
/// are 400 with a reason, everything else is an opaque 500.
struct ApiError(SubmitError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.0.is_client_error() {
            let body = ErrorResponse {
                error: self.0.to_string(),
            };
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        } else {
            warn!(error = %self.0, "settlement submission failed");
            let body = ErrorResponse {
                error: "internal error".to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}
