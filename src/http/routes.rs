use crate::http::types::{HttpError, HttpSuccess, StatusResponse, VerifyQuery};
use crate::http::HttpState;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use tracing::log::{debug, info, warn};

/// Pure function of the query parameters and the configured shared secret:
/// only a "subscribe" request carrying the exact secret gets the challenge
/// echoed back.
fn verify_challenge(query: &VerifyQuery, expected_token: &str) -> Option<String> {
    if query.mode.as_deref() != Some("subscribe") {
        return None;
    }
    if query.verify_token.as_deref() != Some(expected_token) {
        return None;
    }

    query.challenge.clone()
}

pub async fn webhook_verify(
    State(state): State<HttpState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, HttpError> {
    match verify_challenge(&query, &state.verify_token) {
        Some(challenge) => {
            info!("Webhook subscription verified successfully");
            Ok(challenge)
        }
        None => {
            warn!("Webhook verification failed (mode: {:?})", query.mode);
            Err(HttpError {
                status: StatusCode::FORBIDDEN,
                message: "Webhook verification failed".to_string(),
            })
        }
    }
}

/// Event intake. Whatever happens inside the pipeline, the platform gets a
/// 200 so it never retries over internal outcomes; only a body that is not
/// JSON at all is rejected before this handler runs.
pub async fn webhook_receive(
    State(state): State<HttpState>,
    Json(payload): Json<serde_json::Value>,
) -> StatusCode {
    let outcome = state.relay.handle_event(payload).await;
    debug!("Webhook pipeline finished: {outcome:?}");

    StatusCode::OK
}

pub async fn status() -> HttpSuccess<StatusResponse> {
    HttpSuccess(StatusResponse {
        status: "ok",
        version: crate::VERSION,
    })
}
