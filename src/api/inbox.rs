//! Federation inbox endpoint
//!
//! Receives inbound activities from remote peers.

use axum::body::Bytes;
use axum::http::StatusCode;
use axum::{Router, extract::State, response::Json, routing::post};

use crate::AppState;
use crate::error::AppError;
use crate::federation::{ActivityEnvelope, DispatchOutcome};
use crate::metrics::ACTIVITIES_RECEIVED_TOTAL;

/// Create federation router
///
/// Routes:
/// - POST /inbox - Shared inbox for inbound activities
pub fn federation_router() -> Router<AppState> {
    Router::new().route("/inbox", post(inbox))
}

/// POST /inbox
///
/// Responds `202 Accepted` with the dispatch outcome, or `4xx` with a
/// JSON `{error}` body on rejection. The body is parsed by hand so
/// malformed JSON gets the same error shape as every other rejection.
async fn inbox(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<DispatchOutcome>), AppError> {
    let envelope: ActivityEnvelope = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("Invalid JSON: {}", e)))?;

    let activity_type = envelope.kind.clone();

    match state.inbox.receive(envelope).await {
        Ok(outcome) => {
            ACTIVITIES_RECEIVED_TOTAL
                .with_label_values(&[&activity_type, "accepted"])
                .inc();
            Ok((StatusCode::ACCEPTED, Json(outcome)))
        }
        Err(e) => {
            ACTIVITIES_RECEIVED_TOTAL
                .with_label_values(&[&activity_type, "rejected"])
                .inc();
            Err(e)
        }
    }
}
