use crate::service::reference_service::ReconcileOutcome;
use crate::signature::SIGNATURE_HEADER;
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

/// ProxyPay payment notification. 403 on a bad signature, 404 when no reference matches.
pub async fn proxypay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok());

    match state.reference_service.handle_webhook(signature, &body).await {
        Ok(outcome) => {
            let status = match &outcome {
                ReconcileOutcome::Paid { .. } => "paid",
                ReconcileOutcome::AlreadyPaid { .. } => "already_paid",
                ReconcileOutcome::Unrecognized { .. } => "accepted",
            };
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": status,
                    "payment_id": outcome.payment_id(),
                    "reference_key": outcome.reference().map(|r| r.key),
                })),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}
