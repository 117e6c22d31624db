use crate::domain::payment::{ErrorEnvelope, ErrorPayload};
use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;

pub const INTERNAL_API_KEY_HEADER: &str = "X-Internal-Api-Key";

/// Guards the reference management routes.
pub async fn require_internal_api_key(
    State(expected): State<String>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(INTERNAL_API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");

    let matches = !expected.is_empty() && bool::from(provided.as_bytes().ct_eq(expected.as_bytes()));
    if !matches {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorEnvelope {
                error: ErrorPayload {
                    code: "UNAUTHORIZED".to_string(),
                    message: format!("missing or invalid {INTERNAL_API_KEY_HEADER}"),
                    details: None,
                },
            }),
        )
            .into_response();
    }

    next.run(request).await
}
