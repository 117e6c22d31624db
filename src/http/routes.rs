use crate::http::handlers::{ops, references, webhooks};
use crate::http::middleware::admin_auth::require_internal_api_key;
use crate::AppState;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;

pub fn router(state: AppState, internal_api_key: String) -> Router {
    let admin_routes = Router::new()
        .route(
            "/references",
            post(references::create_reference).get(references::list_references),
        )
        .route(
            "/references/:key",
            get(references::get_reference).delete(references::delete_reference),
        )
        .route("/references/:key/check-payment", post(references::check_payment))
        .route("/references/:key/renew", post(references::renew_reference))
        .layer(from_fn_with_state(internal_api_key, require_internal_api_key));

    Router::new()
        .route("/health", get(ops::health))
        .route("/ops/readiness", get(ops::readiness))
        .route("/ops/liveness", get(ops::liveness))
        .route("/proxypay/webhook", post(webhooks::proxypay_webhook))
        .merge(admin_routes)
        .with_state(state)
}
