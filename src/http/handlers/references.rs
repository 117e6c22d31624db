use crate::domain::payment::ProxypayPayment;
use crate::domain::reference::{Lifecycle, Reference, ReferenceFilter};
use crate::error::ProxypayError;
use crate::service::reference_service::CreateReference;
use crate::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ReferenceView {
    #[serde(flatten)]
    pub reference: Reference,
    pub lifecycle: Lifecycle,
    pub is_paid: bool,
    pub expired: bool,
    pub fees_expense: Decimal,
    pub net_amount: Decimal,
    pub payment_details: Option<ProxypayPayment>,
}

impl From<Reference> for ReferenceView {
    fn from(reference: Reference) -> Self {
        let now = Utc::now();
        Self {
            lifecycle: reference.lifecycle(now),
            is_paid: reference.is_paid(),
            expired: reference.is_expired(now),
            fees_expense: reference.fees.fees_expense(),
            net_amount: reference.fees.net_amount(),
            payment_details: reference.payment_details(),
            reference,
        }
    }
}

pub async fn create_reference(
    State(state): State<AppState>,
    Json(req): Json<CreateReference>,
) -> Response {
    match state.reference_service.create(req).await {
        Ok(reference) => (StatusCode::CREATED, Json(ReferenceView::from(reference))).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_references(
    State(state): State<AppState>,
    Query(filter): Query<ReferenceFilter>,
) -> Response {
    match state.reference_service.list(&filter).await {
        Ok(items) => {
            let items: Vec<ReferenceView> = items.into_iter().map(ReferenceView::from).collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "count": items.len(),
                    "limit": filter.limit(),
                    "offset": filter.offset(),
                    "items": items,
                })),
            )
                .into_response()
        }
        Err(e) => e.into_response(),
    }
}

pub async fn get_reference(State(state): State<AppState>, Path(key): Path<Uuid>) -> Response {
    match state.reference_service.get(key).await {
        Ok(reference) => (StatusCode::OK, Json(ReferenceView::from(reference))).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn check_payment(State(state): State<AppState>, Path(key): Path<Uuid>) -> Response {
    match state.reference_service.check_payment(key).await {
        Ok(payment) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "paid": payment.is_some(),
                "payment": payment,
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn renew_reference(State(state): State<AppState>, Path(key): Path<Uuid>) -> Response {
    let renewed = match state.reference_service.renew(key).await {
        Ok(renewed) => renewed,
        Err(e) => return e.into_response(),
    };
    match state.reference_service.get(key).await {
        Ok(reference) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "renewed": renewed,
                "reference": ReferenceView::from(reference),
            })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_reference(State(state): State<AppState>, Path(key): Path<Uuid>) -> Response {
    match state.reference_service.delete(key).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e @ ProxypayError::Api { .. }) => {
            tracing::warn!("reference {} kept, delete refused: {}", key, e);
            e.into_response()
        }
        Err(e) => e.into_response(),
    }
}
