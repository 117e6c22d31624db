use crate::domain::reference::{Reference, ReferenceStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

pub const REFERENCE_CREATED: &str = "reference.created";
pub const REFERENCE_PAID: &str = "reference.paid";

#[derive(Debug, Clone, Serialize)]
pub struct ReferenceEvent {
    pub event_type: String,
    pub key: Uuid,
    pub reference: i64,
    pub entity: Option<String>,
    pub amount: Decimal,
    pub status: ReferenceStatus,
    pub payment_id: Option<i64>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_in: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

impl ReferenceEvent {
    pub fn new(event_type: &str, reference: &Reference) -> Self {
        Self {
            event_type: event_type.to_string(),
            key: reference.key,
            reference: reference.reference,
            entity: reference.entity.clone(),
            amount: reference.amount,
            status: reference.status,
            payment_id: reference.payment_id,
            paid_at: reference.paid_at,
            expires_in: reference.expires_in,
            timestamp: Utc::now(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
