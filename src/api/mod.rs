use crate::config::Environment;
use crate::domain::reference::CustomFields;
use crate::error::ProxypayError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod mock;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceRequest {
    pub amount: Decimal,
    pub end_datetime: String,
    pub custom_fields: CustomFields,
}

#[derive(Debug, Clone, Serialize)]
pub struct MockPaymentRequest {
    pub amount: Decimal,
    pub reference_id: i64,
}

#[async_trait::async_trait]
pub trait ProxypayApi: Send + Sync {
    fn environment(&self) -> Environment;

    fn entity(&self) -> &str;

    async fn generate_reference_id(&self) -> Result<i64, ProxypayError>;

    async fn create_or_update_reference(
        &self,
        reference_id: i64,
        request: &ReferenceRequest,
    ) -> Result<(), ProxypayError>;

    async fn delete_reference(&self, reference_id: i64) -> Result<(), ProxypayError>;

    /// Unacknowledged payments, as raw JSON objects.
    async fn list_payments(&self) -> Result<Vec<serde_json::Value>, ProxypayError>;

    async fn acknowledge_payment(&self, payment_id: i64) -> Result<(), ProxypayError>;

    async fn mock_payment(
        &self,
        reference_id: i64,
        amount: Decimal,
    ) -> Result<serde_json::Value, ProxypayError>;
}
