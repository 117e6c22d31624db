use crate::domain::reference::{NewReference, Reference, ReferenceFilter};
use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Persistence for references. State changes also record their outbox event
/// (`reference.created`, `reference.paid`) atomically with the change.
#[async_trait::async_trait]
pub trait ReferenceStore: Send + Sync {
    async fn insert(&self, new: &NewReference) -> Result<Reference>;

    async fn find_by_key(&self, key: Uuid) -> Result<Option<Reference>>;

    async fn find_active_by_reference(
        &self,
        reference: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Reference>>;

    async fn find_latest_by_reference(&self, reference: i64) -> Result<Option<Reference>>;

    async fn find_by_payment_id(&self, payment_id: i64) -> Result<Option<Reference>>;

    /// Returns the updated row only when this call performed the transition.
    async fn mark_paid(
        &self,
        key: Uuid,
        payment: &serde_json::Value,
        payment_id: i64,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Reference>>;

    async fn update_expiry(&self, key: Uuid, expires_in: DateTime<Utc>) -> Result<()>;

    async fn delete(&self, key: Uuid) -> Result<bool>;

    async fn list(&self, filter: &ReferenceFilter) -> Result<Vec<Reference>>;

    async fn is_reference_in_use(&self, reference: i64, now: DateTime<Utc>) -> Result<bool> {
        Ok(self.find_active_by_reference(reference, now).await?.is_some())
    }
}
