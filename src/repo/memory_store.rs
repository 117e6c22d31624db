use crate::domain::events::{ReferenceEvent, REFERENCE_CREATED, REFERENCE_PAID};
use crate::domain::reference::{NewReference, Reference, ReferenceFilter, ReferenceStatus};
use crate::repo::store::ReferenceStore;
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Clone, Default)]
pub struct InMemoryReferenceStore {
    references: Arc<RwLock<Vec<Reference>>>,
    events: Arc<RwLock<Vec<ReferenceEvent>>>,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<ReferenceEvent> {
        self.events.read().await.clone()
    }

    pub async fn put(&self, reference: Reference) {
        let mut refs = self.references.write().await;
        refs.retain(|r| r.key != reference.key);
        refs.push(reference);
    }
}

#[async_trait::async_trait]
impl ReferenceStore for InMemoryReferenceStore {
    async fn insert(&self, new: &NewReference) -> Result<Reference> {
        let mut refs = self.references.write().await;
        if refs.iter().any(|r| r.key == new.key) {
            bail!("duplicate reference key {}", new.key);
        }
        let now = Utc::now();
        let reference = Reference {
            key: new.key,
            reference: new.reference,
            amount: new.amount,
            entity: new.entity.clone(),
            status: ReferenceStatus::Waiting,
            fields: new.fields.clone(),
            payment: None,
            payment_id: None,
            fees: new.fees.clone(),
            paid_at: None,
            expires_in: Some(new.expires_in),
            created_at: now,
            updated_at: now,
        };
        refs.push(reference.clone());
        self.events
            .write()
            .await
            .push(ReferenceEvent::new(REFERENCE_CREATED, &reference));
        Ok(reference)
    }

    async fn find_by_key(&self, key: Uuid) -> Result<Option<Reference>> {
        Ok(self.references.read().await.iter().find(|r| r.key == key).cloned())
    }

    async fn find_active_by_reference(
        &self,
        reference: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Reference>> {
        Ok(self
            .references
            .read()
            .await
            .iter()
            .filter(|r| r.reference == reference && r.is_active(now))
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn find_latest_by_reference(&self, reference: i64) -> Result<Option<Reference>> {
        Ok(self
            .references
            .read()
            .await
            .iter()
            .filter(|r| r.reference == reference)
            .max_by_key(|r| r.created_at)
            .cloned())
    }

    async fn find_by_payment_id(&self, payment_id: i64) -> Result<Option<Reference>> {
        Ok(self
            .references
            .read()
            .await
            .iter()
            .find(|r| r.payment_id == Some(payment_id))
            .cloned())
    }

    async fn mark_paid(
        &self,
        key: Uuid,
        payment: &serde_json::Value,
        payment_id: i64,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Reference>> {
        let mut refs = self.references.write().await;
        if refs
            .iter()
            .any(|r| r.key != key && r.payment_id == Some(payment_id))
        {
            bail!("payment {payment_id} already recorded on another reference");
        }
        let Some(reference) = refs.iter_mut().find(|r| r.key == key && r.payment.is_none()) else {
            return Ok(None);
        };
        reference.status = ReferenceStatus::Paid;
        reference.payment = Some(payment.clone());
        reference.payment_id = Some(payment_id);
        reference.paid_at = Some(paid_at);
        reference.updated_at = Utc::now();
        let updated = reference.clone();
        drop(refs);

        self.events
            .write()
            .await
            .push(ReferenceEvent::new(REFERENCE_PAID, &updated));
        Ok(Some(updated))
    }

    async fn update_expiry(&self, key: Uuid, expires_in: DateTime<Utc>) -> Result<()> {
        if let Some(reference) = self
            .references
            .write()
            .await
            .iter_mut()
            .find(|r| r.key == key)
        {
            reference.expires_in = Some(expires_in);
            reference.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete(&self, key: Uuid) -> Result<bool> {
        let mut refs = self.references.write().await;
        let before = refs.len();
        refs.retain(|r| r.key != key);
        Ok(refs.len() != before)
    }

    async fn list(&self, filter: &ReferenceFilter) -> Result<Vec<Reference>> {
        let mut out: Vec<Reference> = self
            .references
            .read()
            .await
            .iter()
            .filter(|r| filter.status.map(|s| s == r.status).unwrap_or(true))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect())
    }
}
