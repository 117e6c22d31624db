use crate::api::{ProxypayApi, ReferenceRequest};
use crate::config::{Environment, ProxypaySettings, MAX_REFERENCE_DAYS};
use crate::domain::payment::ProxypayPayment;
use crate::domain::reference::{
    api_custom_fields, expiry_after, CustomFields, NewReference, Reference, ReferenceFilter,
    MAX_CREATE_ATTEMPTS, MAX_CUSTOM_FIELDS,
};
use crate::error::ProxypayError;
use crate::fees::ReferenceFees;
use crate::repo::store::ReferenceStore;
use crate::signature;
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// 9_999_999_999.99, the largest amount the `NUMERIC(12,2)` column holds.
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReference {
    pub amount: Decimal,
    #[serde(default)]
    pub fields: CustomFields,
    #[serde(default)]
    pub days: Option<i64>,
}

#[derive(Debug, Clone)]
pub enum ReconcileOutcome {
    Paid { payment_id: i64, reference: Reference },
    AlreadyPaid { payment_id: i64, reference: Reference },
    Unrecognized { payment_id: i64, accepted: bool },
}

impl ReconcileOutcome {
    pub fn payment_id(&self) -> i64 {
        match self {
            ReconcileOutcome::Paid { payment_id, .. }
            | ReconcileOutcome::AlreadyPaid { payment_id, .. }
            | ReconcileOutcome::Unrecognized { payment_id, .. } => *payment_id,
        }
    }

    pub fn should_acknowledge(&self) -> bool {
        match self {
            ReconcileOutcome::Paid { .. } | ReconcileOutcome::AlreadyPaid { .. } => true,
            ReconcileOutcome::Unrecognized { accepted, .. } => *accepted,
        }
    }

    pub fn reference(&self) -> Option<&Reference> {
        match self {
            ReconcileOutcome::Paid { reference, .. } | ReconcileOutcome::AlreadyPaid { reference, .. } => {
                Some(reference)
            }
            ReconcileOutcome::Unrecognized { .. } => None,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncSummary {
    pub paid: usize,
    pub already_paid: usize,
    pub unrecognized: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct ReferenceService {
    pub store: Arc<dyn ReferenceStore>,
    pub api: Arc<dyn ProxypayApi>,
    pub settings: Arc<ProxypaySettings>,
}

impl ReferenceService {
    pub fn new(
        store: Arc<dyn ReferenceStore>,
        api: Arc<dyn ProxypayApi>,
        settings: ProxypaySettings,
    ) -> Self {
        Self {
            store,
            api,
            settings: Arc::new(settings),
        }
    }

    pub async fn create(&self, req: CreateReference) -> Result<Reference, ProxypayError> {
        let amount = req
            .amount
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
        if amount <= Decimal::ZERO || amount > MAX_AMOUNT {
            return Err(ProxypayError::InvalidAmount);
        }
        if req.fields.len() > MAX_CUSTOM_FIELDS {
            return Err(ProxypayError::TooManyCustomFields {
                max: MAX_CUSTOM_FIELDS,
            });
        }
        let days = self.settings.reference_lifetime(req.days)?;

        for attempt in 1..=MAX_CREATE_ATTEMPTS {
            let reference_id = self.api.generate_reference_id().await?;
            let now = Utc::now();
            if self.store.is_reference_in_use(reference_id, now).await? {
                tracing::warn!(
                    "reference id {} is held by an active reference (attempt {}/{})",
                    reference_id,
                    attempt,
                    MAX_CREATE_ATTEMPTS
                );
                continue;
            }

            let key = Uuid::new_v4();
            let expiry = expiry_after(now, days).ok_or(ProxypayError::InvalidLifetime {
                max: MAX_REFERENCE_DAYS,
            })?;
            let request = ReferenceRequest {
                amount,
                end_datetime: expiry.end_datetime(),
                custom_fields: api_custom_fields(&req.fields, &self.settings.reference_uuid_key, key),
            };
            self.api
                .create_or_update_reference(reference_id, &request)
                .await?;

            let new = NewReference {
                key,
                reference: reference_id,
                amount,
                entity: Some(self.api.entity().to_string()),
                fields: req.fields.clone(),
                fees: ReferenceFees::compute(
                    amount,
                    &self.settings.proxypay_fee,
                    &self.settings.bank_fee,
                ),
                expires_in: expiry.expires_in,
            };
            let reference = self.store.insert(&new).await?;
            tracing::info!(
                "created reference {} key={} amount={} expires_in={}",
                reference.reference,
                reference.key,
                reference.amount,
                expiry.expires_in
            );
            return Ok(reference);
        }

        Err(ProxypayError::ReferenceIdExhausted(MAX_CREATE_ATTEMPTS))
    }

    pub async fn get(&self, key: Uuid) -> Result<Reference, ProxypayError> {
        self.store
            .find_by_key(key)
            .await?
            .ok_or(ProxypayError::ReferenceNotFound)
    }

    pub async fn list(&self, filter: &ReferenceFilter) -> Result<Vec<Reference>, ProxypayError> {
        Ok(self.store.list(filter).await?)
    }

    /// Records `payment` on the reference. Repeated deliveries leave the first payment in place.
    pub async fn mark_paid(
        &self,
        reference: &Reference,
        payment: &serde_json::Value,
    ) -> Result<ReconcileOutcome, ProxypayError> {
        let parsed = ProxypayPayment::from_value(payment)
            .map_err(|e| ProxypayError::InvalidPayload(e.to_string()))?;

        if reference.payment.is_some() {
            return Ok(self.already_paid(parsed.id, reference.clone()));
        }

        let paid_at = parsed.paid_at(Utc::now());
        match self
            .store
            .mark_paid(reference.key, payment, parsed.id, paid_at)
            .await?
        {
            Some(updated) => {
                tracing::info!(
                    "reference {} paid by payment {} at {}",
                    updated.reference,
                    parsed.id,
                    paid_at
                );
                Ok(ReconcileOutcome::Paid {
                    payment_id: parsed.id,
                    reference: updated,
                })
            }
            None => {
                let current = self.get(reference.key).await?;
                Ok(self.already_paid(parsed.id, current))
            }
        }
    }

    fn already_paid(&self, payment_id: i64, reference: Reference) -> ReconcileOutcome {
        if reference.payment_id.is_some() && reference.payment_id != Some(payment_id) {
            tracing::warn!(
                "reference {} already paid by payment {:?}, ignoring payment {}",
                reference.reference,
                reference.payment_id,
                payment_id
            );
        }
        ReconcileOutcome::AlreadyPaid {
            payment_id,
            reference,
        }
    }

    /// Poll fallback: returns the recorded payment, or asks the API for one and records it.
    pub async fn check_payment(&self, key: Uuid) -> Result<Option<serde_json::Value>, ProxypayError> {
        let reference = self.get(key).await?;
        if let Some(payment) = reference.payment.clone() {
            return Ok(Some(payment));
        }

        let key_field = self.settings.reference_uuid_key.as_str();
        let found = self.api.list_payments().await?.into_iter().find(|raw| {
            let Ok(p) = ProxypayPayment::from_value(raw) else {
                return false;
            };
            match p.custom_field(key_field) {
                Some(k) => k == reference.key.to_string(),
                None => p.reference_id == Some(reference.reference),
            }
        });

        let Some(payment) = found else {
            return Ok(None);
        };
        let outcome = self.mark_paid(&reference, &payment).await?;
        self.acknowledge(&outcome).await;
        Ok(Some(payment))
    }

    /// Extends an expired, unpaid reference by the configured lifetime.
    pub async fn renew(&self, key: Uuid) -> Result<bool, ProxypayError> {
        let reference = self.get(key).await?;
        let now = Utc::now();
        if reference.is_paid() || !reference.is_expired(now) {
            return Ok(false);
        }
        if self.store.is_reference_in_use(reference.reference, now).await? {
            tracing::warn!(
                "reference id {} was reissued, not renewing key={}",
                reference.reference,
                reference.key
            );
            return Ok(false);
        }

        let days = self.settings.reference_lifetime(None)?;
        let expiry = expiry_after(now, days).ok_or(ProxypayError::InvalidLifetime {
            max: MAX_REFERENCE_DAYS,
        })?;
        let request = ReferenceRequest {
            amount: reference.amount,
            end_datetime: expiry.end_datetime(),
            custom_fields: api_custom_fields(
                &reference.fields,
                &self.settings.reference_uuid_key,
                reference.key,
            ),
        };
        self.api
            .create_or_update_reference(reference.reference, &request)
            .await?;
        self.store.update_expiry(key, expiry.expires_in).await?;
        tracing::info!(
            "renewed reference {} until {}",
            reference.reference,
            expiry.expires_in
        );
        Ok(true)
    }

    pub async fn delete(&self, key: Uuid) -> Result<(), ProxypayError> {
        let reference = self.get(key).await?;
        self.api.delete_reference(reference.reference).await?;
        self.store.delete(key).await?;
        tracing::info!("deleted reference {} key={}", reference.reference, key);
        Ok(())
    }

    pub async fn resolve(&self, payment: &ProxypayPayment) -> Result<Option<Reference>, ProxypayError> {
        if let Some(key) = payment
            .custom_field(&self.settings.reference_uuid_key)
            .and_then(|raw| Uuid::parse_str(&raw).ok())
        {
            if let Some(found) = self.store.find_by_key(key).await? {
                return Ok(Some(found));
            }
        }

        if let Some(found) = self.store.find_by_payment_id(payment.id).await? {
            return Ok(Some(found));
        }

        match payment.reference_id {
            Some(reference_id) => Ok(self
                .store
                .find_active_by_reference(reference_id, Utc::now())
                .await?),
            None => Ok(None),
        }
    }

    pub async fn reconcile(&self, raw: &serde_json::Value) -> Result<ReconcileOutcome, ProxypayError> {
        let payment = ProxypayPayment::from_value(raw)
            .map_err(|e| ProxypayError::InvalidPayload(e.to_string()))?;

        match self.resolve(&payment).await? {
            Some(reference) => self.mark_paid(&reference, raw).await,
            None => {
                let accepted = self.settings.accept_unrecognized_payment;
                tracing::warn!(
                    "payment {} for reference {:?} matches no reference (accepted={})",
                    payment.id,
                    payment.reference_id,
                    accepted
                );
                Ok(ReconcileOutcome::Unrecognized {
                    payment_id: payment.id,
                    accepted,
                })
            }
        }
    }

    /// Acknowledgement failures are logged; ProxyPay keeps the payment listed and it is seen again.
    pub async fn acknowledge(&self, outcome: &ReconcileOutcome) {
        if !outcome.should_acknowledge() {
            return;
        }
        if let Err(e) = self.api.acknowledge_payment(outcome.payment_id()).await {
            tracing::warn!(
                "failed to acknowledge payment {}: {}",
                outcome.payment_id(),
                e
            );
        }
    }

    pub async fn handle_webhook(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<ReconcileOutcome, ProxypayError> {
        if !signature::verify(&self.settings.private_key, body, signature) {
            tracing::warn!("rejected webhook with invalid signature");
            return Err(ProxypayError::InvalidSignature);
        }
        let raw: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| ProxypayError::InvalidPayload(e.to_string()))?;

        let outcome = self.reconcile(&raw).await?;
        self.acknowledge(&outcome).await;
        match outcome {
            ReconcileOutcome::Unrecognized {
                payment_id,
                accepted: false,
            } => Err(ProxypayError::UnrecognizedPayment(payment_id)),
            other => Ok(other),
        }
    }

    pub async fn sync_pending_payments(&self) -> Result<SyncSummary, ProxypayError> {
        let payments = self.api.list_payments().await?;
        let mut summary = SyncSummary::default();
        for raw in payments {
            match self.reconcile(&raw).await {
                Ok(outcome) => {
                    match &outcome {
                        ReconcileOutcome::Paid { .. } => summary.paid += 1,
                        ReconcileOutcome::AlreadyPaid { .. } => summary.already_paid += 1,
                        ReconcileOutcome::Unrecognized { .. } => summary.unrecognized += 1,
                    }
                    self.acknowledge(&outcome).await;
                }
                Err(e) => {
                    summary.failed += 1;
                    tracing::error!("failed to reconcile payment {}: {}", raw, e);
                }
            }
        }
        Ok(summary)
    }

    /// Sandbox only: has ProxyPay simulate a payment for the latest reference with this id.
    pub async fn simulate_payment(&self, reference_id: i64) -> Result<ReconcileOutcome, ProxypayError> {
        if self.api.environment() != Environment::Sandbox {
            return Err(ProxypayError::SandboxOnly);
        }
        let reference = self
            .store
            .find_latest_by_reference(reference_id)
            .await?
            .ok_or(ProxypayError::ReferenceNotFound)?;
        let payment = self
            .api
            .mock_payment(reference.reference, reference.amount)
            .await?;
        let outcome = self.mark_paid(&reference, &payment).await?;
        self.acknowledge(&outcome).await;
        Ok(outcome)
    }
}
