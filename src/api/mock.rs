use crate::api::{ProxypayApi, ReferenceRequest};
use crate::config::Environment;
use crate::error::ProxypayError;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

/// In-process stand-in for the ProxyPay API, used with `PROXYPAY_ADAPTER=MOCK` and in tests.
pub struct MockProxypay {
    pub entity: String,
    pub environment: Environment,
    state: Mutex<MockState>,
}

struct MockState {
    next_reference_id: i64,
    next_payment_id: i64,
    scripted_ids: VecDeque<i64>,
    references: HashMap<i64, ReferenceRequest>,
    payments: Vec<serde_json::Value>,
    acknowledged: Vec<i64>,
    fail_deletes: bool,
    fail_puts: bool,
}

impl MockProxypay {
    pub fn new(entity: &str, environment: Environment) -> Self {
        Self {
            entity: entity.to_string(),
            environment,
            state: Mutex::new(MockState {
                next_reference_id: 100_000_001,
                next_payment_id: 80_000_000_001,
                scripted_ids: VecDeque::new(),
                references: HashMap::new(),
                payments: Vec::new(),
                acknowledged: Vec::new(),
                fail_deletes: false,
                fail_puts: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Ids handed out by the next `generate_reference_id` calls, before the sequence resumes.
    pub fn script_reference_ids(&self, ids: impl IntoIterator<Item = i64>) {
        self.state().scripted_ids.extend(ids);
    }

    pub fn reference(&self, reference_id: i64) -> Option<ReferenceRequest> {
        self.state().references.get(&reference_id).cloned()
    }

    pub fn push_payment(&self, payment: serde_json::Value) {
        self.state().payments.push(payment);
    }

    pub fn pending_payments(&self) -> Vec<serde_json::Value> {
        self.state().payments.clone()
    }

    pub fn acknowledged(&self) -> Vec<i64> {
        self.state().acknowledged.clone()
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state().fail_deletes = fail;
    }

    pub fn fail_puts(&self, fail: bool) {
        self.state().fail_puts = fail;
    }
}

fn not_found(what: &str) -> ProxypayError {
    ProxypayError::Api {
        status: 404,
        body: format!("{what} not found"),
    }
}

#[async_trait::async_trait]
impl ProxypayApi for MockProxypay {
    fn environment(&self) -> Environment {
        self.environment
    }

    fn entity(&self) -> &str {
        &self.entity
    }

    async fn generate_reference_id(&self) -> Result<i64, ProxypayError> {
        let mut state = self.state();
        if let Some(id) = state.scripted_ids.pop_front() {
            return Ok(id);
        }
        let id = state.next_reference_id;
        state.next_reference_id += 1;
        Ok(id)
    }

    async fn create_or_update_reference(
        &self,
        reference_id: i64,
        request: &ReferenceRequest,
    ) -> Result<(), ProxypayError> {
        let mut state = self.state();
        if state.fail_puts {
            return Err(ProxypayError::Api {
                status: 500,
                body: "mock put failure".to_string(),
            });
        }
        state.references.insert(reference_id, request.clone());
        Ok(())
    }

    async fn delete_reference(&self, reference_id: i64) -> Result<(), ProxypayError> {
        let mut state = self.state();
        if state.fail_deletes {
            return Err(ProxypayError::Api {
                status: 500,
                body: "mock delete failure".to_string(),
            });
        }
        state
            .references
            .remove(&reference_id)
            .map(|_| ())
            .ok_or_else(|| not_found("reference"))
    }

    async fn list_payments(&self) -> Result<Vec<serde_json::Value>, ProxypayError> {
        Ok(self.pending_payments())
    }

    async fn acknowledge_payment(&self, payment_id: i64) -> Result<(), ProxypayError> {
        let mut state = self.state();
        let before = state.payments.len();
        state
            .payments
            .retain(|p| p.get("id").and_then(|v| v.as_i64()) != Some(payment_id));
        if state.payments.len() == before {
            return Err(not_found("payment"));
        }
        state.acknowledged.push(payment_id);
        Ok(())
    }

    async fn mock_payment(
        &self,
        reference_id: i64,
        amount: Decimal,
    ) -> Result<serde_json::Value, ProxypayError> {
        if self.environment != Environment::Sandbox {
            return Err(ProxypayError::SandboxOnly);
        }
        let mut state = self.state();
        let custom_fields = state
            .references
            .get(&reference_id)
            .map(|r| r.custom_fields.clone())
            .ok_or_else(|| not_found("reference"))?;
        let id = state.next_payment_id;
        state.next_payment_id += 1;

        let payment = serde_json::json!({
            "id": id,
            "reference_id": reference_id,
            "amount": amount,
            "datetime": chrono::Utc::now().to_rfc3339(),
            "custom_fields": custom_fields,
            "entity_id": self.entity,
            "terminal_type": "MOCK",
            "terminal_location": "SANDBOX",
        });
        state.payments.push(payment.clone());
        Ok(payment)
    }
}
