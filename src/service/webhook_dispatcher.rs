use crate::repo::webhook_repo::WebhookRepo;
use crate::signature::{self, SIGNATURE_HEADER};
use anyhow::Result;

/// Forwards reference events to the subscribed HTTP endpoints.
#[derive(Clone)]
pub struct WebhookDispatcher {
    pub webhook_repo: WebhookRepo,
    pub client: reqwest::Client,
}

impl WebhookDispatcher {
    /// Delivery is best effort per subscriber; a failing target never blocks the others.
    pub async fn emit(&self, event_type: &str, payload: &serde_json::Value) -> Result<usize> {
        let hooks = self.webhook_repo.list_enabled_for_event(event_type).await?;
        let body = serde_json::to_vec(payload)?;
        let mut delivered = 0;

        for hook in hooks {
            let mut req = self
                .client
                .post(&hook.target_url)
                .header("Content-Type", "application/json")
                .header("X-Event-Type", event_type)
                .body(body.clone());
            if let Some(secret) = hook.secret.as_deref() {
                req = req.header(SIGNATURE_HEADER, signature::sign(secret, &body));
            }

            match req.send().await.and_then(|r| r.error_for_status()) {
                Ok(_) => delivered += 1,
                Err(e) => tracing::warn!(
                    "webhook {} to {} failed for {}: {}",
                    hook.id,
                    hook.target_url,
                    event_type,
                    e
                ),
            }
        }

        Ok(delivered)
    }
}
