use crate::error::ProxypayError;
use crate::service::reference_service::{ReferenceService, SyncSummary};
use std::time::Duration;

/// Polls ProxyPay for unacknowledged payments; covers notifications that never reached the webhook.
#[derive(Clone)]
pub struct PaymentWatcher {
    pub service: ReferenceService,
    pub interval: Duration,
}

impl PaymentWatcher {
    pub async fn run(self) {
        loop {
            if let Err(err) = self.tick().await {
                tracing::error!("payment watcher error: {}", err);
            }
            tokio::time::sleep(self.interval).await;
        }
    }

    pub async fn tick(&self) -> Result<SyncSummary, ProxypayError> {
        let summary = self.service.sync_pending_payments().await?;
        if summary != SyncSummary::default() {
            tracing::info!(
                "payment watcher: paid={} already_paid={} unrecognized={} failed={}",
                summary.paid,
                summary.already_paid,
                summary.unrecognized,
                summary.failed
            );
        }
        Ok(summary)
    }
}
