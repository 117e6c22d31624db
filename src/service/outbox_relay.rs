use crate::repo::outbox_repo::{OutboxEvent, OutboxRepo, OutboxStatus};
use crate::service::webhook_dispatcher::WebhookDispatcher;
use anyhow::Result;
use chrono::Utc;
use redis::aio::MultiplexedConnection;
use redis::streams::StreamMaxlen;
use redis::AsyncCommands;
use std::time::Duration;

pub const STREAM_MAXLEN: usize = 1_000_000;

/// Moves reference events from the outbox table to the Redis stream and the webhook subscribers.
#[derive(Clone)]
pub struct OutboxRelay {
    pub outbox_repo: OutboxRepo,
    pub redis_client: redis::Client,
    pub stream_key: String,
    pub dispatcher: Option<WebhookDispatcher>,
    pub batch_size: i64,
    pub idle_delay: Duration,
}

impl OutboxRelay {
    pub async fn run(self) {
        loop {
            let published = match self.drain_once().await {
                Ok(n) => n,
                Err(err) => {
                    tracing::error!("outbox relay error: {}", err);
                    0
                }
            };
            if published == 0 {
                tokio::time::sleep(self.idle_delay).await;
            }
        }
    }

    /// Publishes one claimed batch; returns how many events reached the stream.
    pub async fn drain_once(&self) -> Result<usize> {
        let batch = self.outbox_repo.claim_batch(self.batch_size).await?;
        if batch.is_empty() {
            return Ok(0);
        }

        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let mut published = 0;
        for event in batch {
            match self.publish(&mut conn, &event).await {
                Ok(()) => {
                    self.outbox_repo.mark_published(event.id).await?;
                    published += 1;
                    self.dispatch(&event).await;
                }
                Err(e) => {
                    let status = self.outbox_repo.reschedule(&event, Utc::now()).await?;
                    if status == OutboxStatus::Failed {
                        tracing::error!(
                            "giving up on {} for reference {} after {} attempts: {}",
                            event.event_type,
                            event.reference_key,
                            event.attempts + 1,
                            e
                        );
                    } else {
                        tracing::warn!("stream publish failed for outbox id {}: {}", event.id, e);
                    }
                }
            }
        }
        Ok(published)
    }

    async fn publish(&self, conn: &mut MultiplexedConnection, event: &OutboxEvent) -> Result<()> {
        let payload = serde_json::to_string(&event.payload_json)?;
        let _: String = conn
            .xadd_maxlen(
                &self.stream_key,
                StreamMaxlen::Approx(STREAM_MAXLEN),
                "*",
                &[("type", event.event_type.as_str()), ("event", payload.as_str())],
            )
            .await?;
        Ok(())
    }

    async fn dispatch(&self, event: &OutboxEvent) {
        let Some(dispatcher) = &self.dispatcher else {
            return;
        };
        match dispatcher.emit(&event.event_type, &event.payload_json).await {
            Ok(delivered) if delivered > 0 => tracing::debug!(
                "{} for reference {} delivered to {} webhook(s)",
                event.event_type,
                event.reference_key,
                delivered
            ),
            Ok(_) => {}
            Err(e) => tracing::warn!("webhook dispatch failed for outbox id {}: {}", event.id, e),
        }
    }
}
