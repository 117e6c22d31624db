use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

/// Rows left in `PROCESSING` longer than this belong to a relay that died mid-batch.
pub const STALE_PROCESSING_SECS: i64 = 300;
/// Publish attempts before an event is parked as `FAILED`.
pub const MAX_PUBLISH_ATTEMPTS: i32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutboxStatus {
    Pending,
    Processing,
    Published,
    Failed,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "PENDING",
            OutboxStatus::Processing => "PROCESSING",
            OutboxStatus::Published => "PUBLISHED",
            OutboxStatus::Failed => "FAILED",
        }
    }
}

/// In-process mirror of the claim condition used by [`OutboxRepo::claim_batch`].
pub fn is_claimable(
    status: OutboxStatus,
    next_attempt_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    match status {
        OutboxStatus::Pending => next_attempt_at <= now,
        OutboxStatus::Processing => updated_at < now - Duration::seconds(STALE_PROCESSING_SECS),
        OutboxStatus::Published | OutboxStatus::Failed => false,
    }
}

/// Exponential backoff in seconds, capped at five minutes.
pub fn retry_backoff_secs(attempts: i32) -> i64 {
    i64::min(300, 2_i64.pow(attempts.clamp(0, 9) as u32))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub id: i64,
    pub reference_key: Uuid,
    pub event_type: String,
    pub payload_json: serde_json::Value,
    pub attempts: i32,
}

#[derive(Clone)]
pub struct OutboxRepo {
    pub pool: PgPool,
}

impl OutboxRepo {
    /// One row per (reference, event type); repeats of the same transition are dropped.
    pub async fn insert_tx(
        tx: &mut Transaction<'_, Postgres>,
        reference_key: Uuid,
        event_type: &str,
        payload_json: serde_json::Value,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reference_events_outbox (reference_key, event_type, payload_json, status, attempts, next_attempt_at)
            VALUES ($1, $2, $3, $4, 0, now())
            ON CONFLICT (reference_key, event_type) DO NOTHING
            "#,
        )
        .bind(reference_key)
        .bind(event_type)
        .bind(payload_json)
        .bind(OutboxStatus::Pending.as_str())
        .execute(tx.as_mut())
        .await?;
        Ok(())
    }

    /// Moves due rows, and stale `PROCESSING` rows, to `PROCESSING` in one statement.
    pub async fn claim_batch(&self, batch_size: i64) -> Result<Vec<OutboxEvent>> {
        let rows = sqlx::query(
            r#"
            UPDATE reference_events_outbox
            SET status = 'PROCESSING', updated_at = now()
            WHERE id IN (
                SELECT id FROM reference_events_outbox
                WHERE (status = 'PENDING' AND next_attempt_at <= now())
                   OR (status = 'PROCESSING' AND updated_at < now() - make_interval(secs => $2))
                ORDER BY id ASC
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING id, reference_key, event_type, payload_json, attempts
            "#,
        )
        .bind(batch_size)
        .bind(STALE_PROCESSING_SECS as f64)
        .fetch_all(&self.pool)
        .await?;

        let mut batch: Vec<OutboxEvent> = rows
            .into_iter()
            .map(|r| OutboxEvent {
                id: r.get("id"),
                reference_key: r.get("reference_key"),
                event_type: r.get("event_type"),
                payload_json: r.get("payload_json"),
                attempts: r.get("attempts"),
            })
            .collect();
        batch.sort_by_key(|e| e.id);
        Ok(batch)
    }

    pub async fn mark_published(&self, id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE reference_events_outbox SET status = $2, published_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(OutboxStatus::Published.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Schedules another attempt, or parks the row as `FAILED` once attempts run out.
    pub async fn reschedule(&self, event: &OutboxEvent, now: DateTime<Utc>) -> Result<OutboxStatus> {
        let attempts = event.attempts + 1;
        let status = if attempts >= MAX_PUBLISH_ATTEMPTS {
            OutboxStatus::Failed
        } else {
            OutboxStatus::Pending
        };
        sqlx::query(
            "UPDATE reference_events_outbox SET status = $2, attempts = $3, next_attempt_at = $4, updated_at = now() WHERE id = $1",
        )
        .bind(event.id)
        .bind(status.as_str())
        .bind(attempts)
        .bind(now + Duration::seconds(retry_backoff_secs(attempts)))
        .execute(&self.pool)
        .await?;
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_caps() {
        assert_eq!(retry_backoff_secs(1), 2);
        assert_eq!(retry_backoff_secs(4), 16);
        assert_eq!(retry_backoff_secs(8), 256);
        assert_eq!(retry_backoff_secs(9), 300);
        assert_eq!(retry_backoff_secs(50), 300);
    }

    #[test]
    fn stale_processing_rows_are_reclaimed() {
        let now = Utc::now();
        let fresh = now - Duration::seconds(30);
        let stale = now - Duration::seconds(STALE_PROCESSING_SECS + 1);

        assert!(!is_claimable(OutboxStatus::Processing, now, fresh, now));
        assert!(is_claimable(OutboxStatus::Processing, now, stale, now));
    }

    #[test]
    fn pending_rows_wait_for_their_attempt_time() {
        let now = Utc::now();
        assert!(is_claimable(OutboxStatus::Pending, now, now, now));
        assert!(!is_claimable(OutboxStatus::Pending, now + Duration::seconds(5), now, now));
        assert!(!is_claimable(OutboxStatus::Published, now, now - Duration::days(1), now));
        assert!(!is_claimable(OutboxStatus::Failed, now, now - Duration::days(1), now));
    }
}
