use anyhow::Result;
use sqlx::{PgPool, Row};

pub const ALL_EVENTS: &str = "*";

#[derive(Clone)]
pub struct WebhookRepo {
    pub pool: PgPool,
}

#[derive(Debug, Clone)]
pub struct WebhookSubscription {
    pub id: i64,
    pub event_type: String,
    pub target_url: String,
    pub secret: Option<String>,
}

impl WebhookRepo {
    /// Subscriptions for `event_type`, including the ones registered for every event (`*`).
    pub async fn list_enabled_for_event(&self, event_type: &str) -> Result<Vec<WebhookSubscription>> {
        let rows = sqlx::query(
            r#"
            SELECT id, event_type, target_url, secret
            FROM webhook_subscriptions
            WHERE is_enabled = true AND (event_type = $1 OR event_type = $2)
            ORDER BY id ASC
            "#,
        )
        .bind(event_type)
        .bind(ALL_EVENTS)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| WebhookSubscription {
                id: row.get("id"),
                event_type: row.get("event_type"),
                target_url: row.get("target_url"),
                secret: row.get("secret"),
            })
            .collect())
    }
}
