use crate::domain::events::{ReferenceEvent, REFERENCE_CREATED, REFERENCE_PAID};
use crate::domain::reference::{
    CustomFields, NewReference, Reference, ReferenceFilter, ReferenceStatus,
};
use crate::fees::ReferenceFees;
use crate::repo::outbox_repo::OutboxRepo;
use crate::repo::store::ReferenceStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const COLUMNS: &str = "key, reference, amount, entity, status, fields, payment, payment_id, data, paid_at, expires_in, created_at, updated_at";

#[derive(Clone)]
pub struct ReferencesRepo {
    pub pool: PgPool,
}

fn to_reference(row: &PgRow) -> Result<Reference> {
    let fields: CustomFields = serde_json::from_value(row.get("fields"))?;
    let fees: ReferenceFees = serde_json::from_value(row.get("data"))?;
    Ok(Reference {
        key: row.get("key"),
        reference: row.get("reference"),
        amount: row.get("amount"),
        entity: row.get("entity"),
        status: ReferenceStatus::from_i16(row.get("status")),
        fields,
        payment: row.get("payment"),
        payment_id: row.get("payment_id"),
        fees,
        paid_at: row.get("paid_at"),
        expires_in: row.get("expires_in"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[async_trait::async_trait]
impl ReferenceStore for ReferencesRepo {
    async fn insert(&self, new: &NewReference) -> Result<Reference> {
        let sql = format!(
            r#"
            INSERT INTO proxypay_references (key, reference, amount, entity, status, fields, data, expires_in)
            VALUES ($1, $2, $3, $4, 0, $5, $6, $7)
            RETURNING {COLUMNS}
            "#
        );

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&sql)
            .bind(new.key)
            .bind(new.reference)
            .bind(new.amount)
            .bind(new.entity.clone())
            .bind(serde_json::to_value(&new.fields)?)
            .bind(serde_json::to_value(&new.fees)?)
            .bind(new.expires_in)
            .fetch_one(tx.as_mut())
            .await?;
        let reference = to_reference(&row)?;

        OutboxRepo::insert_tx(
            &mut tx,
            reference.key,
            REFERENCE_CREATED,
            ReferenceEvent::new(REFERENCE_CREATED, &reference).to_json(),
        )
        .await?;
        tx.commit().await?;

        Ok(reference)
    }

    async fn find_by_key(&self, key: Uuid) -> Result<Option<Reference>> {
        let sql = format!("SELECT {COLUMNS} FROM proxypay_references WHERE key = $1");
        let row = sqlx::query(&sql)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(to_reference).transpose()
    }

    async fn find_active_by_reference(
        &self,
        reference: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<Reference>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM proxypay_references
            WHERE reference = $1 AND status = 0 AND expires_in > $2
            ORDER BY created_at DESC
            LIMIT 1
            "#
        );
        let row = sqlx::query(&sql)
            .bind(reference)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(to_reference).transpose()
    }

    async fn find_latest_by_reference(&self, reference: i64) -> Result<Option<Reference>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM proxypay_references WHERE reference = $1 ORDER BY created_at DESC LIMIT 1"
        );
        let row = sqlx::query(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(to_reference).transpose()
    }

    async fn find_by_payment_id(&self, payment_id: i64) -> Result<Option<Reference>> {
        let sql = format!("SELECT {COLUMNS} FROM proxypay_references WHERE payment_id = $1");
        let row = sqlx::query(&sql)
            .bind(payment_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(to_reference).transpose()
    }

    async fn mark_paid(
        &self,
        key: Uuid,
        payment: &serde_json::Value,
        payment_id: i64,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Reference>> {
        let sql = format!(
            r#"
            UPDATE proxypay_references
            SET status = 1, payment = $2, payment_id = $3, paid_at = $4, updated_at = now()
            WHERE key = $1 AND payment IS NULL
            RETURNING {COLUMNS}
            "#
        );

        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&sql)
            .bind(key)
            .bind(payment)
            .bind(payment_id)
            .bind(paid_at)
            .fetch_optional(tx.as_mut())
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Ok(None);
        };
        let reference = to_reference(&row)?;

        OutboxRepo::insert_tx(
            &mut tx,
            reference.key,
            REFERENCE_PAID,
            ReferenceEvent::new(REFERENCE_PAID, &reference).to_json(),
        )
        .await?;
        tx.commit().await?;

        Ok(Some(reference))
    }

    async fn update_expiry(&self, key: Uuid, expires_in: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE proxypay_references SET expires_in = $2, updated_at = now() WHERE key = $1")
            .bind(key)
            .bind(expires_in)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete(&self, key: Uuid) -> Result<bool> {
        let done = sqlx::query("DELETE FROM proxypay_references WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected() > 0)
    }

    async fn list(&self, filter: &ReferenceFilter) -> Result<Vec<Reference>> {
        let sql = format!(
            r#"
            SELECT {COLUMNS} FROM proxypay_references
            WHERE ($1::smallint IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query(&sql)
            .bind(filter.status.map(|s| s.as_i16()))
            .bind(filter.limit())
            .bind(filter.offset())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(to_reference).collect()
    }
}
