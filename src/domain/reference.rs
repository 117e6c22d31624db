use crate::domain::payment::ProxypayPayment;
use crate::fees::ReferenceFees;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// User custom fields; one more slot is taken by the reference key.
pub const MAX_CUSTOM_FIELDS: usize = 9;
/// Reference-id draws per creation before giving up on collisions.
pub const MAX_CREATE_ATTEMPTS: u32 = 3;

pub type CustomFields = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceStatus {
    Waiting,
    Paid,
}

impl ReferenceStatus {
    pub fn as_i16(&self) -> i16 {
        match self {
            ReferenceStatus::Waiting => 0,
            ReferenceStatus::Paid => 1,
        }
    }

    pub fn from_i16(v: i16) -> Self {
        if v == 1 {
            ReferenceStatus::Paid
        } else {
            ReferenceStatus::Waiting
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lifecycle {
    Waiting,
    Expired,
    Paid,
}

#[derive(Debug, Clone, Serialize)]
pub struct Reference {
    pub key: Uuid,
    pub reference: i64,
    pub amount: Decimal,
    pub entity: Option<String>,
    pub status: ReferenceStatus,
    pub fields: CustomFields,
    pub payment: Option<serde_json::Value>,
    pub payment_id: Option<i64>,
    pub fees: ReferenceFees,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_in: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reference {
    pub fn is_paid(&self) -> bool {
        self.status == ReferenceStatus::Paid
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_in.map(|at| at < now).unwrap_or(false)
    }

    /// Waiting and still inside its validity window; a missing expiry never counts as active.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.status == ReferenceStatus::Waiting && self.expires_in.map(|at| at > now).unwrap_or(false)
    }

    pub fn lifecycle(&self, now: DateTime<Utc>) -> Lifecycle {
        if self.is_paid() {
            Lifecycle::Paid
        } else if self.is_expired(now) {
            Lifecycle::Expired
        } else {
            Lifecycle::Waiting
        }
    }

    pub fn payment_details(&self) -> Option<ProxypayPayment> {
        self.payment
            .as_ref()
            .and_then(|raw| ProxypayPayment::from_value(raw).ok())
    }
}

#[derive(Debug, Clone)]
pub struct NewReference {
    pub key: Uuid,
    pub reference: i64,
    pub amount: Decimal,
    pub entity: Option<String>,
    pub fields: CustomFields,
    pub fees: ReferenceFees,
    pub expires_in: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceExpiry {
    pub end_date: NaiveDate,
    pub expires_in: DateTime<Utc>,
}

impl ReferenceExpiry {
    pub fn end_datetime(&self) -> String {
        self.end_date.format("%Y-%m-%d").to_string()
    }
}

/// ProxyPay references run until the end of their last day. `None` when the date is out of range.
pub fn expiry_after(now: DateTime<Utc>, days: i64) -> Option<ReferenceExpiry> {
    let end_date = now
        .checked_add_signed(Duration::try_days(days)?)?
        .date_naive();
    let expires_in = end_date.and_hms_opt(23, 59, 59)?.and_utc();
    Some(ReferenceExpiry {
        end_date,
        expires_in,
    })
}

pub fn api_custom_fields(fields: &CustomFields, uuid_key: &str, key: Uuid) -> CustomFields {
    let mut out = fields.clone();
    out.insert(uuid_key.to_string(), key.to_string());
    out
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReferenceFilter {
    pub status: Option<ReferenceStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl ReferenceFilter {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 500)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fees::{FeeSchedule, ReferenceFees};
    use chrono::TimeZone;

    fn sample(expires_in: Option<DateTime<Utc>>) -> Reference {
        let now = Utc::now();
        Reference {
            key: Uuid::new_v4(),
            reference: 123456789,
            amount: Decimal::from(5000),
            entity: Some("10001".to_string()),
            status: ReferenceStatus::Waiting,
            fields: CustomFields::new(),
            payment: None,
            payment_id: None,
            fees: ReferenceFees::compute(Decimal::from(5000), &FeeSchedule::none(), &FeeSchedule::none()),
            paid_at: None,
            expires_in,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn expiry_lands_on_last_second_of_end_day() {
        let now = Utc.with_ymd_and_hms(2024, 3, 30, 10, 15, 0).unwrap();
        let exp = expiry_after(now, 2).unwrap();
        assert_eq!(exp.end_datetime(), "2024-04-01");
        assert_eq!(exp.expires_in, Utc.with_ymd_and_hms(2024, 4, 1, 23, 59, 59).unwrap());
    }

    #[test]
    fn out_of_range_expiry_is_none() {
        let now = Utc.with_ymd_and_hms(2024, 3, 30, 10, 15, 0).unwrap();
        assert!(expiry_after(now, 1_000_000_000).is_none());
        assert!(expiry_after(now, i64::MAX).is_none());
    }

    #[test]
    fn lifecycle_follows_expiry_and_payment() {
        let now = Utc::now();
        let mut r = sample(Some(now - Duration::minutes(1)));
        assert_eq!(r.lifecycle(now), Lifecycle::Expired);
        assert!(!r.is_active(now));

        r.expires_in = Some(now + Duration::hours(1));
        assert_eq!(r.lifecycle(now), Lifecycle::Waiting);
        assert!(r.is_active(now));

        r.status = ReferenceStatus::Paid;
        assert_eq!(r.lifecycle(now), Lifecycle::Paid);
        assert!(!r.is_active(now));
    }

    #[test]
    fn missing_expiry_is_neither_expired_nor_active() {
        let r = sample(None);
        assert!(!r.is_expired(Utc::now()));
        assert!(!r.is_active(Utc::now()));
    }

    #[test]
    fn key_is_added_to_custom_fields() {
        let mut fields = CustomFields::new();
        fields.insert("product".to_string(), "book".to_string());
        let key = Uuid::new_v4();
        let out = api_custom_fields(&fields, "djpp_uuid_ref", key);
        assert_eq!(out.len(), 2);
        assert_eq!(out.get("djpp_uuid_ref"), Some(&key.to_string()));
    }
}
