use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A payment notification as ProxyPay delivers it, by webhook or from `GET /payments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxypayPayment {
    pub id: i64,
    #[serde(default)]
    pub reference_id: Option<i64>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub datetime: Option<String>,
    #[serde(default)]
    pub custom_fields: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub entity_id: Option<serde_json::Value>,
    #[serde(default)]
    pub fee: Option<serde_json::Value>,
    #[serde(default)]
    pub period_id: Option<serde_json::Value>,
    #[serde(default)]
    pub period_start_datetime: Option<String>,
    #[serde(default)]
    pub period_end_datetime: Option<String>,
    #[serde(default)]
    pub product_id: Option<serde_json::Value>,
    #[serde(default)]
    pub terminal_id: Option<serde_json::Value>,
    #[serde(default)]
    pub terminal_location: Option<String>,
    #[serde(default)]
    pub terminal_type: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<serde_json::Value>,
}

impl ProxypayPayment {
    pub fn from_value(raw: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(raw.clone())
    }

    pub fn custom_field(&self, key: &str) -> Option<String> {
        match self.custom_fields.get(key)? {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
        }
    }

    pub fn paid_at(&self, fallback: DateTime<Utc>) -> DateTime<Utc> {
        self.datetime
            .as_deref()
            .and_then(parse_iso_datetime)
            .unwrap_or(fallback)
    }
}

pub fn parse_iso_datetime(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: ErrorPayload,
}

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: String,
    pub message: String,
    pub details: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_webhook_body() {
        let raw = serde_json::json!({
            "id": 82311555000_i64,
            "reference_id": 541562000,
            "amount": "3000.00",
            "datetime": "2024-05-10T14:20:12.000Z",
            "custom_fields": {"djpp_uuid_ref": "abc", "order": 7},
            "terminal_location": "LUANDA",
            "terminal_type": "ATM"
        });
        let p = ProxypayPayment::from_value(&raw).unwrap();
        assert_eq!(p.reference_id, Some(541562000));
        assert_eq!(p.custom_field("djpp_uuid_ref").as_deref(), Some("abc"));
        assert_eq!(p.custom_field("order").as_deref(), Some("7"));
        assert_eq!(
            p.paid_at(Utc::now()),
            Utc.with_ymd_and_hms(2024, 5, 10, 14, 20, 12).unwrap()
        );
    }

    #[test]
    fn unparseable_datetime_falls_back() {
        let raw = serde_json::json!({"id": 1, "datetime": "yesterday"});
        let p = ProxypayPayment::from_value(&raw).unwrap();
        let fallback = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(p.paid_at(fallback), fallback);
    }

    #[test]
    fn naive_datetime_is_read_as_utc() {
        assert_eq!(
            parse_iso_datetime("2024-02-03T04:05:06"),
            Some(Utc.with_ymd_and_hms(2024, 2, 3, 4, 5, 6).unwrap())
        );
    }
}
