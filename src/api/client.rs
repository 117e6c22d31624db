use crate::api::{MockPaymentRequest, ProxypayApi, ReferenceRequest};
use crate::config::{Environment, ProxypaySettings};
use crate::error::ProxypayError;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response};
use rust_decimal::Decimal;
use serde::Serialize;

pub const ACCEPT_V2: &str = "application/vnd.proxypay.v2+json";

pub struct ProxypayClient {
    pub base_url: String,
    pub token: String,
    pub entity: String,
    pub environment: Environment,
    pub timeout_ms: u64,
    pub client: reqwest::Client,
}

impl ProxypayClient {
    pub fn from_settings(settings: &ProxypaySettings) -> Self {
        Self {
            base_url: settings.base_url().trim_end_matches('/').to_string(),
            token: settings.private_key.clone(),
            entity: settings.entity.clone(),
            environment: settings.environment,
            timeout_ms: 10_000,
            client: reqwest::Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, ACCEPT_V2)
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .timeout(std::time::Duration::from_millis(self.timeout_ms))
    }

    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> reqwest::Result<Response> {
        self.authorized(self.client.get(self.url(path)).query(params))
            .send()
            .await
    }

    pub async fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&T>,
    ) -> reqwest::Result<Response> {
        let mut req = self.authorized(self.client.post(self.url(path)));
        if let Some(body) = body {
            req = req.json(body);
        }
        req.send().await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> reqwest::Result<Response> {
        self.authorized(self.client.put(self.url(path)).json(body))
            .send()
            .await
    }

    pub async fn delete(&self, path: &str) -> reqwest::Result<Response> {
        self.authorized(self.client.delete(self.url(path)))
            .send()
            .await
    }
}

async fn ensure_success(resp: Response) -> Result<Response, ProxypayError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    Err(ProxypayError::Api {
        status,
        body: body.chars().take(200).collect(),
    })
}

#[async_trait::async_trait]
impl ProxypayApi for ProxypayClient {
    fn environment(&self) -> Environment {
        self.environment
    }

    fn entity(&self) -> &str {
        &self.entity
    }

    async fn generate_reference_id(&self) -> Result<i64, ProxypayError> {
        let resp = ensure_success(self.post::<()>("/reference_ids", None).await?).await?;
        let text = resp.text().await?;
        text.trim()
            .trim_matches('"')
            .parse::<i64>()
            .map_err(|_| ProxypayError::InvalidPayload(format!("unexpected reference id: {text}")))
    }

    async fn create_or_update_reference(
        &self,
        reference_id: i64,
        request: &ReferenceRequest,
    ) -> Result<(), ProxypayError> {
        let path = format!("/references/{reference_id}");
        ensure_success(self.put(&path, request).await?).await?;
        Ok(())
    }

    async fn delete_reference(&self, reference_id: i64) -> Result<(), ProxypayError> {
        let path = format!("/references/{reference_id}");
        ensure_success(self.delete(&path).await?).await?;
        Ok(())
    }

    async fn list_payments(&self) -> Result<Vec<serde_json::Value>, ProxypayError> {
        let resp = ensure_success(self.get("/payments", &[]).await?).await?;
        Ok(resp.json::<Vec<serde_json::Value>>().await?)
    }

    async fn acknowledge_payment(&self, payment_id: i64) -> Result<(), ProxypayError> {
        let path = format!("/payments/{payment_id}");
        ensure_success(self.delete(&path).await?).await?;
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
        let body = MockPaymentRequest {
            amount,
            reference_id,
        };
        let resp = ensure_success(self.post("/payments", Some(&body)).await?).await?;
        Ok(resp.json::<serde_json::Value>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::reference::CustomFields;
    use mockito::{Matcher, Server};

    fn client(base_url: String, environment: Environment) -> ProxypayClient {
        ProxypayClient {
            base_url,
            token: "secret-token".to_string(),
            entity: "10001".to_string(),
            environment,
            timeout_ms: 2_000,
            client: reqwest::Client::new(),
        }
    }

    #[test]
    fn url_adds_missing_slash() {
        let c = client("https://api.sandbox.proxypay.co.ao".to_string(), Environment::Sandbox);
        assert_eq!(c.url("payments"), "https://api.sandbox.proxypay.co.ao/payments");
        assert_eq!(c.url("/payments"), "https://api.sandbox.proxypay.co.ao/payments");
    }

    #[tokio::test]
    async fn generates_reference_id_with_auth_headers() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/reference_ids")
            .match_header("authorization", "Token secret-token")
            .match_header("accept", ACCEPT_V2)
            .with_status(200)
            .with_body("541562000")
            .create_async()
            .await;

        let id = client(server.url(), Environment::Sandbox)
            .generate_reference_id()
            .await
            .expect("reference id");
        assert_eq!(id, 541562000);
    }

    #[tokio::test]
    async fn puts_reference_body() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("PUT", "/references/541562000")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "end_datetime": "2024-04-01",
                "custom_fields": {"djpp_uuid_ref": "k1"}
            })))
            .with_status(204)
            .create_async()
            .await;

        let mut fields = CustomFields::new();
        fields.insert("djpp_uuid_ref".to_string(), "k1".to_string());
        let req = ReferenceRequest {
            amount: Decimal::from(3000),
            end_datetime: "2024-04-01".to_string(),
            custom_fields: fields,
        };
        client(server.url(), Environment::Sandbox)
            .create_or_update_reference(541562000, &req)
            .await
            .expect("put reference");
    }

    #[tokio::test]
    async fn non_success_becomes_api_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("DELETE", "/references/1")
            .with_status(404)
            .with_body("not found")
            .create_async()
            .await;

        let err = client(server.url(), Environment::Sandbox)
            .delete_reference(1)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxypayError::Api { status: 404, .. }));
    }

    #[tokio::test]
    async fn lists_and_acknowledges_payments() {
        let mut server = Server::new_async().await;
        let _list = server
            .mock("GET", "/payments")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"id": 9001, "reference_id": 541562000, "amount": "3000.00"}]"#)
            .create_async()
            .await;
        let _ack = server
            .mock("DELETE", "/payments/9001")
            .with_status(204)
            .create_async()
            .await;

        let c = client(server.url(), Environment::Sandbox);
        let payments = c.list_payments().await.expect("payments");
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0]["id"], 9001);
        c.acknowledge_payment(9001).await.expect("ack");
    }

    #[tokio::test]
    async fn mock_payment_is_refused_in_production() {
        let c = client("http://127.0.0.1:9".to_string(), Environment::Production);
        let err = c.mock_payment(1, Decimal::from(10)).await.unwrap_err();
        assert!(matches!(err, ProxypayError::SandboxOnly));
    }
}
