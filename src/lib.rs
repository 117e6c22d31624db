pub mod api;
pub mod config;
pub mod domain {
    pub mod events;
    pub mod payment;
    pub mod reference;
}
pub mod error;
pub mod fees;
pub mod http {
    pub mod handlers {
        pub mod ops;
        pub mod references;
        pub mod webhooks;
    }
    pub mod middleware {
        pub mod admin_auth;
        pub mod rate_limit;
    }
    pub mod routes;
}
pub mod repo {
    pub mod memory_store;
    pub mod outbox_repo;
    pub mod references_repo;
    pub mod store;
    pub mod webhook_repo;
}
pub mod service {
    pub mod outbox_relay;
    pub mod payment_watcher;
    pub mod reference_service;
    pub mod webhook_dispatcher;
}
pub mod signature;

use api::client::ProxypayClient;
use api::mock::MockProxypay;
use api::ProxypayApi;
use config::{AppConfig, ProxypaySettings};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub reference_service: service::reference_service::ReferenceService,
    pub pool: sqlx::PgPool,
    pub redis_client: redis::Client,
}

/// `PROXYPAY_ADAPTER=MOCK` swaps the HTTP client for the in-process mock.
pub fn build_api(cfg: &AppConfig, settings: &ProxypaySettings) -> Arc<dyn ProxypayApi> {
    match cfg.api_adapter.as_str() {
        "MOCK" => {
            tracing::warn!("using mock proxypay adapter");
            Arc::new(MockProxypay::new(&settings.entity, settings.environment))
        }
        _ => Arc::new(ProxypayClient::from_settings(settings)),
    }
}

/// For one-shot commands: the mock adapter forgets its references between runs.
pub fn build_persistent_api(
    cfg: &AppConfig,
    settings: &ProxypaySettings,
) -> anyhow::Result<Arc<dyn ProxypayApi>> {
    if cfg.api_adapter == "MOCK" {
        anyhow::bail!("PROXYPAY_ADAPTER=MOCK is not supported here, use PROXYPAY with PROXYPAY_ENV=sandbox");
    }
    Ok(build_api(cfg, settings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Environment;

    fn app_config(adapter: &str) -> AppConfig {
        AppConfig {
            database_url: String::new(),
            bind_addr: String::new(),
            redis_url: String::new(),
            stream_key: String::new(),
            internal_api_key: String::new(),
            api_adapter: adapter.to_string(),
            watch_interval_secs: 30,
            rate_limit_per_minute: 300,
        }
    }

    fn sandbox_settings() -> ProxypaySettings {
        ProxypaySettings::from_lookup(|key| match key {
            "PROXYPAY_PRIVATE_KEY" => Some("k".to_string()),
            "PROXYPAY_ENTITY" => Some("10001".to_string()),
            "PROXYPAY_ENV" => Some("sandbox".to_string()),
            _ => None,
        })
        .unwrap()
    }

    #[test]
    fn one_shot_commands_refuse_the_mock_adapter() {
        let settings = sandbox_settings();
        assert!(build_persistent_api(&app_config("MOCK"), &settings).is_err());

        let api = build_persistent_api(&app_config("PROXYPAY"), &settings).unwrap();
        assert_eq!(api.environment(), Environment::Sandbox);
        assert_eq!(api.entity(), "10001");
    }
}
