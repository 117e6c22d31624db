use anyhow::Result;
use proxypay::build_api;
use proxypay::config::{AppConfig, ProxypaySettings};
use proxypay::repo::references_repo::ReferencesRepo;
use proxypay::service::payment_watcher::PaymentWatcher;
use proxypay::service::reference_service::ReferenceService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let settings = ProxypaySettings::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&cfg.database_url)
        .await?;

    let api = build_api(&cfg, &settings);
    let watcher = PaymentWatcher {
        service: ReferenceService::new(Arc::new(ReferencesRepo { pool }), api, settings),
        interval: std::time::Duration::from_secs(cfg.watch_interval_secs.max(1)),
    };

    tracing::info!("watching payments every {}s", cfg.watch_interval_secs.max(1));
    watcher.run().await;
    Ok(())
}
