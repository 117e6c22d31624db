use axum::middleware::from_fn_with_state;
use proxypay::config::{AppConfig, ProxypaySettings};
use proxypay::http::middleware::rate_limit::{enforce, RateLimitState};
use proxypay::http::routes::router;
use proxypay::repo::outbox_repo::OutboxRepo;
use proxypay::repo::references_repo::ReferencesRepo;
use proxypay::repo::webhook_repo::WebhookRepo;
use proxypay::service::outbox_relay::OutboxRelay;
use proxypay::service::reference_service::ReferenceService;
use proxypay::service::webhook_dispatcher::WebhookDispatcher;
use proxypay::{build_api, AppState};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cfg = AppConfig::from_env();
    let settings = ProxypaySettings::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&cfg.database_url)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    let redis_client = redis::Client::open(cfg.redis_url.clone())?;

    let api = build_api(&cfg, &settings);
    tracing::info!(
        "proxypay {} environment, entity {}",
        api.environment().as_str(),
        api.entity()
    );
    let reference_service = ReferenceService::new(
        Arc::new(ReferencesRepo { pool: pool.clone() }),
        api,
        settings,
    );

    let relay = OutboxRelay {
        outbox_repo: OutboxRepo { pool: pool.clone() },
        redis_client: redis_client.clone(),
        stream_key: cfg.stream_key.clone(),
        dispatcher: Some(WebhookDispatcher {
            webhook_repo: WebhookRepo { pool: pool.clone() },
            client: reqwest::Client::new(),
        }),
        batch_size: 100,
        idle_delay: std::time::Duration::from_millis(200),
    };
    tokio::spawn(relay.run());

    let state = AppState {
        reference_service,
        pool,
        redis_client: redis_client.clone(),
    };

    let app = router(state, cfg.internal_api_key.clone()).layer(from_fn_with_state(
        RateLimitState {
            redis_client,
            max_per_minute: cfg.rate_limit_per_minute,
        },
        enforce,
    ));

    let listener = tokio::net::TcpListener::bind(&cfg.bind_addr).await?;
    tracing::info!("listening on {}", cfg.bind_addr);
    axum::serve(listener, app).await?;
    Ok(())
}
