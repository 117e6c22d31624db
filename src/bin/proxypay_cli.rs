use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use proxypay::build_persistent_api;
use proxypay::config::{AppConfig, ProxypaySettings};
use proxypay::domain::reference::CustomFields;
use proxypay::repo::references_repo::ReferencesRepo;
use proxypay::service::reference_service::{CreateReference, ReconcileOutcome, ReferenceService};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "proxypay_cli")]
#[command(about = "Manage ProxyPay references from the command line")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Simulate a payment for a reference (sandbox only)
    Pay {
        /// ProxyPay reference number
        reference: i64,
    },
    /// Create a reference
    Create {
        #[arg(long)]
        amount: Decimal,
        /// Validity in days, defaults to PROXYPAY_REFERENCE_LIFE_TIME_IN_DAYS
        #[arg(long)]
        days: Option<i64>,
        /// Custom field as key=value, repeatable
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    /// Look up the payment for a reference, recording it if ProxyPay has one
    Check { key: Uuid },
    /// Extend an expired, unpaid reference
    Renew { key: Uuid },
    /// Delete a reference at ProxyPay and locally
    Delete { key: Uuid },
    /// List payments ProxyPay has not had acknowledged yet
    Payments,
    /// Reconcile every pending payment once
    Sync,
}

fn parse_field(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got {raw}"))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = AppConfig::from_env();
    let settings = ProxypaySettings::from_env()?;
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&cfg.database_url)
        .await?;

    let api = build_persistent_api(&cfg, &settings)?;
    let service = ReferenceService::new(Arc::new(ReferencesRepo { pool }), api, settings);

    match cli.command {
        Command::Pay { reference } => match service.simulate_payment(reference).await? {
            ReconcileOutcome::Paid { payment_id, reference } => {
                println!("reference {} paid by payment {}", reference.reference, payment_id)
            }
            ReconcileOutcome::AlreadyPaid { reference, .. } => {
                println!("reference {} was already paid", reference.reference)
            }
            ReconcileOutcome::Unrecognized { payment_id, .. } => {
                return Err(anyhow!("payment {payment_id} did not match reference {reference}"))
            }
        },
        Command::Create { amount, days, fields } => {
            let reference = service
                .create(CreateReference {
                    amount,
                    fields: fields.into_iter().collect::<CustomFields>(),
                    days,
                })
                .await?;
            print_json(&reference)?;
        }
        Command::Check { key } => match service.check_payment(key).await? {
            Some(payment) => print_json(&payment)?,
            None => println!("no payment yet for {key}"),
        },
        Command::Renew { key } => {
            if service.renew(key).await? {
                print_json(&service.get(key).await?)?;
            } else {
                println!("reference {key} is paid or still valid, nothing to renew");
            }
        }
        Command::Delete { key } => {
            service.delete(key).await?;
            println!("deleted {key}");
        }
        Command::Payments => print_json(&service.api.list_payments().await?)?,
        Command::Sync => print_json(&service.sync_pending_payments().await?)?,
    }

    Ok(())
}
