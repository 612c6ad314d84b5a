use anyhow::Result;
use aria_billing::config::BillingConfig;
use aria_billing::storage::{PricingRepository, SqlPricingRepository, StoreConnection};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "aria-billing")]
#[command(about = "Aria Billing - migrations and pricing catalog administration")]
struct Args {
    #[arg(short, long, help = "Path to configuration file")]
    config: Option<PathBuf>,

    #[arg(long, help = "Generate sample configuration file")]
    gen_config: bool,

    #[arg(long, help = "Validate configuration without touching the store")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aria_billing=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if args.gen_config {
        let config = BillingConfig::default();
        let toml = toml::to_string_pretty(&config)?;
        println!("{}", toml);
        return Ok(());
    }

    let config = BillingConfig::load(args.config)?;

    if args.dry_run {
        info!("Configuration validated successfully (dry-run mode)");
        return Ok(());
    }

    let connection = Arc::new(StoreConnection::connect(&config.database).await?);

    info!("Running database migrations");
    connection.run_migrations().await?;
    info!("Migrations completed successfully");

    let catalog = SqlPricingRepository::new(connection);
    let seeded = catalog.seed_defaults().await?;
    if seeded > 0 {
        info!(rules = seeded, "Pricing catalog seeded");
    } else {
        info!("Pricing catalog already populated");
    }

    let active = catalog.list_active().await?;
    info!(rules = active.len(), "Active pricing rules");

    Ok(())
}
