//! OpenSASE Cart - operator CLI

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opensase_cart::config::AppConfig;
use opensase_cart::{DeliveryScheduleEngine, PgCartStore};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "opensase-cart", version, about = "Cart reservation and delivery scheduling")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending database migrations
    Migrate,
    /// Print the delivery options offered right now as JSON
    Schedule {
        /// courier or pickup
        #[arg(long, default_value = "pickup")]
        method: String,
        #[arg(long)]
        city: Option<String>,
    },
}

#[derive(Serialize)]
struct ScheduleReport<'a> {
    method: &'static str,
    title: &'a str,
    placeholder: &'a str,
    options: Vec<opensase_cart::DeliveryOption>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let cli = Cli::parse();
    let config = AppConfig::from_env().context("loading configuration")?;

    match cli.command {
        Command::Migrate => {
            let store = PgCartStore::connect(config.require_database_url()?, config.database_max_connections).await?;
            store.migrate().await?;
            tracing::info!("migrations applied");
        }
        Command::Schedule { method, city } => {
            let engine = DeliveryScheduleEngine::current(&config.delivery, &method, city.as_deref(), None);
            let report = ScheduleReport {
                method: engine.method().as_str(),
                title: engine.title_for_method(),
                placeholder: engine.placeholder_text(),
                options: engine.available_options(),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
