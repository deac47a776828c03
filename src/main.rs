//! Dealership — car inventory service
//!
//! Usage:
//!   dealership serve  --config config.toml                    # run the HTTP API
//!   dealership status --config config.toml                    # cars per status
//!   dealership list   --config config.toml --status reserved  # cars in one status

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use dealership::api::{self, AppState, CarInventory};
use dealership::config::Config;
use dealership::inventory::Inventory;
use dealership::model::CarStatus;
use dealership::storage::blob_store::FileBlobStore;
use dealership::storage::collection::JsonCollection;

#[derive(Parser)]
#[command(name = "dealership", about = "Car dealership inventory service", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the inventory HTTP API.
    Serve {
        /// Path to the TOML configuration file.
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// Print the number of cars in each status and exit.
    Status {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
    },
    /// List the cars in one status.
    List {
        #[arg(short, long, default_value = "config.toml")]
        config: PathBuf,
        /// available, reserved or sold.
        #[arg(long)]
        status: CarStatus,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Serve { config } => run_serve(&config).await,
        Command::Status { config } => run_status(&config),
        Command::List { config, status } => run_list(&config, status),
    };

    if let Err(e) = result {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

fn open_inventory(cfg: &Config) -> anyhow::Result<CarInventory> {
    let base = &cfg.storage.base_path;
    let cars = JsonCollection::open(base)
        .with_context(|| format!("opening car collection in {}", base.display()))?;
    let blobs = FileBlobStore::open(base)
        .with_context(|| format!("opening blob store in {}", base.display()))?;
    Ok(Inventory::new(cars, blobs))
}

async fn run_serve(config_path: &Path) -> anyhow::Result<()> {
    let cfg = Config::from_file(config_path).context("Failed to load config")?;

    info!(
        base_path = ?cfg.storage.base_path,
        port = cfg.server.port,
        max_upload_mb = cfg.server.max_upload_mb,
        "Starting dealership service"
    );

    let inventory = open_inventory(&cfg)?;
    info!(cars = inventory.collection().len(), "Inventory loaded");

    let state = Arc::new(AppState {
        inventory,
        max_upload_bytes: cfg.server.max_upload_bytes(),
    });
    api::start_server(state, cfg.server.port)
        .await
        .context("HTTP server error")?;

    info!("Server exited properly");
    Ok(())
}

fn run_status(config_path: &Path) -> anyhow::Result<()> {
    let cfg = Config::from_file(config_path).context("Failed to load config")?;
    let inventory = open_inventory(&cfg)?;

    println!("=== Dealership Status ===");
    println!("Data dir    : {}", cfg.storage.base_path.display());
    for status in CarStatus::ALL {
        let count = inventory.list_by_status(status)?.len();
        println!("{:<12}: {}", status.as_str(), count);
    }
    println!("Images      : {}", inventory.blob_store().list_ids()?.len());
    Ok(())
}

fn run_list(config_path: &Path, status: CarStatus) -> anyhow::Result<()> {
    let cfg = Config::from_file(config_path).context("Failed to load config")?;
    let inventory = open_inventory(&cfg)?;

    let cars = inventory.list_by_status(status)?;
    println!("{} {} car(s)", cars.len(), status);
    for car in &cars {
        let customer = car
            .customer
            .as_ref()
            .map(|c| format!("  [{} <{}>]", c.full_name, c.email))
            .unwrap_or_default();
        println!(
            "  {}  {} {} ({})  {:.2}{}",
            car.id,
            car.details.make,
            car.details.model,
            car.details.year,
            car.details.price,
            customer
        );
    }
    Ok(())
}
