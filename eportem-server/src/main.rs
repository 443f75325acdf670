use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eportem_server::config::{generate_config, get_config_path, load_config, Config};
use eportem_server::logging::init_logging;
use eportem_server::scheduler::scheduler_loop;
use eportem_server::state::StateStore;
use eportem_server::{router, AppState};
use log::{error, info};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to $EPORTEM_SERVER_CONFIG or /etc/eportem)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate default configuration file
    GenerateConfig,
    /// Run the server
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(get_config_path);

    match cli.command {
        Some(Commands::GenerateConfig) => generate_config(&config_path),
        Some(Commands::Run) | None => {
            let config = load_config(&config_path)?;
            init_logging(config.syslog)?;

            match run_server(config).await {
                Ok(()) => info!("Server stopped"),
                Err(e) => error!("Server failed: {e:#}"),
            }
            Ok(())
        }
    }
}

async fn run_server(config: Config) -> Result<()> {
    info!("ePortem server starting up");

    let store = StateStore::open(&config.state_file, config.seed_schedule());
    let state = AppState::new(store, config.clone());
    let cancel = CancellationToken::new();

    tokio::spawn(scheduler_loop(state.clone(), cancel.clone()));

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            shutdown.cancel();
        }
    });

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_address))?;

    info!("ePortem server listening on {}", config.bind_address);
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    Ok(())
}
