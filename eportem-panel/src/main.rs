use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eportem_panel::api::HttpApi;
use eportem_panel::config::{generate_config, get_config_path, load_config, Config};
use eportem_panel::gui::run_gui_app;
use eportem_panel::model::{EntryId, FlagKey, FlagUpdate};
use eportem_panel::render::to_text;
use eportem_panel::store::ClientStateStore;
use eportem_panel::ui::UiHandles;
use log::{info, LevelFilter};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to $EPORTEM_PANEL_CONFIG or ~/.config/eportem)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the server URL from the configuration
    #[arg(long, global = true)]
    server_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate default configuration file
    GenerateConfig,

    /// Open the control panel window
    Run,

    /// Print the current settings and schedule
    Status,

    /// Change a setting, e.g. `set location office` or `set slack_enabled false`
    Set { key: String, value: String },

    /// Add a schedule entry
    Add { time: String, action: String },

    /// Flip a schedule entry on or off
    Toggle { id: String },

    /// Delete a schedule entry
    Remove { id: String },
}

enum Headless {
    Status,
    Set(FlagUpdate),
    Add(String, String),
    Toggle(EntryId),
    Remove(EntryId),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.clone().unwrap_or_else(get_config_path);

    let headless = match cli.command.unwrap_or(Commands::Run) {
        Commands::GenerateConfig => return generate_config(&config_path),
        Commands::Run => None,
        Commands::Status => Some(Headless::Status),
        Commands::Set { key, value } => Some(Headless::Set(FlagUpdate::parse(&key, &value)?)),
        Commands::Add { time, action } => Some(Headless::Add(time, action)),
        Commands::Toggle { id } => Some(Headless::Toggle(id.parse()?)),
        Commands::Remove { id } => Some(Headless::Remove(id.parse()?)),
    };

    env_logger::Builder::new()
        .filter_level(if headless.is_some() {
            LevelFilter::Warn
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let mut config = read_config(&config_path)?;
    if let Some(url) = cli.server_url {
        config.server_url = url;
    }

    match headless {
        None => run_gui_app(config),
        Some(command) => run_headless(&config, command),
    }
}

fn read_config(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        info!(
            "No configuration at {}, using defaults",
            path.display()
        );
        Ok(Config::default())
    }
}

fn run_headless(config: &Config, command: Headless) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let store = ClientStateStore::new(
        HttpApi::new(config)?,
        Arc::new(Mutex::new(UiHandles::default())),
    );

    runtime.block_on(async {
        match command {
            Headless::Status => {
                store.fetch_state().await;
            }
            Headless::Set(update) => store.set_flag(update).await,
            Headless::Add(time, action) => store.add_entry(&time, &action).await,
            Headless::Toggle(id) => store.toggle_entry(id).await,
            Headless::Remove(id) => store.remove_entry(id).await,
        }
    });

    let ui = store.ui().lock();
    if let Some(notice) = &ui.notice {
        return Err(anyhow::anyhow!("{notice}"));
    }
    if let Some(status) = &ui.status {
        eprintln!("{status}");
    }

    if ui.last_refresh.is_none() {
        return Err(anyhow::anyhow!(
            "Could not load state from {}",
            config.server_url
        ));
    }

    for key in FlagKey::ALL {
        println!("{:<24} {}", key.label(), ui.settings.describe(key));
    }
    println!();
    print!("{}", to_text(&ui.table));

    Ok(())
}
