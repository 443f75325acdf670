use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use yaml_rust2::YamlLoader;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub bind_address: String,
    pub state_file: String,
    /// Weekly schedule used when there is no usable state file; empty means
    /// the built-in default.
    pub seed_schedule: String,
    /// Program run for each due schedule row; empty means log only.
    pub action_command: String,
    pub check_interval_secs: u64,
    pub syslog: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8010".to_string(),
            state_file: "/var/lib/eportem/state.json".to_string(),
            seed_schedule: String::new(),
            action_command: String::new(),
            check_interval_secs: 30,
            syslog: false,
        }
    }
}

impl Config {
    pub fn action_command(&self) -> Option<&str> {
        Some(self.action_command.trim()).filter(|c| !c.is_empty())
    }

    pub fn seed_schedule(&self) -> Option<&Path> {
        Some(self.seed_schedule.trim())
            .filter(|p| !p.is_empty())
            .map(Path::new)
    }
}

pub fn get_config_path() -> PathBuf {
    std::env::var("EPORTEM_SERVER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/etc/eportem/eportem-server-config.yaml"))
}

pub fn load_config(config_path: &Path) -> Result<Config> {
    if !config_path.exists() {
        return Err(anyhow::anyhow!(
            "Configuration file not found at: {}. Run with 'generate-config' to create it.",
            config_path.display()
        ));
    }

    let config_str = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

    parse_config(&config_str)
}

pub fn parse_config(config_str: &str) -> Result<Config> {
    let docs = YamlLoader::load_from_str(config_str).context("Failed to parse YAML")?;

    if docs.is_empty() {
        return Err(anyhow::anyhow!("Empty configuration file"));
    }

    let doc = &docs[0];
    let defaults = Config::default();

    let config = Config {
        bind_address: doc["bind_address"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing bind_address"))?
            .to_string(),
        state_file: doc["state_file"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing state_file"))?
            .to_string(),
        seed_schedule: doc["seed_schedule"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        action_command: doc["action_command"]
            .as_str()
            .unwrap_or_default()
            .to_string(),
        check_interval_secs: match doc["check_interval_secs"].as_i64() {
            Some(secs) if secs > 0 => secs as u64,
            Some(secs) => return Err(anyhow::anyhow!("Invalid check_interval_secs: {secs}")),
            None => defaults.check_interval_secs,
        },
        syslog: doc["syslog"].as_bool().unwrap_or(defaults.syslog),
    };

    Ok(config)
}

pub fn generate_config(config_path: &Path) -> Result<()> {
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let yaml_content =
        serde_yaml::to_string(&Config::default()).context("Failed to serialize config")?;

    fs::write(config_path, yaml_content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    println!(
        "Generated default configuration at: {}",
        config_path.display()
    );
    Ok(())
}
