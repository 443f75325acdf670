use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use yaml_rust2::YamlLoader;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub server_url: String,
    /// 0 leaves requests without a timeout.
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8010".to_string(),
            request_timeout_secs: 0,
        }
    }
}

pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var("EPORTEM_PANEL_CONFIG") {
        return PathBuf::from(path);
    }

    let config_dir = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|_| PathBuf::from("."));
    config_dir.join("eportem").join("eportem-panel-config.yaml")
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

    let config = Config {
        server_url: doc["server_url"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Missing server_url"))?
            .to_string(),
        request_timeout_secs: match doc["request_timeout_secs"].as_i64() {
            Some(secs) if secs >= 0 => secs as u64,
            Some(secs) => return Err(anyhow::anyhow!("Invalid request_timeout_secs: {secs}")),
            None => 0,
        },
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
