use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::server::observer_service::normalize_interval;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse TOML from config file at {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
    #[error("Failed to load config from environment: {0}")]
    Env(#[from] envy::Error),
    #[error("{0} is required")]
    Missing(&'static str),
}

/// Effective configuration, resolved from the environment over an optional TOML file.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub database_url: String,
    pub listen_addr: String,
    /// Base URL agents use to reach this panel, e.g. `http://panel.example:6365`.
    pub panel_addr: Option<String>,
    pub observer_interval_secs: i64,
    pub command_timeout_ms: u64,
    pub log_dir: String,
    pub db_max_connections: u32,
}

// Partial config for layering
#[derive(Deserialize, Default, Debug)]
struct PartialServerConfig {
    database_url: Option<String>,
    listen_addr: Option<String>,
    panel_addr: Option<String>,
    observer_interval_secs: Option<i64>,
    command_timeout_ms: Option<u64>,
    log_dir: Option<String>,
    db_max_connections: Option<u32>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:6365".to_string()
}

fn default_observer_interval_secs() -> i64 {
    60
}

fn default_command_timeout_ms() -> u64 {
    3000
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

impl ServerConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        // 1. Load from file (optional)
        let file_config = match config_path {
            Some(path_str) => read_file_config(path_str)?,
            None => PartialServerConfig::default(),
        };

        // 2. Load from environment variables
        let env_config: PartialServerConfig = envy::from_env::<PartialServerConfig>()?;

        // 3. Merge: environment overrides file
        merge(env_config, file_config)
    }

    pub fn observer_interval(&self) -> Duration {
        normalize_interval(self.observer_interval_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        match self.command_timeout_ms {
            0 => Duration::from_millis(default_command_timeout_ms()),
            ms => Duration::from_millis(ms),
        }
    }
}

fn read_file_config(path_str: &str) -> Result<PartialServerConfig, ConfigError> {
    let path = Path::new(path_str);
    if !path.exists() {
        return Ok(PartialServerConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_str.to_string(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path_str.to_string(),
        source,
    })
}

fn merge(
    env_config: PartialServerConfig,
    file_config: PartialServerConfig,
) -> Result<ServerConfig, ConfigError> {
    Ok(ServerConfig {
        database_url: env_config
            .database_url
            .or(file_config.database_url)
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?,
        listen_addr: env_config
            .listen_addr
            .or(file_config.listen_addr)
            .unwrap_or_else(default_listen_addr),
        panel_addr: env_config
            .panel_addr
            .or(file_config.panel_addr)
            .filter(|addr| !addr.trim().is_empty()),
        observer_interval_secs: env_config
            .observer_interval_secs
            .or(file_config.observer_interval_secs)
            .unwrap_or_else(default_observer_interval_secs),
        command_timeout_ms: env_config
            .command_timeout_ms
            .or(file_config.command_timeout_ms)
            .unwrap_or_else(default_command_timeout_ms),
        log_dir: env_config
            .log_dir
            .or(file_config.log_dir)
            .unwrap_or_else(default_log_dir),
        db_max_connections: env_config
            .db_max_connections
            .or(file_config.db_max_connections)
            .unwrap_or_else(default_db_max_connections),
    })
}
