//! Runtime configuration.
//!
//! `DATABASE_URL` comes from the environment. Everything else is read from an
//! optional TOML file: `$DIAGNOSTIC_CONFIG` if set, else `diagnostic.toml` in
//! the working directory. A missing file means defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_ENV: &str = "DIAGNOSTIC_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "diagnostic.toml";

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DatabaseConfig {
    /// Pool size. Default: 5
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
    /// Address for `serve`. Default: 127.0.0.1:8080
    #[serde(default = "default_bind")]
    pub bind: String,
}

fn default_max_connections() -> u32 {
    5
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("invalid config in {}", path.display()))
    }
}

pub fn database_url() -> anyhow::Result<String> {
    std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a production Postgres instance")
}
