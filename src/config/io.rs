//! Configuration I/O - Loading configuration
//!
//! Handles reading configuration from files and environment variables.

use std::path::Path;

use super::types::storage::{PostgresConfig, StorageBackendType};
use super::types::provider::OpenRouterConfig;
use super::types::Config;
use crate::error::{Error, Result};
use secrecy::SecretString;

/// Load configuration with layered precedence:
/// 1. Config file (config.json / config.toml) if it exists, otherwise defaults
/// 2. Environment variable overrides (includes .env)
pub fn load_config() -> Result<Config> {
    let config_path = super::paths::config_path();

    let mut config = if config_path.exists() {
        load_config_from_path(&config_path)?
    } else {
        Config::default()
    };

    // Apply environment variable overrides (highest precedence)
    apply_env_overrides(&mut config);

    Ok(config)
}

/// Load configuration from a specific path
pub fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    // Detect format by extension
    let config: Config = if path.extension().map_or(false, |ext| ext == "json") {
        // Parse as JSON5 (more lenient than strict JSON)
        json5::from_str(&content).map_err(|e| Error::Config(format!("Invalid JSON config: {}", e)))?
    } else if path.extension().map_or(false, |ext| ext == "toml") {
        toml::from_str(&content).map_err(|e| Error::Config(format!("Invalid TOML config: {}", e)))?
    } else {
        // Try JSON5 first, then TOML
        json5::from_str(&content)
            .or_else(|_| toml::from_str(&content).map_err(|e| Error::Config(e.to_string())))
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?
    };

    Ok(config)
}

/// Apply environment variable overrides to an existing config.
///
/// Loads `.env` first, then overlays any set environment variables onto
/// the config. Env vars have the highest precedence: defaults < file < env.
pub fn apply_env_overrides(config: &mut Config) {
    dotenvy::dotenv().ok();
    apply_overrides_from(config, |key| std::env::var(key).ok());
}

/// Apply overrides read through `lookup`
pub fn apply_overrides_from(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    // Storage overrides
    if let Some(database_url) = lookup("DATABASE_URL") {
        let pg = config
            .storage
            .postgres
            .get_or_insert_with(|| PostgresConfig::new(String::new()));
        pg.url = SecretString::from(database_url);
    }
    if let Some(max_conn) = lookup("DATABASE_MAX_CONNECTIONS") {
        if let Some(ref mut pg) = config.storage.postgres {
            if let Ok(v) = max_conn.parse() {
                pg.max_connections = v;
            }
        }
    }
    if let Some(timeout) = lookup("DATABASE_TIMEOUT") {
        if let Some(ref mut pg) = config.storage.postgres {
            if let Ok(v) = timeout.parse() {
                pg.connect_timeout_secs = v;
            }
        }
    }
    if let Some(backend) = lookup("MEMORIA_STORAGE") {
        if let Ok(backend) = backend.parse::<StorageBackendType>() {
            config.storage.backend = backend;
        }
    }

    // OpenRouter overrides
    if let Some(api_key) = lookup("OPENROUTER_API_KEY") {
        let or = config
            .provider
            .openrouter
            .get_or_insert_with(|| OpenRouterConfig::new(String::new()));
        or.api_key = SecretString::from(api_key);
    }
    if let Some(model) = lookup("OPENROUTER_MODEL") {
        if let Some(ref mut or) = config.provider.openrouter {
            or.default_model = model;
        }
    }
    if let Some(url) = lookup("OPENROUTER_BASE_URL") {
        if let Some(ref mut or) = config.provider.openrouter {
            or.base_url = url;
        }
    }

    // Engine overrides
    if let Some(threshold) = lookup("MEMORIA_SIMILARITY_THRESHOLD") {
        if let Ok(v) = threshold.parse() {
            config.engine.similarity_threshold = v;
        }
    }
    if let Some(threshold) = lookup("MEMORIA_SEARCH_THRESHOLD") {
        if let Ok(v) = threshold.parse() {
            config.engine.search_threshold = v;
        }
    }

    // Logging overrides
    if let Some(level) = lookup("RUST_LOG") {
        config.log.level = level;
    }
    if let Some(format) = lookup("LOG_FORMAT") {
        if let Ok(format) = format.parse() {
            config.log.format = format;
        }
    }
}
