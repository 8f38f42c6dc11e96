//! Shared command utilities
//!
//! This module contains:
//! - `load_config` - Resolve the configuration file
//! - `open_cache` - Open the SQLite analysis cache
//! - `parse_assignment` - Parse `--set field=value`
//! - `cmd_health` - Probe the extraction service

use std::path::Path;

use anyhow::{bail, Context, Result};
use toro_core::{
    Config, DraftField, ExtractionBackend, ExtractionClient, FieldValue, SqliteCache,
};

/// Load configuration from `path`, the data-dir override, or the built-in default
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).context("Failed to load configuration")
}

/// Open the analysis cache at `override_path` or the configured location
pub fn open_cache(config: &Config, override_path: Option<&Path>) -> Result<SqliteCache> {
    let path = override_path
        .map(Path::to_path_buf)
        .or_else(|| config.cache.resolved_path())
        .context("No cache location available (set [cache] path or pass --cache)")?;

    let cache = SqliteCache::open(&path)
        .with_context(|| format!("Failed to open analysis cache at {}", path.display()))?;
    Ok(cache.with_ttl(config.cache.ttl))
}

/// Parse a `field=value` draft edit
pub fn parse_assignment(s: &str) -> Result<(DraftField, FieldValue)> {
    let Some((field, value)) = s.split_once('=') else {
        bail!("Expected FIELD=VALUE, got '{}'", s);
    };
    let field: DraftField = field.parse().map_err(anyhow::Error::msg)?;
    Ok((field, FieldValue::from(value.trim())))
}

pub fn parse_assignments(items: &[String]) -> Result<Vec<(DraftField, FieldValue)>> {
    items.iter().map(|s| parse_assignment(s)).collect()
}

pub async fn cmd_health(config: &Config) -> Result<()> {
    let client = ExtractionClient::from_config(&config.extraction)
        .context("Failed to set up extraction client")?;

    println!("🔌 Checking extraction service at {}...", client.endpoint());
    if client.health_check().await {
        println!("✅ Extraction service is reachable");
        Ok(())
    } else {
        bail!("Extraction service at {} is not reachable", client.endpoint())
    }
}
