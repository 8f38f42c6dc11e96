//! Configuration loading
//!
//! Settings come from a TOML file. An override in the platform data dir (or an
//! explicit path) wins; otherwise the embedded default is used. Sections and
//! keys missing from an override keep their default values.
//!
//! Environment overrides:
//! - `TORO_EXTRACTION_URL`: scanner endpoint

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Duration as TtlDuration;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::{Category, DraftDefaults};
use crate::preprocess::{OutputFormat, PreprocessOptions};

/// Embedded default configuration
pub const DEFAULT_CONFIG: &str = include_str!("../../../config/toro.toml");

/// Longest accepted cache TTL (ten years); keeps `now - ttl` in range
const MAX_TTL_HOURS: i64 = 24 * 365 * 10;

/// Resolved configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub cache: CacheConfig,
    pub preprocess: PreprocessConfig,
    pub draft: DraftDefaults,
    /// File the configuration was read from (`None` for the embedded default)
    pub source: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionConfig {
    pub url: String,
    /// Request timeout for a single extraction call
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    /// SQLite file; `None` means the default location
    pub path: Option<PathBuf>,
    pub ttl: TtlDuration,
}

impl CacheConfig {
    /// Cache file to open, falling back to the data dir
    pub fn resolved_path(&self) -> Option<PathBuf> {
        self.path.clone().or_else(default_cache_path)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessConfig {
    pub options: PreprocessOptions,
    pub max_upload_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extraction: ExtractionConfig {
                url: "http://localhost:8001/api/v1/scanner/".to_string(),
                timeout: Duration::from_secs(60),
            },
            cache: CacheConfig {
                path: None,
                ttl: TtlDuration::hours(24),
            },
            preprocess: PreprocessConfig {
                options: PreprocessOptions::default(),
                max_upload_bytes: 5 * 1024 * 1024,
            },
            draft: DraftDefaults::default(),
            source: None,
        }
    }
}

impl Config {
    /// Load configuration (explicit path, then data-dir override, then default)
    ///
    /// An explicit path that does not exist is an error; a missing data-dir
    /// override is not.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (content, source) = match path {
            Some(p) => {
                let content = fs::read_to_string(p).map_err(|e| {
                    Error::Config(format!("Failed to read config {}: {}", p.display(), e))
                })?;
                (content, Some(p.to_path_buf()))
            }
            None => match default_config_path().filter(|p| p.exists()) {
                Some(p) => {
                    let content = fs::read_to_string(&p).map_err(|e| {
                        Error::Config(format!("Failed to read config {}: {}", p.display(), e))
                    })?;
                    (content, Some(p))
                }
                None => (DEFAULT_CONFIG.to_string(), None),
            },
        };

        let mut config = parse_config(&content)?;
        config.source = source;
        config.apply_env();
        Ok(config)
    }

    /// The embedded default, without environment overrides
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("TORO_EXTRACTION_URL") {
            if !url.trim().is_empty() {
                self.extraction.url = url.trim().to_string();
            }
        }
    }
}

/// Data-dir override location
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("toro").join("config").join("toro.toml"))
}

/// Default analysis cache file
pub fn default_cache_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("toro").join("analysis_cache.db"))
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    extraction: Option<RawExtraction>,
    cache: Option<RawCache>,
    preprocess: Option<RawPreprocess>,
    draft: Option<RawDraft>,
}

#[derive(Debug, Deserialize)]
struct RawExtraction {
    url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RawCache {
    path: Option<String>,
    ttl_hours: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct RawPreprocess {
    max_width: Option<u32>,
    max_height: Option<u32>,
    quality: Option<f32>,
    format: Option<String>,
    max_upload_mb: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct RawDraft {
    operator: Option<String>,
    currency: Option<String>,
    rate: Option<String>,
    category: Option<String>,
}

/// Parse config from TOML content, applying it on top of the defaults
pub fn parse_config(content: &str) -> Result<Config> {
    let raw: RawConfig = toml::from_str(content)
        .map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))?;

    let mut config = Config::default();

    if let Some(extraction) = raw.extraction {
        if let Some(url) = extraction.url {
            config.extraction.url = url;
        }
        if let Some(secs) = extraction.timeout_secs {
            if secs == 0 {
                return Err(Error::Config(
                    "extraction.timeout_secs must be greater than zero".into(),
                ));
            }
            config.extraction.timeout = Duration::from_secs(secs);
        }
    }

    if let Some(cache) = raw.cache {
        // An empty path means "use the default location"
        config.cache.path = cache
            .path
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        if let Some(hours) = cache.ttl_hours {
            if hours <= 0 || hours > MAX_TTL_HOURS {
                return Err(Error::Config(format!(
                    "cache.ttl_hours must be between 1 and {}, got {}",
                    MAX_TTL_HOURS, hours
                )));
            }
            config.cache.ttl = TtlDuration::try_hours(hours).ok_or_else(|| {
                Error::Config(format!("cache.ttl_hours out of range: {}", hours))
            })?;
        }
    }

    if let Some(pre) = raw.preprocess {
        let options = &mut config.preprocess.options;
        if let Some(w) = pre.max_width {
            options.max_width = w;
        }
        if let Some(h) = pre.max_height {
            options.max_height = h;
        }
        if let Some(q) = pre.quality {
            if !(0.0..=1.0).contains(&q) {
                return Err(Error::Config(format!(
                    "preprocess.quality must be within 0.0..=1.0, got {}",
                    q
                )));
            }
            options.quality = q;
        }
        if let Some(format) = pre.format {
            options.format = format.parse::<OutputFormat>().map_err(Error::Config)?;
        }
        if let Some(mb) = pre.max_upload_mb {
            config.preprocess.max_upload_bytes = mb.checked_mul(1024 * 1024).ok_or_else(|| {
                Error::Config(format!("preprocess.max_upload_mb out of range: {}", mb))
            })?;
        }
    }

    if let Some(draft) = raw.draft {
        if let Some(operator) = draft.operator {
            config.draft.operator = operator;
        }
        if let Some(currency) = draft.currency {
            config.draft.currency = currency;
        }
        if let Some(rate) = draft.rate {
            config.draft.rate = rate;
        }
        if let Some(category) = draft.category {
            config.draft.category = Category::from(category.as_str());
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_config_matches_defaults() {
        let config = Config::embedded().unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse_config(
            r#"
            [extraction]
            timeout_secs = 15

            [draft]
            operator = "Camello_2"
            category = "cambio_divisa"
            "#,
        )
        .unwrap();

        assert_eq!(config.extraction.timeout, Duration::from_secs(15));
        assert_eq!(config.extraction.url, Config::default().extraction.url);
        assert_eq!(config.draft.operator, "Camello_2");
        assert_eq!(config.draft.category, Category::CambioDivisa);
        assert_eq!(config.draft.rate, "36.00");
        assert_eq!(config.preprocess.max_upload_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn test_cache_path() {
        let config = parse_config("[cache]\npath = \"/tmp/toro.db\"\nttl_hours = 2").unwrap();
        assert_eq!(config.cache.path, Some(PathBuf::from("/tmp/toro.db")));
        assert_eq!(config.cache.resolved_path(), Some(PathBuf::from("/tmp/toro.db")));
        assert_eq!(config.cache.ttl, TtlDuration::hours(2));

        let config = parse_config("[cache]\npath = \"\"").unwrap();
        assert_eq!(config.cache.path, None);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            parse_config("[preprocess]\nformat = \"tiff\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[preprocess]\nquality = 1.5"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[extraction]\ntimeout_secs = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(parse_config("not = [toml"), Err(Error::Config(_))));
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        assert!(matches!(
            parse_config("[cache]\nttl_hours = 9223372036854775807"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[preprocess]\nmax_upload_mb = 9000000000000000000"),
            Err(Error::Config(_))
        ));

        let config = parse_config("[cache]\nttl_hours = 720").unwrap();
        assert_eq!(config.cache.ttl, TtlDuration::hours(720));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toro.toml");
        fs::write(&path, "[preprocess]\nmax_width = 640\nformat = \"png\"").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.preprocess.options.max_width, 640);
        assert_eq!(config.preprocess.options.format, OutputFormat::Png);
        assert_eq!(config.source.as_deref(), Some(path.as_path()));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(Config::load(Some(&missing)), Err(Error::Config(_))));
    }
}
