//! Content-addressed analysis cache
//!
//! Extraction calls are slow and billed, and operators often re-upload the
//! same screenshot. Results are cached by a fingerprint of the compressed
//! image for 24 hours.
//!
//! - `SqliteCache` - durable store used by the CLI
//! - `MemoryCache` - in-process fake for tests and `--no-cache`-less embedding

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::extraction::RawExtractionResult;

mod memory;
mod sqlite;

pub use memory::MemoryCache;
pub use sqlite::{SqliteCache, CACHE_KEY_ENV};

/// Number of leading characters of the encoded image that are hashed
pub const FINGERPRINT_PREFIX_CHARS: usize = 1000;

/// Default entry lifetime
pub fn default_ttl() -> Duration {
    Duration::hours(24)
}

/// Fingerprint an encoded image (data URI or base64 text)
///
/// Only the first 1000 characters are hashed. That covers the data URI
/// header, the image header (which carries the dimensions) and the start of
/// the compressed payload.
pub fn fingerprint(encoded: &str) -> String {
    let prefix: String = encoded.chars().take(FINGERPRINT_PREFIX_CHARS).collect();
    hex::encode(Sha256::digest(prefix.as_bytes()))
}

/// A cached extraction result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub fingerprint: String,
    pub result: RawExtractionResult,
    pub stored_at: DateTime<Utc>,
}

impl CacheEntry {
    /// An entry is expired once it is strictly older than the TTL
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.stored_at > ttl
    }
}

/// Summary for `toro cache status`
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub expired: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Storage for extraction results keyed by fingerprint
///
/// The `*_at` methods take the clock as an argument; the provided methods use
/// the current time.
pub trait AnalysisCache: Send + Sync {
    /// Result for `fingerprint`, deleting it if it has expired
    fn get_at(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<Option<RawExtractionResult>>;

    /// Insert or replace the result for `fingerprint`
    fn set_at(&self, fingerprint: &str, result: &RawExtractionResult, now: DateTime<Utc>)
        -> Result<()>;

    /// Remove every entry
    fn clear(&self) -> Result<()>;

    /// Remove expired entries, returning how many were removed
    fn clean_expired_at(&self, now: DateTime<Utc>) -> Result<usize>;

    fn stats_at(&self, now: DateTime<Utc>) -> Result<CacheStats>;

    /// Entry lifetime
    fn ttl(&self) -> Duration;

    fn get(&self, fingerprint: &str) -> Result<Option<RawExtractionResult>> {
        self.get_at(fingerprint, Utc::now())
    }

    fn set(&self, fingerprint: &str, result: &RawExtractionResult) -> Result<()> {
        self.set_at(fingerprint, result, Utc::now())
    }

    fn clean_expired(&self) -> Result<usize> {
        self.clean_expired_at(Utc::now())
    }

    fn stats(&self) -> Result<CacheStats> {
        self.stats_at(Utc::now())
    }
}
