//! SQLite-backed analysis cache with connection pooling

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, TimeZone, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::extraction::RawExtractionResult;

use super::{default_ttl, AnalysisCache, CacheStats};

type CachePool = Pool<SqliteConnectionManager>;
type CacheConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable holding the cache encryption passphrase
pub const CACHE_KEY_ENV: &str = "TORO_CACHE_KEY";

/// Derive an encryption key from a passphrase using Argon2
///
/// The salt is fixed so the same passphrase opens the cache wherever the file
/// is moved.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted cache
    const APP_SALT: &[u8; 16] = b"toro-cache-v1-sl";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let output = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(output.as_bytes()))
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
}

/// Durable analysis cache
#[derive(Clone)]
pub struct SqliteCache {
    pool: CachePool,
    path: PathBuf,
    ttl: Duration,
    encrypted: bool,
}

impl SqliteCache {
    /// Open (or create) the cache, encrypting it when `TORO_CACHE_KEY` is set
    pub fn open(path: &Path) -> Result<Self> {
        let key = std::env::var(CACHE_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty());
        Self::open_with_key(path, key.as_deref())
    }

    /// Open (or create) the cache with an explicit passphrase
    pub fn open_with_key(path: &Path, passphrase: Option<&str>) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::CacheUnavailable(format!(
                    "Cannot create cache directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let manager = SqliteConnectionManager::file(path);
        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // The key must be set on every new pooled connection
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                Ok(())
            });
            Pool::builder().max_size(4).build(manager)?
        } else {
            Pool::builder().max_size(4).build(manager)?
        };

        let cache = Self {
            pool,
            path: path.to_path_buf(),
            ttl: default_ttl(),
            encrypted: passphrase.is_some(),
        };
        cache.run_migrations()?;
        debug!(path = %path.display(), encrypted = cache.encrypted, "Opened analysis cache");

        Ok(cache)
    }

    /// Cache in a fresh temporary file (for testing)
    ///
    /// SQLCipher does not cope with `:memory:` databases in a pool.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir().join(format!(
            "toro_cache_test_{}_{}.db",
            std::process::id(),
            id
        ));
        let _ = std::fs::remove_file(&path);

        Self::open_with_key(&path, None)
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    fn conn(&self) -> Result<CacheConn> {
        Ok(self.pool.get()?)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            -- WAL: readers don't block the writer storing a fresh result
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            CREATE TABLE IF NOT EXISTS analysis_cache (
                fingerprint TEXT PRIMARY KEY,
                result_json TEXT NOT NULL,
                stored_at INTEGER NOT NULL  -- Unix millis
            );

            CREATE INDEX IF NOT EXISTS idx_analysis_cache_stored_at
                ON analysis_cache(stored_at);
            "#,
        )?;
        Ok(())
    }

    fn delete(&self, conn: &CacheConn, fingerprint: &str) -> Result<()> {
        conn.execute(
            "DELETE FROM analysis_cache WHERE fingerprint = ?",
            params![fingerprint],
        )?;
        Ok(())
    }
}

impl AnalysisCache for SqliteCache {
    fn get_at(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<Option<RawExtractionResult>> {
        let conn = self.conn()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT result_json, stored_at FROM analysis_cache WHERE fingerprint = ?",
                params![fingerprint],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((json, stored_at)) = row else {
            return Ok(None);
        };

        // Compared at the stored millisecond precision
        if to_millis(now) - stored_at > self.ttl.num_milliseconds() {
            debug!(fingerprint = %fingerprint, "Cache entry expired, deleting");
            self.delete(&conn, fingerprint)?;
            return Ok(None);
        }

        match serde_json::from_str(&json) {
            Ok(result) => Ok(Some(result)),
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "Dropping unreadable cache entry");
                self.delete(&conn, fingerprint)?;
                Ok(None)
            }
        }
    }

    fn set_at(
        &self,
        fingerprint: &str,
        result: &RawExtractionResult,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let json = serde_json::to_string(result)?;
        let conn = self.conn()?;
        conn.execute(
            r#"
            INSERT INTO analysis_cache (fingerprint, result_json, stored_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(fingerprint) DO UPDATE SET
                result_json = excluded.result_json,
                stored_at = excluded.stored_at
            "#,
            params![fingerprint, json, to_millis(now)],
        )?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM analysis_cache", [])?;
        info!(removed, "Cleared analysis cache");
        Ok(())
    }

    fn clean_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = to_millis(now - self.ttl);
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM analysis_cache WHERE stored_at < ?",
            params![cutoff],
        )?;
        if removed > 0 {
            info!(removed, "Swept expired cache entries");
        }
        Ok(removed)
    }

    fn stats_at(&self, now: DateTime<Utc>) -> Result<CacheStats> {
        let cutoff = to_millis(now - self.ttl);
        let conn = self.conn()?;
        let (entries, expired, oldest, newest): (i64, i64, Option<i64>, Option<i64>) = conn
            .query_row(
                r#"
                SELECT COUNT(*),
                       COALESCE(SUM(CASE WHEN stored_at < ?1 THEN 1 ELSE 0 END), 0),
                       MIN(stored_at),
                       MAX(stored_at)
                FROM analysis_cache
                "#,
                params![cutoff],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        Ok(CacheStats {
            entries: entries as usize,
            expired: expired as usize,
            oldest: oldest.map(from_millis),
            newest: newest.map(from_millis),
        })
    }

    fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::Scalar;

    fn zelle() -> RawExtractionResult {
        RawExtractionResult {
            amount: Some(Scalar::Number(1250.0)),
            currency: Some("USD".into()),
            platform: Some("ZELLE".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_round_trip_through_sqlite() {
        let cache = SqliteCache::in_memory().unwrap();
        let now = Utc::now();
        cache.set_at("fp", &zelle(), now).unwrap();
        assert_eq!(cache.get_at("fp", now).unwrap(), Some(zelle()));
        assert_eq!(cache.get_at("missing", now).unwrap(), None);
    }

    #[test]
    fn test_ttl_boundary() {
        let cache = SqliteCache::in_memory().unwrap();
        let t0 = Utc::now();
        cache.set_at("fp", &zelle(), t0).unwrap();

        // Exactly 24h old is still served
        assert!(cache.get_at("fp", t0 + Duration::hours(24)).unwrap().is_some());

        let past = t0 + Duration::hours(24) + Duration::milliseconds(1);
        assert_eq!(cache.get_at("fp", past).unwrap(), None);
        // Expired read deleted the row
        assert_eq!(cache.stats_at(t0).unwrap().entries, 0);
    }

    #[test]
    fn test_ttl_boundary_with_sub_millisecond_timestamp() {
        let cache = SqliteCache::in_memory().unwrap();
        let t0 = Utc.timestamp_opt(1_700_000_000, 500_000).unwrap();
        cache.set_at("fp", &zelle(), t0).unwrap();

        assert!(cache.get_at("fp", t0 + Duration::hours(24)).unwrap().is_some());
        let past = t0 + Duration::hours(24) + Duration::milliseconds(1);
        assert_eq!(cache.get_at("fp", past).unwrap(), None);
    }

    #[test]
    fn test_upsert_keeps_one_row() {
        let cache = SqliteCache::in_memory().unwrap();
        let t0 = Utc::now();
        cache.set_at("fp", &RawExtractionResult::default(), t0).unwrap();
        cache.set_at("fp", &zelle(), t0 + Duration::hours(1)).unwrap();

        let stats = cache.stats_at(t0 + Duration::hours(1)).unwrap();
        assert_eq!(stats.entries, 1);
        assert_eq!(cache.get_at("fp", t0).unwrap(), Some(zelle()));
    }

    #[test]
    fn test_clean_expired_and_clear() {
        let cache = SqliteCache::in_memory().unwrap();
        let now = Utc::now();
        cache.set_at("a", &zelle(), now - Duration::hours(48)).unwrap();
        cache.set_at("b", &zelle(), now - Duration::hours(25)).unwrap();
        cache.set_at("c", &zelle(), now).unwrap();

        let stats = cache.stats_at(now).unwrap();
        assert_eq!((stats.entries, stats.expired), (3, 2));

        assert_eq!(cache.clean_expired_at(now).unwrap(), 2);
        assert!(cache.get_at("c", now).unwrap().is_some());

        cache.clear().unwrap();
        assert_eq!(cache.stats_at(now).unwrap(), CacheStats::default());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.db");
        let now = Utc::now();

        {
            let cache = SqliteCache::open_with_key(&path, None).unwrap();
            cache.set_at("fp", &zelle(), now).unwrap();
        }

        let reopened = SqliteCache::open_with_key(&path, None).unwrap();
        assert_eq!(reopened.get_at("fp", now).unwrap(), Some(zelle()));
        assert!(!reopened.is_encrypted());
    }

    #[test]
    fn test_custom_ttl() {
        let cache = SqliteCache::in_memory()
            .unwrap()
            .with_ttl(Duration::minutes(5));
        let t0 = Utc::now();
        cache.set_at("fp", &zelle(), t0).unwrap();
        assert_eq!(cache.get_at("fp", t0 + Duration::minutes(6)).unwrap(), None);
    }

    #[test]
    fn test_derive_key_is_deterministic() {
        let a = derive_key("hunter2").unwrap();
        assert_eq!(a, derive_key("hunter2").unwrap());
        assert_ne!(a, derive_key("hunter3").unwrap());
    }
}
