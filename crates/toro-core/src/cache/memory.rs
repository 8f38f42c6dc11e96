//! In-memory analysis cache

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};
use crate::extraction::RawExtractionResult;

use super::{default_ttl, AnalysisCache, CacheEntry, CacheStats};

/// Process-local cache, lost on exit
#[derive(Debug)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::with_ttl(default_ttl())
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::CacheUnavailable("memory cache lock poisoned".into())
}

impl AnalysisCache for MemoryCache {
    fn get_at(&self, fingerprint: &str, now: DateTime<Utc>) -> Result<Option<RawExtractionResult>> {
        // Write lock for the whole lookup so expiry and removal see the same entry
        let mut entries = self.entries.write().map_err(poisoned)?;
        match entries.get(fingerprint) {
            None => Ok(None),
            Some(entry) if !entry.is_expired(now, self.ttl) => Ok(Some(entry.result.clone())),
            Some(_) => {
                entries.remove(fingerprint);
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
        self.entries.write().map_err(poisoned)?.insert(
            fingerprint.to_string(),
            CacheEntry {
                fingerprint: fingerprint.to_string(),
                result: result.clone(),
                stored_at: now,
            },
        );
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.entries.write().map_err(poisoned)?.clear();
        Ok(())
    }

    fn clean_expired_at(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now, self.ttl));
        Ok(before - entries.len())
    }

    fn stats_at(&self, now: DateTime<Utc>) -> Result<CacheStats> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(CacheStats {
            entries: entries.len(),
            expired: entries
                .values()
                .filter(|e| e.is_expired(now, self.ttl))
                .count(),
            oldest: entries.values().map(|e| e.stored_at).min(),
            newest: entries.values().map(|e| e.stored_at).max(),
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

    fn result(amount: f64) -> RawExtractionResult {
        RawExtractionResult {
            amount: Some(Scalar::Number(amount)),
            ..Default::default()
        }
    }

    #[test]
    fn test_get_within_ttl() {
        let cache = MemoryCache::new();
        let t0 = Utc::now();
        cache.set_at("fp", &result(10.0), t0).unwrap();

        let hit = cache.get_at("fp", t0 + Duration::hours(24)).unwrap();
        assert_eq!(hit, Some(result(10.0)));
        assert_eq!(cache.get_at("other", t0).unwrap(), None);
    }

    #[test]
    fn test_expired_entry_is_deleted_on_read() {
        let cache = MemoryCache::new();
        let t0 = Utc::now();
        cache.set_at("fp", &result(10.0), t0).unwrap();

        let later = t0 + Duration::hours(24) + Duration::seconds(1);
        assert_eq!(cache.get_at("fp", later).unwrap(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_set_replaces_and_refreshes() {
        let cache = MemoryCache::new();
        let t0 = Utc::now();
        cache.set_at("fp", &result(1.0), t0).unwrap();
        cache
            .set_at("fp", &result(2.0), t0 + Duration::hours(20))
            .unwrap();

        let hit = cache.get_at("fp", t0 + Duration::hours(30)).unwrap();
        assert_eq!(hit, Some(result(2.0)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clean_expired_counts() {
        let cache = MemoryCache::new();
        let now = Utc::now();
        cache.set_at("old-1", &result(1.0), now - Duration::hours(30)).unwrap();
        cache.set_at("old-2", &result(2.0), now - Duration::hours(25)).unwrap();
        cache.set_at("fresh", &result(3.0), now - Duration::hours(1)).unwrap();

        let stats = cache.stats_at(now).unwrap();
        assert_eq!((stats.entries, stats.expired), (3, 2));

        assert_eq!(cache.clean_expired_at(now).unwrap(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.clean_expired_at(now).unwrap(), 0);

        cache.clear().unwrap();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fresh_set_survives_concurrent_expired_read() {
        let cache = MemoryCache::new();
        let t0 = Utc::now();
        let late = t0 + Duration::hours(48);

        for _ in 0..200 {
            cache.set_at("fp", &result(1.0), t0).unwrap();
            std::thread::scope(|s| {
                for _ in 0..4 {
                    s.spawn(|| {
                        let _ = cache.get_at("fp", late).unwrap();
                    });
                }
                s.spawn(|| cache.set_at("fp", &result(2.0), late).unwrap());
            });
            assert_eq!(cache.get_at("fp", late).unwrap(), Some(result(2.0)));
        }
    }
}
