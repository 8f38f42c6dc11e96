//! Analysis cache commands (status, clear, sweep)

use anyhow::{Context, Result};
use toro_core::{AnalysisCache, SqliteCache};

pub fn cmd_cache_status(cache: &SqliteCache) -> Result<()> {
    let stats = cache.stats().context("Failed to read cache stats")?;

    println!("💾 Analysis cache");
    println!("   Path:       {}", cache.path().display());
    if cache.is_encrypted() {
        println!("   🔒 Encryption: ENABLED");
    } else {
        println!("   Encryption: disabled (set TORO_CACHE_KEY to enable)");
    }
    println!("   TTL:        {}h", cache.ttl().num_hours());
    println!("   Entries:    {}", stats.entries);
    println!("   Expired:    {}", stats.expired);
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        println!("   Oldest:     {}", oldest.format("%Y-%m-%d %H:%M"));
        println!("   Newest:     {}", newest.format("%Y-%m-%d %H:%M"));
    }
    if stats.expired > 0 {
        println!();
        println!("💡 Run `toro cache sweep` to remove expired entries");
    }

    Ok(())
}

/// Remove every entry, returning how many there were
pub fn cmd_cache_clear(cache: &SqliteCache) -> Result<usize> {
    let before = cache.stats().context("Failed to read cache stats")?.entries;
    cache.clear().context("Failed to clear cache")?;
    println!("🗑️  Cleared {} cached result(s)", before);
    Ok(before)
}

/// Remove expired entries, returning how many were removed
pub fn cmd_cache_sweep(cache: &SqliteCache) -> Result<usize> {
    let removed = cache.clean_expired().context("Failed to sweep cache")?;
    if removed == 0 {
        println!("✨ No expired entries");
    } else {
        println!("🧹 Removed {} expired result(s)", removed);
    }
    Ok(removed)
}
