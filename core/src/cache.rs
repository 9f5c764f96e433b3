//! Time-boxed result cache.
//!
//! A single mutex guards the whole map; this is a read-mostly, low-QPS
//! cache and correctness beats throughput here. There is no per-key
//! locking: two concurrent misses for the same key both run the query
//! and both store. Accepted duplicate work, not a bug.
//!
//! Expired entries are purged lazily on the next access of their key;
//! there is no background sweeper, so `stats()` keeps counting them
//! until someone touches or clears them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info};
use serde::Serialize;
use serde_json::Value;

use crate::config::CacheConfig;
use crate::error::ReportResult;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    inserted_at: Instant,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub valid_entries: usize,
    pub expired_entries: usize,
    pub enabled: bool,
    pub default_ttl_secs: u64,
}

struct CacheState {
    entries: HashMap<String, CacheEntry>,
    enabled: bool,
    default_ttl: Duration,
}

/// Thread-safe cache handle. Cloning is cheap and shares the same map.
#[derive(Clone)]
pub struct ResultCache {
    inner: Arc<Mutex<CacheState>>,
}

impl ResultCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                enabled: config.enabled,
                default_ttl: Duration::from_secs(config.default_ttl_secs),
            })),
        }
    }

    /// `None` if the cache is disabled, the key is missing, or the entry
    /// expired (in which case it is deleted on the spot).
    pub fn get(&self, key: &str) -> Option<Value> {
        let mut state = self.lock_state();
        if !state.enabled {
            return None;
        }
        let expired = match state.entries.get(key) {
            None => return None,
            Some(entry) => Instant::now() >= entry.expires_at,
        };
        if expired {
            state.entries.remove(key);
            debug!("cache entry expired: {key}");
            return None;
        }
        debug!("cache hit: {key}");
        state.entries.get(key).map(|e| e.value.clone())
    }

    /// Store `value` under `key` with `ttl` (the cache default when
    /// `None`). No-op while the cache is disabled.
    pub fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let mut state = self.lock_state();
        if !state.enabled {
            return;
        }
        let ttl = ttl.unwrap_or(state.default_ttl);
        let now = Instant::now();
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                inserted_at: now,
                expires_at: now + ttl,
            },
        );
        debug!("cache set: {key} (ttl {}s)", ttl.as_secs());
    }

    /// With a pattern, delete every key containing it as a substring and
    /// return the count removed. Without one, empty the cache and return
    /// its prior size.
    pub fn clear(&self, pattern: Option<&str>) -> usize {
        let mut state = self.lock_state();
        match pattern {
            Some(pattern) => {
                let doomed: Vec<String> = state
                    .entries
                    .keys()
                    .filter(|k| k.contains(pattern))
                    .cloned()
                    .collect();
                for key in &doomed {
                    state.entries.remove(key);
                }
                info!("cache cleared: {} entries matching '{pattern}'", doomed.len());
                doomed.len()
            }
            None => {
                let count = state.entries.len();
                state.entries.clear();
                info!("cache cleared completely: {count} entries");
                count
            }
        }
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock_state();
        let now = Instant::now();
        let valid = state
            .entries
            .values()
            .filter(|e| e.expires_at > now)
            .count();
        CacheStats {
            total_entries: state.entries.len(),
            valid_entries: valid,
            expired_entries: state.entries.len() - valid,
            enabled: state.enabled,
            default_ttl_secs: state.default_ttl.as_secs(),
        }
    }

    pub fn enable(&self) {
        self.lock_state().enabled = true;
        info!("cache enabled");
    }

    pub fn disable(&self) {
        self.lock_state().enabled = false;
        info!("cache disabled");
    }

    /// Affects subsequent `set` calls only; existing entries keep the
    /// TTL they were written with.
    pub fn set_default_ttl(&self, secs: u64) {
        self.lock_state().default_ttl = Duration::from_secs(secs);
        info!("cache default TTL set to {secs}s");
    }

    /// Age of the entry under `key`, for diagnostics.
    pub fn entry_age(&self, key: &str) -> Option<Duration> {
        let state = self.lock_state();
        state.entries.get(key).map(|e| e.inserted_at.elapsed())
    }

    /// Get-or-compute. The lock is held only inside `get` and `set`,
    /// never across `compute` — callers run arbitrarily long queries in
    /// the closure.
    pub fn get_or_compute<F>(
        &self,
        key: &str,
        ttl: Option<Duration>,
        compute: F,
    ) -> ReportResult<Value>
    where
        F: FnOnce() -> ReportResult<Value>,
    {
        if let Some(hit) = self.get(key) {
            return Ok(hit);
        }
        let value = compute()?;
        self.set(key, value.clone(), ttl);
        Ok(value)
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.inner.lock().expect("cache lock poisoned")
    }
}

/// Canonical cache key: `{prefix}:{canonical JSON of params}`.
///
/// The params go through `serde_json::Value`, whose object maps keep
/// keys sorted, so logically identical requests collapse to one slot
/// regardless of field declaration or argument order. Keys stay
/// readable, which is what makes substring invalidation useful.
pub fn cache_key<P: Serialize>(prefix: &str, params: &P) -> ReportResult<String> {
    let canonical = serde_json::to_value(params)?;
    Ok(format!("{prefix}:{}", serde_json::to_string(&canonical)?))
}
