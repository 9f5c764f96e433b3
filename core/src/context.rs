//! The explicit context object report handlers receive.
//!
//! There are no module-level singletons anywhere in this crate: the
//! pool, the cache, the territory map and the service-point matcher all
//! live here and are passed by reference to every report entry point.
//! Constructing two contexts yields two fully independent stacks.

use log::info;

use crate::cache::{CacheStats, ResultCache};
use crate::config::ReportConfig;
use crate::error::ReportResult;
use crate::matching::ServicePointMatcher;
use crate::pool::{ConnectionPool, PoolStats};
use crate::territory::TerritoryMap;

pub struct ReportContext {
    pub config: ReportConfig,
    pub pool: ConnectionPool,
    pub cache: ResultCache,
    pub territories: TerritoryMap,
    pub matcher: ServicePointMatcher,
}

impl ReportContext {
    /// Wire a context from config plus the data directory holding
    /// `territories.json` (optional, built-in table otherwise).
    pub fn init(config: ReportConfig, data_dir: &str) -> ReportResult<Self> {
        let territories = TerritoryMap::load(data_dir)?;
        Ok(Self::assemble(config, territories))
    }

    /// Context over the built-in territory table; what tests use.
    pub fn with_builtin_map(config: ReportConfig) -> Self {
        Self::assemble(config, TerritoryMap::builtin())
    }

    fn assemble(config: ReportConfig, territories: TerritoryMap) -> Self {
        let matcher = ServicePointMatcher::new(territories.service_point_names());
        let pool = ConnectionPool::new(&config.database, &config.pool);
        let cache = ResultCache::new(&config.cache);
        info!(
            "report context ready: db={}, pool {}+{}, cache {} (ttl {}s)",
            config.database.path,
            config.pool.core_size,
            config.pool.max_overflow,
            if config.cache.enabled { "on" } else { "off" },
            config.cache.default_ttl_secs
        );
        Self {
            config,
            pool,
            cache,
            territories,
            matcher,
        }
    }

    /// Close idle pool connections. In-flight queries finish and their
    /// connections close on release.
    pub fn shutdown(&self) {
        self.pool.close_all();
        info!("report context shut down");
    }

    // ── Cache administration ───────────────────────────────────
    // The HTTP layer that once fronted these is out of scope; they are
    // plain request/response pairs on the context.

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Clear cached results, optionally only keys containing `pattern`.
    /// Returns the number of entries removed.
    pub fn cache_clear(&self, pattern: Option<&str>) -> usize {
        self.cache.clear(pattern)
    }

    pub fn cache_enable(&self) {
        self.cache.enable();
    }

    pub fn cache_disable(&self) {
        self.cache.disable();
    }

    pub fn cache_set_ttl(&self, secs: u64) {
        self.cache.set_default_ttl(secs);
    }
}
