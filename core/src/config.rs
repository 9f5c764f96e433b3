use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path or URI of the reporting database. `:memory:` is accepted.
    pub path: String,
    /// SQLite page-cache size hint applied at connection open (number of pages).
    pub cache_pages: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of reusable core connections.
    pub core_size: usize,
    /// Extra connections allowed past the core pool; closed on release.
    pub max_overflow: usize,
    /// How long acquire() blocks before failing with PoolExhausted.
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub default_ttl_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub database: DatabaseConfig,
    pub pool: PoolConfig,
    pub cache: CacheConfig,
}

// File shapes: every field optional so a partial config.json is valid.

#[derive(Debug, Clone, Deserialize)]
struct DatabaseFile {
    path: Option<String>,
    cache_pages: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
struct PoolFile {
    core_size: Option<usize>,
    max_overflow: Option<usize>,
    acquire_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct CacheFile {
    enabled: Option<bool>,
    default_ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    database: Option<DatabaseFile>,
    pool: Option<PoolFile>,
    cache: Option<CacheFile>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: "rapport.db".into(),
                cache_pages: 4096,
            },
            pool: PoolConfig {
                core_size: 5,
                max_overflow: 10,
                acquire_timeout_secs: 30,
            },
            cache: CacheConfig {
                enabled: true,
                default_ttl_secs: 300,
            },
        }
    }
}

impl ReportConfig {
    /// Load from `{data_dir}/config.json`, falling back to defaults for any
    /// section or field the file omits. A missing file yields the defaults;
    /// a malformed file is an error.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/config.json");
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(anyhow::anyhow!("Cannot read {path}: {e}")),
        };
        let file: ConfigFile = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;

        let mut config = Self::default();
        if let Some(db) = file.database {
            if let Some(p) = db.path {
                config.database.path = p;
            }
            if let Some(c) = db.cache_pages {
                config.database.cache_pages = c;
            }
        }
        if let Some(pool) = file.pool {
            if let Some(n) = pool.core_size {
                config.pool.core_size = n;
            }
            if let Some(n) = pool.max_overflow {
                config.pool.max_overflow = n;
            }
            if let Some(n) = pool.acquire_timeout_secs {
                config.pool.acquire_timeout_secs = n;
            }
        }
        if let Some(cache) = file.cache {
            if let Some(b) = cache.enabled {
                config.cache.enabled = b;
            }
            if let Some(n) = cache.default_ttl_secs {
                config.cache.default_ttl_secs = n;
            }
        }
        Ok(config)
    }

    /// Config with hardcoded values for use in tests: in-memory database,
    /// small pool, short acquire timeout.
    pub fn default_test() -> Self {
        Self {
            database: DatabaseConfig {
                path: ":memory:".into(),
                cache_pages: 256,
            },
            pool: PoolConfig {
                core_size: 2,
                max_overflow: 2,
                acquire_timeout_secs: 1,
            },
            cache: CacheConfig {
                enabled: true,
                default_ttl_secs: 300,
            },
        }
    }
}
