//! rapport-core — reporting backend for the branch-network dashboard.
//!
//! The library turns large parameterized SQL queries into hierarchical
//! JSON (territory → agency → metrics). The moving parts, leaf to root:
//!
//!   - `pool`      bounded, health-checked SQLite connection pool
//!   - `cache`     process-wide TTL cache memoizing report results
//!   - `reducer`   flat rows → territory/agency hierarchy with derived metrics
//!   - `ranker`    top-N / bottom-N agency rankings over a reduced result
//!   - `reports`   the report catalog wiring the above together
//!
//! RULES:
//!   - No global state. Everything shared lives in a `ReportContext`.
//!   - Report modules never open connections; they acquire from the pool.
//!   - The cache lock is never held across query execution.
//!   - Serialization happens once, at the report boundary, in camelCase.

pub mod cache;
pub mod config;
pub mod context;
pub mod dates;
pub mod error;
pub mod matching;
pub mod pool;
pub mod ranker;
pub mod reducer;
pub mod reports;
pub mod store;
pub mod territory;
