//! The report catalog.
//!
//! Every report follows the same plumbing: validate parameters → build
//! a deterministic cache key → on miss, acquire a pooled connection,
//! run the report query, reduce the rows into the shared envelope →
//! cache and return. One module per report family.

pub mod cards;
pub mod clients;
pub mod collection;
pub mod deposits;
pub mod performance;
pub mod production;
pub mod transfers;

use std::time::Instant;

use log::info;
use serde::Serialize;
use serde_json::Value;

use crate::cache::cache_key;
use crate::context::ReportContext;
use crate::dates::validate_month_year;
use crate::error::ReportResult;

/// The month/year pair most reports take.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PeriodParams {
    pub month: u32,
    pub year: i32,
}

impl PeriodParams {
    pub fn validate(&self) -> ReportResult<()> {
        validate_month_year(self.month, self.year)
    }
}

/// Shared memoization bracket. The cache lock is only held inside
/// get/set; `compute` (which acquires a connection and may run a
/// multi-minute query) runs outside it.
pub(crate) fn run_report<P, F>(
    ctx: &ReportContext,
    prefix: &str,
    params: &P,
    compute: F,
) -> ReportResult<Value>
where
    P: Serialize,
    F: FnOnce() -> ReportResult<Value>,
{
    let key = cache_key(prefix, params)?;
    ctx.cache.get_or_compute(&key, None, || {
        let started = Instant::now();
        let value = compute()?;
        info!(
            "report '{prefix}' computed in {} ms",
            started.elapsed().as_millis()
        );
        Ok(value)
    })
}
