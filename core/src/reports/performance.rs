//! Agency-performance report: top/flop rankings derived from another
//! report's output. Reuses the underlying report through the cache, so
//! asking for performance right after a dashboard refresh costs no
//! extra query.

use serde::Serialize;
use serde_json::Value;

use crate::context::ReportContext;
use crate::error::ReportResult;
use crate::ranker;
use crate::reports::{clients, collection, production, PeriodParams};

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceParams {
    pub data_type: String,
    pub month: u32,
    pub year: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_tab: Option<String>,
}

/// `{top5Nombre, flop5Nombre, top5Volume, flop5Volume}` for the chosen
/// data type. Unknown types rank like `client`.
pub fn agency_performance_report(
    ctx: &ReportContext,
    params: &PerformanceParams,
    n: usize,
) -> ReportResult<Value> {
    let period = PeriodParams {
        month: params.month,
        year: params.year,
    };
    let data = match params.data_type.as_str() {
        "collection" => collection::collection_report(ctx, &period)?,
        "credit" => production::production_nombre_report(ctx, &period)?,
        _ => clients::clients_report(ctx, &period)?,
    };
    let ranking = ranker::agency_performance(
        &data,
        &params.data_type,
        params.collection_tab.as_deref(),
        n,
    );
    Ok(serde_json::to_value(&ranking)?)
}
