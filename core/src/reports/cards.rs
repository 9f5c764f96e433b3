//! Prepaid card sales against objectives.
//!
//! `atteinte` (realization rate) and `contribution` (share of the
//! network total) are rate metrics: they are recomputed on territory
//! totals from the summed bases, never summed themselves.

use serde_json::Value;

use crate::context::ReportContext;
use crate::dates::month_windows;
use crate::error::ReportResult;
use crate::reducer::{reduce, DeriveRule, ReportShape};
use crate::reports::{run_report, PeriodParams};
use crate::store::fetch_rows;

const CARDS_SQL: &str = "
    SELECT a.branch_code              AS code_bureau,
           a.name                     AS agence,
           COALESCE(m.objective, 0)   AS objectif,
           COALESCE(m.sold, 0)        AS vendu_m,
           COALESCE(p.sold, 0)        AS vendu_m1
    FROM agencies a
    LEFT JOIN card_sales m ON m.branch_code = a.branch_code AND m.period = ?1
    LEFT JOIN card_sales p ON p.branch_code = a.branch_code AND p.period = ?2
    ORDER BY a.branch_code";

fn shape() -> ReportShape {
    ReportShape {
        metrics: &[
            ("objectif", "objectif"),
            ("vendu_m", "venduM"),
            ("vendu_m1", "venduM1"),
        ],
        derive_rules: vec![
            DeriveRule::Difference {
                out: "variationNombre",
                minuend: "venduM",
                subtrahend: "venduM1",
            },
            DeriveRule::PercentChange {
                out: "variationPourcent",
                current: "venduM",
                prior: "venduM1",
            },
            DeriveRule::Ratio {
                out: "atteinte",
                numerator: "venduM",
                denominator: "objectif",
            },
            DeriveRule::ShareOfTotal {
                out: "contribution",
                metric: "venduM",
            },
        ],
        totals_rules: vec![
            DeriveRule::PercentChange {
                out: "variationPourcent",
                current: "venduM",
                prior: "venduM1",
            },
            DeriveRule::Ratio {
                out: "atteinte",
                numerator: "venduM",
                denominator: "objectif",
            },
            DeriveRule::ShareOfTotal {
                out: "contribution",
                metric: "venduM",
            },
        ],
        service_points: true,
        ..Default::default()
    }
}

pub fn prepaid_cards_report(ctx: &ReportContext, params: &PeriodParams) -> ReportResult<Value> {
    params.validate()?;
    run_report(ctx, "prepaid_cards", params, || {
        let windows = month_windows(params.month, params.year)?;
        let conn = ctx.pool.acquire()?;
        let rows = fetch_rows(
            &conn,
            CARDS_SQL,
            &[&windows.month.period_key(), &windows.prior.period_key()],
        )?;
        let result = reduce(&rows, &shape(), &ctx.territories, &ctx.matcher)?;
        Ok(serde_json::to_value(&result)?)
    })
}
