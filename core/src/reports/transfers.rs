//! Money-transfer report: volumes and commissions per agency, plus a
//! per-service summary (Western Union, RIA, ...) across the network.

use serde_json::{json, Map, Value};

use crate::context::ReportContext;
use crate::dates::month_windows;
use crate::error::ReportResult;
use crate::reducer::{reduce, DeriveRule, ReportShape};
use crate::reports::{run_report, PeriodParams};
use crate::store::fetch_rows;

const TRANSFERS_SQL: &str = "
    SELECT a.branch_code AS code_bureau,
           a.name        AS agence,
           COALESCE(SUM(CASE WHEN t.executed_on BETWEEN ?1 AND ?2
                             THEN t.volume END), 0)     AS volume_m,
           COALESCE(SUM(CASE WHEN t.executed_on BETWEEN ?3 AND ?4
                             THEN t.volume END), 0)     AS volume_m1,
           COALESCE(SUM(CASE WHEN t.executed_on BETWEEN ?1 AND ?2
                             THEN t.commission END), 0) AS commission_m,
           COALESCE(SUM(CASE WHEN t.executed_on BETWEEN ?3 AND ?4
                             THEN t.commission END), 0) AS commission_m1
    FROM agencies a
    LEFT JOIN transfer_operations t ON t.branch_code = a.branch_code
    GROUP BY a.branch_code, a.name
    ORDER BY a.branch_code";

const SERVICES_SQL: &str = "
    SELECT service,
           COALESCE(SUM(volume), 0)     AS volume,
           COALESCE(SUM(commission), 0) AS commission
    FROM transfer_operations
    WHERE executed_on BETWEEN ?1 AND ?2
    GROUP BY service
    ORDER BY service";

fn shape() -> ReportShape {
    ReportShape {
        metrics: &[
            ("volume_m", "volumeM"),
            ("volume_m1", "volumeM1"),
            ("commission_m", "commissionM"),
            ("commission_m1", "commissionM1"),
        ],
        derive_rules: vec![
            DeriveRule::Difference {
                out: "variationVolume",
                minuend: "volumeM",
                subtrahend: "volumeM1",
            },
            DeriveRule::Difference {
                out: "variationCommission",
                minuend: "commissionM",
                subtrahend: "commissionM1",
            },
        ],
        service_points: true,
        ..Default::default()
    }
}

pub fn transfers_report(ctx: &ReportContext, params: &PeriodParams) -> ReportResult<Value> {
    params.validate()?;
    run_report(ctx, "transfers", params, || {
        let windows = month_windows(params.month, params.year)?;
        let conn = ctx.pool.acquire()?;
        let rows = fetch_rows(
            &conn,
            TRANSFERS_SQL,
            &[
                &windows.month.start_iso(),
                &windows.month.end_iso(),
                &windows.prior.start_iso(),
                &windows.prior.end_iso(),
            ],
        )?;
        let result = reduce(&rows, &shape(), &ctx.territories, &ctx.matcher)?;

        // Network-wide summary per transfer service for the current month.
        let service_rows = fetch_rows(
            &conn,
            SERVICES_SQL,
            &[&windows.month.start_iso(), &windows.month.end_iso()],
        )?;
        let mut services = Map::new();
        for row in &service_rows {
            let Some(service) = row.text("service") else { continue };
            services.insert(
                service.to_string(),
                json!({
                    "volume": row.num("volume"),
                    "commission": row.num("commission"),
                }),
            );
        }

        let mut envelope = serde_json::to_value(&result)?;
        if let Some(object) = envelope.as_object_mut() {
            object.insert("services".to_string(), Value::Object(services));
        }
        Ok(envelope)
    })
}
