//! Loan production reports (count and volume of grants) and the credit
//! outstanding comparison between two arbitrary months.

use serde::Serialize;
use serde_json::Value;

use crate::context::ReportContext;
use crate::dates::{month_windows, validate_month_year};
use crate::error::ReportResult;
use crate::reducer::{reduce, DeriveRule, ReportShape};
use crate::reports::{run_report, PeriodParams};
use crate::store::fetch_rows;

const PRODUCTION_SQL: &str = "
    SELECT a.branch_code AS code_bureau,
           a.name        AS agence,
           COALESCE(SUM(CASE WHEN lp.granted_on BETWEEN ?1 AND ?2
                             THEN lp.loan_count END), 0) AS nombre_m,
           COALESCE(SUM(CASE WHEN lp.granted_on BETWEEN ?3 AND ?4
                             THEN lp.loan_count END), 0) AS nombre_m1,
           COALESCE(SUM(CASE WHEN lp.granted_on BETWEEN ?1 AND ?2
                             THEN lp.amount END), 0)     AS montant_m,
           COALESCE(SUM(CASE WHEN lp.granted_on BETWEEN ?3 AND ?4
                             THEN lp.amount END), 0)     AS montant_m1
    FROM agencies a
    LEFT JOIN loan_production lp ON lp.branch_code = a.branch_code
    GROUP BY a.branch_code, a.name
    ORDER BY a.branch_code";

const ENCOURS_CREDIT_SQL: &str = "
    SELECT a.branch_code AS code_bureau,
           a.name        AS agence,
           COALESCE(SUM(CASE WHEN p.as_of = ?1 THEN p.outstanding END), 0) AS encours_m,
           COALESCE(SUM(CASE WHEN p.as_of = ?2 THEN p.outstanding END), 0) AS encours_m1
    FROM agencies a
    LEFT JOIN loan_book b     ON b.branch_code = a.branch_code
    LEFT JOIN loan_position p ON p.account_no = b.account_no
    GROUP BY a.branch_code, a.name
    ORDER BY a.branch_code";

fn comparison_shape(
    metrics: &'static [(&'static str, &'static str)],
    current: &'static str,
    prior: &'static str,
    variation: &'static str,
    growth: &'static str,
) -> ReportShape {
    ReportShape {
        metrics,
        derive_rules: vec![
            DeriveRule::Difference {
                out: variation,
                minuend: current,
                subtrahend: prior,
            },
            DeriveRule::PercentChange {
                out: growth,
                current,
                prior,
            },
        ],
        totals_rules: vec![DeriveRule::PercentChange {
            out: growth,
            current,
            prior,
        }],
        service_points: true,
        ..Default::default()
    }
}

fn production_report(
    ctx: &ReportContext,
    prefix: &str,
    params: &PeriodParams,
    shape: ReportShape,
) -> ReportResult<Value> {
    params.validate()?;
    run_report(ctx, prefix, params, || {
        let windows = month_windows(params.month, params.year)?;
        let conn = ctx.pool.acquire()?;
        let rows = fetch_rows(
            &conn,
            PRODUCTION_SQL,
            &[
                &windows.month.start_iso(),
                &windows.month.end_iso(),
                &windows.prior.start_iso(),
                &windows.prior.end_iso(),
            ],
        )?;
        let result = reduce(&rows, &shape, &ctx.territories, &ctx.matcher)?;
        Ok(serde_json::to_value(&result)?)
    })
}

/// Number of loans granted, current month against prior month.
pub fn production_nombre_report(
    ctx: &ReportContext,
    params: &PeriodParams,
) -> ReportResult<Value> {
    production_report(
        ctx,
        "production_nombre",
        params,
        comparison_shape(
            &[("nombre_m", "nombreCredits"), ("nombre_m1", "nombreCreditsM1")],
            "nombreCredits",
            "nombreCreditsM1",
            "variationNombre",
            "tauxCroissanceNombre",
        ),
    )
}

/// Amount of loans granted, current month against prior month.
pub fn production_volume_report(
    ctx: &ReportContext,
    params: &PeriodParams,
) -> ReportResult<Value> {
    production_report(
        ctx,
        "production_volume",
        params,
        comparison_shape(
            &[("montant_m", "montantCredits"), ("montant_m1", "montantCreditsM1")],
            "montantCredits",
            "montantCreditsM1",
            "variationMontant",
            "tauxCroissanceMontant",
        ),
    )
}

/// Parameters of the credit-outstanding comparison: any two month/year
/// pairs, not necessarily adjacent.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EncoursCreditParams {
    pub month: u32,
    pub year: i32,
    pub prev_month: u32,
    pub prev_year: i32,
}

impl EncoursCreditParams {
    fn validate(&self) -> ReportResult<()> {
        validate_month_year(self.month, self.year)?;
        validate_month_year(self.prev_month, self.prev_year)
    }
}

/// Credit outstanding at two month ends.
pub fn encours_credit_report(
    ctx: &ReportContext,
    params: &EncoursCreditParams,
) -> ReportResult<Value> {
    params.validate()?;
    run_report(ctx, "encours_credit", params, || {
        let current = month_windows(params.month, params.year)?;
        let previous = month_windows(params.prev_month, params.prev_year)?;
        let shape = comparison_shape(
            &[("encours_m", "encoursM"), ("encours_m1", "encoursM1")],
            "encoursM",
            "encoursM1",
            "variationEncours",
            "tauxCroissanceEncours",
        );
        let conn = ctx.pool.acquire()?;
        let rows = fetch_rows(
            &conn,
            ENCOURS_CREDIT_SQL,
            &[&current.month.end_iso(), &previous.month.end_iso()],
        )?;
        let result = reduce(&rows, &shape, &ctx.territories, &ctx.matcher)?;
        Ok(serde_json::to_value(&result)?)
    })
}
