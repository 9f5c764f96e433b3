//! Deposit-side reports: outstanding balances per account type, term
//! deposits (DAT), and guarantee deposits. All three read the
//! balance-snapshot mart at the current and prior month ends.

use serde::Serialize;
use serde_json::Value;

use crate::context::ReportContext;
use crate::dates::month_windows;
use crate::error::{ReportError, ReportResult};
use crate::reducer::{reduce, DeriveRule, ReportShape};
use crate::reports::{run_report, PeriodParams};
use crate::store::fetch_rows;

const BALANCE_SQL: &str = "
    SELECT a.branch_code AS code_bureau,
           a.name        AS agence,
           COALESCE(SUM(CASE WHEN s.as_of = ?2 THEN s.balance END), 0) AS solde_m,
           COALESCE(SUM(CASE WHEN s.as_of = ?3 THEN s.balance END), 0) AS solde_m1
    FROM agencies a
    LEFT JOIN balance_snapshot s
           ON s.branch_code = a.branch_code AND s.account_type = ?1
    GROUP BY a.branch_code, a.name
    ORDER BY a.branch_code";

/// Account-type variants the outstanding-deposits report accepts.
pub const ENCOURS_TYPES: [&str; 4] = [
    "compte-courant",
    "epargne-simple",
    "epargne-pep-simple",
    "epargne-projet",
];

fn balance_shape(
    current: &'static str,
    prior: &'static str,
    variation: &'static str,
    growth: &'static str,
    metrics: &'static [(&'static str, &'static str)],
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

fn balance_report(
    ctx: &ReportContext,
    prefix: &str,
    params: &impl Serialize,
    month: u32,
    year: i32,
    account_type: &str,
    shape: ReportShape,
) -> ReportResult<Value> {
    run_report(ctx, prefix, params, || {
        let windows = month_windows(month, year)?;
        let conn = ctx.pool.acquire()?;
        let rows = fetch_rows(
            &conn,
            BALANCE_SQL,
            &[
                &account_type,
                &windows.month.end_iso(),
                &windows.prior.end_iso(),
            ],
        )?;
        let result = reduce(&rows, &shape, &ctx.territories, &ctx.matcher)?;
        Ok(serde_json::to_value(&result)?)
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct EncoursParams {
    pub month: u32,
    pub year: i32,
    pub account_type: String,
}

/// Outstanding deposit balances for one account-type family.
pub fn encours_report(ctx: &ReportContext, params: &EncoursParams) -> ReportResult<Value> {
    crate::dates::validate_month_year(params.month, params.year)?;
    if !ENCOURS_TYPES.contains(&params.account_type.as_str()) {
        return Err(ReportError::Validation(format!(
            "unknown encours type '{}', expected one of {:?}",
            params.account_type, ENCOURS_TYPES
        )));
    }
    balance_report(
        ctx,
        "encours",
        params,
        params.month,
        params.year,
        &params.account_type,
        balance_shape(
            "soldeM",
            "soldeM1",
            "variationSolde",
            "tauxCroissanceSolde",
            &[("solde_m", "soldeM"), ("solde_m1", "soldeM1")],
        ),
    )
}

/// Term-deposit (DAT) volumes.
pub fn volume_dat_report(ctx: &ReportContext, params: &PeriodParams) -> ReportResult<Value> {
    params.validate()?;
    balance_report(
        ctx,
        "volume_dat",
        params,
        params.month,
        params.year,
        "dat",
        balance_shape(
            "volumeM",
            "volumeM1",
            "variationVolume",
            "tauxCroissanceVolume",
            &[("solde_m", "volumeM"), ("solde_m1", "volumeM1")],
        ),
    )
}

/// Guarantee deposits held against loans.
pub fn depot_garantie_report(
    ctx: &ReportContext,
    params: &PeriodParams,
) -> ReportResult<Value> {
    params.validate()?;
    balance_report(
        ctx,
        "depot_garantie",
        params,
        params.month,
        params.year,
        "depot-garantie",
        balance_shape(
            "depotGarantieM",
            "depotGarantieM1",
            "variationDepot",
            "tauxCroissanceDepot",
            &[("solde_m", "depotGarantieM"), ("solde_m1", "depotGarantieM1")],
        ),
    )
}
