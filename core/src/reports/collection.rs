//! Loan collection report, the heaviest query in the catalog (the
//! upstream version is documented as potentially multi-minute).
//!
//! Positions are snapshotted at the prior-month end and at each
//! sub-period end. Collection per sub-period is money in, minus what
//! was already owed at the previous snapshot, minus what newly fell
//! due, floored at zero — the chaining across S1..S4 is the core
//! business algorithm.

use serde_json::Value;

use crate::context::ReportContext;
use crate::dates::month_windows;
use crate::error::ReportResult;
use crate::reducer::{reduce, AgencyRecord, DeriveRule, ReportShape};
use crate::reports::{run_report, PeriodParams};
use crate::store::fetch_rows;

const COLLECTION_SQL: &str = "
    SELECT b.branch_code                   AS code_bureau,
           a.name                          AS agence,
           b.manager_code                  AS gestionnaire,
           b.officer_name                  AS charge_affaire,
           COALESCE(pm.outstanding, 0)     AS sld_m,
           COALESCE(pm1.outstanding, 0)    AS sld_m1,
           COALESCE(ps1.outstanding, 0)    AS sld_s1,
           COALESCE(ps2.outstanding, 0)    AS sld_s2,
           COALESCE(ps3.outstanding, 0)    AS sld_s3,
           COALESCE(ps4.outstanding, 0)    AS sld_s4,
           COALESCE(pm.deposit_state, 0)   AS depot_m,
           COALESCE(pm1.deposit_state, 0)  AS depot_m1,
           COALESCE(ps1.deposit_state, 0)  AS depot_s1,
           COALESCE(ps2.deposit_state, 0)  AS depot_s2,
           COALESCE(ps3.deposit_state, 0)  AS depot_s3,
           COALESCE(ps4.deposit_state, 0)  AS depot_s4,
           COALESCE(pm1.exigible, 0)       AS exigible_m1,
           COALESCE(ps1.exigible, 0)       AS exigible_s1,
           COALESCE(ps2.exigible, 0)       AS exigible_s2,
           COALESCE(ps3.exigible, 0)       AS exigible_s3,
           COALESCE(ps4.exigible, 0)       AS exigible_s4,
           COALESCE(pm.scheduled_due, 0)   AS mt_echeance,
           COALESCE(ps1.scheduled_due, 0)  AS mt_ech_s1,
           COALESCE(ps2.scheduled_due, 0)  AS mt_ech_s2,
           COALESCE(ps3.scheduled_due, 0)  AS mt_ech_s3,
           COALESCE(ps4.scheduled_due, 0)  AS mt_ech_s4
    FROM loan_book b
    JOIN agencies a        ON a.branch_code = b.branch_code
    LEFT JOIN loan_position pm1 ON pm1.account_no = b.account_no AND pm1.as_of = ?1
    LEFT JOIN loan_position ps1 ON ps1.account_no = b.account_no AND ps1.as_of = ?2
    LEFT JOIN loan_position ps2 ON ps2.account_no = b.account_no AND ps2.as_of = ?3
    LEFT JOIN loan_position ps3 ON ps3.account_no = b.account_no AND ps3.as_of = ?4
    LEFT JOIN loan_position ps4 ON ps4.account_no = b.account_no AND ps4.as_of = ?5
    LEFT JOIN loan_position pm  ON pm.account_no  = b.account_no AND pm.as_of  = ?5
    ORDER BY b.branch_code, b.account_no";

/// Merged records without a usable loan-manager code carry no
/// collectable book and are dropped from this report.
fn has_loan_manager(record: &AgencyRecord) -> bool {
    match record.primary_label("gestionnaire") {
        Some(code) => !code.is_empty() && code != "-",
        None => false,
    }
}

fn shape() -> ReportShape {
    ReportShape {
        metrics: &[
            ("sld_m", "sldM"),
            ("sld_m1", "sldM1"),
            ("sld_s1", "sldS1"),
            ("sld_s2", "sldS2"),
            ("sld_s3", "sldS3"),
            ("sld_s4", "sldS4"),
            ("depot_m", "depotM"),
            ("depot_m1", "depotM1"),
            ("depot_s1", "depotS1"),
            ("depot_s2", "depotS2"),
            ("depot_s3", "depotS3"),
            ("depot_s4", "depotS4"),
            ("exigible_m1", "exigibleM1"),
            ("exigible_s1", "exigibleS1"),
            ("exigible_s2", "exigibleS2"),
            ("exigible_s3", "exigibleS3"),
            ("exigible_s4", "exigibleS4"),
            ("mt_echeance", "mtEcheance"),
            ("mt_ech_s1", "mtEchS1"),
            ("mt_ech_s2", "mtEchS2"),
            ("mt_ech_s3", "mtEchS3"),
            ("mt_ech_s4", "mtEchS4"),
        ],
        labels: &[("gestionnaire", "gestionnaire")],
        detail_column: Some("charge_affaire"),
        // Each sub-period's collection references the previous
        // sub-period's exigible.
        derive_rules: vec![
            DeriveRule::FlooredCollection {
                out: "collecteM",
                deposit: "depotM",
                prior_exigible: "exigibleM1",
                scheduled: "mtEchS1",
            },
            DeriveRule::FlooredCollection {
                out: "collecteS1",
                deposit: "depotS1",
                prior_exigible: "exigibleM1",
                scheduled: "mtEchS1",
            },
            DeriveRule::FlooredCollection {
                out: "collecteS2",
                deposit: "depotS2",
                prior_exigible: "exigibleS1",
                scheduled: "mtEchS2",
            },
            DeriveRule::FlooredCollection {
                out: "collecteS3",
                deposit: "depotS3",
                prior_exigible: "exigibleS2",
                scheduled: "mtEchS3",
            },
            DeriveRule::FlooredCollection {
                out: "collecteS4",
                deposit: "depotS4",
                prior_exigible: "exigibleS3",
                scheduled: "mtEchS4",
            },
        ],
        // Totals sum the floored per-agency collections; no re-chaining
        // on the summed bases.
        totals_rules: Vec::new(),
        service_points: false,
        row_filter: Some(has_loan_manager),
        zero_fill_grand_compte: true,
        ..Default::default()
    }
}

pub fn collection_report(ctx: &ReportContext, params: &PeriodParams) -> ReportResult<Value> {
    params.validate()?;
    run_report(ctx, "collection", params, || {
        let windows = month_windows(params.month, params.year)?;
        let [s1, s2, s3, s4] = windows.weeks;
        let conn = ctx.pool.acquire()?;
        let rows = fetch_rows(
            &conn,
            COLLECTION_SQL,
            &[
                &windows.prior.end_iso(),
                &s1.end_iso(),
                &s2.end_iso(),
                &s3.end_iso(),
                &s4.end_iso(),
            ],
        )?;
        let mut result = reduce(&rows, &shape(), &ctx.territories, &ctx.matcher)?;

        let exigible_j1 = result.sum_metric("exigibleM1");
        let a_recouvrer = exigible_j1 + result.sum_metric("mtEcheance");
        result.global.insert("exigibleJ1".to_string(), exigible_j1);
        result
            .global
            .insert("montantARecouvrer".to_string(), a_recouvrer);

        Ok(serde_json::to_value(&result)?)
    })
}
