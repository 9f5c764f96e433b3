//! Client acquisition report: new clients and account-opening fees per
//! agency, current month against prior month.

use serde_json::Value;

use crate::context::ReportContext;
use crate::dates::month_windows;
use crate::error::ReportResult;
use crate::reducer::{reduce, round2, DeriveRule, ReportShape};
use crate::reports::{run_report, PeriodParams};
use crate::store::fetch_rows;

const CLIENTS_SQL: &str = "
    SELECT a.branch_code               AS code_bureau,
           a.name                      AS agence,
           COALESCE(m.new_clients, 0)  AS nouveaux_clients_m,
           COALESCE(m.fees, 0)         AS frais_m,
           COALESCE(p.new_clients, 0)  AS nouveaux_clients_m1,
           COALESCE(p.fees, 0)         AS frais_m1
    FROM agencies a
    LEFT JOIN client_activity m
           ON m.branch_code = a.branch_code AND m.period = ?1
    LEFT JOIN client_activity p
           ON p.branch_code = a.branch_code AND p.period = ?2
    ORDER BY a.branch_code";

const CUMUL_SQL: &str = "
    SELECT COALESCE(SUM(new_clients), 0) AS cumul
    FROM client_activity
    WHERE period BETWEEN ?1 AND ?2";

fn shape() -> ReportShape {
    ReportShape {
        metrics: &[
            ("nouveaux_clients_m", "nouveauxClientsM"),
            ("nouveaux_clients_m1", "nouveauxClientsM1"),
            ("frais_m", "fraisM"),
            ("frais_m1", "fraisM1"),
        ],
        derive_rules: vec![
            DeriveRule::Difference {
                out: "variationClients",
                minuend: "nouveauxClientsM",
                subtrahend: "nouveauxClientsM1",
            },
            DeriveRule::PercentChange {
                out: "tauxCroissanceClients",
                current: "nouveauxClientsM",
                prior: "nouveauxClientsM1",
            },
            DeriveRule::Difference {
                out: "variationFrais",
                minuend: "fraisM",
                subtrahend: "fraisM1",
            },
            DeriveRule::PercentChange {
                out: "tauxCroissanceFrais",
                current: "fraisM",
                prior: "fraisM1",
            },
        ],
        totals_rules: vec![
            DeriveRule::PercentChange {
                out: "tauxCroissanceClients",
                current: "nouveauxClientsM",
                prior: "nouveauxClientsM1",
            },
            DeriveRule::PercentChange {
                out: "tauxCroissanceFrais",
                current: "fraisM",
                prior: "fraisM1",
            },
        ],
        service_points: true,
        zero_fill_grand_compte: true,
        ..Default::default()
    }
}

pub fn clients_report(ctx: &ReportContext, params: &PeriodParams) -> ReportResult<Value> {
    params.validate()?;
    run_report(ctx, "clients", params, || {
        let windows = month_windows(params.month, params.year)?;
        let conn = ctx.pool.acquire()?;
        let rows = fetch_rows(
            &conn,
            CLIENTS_SQL,
            &[&windows.month.period_key(), &windows.prior.period_key()],
        )?;
        let mut result = reduce(&rows, &shape(), &ctx.territories, &ctx.matcher)?;

        let mois = result.sum_metric("nouveauxClientsM");
        let mois1 = result.sum_metric("nouveauxClientsM1");
        let evolution = if mois1 > 0.0 {
            round2((mois - mois1) / mois1 * 100.0)
        } else {
            0.0
        };
        let year_start = format!("{:04}-01", params.year);
        let cumul = fetch_rows(
            &conn,
            CUMUL_SQL,
            &[&year_start, &windows.month.period_key()],
        )?
        .first()
        .map_or(0.0, |row| row.num("cumul"));

        result.global.insert("mois".to_string(), mois);
        result.global.insert("mois1".to_string(), mois1);
        result.global.insert("evolution".to_string(), evolution);
        result.global.insert("cumulAnnee".to_string(), cumul);

        Ok(serde_json::to_value(&result)?)
    })
}
