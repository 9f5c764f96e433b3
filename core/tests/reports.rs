//! End-to-end report tests over the seeded fixture database: each
//! report family runs through the pool, the reducer and the cache, and
//! the envelope is checked against hand-computed expectations.
//!
//! Verified behaviours:
//! 1. Global figures sum every agency including the head office
//! 2. Classification routes the fixtures to all four territories, the
//!    point of service and the default bucket
//! 3. The floored collection chain produces the expected per-branch
//!    figures
//! 4. A second call is served from cache until the entry is cleared
//! 5. Parameter validation fails fast without touching the cache

use rapport_core::config::ReportConfig;
use rapport_core::context::ReportContext;
use rapport_core::error::ReportError;
use rapport_core::reports::deposits::{self, EncoursParams};
use rapport_core::reports::performance::{agency_performance_report, PerformanceParams};
use rapport_core::reports::production::{self, EncoursCreditParams};
use rapport_core::reports::{cards, clients, collection, transfers, PeriodParams};
use rapport_core::store::Store;
use serde_json::Value;

const JUNE: PeriodParams = PeriodParams {
    month: 6,
    year: 2025,
};

/// Context over a seeded shared in-memory database. The returned Store
/// keeps the database alive and lets tests mutate it mid-flight.
fn build(tag: &str) -> (Store, ReportContext) {
    let path = format!("file:reports_{tag}?mode=memory&cache=shared");
    let store = Store::open(&path).expect("open failed");
    store.migrate().expect("migrate failed");
    store.seed_demo().expect("seed failed");

    let mut config = ReportConfig::default_test();
    config.database.path = path;
    (store, ReportContext::with_builtin_map(config))
}

fn agency_in<'a>(data: &'a Value, territory: &str, name: &str) -> &'a Value {
    data["TERRITOIRE"][territory]["agencies"]
        .as_array()
        .unwrap_or_else(|| panic!("no agencies under {territory}"))
        .iter()
        .find(|a| a["name"] == name)
        .unwrap_or_else(|| panic!("{name} not found in {territory}"))
}

fn num(value: &Value, key: &str) -> f64 {
    value[key]
        .as_f64()
        .unwrap_or_else(|| panic!("{key} missing or non-numeric in {value}"))
}

#[test]
fn clients_report_matches_the_fixture_arithmetic() {
    let (_store, ctx) = build("clients");
    let data = clients::clients_report(&ctx, &JUNE).expect("report failed");

    // 42+28+17+9+6+3+5 this month against 35+31+12+11+4+2+7 before.
    let global = &data["globalResult"];
    assert_eq!(num(global, "mois"), 110.0);
    assert_eq!(num(global, "mois1"), 102.0);
    assert_eq!(num(global, "evolution"), 7.84);
    assert_eq!(num(global, "cumulAnnee"), 212.0, "both periods fall in 2025");

    let plateau = agency_in(&data, "territoire_dakar_ville", "AGENCE DAKAR PLATEAU");
    assert_eq!(num(plateau, "nouveauxClientsM"), 42.0);
    assert_eq!(num(plateau, "variationClients"), 7.0);
    assert_eq!(num(plateau, "tauxCroissanceClients"), 20.0);

    // The head office carries its own figures outside the territories.
    assert_eq!(num(&data["grandCompte"], "nouveauxClientsM"), 3.0);

    // Territory totals exclude the head office but include the
    // default-routed branch 099.
    let ville_totals = &data["TERRITOIRE"]["territoire_dakar_ville"]["totals"];
    assert_eq!(num(ville_totals, "nouveauxClientsM"), 47.0);
}

#[test]
fn fixtures_cover_every_classification_path() {
    let (_store, ctx) = build("classify");
    let data = clients::clients_report(&ctx, &JUNE).expect("report failed");

    agency_in(&data, "territoire_dakar_ville", "AGENCE DAKAR PLATEAU");
    agency_in(&data, "territoire_dakar_banlieue", "AGENCE PIKINE");
    agency_in(&data, "territoire_province_centre_sud", "AGENCE THIES");
    agency_in(&data, "territoire_province_nord", "AGENCE SAINT-LOUIS");
    agency_in(&data, "territoire_dakar_ville", "AGENCE FLEUVE GAMBIE");

    let points = data["POINT SERVICES"]["service_points"]["agencies"]
        .as_array()
        .expect("service-point bucket missing");
    assert!(
        points.iter().any(|a| a["name"] == "C-E LIBERTE 6"),
        "C-E LIBERTE 6 should route to the service-point bucket"
    );
}

#[test]
fn collection_report_chains_floored_collections() {
    let (_store, ctx) = build("collection");
    let data = collection::collection_report(&ctx, &JUNE).expect("report failed");

    // exigible at the prior close: 0.3M + 0.6M + 0.9M + 1.2M.
    let global = &data["globalResult"];
    assert_eq!(num(global, "exigibleJ1"), 3_000_000.0);
    assert_eq!(num(global, "montantARecouvrer"), 5_000_000.0);

    // Branch 001: deposit 1.2M at month end, 0.3M owed before, 0.2M
    // newly due in S1.
    let plateau = agency_in(&data, "territoire_dakar_ville", "AGENCE DAKAR PLATEAU");
    assert_eq!(num(plateau, "collecteM"), 700_000.0);
    assert_eq!(num(plateau, "collecteS1"), 400_000.0);
    assert_eq!(num(plateau, "collecteS2"), 500_000.0);
    assert_eq!(plateau["gestionnaire"], Value::from("G01"));

    let officer = &plateau["chargeAffaireDetails"]["A. NDIAYE"];
    assert_eq!(officer["name"], Value::from("A. NDIAYE"));
    assert_eq!(num(officer, "collecteM"), 700_000.0);

    // Territory totals sum the floored per-agency values.
    let ville_totals = &data["TERRITOIRE"]["territoire_dakar_ville"]["totals"];
    assert_eq!(num(ville_totals, "collecteM"), 700_000.0);
    assert_eq!(num(ville_totals, "depotM"), 1_200_000.0);

    // The head office (branch 526) keeps its own floored chain.
    assert_eq!(num(&data["grandCompte"], "collecteM"), 2_800_000.0);
}

#[test]
fn prepaid_cards_report_recomputes_rates_on_totals() {
    let (_store, ctx) = build("cards");
    let data = cards::prepaid_cards_report(&ctx, &JUNE).expect("report failed");

    // 34 sold of 61 network-wide, against a 40-card objective.
    let plateau = agency_in(&data, "territoire_dakar_ville", "AGENCE DAKAR PLATEAU");
    assert_eq!(num(plateau, "venduM"), 34.0);
    assert_eq!(num(plateau, "atteinte"), 85.0);
    assert_eq!(num(plateau, "contribution"), 55.74);

    // Branch 099 has no card sales; its rate in the ville totals must
    // come from the summed bases, so it matches 001 alone.
    let ville_totals = &data["TERRITOIRE"]["territoire_dakar_ville"]["totals"];
    assert_eq!(num(ville_totals, "venduM"), 34.0);
    assert_eq!(num(ville_totals, "atteinte"), 85.0);
    assert_eq!(num(ville_totals, "contribution"), 55.74);
}

#[test]
fn transfers_report_summarizes_per_service() {
    let (_store, ctx) = build("transfers");
    let data = transfers::transfers_report(&ctx, &JUNE).expect("report failed");

    let plateau = agency_in(&data, "territoire_dakar_ville", "AGENCE DAKAR PLATEAU");
    assert_eq!(num(plateau, "volumeM"), 53_000_000.0, "WU + RIA for 001");

    let wu = &data["services"]["WESTERN UNION"];
    assert_eq!(num(wu, "volume"), 60_500_000.0, "001 and 011 combined");
    assert_eq!(num(wu, "commission"), 540_000.0);
    assert!(data["services"]["MONEYGRAM"].is_object());
}

#[test]
fn deposit_reports_compare_month_ends() {
    let (_store, ctx) = build("deposits");

    let data = deposits::encours_report(
        &ctx,
        &EncoursParams {
            month: 6,
            year: 2025,
            account_type: "compte-courant".into(),
        },
    )
    .expect("report failed");
    let plateau = agency_in(&data, "territoire_dakar_ville", "AGENCE DAKAR PLATEAU");
    assert_eq!(num(plateau, "soldeM"), 520_000_000.0);
    assert_eq!(num(plateau, "soldeM1"), 495_000_000.0);
    assert_eq!(num(plateau, "variationSolde"), 25_000_000.0);
    assert_eq!(num(plateau, "tauxCroissanceSolde"), 5.05);

    let dat = deposits::volume_dat_report(&ctx, &JUNE).expect("report failed");
    let plateau = agency_in(&dat, "territoire_dakar_ville", "AGENCE DAKAR PLATEAU");
    assert_eq!(num(plateau, "volumeM"), 520_000_000.0);

    let garantie = deposits::depot_garantie_report(&ctx, &JUNE).expect("report failed");
    let plateau = agency_in(&garantie, "territoire_dakar_ville", "AGENCE DAKAR PLATEAU");
    assert_eq!(num(plateau, "depotGarantieM"), 520_000_000.0);

    let err = deposits::encours_report(
        &ctx,
        &EncoursParams {
            month: 6,
            year: 2025,
            account_type: "foo".into(),
        },
    )
    .expect_err("unknown account type should fail");
    assert!(matches!(err, ReportError::Validation(_)));
}

#[test]
fn production_and_outstanding_credit_reports() {
    let (_store, ctx) = build("production");

    let data = production::production_nombre_report(&ctx, &JUNE).expect("report failed");
    let plateau = agency_in(&data, "territoire_dakar_ville", "AGENCE DAKAR PLATEAU");
    assert_eq!(num(plateau, "nombreCredits"), 12.0);
    assert_eq!(num(plateau, "nombreCreditsM1"), 11.0);
    assert_eq!(num(plateau, "variationNombre"), 1.0);

    let data = production::production_volume_report(&ctx, &JUNE).expect("report failed");
    let plateau = agency_in(&data, "territoire_dakar_ville", "AGENCE DAKAR PLATEAU");
    assert_eq!(num(plateau, "montantCredits"), 96_000_000.0);

    let data = production::encours_credit_report(
        &ctx,
        &EncoursCreditParams {
            month: 6,
            year: 2025,
            prev_month: 5,
            prev_year: 2025,
        },
    )
    .expect("report failed");
    let plateau = agency_in(&data, "territoire_dakar_ville", "AGENCE DAKAR PLATEAU");
    // Outstanding amortizes by 1M per snapshot from 10M at the prior
    // close down to 6M at the June close.
    assert_eq!(num(plateau, "encoursM"), 6_000_000.0);
    assert_eq!(num(plateau, "encoursM1"), 10_000_000.0);
    assert_eq!(num(plateau, "variationEncours"), -4_000_000.0);
}

#[test]
fn performance_report_ranks_the_client_figures() {
    let (_store, ctx) = build("performance");
    let data = agency_performance_report(
        &ctx,
        &PerformanceParams {
            data_type: "client".into(),
            month: 6,
            year: 2025,
            collection_tab: None,
        },
        5,
    )
    .expect("report failed");

    let top: Vec<&str> = data["top5Nombre"]
        .as_array()
        .expect("top5Nombre missing")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert_eq!(
        top,
        vec![
            "AGENCE DAKAR PLATEAU",
            "AGENCE PIKINE",
            "AGENCE THIES",
            "AGENCE SAINT-LOUIS",
            "C-E LIBERTE 6",
        ]
    );
    assert_eq!(data["flop5Nombre"][0], Value::from("AGENCE FLEUVE GAMBIE"));
    assert_eq!(data["top5Volume"][0], Value::from("AGENCE DAKAR PLATEAU"));

    // The underlying clients report was memoized on the way through.
    assert!(ctx.cache_stats().total_entries >= 1);
}

#[test]
fn second_call_is_served_from_cache_until_cleared() {
    let (store, ctx) = build("cache");

    let first = clients::clients_report(&ctx, &JUNE).expect("report failed");

    // Mutate the source data; the cached envelope must not notice.
    store
        .insert_client_activity("001", "2025-06", 100, 2_000_000.0)
        .expect("insert failed");
    let second = clients::clients_report(&ctx, &JUNE).expect("report failed");
    assert_eq!(first, second, "second call must be the cached envelope");

    let removed = ctx.cache_clear(Some("clients"));
    assert!(removed >= 1, "the clients entry should have been cleared");

    let third = clients::clients_report(&ctx, &JUNE).expect("report failed");
    assert_eq!(
        num(&third["globalResult"], "mois"),
        168.0,
        "recomputed from the updated activity (110 - 42 + 100)"
    );
}

#[test]
fn invalid_period_fails_fast_without_caching() {
    let (_store, ctx) = build("validation");

    let err = clients::clients_report(
        &ctx,
        &PeriodParams {
            month: 13,
            year: 2025,
        },
    )
    .expect_err("month 13 should be rejected");
    assert!(matches!(err, ReportError::Validation(_)));
    assert_eq!(ctx.cache_stats().total_entries, 0);
}

#[test]
fn pool_accounting_is_clean_after_a_report_run() {
    let (_store, ctx) = build("pool");

    clients::clients_report(&ctx, &JUNE).expect("report failed");
    collection::collection_report(&ctx, &JUNE).expect("report failed");

    let stats = ctx.pool_stats();
    assert_eq!(stats.overflow_count, 0, "all connections were released");
    assert!(stats.total_created >= 1);
    assert!(stats.idle_available >= 1, "connections returned to the pool");

    ctx.shutdown();
    assert!(ctx.pool.acquire().is_err(), "acquire after shutdown fails");
}
