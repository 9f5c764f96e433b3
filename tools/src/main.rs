//! report-runner: headless runner for the branch-network reports.
//!
//! Usage:
//!   report-runner --db rapport.db --report clients --month 6 --year 2025
//!   report-runner --db :memory: --seed-demo --report all

use anyhow::Result;
use chrono::Datelike;
use rapport_core::{
    config::ReportConfig,
    context::ReportContext,
    reports::{
        cards, clients, collection, deposits, performance, production, transfers,
        PeriodParams,
    },
    store::Store,
};
use std::env;
use std::process::ExitCode;

const REPORT_NAMES: &[&str] = &[
    "clients",
    "collection",
    "production-nombre",
    "production-volume",
    "encours-credit",
    "encours",
    "volume-dat",
    "depot-garantie",
    "transfers",
    "prepaid-cards",
    "performance",
];

fn main() -> Result<ExitCode> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = str_arg(&args, "--db", ":memory:");
    let data_dir = str_arg(&args, "--data-dir", "./data");
    let report = str_arg(&args, "--report", "all");
    let today = chrono::Local::now().date_naive();
    let month: u32 = parse_arg(&args, "--month", today.month());
    let year: i32 = parse_arg(&args, "--year", today.year());
    let top: usize = parse_arg(&args, "--top", 5);
    let seed_demo = args.iter().any(|a| a == "--seed-demo");

    println!("report-runner");
    println!("  db:       {db}");
    println!("  data_dir: {data_dir}");
    println!("  report:   {report}");
    println!("  period:   {month:02}/{year}");
    println!();

    // For :memory: use a SQLite shared-cache URI so the migration
    // connection and every pool connection see one database.
    let db_effective = if db == ":memory:" {
        format!(
            "file:report_run_{}?mode=memory&cache=shared",
            std::process::id()
        )
    } else {
        db.to_string()
    };

    // The migration connection stays open for the whole run; dropping
    // it would discard a shared in-memory database.
    let store = Store::open(&db_effective)?;
    store.migrate()?;
    if seed_demo {
        store.seed_demo()?;
        println!("demo fixtures seeded");
    }

    let mut config = ReportConfig::load(&data_dir)?;
    config.database.path = db_effective;
    let ctx = ReportContext::init(config, &data_dir)?;

    let params = PeriodParams { month, year };
    let selected: Vec<&str> = if report == "all" {
        REPORT_NAMES.to_vec()
    } else if REPORT_NAMES.contains(&report.as_str()) {
        vec![report.as_str()]
    } else {
        eprintln!("unknown report '{report}', expected one of {REPORT_NAMES:?} or 'all'");
        return Ok(ExitCode::FAILURE);
    };

    for name in selected {
        let result = run_one(&ctx, name, &params, top)?;
        println!("── {name} ──");
        println!("{}", serde_json::to_string_pretty(&result)?);
    }

    let pool = ctx.pool_stats();
    let cache = ctx.cache_stats();
    println!();
    println!(
        "pool:  core={} idle={} overflow={} created={}",
        pool.core_size, pool.idle_available, pool.overflow_count, pool.total_created
    );
    println!(
        "cache: total={} valid={} expired={} enabled={} ttl={}s",
        cache.total_entries,
        cache.valid_entries,
        cache.expired_entries,
        cache.enabled,
        cache.default_ttl_secs
    );

    ctx.shutdown();
    Ok(ExitCode::SUCCESS)
}

fn run_one(
    ctx: &ReportContext,
    name: &str,
    params: &PeriodParams,
    top: usize,
) -> Result<serde_json::Value> {
    let (month, year) = (params.month, params.year);
    let value = match name {
        "clients" => clients::clients_report(ctx, params)?,
        "collection" => collection::collection_report(ctx, params)?,
        "production-nombre" => production::production_nombre_report(ctx, params)?,
        "production-volume" => production::production_volume_report(ctx, params)?,
        "encours-credit" => {
            let (prev_month, prev_year) = if month == 1 {
                (12, year - 1)
            } else {
                (month - 1, year)
            };
            production::encours_credit_report(
                ctx,
                &production::EncoursCreditParams {
                    month,
                    year,
                    prev_month,
                    prev_year,
                },
            )?
        }
        "encours" => deposits::encours_report(
            ctx,
            &deposits::EncoursParams {
                month,
                year,
                account_type: "compte-courant".to_string(),
            },
        )?,
        "volume-dat" => deposits::volume_dat_report(ctx, params)?,
        "depot-garantie" => deposits::depot_garantie_report(ctx, params)?,
        "transfers" => transfers::transfers_report(ctx, params)?,
        "prepaid-cards" => cards::prepaid_cards_report(ctx, params)?,
        "performance" => performance::agency_performance_report(
            ctx,
            &performance::PerformanceParams {
                data_type: "client".to_string(),
                month,
                year,
                collection_tab: None,
            },
            top,
        )?,
        other => anyhow::bail!("unknown report '{other}'"),
    };
    Ok(value)
}

fn str_arg(args: &[String], flag: &str, default: &str) -> String {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .unwrap_or_else(|| default.to_string())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
