//! Integration tests for agency ranking over a reduced envelope.
//!
//! Verified behaviours:
//! 1. Top/bottom lists filter to value > 0 and sort stably
//! 2. Placeholder agencies (INCONNU/UNKNOWN) never rank
//! 3. Both territory buckets and the service-point bucket feed the pool
//! 4. The metric pair follows the data type, with a client fallback

use rapport_core::ranker::{
    agency_performance, extract_agencies, metric_pair, rank, top_flop, RankedAgency,
};
use serde_json::{json, Value};

fn agency(name: &str, nombre: f64, volume: f64) -> Value {
    json!({"name": name, "nombreCredits": nombre, "montantCredits": volume})
}

fn envelope(ville: Vec<Value>, service_points: Vec<Value>) -> Value {
    json!({
        "globalResult": {},
        "TERRITOIRE": {
            "territoire_dakar_ville": {"name": "TERRITOIRE DAKAR VILLE", "agencies": ville, "totals": {}},
            "territoire_dakar_banlieue": {"name": "TERRITOIRE DAKAR BANLIEUE", "agencies": [], "totals": {}},
            "territoire_province_centre_sud": {"name": "TERRITOIRE PROVINCE CENTRE SUD", "agencies": [], "totals": {}},
            "territoire_province_nord": {"name": "TERRITOIRE PROVINCE NORD", "agencies": [], "totals": {}}
        },
        "POINT SERVICES": {
            "service_points": {"name": "POINT SERVICES", "agencies": service_points, "totals": {}}
        }
    })
}

fn ranked(pairs: &[(&str, f64)]) -> Vec<RankedAgency> {
    pairs
        .iter()
        .map(|(name, v)| RankedAgency {
            name: name.to_string(),
            nombre: *v,
            volume: *v,
        })
        .collect()
}

#[test]
fn zero_and_negative_values_never_rank() {
    let agencies = ranked(&[("A", 10.0), ("B", 0.0), ("C", 5.0), ("D", -3.0)]);
    let (top, bottom) = top_flop(&agencies, |a| a.nombre, 5);

    assert_eq!(top, vec!["A", "C"], "only positive values qualify");
    assert_eq!(bottom, vec!["C", "A"], "bottom is worst-first");
}

#[test]
fn top_and_bottom_are_disjoint_with_enough_agencies() {
    let agencies = ranked(&[
        ("A", 9.0),
        ("B", 8.0),
        ("C", 7.0),
        ("D", 6.0),
        ("E", 5.0),
        ("F", 4.0),
    ]);
    let (top, bottom) = top_flop(&agencies, |a| a.nombre, 2);
    assert_eq!(top, vec!["A", "B"]);
    assert_eq!(bottom, vec!["F", "E"]);
}

#[test]
fn ties_keep_input_order() {
    let agencies = ranked(&[("FIRST", 5.0), ("SECOND", 5.0), ("THIRD", 5.0)]);
    let (top, _) = top_flop(&agencies, |a| a.nombre, 3);
    assert_eq!(top, vec!["FIRST", "SECOND", "THIRD"], "sort must be stable");
}

#[test]
fn placeholder_agencies_are_skipped() {
    let data = envelope(
        vec![
            agency("AGENCE DAKAR PLATEAU", 10.0, 100.0),
            agency("INCONNU", 99.0, 999.0),
            agency("unknown", 98.0, 998.0),
        ],
        vec![],
    );
    let agencies = extract_agencies(&data, "nombreCredits", "montantCredits");
    assert_eq!(agencies.len(), 1);
    assert_eq!(agencies[0].name, "AGENCE DAKAR PLATEAU");
}

#[test]
fn service_points_rank_alongside_territories() {
    let data = envelope(
        vec![agency("AGENCE DAKAR PLATEAU", 4.0, 40.0)],
        vec![agency("C-E LIBERTE 6", 9.0, 90.0)],
    );
    let names = rank(&data, "nombreCredits", 5);
    assert_eq!(names.top, vec!["C-E LIBERTE 6", "AGENCE DAKAR PLATEAU"]);
}

#[test]
fn missing_metric_reads_as_zero_and_does_not_rank() {
    let data = envelope(
        vec![json!({"name": "AGENCE SANS METRIQUE"})],
        vec![agency("C-E LIBERTE 6", 2.0, 20.0)],
    );
    let names = rank(&data, "nombreCredits", 5);
    assert_eq!(names.top, vec!["C-E LIBERTE 6"]);
}

#[test]
fn metric_pair_follows_the_data_type() {
    assert_eq!(metric_pair("credit", None), ("nombreCredits", "montantCredits"));
    assert_eq!(metric_pair("collection", None), ("collecteM", "mtEcheance"));
    assert_eq!(metric_pair("collection", Some("solde")), ("sldM", "sldM"));
    assert_eq!(
        metric_pair("something-else", None),
        ("nouveauxClientsM", "fraisM"),
        "unknown types fall back to the client pair"
    );
}

#[test]
fn performance_payload_ranks_number_and_volume_independently() {
    // A leads on count, B leads on volume.
    let data = envelope(
        vec![
            agency("AGENCE A", 10.0, 100.0),
            agency("AGENCE B", 3.0, 900.0),
            agency("AGENCE C", 0.0, 0.0),
        ],
        vec![],
    );
    let perf = agency_performance(&data, "credit", None, 5);
    assert_eq!(perf.top5_nombre, vec!["AGENCE A", "AGENCE B"]);
    assert_eq!(perf.flop5_nombre, vec!["AGENCE B", "AGENCE A"]);
    assert_eq!(perf.top5_volume, vec!["AGENCE B", "AGENCE A"]);
    assert_eq!(perf.flop5_volume, vec!["AGENCE A", "AGENCE B"]);

    let value = serde_json::to_value(&perf).expect("serialize failed");
    assert!(value.get("top5Nombre").is_some());
    assert!(value.get("flop5Volume").is_some());
}
