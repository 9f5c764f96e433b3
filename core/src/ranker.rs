//! Top-N / bottom-N agency rankings over a reduced report.
//!
//! The ranker consumes the serialized envelope (which is what comes
//! back from the cache), walks every agency in the four territories and
//! the service-point bucket, and ranks by a chosen metric. The head
//! office never participates; placeholder names are skipped.

use log::debug;
use serde::Serialize;
use serde_json::Value;

/// One agency with the two metrics the performance report ranks by.
#[derive(Debug, Clone)]
pub struct RankedAgency {
    pub name: String,
    pub nombre: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedNames {
    pub top: Vec<String>,
    pub bottom: Vec<String>,
}

/// The `{top5Nombre, flop5Nombre, top5Volume, flop5Volume}` payload of
/// the agency-performance report.
#[derive(Debug, Clone, Serialize)]
pub struct AgencyPerformance {
    #[serde(rename = "top5Nombre")]
    pub top5_nombre: Vec<String>,
    #[serde(rename = "flop5Nombre")]
    pub flop5_nombre: Vec<String>,
    #[serde(rename = "top5Volume")]
    pub top5_volume: Vec<String>,
    #[serde(rename = "flop5Volume")]
    pub flop5_volume: Vec<String>,
}

fn metric_of(agency: &Value, name: &str) -> f64 {
    agency.get(name).and_then(Value::as_f64).unwrap_or(0.0)
}

fn bucket_agencies(section: Option<&Value>) -> Vec<&Value> {
    let mut out = Vec::new();
    let Some(Value::Object(buckets)) = section else {
        return out;
    };
    for bucket in buckets.values() {
        if let Some(Value::Array(agencies)) = bucket.get("agencies") {
            out.extend(agencies.iter());
        }
    }
    out
}

/// Walk the envelope and pull `(name, nombre, volume)` for every agency
/// in the territories and the service-point bucket. Placeholder names
/// (INCONNU/UNKNOWN) are skipped; the head office is not walked.
pub fn extract_agencies(
    data: &Value,
    nombre_metric: &str,
    volume_metric: &str,
) -> Vec<RankedAgency> {
    let mut agencies = Vec::new();
    let sections = [data.get("TERRITOIRE"), data.get("POINT SERVICES")];
    for section in sections {
        for agency in bucket_agencies(section) {
            let name = agency
                .get("name")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string();
            if name.is_empty() {
                continue;
            }
            let upper = name.to_uppercase();
            if upper == "INCONNU" || upper == "UNKNOWN" {
                continue;
            }
            agencies.push(RankedAgency {
                nombre: metric_of(agency, nombre_metric),
                volume: metric_of(agency, volume_metric),
                name,
            });
        }
    }
    agencies
}

/// Filter to value > 0, stable sort descending (ties keep input order),
/// top = first n, bottom = last n worst-first. Fewer than n qualifiers
/// is not an error: both lists are just shorter, and they overlap when
/// fewer than 2n agencies qualify.
pub fn top_flop<F>(agencies: &[RankedAgency], select: F, n: usize) -> (Vec<String>, Vec<String>)
where
    F: Fn(&RankedAgency) -> f64,
{
    let mut qualified: Vec<&RankedAgency> =
        agencies.iter().filter(|a| select(a) > 0.0).collect();
    qualified.sort_by(|a, b| {
        select(b)
            .partial_cmp(&select(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let top: Vec<String> = qualified
        .iter()
        .take(n)
        .map(|a| a.name.clone())
        .collect();
    let start = qualified.len().saturating_sub(n);
    let mut bottom: Vec<String> = qualified[start..]
        .iter()
        .map(|a| a.name.clone())
        .collect();
    bottom.reverse();
    (top, bottom)
}

/// Rank every agency in `data` by one metric.
pub fn rank(data: &Value, metric: &str, n: usize) -> RankedNames {
    let agencies = extract_agencies(data, metric, metric);
    debug!("ranking {} agencies by {metric}", agencies.len());
    let (top, bottom) = top_flop(&agencies, |a| a.nombre, n);
    RankedNames { top, bottom }
}

/// The number/volume metric pair a performance data type ranks by.
/// Unknown types fall back to the client pair.
pub fn metric_pair(
    data_type: &str,
    collection_tab: Option<&str>,
) -> (&'static str, &'static str) {
    match data_type {
        "collection" => match collection_tab {
            Some("solde") => ("sldM", "sldM"),
            _ => ("collecteM", "mtEcheance"),
        },
        "credit" => ("nombreCredits", "montantCredits"),
        _ => ("nouveauxClientsM", "fraisM"),
    }
}

/// Assemble the agency-performance payload from an already-reduced
/// report envelope.
pub fn agency_performance(
    data: &Value,
    data_type: &str,
    collection_tab: Option<&str>,
    n: usize,
) -> AgencyPerformance {
    let (nombre_metric, volume_metric) = metric_pair(data_type, collection_tab);
    let agencies = extract_agencies(data, nombre_metric, volume_metric);
    let (top5_nombre, flop5_nombre) = top_flop(&agencies, |a| a.nombre, n);
    let (top5_volume, flop5_volume) = top_flop(&agencies, |a| a.volume, n);
    AgencyPerformance {
        top5_nombre,
        flop5_nombre,
        top5_volume,
        flop5_volume,
    }
}
