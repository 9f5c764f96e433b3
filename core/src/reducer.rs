//! The row-to-hierarchy reducer shared by every report.
//!
//! PIPELINE (fixed order, never reordered):
//!   1. Seed      — each row becomes identity + metrics + labels.
//!   2. Merge     — seeds sharing a grouping key sum into one record.
//!   3. Filter    — optional report-specific row filter.
//!   4. Derive    — declarative rules computed per record.
//!   5. Classify  — head office, then service point, then territory by
//!                  code, then by name, then the default territory.
//!   6. Totals    — per-bucket sums, computed only after classification
//!                  so they reflect final bucket membership; rate-type
//!                  totals are then recomputed from the summed bases.
//!
//! Every input row lands in exactly one bucket. Unmapped rows fall back
//! to the default territory with a warning — never dropped.

use std::collections::{BTreeMap, HashMap};

use log::{debug, info, warn};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::error::{ReportError, ReportResult};
use crate::matching::ServicePointMatcher;
use crate::store::Row;
use crate::territory::{self, Territory, TerritoryMap, DEFAULT_TERRITORY};

/// Canonical metric name → value. Names are the camelCase identifiers
/// the frontend consumes; missing numerics are normalized to 0 at row
/// ingestion, so `null` never reaches this map.
pub type MetricSet = BTreeMap<String, f64>;

fn metric(metrics: &MetricSet, name: &str) -> f64 {
    metrics.get(name).copied().unwrap_or(0.0)
}

/// Round to two decimals, the precision rate metrics are reported at.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

// ── Derive rules ───────────────────────────────────────────────

/// The declarative vocabulary for per-record derived metrics.
/// Rules are evaluated in order; later rules see earlier outputs.
#[derive(Debug, Clone)]
pub enum DeriveRule {
    /// `out = minuend - subtrahend` (variation).
    Difference {
        out: &'static str,
        minuend: &'static str,
        subtrahend: &'static str,
    },
    /// `(current - prior) / prior * 100` when `prior != 0`, else
    /// exactly 0 — never NaN, never an error.
    PercentChange {
        out: &'static str,
        current: &'static str,
        prior: &'static str,
    },
    /// `numerator / denominator * 100` when the denominator is nonzero,
    /// else 0 (realization rate against an objective).
    Ratio {
        out: &'static str,
        numerator: &'static str,
        denominator: &'static str,
    },
    /// `metric / global_sum(metric) * 100` when the global sum is
    /// positive, else 0 (an agency's contribution).
    ShareOfTotal {
        out: &'static str,
        metric: &'static str,
    },
    /// `max(0, deposit - (prior_exigible + scheduled))` — money in,
    /// minus what was already owed, minus what newly fell due, floored
    /// at zero.
    FlooredCollection {
        out: &'static str,
        deposit: &'static str,
        prior_exigible: &'static str,
        scheduled: &'static str,
    },
}

impl DeriveRule {
    fn out(&self) -> &'static str {
        match self {
            DeriveRule::Difference { out, .. }
            | DeriveRule::PercentChange { out, .. }
            | DeriveRule::Ratio { out, .. }
            | DeriveRule::ShareOfTotal { out, .. }
            | DeriveRule::FlooredCollection { out, .. } => out,
        }
    }
}

/// Apply `rules` in order against `metrics`. `global` carries the
/// pre-derive sums of every base metric across the whole report, for
/// `ShareOfTotal`.
pub fn apply_rules(rules: &[DeriveRule], metrics: &mut MetricSet, global: &MetricSet) {
    for rule in rules {
        let value = match rule {
            DeriveRule::Difference {
                minuend,
                subtrahend,
                ..
            } => metric(metrics, minuend) - metric(metrics, subtrahend),
            DeriveRule::PercentChange { current, prior, .. } => {
                let prior = metric(metrics, prior);
                if prior != 0.0 {
                    round2((metric(metrics, current) - prior) / prior * 100.0)
                } else {
                    0.0
                }
            }
            DeriveRule::Ratio {
                numerator,
                denominator,
                ..
            } => {
                let denominator = metric(metrics, denominator);
                if denominator != 0.0 {
                    round2(metric(metrics, numerator) / denominator * 100.0)
                } else {
                    0.0
                }
            }
            DeriveRule::ShareOfTotal { metric: name, .. } => {
                let total = metric(global, name);
                if total > 0.0 {
                    round2(metric(metrics, name) / total * 100.0)
                } else {
                    0.0
                }
            }
            DeriveRule::FlooredCollection {
                deposit,
                prior_exigible,
                scheduled,
                ..
            } => (metric(metrics, deposit)
                - (metric(metrics, prior_exigible) + metric(metrics, scheduled)))
            .max(0.0),
        };
        metrics.insert(rule.out().to_string(), value);
    }
}

// ── Records and buckets ────────────────────────────────────────

/// One agency after merging. Constructed fresh per report invocation,
/// never mutated after the reducer finishes, never persisted.
#[derive(Debug, Clone, Default)]
pub struct AgencyRecord {
    pub name: String,
    pub branch_code: Option<String>,
    pub metrics: MetricSet,
    /// Label column → every distinct value seen, in row order. The
    /// first entry is the primary (first non-empty wins).
    pub labels: BTreeMap<String, Vec<String>>,
    /// Per-officer metric breakdown (chargé d'affaire), when the report
    /// carries one.
    pub details: BTreeMap<String, MetricSet>,
}

impl AgencyRecord {
    fn new(name: String, branch_code: Option<String>) -> Self {
        Self {
            name,
            branch_code,
            ..Default::default()
        }
    }

    pub fn metric(&self, name: &str) -> f64 {
        metric(&self.metrics, name)
    }

    /// First non-empty value recorded for a label column.
    pub fn primary_label(&self, name: &str) -> Option<&str> {
        self.labels
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    fn absorb(&mut self, other: AgencyRecord) {
        for (name, value) in other.metrics {
            *self.metrics.entry(name).or_insert(0.0) += value;
        }
        for (name, values) in other.labels {
            let list = self.labels.entry(name).or_default();
            for value in values {
                if !list.contains(&value) {
                    list.push(value);
                }
            }
        }
        for (officer, detail) in other.details {
            let mine = self.details.entry(officer).or_default();
            for (name, value) in detail {
                *mine.entry(name).or_insert(0.0) += value;
            }
        }
        if self.branch_code.is_none() {
            self.branch_code = other.branch_code;
        }
    }
}

impl Serialize for AgencyRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("name", &self.name)?;
        if let Some(code) = &self.branch_code {
            map.serialize_entry("branchCode", code)?;
        }
        for (label, values) in &self.labels {
            map.serialize_entry(label, values.first().map_or("", String::as_str))?;
        }
        for (name, value) in &self.metrics {
            map.serialize_entry(name, value)?;
        }
        if !self.details.is_empty() {
            #[derive(Serialize)]
            struct Detail<'a> {
                name: &'a str,
                #[serde(flatten)]
                metrics: &'a MetricSet,
            }
            let details: BTreeMap<&str, Detail<'_>> = self
                .details
                .iter()
                .map(|(officer, metrics)| {
                    (officer.as_str(), Detail { name: officer, metrics })
                })
                .collect();
            map.serialize_entry("chargeAffaireDetails", &details)?;
        }
        map.end()
    }
}

/// A named collection of agencies plus the aggregated totals record.
#[derive(Debug, Clone, Serialize)]
pub struct TerritoryBucket {
    pub name: String,
    pub agencies: Vec<AgencyRecord>,
    pub totals: MetricSet,
}

impl TerritoryBucket {
    fn named(name: String) -> Self {
        Self {
            name,
            agencies: Vec::new(),
            totals: MetricSet::new(),
        }
    }
}

/// Key the synthetic service-point bucket lives under.
pub const SERVICE_POINTS_KEY: &str = "service_points";

/// The output contract every report shares.
#[derive(Debug, Clone, Serialize)]
pub struct HierarchicalResult {
    #[serde(rename = "globalResult", skip_serializing_if = "BTreeMap::is_empty")]
    pub global: MetricSet,
    #[serde(rename = "TERRITOIRE")]
    pub territories: BTreeMap<String, TerritoryBucket>,
    #[serde(rename = "POINT SERVICES")]
    pub service_points: BTreeMap<String, TerritoryBucket>,
    #[serde(rename = "grandCompte", skip_serializing_if = "Option::is_none")]
    pub grand_compte: Option<AgencyRecord>,
}

impl HierarchicalResult {
    fn with_names(names: &BTreeMap<String, String>) -> ReportResult<Self> {
        let mut territories = BTreeMap::new();
        for territory in Territory::all() {
            let display = names.get(territory.key()).ok_or_else(|| {
                ReportError::Reducer {
                    key: territory.key().to_string(),
                }
            })?;
            territories.insert(
                territory.key().to_string(),
                TerritoryBucket::named(display.clone()),
            );
        }
        let mut service_points = BTreeMap::new();
        service_points.insert(
            SERVICE_POINTS_KEY.to_string(),
            TerritoryBucket::named("POINTS SERVICES".to_string()),
        );
        Ok(Self {
            global: MetricSet::new(),
            territories,
            service_points,
            grand_compte: None,
        })
    }

    /// Every agency across territories and service points. The head
    /// office is not included.
    pub fn all_agencies(&self) -> impl Iterator<Item = &AgencyRecord> {
        self.territories
            .values()
            .chain(self.service_points.values())
            .flat_map(|bucket| bucket.agencies.iter())
    }

    /// Sum of a metric across every bucket plus the head office.
    pub fn sum_metric(&self, name: &str) -> f64 {
        let mut total: f64 = self.all_agencies().map(|a| a.metric(name)).sum();
        if let Some(gc) = &self.grand_compte {
            total += gc.metric(name);
        }
        total
    }
}

// ── Report shape ───────────────────────────────────────────────

/// What a report tells the reducer: which columns are metrics, which are
/// labels, how to derive, and which classification extras apply.
pub struct ReportShape {
    /// Column carrying the agency display name.
    pub name_column: &'static str,
    /// Column carrying the branch code (grouping key when present).
    pub code_column: &'static str,
    /// `(column, canonical metric name)` pairs summed during merge.
    pub metrics: &'static [(&'static str, &'static str)],
    /// `(column, output name)` pairs collected as deduplicated lists.
    pub labels: &'static [(&'static str, &'static str)],
    /// Column naming the account officer for the per-officer breakdown.
    pub detail_column: Option<&'static str>,
    pub derive_rules: Vec<DeriveRule>,
    /// Rate-type rules recomputed on bucket totals from the summed
    /// bases, so a territory's rate is not a sum of rates.
    pub totals_rules: Vec<DeriveRule>,
    /// Whether point-of-service extraction applies to this report.
    pub service_points: bool,
    /// Keep a merged record only when this returns true.
    pub row_filter: Option<fn(&AgencyRecord) -> bool>,
    /// Emit a zeroed head-office record when none was found.
    pub zero_fill_grand_compte: bool,
}

impl Default for ReportShape {
    fn default() -> Self {
        Self {
            name_column: "agence",
            code_column: "code_bureau",
            metrics: &[],
            labels: &[],
            detail_column: None,
            derive_rules: Vec::new(),
            totals_rules: Vec::new(),
            service_points: false,
            row_filter: None,
            zero_fill_grand_compte: false,
        }
    }
}

impl ReportShape {
    /// Every metric name the shape can produce, for zero-filling.
    fn output_metrics(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> =
            self.metrics.iter().map(|(_, out)| *out).collect();
        for rule in &self.derive_rules {
            if !names.contains(&rule.out()) {
                names.push(rule.out());
            }
        }
        names
    }
}

// ── The reducer ────────────────────────────────────────────────

fn clean(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|s| !s.is_empty())
}

/// Reduce flat rows into the hierarchical envelope.
pub fn reduce(
    rows: &[Row],
    shape: &ReportShape,
    territories: &TerritoryMap,
    matcher: &ServicePointMatcher,
) -> ReportResult<HierarchicalResult> {
    // Structural validation first: a territory map missing one of the
    // four keys is a fatal configuration error, not a per-row problem.
    let mut result = HierarchicalResult::with_names(territories.display_names())?;

    // Seed + merge. Grouping key is the branch code when present, else
    // a synthetic key from the name. Insertion order is preserved; it
    // decides which value seeds a label list (first non-empty wins).
    let mut order: Vec<String> = Vec::new();
    let mut by_key: HashMap<String, AgencyRecord> = HashMap::new();
    for row in rows {
        let code = clean(row.text(shape.code_column)).map(str::to_string);
        let name = clean(row.text(shape.name_column)).unwrap_or("INCONNU");
        let key = match &code {
            Some(code) => code.clone(),
            None => format!("NO_CODE_{name}"),
        };
        let record = by_key.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            AgencyRecord::new(name.to_string(), code)
        });
        if record.name == "INCONNU" && name != "INCONNU" {
            record.name = name.to_string();
        }
        for (column, out) in shape.metrics {
            *record.metrics.entry(out.to_string()).or_insert(0.0) += row.num(column);
        }
        for (column, out) in shape.labels {
            if let Some(value) = clean(row.text(column)) {
                let list = record.labels.entry(out.to_string()).or_default();
                if !list.iter().any(|v| v == value) {
                    list.push(value.to_string());
                }
            }
        }
        if let Some(column) = shape.detail_column {
            if let Some(officer) = clean(row.text(column)) {
                let detail = record.details.entry(officer.to_string()).or_default();
                for (metric_column, out) in shape.metrics {
                    *detail.entry(out.to_string()).or_insert(0.0) +=
                        row.num(metric_column);
                }
            }
        }
    }
    let mut records: Vec<AgencyRecord> = order
        .iter()
        .filter_map(|key| by_key.remove(key))
        .collect();

    if let Some(keep) = shape.row_filter {
        let before = records.len();
        records.retain(keep);
        if records.len() < before {
            debug!("row filter dropped {} merged records", before - records.len());
        }
    }

    // Pre-derive sums of every base metric, for ShareOfTotal.
    let mut global = MetricSet::new();
    for record in &records {
        for (name, value) in &record.metrics {
            *global.entry(name.clone()).or_insert(0.0) += value;
        }
    }

    for record in &mut records {
        apply_rules(&shape.derive_rules, &mut record.metrics, &global);
        for detail in record.details.values_mut() {
            apply_rules(&shape.derive_rules, detail, &global);
        }
    }

    // Classify, first match wins.
    let mut grand_compte: Option<AgencyRecord> = None;
    let mut grand_compte_merged = 0usize;
    for record in records {
        if territory::is_head_office(&record.name, record.branch_code.as_deref()) {
            grand_compte_merged += 1;
            match &mut grand_compte {
                None => grand_compte = Some(record),
                Some(existing) => existing.absorb(record),
            }
            continue;
        }
        if shape.service_points {
            if let Some((point, kind)) = matcher.match_agency(&record.name) {
                info!(
                    "service point identified: '{}' -> '{point}' ({kind:?})",
                    record.name
                );
                if let Some(bucket) = result.service_points.get_mut(SERVICE_POINTS_KEY) {
                    bucket.agencies.push(record);
                }
                continue;
            }
        }
        let territory = record
            .branch_code
            .as_deref()
            .and_then(|code| territories.territory_from_branch_code(code))
            .or_else(|| territories.territory_from_agency_name(&record.name))
            .unwrap_or_else(|| {
                warn!(
                    "no territory for agency '{}', assigned to {} by default",
                    record.name,
                    DEFAULT_TERRITORY.key()
                );
                DEFAULT_TERRITORY
            });
        if let Some(bucket) = result.territories.get_mut(territory.key()) {
            bucket.agencies.push(record);
        }
    }

    match grand_compte {
        Some(mut gc) => {
            if grand_compte_merged > 1 {
                // Summed derived metrics are meaningless; recompute from
                // the merged bases.
                apply_rules(&shape.derive_rules, &mut gc.metrics, &global);
                for detail in gc.details.values_mut() {
                    apply_rules(&shape.derive_rules, detail, &global);
                }
            }
            if gc.branch_code.is_none() {
                gc.branch_code = Some(territory::HEAD_OFFICE_CODE.to_string());
            }
            info!("head office record extracted: '{}'", gc.name);
            result.grand_compte = Some(gc);
        }
        None if shape.zero_fill_grand_compte => {
            let mut zeroed = AgencyRecord::new(
                "AGENCE GRAND COMPTE".to_string(),
                Some(territory::HEAD_OFFICE_CODE.to_string()),
            );
            for name in shape.output_metrics() {
                zeroed.metrics.insert(name.to_string(), 0.0);
            }
            result.grand_compte = Some(zeroed);
        }
        None => {}
    }

    // Totals only after classification completes, so they reflect final
    // bucket membership.
    for bucket in result
        .territories
        .values_mut()
        .chain(result.service_points.values_mut())
    {
        let mut totals = MetricSet::new();
        for agency in &bucket.agencies {
            for (name, value) in &agency.metrics {
                *totals.entry(name.clone()).or_insert(0.0) += value;
            }
        }
        apply_rules(&shape.totals_rules, &mut totals, &global);
        bucket.totals = totals;
    }

    Ok(result)
}
