//! Fuzzy name matching for point-of-service detection.
//!
//! Upstream branch names drift in formatting over time ("C-E DAKAR
//! PLATEAU", "CE DAKAR PLATEAU", "DAKAR  PLATEAU"), so exact lookup
//! alone produces false negatives. Matching is one normalization
//! function plus an ordered rule list evaluated short-circuit; the
//! matched rule kind is returned so callers can log which rule fired.

use log::debug;

/// Which rule matched, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    PrefixStripped,
    Substring,
    WordOverlap,
}

/// Trim, uppercase, collapse internal whitespace.
pub fn normalize_name(raw: &str) -> String {
    raw.trim()
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop a leading `C-E` / `CE` token from an already-normalized name.
pub fn strip_ce_prefix(normalized: &str) -> String {
    if let Some(rest) = normalized.strip_prefix("C-E ") {
        rest.to_string()
    } else if let Some(rest) = normalized.strip_prefix("CE ") {
        rest.to_string()
    } else {
        normalized.to_string()
    }
}

/// Words long enough to carry meaning on their own.
fn significant_words(normalized: &str) -> Vec<String> {
    normalized
        .split(' ')
        .filter(|w| w.len() > 3)
        .map(str::to_string)
        .collect()
}

struct RegisteredPoint {
    name: String,
    normalized: String,
    stripped: String,
    significant: Vec<String>,
}

/// Matcher over the registered point-of-service names.
pub struct ServicePointMatcher {
    registered: Vec<RegisteredPoint>,
}

impl ServicePointMatcher {
    pub fn new(names: &[String]) -> Self {
        let registered = names
            .iter()
            .map(|name| {
                let normalized = normalize_name(name);
                let stripped = strip_ce_prefix(&normalized);
                let significant = significant_words(&normalized);
                RegisteredPoint {
                    name: name.clone(),
                    normalized,
                    stripped,
                    significant,
                }
            })
            .collect();
        Self { registered }
    }

    /// First registered point the agency name matches, with the rule
    /// that fired. Rules in precedence order:
    ///
    /// 1. exact equality after normalization;
    /// 2. equality after stripping a leading C-E/CE token;
    /// 3. substring containment either direction, gated on the contained
    ///    side being longer than 5 characters;
    /// 4. significant-word overlap of at least min(2, registered
    ///    significant-word count), never zero.
    pub fn match_agency(&self, agency_name: &str) -> Option<(&str, MatchKind)> {
        let normalized = normalize_name(agency_name);
        if normalized.is_empty() {
            return None;
        }
        let stripped = strip_ce_prefix(&normalized);

        for point in &self.registered {
            if let Some(kind) = match_one(point, &normalized, &stripped) {
                debug!(
                    "service point match: '{agency_name}' -> '{}' via {kind:?}",
                    point.name
                );
                return Some((point.name.as_str(), kind));
            }
        }
        None
    }
}

fn match_one(point: &RegisteredPoint, normalized: &str, stripped: &str) -> Option<MatchKind> {
    if point.normalized == normalized {
        return Some(MatchKind::Exact);
    }
    if point.stripped == stripped {
        return Some(MatchKind::PrefixStripped);
    }
    // Length gate: trivial substrings ("DAKAR" in half the network's
    // names) must not match.
    if (stripped.contains(point.stripped.as_str()) && point.stripped.len() > 5)
        || (point.stripped.contains(stripped) && stripped.len() > 5)
    {
        return Some(MatchKind::Substring);
    }
    // A registered name with no significant words never soft-matches.
    if point.significant.is_empty() {
        return None;
    }
    let shared = point
        .significant
        .iter()
        .filter(|w| normalized.split(' ').any(|a| a == w.as_str()))
        .count();
    let needed = point.significant.len().min(2);
    if shared >= needed {
        return Some(MatchKind::WordOverlap);
    }
    None
}
