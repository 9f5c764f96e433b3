//! Integration tests for point-of-service fuzzy matching: one
//! normalizer plus ranked rules (exact → prefix-stripped → substring →
//! word overlap), evaluated short-circuit.

use rapport_core::matching::{normalize_name, strip_ce_prefix, MatchKind, ServicePointMatcher};

fn matcher(names: &[&str]) -> ServicePointMatcher {
    let owned: Vec<String> = names.iter().map(|s| s.to_string()).collect();
    ServicePointMatcher::new(&owned)
}

#[test]
fn normalization_collapses_whitespace_and_case() {
    assert_eq!(normalize_name("  c-e   Dakar  plateau "), "C-E DAKAR PLATEAU");
    assert_eq!(strip_ce_prefix("C-E DAKAR PLATEAU"), "DAKAR PLATEAU");
    assert_eq!(strip_ce_prefix("CE DAKAR PLATEAU"), "DAKAR PLATEAU");
    assert_eq!(strip_ce_prefix("DAKAR PLATEAU"), "DAKAR PLATEAU");
}

#[test]
fn exact_match_after_normalization() {
    let m = matcher(&["DAKAR PLATEAU"]);
    let (name, kind) = m.match_agency("dakar   plateau").expect("should match");
    assert_eq!(name, "DAKAR PLATEAU");
    assert_eq!(kind, MatchKind::Exact);
}

#[test]
fn prefix_stripped_match() {
    let m = matcher(&["DAKAR PLATEAU"]);
    let (_, kind) = m.match_agency("C-E DAKAR PLATEAU").expect("should match");
    assert_eq!(kind, MatchKind::PrefixStripped);
}

#[test]
fn short_substring_does_not_match() {
    // "DAKAR" is 5 characters; the substring rule requires the
    // contained side to be longer than 5, and one shared significant
    // word is below the overlap threshold of 2.
    let m = matcher(&["DAKAR PLATEAU"]);
    assert!(m.match_agency("DAKAR").is_none());
}

#[test]
fn long_substring_matches_either_direction() {
    let m = matcher(&["LIBERTE 6"]);
    let (_, kind) = m
        .match_agency("AGENCE LIBERTE 6 EXTENSION")
        .expect("containment should match");
    assert_eq!(kind, MatchKind::Substring);

    let m = matcher(&["AGENCE OUEST FOIRE"]);
    let (_, kind) = m
        .match_agency("OUEST FOIRE")
        .expect("reverse containment should match");
    assert_eq!(kind, MatchKind::Substring);
}

#[test]
fn word_overlap_handles_format_drift() {
    let m = matcher(&["DAKAR PLATEAU CENTRE"]);
    // Shares DAKAR and PLATEAU but reordered and embellished: no exact,
    // no prefix, no substring — the word-overlap rule catches it.
    let (_, kind) = m
        .match_agency("PLATEAU DE DAKAR")
        .expect("two shared significant words should match");
    assert_eq!(kind, MatchKind::WordOverlap);
}

#[test]
fn single_shared_word_is_not_enough() {
    let m = matcher(&["GRAND YOFF VILLAGE"]);
    assert!(m.match_agency("GRAND DAKAR").is_none());
}

#[test]
fn registered_name_without_significant_words_never_soft_matches() {
    let m = matcher(&["A 1"]);
    assert!(m.match_agency("AGENCE A 1 BIS").is_none());
    // But exact still works.
    assert!(m.match_agency("a 1").is_some());
}

#[test]
fn empty_agency_name_matches_nothing() {
    let m = matcher(&["DAKAR PLATEAU"]);
    assert!(m.match_agency("   ").is_none());
}
