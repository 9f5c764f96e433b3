//! Integration tests for reporting-period arithmetic: sub-period
//! windows S1=1–7, S2=8–14, S3=15–21, S4=22–end, with ends clamped to
//! the month and parameter validation up front.

use chrono::NaiveDate;
use rapport_core::dates::{month_windows, validate_month_year};
use rapport_core::error::ReportError;

fn d(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("bad test date")
}

#[test]
fn windows_for_a_thirty_day_month() {
    let w = month_windows(6, 2025).expect("windows failed");

    assert_eq!(w.month.start, d(2025, 6, 1));
    assert_eq!(w.month.end, d(2025, 6, 30));
    assert_eq!(w.weeks[0].start, d(2025, 6, 1));
    assert_eq!(w.weeks[0].end, d(2025, 6, 7));
    assert_eq!(w.weeks[1].start, d(2025, 6, 8));
    assert_eq!(w.weeks[1].end, d(2025, 6, 14));
    assert_eq!(w.weeks[2].start, d(2025, 6, 15));
    assert_eq!(w.weeks[2].end, d(2025, 6, 21));
    assert_eq!(w.weeks[3].start, d(2025, 6, 22));
    assert_eq!(w.weeks[3].end, d(2025, 6, 30), "S4 runs to the month end");

    assert_eq!(w.prior.start, d(2025, 5, 1));
    assert_eq!(w.prior.end, d(2025, 5, 31));
}

#[test]
fn windows_for_february_non_leap() {
    let w = month_windows(2, 2025).expect("windows failed");
    assert_eq!(w.weeks[3].start, d(2025, 2, 22));
    assert_eq!(w.weeks[3].end, d(2025, 2, 28));
    assert_eq!(w.month.end, d(2025, 2, 28));
}

#[test]
fn windows_for_february_leap() {
    let w = month_windows(2, 2024).expect("windows failed");
    assert_eq!(w.weeks[3].end, d(2024, 2, 29));
}

#[test]
fn january_prior_month_crosses_the_year() {
    let w = month_windows(1, 2025).expect("windows failed");
    assert_eq!(w.prior.start, d(2024, 12, 1));
    assert_eq!(w.prior.end, d(2024, 12, 31));
}

#[test]
fn december_month_end_is_the_31st() {
    let w = month_windows(12, 2025).expect("windows failed");
    assert_eq!(w.month.end, d(2025, 12, 31));
}

#[test]
fn formatting_for_sql_and_display() {
    let w = month_windows(6, 2025).expect("windows failed");
    assert_eq!(w.month.start_iso(), "2025-06-01");
    assert_eq!(w.month.end_iso(), "2025-06-30");
    assert_eq!(w.month.start_display(), "01/06/2025");
    assert_eq!(w.month.end_display(), "30/06/2025");
    assert_eq!(w.month.period_key(), "2025-06");
    assert_eq!(w.prior.period_key(), "2025-05");
}

#[test]
fn malformed_parameters_are_rejected_up_front() {
    for (month, year) in [(0u32, 2025i32), (13, 2025), (6, 1999), (6, 2101)] {
        let err = validate_month_year(month, year).expect_err("should reject");
        assert!(
            matches!(err, ReportError::Validation(_)),
            "expected Validation, got {err:?}"
        );
    }
    assert!(validate_month_year(1, 2000).is_ok());
    assert!(validate_month_year(12, 2100).is_ok());
}
