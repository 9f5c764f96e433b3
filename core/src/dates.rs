//! Calendar arithmetic for reporting periods.
//!
//! A reporting month splits into four sub-periods: S1 = 1–7, S2 = 8–14,
//! S3 = 15–21, S4 = 22 to month end. Ends are clamped to the month's
//! last day; when a month is too short for a window's nominal start, the
//! start collapses onto the previous window's end (February never starts
//! S4 on the 29th of a non-leap year).

use chrono::{Datelike, NaiveDate};

use crate::error::{ReportError, ReportResult};

/// Reject obviously malformed parameters before any database work.
pub fn validate_month_year(month: u32, year: i32) -> ReportResult<()> {
    if !(1..=12).contains(&month) {
        return Err(ReportError::Validation(format!(
            "month must be 1-12, got {month}"
        )));
    }
    if !(2000..=2100).contains(&year) {
        return Err(ReportError::Validation(format!(
            "year must be 2000-2100, got {year}"
        )));
    }
    Ok(())
}

/// An inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `YYYY-MM-DD`, the format SQL parameters use.
    pub fn start_iso(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_iso(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }

    /// `DD/MM/YYYY`, the format display parameters use.
    pub fn start_display(&self) -> String {
        self.start.format("%d/%m/%Y").to_string()
    }

    pub fn end_display(&self) -> String {
        self.end.format("%d/%m/%Y").to_string()
    }

    /// `YYYY-MM` of the window's month.
    pub fn period_key(&self) -> String {
        format!("{:04}-{:02}", self.start.year(), self.start.month())
    }
}

/// Current month, prior month, and the four sub-period windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthWindows {
    pub month: DateWindow,
    pub prior: DateWindow,
    pub weeks: [DateWindow; 4],
}

fn last_day_of_month(month: u32, year: i32) -> NaiveDate {
    let (next_month, next_year) = if month == 12 {
        (1, year + 1)
    } else {
        (month + 1, year)
    };
    // Both dates exist for any validated month/year.
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .expect("validated month/year out of range")
}

/// Compute the reporting windows for `month`/`year`.
pub fn month_windows(month: u32, year: i32) -> ReportResult<MonthWindows> {
    validate_month_year(month, year)?;

    let first = NaiveDate::from_ymd_opt(year, month, 1)
        .expect("validated month/year out of range");
    let last = last_day_of_month(month, year);

    let day = |d: u32| NaiveDate::from_ymd_opt(year, month, d);
    let end = |nominal: u32| day(nominal).map_or(last, |d| d.min(last));

    let s1 = DateWindow { start: first, end: end(7) };
    let s2 = DateWindow {
        start: day(8).filter(|d| *d <= last).unwrap_or(s1.end),
        end: end(14),
    };
    let s3 = DateWindow {
        start: day(15).filter(|d| *d <= last).unwrap_or(s2.end),
        end: end(21),
    };
    let s4 = DateWindow {
        start: day(22).filter(|d| *d <= last).unwrap_or(s3.end),
        end: last,
    };

    let (prior_month, prior_year) = if month == 1 {
        (12, year - 1)
    } else {
        (month - 1, year)
    };
    let prior = DateWindow {
        start: NaiveDate::from_ymd_opt(prior_year, prior_month, 1)
            .expect("validated month/year out of range"),
        end: last_day_of_month(prior_month, prior_year),
    };

    Ok(MonthWindows {
        month: DateWindow { start: first, end: last },
        prior,
        weeks: [s1, s2, s3, s4],
    })
}
