use chrono::{Datelike, NaiveDate};

use crate::{Error, Result};

/// Encode a calendar date as a sortable integer (`20250131` for 2025-01-31).
///
/// Vector-store metadata filters only support scalar ordering comparisons,
/// so date range predicates are expressed as integer `>=`/`<=` bounds.
pub fn encode(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

/// Decode a `YYYYMMDD` integer back into a calendar date.
pub fn decode(value: i32) -> Result<NaiveDate> {
    let year = value / 10_000;
    let month = (value % 10_000) / 100;
    let day = value % 100;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
        .ok_or_else(|| Error::Validation(format!("not a valid date integer: {}", value)))
}
