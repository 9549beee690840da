// ABOUTME: ISO-8601 date parsing for the filter language
// ABOUTME: Accepts both dashed and compact YYYYMMDD forms

//! Accepts both `YYYY-MM-DD` and the compact `YYYYMMDD` form, and
//! rejects shapes that match the pattern but aren't valid calendar
//! dates (e.g. `2000-12-32`).

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

fn iso_date_re() -> &'static Regex {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    #[allow(clippy::expect_used)]
    RE.get_or_init(|| Regex::new(r"^(\d{4})-?(\d\d)-?(\d\d)$").ok())
        .as_ref()
        .expect("ISO date pattern is a compile-time constant")
}

/// Parse an ISO-8601 date in either `YYYY-MM-DD` or `YYYYMMDD` form.
///
/// # Errors
///
/// Returns an error if `date_string` doesn't match the shape, or
/// matches but isn't a valid calendar date.
pub fn parse_iso_date(date_string: &str) -> Result<NaiveDate, String> {
    let caps = iso_date_re()
        .captures(date_string)
        .ok_or_else(|| format!("invalid date '{date_string}'"))?;

    let year: i32 = caps[1]
        .parse()
        .map_err(|_| format!("invalid date '{date_string}'"))?;
    let month: u32 = caps[2]
        .parse()
        .map_err(|_| format!("invalid date '{date_string}'"))?;
    let day: u32 = caps[3]
        .parse()
        .map_err(|_| format!("invalid date '{date_string}'"))?;

    NaiveDate::from_ymd_opt(year, month, day).ok_or_else(|| format!("invalid date '{date_string}'"))
}
