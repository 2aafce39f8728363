//! Pattern-based date formatting and parsing for range pickers and exports.
//!
//! Patterns use the tokens `YYYY`, `MM`, `DD`, `HH`, `mm` and `ss`; the
//! names `api` and `ISO` produce an ISO 8601 timestamp. Dates are naive
//! local times; `api` output labels them as UTC without converting.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{
    DateTime, Datelike, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
    Timelike,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::warn;

pub const DEFAULT_DATE_FORMAT: &str = "YYYY-MM-DD";
pub const DEFAULT_DATETIME_FORMAT: &str = "YYYY-MM-DD HH:mm:ss";
pub const DEFAULT_RANGE_SEPARATOR: &str = " - ";
pub const US_DATE_FORMAT: &str = "MM/DD/YYYY";

static DAY_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/\-](\d{1,2})[/\-](\d{4})$").expect("static regex"));
static YEAR_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})[/\-](\d{1,2})[/\-](\d{1,2})$").expect("static regex"));

const ISO_LAYOUTS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Anything that can stand in for a date argument.
pub trait IntoDate {
    fn into_date(self) -> Option<NaiveDateTime>;
}

impl IntoDate for NaiveDateTime {
    fn into_date(self) -> Option<NaiveDateTime> {
        Some(self)
    }
}

impl IntoDate for NaiveDate {
    fn into_date(self) -> Option<NaiveDateTime> {
        Some(start_of_day(self))
    }
}

impl IntoDate for &str {
    fn into_date(self) -> Option<NaiveDateTime> {
        parse_date(self, None)
    }
}

impl IntoDate for &String {
    fn into_date(self) -> Option<NaiveDateTime> {
        parse_date(self, None)
    }
}

impl IntoDate for String {
    fn into_date(self) -> Option<NaiveDateTime> {
        parse_date(&self, None)
    }
}

/// Milliseconds since the Unix epoch, read in the local timezone.
impl IntoDate for i64 {
    fn into_date(self) -> Option<NaiveDateTime> {
        Local
            .timestamp_millis_opt(self)
            .single()
            .map(|d| d.naive_local())
    }
}

impl<T: IntoDate> IntoDate for Option<T> {
    fn into_date(self) -> Option<NaiveDateTime> {
        self.and_then(IntoDate::into_date)
    }
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    // Wraps to 23:59:59.999.
    date.and_time(NaiveTime::MIN - Duration::milliseconds(1))
}

/// Formats `date` with `pattern`; an unusable date yields an empty string.
pub fn format(date: impl IntoDate, pattern: &str) -> String {
    match date.into_date() {
        Some(d) => format_datetime(&d, pattern),
        None => String::new(),
    }
}

pub fn format_datetime(d: &NaiveDateTime, pattern: &str) -> String {
    match pattern {
        "api" | "ISO" => d.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        _ => pattern
            .replacen("YYYY", &format!("{:04}", d.year()), 1)
            .replacen("MM", &format!("{:02}", d.month()), 1)
            .replacen("DD", &format!("{:02}", d.day()), 1)
            .replacen("HH", &format!("{:02}", d.hour()), 1)
            .replacen("mm", &format!("{:02}", d.minute()), 1)
            .replacen("ss", &format!("{:02}", d.second()), 1),
    }
}

fn leading_int(s: &str) -> Option<u32> {
    let digits: String = s.chars().take_while(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// `HH[:mm[:ss]]`, missing parts default to zero.
fn parse_time(s: &str) -> Option<NaiveTime> {
    if s.is_empty() {
        return Some(NaiveTime::MIN);
    }
    let mut parts = s.split(':');
    let hours = leading_int(parts.next()?)?;
    let minutes = parts.next().map_or(Some(0), leading_int)?;
    let seconds = parts.next().map_or(Some(0), leading_int)?;
    NaiveTime::from_hms_opt(hours, minutes, seconds)
}

fn captures_u32(caps: &regex::Captures<'_>, index: usize) -> Option<u32> {
    caps.get(index)?.as_str().parse().ok()
}

fn ymd(year: u32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(i32::try_from(year).ok()?, month, day)
}

/// Parses a date typed by a user or produced by a range picker.
///
/// Accepted, in order: ISO `YYYY-MM-DD` with optional time or RFC 3339
/// offset, then `DD/MM/YYYY` or `DD-MM-YYYY`, then `YYYY/MM/DD`. Passing
/// `Some("MM/DD/YYYY")` reads slash dates month first instead. A time part
/// may follow after a space or `T`. Impossible calendar dates yield `None`.
pub fn parse_date(text: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if text.contains('-') && text.len() >= 10 {
        if let Ok(d) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Some(start_of_day(d));
        }
        for layout in ISO_LAYOUTS {
            if let Ok(d) = NaiveDateTime::parse_from_str(text, layout) {
                return Some(d);
            }
        }
        if let Ok(d) = DateTime::parse_from_rfc3339(text) {
            return Some(d.naive_utc());
        }
    }

    let mut parts = text
        .split(|c: char| c.is_whitespace() || c == 'T')
        .filter(|p| !p.is_empty());
    let date_part = parts.next()?;
    let time = parse_time(parts.next().unwrap_or(""))?;

    if let Some(caps) = DAY_FIRST.captures(date_part) {
        let (first, second) = (captures_u32(&caps, 1)?, captures_u32(&caps, 2)?);
        let year = captures_u32(&caps, 3)?;
        let date = if format == Some(US_DATE_FORMAT) {
            ymd(year, first, second)?
        } else {
            ymd(year, second, first)?
        };
        return Some(date.and_time(time));
    }

    if let Some(caps) = YEAR_FIRST.captures(date_part) {
        let date = ymd(
            captures_u32(&caps, 1)?,
            captures_u32(&caps, 2)?,
            captures_u32(&caps, 3)?,
        )?;
        return Some(date.and_time(time));
    }

    None
}

pub fn is_valid(text: &str, format: Option<&str>) -> bool {
    parse_date(text, format).is_some()
}

/// A range string split into its two ends.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub start_str: String,
    pub end_str: String,
}

/// Splits `"01/12/2024 - 31/12/2024"` on `separator` and parses each side.
///
/// Anything other than exactly two parts yields an empty range.
pub fn parse_range(range: &str, separator: &str, format: Option<&str>) -> DateRange {
    let parts: Vec<&str> = range.split(separator).collect();
    let [start, end] = parts.as_slice() else {
        return DateRange::default();
    };
    let (start_str, end_str) = (start.trim(), end.trim());
    let parsed = DateRange {
        start: parse_date(start_str, format),
        end: parse_date(end_str, format),
        start_str: start_str.to_string(),
        end_str: end_str.to_string(),
    };
    if parsed.start.is_none() || parsed.end.is_none() {
        warn!(range, "could not parse date range");
    }
    parsed
}

#[derive(Clone, Debug)]
pub struct ApiRangeOptions {
    pub format: String,
    pub start_key: String,
    pub end_key: String,
    /// Switches a bare `YYYY-MM-DD` format to `YYYY-MM-DD HH:mm:ss`.
    pub include_time: bool,
    pub start_of_day: bool,
    pub end_of_day: bool,
}

impl Default for ApiRangeOptions {
    fn default() -> Self {
        Self {
            format: DEFAULT_DATE_FORMAT.into(),
            start_key: "startDate".into(),
            end_key: "endDate".into(),
            include_time: false,
            start_of_day: true,
            end_of_day: true,
        }
    }
}

/// Formats a range as request parameters, e.g.
/// `{"endDate": "2024-12-31", "startDate": "2024-12-01"}`. Missing ends
/// become empty strings.
pub fn format_range_for_api(
    start: impl IntoDate,
    end: impl IntoDate,
    options: &ApiRangeOptions,
) -> BTreeMap<String, String> {
    let mut start = start.into_date();
    let mut end = end.into_date();
    if options.start_of_day {
        start = start.map(|d| start_of_day(d.date()));
    }
    if options.end_of_day {
        end = end.map(|d| end_of_day(d.date()));
    }
    let pattern = if options.include_time {
        options.format.replace(DEFAULT_DATE_FORMAT, DEFAULT_DATETIME_FORMAT)
    } else {
        options.format.clone()
    };
    BTreeMap::from([
        (options.start_key.clone(), format(start, &pattern)),
        (options.end_key.clone(), format(end, &pattern)),
    ])
}

pub fn parse_and_format(
    range: &str,
    separator: &str,
    options: &ApiRangeOptions,
) -> BTreeMap<String, String> {
    let parsed = parse_range(range, separator, None);
    format_range_for_api(parsed.start, parsed.end, options)
}

pub fn now_local() -> NaiveDateTime {
    Local::now().naive_local()
}

pub fn today(pattern: &str) -> String {
    format_datetime(&now_local(), pattern)
}

pub fn now(pattern: &str) -> String {
    format_datetime(&now_local(), pattern)
}

pub fn add_days(date: impl IntoDate, days: i64) -> Option<NaiveDateTime> {
    date.into_date()?.checked_add_signed(Duration::days(days))
}

/// Month arithmetic clamps to the last day of the target month, so
/// 31 January plus one month is 29 February in a leap year.
pub fn add_months(date: impl IntoDate, months: i32) -> Option<NaiveDateTime> {
    let d = date.into_date()?;
    let delta = Months::new(months.unsigned_abs());
    if months >= 0 {
        d.checked_add_months(delta)
    } else {
        d.checked_sub_months(delta)
    }
}

pub fn start_of_month(date: impl IntoDate) -> Option<NaiveDateTime> {
    let d = date.into_date()?;
    Some(start_of_day(d.date().with_day(1)?))
}

pub fn end_of_month(date: impl IntoDate) -> Option<NaiveDateTime> {
    let first = start_of_month(date)?;
    let next = first.checked_add_months(Months::new(1))?;
    Some(end_of_day(next.date().pred_opt()?))
}

/// Monday of the week containing `date`, at midnight.
pub fn start_of_week(date: impl IntoDate) -> Option<NaiveDateTime> {
    let d = date.into_date()?.date();
    let back = i64::from(d.weekday().num_days_from_monday());
    Some(start_of_day(d - Duration::days(back)))
}

/// Sunday of the week containing `date`, at 23:59:59.999.
pub fn end_of_week(date: impl IntoDate) -> Option<NaiveDateTime> {
    let monday = start_of_week(date)?.date();
    Some(end_of_day(monday + Duration::days(6)))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PresetRange {
    pub label: &'static str,
    pub start: String,
    pub end: String,
}

/// Common picker presets relative to `today`, formatted with `pattern`.
pub fn preset_ranges_at(today: NaiveDateTime, pattern: &str) -> Vec<PresetRange> {
    let fmt = |d: Option<NaiveDateTime>| format(d, pattern);
    let last_month = add_months(today, -1);
    vec![
        PresetRange {
            label: "Today",
            start: fmt(Some(today)),
            end: fmt(Some(today)),
        },
        PresetRange {
            label: "Yesterday",
            start: fmt(add_days(today, -1)),
            end: fmt(add_days(today, -1)),
        },
        PresetRange {
            label: "Last 7 days",
            start: fmt(add_days(today, -6)),
            end: fmt(Some(today)),
        },
        PresetRange {
            label: "Last 30 days",
            start: fmt(add_days(today, -29)),
            end: fmt(Some(today)),
        },
        PresetRange {
            label: "This month",
            start: fmt(start_of_month(today)),
            end: fmt(end_of_month(today)),
        },
        PresetRange {
            label: "Last month",
            start: fmt(start_of_month(last_month)),
            end: fmt(end_of_month(last_month)),
        },
        PresetRange {
            label: "This week",
            start: fmt(start_of_week(today)),
            end: fmt(end_of_week(today)),
        },
    ]
}

pub fn preset_ranges(pattern: &str) -> Vec<PresetRange> {
    preset_ranges_at(now_local(), pattern)
}

/// `None` when either side is not a date.
pub fn compare(a: impl IntoDate, b: impl IntoDate) -> Option<Ordering> {
    Some(a.into_date()?.cmp(&b.into_date()?))
}

/// Inclusive on both ends; false when any argument is not a date.
pub fn is_between(date: impl IntoDate, start: impl IntoDate, end: impl IntoDate) -> bool {
    match (date.into_date(), start.into_date(), end.into_date()) {
        (Some(d), Some(s), Some(e)) => s <= d && d <= e,
        _ => false,
    }
}

/// Whole days between two dates, rounding any partial day up.
pub fn diff_days(a: impl IntoDate, b: impl IntoDate) -> Option<i64> {
    let millis = (b.into_date()? - a.into_date()?).num_milliseconds().abs();
    const DAY_MS: i64 = 24 * 60 * 60 * 1000;
    Some((millis + DAY_MS - 1) / DAY_MS)
}
