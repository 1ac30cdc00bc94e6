//! Timestamp normalization under the fixed reference timezone (Asia/Seoul).
//!
//! Strings carrying a zone marker are absolute. Anything else is wall-clock
//! time in Seoul, never UTC.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use chrono_tz::Asia::Seoul;
use chrono_tz::Tz;
use regex::Regex;

pub const REFERENCE_TZ: Tz = Seoul;

static TRAILING_OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d{2}:\d{2}$").expect("static regex"));

static ZONE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Z|[+-]\d{2}:?\d{2}$").expect("static regex"));

const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%#z",
    "%Y-%m-%dT%H:%M%#z",
];

fn has_explicit_zone(raw: &str) -> bool {
    raw.ends_with('Z') || raw.contains('+') || TRAILING_OFFSET.is_match(raw)
}

fn to_iso_separator(raw: &str) -> String {
    match raw.find(char::is_whitespace) {
        Some(start) => {
            let rest = raw[start..].trim_start();
            format!("{}T{}", &raw[..start], rest)
        }
        None => raw.to_string(),
    }
}

fn parse_absolute(raw: &str) -> Option<DateTime<Utc>> {
    let iso = to_iso_separator(raw);
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&iso) {
        return Some(parsed.with_timezone(&Utc));
    }
    ZONED_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(&iso, format).ok())
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn parse_seoul_wall_clock(raw: &str) -> Option<DateTime<Utc>> {
    let mut iso = to_iso_separator(raw);
    if !iso.contains('T') {
        iso.push_str("T00:00:00");
    }
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&iso, format).ok())?;
    REFERENCE_TZ
        .from_local_datetime(&naive)
        .single()
        .map(|local| local.with_timezone(&Utc))
}

/// Resolve a raw timestamp to an instant. Never fails loudly: blank or
/// unparseable input yields `None`.
pub fn normalize(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if has_explicit_zone(raw) {
        parse_absolute(raw)
    } else {
        parse_seoul_wall_clock(raw)
    }
}

/// Variant used for answer-log instants: a looser zone-marker check
/// (`Z` anywhere, or a trailing `±HH[:]MM`) before falling back to
/// [`normalize`].
pub fn normalize_log_instant(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let trimmed = raw?.trim();
    if ZONE_MARKER.is_match(trimmed) {
        parse_absolute(trimmed)
    } else {
        normalize(Some(trimmed))
    }
}

pub fn civil_date(instant: DateTime<Utc>) -> NaiveDate {
    instant.with_timezone(&REFERENCE_TZ).date_naive()
}

pub fn civil_hour(instant: DateTime<Utc>) -> u32 {
    instant.with_timezone(&REFERENCE_TZ).hour()
}

pub fn civil_date_string(instant: DateTime<Utc>) -> String {
    civil_date(instant).format("%Y-%m-%d").to_string()
}

fn meridiem(hour: u32) -> &'static str {
    if hour < 12 {
        "오전"
    } else {
        "오후"
    }
}

/// Last-activity stamp for cards, e.g. `1. 2. 오전 09:05`.
pub fn format_active(raw: Option<&str>) -> String {
    let Some(text) = raw.filter(|text| !text.is_empty()) else {
        return String::new();
    };
    match normalize(Some(text)) {
        Some(instant) => {
            let local = instant.with_timezone(&REFERENCE_TZ);
            let hour12 = match local.hour() % 12 {
                0 => 12,
                hour => hour,
            };
            format!(
                "{}. {}. {} {:02}:{:02}",
                local.format("%-m"),
                local.format("%-d"),
                meridiem(local.hour()),
                hour12,
                local.minute()
            )
        }
        None => text.to_string(),
    }
}

/// `HH:MM:SS` in Seoul, `--:--` when missing.
pub fn format_log_time(raw: Option<&str>) -> String {
    let Some(text) = raw.filter(|text| !text.is_empty()) else {
        return "--:--".to_string();
    };
    match normalize(Some(text)) {
        Some(instant) => instant
            .with_timezone(&REFERENCE_TZ)
            .format("%H:%M:%S")
            .to_string(),
        None => text.to_string(),
    }
}

/// `M. D. HH:MM:SS` in Seoul, `--` when missing.
pub fn format_log_date_time(raw: Option<&str>) -> String {
    let Some(text) = raw.filter(|text| !text.is_empty()) else {
        return "--".to_string();
    };
    match normalize(Some(text)) {
        Some(instant) => instant
            .with_timezone(&REFERENCE_TZ)
            .format("%-m. %-d. %H:%M:%S")
            .to_string(),
        None => text.to_string(),
    }
}
