use chrono::{DateTime, Duration, Utc};

use crate::time;

/// Window for counting a student as connected right now.
pub const LIVE_WINDOW_MINUTES: i64 = 5;

/// Same Seoul calendar day as `now`. Missing or unparseable stamps are
/// never today.
pub fn is_today(ts: Option<&str>, now: DateTime<Utc>) -> bool {
    time::normalize(ts).is_some_and(|instant| time::civil_date(instant) == time::civil_date(now))
}

/// Last seen two or more Seoul calendar days ago.
///
/// Missing and unparseable stamps both count as absent.
pub fn is_absent_two_days(ts: Option<&str>, now: DateTime<Utc>) -> bool {
    let Some(instant) = time::normalize(ts) else {
        return true;
    };
    let cutoff = time::civil_date(now) - Duration::days(2);
    time::civil_date(instant) <= cutoff
}

pub fn is_active_within(ts: Option<&str>, now: DateTime<Utc>, minutes: i64) -> bool {
    time::normalize(ts).is_some_and(|instant| now - instant <= Duration::minutes(minutes))
}

/// First character followed by `○○`, used when listing absentees.
pub fn mask_name(name: Option<&str>) -> String {
    match name.map(str::trim).and_then(|name| name.chars().next()) {
        Some(first) => format!("{first}○○"),
        None => "○○○".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        // 2024-06-03 00:30 in Seoul.
        DateTime::parse_from_rfc3339("2024-06-02T15:30:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn today_follows_the_seoul_calendar() {
        assert!(is_today(Some("2024-06-03 00:01:00"), now()));
        assert!(is_today(Some("2024-06-02T15:01:00Z"), now()));
        assert!(!is_today(Some("2024-06-02 23:59:59"), now()));
        assert!(!is_today(None, now()));
        assert!(!is_today(Some("garbage"), now()));
    }

    #[test]
    fn two_day_boundary() {
        assert!(is_absent_two_days(Some("2024-06-01 23:59:59"), now()));
        assert!(!is_absent_two_days(Some("2024-06-02 00:00:00"), now()));
        assert!(is_absent_two_days(Some("2024-05-01"), now()));
    }

    #[test]
    fn missing_data_reads_as_absent() {
        assert!(is_absent_two_days(None, now()));
        assert!(is_absent_two_days(Some(""), now()));
        assert!(is_absent_two_days(Some("not a date"), now()));
    }

    #[test]
    fn month_boundary_uses_calendar_days() {
        let now = DateTime::parse_from_rfc3339("2024-03-01T01:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert!(is_absent_two_days(Some("2024-02-28 12:00:00"), now));
        assert!(!is_absent_two_days(Some("2024-02-29 12:00:00"), now));
    }

    #[test]
    fn live_window() {
        assert!(is_active_within(Some("2024-06-03 00:26:00"), now(), LIVE_WINDOW_MINUTES));
        assert!(!is_active_within(Some("2024-06-03 00:24:59"), now(), LIVE_WINDOW_MINUTES));
    }

    #[test]
    fn masks_names() {
        assert_eq!(mask_name(Some(" 김민지 ")), "김○○");
        assert_eq!(mask_name(Some("")), "○○○");
        assert_eq!(mask_name(None), "○○○");
    }
}
