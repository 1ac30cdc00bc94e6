use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::attendance::{self, LIVE_WINDOW_MINUTES};
use crate::classify::classify_all;
use crate::models::{ClassifiedStudent, EventLogRecord, StudentStatusRecord};
use crate::status::sort_by_priority;
use crate::zones::{self, ZoneSplit, FOCUS_ZONE_MAX};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum SourceState<T> {
    Pending,
    Ready(Vec<T>),
    Unavailable(String),
}

impl<T> SourceState<T> {
    pub fn rows(&self) -> &[T] {
        match self {
            Self::Ready(rows) => rows,
            _ => &[],
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Unavailable(message) => Some(message),
            _ => None,
        }
    }
}

impl<T> Default for SourceState<T> {
    fn default() -> Self {
        Self::Pending
    }
}

/// Owns the last snapshot of each table. Each refresh replaces a snapshot
/// wholesale; the two tables fail independently.
#[derive(Debug, Default)]
pub struct Dashboard {
    students: SourceState<StudentStatusRecord>,
    logs: SourceState<EventLogRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RosterView {
    pub zones: ZoneSplit<ClassifiedStudent>,
    pub absent_two_days: Vec<ClassifiedStudent>,
    pub present_count: usize,
    pub absent_count: usize,
    pub live_now: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub generated_at: DateTime<Utc>,
    pub roster: Option<RosterView>,
    pub students_error: Option<String>,
    pub logs: Vec<EventLogRecord>,
    pub logs_error: Option<String>,
    pub today_events: usize,
}

impl Dashboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn students(&self) -> &SourceState<StudentStatusRecord> {
        &self.students
    }

    pub fn logs(&self) -> &SourceState<EventLogRecord> {
        &self.logs
    }

    pub fn apply_students<E: Display>(&mut self, fetched: Result<Vec<StudentStatusRecord>, E>) {
        self.students = match fetched {
            Ok(mut rows) => {
                sort_by_priority(&mut rows);
                debug!(count = rows.len(), "student snapshot replaced");
                SourceState::Ready(rows)
            }
            Err(err) => {
                warn!(error = %err, "student status unavailable");
                SourceState::Unavailable(err.to_string())
            }
        };
    }

    pub fn apply_logs<E: Display>(&mut self, fetched: Result<Vec<EventLogRecord>, E>) {
        self.logs = match fetched {
            Ok(rows) => {
                debug!(count = rows.len(), "event log snapshot replaced");
                SourceState::Ready(rows)
            }
            Err(err) => {
                warn!(error = %err, "event log unavailable");
                SourceState::Unavailable(err.to_string())
            }
        };
    }

    pub fn view(&self, now: DateTime<Utc>) -> DashboardView {
        let roster = match &self.students {
            SourceState::Ready(rows) => Some(roster_view(rows, now)),
            _ => None,
        };
        let logs = self.logs.rows().to_vec();
        let today_events = logs
            .iter()
            .filter(|log| attendance::is_today(log.created_at.as_deref(), now))
            .count();

        DashboardView {
            generated_at: now,
            roster,
            students_error: self.students.error().map(str::to_string),
            logs,
            logs_error: self.logs.error().map(str::to_string),
            today_events,
        }
    }
}

fn roster_view(rows: &[StudentStatusRecord], now: DateTime<Utc>) -> RosterView {
    let classified = classify_all(rows, now);
    let present_count = classified.iter().filter(|s| s.is_today).count();
    let live_now = classified
        .iter()
        .filter(|s| {
            attendance::is_active_within(s.record.last_active.as_deref(), now, LIVE_WINDOW_MINUTES)
        })
        .count();
    let absent_two_days: Vec<ClassifiedStudent> = classified
        .iter()
        .filter(|s| s.absent_two_days)
        .cloned()
        .collect();

    RosterView {
        absent_count: classified.len() - present_count,
        present_count,
        live_now,
        absent_two_days,
        zones: zones::split(zones::rank(classified), FOCUS_ZONE_MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        // 2024-06-03 12:00 in Seoul.
        DateTime::parse_from_rfc3339("2024-06-03T03:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn student(id: &str, color: &str, last_active: Option<&str>) -> StudentStatusRecord {
        StudentStatusRecord {
            id: id.to_string(),
            student_name: Some(format!("학생{id}")),
            student_color: Some(color.to_string()),
            last_active: last_active.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn one_failing_source_does_not_block_the_other() {
        let mut dashboard = Dashboard::new();
        dashboard.apply_students(Ok::<_, String>(vec![student(
            "1",
            "gold",
            Some("2024-06-03 11:58:00"),
        )]));
        dashboard.apply_logs(Err::<Vec<EventLogRecord>, _>("permission denied for status_logs"));

        let view = dashboard.view(now());
        let roster = view.roster.expect("roster renders");
        assert_eq!(roster.zones.focus.len(), 1);
        assert_eq!(roster.live_now, 1);
        assert_eq!(view.logs_error.as_deref(), Some("permission denied for status_logs"));
        assert!(view.logs.is_empty());
        assert!(view.students_error.is_none());
    }

    #[test]
    fn refresh_replaces_the_previous_snapshot() {
        let mut dashboard = Dashboard::new();
        dashboard.apply_students(Ok::<_, String>(vec![
            student("1", "white", None),
            student("2", "white", None),
        ]));
        dashboard.apply_students(Ok::<_, String>(vec![student("3", "red", None)]));
        assert_eq!(dashboard.students().rows().len(), 1);

        dashboard.apply_students(Err::<Vec<StudentStatusRecord>, _>("timeout"));
        let view = dashboard.view(now());
        assert!(view.roster.is_none());
        assert_eq!(view.students_error.as_deref(), Some("timeout"));
    }

    #[test]
    fn recency_ties_fall_back_to_color_priority() {
        let mut dashboard = Dashboard::new();
        dashboard.apply_students(Ok::<_, String>(vec![
            student("w", "white", None),
            student("g", "gold", None),
            student("b", "blue", Some("2024-06-03 09:00:00")),
            student("x", "white", Some("2024-05-30 09:00:00")),
        ]));
        let roster = dashboard.view(now()).roster.unwrap();
        let order: Vec<&str> = roster
            .zones
            .focus
            .iter()
            .map(|s| s.record.id.as_str())
            .collect();
        assert_eq!(order, vec!["b", "x", "g", "w"]);
        assert_eq!(roster.present_count, 1);
        assert_eq!(roster.absent_count, 3);
        assert_eq!(roster.absent_two_days.len(), 3);
    }

    #[test]
    fn counts_todays_events() {
        let mut dashboard = Dashboard::new();
        let log = |id: &str, at: &str| EventLogRecord {
            id: id.to_string(),
            created_at: Some(at.to_string()),
            ..Default::default()
        };
        dashboard.apply_logs(Ok::<_, String>(vec![
            log("1", "2024-06-03 08:00:00"),
            log("2", "2024-06-02T16:00:00Z"),
            log("3", "2024-06-02 23:00:00"),
        ]));
        assert_eq!(dashboard.view(now()).today_events, 2);
    }
}
