use std::cmp::Reverse;

use serde::Serialize;

use crate::models::{ClassifiedStudent, StudentStatusRecord};
use crate::time;

pub const FOCUS_ZONE_MAX: usize = 30;

#[derive(Debug, Clone, Serialize)]
pub struct ZoneSplit<T> {
    pub focus: Vec<T>,
    pub overflow: Vec<T>,
}

/// Milliseconds since the epoch of the latest known activity, answer time
/// first. Zero when neither stamp parses.
pub fn recency(record: &StudentStatusRecord) -> i64 {
    time::normalize(record.last_answer_at.as_deref())
        .or_else(|| time::normalize(record.last_active.as_deref()))
        .map_or(0, |instant| instant.timestamp_millis())
}

/// Most recent first. Ties keep their input order.
pub fn rank(mut students: Vec<ClassifiedStudent>) -> Vec<ClassifiedStudent> {
    students.sort_by_key(|student| Reverse(student.recency_ms));
    students
}

pub fn split<T>(mut ordered: Vec<T>, focus_size: usize) -> ZoneSplit<T> {
    let overflow = ordered.split_off(focus_size.min(ordered.len()));
    ZoneSplit {
        focus: ordered,
        overflow,
    }
}
