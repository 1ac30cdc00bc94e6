use chrono::{DateTime, Utc};

use crate::models::{ClassifiedStudent, StudentStatusRecord};
use crate::{attendance, light, status, zones};

pub fn classify_student(record: StudentStatusRecord, now: DateTime<Utc>) -> ClassifiedStudent {
    let style = status::classify(record.student_color.as_deref());
    let light = light::light_for(&record, now);
    let recency_ms = zones::recency(&record);
    let is_today = attendance::is_today(record.last_active.as_deref(), now);
    let absent_two_days = attendance::is_absent_two_days(record.last_active.as_deref(), now);
    let display_message = status::display_message(&record);

    ClassifiedStudent {
        record,
        style,
        light,
        recency_ms,
        is_today,
        absent_two_days,
        display_message,
    }
}

pub fn classify_all(records: &[StudentStatusRecord], now: DateTime<Utc>) -> Vec<ClassifiedStudent> {
    records
        .iter()
        .cloned()
        .map(|record| classify_student(record, now))
        .collect()
}
