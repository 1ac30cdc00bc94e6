use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::models::StudentStatusRecord;
use crate::time;

/// How long a submitted answer keeps its light on.
pub const ANSWER_LIGHT_SECONDS: i64 = 20;

pub fn answer_light_window() -> Duration {
    Duration::seconds(ANSWER_LIGHT_SECONDS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LightState {
    Correct,
    Incorrect,
    Idle,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LightStyle {
    pub border: &'static str,
    pub background: &'static str,
    pub label: &'static str,
    pub badge: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerLight {
    pub state: LightState,
    pub style: LightStyle,
}

impl LightState {
    pub fn style(self) -> LightStyle {
        match self {
            Self::Correct => LightStyle {
                border: "#2563eb",
                background: "linear-gradient(135deg, #eff6ff 0%, #dbeafe 100%)",
                label: "정답",
                badge: "#2563eb",
            },
            Self::Incorrect => LightStyle {
                border: "#dc2626",
                background: "linear-gradient(135deg, #fef2f2 0%, #fee2e2 100%)",
                label: "오답",
                badge: "#dc2626",
            },
            Self::Idle => LightStyle {
                border: "#94a3b8",
                background: "rgba(248, 250, 252, 0.98)",
                label: "대기",
                badge: "#94a3b8",
            },
        }
    }
}

fn answered_within_window(record: &StudentStatusRecord, now: DateTime<Utc>) -> bool {
    time::normalize(record.last_answer_at.as_deref())
        .is_some_and(|answered_at| now - answered_at <= answer_light_window())
}

/// Current light for a focus-zone card. Decays with `now`, so callers
/// re-evaluate it on a short tick rather than only on refresh.
pub fn light_for(record: &StudentStatusRecord, now: DateTime<Utc>) -> AnswerLight {
    let state = if answered_within_window(record, now) {
        match record
            .last_answer_result
            .as_deref()
            .map(str::to_lowercase)
            .as_deref()
        {
            Some("correct") => LightState::Correct,
            Some("incorrect") => LightState::Incorrect,
            _ => LightState::Idle,
        }
    } else {
        LightState::Idle
    };
    AnswerLight {
        state,
        style: state.style(),
    }
}

pub fn card_caption(record: &StudentStatusRecord, light: &AnswerLight) -> String {
    let tag = record
        .last_answer_tag
        .as_deref()
        .map(str::trim)
        .filter(|tag| !tag.is_empty());
    match (light.state, tag) {
        (LightState::Correct, Some(tag)) => format!("✅ 정답 · {tag}"),
        (LightState::Correct, None) => "✅ 정답".to_string(),
        (LightState::Incorrect, Some(tag)) => format!("❌ 오답 · {tag}"),
        (LightState::Incorrect, None) => "❌ 오답".to_string(),
        (LightState::Idle, _) => "⏳ 대기".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2024-06-01T03:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn answered(at: DateTime<Utc>, result: &str) -> StudentStatusRecord {
        StudentStatusRecord {
            id: "s1".to_string(),
            last_answer_at: Some(at.to_rfc3339()),
            last_answer_result: Some(result.to_string()),
            last_answer_tag: Some("관계대명사".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn light_decays_at_the_window_edge() {
        let just_outside = now() - answer_light_window() - Duration::milliseconds(1);
        let just_inside = now() - answer_light_window() + Duration::milliseconds(1);

        assert_eq!(
            light_for(&answered(just_outside, "correct"), now()).state,
            LightState::Idle
        );
        assert_eq!(
            light_for(&answered(just_inside, "correct"), now()).state,
            LightState::Correct
        );
    }

    #[test]
    fn result_is_case_insensitive() {
        let row = answered(now() - Duration::seconds(3), "INCORRECT");
        let light = light_for(&row, now());
        assert_eq!(light.state, LightState::Incorrect);
        assert_eq!(light.style.label, "오답");
        assert_eq!(card_caption(&row, &light), "❌ 오답 · 관계대명사");
    }

    #[test]
    fn naive_answer_time_is_read_as_seoul() {
        let mut row = answered(now(), "correct");
        row.last_answer_at = Some("2024-06-01 11:59:50".to_string());
        assert_eq!(light_for(&row, now()).state, LightState::Correct);
    }

    #[test]
    fn missing_or_bad_timestamp_is_idle() {
        let mut row = answered(now(), "correct");
        row.last_answer_at = None;
        assert_eq!(light_for(&row, now()).state, LightState::Idle);
        row.last_answer_at = Some("soon".to_string());
        let light = light_for(&row, now());
        assert_eq!(light.state, LightState::Idle);
        assert_eq!(card_caption(&row, &light), "⏳ 대기");
    }
}
