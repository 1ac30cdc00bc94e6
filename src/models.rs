use serde::{Deserialize, Serialize};

use crate::light::AnswerLight;
use crate::status::StyleDescriptor;

/// One row of the externally owned `student_status` table.
///
/// Timestamps are kept as the raw text the store handed us; the time
/// normalizer decides how to read them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentStatusRecord {
    pub id: String,
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub student_color: Option<String>,
    #[serde(default)]
    pub last_active: Option<String>,
    #[serde(default)]
    pub last_answer_at: Option<String>,
    #[serde(default)]
    pub last_answer_result: Option<String>,
    #[serde(default)]
    pub last_answer_tag: Option<String>,
    #[serde(default)]
    pub info_text: Option<String>,
}

impl StudentStatusRecord {
    /// Trimmed display name, `None` when blank.
    pub fn name(&self) -> Option<&str> {
        self.student_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLogRecord {
    pub id: String,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl EventLogRecord {
    /// Human text of the event, falling back to the raw event type.
    pub fn text(&self) -> &str {
        self.message
            .as_deref()
            .or(self.event_type.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerLogRecord {
    #[serde(default)]
    pub student_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub created_at_kst: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub correct: Option<bool>,
    #[serde(default)]
    pub quiz_type: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifiedStudent {
    pub record: StudentStatusRecord,
    pub style: &'static StyleDescriptor,
    pub light: AnswerLight,
    pub recency_ms: i64,
    pub is_today: bool,
    pub absent_two_days: bool,
    pub display_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputTagSummary {
    pub tag: String,
    pub total: usize,
    pub correct: usize,
    pub percent: u32,
}

/// Today's aggregate for one student, split into the practice bucket
/// (`output`, `grammar`, untyped) and the `input` bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DailyStats {
    pub problems_solved: usize,
    pub correct_count: usize,
    pub wrong_count: usize,
    pub accuracy_percent: u32,
    pub worst_tags: Vec<TagCount>,
    pub input_by_tag: Vec<InputTagSummary>,
    pub input_total: usize,
    pub input_correct: usize,
    pub input_percent: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CappedScore {
    pub displayed_count: usize,
    pub displayed_correct: usize,
    pub displayed_wrong: usize,
    pub displayed_accuracy: u32,
}
