use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::models::{AnswerLogRecord, CappedScore, DailyStats, InputTagSummary, TagCount};
use crate::time;

/// Daily quota; headline counts never show more than this.
pub const DAILY_CAP: usize = 50;

pub const UNTAGGED: &str = "(태그없음)";

const WORST_TAG_LIMIT: usize = 3;

static CIVIL_DATE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Practice,
    Input,
}

fn bucket(row: &AnswerLogRecord) -> Option<Bucket> {
    let quiz_type = row
        .quiz_type
        .as_deref()
        .unwrap_or("")
        .trim()
        .to_lowercase();
    match quiz_type.as_str() {
        "output" | "grammar" | "" => Some(Bucket::Practice),
        "input" => Some(Bucket::Input),
        _ => None,
    }
}

/// Prefer the pre-rendered Seoul date; fall back to the instant.
fn is_logged_today(row: &AnswerLogRecord, today: &str) -> bool {
    let kst = row.created_at_kst.as_deref().unwrap_or("").trim();
    if CIVIL_DATE_PREFIX.is_match(kst) {
        return kst.get(..10) == Some(today);
    }
    time::normalize_log_instant(row.created_at.as_deref())
        .is_some_and(|instant| time::civil_date_string(instant) == today)
}

fn tag_label(row: &AnswerLogRecord) -> String {
    match row.tag.as_deref().map(str::trim) {
        Some(tag) if !tag.is_empty() => tag.to_string(),
        _ => UNTAGGED.to_string(),
    }
}

pub fn percent(part: usize, whole: usize) -> u32 {
    if whole == 0 {
        return 0;
    }
    ((200 * part + whole) / (2 * whole)) as u32
}

fn is_correct(row: &AnswerLogRecord) -> bool {
    row.correct == Some(true)
}

fn worst_tags(rows: &[&AnswerLogRecord]) -> Vec<TagCount> {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for row in rows.iter().filter(|row| row.correct == Some(false)) {
        let tag = tag_label(row);
        let count = counts.entry(tag.clone()).or_insert(0);
        if *count == 0 {
            order.push(tag);
        }
        *count += 1;
    }

    let mut tags: Vec<TagCount> = order
        .into_iter()
        .map(|tag| {
            let count = counts.get(&tag).copied().unwrap_or(0);
            TagCount { tag, count }
        })
        .collect();
    tags.sort_by(|a, b| b.count.cmp(&a.count));
    tags.truncate(WORST_TAG_LIMIT);
    tags
}

fn input_by_tag(rows: &[&AnswerLogRecord]) -> Vec<InputTagSummary> {
    let mut summaries: Vec<InputTagSummary> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for row in rows {
        let tag = tag_label(row);
        let slot = *index.entry(tag.clone()).or_insert_with(|| {
            summaries.push(InputTagSummary {
                tag,
                total: 0,
                correct: 0,
                percent: 0,
            });
            summaries.len() - 1
        });
        let summary = &mut summaries[slot];
        summary.total += 1;
        if is_correct(row) {
            summary.correct += 1;
        }
    }

    for summary in summaries.iter_mut() {
        summary.percent = percent(summary.correct, summary.total);
    }
    summaries
}

pub fn aggregate(rows: &[AnswerLogRecord], now: DateTime<Utc>) -> DailyStats {
    let today = time::civil_date_string(now);
    let mut practice: Vec<&AnswerLogRecord> = Vec::new();
    let mut input: Vec<&AnswerLogRecord> = Vec::new();

    for row in rows {
        match bucket(row) {
            Some(Bucket::Practice) if is_logged_today(row, &today) => practice.push(row),
            Some(Bucket::Input) if is_logged_today(row, &today) => input.push(row),
            _ => {}
        }
    }

    let problems_solved = practice.len();
    let correct_count = practice.iter().filter(|row| is_correct(row)).count();
    let input_total = input.len();
    let input_correct = input.iter().filter(|row| is_correct(row)).count();

    DailyStats {
        problems_solved,
        correct_count,
        wrong_count: problems_solved - correct_count,
        accuracy_percent: percent(correct_count, problems_solved),
        worst_tags: worst_tags(&practice),
        input_by_tag: input_by_tag(&input),
        input_total,
        input_correct,
        input_percent: percent(input_correct, input_total),
    }
}

/// Cap the headline count at [`DAILY_CAP`] while keeping the accuracy ratio.
pub fn capped_score(stats: &DailyStats) -> CappedScore {
    let solved = stats.problems_solved;
    let displayed_count = solved.min(DAILY_CAP);
    let displayed_correct = if solved > 0 {
        (2 * displayed_count * stats.correct_count + solved) / (2 * solved)
    } else {
        stats.correct_count
    };
    let displayed_accuracy = if displayed_count > 0 {
        percent(displayed_correct, displayed_count)
    } else {
        stats.accuracy_percent
    };

    CappedScore {
        displayed_count,
        displayed_correct,
        displayed_wrong: displayed_count.saturating_sub(displayed_correct),
        displayed_accuracy,
    }
}
