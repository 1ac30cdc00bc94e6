use std::fmt::Write;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::attendance;
use crate::dashboard::DashboardView;
use crate::light::card_caption;
use crate::models::{DailyStats, EventLogRecord, StudentStatusRecord};
use crate::stats::capped_score;
use crate::status::StudentColor;
use crate::time;
use crate::zones::FOCUS_ZONE_MAX;

pub const NAMES_PER_LINE: usize = 6;

pub const DETAIL_LOG_LIMIT: usize = 20;

pub const NO_NAME: &str = "이름없음";

pub const NO_TWO_DAY_ABSENTEES: &str = "이틀 미접속 학생이 없습니다.";

pub const PRESENT_CLOSING: &str = "💬 \"숙제 끝내고 꿀잠 예약 🛌 진짜 고생했어!\"";

pub const ABSENT_CLOSING: &str = "💬 \"나 다 싶으면... 조용히 앱 켜기 (아직 안 늦음 😉)\"";

static SHOTGUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"샷건|직후\s*5초|강제\s*종료").expect("static regex"));

/// The student quit abruptly right after a wrong answer.
pub fn is_shotgun_note(info_text: &str) -> bool {
    SHOTGUN.is_match(info_text)
}

fn overnight_hour(last_active: Option<&str>) -> Option<u32> {
    let hour = time::civil_hour(time::normalize(last_active)?);
    (1..5).contains(&hour).then_some(hour)
}

pub fn encouragement(record: &StudentStatusRecord) -> String {
    let name = format!("{}님", record.name().unwrap_or(NO_NAME));
    let info = record.info_text.as_deref().unwrap_or("").trim();

    match StudentColor::resolve(record.student_color.as_deref()) {
        StudentColor::Gold => format!("{name}! 오늘 50문제 클리어 축하해용! 진짜 고생했어 :D 👍"),
        StudentColor::Blue => {
            format!("{name}!, 20문제 연속으로 달리는 거 봤어요. 오늘 기세 미쳤는데??? 🔥")
        }
        StudentColor::Red => format!(
            "{name}!, 방금 푼 문제들 좀 어려웠죠ㅠㅠ? 복습할 때 오답 체크 꼭 하고 넘어갑시당! 💪"
        ),
        StudentColor::Purple => match overnight_hour(record.last_active.as_deref()) {
            Some(hour) => format!(
                "{name}... 지금 새벽 {hour}시에 도 공부하넹!! 진짜 대단하구.. 응원해요 무리는 하지말기! 🌙"
            ),
            None => format!(
                "{name}... 새벽에 공부하넹!! 진짜 대단하구.. 응원해요 무리는 하지말기! 🌙"
            ),
        },
        StudentColor::Green => format!("{name}, 복습까지 깔끔하게 끝냈네요?? 완벽하다! :D 💯"),
        StudentColor::White if is_shotgun_note(info) => format!(
            "{name},, 오답 보고 바로 껐던데 혹시 열받은거 아니죠? ㅠㅠㅠ 조금만 더해보자~ 으쌰으쌰 💪"
        ),
        StudentColor::White | StudentColor::Orange => format!("{name}, 오늘도 응원해!!"),
    }
}

fn color_for_event(event_type: &str) -> StudentColor {
    match event_type.trim().to_uppercase().as_str() {
        "GOLD" => StudentColor::Gold,
        "BLUE" => StudentColor::Blue,
        "GREEN" => StudentColor::Green,
        "RED" => StudentColor::Red,
        "PURPLE" => StudentColor::Purple,
        _ => StudentColor::White,
    }
}

/// Encouragement for one event-log row, built from a stand-in student.
pub fn encouragement_for_log(log: &EventLogRecord) -> String {
    let color = color_for_event(log.event_type.as_deref().unwrap_or(""));
    let standin = StudentStatusRecord {
        id: log.id.clone(),
        student_name: log.student_name.clone(),
        student_color: Some(color.as_str().to_string()),
        info_text: Some(log.text().to_string()),
        last_active: log.created_at.clone(),
        ..Default::default()
    };
    encouragement(&standin)
}

/// Wrap names [`NAMES_PER_LINE`] to a line, each prefixed with `· `.
pub fn format_names_in_lines(names: &[String]) -> Vec<String> {
    names
        .chunks(NAMES_PER_LINE)
        .map(|chunk| {
            chunk
                .iter()
                .map(|name| format!("· {name}"))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

pub fn present_names(rows: &[StudentStatusRecord], now: DateTime<Utc>) -> Vec<String> {
    rows.iter()
        .filter(|row| attendance::is_today(row.last_active.as_deref(), now))
        .map(|row| row.name().unwrap_or("-").to_string())
        .collect()
}

pub fn absent_initials(rows: &[StudentStatusRecord], now: DateTime<Utc>) -> Vec<String> {
    rows.iter()
        .filter(|row| !attendance::is_today(row.last_active.as_deref(), now))
        .map(|row| attendance::mask_name(row.student_name.as_deref()))
        .collect()
}

pub fn today_status_digest(rows: &[StudentStatusRecord], now: DateTime<Utc>) -> String {
    let present = present_names(rows, now);
    let absent = absent_initials(rows, now);

    let mut output = String::new();
    let _ = writeln!(output, "📜 [똑패스] 오늘의 현황판");
    let _ = writeln!(output);
    let _ = writeln!(output, "🤴 오늘의 공주,왕자님 ({}명)", present.len());
    for line in format_names_in_lines(&present) {
        let _ = writeln!(output, "{line}");
    }
    let _ = writeln!(output, "{PRESENT_CLOSING}");
    let _ = writeln!(output);
    let _ = writeln!(output, "🍂 빈자리가 느껴져요 머쓱; ({}명)", absent.len());
    if !absent.is_empty() {
        let _ = writeln!(output, "· {}", absent.join(", "));
    }
    let _ = write!(output, "{ABSENT_CLOSING}");
    output
}

/// Outreach text for students absent two days running. `None` when
/// nobody qualifies.
pub fn absent_two_days_digest(rows: &[StudentStatusRecord], now: DateTime<Utc>) -> Option<String> {
    let names: Vec<&str> = rows
        .iter()
        .filter(|row| attendance::is_absent_two_days(row.last_active.as_deref(), now))
        .map(|row| row.name().unwrap_or("(이름없음)"))
        .collect();
    if names.is_empty() {
        return None;
    }

    let mut output = String::new();
    let _ = writeln!(output, "📅 [똑패스] 이틀째 접속이 없어요 (개별 발송용)");
    let _ = writeln!(output);
    let _ = writeln!(output, "대상: {}", names.join(", "));
    let _ = writeln!(output);
    let _ = writeln!(output, "💬 보낼 멘트:");
    let _ = write!(
        output,
        "\"이틀째 앱에 안 들어오셨네요! 오늘만이라도 켜보시면 감사해요 😊 아직 안 늦었어요!\""
    );
    Some(output)
}

#[derive(Debug, Clone, Copy)]
pub enum StatsView<'a> {
    Loading,
    Ready(&'a DailyStats),
    Unavailable,
}

/// Everything the detail view shows for one student, as copyable text.
pub fn detail_digest(name: Option<&str>, stats: StatsView<'_>, logs: &[EventLogRecord]) -> String {
    let name = name.map(str::trim).filter(|name| !name.is_empty()).unwrap_or("-");
    let mut output = String::new();

    let _ = writeln!(output, "🕵️ {name} 상세");
    let _ = writeln!(output);

    let _ = writeln!(output, "📊 오늘의 스코어");
    let _ = match stats {
        StatsView::Loading => writeln!(output, "불러오는 중..."),
        StatsView::Ready(stats) => {
            let capped = capped_score(stats);
            writeln!(
                output,
                "오늘 {}문제 풀었고, 정답률은 {}%입니다. ({}정답 / {}오답)",
                capped.displayed_count,
                capped.displayed_accuracy,
                capped.displayed_correct,
                capped.displayed_wrong
            )
        }
        StatsView::Unavailable => writeln!(output, "오늘 푼 기록이 없어요."),
    };
    let _ = writeln!(output);

    let _ = writeln!(output, "📉 오늘의 약점 (Worst 3)");
    let _ = match stats {
        StatsView::Loading => writeln!(output, "불러오는 중..."),
        StatsView::Ready(stats) if !stats.worst_tags.is_empty() => {
            let listed: Vec<String> = stats
                .worst_tags
                .iter()
                .map(|worst| format!("{} {}개", worst.tag, worst.count))
                .collect();
            writeln!(output, "오늘 유독 {}에서 많이 틀렸어요.", listed.join(", "))
        }
        StatsView::Ready(_) => writeln!(output, "오늘 오답이 없어요. 잘했어요!"),
        StatsView::Unavailable => writeln!(output, "오늘 푼 기록이 없어요."),
    };
    let _ = writeln!(output);

    let _ = writeln!(output, "📚 오늘의 족보 기록");
    match stats {
        StatsView::Loading => {
            let _ = writeln!(output, "불러오는 중...");
        }
        StatsView::Ready(stats) if stats.input_total > 0 => {
            let _ = writeln!(
                output,
                "오늘 족보 {}문제 풀었고, 정답률 {}%입니다. ({}정답 / {}오답)",
                stats.input_total,
                stats.input_percent,
                stats.input_correct,
                stats.input_total - stats.input_correct
            );
            if !stats.input_by_tag.is_empty() {
                let listed: Vec<String> = stats
                    .input_by_tag
                    .iter()
                    .map(|tag| format!("{} {}%", tag.tag, tag.percent))
                    .collect();
                let _ = writeln!(output, "{}", listed.join(", "));
            }
        }
        _ => {
            let _ = writeln!(output, "오늘 족보 학습 기록이 없어요.");
        }
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "📜 개인 로그");
    let own_logs: Vec<&EventLogRecord> = logs
        .iter()
        .filter(|log| log.student_name.as_deref().unwrap_or("").trim() == name)
        .take(DETAIL_LOG_LIMIT)
        .collect();
    if own_logs.is_empty() {
        let _ = write!(output, "이 학생의 사건 기록이 없어요.");
    } else {
        let lines: Vec<String> = own_logs
            .iter()
            .map(|log| {
                format!(
                    "[{}] {}",
                    time::format_log_date_time(log.created_at.as_deref()),
                    log.text()
                )
            })
            .collect();
        let _ = write!(output, "{}", lines.join("\n"));
    }

    output
}

pub fn render_board(view: &DashboardView) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# 실시간 학생 모니터링");

    match (&view.roster, &view.students_error) {
        (Some(roster), _) => {
            let _ = writeln!(
                output,
                "오늘 출석 {}명 · 지금 접속 중 {}명 · 오늘 사건 {}건",
                roster.present_count, roster.live_now, view.today_events
            );
            let _ = writeln!(output);
            let _ = writeln!(
                output,
                "## 집중 관리 존 (최근 활동 순 상위 {FOCUS_ZONE_MAX}명)"
            );
            if roster.zones.focus.is_empty() {
                let _ = writeln!(output, "표시할 학생이 없어요.");
            }
            for student in &roster.zones.focus {
                let absent_badge = if student.absent_two_days {
                    " [이틀 미접속]"
                } else {
                    ""
                };
                let _ = writeln!(
                    output,
                    "- {} [{}]{} {} {}",
                    student.record.student_name.as_deref().unwrap_or("-"),
                    student.light.style.label,
                    absent_badge,
                    card_caption(&student.record, &student.light),
                    time::format_active(student.record.last_active.as_deref())
                );
            }
            let _ = writeln!(output);
            let _ = writeln!(output, "## 이틀 연속 미접속: {}명", roster.absent_two_days.len());
            let _ = writeln!(output, "## 안전 보관함: 외 {}명", roster.zones.overflow.len());
        }
        (None, Some(error)) => {
            let _ = writeln!(output, "⚠️ 학생 목록 조회 실패: {error}");
        }
        (None, None) => {
            let _ = writeln!(output, "불러오는 중...");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## 📢 실시간 사건 기록");
    if let Some(error) = &view.logs_error {
        let _ = writeln!(output, "⚠️ 실시간 사건 기록 조회 실패: {error}");
    } else if view.logs.is_empty() {
        let _ = writeln!(output, "아직 기록된 사건이 없어요.");
    }
    for log in &view.logs {
        let _ = writeln!(
            output,
            "[{}] {} {}",
            time::format_log_date_time(log.created_at.as_deref()),
            log.student_name.as_deref().unwrap_or("-"),
            log.text()
        );
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InputTagSummary, TagCount};

    fn now() -> DateTime<Utc> {
        // 2024-06-03 12:00 in Seoul.
        DateTime::parse_from_rfc3339("2024-06-03T03:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn student(name: &str, color: &str, last_active: Option<&str>) -> StudentStatusRecord {
        StudentStatusRecord {
            id: name.to_string(),
            student_name: Some(name.to_string()),
            student_color: Some(color.to_string()),
            last_active: last_active.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn gold_student_gets_the_quota_message() {
        let row = student("김하늘", "gold", Some("2024-01-01 10:00:00"));
        let message = encouragement(&row);
        assert!(message.contains("50문제"));
        assert!(message.starts_with("김하늘님!"));
        assert_eq!(crate::status::classify(row.student_color.as_deref()).label, "🏆 MVP");
    }

    #[test]
    fn purple_mentions_the_overnight_hour() {
        let row = student("이도윤", "purple", Some("2024-06-03 03:15:00"));
        assert!(encouragement(&row).contains("새벽 3시에"));

        let evening = student("이도윤", "purple", Some("2024-06-03 21:15:00"));
        let message = encouragement(&evening);
        assert!(message.contains("새벽에 공부하넹"));
        assert!(!message.contains("시에"));
    }

    #[test]
    fn white_switches_on_shotgun_notes() {
        let mut row = student("", "white", None);
        row.info_text = Some("오답 직후 5초 만에 종료".to_string());
        assert_eq!(
            encouragement(&row),
            "이름없음님,, 오답 보고 바로 껐던데 혹시 열받은거 아니죠? ㅠㅠㅠ 조금만 더해보자~ 으쌰으쌰 💪"
        );
        row.info_text = Some("접속 중".to_string());
        assert_eq!(encouragement(&row), "이름없음님, 오늘도 응원해!!");
    }

    #[test]
    fn log_rows_map_event_types_to_colors() {
        let log = EventLogRecord {
            id: "1".to_string(),
            student_name: Some("최유나".to_string()),
            event_type: Some("shotgun".to_string()),
            message: Some("샷건 감지: 오답 직후 강제 종료".to_string()),
            created_at: Some("2024-06-03 11:00:00".to_string()),
        };
        assert!(encouragement_for_log(&log).contains("껐던데"));

        let gold = EventLogRecord {
            event_type: Some("Gold".to_string()),
            message: None,
            ..log.clone()
        };
        assert!(encouragement_for_log(&gold).contains("50문제 클리어"));
    }

    #[test]
    fn names_wrap_six_per_line() {
        let names: Vec<String> = (1..=8).map(|n| format!("학생{n}")).collect();
        let lines = format_names_in_lines(&names);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "· 학생7 · 학생8");
    }

    #[test]
    fn status_digest_lists_present_and_masks_absent() {
        let rows = vec![
            student("김하늘", "gold", Some("2024-06-03 09:00:00")),
            student("이도윤", "white", Some("2024-06-01 09:00:00")),
            student("박서준", "blue", None),
        ];
        let digest = today_status_digest(&rows, now());
        assert!(digest.contains("🤴 오늘의 공주,왕자님 (1명)\n· 김하늘\n"));
        assert!(digest.contains("(2명)\n· 이○○, 박○○\n"));
        assert!(digest.ends_with(ABSENT_CLOSING));
    }

    #[test]
    fn two_day_digest_skips_recent_students() {
        let rows = vec![
            student("김하늘", "gold", Some("2024-06-02 09:00:00")),
            student("이도윤", "white", Some("2024-06-01 09:00:00")),
            student("", "white", None),
        ];
        let digest = absent_two_days_digest(&rows, now()).unwrap();
        assert!(digest.contains("대상: 이도윤, (이름없음)"));

        let recent = vec![student("김하늘", "gold", Some("2024-06-03 09:00:00"))];
        assert_eq!(absent_two_days_digest(&recent, now()), None);
    }

    #[test]
    fn detail_digest_sections() {
        let stats = DailyStats {
            problems_solved: 4,
            correct_count: 3,
            wrong_count: 1,
            accuracy_percent: 75,
            worst_tags: vec![TagCount { tag: "시제".to_string(), count: 1 }],
            input_by_tag: vec![InputTagSummary {
                tag: "phrasal-verbs".to_string(),
                total: 2,
                correct: 1,
                percent: 50,
            }],
            input_total: 2,
            input_correct: 1,
            input_percent: 50,
        };
        let logs = vec![
            EventLogRecord {
                id: "1".to_string(),
                student_name: Some("김하늘".to_string()),
                event_type: Some("RED".to_string()),
                message: Some("3연속 오답".to_string()),
                created_at: Some("2024-06-03 10:00:00".to_string()),
            },
            EventLogRecord {
                id: "2".to_string(),
                student_name: Some("이도윤".to_string()),
                event_type: Some("GOLD".to_string()),
                message: None,
                created_at: None,
            },
        ];
        let digest = detail_digest(Some("김하늘"), StatsView::Ready(&stats), &logs);

        assert!(digest.starts_with("🕵️ 김하늘 상세\n"));
        assert!(digest.contains("오늘 4문제 풀었고, 정답률은 75%입니다. (3정답 / 1오답)"));
        assert!(digest.contains("오늘 유독 시제 1개에서 많이 틀렸어요."));
        assert!(digest.contains("오늘 족보 2문제 풀었고, 정답률 50%입니다. (1정답 / 1오답)\nphrasal-verbs 50%"));
        assert!(digest.ends_with("[6. 3. 10:00:00] 3연속 오답"));
        assert!(!digest.contains("GOLD"));
    }

    #[test]
    fn detail_digest_without_stats() {
        let digest = detail_digest(None, StatsView::Unavailable, &[]);
        assert!(digest.starts_with("🕵️ - 상세"));
        assert!(digest.contains("오늘 족보 학습 기록이 없어요."));
        assert!(digest.ends_with("이 학생의 사건 기록이 없어요."));

        let loading = detail_digest(Some("김하늘"), StatsView::Loading, &[]);
        assert_eq!(loading.matches("불러오는 중...").count(), 3);
    }

    #[test]
    fn board_shows_each_source_independently() {
        use crate::dashboard::Dashboard;

        let mut dashboard = Dashboard::new();
        dashboard.apply_students(Ok::<_, String>(vec![
            student("김하늘", "gold", Some("2024-06-03 11:59:00")),
            student("이도윤", "white", Some("2024-05-20 09:00:00")),
        ]));
        dashboard.apply_logs(Err::<Vec<EventLogRecord>, _>("relation \"status_logs\" does not exist"));

        let board = render_board(&dashboard.view(now()));
        assert!(board.contains("오늘 출석 1명 · 지금 접속 중 1명 · 오늘 사건 0건"));
        assert!(board.contains("- 김하늘 [대기] ⏳ 대기 6. 3. 오전 11:59"));
        assert!(board.contains("- 이도윤 [대기] [이틀 미접속] ⏳ 대기"));
        assert!(board.contains("## 안전 보관함: 외 0명"));
        assert!(board.contains("⚠️ 실시간 사건 기록 조회 실패: relation"));
    }
}
