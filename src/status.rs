use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::StudentStatusRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudentColor {
    Gold,
    Red,
    Orange,
    Blue,
    Green,
    Purple,
    White,
}

pub const LEGEND_ORDER: [StudentColor; 6] = [
    StudentColor::Gold,
    StudentColor::Blue,
    StudentColor::Green,
    StudentColor::Purple,
    StudentColor::Red,
    StudentColor::White,
];

const UNKNOWN_PRIORITY: u8 = 99;

impl StudentColor {
    /// Exact-key lookup; `None` for anything outside the enumeration.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "gold" => Some(Self::Gold),
            "red" => Some(Self::Red),
            "orange" => Some(Self::Orange),
            "blue" => Some(Self::Blue),
            "green" => Some(Self::Green),
            "purple" => Some(Self::Purple),
            "white" => Some(Self::White),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gold => "gold",
            Self::Red => "red",
            Self::Orange => "orange",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Purple => "purple",
            Self::White => "white",
        }
    }

    /// Missing or unrecognized tags read as `White`.
    pub fn resolve(tag: Option<&str>) -> Self {
        tag.and_then(Self::from_tag).unwrap_or(Self::White)
    }

    pub fn priority(self) -> u8 {
        match self {
            Self::Gold => 0,
            Self::Red => 1,
            Self::Orange => 2,
            Self::Blue => 3,
            Self::Green => 4,
            Self::Purple => 5,
            Self::White => 6,
        }
    }

    pub fn style(self) -> &'static StyleDescriptor {
        match self {
            Self::Gold => &GOLD,
            Self::Red => &RED,
            Self::Orange => &ORANGE,
            Self::Blue => &BLUE,
            Self::Green => &GREEN,
            Self::Purple => &PURPLE,
            Self::White => &WHITE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleDescriptor {
    pub border: &'static str,
    pub background: &'static str,
    pub badge: &'static str,
    pub label: &'static str,
    pub default_message: &'static str,
}

static GOLD: StyleDescriptor = StyleDescriptor {
    border: "#d4af37",
    background: "linear-gradient(135deg, #fffef0 0%, #fff9e6 50%, #fff4d6 100%)",
    badge: "#d4af37",
    label: "🏆 MVP",
    default_message: "🏆 일일 할당량(50문제) 클리어!",
};

static RED: StyleDescriptor = StyleDescriptor {
    border: "#ea4335",
    background: "linear-gradient(135deg, #fce8e6 0%, #f9d5d2 100%)",
    badge: "#ea4335",
    label: "위험",
    default_message: "🔴 3연속 오답",
};

static ORANGE: StyleDescriptor = StyleDescriptor {
    border: "#ea580c",
    background: "linear-gradient(135deg, #fff7ed 0%, #ffedd5 100%)",
    badge: "#ea580c",
    label: "경고",
    default_message: "경고 상태",
};

static BLUE: StyleDescriptor = StyleDescriptor {
    border: "#2575fc",
    background: "linear-gradient(135deg, #e6f4ea 0%, #c8e6d3 100%)",
    badge: "#34a853",
    label: "우수",
    default_message: "🔥 열공 모드 (20문제+)",
};

static GREEN: StyleDescriptor = StyleDescriptor {
    border: "#22c55e",
    background: "linear-gradient(135deg, #e6f4ea 0%, #c8e6d3 100%)",
    badge: "#22c55e",
    label: "복습완료",
    default_message: "✅ 복습 완료",
};

static PURPLE: StyleDescriptor = StyleDescriptor {
    border: "#8b5cf6",
    background: "linear-gradient(135deg, #f5f3ff 0%, #ede9fe 100%)",
    badge: "#8b5cf6",
    label: "새벽반",
    default_message: "🟣 새벽반",
};

static WHITE: StyleDescriptor = StyleDescriptor {
    border: "rgba(255,255,255,0.6)",
    background: "rgba(255, 255, 255, 0.92)",
    badge: "#64748b",
    label: "정상",
    default_message: "접속 중",
};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"상태\s*설명|예:\s*["']"#).expect("static regex"));

pub fn classify(color_tag: Option<&str>) -> &'static StyleDescriptor {
    StudentColor::resolve(color_tag).style()
}

/// List priority of a raw tag. Unknown tags sort after every known color,
/// even though they are styled as `white`.
pub fn color_priority(color_tag: Option<&str>) -> u8 {
    color_tag
        .and_then(StudentColor::from_tag)
        .map_or(UNKNOWN_PRIORITY, StudentColor::priority)
}

pub fn sort_by_priority(records: &mut [StudentStatusRecord]) {
    records.sort_by_key(|record| color_priority(record.student_color.as_deref()));
}

/// True for blank notes and for the form's example boilerplate.
pub fn is_placeholder_note(info_text: &str) -> bool {
    let trimmed = info_text.trim();
    trimmed.is_empty() || PLACEHOLDER.is_match(trimmed)
}

/// Status note shown on a card: the stored note, or the style's default.
pub fn display_message(record: &StudentStatusRecord) -> String {
    let note = record.info_text.as_deref().unwrap_or("");
    if is_placeholder_note(note) {
        classify(record.student_color.as_deref())
            .default_message
            .to_string()
    } else {
        note.trim().to_string()
    }
}
