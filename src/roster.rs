//! Batched roster text for messengers that choke on long pastes.
//!
//! A [`RosterCursor`] freezes one snapshot of names, hands it out a batch
//! per call, and asks for a fresh snapshot after the last batch.

use std::fmt::Write;
use std::future::Future;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::StudentStatusRecord;
use crate::report::{self, ABSENT_CLOSING, PRESENT_CLOSING};

pub const COPY_CHUNK_SIZE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RosterKind {
    Present,
    Absent,
}

impl RosterKind {
    /// Roster entries for this kind: full names for present students,
    /// masked names for absent ones.
    pub fn names_from(self, rows: &[StudentStatusRecord], now: DateTime<Utc>) -> Vec<String> {
        match self {
            Self::Present => report::present_names(rows, now),
            Self::Absent => report::absent_initials(rows, now),
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Present => "🤴 [똑패스] 오늘 출석",
            Self::Absent => "🍂 [똑패스] 오늘 미접속",
        }
    }

    fn closing(self) -> &'static str {
        match self {
            Self::Present => PRESENT_CLOSING,
            Self::Absent => ABSENT_CLOSING,
        }
    }

    fn empty_notice(self) -> &'static str {
        match self {
            Self::Present => "오늘 출석 0명",
            Self::Absent => "오늘 미접속 0명",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterBatch {
    /// 1-based batch number.
    pub number: usize,
    /// 1-based position of the first name in this batch.
    pub start: usize,
    pub end: usize,
    pub total: usize,
    pub is_last: bool,
    pub text: String,
    pub notice: String,
}

impl RosterBatch {
    pub fn len(&self) -> usize {
        self.end + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end < self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum RosterCopy {
    Empty { notice: String },
    Batch(RosterBatch),
}

#[derive(Debug, Clone)]
pub struct RosterCursor {
    kind: RosterKind,
    chunk_size: usize,
    names: Option<Vec<String>>,
    chunk: usize,
}

impl RosterCursor {
    pub fn new(kind: RosterKind) -> Self {
        Self::with_chunk_size(kind, COPY_CHUNK_SIZE)
    }

    pub fn with_chunk_size(kind: RosterKind, chunk_size: usize) -> Self {
        Self {
            kind,
            chunk_size: chunk_size.max(1),
            names: None,
            chunk: 0,
        }
    }

    pub fn kind(&self) -> RosterKind {
        self.kind
    }

    /// True when the next call to [`advance`](Self::advance) starts a new
    /// cycle and should see a fresh snapshot.
    pub fn needs_reload(&self) -> bool {
        match &self.names {
            None => true,
            Some(names) => self.chunk * self.chunk_size >= names.len(),
        }
    }

    pub fn load(&mut self, names: Vec<String>) {
        self.names = Some(names);
        self.chunk = 0;
    }

    pub fn reset(&mut self) {
        self.names = None;
        self.chunk = 0;
    }

    pub fn advance(&mut self) -> RosterCopy {
        let total = self.names.as_ref().map_or(0, Vec::len);
        if total == 0 {
            self.reset();
            return RosterCopy::Empty {
                notice: self.kind.empty_notice().to_string(),
            };
        }

        let start = (self.chunk * self.chunk_size).min(total);
        let end = (start + self.chunk_size).min(total);
        let names = self.names.as_deref().unwrap_or_default();
        let text = self.render(&names[start..end], start, end, total);
        let size = end - start;

        self.chunk += 1;
        let number = self.chunk;
        let is_last = end >= total;
        let notice = if is_last {
            self.reset();
            if total > self.chunk_size {
                format!("마지막 차수 복사됨 ({size}명). 다음에 클릭하면 1차부터")
            } else {
                "복사됨".to_string()
            }
        } else {
            format!("{number}차 복사됨 ({size}명). 다음 차수는 다시 클릭")
        };

        RosterCopy::Batch(RosterBatch {
            number,
            start: start + 1,
            end,
            total,
            is_last,
            text,
            notice,
        })
    }

    /// [`advance`](Self::advance), pulling a fresh snapshot from `load`
    /// first when a new cycle begins.
    pub async fn next_batch<E, F, Fut>(&mut self, load: F) -> Result<RosterCopy, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<String>, E>>,
    {
        if self.needs_reload() {
            self.load(load().await?);
        }
        Ok(self.advance())
    }

    fn render(&self, batch: &[String], start: usize, end: usize, total: usize) -> String {
        let mut output = String::new();
        let _ = writeln!(output, "{}", self.kind.title());
        if total > self.chunk_size {
            let _ = writeln!(output, "({}~{} / {}명)", start + 1, end, total);
        } else {
            let _ = writeln!(output, "({total}명)");
        }
        let _ = writeln!(output);
        match self.kind {
            RosterKind::Present => {
                for line in report::format_names_in_lines(batch) {
                    let _ = writeln!(output, "{line}");
                }
            }
            RosterKind::Absent => {
                let _ = writeln!(output, "· {}", batch.join(", "));
            }
        }
        let _ = writeln!(output);
        let _ = write!(output, "{}", self.kind.closing());
        output
    }
}
