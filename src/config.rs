use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_LOG_LIMIT: i64 = 20;
pub const DEFAULT_ANSWER_LOG_LIMIT: i64 = 500;
pub const DEFAULT_POLL_SECS: u64 = 5;

#[derive(Debug, Clone, Default)]
pub struct CsvPaths {
    pub students: Option<PathBuf>,
    pub logs: Option<PathBuf>,
    pub answers: Option<PathBuf>,
}

impl CsvPaths {
    pub fn is_empty(&self) -> bool {
        self.students.is_none() && self.logs.is_none() && self.answers.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub csv: CsvPaths,
    pub log_limit: i64,
    /// Answer-log rows pulled per student for today's stats.
    pub answer_log_limit: i64,
    pub poll_interval: Duration,
    /// Postgres channel that announces table changes, if one is wired up.
    pub notify_channel: Option<String>,
}

fn env_number<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a number, got {raw:?}")),
        _ => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            csv: CsvPaths::default(),
            log_limit: env_number("MONITOR_LOG_LIMIT", DEFAULT_LOG_LIMIT)?,
            answer_log_limit: env_number("MONITOR_ANSWER_LOG_LIMIT", DEFAULT_ANSWER_LOG_LIMIT)?,
            poll_interval: Duration::from_secs(env_number("MONITOR_POLL_SECS", DEFAULT_POLL_SECS)?.max(1)),
            notify_channel: std::env::var("MONITOR_NOTIFY_CHANNEL")
                .ok()
                .filter(|channel| !channel.trim().is_empty()),
        })
    }
}
