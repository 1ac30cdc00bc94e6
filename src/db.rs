use std::cmp::Reverse;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::{debug, info};

use crate::config::CsvPaths;
use crate::models::{AnswerLogRecord, EventLogRecord, StudentStatusRecord};
use crate::time;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("query on {table} failed: {source}")]
    Database {
        table: &'static str,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to read {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("no source configured for {0}")]
    NotConfigured(&'static str),
}

const STUDENT_STATUS: &str = "student_status";
const STATUS_LOGS: &str = "status_logs";
const ANSWER_LOGS: &str = "answer_logs";

#[derive(Debug, Clone)]
pub enum Source {
    Postgres(PgPool),
    Csv(CsvPaths),
}

fn db_err(table: &'static str) -> impl FnOnce(sqlx::Error) -> FetchError {
    move |source| FetchError::Database { table, source }
}

fn student_from_row(row: &PgRow) -> Result<StudentStatusRecord, sqlx::Error> {
    Ok(StudentStatusRecord {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        student_name: row.try_get("student_name")?,
        student_color: row.try_get("student_color")?,
        last_active: row.try_get("last_active")?,
        last_answer_at: row.try_get("last_answer_at")?,
        last_answer_result: row.try_get("last_answer_result")?,
        last_answer_tag: row.try_get("last_answer_tag")?,
        info_text: row.try_get("info_text")?,
    })
}

fn read_csv<T: DeserializeOwned>(
    path: Option<&Path>,
    what: &'static str,
) -> Result<Vec<T>, FetchError> {
    let path = path.ok_or(FetchError::NotConfigured(what))?;
    let csv_err = |source| FetchError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let mut rows = Vec::new();
    for result in reader.deserialize::<T>() {
        rows.push(result.map_err(csv_err)?);
    }
    debug!(path = %path.display(), count = rows.len(), "loaded csv snapshot");
    Ok(rows)
}

impl Source {
    pub async fn fetch_students(&self) -> Result<Vec<StudentStatusRecord>, FetchError> {
        match self {
            Self::Postgres(pool) => {
                let rows = sqlx::query(
                    r#"
                    SELECT id::text AS id,
                           student_id::text AS student_id,
                           student_name,
                           student_color,
                           last_active::text AS last_active,
                           last_answer_at::text AS last_answer_at,
                           last_answer_result,
                           last_answer_tag,
                           info_text
                    FROM student_status
                    "#,
                )
                .fetch_all(pool)
                .await
                .map_err(db_err(STUDENT_STATUS))?;

                let mut students = Vec::with_capacity(rows.len());
                for row in rows.iter() {
                    students.push(student_from_row(row).map_err(db_err(STUDENT_STATUS))?);
                }
                info!(count = students.len(), "fetched student status");
                Ok(students)
            }
            Self::Csv(paths) => read_csv(paths.students.as_deref(), STUDENT_STATUS),
        }
    }

    /// Name and last-activity projection used for attendance rosters.
    pub async fn fetch_roster(&self) -> Result<Vec<StudentStatusRecord>, FetchError> {
        match self {
            Self::Postgres(pool) => {
                let rows = sqlx::query(
                    "SELECT id::text AS id, student_name, last_active::text AS last_active \
                     FROM student_status",
                )
                .fetch_all(pool)
                .await
                .map_err(db_err(STUDENT_STATUS))?;

                let mut roster = Vec::with_capacity(rows.len());
                for row in rows.iter() {
                    roster.push(StudentStatusRecord {
                        id: row.try_get("id").map_err(db_err(STUDENT_STATUS))?,
                        student_name: row.try_get("student_name").map_err(db_err(STUDENT_STATUS))?,
                        last_active: row.try_get("last_active").map_err(db_err(STUDENT_STATUS))?,
                        ..Default::default()
                    });
                }
                Ok(roster)
            }
            Self::Csv(_) => self.fetch_students().await,
        }
    }

    /// Newest events first, optionally for one student.
    pub async fn fetch_logs(
        &self,
        limit: i64,
        student_name: Option<&str>,
    ) -> Result<Vec<EventLogRecord>, FetchError> {
        match self {
            Self::Postgres(pool) => {
                let mut query = String::from(
                    "SELECT id::text AS id, student_name, event_type, message, \
                     created_at::text AS created_at \
                     FROM status_logs",
                );
                if student_name.is_some() {
                    query.push_str(" WHERE btrim(student_name) = $2");
                }
                query.push_str(" ORDER BY created_at DESC LIMIT $1");

                let mut rows = sqlx::query(&query).bind(limit);
                if let Some(name) = student_name {
                    rows = rows.bind(name.trim());
                }

                let records = rows.fetch_all(pool).await.map_err(db_err(STATUS_LOGS))?;
                let mut logs = Vec::with_capacity(records.len());
                for row in records.iter() {
                    logs.push(EventLogRecord {
                        id: row.try_get("id").map_err(db_err(STATUS_LOGS))?,
                        student_name: row.try_get("student_name").map_err(db_err(STATUS_LOGS))?,
                        event_type: row.try_get("event_type").map_err(db_err(STATUS_LOGS))?,
                        message: row.try_get("message").map_err(db_err(STATUS_LOGS))?,
                        created_at: row.try_get("created_at").map_err(db_err(STATUS_LOGS))?,
                    });
                }
                info!(count = logs.len(), "fetched status logs");
                Ok(logs)
            }
            Self::Csv(paths) => {
                let mut logs: Vec<EventLogRecord> = read_csv(paths.logs.as_deref(), STATUS_LOGS)?;
                if let Some(name) = student_name.map(str::trim) {
                    logs.retain(|log| log.student_name.as_deref().map(str::trim) == Some(name));
                }
                logs.sort_by_key(|log| {
                    Reverse(time::normalize(log.created_at.as_deref()).map(|at| at.timestamp_millis()))
                });
                logs.truncate(limit.max(0) as usize);
                Ok(logs)
            }
        }
    }

    pub async fn fetch_answer_logs(
        &self,
        student_id: &str,
        limit: i64,
    ) -> Result<Vec<AnswerLogRecord>, FetchError> {
        match self {
            Self::Postgres(pool) => {
                let records = sqlx::query(
                    r#"
                    SELECT student_id::text AS student_id,
                           created_at::text AS created_at,
                           created_at_kst::text AS created_at_kst,
                           tag,
                           correct,
                           quiz_type
                    FROM answer_logs
                    WHERE student_id::text = $1
                    ORDER BY created_at DESC
                    LIMIT $2
                    "#,
                )
                .bind(student_id)
                .bind(limit)
                .fetch_all(pool)
                .await
                .map_err(db_err(ANSWER_LOGS))?;

                let mut answers = Vec::with_capacity(records.len());
                for row in records.iter() {
                    answers.push(AnswerLogRecord {
                        student_id: row.try_get("student_id").map_err(db_err(ANSWER_LOGS))?,
                        created_at: row.try_get("created_at").map_err(db_err(ANSWER_LOGS))?,
                        created_at_kst: row.try_get("created_at_kst").map_err(db_err(ANSWER_LOGS))?,
                        tag: row.try_get("tag").map_err(db_err(ANSWER_LOGS))?,
                        correct: row.try_get("correct").map_err(db_err(ANSWER_LOGS))?,
                        quiz_type: row.try_get("quiz_type").map_err(db_err(ANSWER_LOGS))?,
                    });
                }
                debug!(student_id, count = answers.len(), "fetched answer logs");
                Ok(answers)
            }
            Self::Csv(paths) => {
                let mut answers: Vec<AnswerLogRecord> =
                    read_csv(paths.answers.as_deref(), ANSWER_LOGS)?;
                answers.retain(|row| row.student_id.as_deref() == Some(student_id));
                answers.sort_by_key(|row| {
                    Reverse(time::normalize_log_instant(row.created_at.as_deref()).map(|at| at.timestamp_millis()))
                });
                answers.truncate(limit.max(0) as usize);
                Ok(answers)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_temp(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("teacher-monitor-{}-{name}", std::process::id()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    #[test]
    fn csv_students_treat_empty_cells_as_missing() {
        let path = write_temp(
            "students.csv",
            "id,student_id,student_name,student_color,last_active,last_answer_at,last_answer_result,last_answer_tag,info_text\n\
             1,s-1,김하늘,gold,2024-06-03 09:00:00,,,,\n\
             2,,,,,,,,\n",
        );
        let source = Source::Csv(CsvPaths {
            students: Some(path),
            ..Default::default()
        });
        let students = block_on(source.fetch_students()).unwrap();

        assert_eq!(students.len(), 2);
        assert_eq!(students[0].student_color.as_deref(), Some("gold"));
        assert_eq!(students[0].last_answer_at, None);
        assert_eq!(students[1].name(), None);
    }

    #[test]
    fn csv_logs_are_newest_first_and_limited() {
        let path = write_temp(
            "logs.csv",
            "id,student_name,event_type,message,created_at\n\
             1,김하늘,RED,3연속 오답,2024-06-03 09:00:00\n\
             2,이도윤,GOLD,,2024-06-03 10:00:00\n\
             3,\"  김하늘 \",GREEN,복습 완료,2024-06-03 11:00:00\n",
        );
        let source = Source::Csv(CsvPaths {
            logs: Some(path),
            ..Default::default()
        });

        let newest = block_on(source.fetch_logs(2, None)).unwrap();
        let ids: Vec<&str> = newest.iter().map(|log| log.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2"]);

        let own = block_on(source.fetch_logs(20, Some("김하늘 "))).unwrap();
        assert_eq!(own.len(), 2);
        assert_eq!(own[0].id, "3");
        assert_eq!(own[1].text(), "3연속 오답");
    }

    #[test]
    fn missing_csv_is_not_configured() {
        let source = Source::Csv(CsvPaths::default());
        let err = block_on(source.fetch_answer_logs("s-1", 500)).unwrap_err();
        assert!(matches!(err, FetchError::NotConfigured(ANSWER_LOGS)));
    }
}
