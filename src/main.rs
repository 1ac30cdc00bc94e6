use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{ArgGroup, Parser, Subcommand, ValueEnum};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use teacher_monitor::config::{Config, CsvPaths};
use teacher_monitor::dashboard::Dashboard;
use teacher_monitor::db::{FetchError, Source};
use teacher_monitor::refresh::{self, Changed};
use teacher_monitor::report::{self, StatsView, DETAIL_LOG_LIMIT, NO_TWO_DAY_ABSENTEES};
use teacher_monitor::roster::{RosterCopy, RosterCursor, RosterKind};
use teacher_monitor::stats;

#[derive(Parser)]
#[command(name = "teacher-monitor")]
#[command(about = "Live student status board and message snippets for teachers", long_about = None)]
struct Cli {
    /// Read student_status from a CSV export instead of Postgres
    #[arg(long, global = true)]
    students_csv: Option<PathBuf>,
    /// Read status_logs from a CSV export instead of Postgres
    #[arg(long, global = true)]
    logs_csv: Option<PathBuf>,
    /// Read answer_logs from a CSV export instead of Postgres
    #[arg(long, global = true)]
    answers_csv: Option<PathBuf>,
    /// Rows shown in the live event feed
    #[arg(long, global = true)]
    log_limit: Option<i64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum CopyKind {
    /// Present and absent students in one block
    Status,
    /// Present students, in batches
    Attendance,
    /// Absent students, in batches
    Absent,
    /// Outreach text for students missing two days
    AbsentTwoDays,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the classified board once
    Snapshot {
        #[arg(long)]
        json: bool,
    },
    /// Keep the board live until interrupted
    Watch {
        #[arg(long)]
        poll_secs: Option<u64>,
    },
    /// Print clipboard-ready roster text
    Copy {
        #[arg(value_enum)]
        kind: CopyKind,
    },
    /// Encouragement message for one student or one event
    #[command(group(
        ArgGroup::new("target")
            .args(["student", "log"])
            .required(true)
            .multiple(false)
    ))]
    Message {
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        log: Option<String>,
    },
    /// Full detail digest for one student
    Detail {
        #[arg(long)]
        student: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("teacher_monitor=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

async fn connect(config: &Config) -> anyhow::Result<Source> {
    if !config.csv.is_empty() {
        info!("reading snapshots from csv");
        return Ok(Source::Csv(config.csv.clone()));
    }
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set, or pass --students-csv/--logs-csv/--answers-csv")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")?;
    Ok(Source::Postgres(pool))
}

async fn refresh_all(source: &Source, dashboard: &mut Dashboard, config: &Config) {
    let (students, logs) = tokio::join!(
        source.fetch_students(),
        source.fetch_logs(config.log_limit, None)
    );
    dashboard.apply_students(students);
    dashboard.apply_logs(logs);
}

async fn copy_roster(source: &Source, kind: RosterKind) -> anyhow::Result<()> {
    let mut cursor = RosterCursor::new(kind);
    loop {
        let copy = cursor
            .next_batch(|| async move {
                let rows = source.fetch_roster().await?;
                Ok::<_, FetchError>(kind.names_from(&rows, Utc::now()))
            })
            .await
            .context("조회 실패. 다시 눌러주세요.")?;
        match copy {
            RosterCopy::Empty { notice } => {
                println!("{notice}");
                return Ok(());
            }
            RosterCopy::Batch(batch) => {
                println!("{}", batch.text);
                info!(notice = %batch.notice, "roster batch");
                if batch.is_last {
                    return Ok(());
                }
                println!();
            }
        }
    }
}

async fn watch(source: &Source, config: &Config) -> anyhow::Result<()> {
    let mut dashboard = Dashboard::new();
    refresh_all(source, &mut dashboard, config).await;

    let listen = match (source, &config.notify_channel) {
        (Source::Postgres(pool), Some(channel)) => Some((pool.clone(), channel.clone())),
        _ => None,
    };
    let mut changes = refresh::subscribe(config.poll_interval, listen);
    let mut lights = tokio::time::interval(Duration::from_secs(1));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("stopping");
                break;
            }
            change = changes.next() => match change {
                Some(Changed::Tick) | Some(Changed::Notified) => {
                    refresh_all(source, &mut dashboard, config).await;
                }
                None => {
                    warn!("change subscription closed");
                    break;
                }
            },
            _ = lights.tick() => {
                print!("\x1b[2J\x1b[H{}", report::render_board(&dashboard.view(Utc::now())));
            }
        }
    }

    changes.cancel();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    config.csv = CsvPaths {
        students: cli.students_csv,
        logs: cli.logs_csv,
        answers: cli.answers_csv,
    };
    if let Some(limit) = cli.log_limit {
        config.log_limit = limit;
    }
    if let Commands::Watch {
        poll_secs: Some(secs),
    } = &cli.command
    {
        config.poll_interval = Duration::from_secs((*secs).max(1));
    }

    let source = connect(&config).await?;

    match cli.command {
        Commands::Snapshot { json } => {
            let mut dashboard = Dashboard::new();
            refresh_all(&source, &mut dashboard, &config).await;
            let view = dashboard.view(Utc::now());
            if json {
                println!("{}", serde_json::to_string_pretty(&view)?);
            } else {
                print!("{}", report::render_board(&view));
            }
        }
        Commands::Watch { .. } => watch(&source, &config).await?,
        Commands::Copy { kind } => match kind {
            CopyKind::Status => {
                let rows = source.fetch_roster().await.context("조회 실패. 다시 눌러주세요.")?;
                println!("{}", report::today_status_digest(&rows, Utc::now()));
            }
            CopyKind::Attendance => copy_roster(&source, RosterKind::Present).await?,
            CopyKind::Absent => copy_roster(&source, RosterKind::Absent).await?,
            CopyKind::AbsentTwoDays => {
                let rows = source.fetch_roster().await?;
                match report::absent_two_days_digest(&rows, Utc::now()) {
                    Some(text) => println!("{text}"),
                    None => println!("{NO_TWO_DAY_ABSENTEES}"),
                }
            }
        },
        Commands::Message { student, log } => {
            if let Some(name) = student {
                let students = source.fetch_students().await?;
                let Some(row) = students.iter().find(|row| row.name() == Some(name.trim())) else {
                    bail!("no student named {name}");
                };
                println!("{}", report::encouragement(row));
            } else if let Some(id) = log {
                let logs = source.fetch_logs(config.log_limit, None).await?;
                let Some(entry) = logs.iter().find(|entry| entry.id == id) else {
                    bail!("no recent event with id {id}");
                };
                println!("{}", report::encouragement_for_log(entry));
            }
        }
        Commands::Detail { student } => {
            let students = source.fetch_students().await?;
            let Some(row) = students.iter().find(|row| row.name() == Some(student.trim())) else {
                bail!("no student named {student}");
            };
            let student_id = row.student_id.as_deref().unwrap_or(&row.id);

            let answers = source
                .fetch_answer_logs(student_id, config.answer_log_limit)
                .await;
            let today = match &answers {
                Ok(rows) => Some(stats::aggregate(rows, Utc::now())),
                Err(err) => {
                    warn!(error = %err, student_id, "answer log unavailable");
                    None
                }
            };
            let view = today.as_ref().map_or(StatsView::Unavailable, StatsView::Ready);

            let logs = match source
                .fetch_logs(DETAIL_LOG_LIMIT as i64, row.name())
                .await
            {
                Ok(logs) => logs,
                Err(err) => {
                    warn!(error = %err, "event log unavailable");
                    Vec::new()
                }
            };
            println!("{}", report::detail_digest(row.name(), view, &logs));
        }
    }

    Ok(())
}
