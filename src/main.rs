//! CLI entry point for the attendance rater.
//!
//! Provides subcommands for daily summaries, monthly per-student reports,
//! class rosters, and submitting a marking session to the backend.

use anyhow::{Context, Result};
use attendance_rater::analyzers::analyzer::AttendanceAggregator;
use attendance_rater::analyzers::utility::{format_ymd, parse_ymd};
use attendance_rater::config::AppConfig;
use attendance_rater::infra::backend::BackendClient;
use attendance_rater::infra::cache::CachedSource;
use attendance_rater::marking::{MarkSheet, submit_marking};
use attendance_rater::model::{AttendanceFilter, MonthStart};
use attendance_rater::output::{print_json, print_pretty, write_report_csv};
use attendance_rater::services::attendance_api::{AttendanceSource, StudentDirectory};
use attendance_rater::stats::DailyStats;
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Upper bound on cached daily lookups.
const CACHE_CAPACITY: u64 = 10_000;

#[derive(Parser)]
#[command(name = "attendance_rater")]
#[command(about = "Daily and monthly attendance reports for a school backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Only records of this class
    #[arg(short, long)]
    class: Option<String>,

    /// Only records of this timeslot
    #[arg(short, long)]
    timeslot: Option<String>,
}

impl FilterArgs {
    fn into_filter(self) -> Result<AttendanceFilter> {
        Ok(AttendanceFilter::new(self.class, self.timeslot)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show all attendance records of one day
    Daily {
        /// Date as YYYY-MM-DD (defaults to today, UTC)
        #[arg(short, long)]
        date: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Log the records as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Build the per-student report of one month
    Monthly {
        /// Month as YYYY-MM or YYYY-MM-01 (defaults to the current month, UTC)
        #[arg(short, long)]
        month: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,

        /// CSV file to write the report to
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Log the report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List the students of a class
    Roster {
        /// Class id
        #[arg(value_name = "CLASS_ID")]
        class: String,
    },
    /// Validate and save a marking session
    Mark {
        /// Class id
        #[arg(short, long)]
        class: String,

        /// Timeslot id
        #[arg(short, long)]
        timeslot: String,

        /// Date as YYYY-MM-DD (defaults to today, UTC)
        #[arg(short, long)]
        date: Option<String>,

        /// JSON file mapping student id to present|absent|late|unmarked
        #[arg(short, long, value_name = "FILE")]
        marks: PathBuf,

        /// Free-text notes stored with the record
        #[arg(short, long)]
        notes: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env()?;

    // Logging setup: colored stderr + JSON rolling log file
    let log_dir = Path::new(&config.log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&config.log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("attendance_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let backend = Arc::new(BackendClient::new(&config.api_base, config.fetch_timeout)?);

    match cli.command {
        Commands::Daily { date, filter, json } => {
            let date = date_or_today(date.as_deref())?;
            let filter = filter.into_filter()?;
            let aggregator = aggregator(&config, backend);

            let records = aggregator
                .compute_daily_summary(date, &filter)
                .await
                .with_context(|| {
                    format!("failed to fetch daily summary for {}", format_ymd(date))
                })?;

            if records.is_empty() {
                info!(date = %date, "No attendance records for this date");
            }
            for record in &records {
                info!(
                    class_id = record.class_id(),
                    timeslot_id = record.timeslot_id(),
                    present = record.present().len(),
                    absent = record.absent().len(),
                    late = record.late().len(),
                    "Record"
                );
            }

            let stats = DailyStats::from_records(&records);
            info!(
                records = stats.records,
                present = stats.present,
                absent = stats.absent,
                late = stats.late,
                average_percentage = stats.average_percentage,
                largest_roster = stats.largest_roster,
                "Daily summary"
            );

            if json {
                print_json(&records)?;
            } else {
                print_pretty(&stats);
            }
        }
        Commands::Monthly {
            month,
            filter,
            csv,
            json,
        } => {
            let month = month_or_current(month.as_deref())?;
            let filter = filter.into_filter()?;
            let aggregator = aggregator(&config, backend.clone())
                .with_directory(backend as Arc<dyn StudentDirectory>);

            let tallies = match aggregator.compute_monthly_report(month, &filter).await {
                Ok(tallies) => tallies,
                Err(e) => {
                    error!(month = %month, error = %e, "Failed to build report");
                    return Err(e.into());
                }
            };

            if tallies.is_empty() {
                info!(month = %month, "No data for this month");
            }
            for tally in &tallies {
                info!(
                    student = %tally.name,
                    reg_no = %tally.reg_no,
                    present = tally.present,
                    absent = tally.absent,
                    late = tally.late,
                    percentage = tally.percentage,
                    standing = %tally.standing(),
                    "Student"
                );
            }

            if let Some(path) = csv {
                write_report_csv(&path, &tallies)?;
                info!(path = %path.display(), rows = tallies.len(), "Report written");
            }
            if json {
                print_json(&tallies)?;
            }
        }
        Commands::Roster { class } => {
            let students = backend.fetch_students_by_class(&class).await?;
            info!(class_id = %class, total = students.len(), "Roster fetched");
            for student in &students {
                info!(
                    student_id = %student.id,
                    name = student.name.as_deref().unwrap_or("—"),
                    reg_no = student.reg_no.as_deref().unwrap_or("—"),
                    "Student"
                );
            }
        }
        Commands::Mark {
            class,
            timeslot,
            date,
            marks,
            notes,
        } => {
            let date = date_or_today(date.as_deref())?;
            let marks = load_marks(&marks)?;

            let record = submit_marking(
                backend.as_ref(),
                backend.as_ref(),
                &class,
                &timeslot,
                date,
                &marks.0,
                notes.as_deref(),
            )
            .await?;
            print_pretty(&record);
        }
    }

    Ok(())
}

/// Builds an aggregator over the backend, behind the daily cache when enabled.
fn aggregator(
    config: &AppConfig,
    backend: Arc<BackendClient>,
) -> AttendanceAggregator<dyn AttendanceSource> {
    let source: Arc<dyn AttendanceSource> = if config.cache_ttl.is_zero() {
        backend
    } else {
        Arc::new(CachedSource::new(backend, config.cache_ttl, CACHE_CAPACITY))
    };

    AttendanceAggregator::new(source)
        .with_concurrency(config.fetch_concurrency)
        .with_deadline(config.report_timeout)
}

fn date_or_today(date: Option<&str>) -> Result<NaiveDate> {
    match date {
        Some(s) => Ok(parse_ymd(s)?),
        None => Ok(Utc::now().date_naive()),
    }
}

fn month_or_current(month: Option<&str>) -> Result<MonthStart> {
    match month {
        Some(s) => Ok(s.parse()?),
        None => {
            let today = Utc::now().date_naive();
            let first = today
                .with_day(1)
                .context("current date has no first day of month")?;
            Ok(MonthStart::new(first)?)
        }
    }
}

/// Reads a `{ "<student id>": "<mark>" }` JSON file.
fn load_marks(path: &Path) -> Result<MarkSheet> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read marks file {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("invalid marks file {}", path.display()))
}
