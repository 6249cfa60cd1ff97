use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::SecondsFormat;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use rollcall_core::types::Student;
use rollcall_core::{IdentityAggregator, LabelMap};
use rollcall_store::Store;

mod config;
mod replay;
mod report;
mod session;

use config::Config;
use replay::ReplaySource;
use session::{EndReason, SessionController};

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-recognition attendance sessions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a student (idempotent by name)
    AddStudent { name: String },
    /// Create a course
    AddCourse { name: String },
    /// List enrolled students in roster order
    Roster,
    /// List courses
    Courses,
    /// Run one attendance session and write the CSV report
    Run {
        /// Course id attendance is taken for
        #[arg(short, long)]
        course: i64,
        /// Observation replay file standing in for the camera pipeline
        #[arg(short, long)]
        observations: PathBuf,
        /// Session window in seconds (overrides ROLLCALL_SESSION_SECS)
        #[arg(long)]
        duration_secs: Option<u64>,
        /// Pacing between replayed observations, in milliseconds
        #[arg(long, default_value_t = 0)]
        frame_interval_ms: u64,
    },
    /// Regenerate the reconciliation report for a course
    Report {
        #[arg(short, long)]
        course: i64,
        /// Print JSON to stdout instead of writing the CSV
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    match cli.command {
        Commands::AddStudent { name } => {
            let store = open_store(&config)?;
            let student = store.insert_student(&name)?;
            println!("{} -> {}", student.id, student.name);
        }
        Commands::AddCourse { name } => {
            let store = open_store(&config)?;
            let course = store.insert_course(&name)?;
            println!("{} -> {}", course.id, course.name);
        }
        Commands::Roster => {
            let store = open_store(&config)?;
            for student in store.list_students()? {
                println!("{} -> {}", student.id, student.name);
            }
        }
        Commands::Courses => {
            let store = open_store(&config)?;
            for course in store.list_courses()? {
                println!("{} -> {}", course.id, course.name);
            }
        }
        Commands::Run {
            course,
            observations,
            duration_secs,
            frame_interval_ms,
        } => {
            run_session(
                &config,
                course,
                &observations,
                duration_secs.map(Duration::from_secs),
                Duration::from_millis(frame_interval_ms),
            )
            .await?;
        }
        Commands::Report { course, json } => {
            let store = open_store(&config)?;
            let course = store
                .find_course(course)?
                .with_context(|| format!("invalid course id: {course}"))?;
            let report = report::generate(&store, &course)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let path = report::write_csv(&report, &config.report_dir)?;
                println!(
                    "{}: {} present, {} absent",
                    course.name,
                    report.present_count(),
                    report.absent_count()
                );
                println!("Report: {}", path.display());
            }
        }
    }

    Ok(())
}

fn open_store(config: &Config) -> Result<Store> {
    Store::open(&config.db_path).context("attendance storage unavailable")
}

/// One bounded attendance-taking run. Fatal configuration problems are
/// diagnosed before any pipeline state exists; Ctrl-C raises the stop
/// flag the controller polls between observations.
async fn run_session(
    config: &Config,
    course_id: i64,
    observations: &std::path::Path,
    duration: Option<Duration>,
    frame_interval: Duration,
) -> Result<()> {
    let store = open_store(config)?;

    let courses = store.list_courses()?;
    if courses.is_empty() {
        bail!("no courses found — create one with `rollcall add-course`");
    }
    let course = store
        .find_course(course_id)?
        .with_context(|| format!("invalid course id: {course_id}"))?;

    let roster = store.list_students()?;
    if roster.is_empty() {
        bail!("roster is empty — enroll students with `rollcall add-student`");
    }

    let label_map = LabelMap::load(&config.label_map_path)
        .with_context(|| "cannot load label map; re-run training or set ROLLCALL_LABEL_MAP")?;
    let identities = resolve_identities(&store, &label_map)?;
    if identities.is_empty() {
        bail!("no label map entry matches a rostered student; nothing could ever be confirmed");
    }

    let source = ReplaySource::from_path(observations, frame_interval)?;

    let aggregator = IdentityAggregator::with_thresholds(
        identities,
        config.confidence_threshold,
        config.confirmation_threshold,
    );
    let mut controller = SessionController::new(
        duration.unwrap_or(config.session_duration),
        config.queue_depth,
    );
    tracing::debug!(state = ?controller.state(), "session controller ready");

    let stop = Arc::new(AtomicBool::new(false));
    let ctrl_c_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("stop requested");
            ctrl_c_stop.store(true, Ordering::Relaxed);
        }
    });

    // The pipeline is blocking by design (single camera, single
    // session); run it off the async runtime.
    let course_for_run = course.clone();
    let summary = tokio::task::spawn_blocking(move || {
        controller.run(Box::new(source), aggregator, &store, &course_for_run, stop)
    })
    .await
    .context("session task failed")??;

    let path = report::write_csv(&summary.report, &config.report_dir)?;

    let reason = match summary.end_reason {
        EndReason::DeadlineExpired => "session window elapsed",
        EndReason::SourceEnded => "observation stream ended",
        EndReason::Stopped => "stopped by user",
    };
    println!(
        "Session for {} (course {}) started {}: {reason}",
        course.name,
        summary.course_id,
        summary.started_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    println!(
        "  observations {}, confirmed {}, committed {}, already present {}, commit failures {}",
        summary.observations,
        summary.confirmed,
        summary.committed,
        summary.already_present,
        summary.commit_failures
    );
    println!(
        "  present {} / {}",
        summary.report.present_count(),
        summary.report.rows.len()
    );
    println!("Report: {}", path.display());

    Ok(())
}

/// Resolve the label map against the roster into the session's
/// immutable label → student lookup. Names with no roster entry are
/// warned about and skipped; their observations will read as unknown.
fn resolve_identities(
    store: &Store,
    label_map: &LabelMap,
) -> Result<HashMap<i32, Student>> {
    let mut identities = HashMap::new();
    for (label, name) in label_map.iter() {
        match store.find_student_by_name(name)? {
            Some(student) => {
                identities.insert(label, student);
            }
            None => {
                tracing::warn!(label, name, "label map names an unenrolled student; skipped");
            }
        }
    }
    Ok(identities)
}
