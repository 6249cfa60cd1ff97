use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration, loaded from `ROLLCALL_*` environment
/// variables with defaults. Per-invocation values (course id, session
/// duration, observation file) come from CLI flags and override these.
pub struct Config {
    /// Path to the SQLite attendance database.
    pub db_path: PathBuf,
    /// Path to the label map artifact produced at training time.
    pub label_map_path: PathBuf,
    /// Directory the CSV report is written into.
    pub report_dir: PathBuf,
    /// Dissimilarity cutoff; observations at or above it are unknown.
    pub confidence_threshold: f64,
    /// Accepted sightings required before attendance is committed.
    pub confirmation_threshold: u32,
    /// Wall-clock session window.
    pub session_duration: Duration,
    /// Bounded observation queue depth between pipeline stages.
    pub queue_depth: usize,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("rollcall");

        let db_path = std::env::var("ROLLCALL_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("attendance.db"));

        let label_map_path = std::env::var("ROLLCALL_LABEL_MAP")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("labels.txt"));

        let report_dir = std::env::var("ROLLCALL_REPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."));

        Self {
            db_path,
            label_map_path,
            report_dir,
            confidence_threshold: env_f64(
                "ROLLCALL_CONFIDENCE_THRESHOLD",
                rollcall_core::aggregator::DEFAULT_CONFIDENCE_THRESHOLD,
            ),
            confirmation_threshold: env_u32(
                "ROLLCALL_CONFIRMATION_THRESHOLD",
                rollcall_core::aggregator::DEFAULT_CONFIRMATION_THRESHOLD,
            ),
            session_duration: Duration::from_secs(env_u64("ROLLCALL_SESSION_SECS", 120)),
            queue_depth: env_usize("ROLLCALL_QUEUE_DEPTH", 32),
        }
    }
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
