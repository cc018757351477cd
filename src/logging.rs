//! Structured logging for the Duet core.
//!
//! Writes daily log files under ~/.duet/logs with categories:
//! - TURN: turn lifecycle (dispatch, resolve, fallback)
//! - GATEWAY: completion/image calls and their outcomes
//! - SKETCH: sketch directive detection and rendering
//! - INGEST: context-node ingestion and link resolution
//! - ERROR: failures recovered into fallbacks

use chrono::{Local, Utc};
use once_cell::sync::Lazy;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy)]
pub enum LogCategory {
    Turn,
    Gateway,
    Sketch,
    Ingest,
    Error,
}

impl LogCategory {
    fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Turn => "TURN",
            LogCategory::Gateway => "GATEWAY",
            LogCategory::Sketch => "SKETCH",
            LogCategory::Ingest => "INGEST",
            LogCategory::Error => "ERROR",
        }
    }
}

static LOG_DIR: Lazy<Mutex<Option<PathBuf>>> = Lazy::new(|| Mutex::new(None));

fn default_log_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".duet/logs")
}

fn log_file_path() -> PathBuf {
    let dir = LOG_DIR
        .lock()
        .ok()
        .and_then(|guard| guard.clone())
        .unwrap_or_else(default_log_dir);
    let today = Local::now().format("%Y-%m-%d").to_string();
    dir.join(format!("duet-{}.log", today))
}

/// Initialize the logging system, creating the log directory if needed.
pub fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let dir = default_log_dir();
    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }
    if let Ok(mut guard) = LOG_DIR.lock() {
        *guard = Some(dir);
    }
    log(LogCategory::Turn, None, "Duet logging initialized");
    Ok(())
}

/// Log a message with category and optional session context.
pub fn log(category: LogCategory, session_id: Option<&str>, message: &str) {
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let session_context = session_id
        .map(|id| format!("session={} | ", &id[..8.min(id.len())]))
        .unwrap_or_default();

    let line = format!(
        "[{}] [{}] {}{}\n",
        timestamp,
        category.as_str(),
        session_context,
        message
    );

    // Console for dev, file for the record
    print!("{}", line);

    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path())
    {
        let _ = file.write_all(line.as_bytes());
    }
}

pub fn log_turn(session_id: Option<&str>, message: &str) {
    log(LogCategory::Turn, session_id, message);
}

pub fn log_gateway(session_id: Option<&str>, message: &str) {
    log(LogCategory::Gateway, session_id, message);
}

pub fn log_sketch(session_id: Option<&str>, message: &str) {
    log(LogCategory::Sketch, session_id, message);
}

pub fn log_ingest(session_id: Option<&str>, message: &str) {
    log(LogCategory::Ingest, session_id, message);
}

pub fn log_error(session_id: Option<&str>, message: &str) {
    log(LogCategory::Error, session_id, message);
}

/// Delete log files older than 7 days. Returns how many were removed.
pub fn cleanup_old_logs() -> Result<usize, Box<dyn std::error::Error>> {
    let dir = LOG_DIR
        .lock()
        .ok()
        .and_then(|guard| guard.clone())
        .unwrap_or_else(default_log_dir);
    if !dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(7);
    let mut deleted = 0;

    for entry in fs::read_dir(&dir)? {
        let entry = entry?;
        if let Ok(metadata) = entry.metadata() {
            if let Ok(modified) = metadata.modified() {
                let modified_time: chrono::DateTime<Utc> = modified.into();
                if modified_time < cutoff && fs::remove_file(entry.path()).is_ok() {
                    deleted += 1;
                }
            }
        }
    }

    Ok(deleted)
}
