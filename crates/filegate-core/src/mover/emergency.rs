use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::storage::Database;

use super::fsync_dir;

/// One line of the emergency orphan log. Written only when the orphan
/// registry itself is unwritable after a post-link failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct EmergencyOrphan {
    pub timestamp: String,
    pub pid: u32,
    pub original_path: String,
    pub orphan_path: String,
    pub file_size: u64,
    pub db_path: String,
}

/// Best-effort durable record of an orphan when the database is down.
/// Single O_APPEND write, then fsync of the file and its directory.
pub fn record(db: &Database, original: &Path, orphan: &Path, size: u64) {
    let Some(log_path) = db.emergency_log_path() else {
        error!(
            "no emergency log location; {} needs manual recovery to {}",
            orphan.display(),
            original.display()
        );
        return;
    };
    let entry = EmergencyOrphan {
        timestamp: Utc::now().to_rfc3339(),
        pid: std::process::id(),
        original_path: original.to_string_lossy().into_owned(),
        orphan_path: orphan.to_string_lossy().into_owned(),
        file_size: size,
        db_path: db.path().to_string_lossy().into_owned(),
    };
    if let Err(e) = append(&log_path, &entry) {
        error!(
            "cannot write orphan record anywhere ({}); {} needs manual recovery to {}",
            e,
            orphan.display(),
            original.display()
        );
    } else {
        error!(
            "database unavailable, orphan recorded in emergency log {}",
            log_path.display()
        );
    }
}

fn append(log_path: &Path, entry: &EmergencyOrphan) -> io::Result<()> {
    let mut line = serde_json::to_string(entry)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    line.push('\n');

    let mut file = OpenOptions::new().append(true).create(true).open(log_path)?;
    file.write_all(line.as_bytes())?;
    file.sync_all()?;
    if let Some(dir) = log_path.parent() {
        fsync_dir(dir)?;
    }
    Ok(())
}
