use std::fs;
use std::io;
use std::path::Path;

use tracing::{info, warn};

use crate::error::Error;
use crate::mover::emergency::EmergencyOrphan;
use crate::mover::fsync_dir;
use crate::storage::{Database, MovePhase, OrphanStatus};

/// Outcome of the startup scan. All counters zero means the database was
/// clean.
#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub emergency_imported: usize,
    pub journal_rolled_back: usize,
    pub journal_written_off: usize,
    pub orphans_recovered: usize,
    pub orphans_failed: usize,
}

impl RecoveryReport {
    pub fn is_clean(&self) -> bool {
        self.emergency_imported == 0
            && self.journal_rolled_back == 0
            && self.journal_written_off == 0
            && self.orphans_recovered == 0
            && self.orphans_failed == 0
    }
}

/// Resolve every non-terminal journal row and every pending orphan.
///
/// Runs once per session, before the first file is processed. Repeated
/// invocation converges: after one pass every row is terminal, so a
/// second pass touches nothing.
pub fn run(db: &Database) -> Result<RecoveryReport, Error> {
    let mut report = RecoveryReport::default();
    report.emergency_imported = import_emergency_orphans(db);
    resolve_journal(db, &mut report)?;
    resolve_orphans(db, &mut report)?;
    if !report.is_clean() {
        info!(
            "recovery: {} journal rollbacks, {} written off, {} orphans recovered, {} orphans failed, {} emergency records imported",
            report.journal_rolled_back,
            report.journal_written_off,
            report.orphans_recovered,
            report.orphans_failed,
            report.emergency_imported,
        );
    }
    Ok(report)
}

fn resolve_journal(db: &Database, report: &mut RecoveryReport) -> Result<(), Error> {
    for row in db.journal_unterminated()? {
        let source = Path::new(&row.source_path);
        let dest = Path::new(&row.dest_path);

        // A planned row normally means the link was never created, but a
        // kill between link and promote leaves a planned row with a live
        // destination; both phases get the same idempotent rollback.
        match undo_link(source, dest) {
            Ok(true) => {
                db.journal_set_phase(row.id, MovePhase::Failed)?;
                info!(
                    "rolled back incomplete move ({:?}): {} -> {}",
                    row.phase,
                    dest.display(),
                    source.display()
                );
                report.journal_rolled_back += 1;
            }
            Ok(false) => {
                db.journal_set_phase(row.id, MovePhase::Failed)?;
                report.journal_written_off += 1;
            }
            Err(e) => {
                warn!(
                    "cannot roll back move {} -> {} ({}); registering orphan for inspection",
                    dest.display(),
                    source.display(),
                    e
                );
                db.orphan_add(&row.source_path, &row.dest_path, row.file_size as u64)?;
                db.journal_set_phase(row.id, MovePhase::Failed)?;
                report.journal_written_off += 1;
            }
        }
    }
    Ok(())
}

fn resolve_orphans(db: &Database, report: &mut RecoveryReport) -> Result<(), Error> {
    for row in db.orphan_list_pending()? {
        let original = Path::new(&row.original_path);
        let orphan = Path::new(&row.orphan_path);

        match undo_link(original, orphan) {
            Ok(true) => {
                db.orphan_mark(row.id, OrphanStatus::Recovered)?;
                info!(
                    "recovered orphan {} -> {}",
                    orphan.display(),
                    original.display()
                );
                report.orphans_recovered += 1;
            }
            Ok(false) => {
                warn!("orphan no longer exists: {}", orphan.display());
                db.orphan_mark(row.id, OrphanStatus::Failed)?;
                report.orphans_failed += 1;
            }
            Err(e) => {
                warn!(
                    "cannot recover orphan {} -> {}: {}",
                    orphan.display(),
                    original.display(),
                    e
                );
                db.orphan_mark(row.id, OrphanStatus::Failed)?;
                report.orphans_failed += 1;
            }
        }
    }
    Ok(())
}

/// Restore the pre-move state without stat-then-act races: attempt the
/// link back first and branch on the errno.
///
/// Returns Ok(true) if a stray destination link was undone, Ok(false) if
/// there was nothing to undo.
fn undo_link(source: &Path, dest: &Path) -> io::Result<bool> {
    match fs::hard_link(dest, source) {
        Ok(()) => {
            // Source restored; make it durable before dropping the vault copy.
            if let Some(p) = source.parent() {
                fsync_dir(p)?;
            }
            fs::remove_file(dest)?;
            if let Some(p) = dest.parent() {
                let _ = fsync_dir(p);
            }
            Ok(true)
        }
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            // Source survived the crash; the vault copy is redundant.
            match fs::remove_file(dest) {
                Ok(()) => {
                    if let Some(p) = dest.parent() {
                        let _ = fsync_dir(p);
                    }
                    Ok(true)
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Pull records out of the emergency log into the orphan registry. Lines
/// that cannot be parsed or re-registered are kept in place; the file is
/// removed once it is empty.
fn import_emergency_orphans(db: &Database) -> usize {
    let Some(log_path) = db.emergency_log_path() else {
        return 0;
    };
    let contents = match fs::read_to_string(&log_path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return 0,
        Err(e) => {
            warn!("cannot read emergency log {}: {}", log_path.display(), e);
            return 0;
        }
    };

    let mut imported = 0;
    let mut remaining: Vec<&str> = Vec::new();
    for line in contents.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<EmergencyOrphan>(line) {
            Ok(entry) => {
                if !Path::new(&entry.orphan_path).exists() {
                    warn!("emergency orphan no longer exists: {}", entry.orphan_path);
                    continue;
                }
                match db.orphan_add(&entry.original_path, &entry.orphan_path, entry.file_size) {
                    Ok(_) => imported += 1,
                    Err(e) => {
                        warn!("could not import emergency orphan: {}", e);
                        remaining.push(line);
                    }
                }
            }
            Err(e) => {
                warn!("unparseable emergency record kept for inspection: {}", e);
                remaining.push(line);
            }
        }
    }

    if let Err(e) = rewrite_emergency_log(&log_path, &remaining) {
        warn!("could not rewrite emergency log: {}", e);
    } else if imported > 0 {
        info!("imported {} emergency orphan records", imported);
    }
    imported
}

fn rewrite_emergency_log(log_path: &Path, remaining: &[&str]) -> io::Result<()> {
    if remaining.is_empty() {
        match fs::remove_file(log_path) {
            Ok(()) => {
                if let Some(dir) = log_path.parent() {
                    fsync_dir(dir)?;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        return Ok(());
    }

    // Rewrite via a temp file so a crash never leaves a half-written log.
    let tmp_path = log_path.with_extension("tmp");
    {
        use std::io::Write;
        let mut tmp = fs::File::create(&tmp_path)?;
        for line in remaining {
            writeln!(tmp, "{}", line)?;
        }
        tmp.sync_all()?;
    }
    fs::rename(&tmp_path, log_path)?;
    if let Some(dir) = log_path.parent() {
        fsync_dir(dir)?;
    }
    Ok(())
}
