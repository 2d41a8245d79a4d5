use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::Error;
use crate::hasher::{Fingerprint, Fingerprinter};
use crate::mover::{emergency, Mover};
use crate::storage::Database;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupResult {
    Unique,
    Duplicate,
    Skipped,
}

/// Per-file decision record. Field names are part of the invoker contract.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRecord {
    pub result: DedupResult,
    pub tier: u8,
    pub original_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stored_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProcessRecord {
    fn unique(path: &Path, tier: u8, stored: PathBuf) -> Self {
        ProcessRecord {
            result: DedupResult::Unique,
            tier,
            original_path: path.to_path_buf(),
            stored_path: Some(stored),
            duplicate_of: None,
            error: None,
        }
    }

    fn duplicate(path: &Path, tier: u8, of: PathBuf) -> Self {
        ProcessRecord {
            result: DedupResult::Duplicate,
            tier,
            original_path: path.to_path_buf(),
            stored_path: None,
            duplicate_of: Some(of),
            error: None,
        }
    }

    fn skipped(path: &Path, tier: u8, error: String) -> Self {
        ProcessRecord {
            result: DedupResult::Skipped,
            tier,
            original_path: path.to_path_buf(),
            stored_path: None,
            duplicate_of: None,
            error: Some(error),
        }
    }
}

/// The four-tier short-circuit decision procedure.
///
/// Tier 0 stats the file and drops empties, tier 1 consults the size
/// index, tier 2 the edge-fingerprint filter, and tier 3 the
/// full-content index. Each tier reads strictly more of the file than
/// the last, and a later tier never revises an earlier decision.
pub struct Pipeline<'a> {
    db: &'a Database,
    hasher: &'a dyn Fingerprinter,
    vault: Option<&'a Path>,
}

impl<'a> Pipeline<'a> {
    pub fn new(db: &'a Database, hasher: &'a dyn Fingerprinter, vault: Option<&'a Path>) -> Self {
        Pipeline { db, hasher, vault }
    }

    /// Decide one file. `Ok` records may be SKIPPED with an embedded
    /// error; an `Err` is a session-level fault and ends the batch.
    pub fn process(&self, path: &Path) -> Result<ProcessRecord, Error> {
        // Tier 0: one metadata probe per file.
        let meta = match fs::symlink_metadata(path) {
            Ok(m) => m,
            Err(e) => return Ok(ProcessRecord::skipped(path, 0, e.to_string())),
        };
        if !meta.is_file() {
            return Ok(ProcessRecord::skipped(path, 0, "not a regular file".to_string()));
        }
        let size = meta.len();
        if size == 0 {
            return Ok(ProcessRecord::skipped(path, 0, "empty".to_string()));
        }

        // Tier 1: an unseen size cannot be a duplicate.
        if !self.db.size_seen(size)? {
            return self.register_unique(path, size, None, None, 1);
        }

        // Tier 2: edge fingerprint. A hit is not yet a duplicate, only a
        // reason to read the whole file.
        let fringe = match self.hasher.fringe(path, size) {
            Ok(fp) => fp,
            Err(e) => return Ok(ProcessRecord::skipped(path, 2, e.to_string())),
        };
        if self.db.fringe_lookup(&fringe, size)?.is_none() {
            return self.register_unique(path, size, Some(fringe), None, 2);
        }

        // Tier 3: the full index is the sole oracle.
        let full = match self.hasher.full(path) {
            Ok(fp) => fp,
            Err(e) => return Ok(ProcessRecord::skipped(path, 3, e.to_string())),
        };
        if let Some(existing) = self.db.full_lookup(&full)? {
            let existing = PathBuf::from(existing);
            if same_file(path, &existing) {
                // Re-presentation of an already indexed file, e.g. a
                // re-scan of the vault. Not a duplicate of itself.
                return Ok(ProcessRecord::unique(path, 3, path.to_path_buf()));
            }
            debug!("{} duplicates {}", path.display(), existing.display());
            return Ok(ProcessRecord::duplicate(path, 3, existing));
        }
        self.register_unique(path, size, Some(fringe), Some(full), 3)
    }

    /// Move the file (active mode), backfill whichever fingerprints the
    /// deciding tier skipped, then commit all index rows for the decision
    /// in one transaction.
    fn register_unique(
        &self,
        path: &Path,
        size: u64,
        fringe: Option<Fingerprint>,
        full: Option<Fingerprint>,
        tier: u8,
    ) -> Result<ProcessRecord, Error> {
        let stored = match self.vault {
            // Files already inside the vault are never relocated again;
            // re-scans of the vault must not shuffle shards.
            Some(vault) if !path.starts_with(vault) => {
                let mover = Mover::new(self.db, vault);
                match mover.store(path, size, full.as_ref()) {
                    Ok(dest) => dest,
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!("move rejected for {}: {}", path.display(), e);
                        return Ok(ProcessRecord::skipped(path, tier, e.to_string()));
                    }
                }
            }
            _ => path.to_path_buf(),
        };

        // Fingerprints the deciding tier never computed are taken from
        // the stored copy (identical content, and the source may already
        // be unlinked). Every admitted file lands in all three indices,
        // so a later byte-identical file always resolves at tier 3.
        let fringe = match fringe {
            Some(fp) => fp,
            None => match self.hasher.fringe(&stored, size) {
                Ok(fp) => fp,
                Err(e) => return self.backfill_failure(path, &stored, size, tier, e),
            },
        };
        let full = match full {
            Some(fp) => fp,
            None => match self.hasher.full(&stored) {
                Ok(fp) => fp,
                Err(e) => return self.backfill_failure(path, &stored, size, tier, e),
            },
        };

        if let Err(e) = self.commit_indices(&stored, size, &fringe, &full) {
            return self.index_failure(path, &stored, size, e);
        }
        Ok(ProcessRecord::unique(path, tier, stored))
    }

    fn commit_indices(
        &self,
        stored: &Path,
        size: u64,
        fringe: &Fingerprint,
        full: &Fingerprint,
    ) -> rusqlite::Result<()> {
        let stored_str = stored.to_string_lossy();
        let tx = self.db.connection().unchecked_transaction()?;
        self.db.size_insert(size)?;
        self.db.fringe_insert(fringe, size, &stored_str)?;
        self.db.full_insert(full, &stored_str)?;
        tx.commit()
    }

    /// A fingerprint read failed after the decision and, in active mode,
    /// after the move. Nothing was committed; hand the moved file to the
    /// orphan registry so recovery can put it back.
    fn backfill_failure(
        &self,
        path: &Path,
        stored: &Path,
        size: u64,
        tier: u8,
        cause: io::Error,
    ) -> Result<ProcessRecord, Error> {
        if stored != path {
            warn!(
                "could not fingerprint stored copy {} ({}); registering orphan",
                stored.display(),
                cause
            );
            if let Err(db_err) = self
                .db
                .orphan_add(&path.to_string_lossy(), &stored.to_string_lossy(), size)
            {
                emergency::record(self.db, path, stored, size);
                return Err(Error::DatabaseUnavailable(db_err.to_string()));
            }
        }
        Ok(ProcessRecord::skipped(path, tier, cause.to_string()))
    }

    /// The store went unwritable after the decision. In active mode the
    /// moved file is now unindexed; register it as an orphan (or fall
    /// back to the emergency log) before surfacing the fault.
    fn index_failure(
        &self,
        path: &Path,
        stored: &Path,
        size: u64,
        cause: rusqlite::Error,
    ) -> Result<ProcessRecord, Error> {
        if self.vault.is_some() && stored != path {
            error!(
                "index commit failed after move of {} ({}); registering orphan",
                path.display(),
                cause
            );
            if self
                .db
                .orphan_add(&path.to_string_lossy(), &stored.to_string_lossy(), size)
                .is_err()
            {
                emergency::record(self.db, path, stored, size);
            }
        }
        Err(Error::DatabaseUnavailable(cause.to_string()))
    }
}

/// True when both paths resolve to the same file on disk.
fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}
