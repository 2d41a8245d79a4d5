use std::fs::{self, File};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::hasher::Fingerprint;
use crate::storage::{Database, MovePhase};

pub mod emergency;
pub mod signal;

/// Journaled, fsync-ordered relocation of a unique file into the vault.
///
/// The protocol per move: plan a journal row, then, with termination
/// signals deferred, hard-link the file into its shard, make the link
/// durable (directory fsyncs from the vault root outward), promote the
/// row to `moving`, unlink the source, fsync the source directory, and
/// promote the row to `completed`. A failure after the link leaves a live
/// vault copy, which is registered in the orphan registry (or, if the
/// database is down, in the emergency log).
pub struct Mover<'a> {
    db: &'a Database,
    vault: &'a Path,
}

impl<'a> Mover<'a> {
    pub fn new(db: &'a Database, vault: &'a Path) -> Self {
        Mover { db, vault }
    }

    /// Relocate `src` into the vault and return the stored path.
    ///
    /// The shard id is the full-content fingerprint when the caller has
    /// one (tier 3); otherwise a fresh random id, so the file can be
    /// placed without hashing all of it.
    pub fn store(
        &self,
        src: &Path,
        size: u64,
        full: Option<&Fingerprint>,
    ) -> Result<PathBuf, Error> {
        let id = match full {
            Some(fp) => fp.to_hex(),
            None => Uuid::new_v4().simple().to_string(),
        };
        let dest = shard_path(self.vault, &id, &name_suffix(src));

        self.check_same_device(src)?;
        if dest.exists() {
            return Err(Error::DestinationExists(dest));
        }

        let journal_id = self.db.journal_plan(
            &src.to_string_lossy(),
            &dest.to_string_lossy(),
            size,
        )?;

        let guard = signal::CriticalSection::enter()?;
        let moved = self.execute(src, &dest, size, journal_id);
        drop(guard);

        moved.map(|()| {
            debug!("stored {} as {}", src.display(), dest.display());
            dest
        })
    }

    /// Hard links never cross filesystems; reject before journaling so a
    /// doomed attempt leaves no trace.
    fn check_same_device(&self, src: &Path) -> Result<(), Error> {
        let src_dev = fs::metadata(src)?.dev();
        let vault_dev = fs::metadata(self.vault)?.dev();
        if src_dev != vault_dev {
            return Err(Error::CrossDevice {
                src: src.to_path_buf(),
                dest: self.vault.to_path_buf(),
            });
        }
        Ok(())
    }

    fn execute(
        &self,
        src: &Path,
        dest: &Path,
        size: u64,
        journal_id: i64,
    ) -> Result<(), Error> {
        let parent = dest.parent().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "destination has no parent")
        })?;

        // Shard directories, outermost first, so their entries can be
        // fsynced in creation order.
        let mut created: Vec<PathBuf> = Vec::new();
        let mut cursor = parent.to_path_buf();
        while !cursor.exists() {
            created.push(cursor.clone());
            match cursor.parent() {
                Some(p) if !p.as_os_str().is_empty() => cursor = p.to_path_buf(),
                _ => break,
            }
        }
        created.reverse();
        if !created.is_empty() {
            if let Err(e) = fs::create_dir_all(parent) {
                self.write_off(journal_id);
                return Err(e.into());
            }
        }

        if let Err(e) = fs::hard_link(src, dest) {
            self.write_off(journal_id);
            return Err(classify_link_error(e, src, dest));
        }

        match self.finish(src, parent, &created, journal_id) {
            Ok(()) => Ok(()),
            Err(cause) => self.register_orphan(src, dest, size, journal_id, cause),
        }
    }

    /// Steps after the link is live. Ordering is load-bearing: the new
    /// directory entries must be durable before the source disappears.
    fn finish(
        &self,
        src: &Path,
        parent: &Path,
        created: &[PathBuf],
        journal_id: i64,
    ) -> Result<(), Error> {
        for dir in created {
            if let Some(p) = dir.parent() {
                fsync_dir(p)?;
            }
        }
        fsync_dir(parent)?;

        self.db.journal_set_phase(journal_id, MovePhase::Moving)?;

        fs::remove_file(src)?;
        if let Some(p) = src.parent() {
            fsync_dir(p)?;
        }

        self.db.journal_set_phase(journal_id, MovePhase::Completed)?;
        Ok(())
    }

    /// The vault copy is live but the move did not complete. Record it so
    /// recovery can reconcile, then surface the original failure.
    fn register_orphan(
        &self,
        src: &Path,
        dest: &Path,
        size: u64,
        journal_id: i64,
        cause: Error,
    ) -> Result<(), Error> {
        warn!(
            "move of {} failed after link ({}); registering orphan {}",
            src.display(),
            cause,
            dest.display()
        );
        match self
            .db
            .orphan_add(&src.to_string_lossy(), &dest.to_string_lossy(), size)
        {
            Ok(_) => {
                self.write_off(journal_id);
                Err(cause)
            }
            Err(db_err) => {
                emergency::record(self.db, src, dest, size);
                Err(Error::DatabaseUnavailable(db_err.to_string()))
            }
        }
    }

    fn write_off(&self, journal_id: i64) {
        if let Err(e) = self.db.journal_set_phase(journal_id, MovePhase::Failed) {
            warn!("could not mark journal row {} failed: {}", journal_id, e);
        }
    }
}

/// `<vault>/<id[0:2]>/<id[2:]><suffix>`: two-level hex sharding, 256
/// shards, so per-directory entry counts stay bounded.
pub fn shard_path(vault: &Path, id: &str, suffix: &str) -> PathBuf {
    vault.join(&id[..2]).join(format!("{}{}", &id[2..], suffix))
}

fn name_suffix(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default()
}

fn classify_link_error(e: io::Error, src: &Path, dest: &Path) -> Error {
    if e.kind() == io::ErrorKind::AlreadyExists {
        Error::DestinationExists(dest.to_path_buf())
    } else if e.raw_os_error() == Some(libc::EXDEV) {
        Error::CrossDevice {
            src: src.to_path_buf(),
            dest: dest.to_path_buf(),
        }
    } else {
        Error::Io(e)
    }
}

/// Make directory-entry changes durable. Without this a completed move
/// may not survive power loss even though the file data is intact.
pub(crate) fn fsync_dir(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() {
        return Ok(());
    }
    File::open(dir)?.sync_all()
}
