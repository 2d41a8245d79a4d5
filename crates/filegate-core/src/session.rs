use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use crate::engine::{Pipeline, ProcessRecord};
use crate::error::Error;
use crate::hasher::{FringeMode, XxFingerprinter};
use crate::recovery;
use crate::scanner::Walker;
use crate::storage::{Database, IndexStats, OrphanRow};

/// How a session is opened. Without a vault the session is read-only:
/// indices are updated but nothing is relocated.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub db_path: PathBuf,
    pub vault: Option<PathBuf>,
    pub hdd_mode: bool,
    pub ignore_patterns: Vec<String>,
}

impl SessionOptions {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        SessionOptions {
            db_path: db_path.into(),
            vault: None,
            hdd_mode: false,
            ignore_patterns: Vec::new(),
        }
    }

    pub fn with_vault(mut self, vault: impl Into<PathBuf>) -> Self {
        self.vault = Some(vault.into());
        self
    }

    pub fn with_hdd_mode(mut self, hdd_mode: bool) -> Self {
        self.hdd_mode = hdd_mode;
        self
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }
}

/// Scoped ownership of the index store. Opening verifies the schema,
/// binds the fringe mode, and runs recovery; the store closes when the
/// session drops.
pub struct Session {
    db: Database,
    hasher: XxFingerprinter,
    vault: Option<PathBuf>,
    ignore_patterns: Vec<String>,
    cancel: Arc<AtomicBool>,
}

impl Session {
    pub fn open(options: SessionOptions) -> Result<Session, Error> {
        let mode = if options.hdd_mode {
            FringeMode::Contiguous
        } else {
            FringeMode::Edge
        };

        let db = Database::open(&options.db_path)?;

        // A database is bound to the fringe reader it was created with;
        // the two readers produce incompatible fingerprints.
        match db.fringe_mode()? {
            None => db.set_fringe_mode(mode.as_str())?,
            Some(stored) if stored == mode.as_str() => {}
            Some(stored) => {
                return Err(Error::FringeModeMismatch {
                    stored,
                    requested: mode.as_str().to_string(),
                })
            }
        }

        if let Some(vault) = &options.vault {
            fs::create_dir_all(vault)?;
        }

        let report = recovery::run(&db)?;
        if report.is_clean() {
            debug!("recovery: database clean");
        }

        info!(
            "session opened on {} ({} mode)",
            options.db_path.display(),
            if options.vault.is_some() {
                "active"
            } else {
                "read-only"
            }
        );

        Ok(Session {
            db,
            hasher: XxFingerprinter::new(mode),
            vault: options.vault,
            ignore_patterns: options.ignore_patterns,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Token observed between files; setting it ends a directory batch
    /// cleanly after the in-flight record.
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn process_file(&self, path: &Path) -> Result<ProcessRecord, Error> {
        self.pipeline().process(path)
    }

    /// Lazily process every regular file under `root` in deterministic
    /// order. An `Err` item is a session-level fault; the caller should
    /// stop consuming.
    pub fn process_directory(
        &self,
        root: &Path,
        recursive: bool,
    ) -> Result<impl Iterator<Item = Result<ProcessRecord, Error>> + '_, Error> {
        let walker = Walker::new(root, recursive, &self.ignore_patterns)?;
        let cancel = self.cancel.clone();
        Ok(walker
            .take_while(move |_| !cancel.load(Ordering::Relaxed))
            .map(move |path| self.pipeline().process(&path)))
    }

    pub fn stats(&self) -> Result<IndexStats, Error> {
        Ok(self.db.stats()?)
    }

    pub fn orphans(&self) -> Result<Vec<OrphanRow>, Error> {
        Ok(self.db.orphan_list_pending()?)
    }

    fn pipeline(&self) -> Pipeline<'_> {
        Pipeline::new(&self.db, &self.hasher, self.vault.as_deref())
    }
}
