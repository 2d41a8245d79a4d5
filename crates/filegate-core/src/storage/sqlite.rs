use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::Connection;
use tracing::debug;

use crate::error::Error;

pub const SCHEMA_VERSION: i64 = 1;

/// File name of the fallback orphan log written beside the database when
/// the database itself is unwritable.
pub const EMERGENCY_LOG_NAME: &str = "emergency_orphans.jsonl";

pub struct Database {
    conn: Connection,
    db_path: PathBuf,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let conn = Connection::open(path)?;
        let db = Database {
            conn,
            db_path: path.to_path_buf(),
        };
        db.configure_pragmas()?;
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory()?;
        let db = Database {
            conn,
            db_path: PathBuf::from(":memory:"),
        };
        db.configure_pragmas()?;
        db.init_schema()?;
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<(), Error> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             PRAGMA locking_mode = EXCLUSIVE;
             PRAGMA cache_size = -64000;
             PRAGMA mmap_size = 268435456;
             PRAGMA busy_timeout = 5000;
             PRAGMA temp_store = MEMORY;",
        )?;
        debug!("SQLite pragmas configured (WAL, FULL sync, exclusive lock, 64MB cache, 256MB mmap)");
        Ok(())
    }

    /// Create the schema on a fresh database, or verify the version row on
    /// an existing one. Any mismatch refuses to open: the store holds
    /// authoritative state, not derived data.
    fn init_schema(&self) -> Result<(), Error> {
        let table_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'",
            [],
            |row| row.get(0),
        )?;
        let has_version_table: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |row| row.get(0),
        )?;
        if table_count > 0 && has_version_table == 0 {
            return Err(Error::SchemaMismatch {
                found: 0,
                expected: SCHEMA_VERSION,
            });
        }

        self.conn.execute_batch(include_str!("schema.sql"))?;

        let found: i64 = self.conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;
        if found == 0 {
            self.conn.execute(
                "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                rusqlite::params![SCHEMA_VERSION, Utc::now().to_rfc3339()],
            )?;
            debug!("SQLite schema initialized (version {})", SCHEMA_VERSION);
        } else if found != SCHEMA_VERSION {
            return Err(Error::SchemaMismatch {
                found,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Location of the emergency orphan log, beside the database file.
    /// None for in-memory databases.
    pub fn emergency_log_path(&self) -> Option<PathBuf> {
        if self.db_path == Path::new(":memory:") {
            return None;
        }
        self.db_path.parent().map(|dir| dir.join(EMERGENCY_LOG_NAME))
    }
}
