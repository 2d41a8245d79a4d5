use chrono::Utc;
use rusqlite::{params, OptionalExtension, Result};

use super::models::{IndexStats, JournalRow, MovePhase, OrphanRow, OrphanStatus};
use super::sqlite::Database;
use crate::hasher::Fingerprint;

const FRINGE_MODE_KEY: &str = "fringe_mode";

impl Database {
    // ── Dedup indices ────────────────────────────────────────────

    pub fn size_seen(&self, size: u64) -> Result<bool> {
        let row: Option<i64> = self
            .connection()
            .query_row(
                "SELECT 1 FROM size_index WHERE file_size = ?1",
                params![size as i64],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    pub fn size_insert(&self, size: u64) -> Result<()> {
        self.connection().execute(
            "INSERT OR IGNORE INTO size_index (file_size) VALUES (?1)",
            params![size as i64],
        )?;
        Ok(())
    }

    pub fn fringe_lookup(&self, fringe: &Fingerprint, size: u64) -> Result<Option<String>> {
        self.connection()
            .query_row(
                "SELECT file_path FROM fringe_index WHERE fringe_hash = ?1 AND file_size = ?2",
                params![fringe.as_bytes().to_vec(), size as i64],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn fringe_insert(&self, fringe: &Fingerprint, size: u64, path: &str) -> Result<()> {
        self.connection().execute(
            "INSERT INTO fringe_index (fringe_hash, file_size, file_path) VALUES (?1, ?2, ?3) \
             ON CONFLICT DO NOTHING",
            params![fringe.as_bytes().to_vec(), size as i64, path],
        )?;
        Ok(())
    }

    pub fn full_lookup(&self, full: &Fingerprint) -> Result<Option<String>> {
        self.connection()
            .query_row(
                "SELECT file_path FROM full_index WHERE full_hash = ?1",
                params![full.as_bytes().to_vec()],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn full_insert(&self, full: &Fingerprint, path: &str) -> Result<()> {
        self.connection().execute(
            "INSERT INTO full_index (full_hash, file_path) VALUES (?1, ?2) \
             ON CONFLICT DO NOTHING",
            params![full.as_bytes().to_vec(), path],
        )?;
        Ok(())
    }

    // ── Move journal ─────────────────────────────────────────────

    pub fn journal_plan(&self, source: &str, dest: &str, size: u64) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO move_journal (source_path, dest_path, file_size, created_at, phase) \
             VALUES (?1, ?2, ?3, ?4, 'planned')",
            params![source, dest, size as i64, Utc::now().to_rfc3339()],
        )?;
        Ok(self.connection().last_insert_rowid())
    }

    pub fn journal_set_phase(&self, id: i64, phase: MovePhase) -> Result<()> {
        let completed_at = phase.is_terminal().then(|| Utc::now().to_rfc3339());
        self.connection().execute(
            "UPDATE move_journal SET phase = ?1, completed_at = ?2 WHERE id = ?3",
            params![phase, completed_at, id],
        )?;
        Ok(())
    }

    /// Rows whose move neither completed nor was written off.
    pub fn journal_unterminated(&self) -> Result<Vec<JournalRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, source_path, dest_path, file_size, created_at, phase \
             FROM move_journal WHERE phase NOT IN ('completed', 'failed') ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(JournalRow {
                    id: row.get(0)?,
                    source_path: row.get(1)?,
                    dest_path: row.get(2)?,
                    file_size: row.get(3)?,
                    created_at: row.get(4)?,
                    phase: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ── Orphan registry ──────────────────────────────────────────

    /// Register a vault file that escaped indexing. Idempotent on the
    /// orphan path; returns the row id either way.
    pub fn orphan_add(&self, original: &str, orphan: &str, size: u64) -> Result<i64> {
        self.connection().execute(
            "INSERT INTO orphan_registry (original_path, orphan_path, file_size, created_at, status) \
             VALUES (?1, ?2, ?3, ?4, 'pending') \
             ON CONFLICT(orphan_path) DO NOTHING",
            params![original, orphan, size as i64, Utc::now().to_rfc3339()],
        )?;
        self.connection().query_row(
            "SELECT id FROM orphan_registry WHERE orphan_path = ?1",
            params![orphan],
            |row| row.get(0),
        )
    }

    pub fn orphan_list_pending(&self) -> Result<Vec<OrphanRow>> {
        let mut stmt = self.connection().prepare(
            "SELECT id, original_path, orphan_path, file_size, created_at \
             FROM orphan_registry WHERE status = 'pending' ORDER BY id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok(OrphanRow {
                    id: row.get(0)?,
                    original_path: row.get(1)?,
                    orphan_path: row.get(2)?,
                    file_size: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn orphan_mark(&self, id: i64, status: OrphanStatus) -> Result<()> {
        let recovered_at = match status {
            OrphanStatus::Pending => None,
            _ => Some(Utc::now().to_rfc3339()),
        };
        self.connection().execute(
            "UPDATE orphan_registry SET status = ?1, recovered_at = ?2 WHERE id = ?3",
            params![status, recovered_at, id],
        )?;
        Ok(())
    }

    // ── Vault metadata ───────────────────────────────────────────

    pub fn fringe_mode(&self) -> Result<Option<String>> {
        self.connection()
            .query_row(
                "SELECT value FROM vault_meta WHERE key = ?1",
                params![FRINGE_MODE_KEY],
                |row| row.get(0),
            )
            .optional()
    }

    pub fn set_fringe_mode(&self, mode: &str) -> Result<()> {
        self.connection().execute(
            "INSERT INTO vault_meta (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![FRINGE_MODE_KEY, mode],
        )?;
        Ok(())
    }

    // ── Statistics ───────────────────────────────────────────────

    pub fn schema_version(&self) -> Result<i64> {
        self.connection().query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let count = |sql: &str| -> Result<i64> {
            self.connection().query_row(sql, [], |row| row.get(0))
        };
        Ok(IndexStats {
            unique_sizes: count("SELECT COUNT(*) FROM size_index")?,
            fringe_entries: count("SELECT COUNT(*) FROM fringe_index")?,
            full_entries: count("SELECT COUNT(*) FROM full_index")?,
            pending_orphans: count(
                "SELECT COUNT(*) FROM orphan_registry WHERE status = 'pending'",
            )?,
            unterminated_journal: count(
                "SELECT COUNT(*) FROM move_journal WHERE phase NOT IN ('completed', 'failed')",
            )?,
            schema_version: self.schema_version()?,
        })
    }
}
