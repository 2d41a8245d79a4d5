use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};

/// Lifecycle of a move intent. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePhase {
    Planned,
    Moving,
    Completed,
    Failed,
}

impl MovePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovePhase::Planned => "planned",
            MovePhase::Moving => "moving",
            MovePhase::Completed => "completed",
            MovePhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, MovePhase::Completed | MovePhase::Failed)
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "planned" => Some(MovePhase::Planned),
            "moving" => Some(MovePhase::Moving),
            "completed" => Some(MovePhase::Completed),
            "failed" => Some(MovePhase::Failed),
            _ => None,
        }
    }
}

impl ToSql for MovePhase {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for MovePhase {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        MovePhase::parse(value.as_str()?).ok_or(FromSqlError::InvalidType)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrphanStatus {
    Pending,
    Recovered,
    Failed,
}

impl OrphanStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrphanStatus::Pending => "pending",
            OrphanStatus::Recovered => "recovered",
            OrphanStatus::Failed => "failed",
        }
    }
}

impl ToSql for OrphanStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

/// A persisted move intent.
#[derive(Debug, Clone)]
pub struct JournalRow {
    pub id: i64,
    pub source_path: String,
    pub dest_path: String,
    pub file_size: i64,
    pub created_at: String,
    pub phase: MovePhase,
}

/// A vault file that was linked but never indexed.
#[derive(Debug, Clone)]
pub struct OrphanRow {
    pub id: i64,
    pub original_path: String,
    pub orphan_path: String,
    pub file_size: i64,
    pub created_at: String,
}

/// Counters surfaced by the `stats` command.
#[derive(Debug, Clone)]
pub struct IndexStats {
    pub unique_sizes: i64,
    pub fringe_entries: i64,
    pub full_entries: i64,
    pub pending_orphans: i64,
    pub unterminated_journal: i64,
    pub schema_version: i64,
}
