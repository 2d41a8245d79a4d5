pub mod models;
mod queries;
mod sqlite;

pub use models::{IndexStats, JournalRow, MovePhase, OrphanRow, OrphanStatus};
pub use sqlite::{Database, EMERGENCY_LOG_NAME, SCHEMA_VERSION};
