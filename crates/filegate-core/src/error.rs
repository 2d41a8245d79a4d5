use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Schema version mismatch: database has v{found}, this build expects v{expected}")]
    SchemaMismatch { found: i64, expected: i64 },

    #[error("Fringe mode mismatch: database was created in '{stored}' mode, session requested '{requested}'")]
    FringeModeMismatch { stored: String, requested: String },

    #[error("Cross-device move rejected: {src} and {dest} are on different filesystems")]
    CrossDevice { src: PathBuf, dest: PathBuf },

    #[error("Destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("Database unavailable: {0}")]
    DatabaseUnavailable(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for faults that must end the session rather than skip the file.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::SchemaMismatch { .. }
                | Error::FringeModeMismatch { .. }
                | Error::DatabaseUnavailable(_)
                | Error::InvalidConfig(_)
        )
    }
}
