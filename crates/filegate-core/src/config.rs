use config::{Config, ConfigError, File as ConfigFile};
use serde::Deserialize;

use crate::error::Error;
use crate::session::SessionOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub vault_path: Option<String>,
    /// Relocate unique files into the vault. Off means read-only:
    /// indices are updated, nothing moves.
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub hdd_mode: bool,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

fn default_db_path() -> String {
    "filegate.db".to_string()
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

impl AppConfig {
    /// Reject inconsistent settings before any file is processed.
    pub fn validate(&self) -> Result<(), Error> {
        if self.active && self.vault_path.is_none() {
            return Err(Error::InvalidConfig(
                "active mode requires vault_path".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_options(&self) -> Result<SessionOptions, Error> {
        self.validate()?;
        let mut options = SessionOptions::new(&self.db_path)
            .with_hdd_mode(self.hdd_mode)
            .with_ignore_patterns(self.ignore_patterns.clone());
        if self.active {
            if let Some(vault) = &self.vault_path {
                options = options.with_vault(vault);
            }
        }
        Ok(options)
    }
}
