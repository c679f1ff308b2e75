//! YAML configuration for the `import` command.
//!
//! ```yaml
//! connection:
//!   host: db.internal
//!   user: deploy
//!   database: app
//! encoding: latin1
//! ```

use crate::connection::ConnectionSettings;
use crate::encoding::{self, Encoding};
use crate::error::ImportError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    pub connection: ConnectionSettings,
    pub encoding: Option<String>,
}

impl ImportConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ImportConfig = serde_yaml_ng::from_str(&content)?;
        Ok(config)
    }

    /// Configured encoding, validated. Defaults to UTF-8.
    pub fn encoding(&self) -> Result<Encoding, ImportError> {
        match &self.encoding {
            Some(name) => encoding::validate(name),
            None => Ok(Encoding::default()),
        }
    }
}
