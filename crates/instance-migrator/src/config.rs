//! Migrator configuration storage
//!
//! Settings shared by a migrator and every sub-migrator it generates.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::defaults;

/// Configuration for a migrator and its sub-migrators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigratorConfig {
    /// Persisted variable receiving the migration memo
    #[serde(default = "default_audit_variable")]
    pub audit_variable: String,
    /// Name reported for root pointers in logs and errors
    #[serde(default = "default_root_pointer_name")]
    pub root_pointer_name: String,
    /// Append an `EndPredecessorHandler` after the registered handlers
    #[serde(default)]
    pub end_predecessor: bool,
}

fn default_audit_variable() -> String {
    defaults::AUDIT_VARIABLE.to_string()
}

fn default_root_pointer_name() -> String {
    defaults::ROOT_POINTER_NAME.to_string()
}

impl Default for MigratorConfig {
    fn default() -> Self {
        Self {
            audit_variable: default_audit_variable(),
            root_pointer_name: default_root_pointer_name(),
            end_predecessor: defaults::END_PREDECESSOR,
        }
    }
}

impl MigratorConfig {
    /// Load configuration from a JSON file, or defaults if it doesn't exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        serde_json::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents)?;

        log::info!("Migrator configuration saved to {:?}", path);
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = MigratorConfig::load(dir.path().join("migrator.json")).unwrap();
        assert_eq!(config, MigratorConfig::default());
        assert_eq!(config.audit_variable, "migrationMemo");
        assert_eq!(config.root_pointer_name, "Root pointer");
        assert!(!config.end_predecessor);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("migrator.json");
        let config = MigratorConfig {
            audit_variable: "history".to_string(),
            end_predecessor: true,
            ..Default::default()
        };

        config.save(&path).unwrap();
        assert_eq!(MigratorConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("migrator.json");
        std::fs::write(&path, r#"{"endPredecessor": true}"#).unwrap();

        let config = MigratorConfig::load(&path).unwrap();
        assert!(config.end_predecessor);
        assert_eq!(config.audit_variable, "migrationMemo");
    }

    #[test]
    fn test_unparsable_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("migrator.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(MigratorConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
