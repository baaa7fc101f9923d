//! Store configuration via `vstore.toml`
//!
//! Both backends accept a [`StoreConfig`]. Every field has a default, so an
//! empty file is a valid configuration.

use crate::cursor::PAGE_SIZE;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "vstore.toml";

/// Tuning knobs shared by every backend
///
/// # Example
///
/// ```toml
/// page_size = 100
/// scan_chunk_size = 100
/// consistent_read = true
/// cas_attempts = 3
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Records per `list` page
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Rows or items fetched per scan round trip
    #[serde(default = "default_page_size")]
    pub scan_chunk_size: usize,
    /// Ask the attribute store for strongly consistent reads
    #[serde(default = "default_consistent_read")]
    pub consistent_read: bool,
    /// Bounded retry count for create/update races inside `upsert`
    #[serde(default = "default_cas_attempts")]
    pub cas_attempts: usize,
}

fn default_page_size() -> usize {
    PAGE_SIZE
}

fn default_consistent_read() -> bool {
    true
}

fn default_cas_attempts() -> usize {
    3
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            scan_chunk_size: default_page_size(),
            consistent_read: default_consistent_read(),
            cas_attempts: default_cas_attempts(),
        }
    }
}

impl StoreConfig {
    /// Reject zero sizes and attempt counts
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("page_size", self.page_size),
            ("scan_chunk_size", self.scan_chunk_size),
            ("cas_attempts", self.cas_attempts),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(Error::Config(format!("{} must be at least 1", name)));
            }
        }
        Ok(())
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse store config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# vstore configuration
#
# Records returned per list() page (default: 100)
page_size = 100

# Rows or items fetched per scan round trip (default: 100)
scan_chunk_size = 100

# Strongly consistent reads on the attribute store (default: true)
consistent_read = true

# Create/update race retries inside upsert (default: 3)
cas_attempts = 3
"#
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_toml_parses_to_default() {
        let config = StoreConfig::from_toml_str(StoreConfig::default_toml()).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = StoreConfig::from_toml_str("").unwrap();
        assert_eq!(config.page_size, 100);
        assert!(config.consistent_read);
        assert_eq!(config.cas_attempts, 3);
    }

    #[test]
    fn test_partial_override() {
        let config = StoreConfig::from_toml_str("page_size = 25\nconsistent_read = false").unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.scan_chunk_size, 100);
        assert!(!config.consistent_read);
    }

    #[test]
    fn test_rejects_zero_values() {
        let err = StoreConfig::from_toml_str("scan_chunk_size = 0").unwrap_err();
        assert!(err.to_string().contains("scan_chunk_size"));
        assert!(StoreConfig::from_toml_str("cas_attempts = 0").is_err());
        assert!(StoreConfig::from_toml_str("page_size = \"many\"").is_err());
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        let config = StoreConfig {
            page_size: 10,
            scan_chunk_size: 7,
            consistent_read: false,
            cas_attempts: 5,
        };
        config.write_to_file(&path).unwrap();
        assert_eq!(StoreConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = StoreConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
