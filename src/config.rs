//! Runtime options for archive readers and writers.

use crate::error::{ArchiveError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Longest entry name accepted by default, in bytes.
pub const DEFAULT_MAX_NAME_LEN: usize = 4096;

/// Options shared by [`ArchiveWriter`](crate::archive::ArchiveWriter) and
/// [`ArchiveReader`](crate::archive::ArchiveReader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveConfig {
    /// Reject headers whose recorded codewords differ from the re-derived tree.
    pub verify_codewords: bool,
    /// Require the padding bits of the final body byte to be zero.
    pub strict_padding: bool,
    /// Longest entry name, in bytes.
    pub max_name_len: usize,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            verify_codewords: true,
            strict_padding: true,
            max_name_len: DEFAULT_MAX_NAME_LEN,
        }
    }
}

impl ArchiveConfig {
    /// Accept whatever a legacy producer wrote as long as the body decodes.
    pub fn lenient() -> Self {
        Self {
            verify_codewords: false,
            strict_padding: false,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_name_len == 0 {
            return Err(ArchiveError::configuration(
                "max_name_len must be at least 1",
            ));
        }
        Ok(())
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| {
            ArchiveError::configuration(format!("failed to parse archive config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ArchiveError::configuration(format!("failed to read archive config file: {}", e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = serde_json::to_string_pretty(self).map_err(|e| {
            ArchiveError::configuration(format!("failed to serialize archive config: {}", e))
        })?;
        std::fs::write(path, serialized).map_err(|e| {
            ArchiveError::configuration(format!("failed to write archive config file: {}", e))
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_strict() {
        let config = ArchiveConfig::default();
        assert!(config.verify_codewords);
        assert!(config.strict_padding);
        assert_eq!(config.max_name_len, DEFAULT_MAX_NAME_LEN);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ArchiveConfig::from_json_str(r#"{ "strict_padding": false }"#).unwrap();
        assert!(config.verify_codewords);
        assert!(!config.strict_padding);
        assert_eq!(config.max_name_len, DEFAULT_MAX_NAME_LEN);
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        let err = ArchiveConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ArchiveError::Configuration { .. }));

        let err = ArchiveConfig::from_json_str(r#"{ "max_name_len": 0 }"#).unwrap_err();
        assert!(matches!(err, ArchiveError::Configuration { .. }));
    }

    #[test]
    fn test_lenient() {
        let config = ArchiveConfig::lenient();
        assert!(!config.verify_codewords);
        assert!(!config.strict_padding);
    }
}
