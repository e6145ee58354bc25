//! Audit logging configuration.

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Configuration for audit logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Whether audit logging is enabled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Output destination.
    #[serde(default)]
    pub output: AuditOutput,

    /// File path (for file output).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

/// Audit output destination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuditOutput {
    /// JSON lines on stdout.
    #[default]
    Console,
    /// JSON lines appended to `file_path`.
    File,
    /// Discard everything.
    None,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            output: AuditOutput::default(),
            file_path: None,
        }
    }
}

impl AuditConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && self.output == AuditOutput::File && self.file_path.is_none() {
            return Err(ConfigError::Config(
                "audit.file_path is required when audit.output is 'file'".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_output_requires_path() {
        let config = AuditConfig {
            output: AuditOutput::File,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = AuditConfig {
            enabled: false,
            output: AuditOutput::File,
            file_path: None,
        };
        assert!(config.validate().is_ok());
    }
}
