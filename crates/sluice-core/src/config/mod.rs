//! Configuration types for the sluice engine.
//!
//! A single YAML file (conventionally `sluice.yaml`) carries every section:
//!
//! - **upstream**: the Postgres connection the scoped executor uses
//! - **privileged**: optional connection for RLS-bypassing existence probes
//! - **session**: names of the session settings written per transaction
//! - **guardrails**: limits applied to every request
//! - **audit**: where audit records go

pub mod audit;
pub mod guardrails;
pub mod session;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use audit::{AuditConfig, AuditOutput};
pub use guardrails::GuardrailsConfig;
pub use session::SessionConfig;
pub use upstream::{ConnectionPoolConfig, SslMode, UpstreamConfig};

/// Complete engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SluiceConfig {
    /// Project name, used only for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,

    /// Connection used for all identity-scoped statements.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Connection used for the privileged existence probe. Falls back to
    /// `upstream` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privileged: Option<UpstreamConfig>,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub guardrails: GuardrailsConfig,

    #[serde(default)]
    pub audit: AuditConfig,
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SluiceConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Connection settings for the privileged probe.
    pub fn privileged_upstream(&self) -> &UpstreamConfig {
        self.privileged.as_ref().unwrap_or(&self.upstream)
    }

    /// Reject settings that would make the engine misbehave at runtime.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.session.validate()?;
        self.guardrails.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}
