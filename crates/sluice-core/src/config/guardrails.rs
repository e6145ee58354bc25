//! Per-request guardrails.

use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardrailsConfig {
    /// Limit applied to selects that do not ask for one.
    #[serde(default = "default_limit")]
    pub default_limit: u64,

    /// Upper bound for any requested limit.
    #[serde(default = "default_max_rows")]
    pub max_rows_per_query: u64,

    /// Allow UPDATE/DELETE without any filter.
    #[serde(default)]
    pub allow_unfiltered_mutations: bool,

    /// Treat anonymous selects like anonymous mutations (401).
    #[serde(default)]
    pub require_auth_for_reads: bool,
}

impl Default for GuardrailsConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_rows_per_query: default_max_rows(),
            allow_unfiltered_mutations: false,
            require_auth_for_reads: false,
        }
    }
}

impl GuardrailsConfig {
    /// Resolve the effective limit for a request.
    pub fn effective_limit(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_limit)
            .min(self.max_rows_per_query)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.max_rows_per_query == 0 || self.default_limit == 0 {
            return Err(ConfigError::Config(
                "guardrails limits must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_limit() -> u64 {
    100
}

fn default_max_rows() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_limit_clamps() {
        let g = GuardrailsConfig::default();
        assert_eq!(g.effective_limit(None), 100);
        assert_eq!(g.effective_limit(Some(20)), 20);
        assert_eq!(g.effective_limit(Some(50_000)), 1000);
    }
}
