//! Session identity settings.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::Identity;

/// Names of the transaction-local settings written before every scoped
/// statement, and which roles count as "no identity".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Setting that switches the effective role.
    #[serde(default = "default_role_setting")]
    pub role_setting: String,

    /// Setting that carries the caller's subject.
    #[serde(default = "default_user_id_setting")]
    pub user_id_setting: String,

    /// Setting that carries the full claim set as JSON.
    #[serde(default = "default_claims_setting")]
    pub claims_setting: String,

    /// Roles treated as anonymous. The empty role is always anonymous.
    #[serde(default = "default_anonymous_roles")]
    pub anonymous_roles: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            role_setting: default_role_setting(),
            user_id_setting: default_user_id_setting(),
            claims_setting: default_claims_setting(),
            anonymous_roles: default_anonymous_roles(),
        }
    }
}

impl SessionConfig {
    pub fn is_anonymous(&self, identity: &Identity) -> bool {
        identity.role.trim().is_empty() || self.anonymous_roles.iter().any(|r| *r == identity.role)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("session.role_setting", &self.role_setting),
            ("session.user_id_setting", &self.user_id_setting),
            ("session.claims_setting", &self.claims_setting),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Config(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}

fn default_role_setting() -> String {
    "role".to_string()
}

fn default_user_id_setting() -> String {
    "request.jwt.claim.sub".to_string()
}

fn default_claims_setting() -> String {
    "request.jwt.claims".to_string()
}

fn default_anonymous_roles() -> Vec<String> {
    vec!["anon".to_string()]
}
