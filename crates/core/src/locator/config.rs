//! Configuration for the locator module.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::types::SourceRole;

/// Locator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Roles every bundle must provide before it is offered.
    #[serde(default = "default_expected_roles")]
    pub expected_roles: Vec<SourceRole>,

    /// Age after which an in-flight claim is considered abandoned.
    #[serde(default = "default_claim_ttl")]
    pub claim_ttl_secs: u64,
}

fn default_expected_roles() -> Vec<SourceRole> {
    SourceRole::ALL.to_vec()
}

fn default_claim_ttl() -> u64 {
    86_400 // 24 hours
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            expected_roles: default_expected_roles(),
            claim_ttl_secs: default_claim_ttl(),
        }
    }
}

impl LocatorConfig {
    pub fn claim_ttl(&self) -> Duration {
        Duration::from_secs(self.claim_ttl_secs)
    }

    /// Sets the expected roles.
    pub fn with_expected_roles(mut self, roles: Vec<SourceRole>) -> Self {
        self.expected_roles = roles;
        self
    }
}

/// When a bundle that failed outside validation becomes eligible again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Re-offered on the next scan.
    #[default]
    Immediate,
    /// Re-offered once the failure is older than `cooldown_secs`.
    Cooldown { cooldown_secs: u64 },
    /// Never re-offered until an operator removes the failure record.
    Manual,
}
