//! Configuration for the ArchivesSpace registrar.

use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// ArchivesSpace connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchivesSpaceConfig {
    /// Backend API URL (e.g., "http://localhost:8089")
    pub base_url: String,
    /// Repository id
    #[serde(
        default = "default_repository",
        deserialize_with = "crate::config::string_or_number::deserialize"
    )]
    pub repository: String,
    #[serde(deserialize_with = "crate::config::string_or_number::deserialize")]
    pub username: String,
    #[serde(deserialize_with = "crate::config::string_or_number::deserialize")]
    pub password: String,
    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_repository() -> String {
    "2".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl ArchivesSpaceConfig {
    pub fn new(
        base_url: impl Into<String>,
        repository: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            repository: repository.into(),
            username: username.into(),
            password: password.into(),
            timeout_secs: default_timeout(),
            retry: RetryConfig::default(),
        }
    }

    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}
