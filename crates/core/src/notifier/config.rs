use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// Notification topic settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifierConfig {
    pub topic_arn: String,
    /// `service` message attribute that subscription filters match on.
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_service() -> String {
    "digitized_av_packaging".to_string()
}

impl NotifierConfig {
    pub fn new(topic_arn: impl Into<String>) -> Self {
        Self {
            topic_arn: topic_arn.into(),
            service: default_service(),
            retry: RetryConfig::default(),
        }
    }
}
