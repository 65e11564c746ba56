//! Configuration for the processor module.

use serde::{Deserialize, Serialize};

use crate::locator::FailurePolicy;

/// Configuration for the packaging run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Bundles processed at the same time (default: 1, sequential).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_bundles: usize,

    /// When a failed bundle is offered again.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

fn default_max_concurrent() -> usize {
    1
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_bundles: default_max_concurrent(),
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ProcessorConfig {
    /// Sets the maximum number of concurrent bundles.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_bundles = max;
        self
    }

    /// Sets the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}
