//! Configuration for the delivery module.

use serde::{Deserialize, Serialize};

use crate::retry::RetryConfig;

/// Smallest part size S3 accepts for all but the last part.
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum number of parts in one multipart upload.
pub const MAX_PARTS: u64 = 10_000;

/// Delivery configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Artifacts at or above this size use multipart upload.
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: u64,

    /// Part size for multipart uploads. Grown automatically for very large
    /// files to stay within the part limit.
    #[serde(default = "default_part_size")]
    pub part_size_bytes: u64,

    /// Retry policy for transient failures, per storage call.
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_multipart_threshold() -> u64 {
    64 * 1024 * 1024 // 64 MiB
}

fn default_part_size() -> u64 {
    64 * 1024 * 1024 // 64 MiB
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            multipart_threshold_bytes: default_multipart_threshold(),
            part_size_bytes: default_part_size(),
            retry: RetryConfig::default(),
        }
    }
}

impl DeliveryConfig {
    /// Sets the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the multipart threshold and part size.
    pub fn with_multipart(mut self, threshold_bytes: u64, part_size_bytes: u64) -> Self {
        self.multipart_threshold_bytes = threshold_bytes;
        self.part_size_bytes = part_size_bytes;
        self
    }

    /// Part size to use for a file of `size` bytes.
    pub fn part_size_for(&self, size: u64) -> u64 {
        let minimum = size.div_ceil(MAX_PARTS);
        self.part_size_bytes.max(minimum).max(1)
    }
}
