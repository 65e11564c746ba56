use std::collections::HashSet;

use super::{types::Config, ConfigError};
use crate::delivery::MIN_PART_SIZE;
use crate::derivative::ArtifactClass;
use crate::retry::RetryConfig;

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

fn require(value: &str, name: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(invalid(format!("{} cannot be empty", name)));
    }
    Ok(())
}

fn require_attempts(retry: &RetryConfig, section: &str) -> Result<(), ConfigError> {
    if retry.max_attempts == 0 {
        return Err(invalid(format!("{}.retry.max_attempts cannot be 0", section)));
    }
    Ok(())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    require(&config.environment, "environment")?;

    // Destinations
    let mut seen = HashSet::new();
    for class in ArtifactClass::DERIVATIVES {
        let bucket = config.destinations.for_class(class);
        require(bucket, &format!("destinations.{}", class.as_str()))?;
        if !seen.insert(bucket) {
            return Err(invalid(format!(
                "destinations.{} reuses bucket '{}'",
                class.as_str(),
                bucket
            )));
        }
    }
    if config.packaging.enabled {
        require(&config.destinations.package, "destinations.package")?;
        if config.packaging.algorithms.is_empty() {
            return Err(invalid("packaging.algorithms cannot be empty"));
        }
    }

    // Delivery
    let delivery = &config.delivery;
    if delivery.part_size_bytes < MIN_PART_SIZE {
        return Err(invalid(format!(
            "delivery.part_size_bytes must be at least {}",
            MIN_PART_SIZE
        )));
    }
    if delivery.multipart_threshold_bytes < delivery.part_size_bytes {
        return Err(invalid(
            "delivery.multipart_threshold_bytes cannot be smaller than part_size_bytes",
        ));
    }
    require_attempts(&delivery.retry, "delivery")?;

    // Metadata system and notifications
    require(&config.archivesspace.base_url, "archivesspace.base_url")?;
    require(&config.archivesspace.repository, "archivesspace.repository")?;
    require(&config.archivesspace.username, "archivesspace.username")?;
    require_attempts(&config.archivesspace.retry, "archivesspace")?;
    require(&config.notifier.topic_arn, "notifier.topic_arn")?;
    require_attempts(&config.notifier.retry, "notifier")?;

    if config.processor.max_concurrent_bundles == 0 {
        return Err(invalid("processor.max_concurrent_bundles cannot be 0"));
    }
    if config.locator.expected_roles.is_empty() {
        return Err(invalid("locator.expected_roles cannot be empty"));
    }

    Ok(())
}
