//! Trait definitions for the registrar module.

use async_trait::async_trait;
use tracing::info;

use super::error::RegistrationError;
use super::types::{ArchivalDescription, DeliveredLocations, RegistrationResult};
use crate::locator::Bundle;
use crate::metrics;
use crate::retry::{retry_with_backoff, RetryConfig};

/// External archival metadata system.
#[async_trait]
pub trait MetadataRegistrar: Send + Sync {
    /// Returns the name of this registrar implementation.
    fn name(&self) -> &str;

    /// Resolves the archival description whose ref id is the bundle id.
    async fn describe(&self, bundle: &Bundle) -> Result<ArchivalDescription, RegistrationError>;

    /// Records the delivered locations against the bundle's archival record.
    ///
    /// Update-or-create keyed by the bundle id; calling it again with the same
    /// locations leaves the record unchanged.
    async fn register(
        &self,
        bundle: &Bundle,
        locations: &DeliveredLocations,
    ) -> Result<RegistrationResult, RegistrationError>;
}

/// Calls `register`, retrying only while the system is unreachable.
pub async fn register_with_retry(
    registrar: &dyn MetadataRegistrar,
    policy: &RetryConfig,
    bundle: &Bundle,
    locations: &DeliveredLocations,
) -> Result<RegistrationResult, RegistrationError> {
    let operation = format!("register {} with {}", bundle.id, registrar.name());
    let result = retry_with_backoff(policy, &operation, RegistrationError::is_retryable, |_| async {
        let result = registrar.register(bundle, locations).await;
        let label = match &result {
            Ok(_) => "success",
            Err(e) => e.kind.as_str(),
        };
        metrics::REGISTRATION_ATTEMPTS.with_label_values(&[label]).inc();
        result
    })
    .await;

    if let Ok(registration) = &result {
        info!(
            "Registered {} as {} ({})",
            bundle.id,
            registration.record_uri,
            if registration.created { "created" } else { "updated" }
        );
    }
    result
}

/// Calls `describe`, retrying only while the system is unreachable.
pub async fn describe_with_retry(
    registrar: &dyn MetadataRegistrar,
    policy: &RetryConfig,
    bundle: &Bundle,
) -> Result<ArchivalDescription, RegistrationError> {
    let operation = format!("describe {} with {}", bundle.id, registrar.name());
    retry_with_backoff(policy, &operation, RegistrationError::is_retryable, |_| {
        registrar.describe(bundle)
    })
    .await
}
