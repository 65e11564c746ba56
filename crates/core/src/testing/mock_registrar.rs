//! Mock metadata registrar for testing.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::locator::Bundle;
use crate::registrar::{
    ArchivalDescription, DateRange, DeliveredLocations, MetadataRegistrar, RegistrationError,
    RegistrationResult,
};

/// A recorded registration call.
#[derive(Debug, Clone)]
pub struct RecordedRegistration {
    pub bundle_id: String,
    pub locations: DeliveredLocations,
}

#[derive(Debug, Default)]
struct RegistrarState {
    calls: Vec<RecordedRegistration>,
    queued_errors: VecDeque<RegistrationError>,
    describe_calls: usize,
    describe_errors: VecDeque<RegistrationError>,
    dates: Option<DateRange>,
    /// Record URI per bundle id, assigned on first success.
    records: HashMap<String, String>,
}

/// Mock implementation of the MetadataRegistrar trait.
///
/// Keeps one record per bundle id; registering the same bundle again
/// updates it instead of creating a new one. Every bundle id describes as
/// `/repositories/2/archival_objects/<id>` with the configured dates.
#[derive(Debug, Clone, Default)]
pub struct MockRegistrar {
    state: Arc<RwLock<RegistrarState>>,
}

impl MockRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` calls with `error`.
    pub async fn fail_next(&self, count: usize, error: RegistrationError) {
        let mut state = self.state.write().await;
        for _ in 0..count {
            state.queued_errors.push_back(error.clone());
        }
    }

    /// Fail the next `count` describe calls with `error`.
    pub async fn fail_next_describe(&self, count: usize, error: RegistrationError) {
        let mut state = self.state.write().await;
        for _ in 0..count {
            state.describe_errors.push_back(error.clone());
        }
    }

    /// Dates returned by every describe call.
    pub async fn set_dates(&self, dates: Option<DateRange>) {
        self.state.write().await.dates = dates;
    }

    /// Number of describe calls, failed ones included.
    pub async fn describe_count(&self) -> usize {
        self.state.read().await.describe_calls
    }

    /// Number of register calls, failed ones included.
    pub async fn call_count(&self) -> usize {
        self.state.read().await.calls.len()
    }

    /// All register calls in order.
    pub async fn registrations(&self) -> Vec<RecordedRegistration> {
        self.state.read().await.calls.clone()
    }

    /// Record URI held for a bundle, if registered.
    pub async fn record_for(&self, bundle_id: &str) -> Option<String> {
        self.state.read().await.records.get(bundle_id).cloned()
    }
}

#[async_trait]
impl MetadataRegistrar for MockRegistrar {
    fn name(&self) -> &str {
        "mock"
    }

    async fn describe(&self, bundle: &Bundle) -> Result<ArchivalDescription, RegistrationError> {
        let mut state = self.state.write().await;
        state.describe_calls += 1;
        if let Some(error) = state.describe_errors.pop_front() {
            return Err(error);
        }
        Ok(ArchivalDescription {
            uri: archival_object_uri(&bundle.id),
            dates: state.dates,
        })
    }

    async fn register(
        &self,
        bundle: &Bundle,
        locations: &DeliveredLocations,
    ) -> Result<RegistrationResult, RegistrationError> {
        let mut state = self.state.write().await;
        state.calls.push(RecordedRegistration {
            bundle_id: bundle.id.clone(),
            locations: locations.clone(),
        });

        if let Some(error) = state.queued_errors.pop_front() {
            return Err(error);
        }

        let next_id = state.records.len() + 1;
        let created = !state.records.contains_key(&bundle.id);
        let record_uri = state
            .records
            .entry(bundle.id.clone())
            .or_insert_with(|| format!("/repositories/2/digital_objects/{}", next_id))
            .clone();

        Ok(RegistrationResult {
            record_uri,
            parent_uri: archival_object_uri(&bundle.id),
            created,
        })
    }
}

fn archival_object_uri(bundle_id: &str) -> String {
    format!("/repositories/2/archival_objects/{}", bundle_id)
}
