//! Types for the notifier module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::derivative::{ArtifactClass, SPEC_VERSION};
use crate::locator::BundleFormat;

/// Event describing a fully delivered and registered bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub event_id: Uuid,
    pub bundle_id: String,
    /// Deployment environment tag.
    pub environment: String,
    pub format: BundleFormat,
    /// Delivered derivative locations as `s3://bucket/key` URIs.
    pub derivatives: BTreeMap<ArtifactClass, String>,
    /// Archival package location, when packaging is enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    /// Metadata record the locations were registered against.
    pub metadata_record: String,
    pub spec_version: u32,
    pub completed_at: DateTime<Utc>,
}

impl CompletionEvent {
    pub fn new(
        bundle_id: impl Into<String>,
        environment: impl Into<String>,
        format: BundleFormat,
        derivatives: BTreeMap<ArtifactClass, String>,
        package: Option<String>,
        metadata_record: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            bundle_id: bundle_id.into(),
            environment: environment.into(),
            format,
            derivatives,
            package,
            metadata_record: metadata_record.into(),
            spec_version: SPEC_VERSION,
            completed_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Event describing a bundle that ended in `Failed`.
///
/// Published once per failed attempt and never persisted for replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub event_id: Uuid,
    pub bundle_id: String,
    pub environment: String,
    /// Unknown when the bundle has no master file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<BundleFormat>,
    /// Stage the bundle failed at.
    pub stage: String,
    /// Error kind, e.g. `access_denied`.
    pub kind: String,
    pub message: String,
    pub failed_at: DateTime<Utc>,
}

impl FailureEvent {
    pub fn new(
        bundle_id: impl Into<String>,
        environment: impl Into<String>,
        format: Option<BundleFormat>,
        stage: impl Into<String>,
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            bundle_id: bundle_id.into(),
            environment: environment.into(),
            format,
            stage: stage.into(),
            kind: kind.into(),
            message: message.into(),
            failed_at: Utc::now(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Acknowledgement from the notification bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub message_id: Option<String>,
}
