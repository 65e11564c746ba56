//! Types for the delivery module.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::DeliveryError;
use crate::derivative::ArtifactClass;

/// Where an artifact lives once delivered.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteLocation {
    pub bucket: String,
    pub key: String,
}

impl RemoteLocation {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// `s3://bucket/key`
    pub fn uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }
}

impl fmt::Display for RemoteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// One part of a multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedPart {
    pub part_number: i32,
    pub etag: String,
}

/// Details of a confirmed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveredObject {
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Number of parts, or `None` for a single put.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parts: Option<u32>,
}

/// Per-artifact delivery outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryResult {
    pub class: ArtifactClass,
    pub location: RemoteLocation,
    /// Storage calls made, retries included.
    pub attempts: u32,
    pub outcome: Result<DeliveredObject, DeliveryError>,
}

impl DeliveryResult {
    pub fn succeeded(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn error(&self) -> Option<&DeliveryError> {
        self.outcome.as_ref().err()
    }

    /// Remote location, if the delivery succeeded.
    pub fn delivered_location(&self) -> Option<&RemoteLocation> {
        self.outcome.as_ref().ok().map(|_| &self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_uri() {
        let location = RemoteLocation::new("mi-access", "b1.mp4");
        assert_eq!(location.uri(), "s3://mi-access/b1.mp4");
        assert_eq!(location.to_string(), location.uri());
    }

    #[test]
    fn test_failed_result_has_no_location() {
        let result = DeliveryResult {
            class: ArtifactClass::VideoAccess,
            location: RemoteLocation::new("mi-access", "b1.mp4"),
            attempts: 1,
            outcome: Err(DeliveryError::access_denied("403")),
        };
        assert!(!result.succeeded());
        assert!(result.delivered_location().is_none());
        assert!(result.error().is_some());
    }
}
