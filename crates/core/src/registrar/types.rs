//! Types for the registrar module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::dates::DateRange;
use crate::delivery::RemoteLocation;
use crate::derivative::ArtifactClass;

/// Delivered locations to record, by artifact class.
pub type DeliveredLocations = BTreeMap<ArtifactClass, RemoteLocation>;

/// Outcome of a successful registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationResult {
    /// URI of the updated or created record. Referenced by the completion event.
    pub record_uri: String,
    /// URI of the archival description the record is linked to.
    pub parent_uri: String,
    /// Whether the record was created by this call.
    pub created: bool,
}

/// Archival description a bundle id resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivalDescription {
    /// URI of the archival object.
    pub uri: String,
    /// Dates of the object, or of its closest dated ancestor.
    pub dates: Option<DateRange>,
}
