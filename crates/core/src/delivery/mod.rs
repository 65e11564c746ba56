//! Delivery of artifacts to object storage.
//!
//! [`DeliveryCoordinator`] puts each artifact under a key derived only from
//! the bundle id and artifact class, so a repeated delivery replaces the
//! object instead of adding a second one. Artifacts at or above the multipart
//! threshold go up in parts, each part retried on its own.
//!
//! Only [`DeliveryErrorKind::TransientNetwork`] is retried; access, quota and
//! other refusals surface immediately.

mod config;
mod coordinator;
mod error;
mod s3;
mod traits;
mod types;

pub use config::{DeliveryConfig, MAX_PARTS, MIN_PART_SIZE};
pub use coordinator::DeliveryCoordinator;
pub use error::{DeliveryError, DeliveryErrorKind};
pub use s3::S3ObjectStore;
pub use traits::ObjectStore;
pub use types::{DeliveredObject, DeliveryResult, RemoteLocation, UploadedPart};
