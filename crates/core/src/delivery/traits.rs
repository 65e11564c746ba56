//! Trait definitions for the delivery module.

use async_trait::async_trait;
use std::path::Path;

use super::error::DeliveryError;
use super::types::UploadedPart;

/// Object storage that accepts whole-object and multipart writes.
///
/// Writing an existing key replaces the object.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Returns the name of this store implementation.
    fn name(&self) -> &str;

    /// Uploads a local file as a single object. Returns the ETag if any.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<Option<String>, DeliveryError>;

    /// Starts a multipart upload. Returns the upload id.
    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String, DeliveryError>;

    /// Uploads one part. Returns its ETag.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<String, DeliveryError>;

    /// Assembles the uploaded parts into the final object.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<Option<String>, DeliveryError>;

    /// Discards an unfinished multipart upload.
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), DeliveryError>;
}
