//! Mock object store for testing.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::delivery::{DeliveryError, ObjectStore, UploadedPart};

#[derive(Debug)]
struct PendingUpload {
    bucket: String,
    key: String,
    parts: BTreeMap<i32, Vec<u8>>,
}

#[derive(Debug, Default)]
struct StoreState {
    objects: HashMap<(String, String), Vec<u8>>,
    put_failures: VecDeque<DeliveryError>,
    put_calls: usize,
    denied_buckets: HashMap<String, DeliveryError>,
    /// Remaining failures and the error, per part number.
    part_failures: HashMap<i32, (u32, DeliveryError)>,
    part_calls: Vec<i32>,
    uploads: HashMap<String, PendingUpload>,
    next_upload_id: u64,
    aborted: usize,
}

/// In-memory implementation of the ObjectStore trait.
///
/// Objects are kept by bucket and key. Failures can be injected per call,
/// per bucket, or per multipart part number.
#[derive(Debug, Clone, Default)]
pub struct MockObjectStore {
    state: Arc<RwLock<StoreState>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored bytes of an object.
    pub async fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .read()
            .await
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Keys stored in `bucket`, sorted.
    pub async fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .state
            .read()
            .await
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn object_count(&self) -> usize {
        self.state.read().await.objects.len()
    }

    /// Fail the next `count` single puts with `error`.
    pub async fn fail_next_puts(&self, count: usize, error: DeliveryError) {
        let mut state = self.state.write().await;
        for _ in 0..count {
            state.put_failures.push_back(error.clone());
        }
    }

    /// Number of single put calls, failed ones included.
    pub async fn put_calls(&self) -> usize {
        self.state.read().await.put_calls
    }

    /// Fail every operation on `bucket` with `error`.
    pub async fn deny_bucket(&self, bucket: &str, error: DeliveryError) {
        self.state
            .write()
            .await
            .denied_buckets
            .insert(bucket.to_string(), error);
    }

    /// Fail the next `times` uploads of part `part_number` with `error`.
    pub async fn fail_part(&self, part_number: i32, times: u32, error: DeliveryError) {
        self.state
            .write()
            .await
            .part_failures
            .insert(part_number, (times, error));
    }

    /// Part numbers in upload order, failed calls included.
    pub async fn part_calls(&self) -> Vec<i32> {
        self.state.read().await.part_calls.clone()
    }

    pub async fn aborted_uploads(&self) -> usize {
        self.state.read().await.aborted
    }
}

impl StoreState {
    fn check_bucket(&self, bucket: &str) -> Result<(), DeliveryError> {
        match self.denied_buckets.get(bucket) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    fn name(&self) -> &str {
        "mock"
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        _content_type: &str,
    ) -> Result<Option<String>, DeliveryError> {
        let mut state = self.state.write().await;
        state.put_calls += 1;
        state.check_bucket(bucket)?;
        if let Some(error) = state.put_failures.pop_front() {
            return Err(error);
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| DeliveryError::local_io(format!("{}: {}", path.display(), e)))?;
        let etag = format!("\"etag-{}\"", bytes.len());
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), bytes);
        Ok(Some(etag))
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        _content_type: &str,
    ) -> Result<String, DeliveryError> {
        let mut state = self.state.write().await;
        state.check_bucket(bucket)?;
        state.next_upload_id += 1;
        let upload_id = format!("upload-{}", state.next_upload_id);
        state.uploads.insert(
            upload_id.clone(),
            PendingUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<String, DeliveryError> {
        let mut state = self.state.write().await;
        state.part_calls.push(part_number);
        state.check_bucket(bucket)?;

        if let Some((remaining, error)) = state.part_failures.get_mut(&part_number) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(error.clone());
            }
        }

        let upload = state
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| DeliveryError::transient(format!("unknown upload {}", upload_id)))?;
        upload.parts.insert(part_number, body);
        Ok(format!("\"part-{}\"", part_number))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        _key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<Option<String>, DeliveryError> {
        let mut state = self.state.write().await;
        state.check_bucket(bucket)?;
        let upload = state
            .uploads
            .remove(upload_id)
            .ok_or_else(|| DeliveryError::transient(format!("unknown upload {}", upload_id)))?;

        let mut bytes = Vec::new();
        for part in &parts {
            let body = upload.parts.get(&part.part_number).ok_or_else(|| {
                DeliveryError::transient(format!("part {} was never uploaded", part.part_number))
            })?;
            bytes.extend_from_slice(body);
        }
        let etag = format!("\"etag-{}-{}\"", bytes.len(), parts.len());
        state.objects.insert((upload.bucket, upload.key), bytes);
        Ok(Some(etag))
    }

    async fn abort_multipart_upload(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
    ) -> Result<(), DeliveryError> {
        let mut state = self.state.write().await;
        state.uploads.remove(upload_id);
        state.aborted += 1;
        Ok(())
    }
}
