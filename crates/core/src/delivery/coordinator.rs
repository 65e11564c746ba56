//! Artifact delivery with retry and multipart transfer.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{error, info, warn};

use super::config::DeliveryConfig;
use super::error::DeliveryError;
use super::traits::ObjectStore;
use super::types::{DeliveredObject, DeliveryResult, RemoteLocation, UploadedPart};
use crate::derivative::{ArtifactClass, DerivativeArtifact};
use crate::metrics;
use crate::retry::retry_with_backoff;

/// Uploads artifacts to their destinations.
pub struct DeliveryCoordinator {
    store: Arc<dyn ObjectStore>,
    config: DeliveryConfig,
}

impl DeliveryCoordinator {
    pub fn new(store: Arc<dyn ObjectStore>, config: DeliveryConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }

    /// Delivers one artifact to `destination` under its deterministic key.
    ///
    /// Delivering the same artifact again overwrites the same key. The local
    /// file is deleted after a confirmed transfer and kept otherwise.
    pub async fn deliver(&self, artifact: &DerivativeArtifact, destination: &str) -> DeliveryResult {
        let location = RemoteLocation::new(destination, artifact.class.remote_key(&artifact.bundle_id));
        let start = Instant::now();
        let mut attempts = 0u32;

        let outcome = match tokio::fs::metadata(&artifact.local_path).await {
            Err(e) => Err(DeliveryError::local_io(format!(
                "{}: {}",
                artifact.local_path.display(),
                e
            ))),
            Ok(meta) if meta.len() >= self.config.multipart_threshold_bytes => {
                self.multipart(artifact, &location, meta.len(), &mut attempts)
                    .await
            }
            Ok(meta) => self.single(artifact, &location, meta.len(), &mut attempts).await,
        };

        match &outcome {
            Ok(delivered) => {
                metrics::BYTES_DELIVERED
                    .with_label_values(&[artifact.class.as_str()])
                    .inc_by(delivered.size_bytes);
                info!(
                    "Delivered {} for {} to {} ({} bytes, {} attempts, {:?})",
                    artifact.class,
                    artifact.bundle_id,
                    location,
                    delivered.size_bytes,
                    attempts,
                    start.elapsed()
                );
                if let Err(e) = tokio::fs::remove_file(&artifact.local_path).await {
                    warn!(
                        "Delivered but could not delete {}: {}",
                        artifact.local_path.display(),
                        e
                    );
                }
            }
            Err(e) => error!(
                "Failed to deliver {} for {} to {} after {} attempts: {}",
                artifact.class, artifact.bundle_id, location, attempts, e
            ),
        }

        DeliveryResult {
            class: artifact.class,
            location,
            attempts,
            outcome,
        }
    }

    async fn single(
        &self,
        artifact: &DerivativeArtifact,
        location: &RemoteLocation,
        size: u64,
        attempts: &mut u32,
    ) -> Result<DeliveredObject, DeliveryError> {
        let etag = retry_with_backoff(
            &self.config.retry,
            &format!("put {}", location),
            DeliveryError::is_retryable,
            |_| {
                *attempts += 1;
                let store = self.store.clone();
                async move {
                    let result = store
                        .put_object(
                            &location.bucket,
                            &location.key,
                            &artifact.local_path,
                            &artifact.content_type,
                        )
                        .await;
                    record_attempt(artifact.class, &result);
                    result
                }
            },
        )
        .await?;

        Ok(DeliveredObject {
            size_bytes: size,
            etag,
            parts: None,
        })
    }

    /// Multipart transfer. Each part is retried on its own, so a transient
    /// failure only repeats the part that failed.
    async fn multipart(
        &self,
        artifact: &DerivativeArtifact,
        location: &RemoteLocation,
        size: u64,
        attempts: &mut u32,
    ) -> Result<DeliveredObject, DeliveryError> {
        let retry = &self.config.retry;

        let upload_id = retry_with_backoff(
            retry,
            &format!("create multipart upload {}", location),
            DeliveryError::is_retryable,
            |_| {
                *attempts += 1;
                let store = self.store.clone();
                async move {
                    let result = store
                        .create_multipart_upload(&location.bucket, &location.key, &artifact.content_type)
                        .await;
                    record_attempt(artifact.class, &result);
                    result
                }
            },
        )
        .await?;

        let result = self
            .upload_parts(artifact, location, &upload_id, size, attempts)
            .await;

        let parts = match result {
            Ok(parts) => parts,
            Err(e) => {
                self.abort(location, &upload_id).await;
                return Err(e);
            }
        };
        let part_count = parts.len() as u32;

        let completed = retry_with_backoff(
            retry,
            &format!("complete multipart upload {}", location),
            DeliveryError::is_retryable,
            |_| {
                *attempts += 1;
                let store = self.store.clone();
                let parts = parts.clone();
                let upload_id = upload_id.clone();
                async move {
                    let result = store
                        .complete_multipart_upload(&location.bucket, &location.key, &upload_id, parts)
                        .await;
                    record_attempt(artifact.class, &result);
                    result
                }
            },
        )
        .await;

        match completed {
            Ok(etag) => Ok(DeliveredObject {
                size_bytes: size,
                etag,
                parts: Some(part_count),
            }),
            Err(e) => {
                self.abort(location, &upload_id).await;
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        artifact: &DerivativeArtifact,
        location: &RemoteLocation,
        upload_id: &str,
        size: u64,
        attempts: &mut u32,
    ) -> Result<Vec<UploadedPart>, DeliveryError> {
        let part_size = self.config.part_size_for(size);
        let mut file = File::open(&artifact.local_path)
            .await
            .map_err(|e| local_io(&artifact.local_path, e))?;

        let mut parts = Vec::new();
        let mut offset = 0u64;
        let mut part_number = 1i32;

        while offset < size {
            let len = part_size.min(size - offset) as usize;
            let body = read_part(&mut file, &artifact.local_path, offset, len).await?;

            let etag = retry_with_backoff(
                &self.config.retry,
                &format!("upload part {} of {}", part_number, location),
                DeliveryError::is_retryable,
                |_| {
                    *attempts += 1;
                    let store = self.store.clone();
                    let body = body.clone();
                    async move {
                        let result = store
                            .upload_part(&location.bucket, &location.key, upload_id, part_number, body)
                            .await;
                        record_attempt(artifact.class, &result);
                        result
                    }
                },
            )
            .await?;

            parts.push(UploadedPart { part_number, etag });
            offset += len as u64;
            part_number += 1;
        }

        Ok(parts)
    }

    async fn abort(&self, location: &RemoteLocation, upload_id: &str) {
        if let Err(e) = self
            .store
            .abort_multipart_upload(&location.bucket, &location.key, upload_id)
            .await
        {
            warn!("Failed to abort multipart upload for {}: {}", location, e);
        }
    }
}

async fn read_part(
    file: &mut File,
    path: &Path,
    offset: u64,
    len: usize,
) -> Result<Vec<u8>, DeliveryError> {
    file.seek(SeekFrom::Start(offset))
        .await
        .map_err(|e| local_io(path, e))?;
    let mut body = vec![0u8; len];
    file.read_exact(&mut body)
        .await
        .map_err(|e| local_io(path, e))?;
    Ok(body)
}

fn local_io(path: &Path, e: std::io::Error) -> DeliveryError {
    DeliveryError::local_io(format!("{}: {}", path.display(), e))
}

fn record_attempt<T>(class: ArtifactClass, result: &Result<T, DeliveryError>) {
    let label = match result {
        Ok(_) => "success",
        Err(e) => e.kind.as_str(),
    };
    metrics::DELIVERY_ATTEMPTS
        .with_label_values(&[class.as_str(), label])
        .inc();
}
