//! S3 object store.

use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use std::path::Path;
use tracing::{debug, info};

use super::error::{DeliveryError, DeliveryErrorKind};
use super::traits::ObjectStore;
use super::types::UploadedPart;
use crate::config::{aws_sdk_config, AwsConfig};

/// [`ObjectStore`] backed by Amazon S3 or an S3-compatible service.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds a client from the shared AWS settings.
    pub async fn from_config(config: &AwsConfig) -> Self {
        let sdk_config = aws_sdk_config(config).await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);

        // Custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        info!(
            "S3 object store initialized (region={}, endpoint={})",
            config.region,
            config.endpoint_url.as_deref().unwrap_or("default")
        );

        Self::new(Client::from_conf(builder.build()))
    }
}

/// Maps an S3 error code and HTTP status to a delivery error kind.
pub(crate) fn classify_service_error(code: Option<&str>, status: u16) -> DeliveryErrorKind {
    match code {
        Some(
            "AccessDenied"
            | "AllAccessDisabled"
            | "InvalidAccessKeyId"
            | "SignatureDoesNotMatch"
            | "ExpiredToken"
            | "InvalidToken"
            | "AccountProblem",
        ) => DeliveryErrorKind::AccessDenied,
        Some("QuotaExceeded" | "ServiceQuotaExceeded" | "TooManyBuckets" | "EntityTooLarge") => {
            DeliveryErrorKind::QuotaExceeded
        }
        Some(
            "SlowDown"
            | "InternalError"
            | "ServiceUnavailable"
            | "RequestTimeout"
            | "RequestTimeTooSkewed"
            | "Throttling"
            | "ThrottlingException",
        ) => DeliveryErrorKind::TransientNetwork,
        _ => match status {
            401 | 403 => DeliveryErrorKind::AccessDenied,
            408 | 429 | 500..=599 => DeliveryErrorKind::TransientNetwork,
            _ => DeliveryErrorKind::Rejected,
        },
    }
}

fn classify<E>(operation: &str, err: SdkError<E, HttpResponse>) -> DeliveryError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    let detail = format!("{} failed: {}", operation, DisplayErrorContext(&err));
    let kind = match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            DeliveryErrorKind::TransientNetwork
        }
        SdkError::ServiceError(service) => {
            classify_service_error(service.err().code(), service.raw().status().as_u16())
        }
        _ => DeliveryErrorKind::Rejected,
    };
    DeliveryError::new(kind, detail)
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn name(&self) -> &str {
        "s3"
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        path: &Path,
        content_type: &str,
    ) -> Result<Option<String>, DeliveryError> {
        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| DeliveryError::local_io(format!("{}: {}", path.display(), e)))?;

        debug!("PutObject s3://{}/{}", bucket, key);
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| classify("PutObject", e))?;

        Ok(output.e_tag().map(str::to_string))
    }

    async fn create_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String, DeliveryError> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| classify("CreateMultipartUpload", e))?;

        output
            .upload_id()
            .map(str::to_string)
            .ok_or_else(|| DeliveryError::new(DeliveryErrorKind::Rejected, "no upload id in response"))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: i32,
        body: Vec<u8>,
    ) -> Result<String, DeliveryError> {
        let output = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| classify("UploadPart", e))?;

        Ok(output.e_tag().unwrap_or_default().to_string())
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: Vec<UploadedPart>,
    ) -> Result<Option<String>, DeliveryError> {
        let completed_parts: Vec<CompletedPart> = parts
            .into_iter()
            .map(|part| {
                CompletedPart::builder()
                    .part_number(part.part_number)
                    .e_tag(part.etag)
                    .build()
            })
            .collect();

        let output = self
            .client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed_parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| classify("CompleteMultipartUpload", e))?;

        Ok(output.e_tag().map(str::to_string))
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), DeliveryError> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| classify("AbortMultipartUpload", e))?;
        Ok(())
    }
}
