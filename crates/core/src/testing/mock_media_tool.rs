//! Mock media tool for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::media::{MediaInfo, MediaTool, MediaToolError, TranscodeJob, TranscodeResult};

/// Mock implementation of the MediaTool trait.
///
/// Probe results are configured per path. Transcodes are recorded and write
/// a small placeholder file to the requested output path.
///
/// # Example
///
/// ```rust,ignore
/// use avpackager_core::testing::{fixtures, MockMediaTool};
///
/// let media = MockMediaTool::new();
/// media.set_probe_result(&path, fixtures::video_info(&path, 600.0)).await;
///
/// let info = media.probe(&path).await?;
/// assert_eq!(media.probe_count().await, 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockMediaTool {
    /// Pre-configured probe results by path.
    probe_results: Arc<RwLock<HashMap<PathBuf, MediaInfo>>>,
    /// One-shot probe errors by path, taken before the result is consulted.
    probe_errors: Arc<RwLock<HashMap<PathBuf, MediaToolError>>>,
    probe_calls: Arc<RwLock<usize>>,
    /// Every transcode job submitted, in order.
    jobs: Arc<RwLock<Vec<TranscodeJob>>>,
    /// One-shot transcode failures keyed by a job id substring.
    transcode_failures: Arc<RwLock<Vec<(String, MediaToolError)>>>,
    /// Bytes written as transcode output.
    output_bytes: Arc<RwLock<Vec<u8>>>,
}

impl MockMediaTool {
    /// Create a new mock media tool.
    pub fn new() -> Self {
        Self {
            probe_results: Arc::new(RwLock::new(HashMap::new())),
            probe_errors: Arc::new(RwLock::new(HashMap::new())),
            probe_calls: Arc::new(RwLock::new(0)),
            jobs: Arc::new(RwLock::new(Vec::new())),
            transcode_failures: Arc::new(RwLock::new(Vec::new())),
            output_bytes: Arc::new(RwLock::new(b"mock media output".to_vec())),
        }
    }

    /// Set the probe result for a path.
    pub async fn set_probe_result(&self, path: impl AsRef<Path>, info: MediaInfo) {
        self.probe_results
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), info);
    }

    /// Make the next probe of `path` fail with `error`.
    pub async fn set_probe_error(&self, path: impl AsRef<Path>, error: MediaToolError) {
        self.probe_errors
            .write()
            .await
            .insert(path.as_ref().to_path_buf(), error);
    }

    /// Number of probe calls so far.
    pub async fn probe_count(&self) -> usize {
        *self.probe_calls.read().await
    }

    /// Get all submitted transcode jobs.
    pub async fn recorded_jobs(&self) -> Vec<TranscodeJob> {
        self.jobs.read().await.clone()
    }

    /// Make the next job whose id contains `job_id_part` fail with `error`.
    pub async fn fail_transcode_matching(&self, job_id_part: &str, error: MediaToolError) {
        self.transcode_failures
            .write()
            .await
            .push((job_id_part.to_string(), error));
    }

    /// Set the bytes written for every transcode output.
    pub async fn set_output_bytes(&self, bytes: Vec<u8>) {
        *self.output_bytes.write().await = bytes;
    }
}

impl Default for MockMediaTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaTool for MockMediaTool {
    fn name(&self) -> &str {
        "mock"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaToolError> {
        *self.probe_calls.write().await += 1;

        if let Some(error) = self.probe_errors.write().await.remove(path) {
            return Err(error);
        }

        if let Some(info) = self.probe_results.read().await.get(path) {
            return Ok(info.clone());
        }

        if !path.exists() {
            return Err(MediaToolError::InputNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(MediaToolError::probe_failed(format!(
            "no probe result configured for {}",
            path.display()
        )))
    }

    async fn transcode(&self, job: TranscodeJob) -> Result<TranscodeResult, MediaToolError> {
        self.jobs.write().await.push(job.clone());

        {
            let mut failures = self.transcode_failures.write().await;
            if let Some(index) = failures
                .iter()
                .position(|(part, _)| job.job_id.contains(part.as_str()))
            {
                let (_, error) = failures.remove(index);
                return Err(error);
            }
        }

        let bytes = self.output_bytes.read().await.clone();
        if let Some(parent) = job.output_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&job.output_path, &bytes).await?;

        Ok(TranscodeResult {
            job_id: job.job_id,
            output_path: job.output_path,
            output_size_bytes: bytes.len() as u64,
            duration_ms: 1,
        })
    }

    async fn validate(&self) -> Result<(), MediaToolError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::derivative::{ArtifactClass, DerivativeSpec};
    use crate::testing::fixtures;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_probe_error_is_one_shot() {
        let media = MockMediaTool::new();
        let path = PathBuf::from("/src/b1/b1_ma.mov");
        media
            .set_probe_result(&path, fixtures::video_info(&path, 60.0))
            .await;
        media
            .set_probe_error(&path, MediaToolError::probe_failed("boom"))
            .await;

        assert!(media.probe(&path).await.is_err());
        assert!(media.probe(&path).await.is_ok());
        assert_eq!(media.probe_count().await, 2);
    }

    #[tokio::test]
    async fn test_unconfigured_missing_path() {
        let media = MockMediaTool::new();
        let result = media.probe(Path::new("/nonexistent/file.mov")).await;
        assert!(matches!(result, Err(MediaToolError::InputNotFound { .. })));
    }

    #[tokio::test]
    async fn test_transcode_writes_output() {
        let dir = TempDir::new().unwrap();
        let media = MockMediaTool::new();
        media.set_output_bytes(b"abc".to_vec()).await;

        let output = dir.path().join("out/b1.mp3");
        let job = TranscodeJob {
            job_id: "b1-audio_access".to_string(),
            input_path: dir.path().join("b1_ma.wav"),
            output_path: output.clone(),
            params: DerivativeSpec::for_class(ArtifactClass::AudioAccess)
                .unwrap()
                .params,
        };
        let result = media.transcode(job).await.unwrap();

        assert_eq!(result.output_size_bytes, 3);
        assert_eq!(std::fs::read(output).unwrap(), b"abc");
        assert_eq!(media.recorded_jobs().await.len(), 1);
    }
}
