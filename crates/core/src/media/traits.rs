//! Trait definitions for the media tool boundary.

use async_trait::async_trait;
use std::path::Path;

use super::error::MediaToolError;
use super::types::{MediaInfo, TranscodeJob, TranscodeResult};

/// An external media-processing tool.
///
/// Implementations behave as a pure function of their inputs: the same input
/// file and [`TranscodeJob`] parameters produce the same output.
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Returns the name of this tool implementation.
    fn name(&self) -> &str;

    /// Probes a file to learn its container and stream layout.
    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaToolError>;

    /// Produces one output file according to the job.
    async fn transcode(&self, job: TranscodeJob) -> Result<TranscodeResult, MediaToolError>;

    /// Validates that the tool is installed and runnable.
    async fn validate(&self) -> Result<(), MediaToolError>;
}
