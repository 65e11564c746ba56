//! Error types for the media tool boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a [`MediaTool`](super::MediaTool) implementation.
#[derive(Debug, Error)]
pub enum MediaToolError {
    /// FFmpeg binary not found.
    #[error("FFmpeg not found at path: {path}")]
    FfmpegNotFound { path: PathBuf },

    /// FFprobe binary not found.
    #[error("FFprobe not found at path: {path}")]
    FfprobeNotFound { path: PathBuf },

    /// Input file not found.
    #[error("Input file not found: {path}")]
    InputNotFound { path: PathBuf },

    /// The tool could not read the file as media.
    #[error("Failed to probe media file: {reason}")]
    ProbeFailed { reason: String },

    /// Failed to parse probe output.
    #[error("Failed to parse media info: {reason}")]
    ParseError { reason: String },

    /// The tool ran but exited unsuccessfully.
    #[error("Media tool failed: {reason}")]
    ToolFailed {
        reason: String,
        diagnostic: Option<String>,
    },

    /// The tool did not finish in time and was killed.
    #[error("Media tool timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Output directory does not exist and could not be created.
    #[error("Failed to create output directory: {path}")]
    OutputDirectoryFailed { path: PathBuf },

    /// I/O error while driving the tool.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaToolError {
    /// Creates a tool failure with captured diagnostic output.
    pub fn tool_failed(reason: impl Into<String>, diagnostic: Option<String>) -> Self {
        Self::ToolFailed {
            reason: reason.into(),
            diagnostic,
        }
    }

    /// Creates a probe failure.
    pub fn probe_failed(reason: impl Into<String>) -> Self {
        Self::ProbeFailed {
            reason: reason.into(),
        }
    }

    /// Diagnostic output from the tool, if any was captured.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            Self::ToolFailed { diagnostic, .. } => diagnostic.as_deref(),
            Self::ProbeFailed { reason } => Some(reason.as_str()),
            _ => None,
        }
    }

    /// Whether the error comes from the tool environment rather than the input.
    pub fn is_environment(&self) -> bool {
        matches!(
            self,
            Self::FfmpegNotFound { .. }
                | Self::FfprobeNotFound { .. }
                | Self::OutputDirectoryFailed { .. }
                | Self::Io(_)
        )
    }
}
