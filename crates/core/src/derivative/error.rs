//! Error types for the derivative module.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::spec::ArtifactClass;
use crate::media::MediaToolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationErrorKind {
    /// The media tool could not be run or exited unsuccessfully.
    ToolInvocationFailed,
    /// No usable source for this derivative.
    UnsupportedInput,
    /// The tool reported success but wrote nothing.
    OutputEmpty,
}

impl GenerationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolInvocationFailed => "tool_invocation_failed",
            Self::UnsupportedInput => "unsupported_input",
            Self::OutputEmpty => "output_empty",
        }
    }
}

impl fmt::Display for GenerationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to produce one derivative.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{class} generation failed ({kind}): {detail}")]
pub struct GenerationError {
    pub kind: GenerationErrorKind,
    pub class: ArtifactClass,
    pub detail: String,
    /// Output of the media tool, truncated.
    pub diagnostic: Option<String>,
}

impl GenerationError {
    pub fn new(kind: GenerationErrorKind, class: ArtifactClass, detail: impl Into<String>) -> Self {
        Self {
            kind,
            class,
            detail: detail.into(),
            diagnostic: None,
        }
    }

    /// Classifies a media tool failure.
    pub fn from_tool(class: ArtifactClass, error: &MediaToolError) -> Self {
        let kind = match error {
            MediaToolError::InputNotFound { .. }
            | MediaToolError::ProbeFailed { .. }
            | MediaToolError::ParseError { .. } => GenerationErrorKind::UnsupportedInput,
            _ => GenerationErrorKind::ToolInvocationFailed,
        };
        Self {
            kind,
            class,
            detail: error.to_string(),
            diagnostic: error.diagnostic().map(str::to_string),
        }
    }

    pub fn kind(&self) -> GenerationErrorKind {
        self.kind
    }

    /// Generation failures are never retried automatically.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
