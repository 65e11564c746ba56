//! Error types for the validator module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::locator::SourceRole;
use crate::media::MediaToolError;

/// What is wrong with a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// The role has no file, or the file is gone.
    MissingFile,
    /// The file has zero bytes.
    EmptyFile,
    /// The file is readable media, but not the kind its role requires.
    FormatMismatch,
    /// The media tool cannot read the file at all.
    CorruptContainer,
}

impl ValidationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingFile => "missing_file",
            Self::EmptyFile => "empty_file",
            Self::FormatMismatch => "format_mismatch",
            Self::CorruptContainer => "corrupt_container",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A source file that fails its role's expectations.
///
/// Never retried: the source data needs a human.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind} for {role}{}: {detail}", path_suffix(.path))]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub role: SourceRole,
    pub path: Option<PathBuf>,
    pub detail: String,
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| format!(" ({})", p.display()))
        .unwrap_or_default()
}

impl ValidationError {
    pub fn new(
        kind: ValidationErrorKind,
        role: SourceRole,
        path: Option<PathBuf>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            role,
            path,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ValidationErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        false
    }
}

/// Errors returned by [`BundleValidator::validate`](super::BundleValidator::validate).
#[derive(Debug, Error)]
pub enum ValidateError {
    /// The bundle itself is bad.
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    /// The probe could not run. Says nothing about the bundle.
    #[error("Media tool unavailable during validation: {0}")]
    ToolUnavailable(#[source] MediaToolError),
}
