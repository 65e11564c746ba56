//! Error types for the registrar module.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationErrorKind {
    /// No archival record carries the bundle's identifier.
    RecordNotFound,
    /// Credentials were refused.
    AuthFailure,
    /// The metadata system could not be reached or failed server-side.
    Unreachable,
    /// The metadata system refused the update.
    Rejected,
}

impl RegistrationErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RecordNotFound => "record_not_found",
            Self::AuthFailure => "auth_failure",
            Self::Unreachable => "unreachable",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RegistrationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to update the metadata record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct RegistrationError {
    pub kind: RegistrationErrorKind,
    pub detail: String,
}

impl RegistrationError {
    pub fn new(kind: RegistrationErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::new(RegistrationErrorKind::Unreachable, detail)
    }

    pub fn kind(&self) -> RegistrationErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.kind == RegistrationErrorKind::Unreachable
    }
}

impl From<reqwest::Error> for RegistrationError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::new(RegistrationErrorKind::Rejected, format!("unexpected response: {}", e))
        } else {
            Self::unreachable(e.to_string())
        }
    }
}
