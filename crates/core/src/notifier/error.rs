//! Error types for the notifier module.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyErrorKind {
    Unreachable,
    Rejected,
}

impl NotifyErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for NotifyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to publish a completion event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification {kind}: {detail}")]
pub struct NotifyError {
    pub kind: NotifyErrorKind,
    pub detail: String,
}

impl NotifyError {
    pub fn new(kind: NotifyErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::new(NotifyErrorKind::Unreachable, detail)
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::new(NotifyErrorKind::Rejected, detail)
    }

    pub fn kind(&self) -> NotifyErrorKind {
        self.kind
    }

    /// Both kinds are retried before the notification is left for replay.
    pub fn is_retryable(&self) -> bool {
        true
    }
}
