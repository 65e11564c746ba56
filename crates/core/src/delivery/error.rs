//! Error types for the delivery module.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryErrorKind {
    /// Connection problems, timeouts, throttling, server-side 5xx.
    TransientNetwork,
    /// Credentials or bucket policy refuse the write.
    AccessDenied,
    /// Storage or request quota exhausted.
    QuotaExceeded,
    /// Any other refusal by the storage service.
    Rejected,
    /// The local artifact could not be read.
    LocalIo,
}

impl DeliveryErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TransientNetwork => "transient_network",
            Self::AccessDenied => "access_denied",
            Self::QuotaExceeded => "quota_exceeded",
            Self::Rejected => "rejected",
            Self::LocalIo => "local_io",
        }
    }
}

impl fmt::Display for DeliveryErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure to deliver an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {detail}")]
pub struct DeliveryError {
    pub kind: DeliveryErrorKind,
    pub detail: String,
}

impl DeliveryError {
    pub fn new(kind: DeliveryErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    pub fn transient(detail: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::TransientNetwork, detail)
    }

    pub fn access_denied(detail: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::AccessDenied, detail)
    }

    pub fn local_io(detail: impl Into<String>) -> Self {
        Self::new(DeliveryErrorKind::LocalIo, detail)
    }

    pub fn kind(&self) -> DeliveryErrorKind {
        self.kind
    }

    /// Only network trouble is worth another attempt. Everything else is
    /// configuration and will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        self.kind == DeliveryErrorKind::TransientNetwork
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(DeliveryError::transient("reset").is_retryable());
        assert!(!DeliveryError::access_denied("403").is_retryable());
        assert!(!DeliveryError::new(DeliveryErrorKind::QuotaExceeded, "full").is_retryable());
        assert!(!DeliveryError::new(DeliveryErrorKind::Rejected, "bad digest").is_retryable());
        assert!(!DeliveryError::local_io("gone").is_retryable());
    }

    #[test]
    fn test_display() {
        let err = DeliveryError::access_denied("AccessDenied: bucket policy");
        assert_eq!(err.to_string(), "access_denied: AccessDenied: bucket policy");
    }
}
