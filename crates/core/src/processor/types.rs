//! Types for the processor module.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::delivery::DeliveryErrorKind;
use crate::derivative::GenerationErrorKind;
use crate::locator::MalformedBundle;
use crate::registrar::RegistrationErrorKind;
use crate::validator::ValidationErrorKind;

/// Processing stage of one bundle, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Discovered,
    Validating,
    Generating,
    Delivering,
    Registering,
    Notifying,
    Completed,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Validating => "validating",
            Self::Generating => "generating",
            Self::Delivering => "delivering",
            Self::Registering => "registering",
            Self::Notifying => "notifying",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error kind a bundle failed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation(ValidationErrorKind),
    Generation(GenerationErrorKind),
    Delivery(DeliveryErrorKind),
    Registration(RegistrationErrorKind),
    /// The archival package could not be built.
    Packaging,
    /// Local state (markers, work area) or the media tool environment.
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation(kind) => kind.as_str(),
            Self::Generation(kind) => kind.as_str(),
            Self::Delivery(kind) => kind.as_str(),
            Self::Registration(kind) => kind.as_str(),
            Self::Packaging => "packaging",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    pub kind: FailureKind,
    pub detail: String,
}

impl FailureReason {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// Lifecycle state of one bundle within a processing attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleState {
    Active(Stage),
    Completed {
        /// False when the event was left pending for replay.
        notification_published: bool,
    },
    Failed {
        stage: Stage,
        reason: FailureReason,
    },
}

impl BundleState {
    pub fn failed(stage: Stage, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self::Failed {
            stage,
            reason: FailureReason::new(kind, detail),
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            Self::Active(stage) => *stage,
            Self::Completed { .. } => Stage::Completed,
            Self::Failed { stage, .. } => *stage,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for BundleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Active(stage) => write!(f, "{}", stage),
            Self::Completed { .. } => f.write_str("completed"),
            Self::Failed { stage, reason } => write!(f, "failed({}, {})", stage, reason.kind),
        }
    }
}

/// Final state of one bundle after a processing attempt.
#[derive(Debug, Clone)]
pub struct BundleOutcome {
    pub bundle_id: String,
    pub state: BundleState,
    pub duration: Duration,
}

/// A bundle that ended in `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedBundle {
    pub bundle_id: String,
    pub stage: Stage,
    pub kind: String,
    pub detail: String,
}

/// Aggregate result of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub completed: Vec<String>,
    pub failed: Vec<FailedBundle>,
    pub skipped_malformed: Vec<MalformedBundle>,
    /// Offered but claimed by another worker first.
    pub skipped_claimed: Vec<String>,
    /// Completed bundles whose notification awaits replay.
    pub notifications_pending: Vec<String>,
    /// Shutdown stopped the run before the scan was exhausted.
    pub interrupted: bool,
}

impl RunSummary {
    pub fn record(&mut self, outcome: BundleOutcome) {
        match outcome.state {
            BundleState::Completed {
                notification_published,
            } => {
                if !notification_published {
                    self.notifications_pending.push(outcome.bundle_id.clone());
                }
                self.completed.push(outcome.bundle_id);
            }
            BundleState::Failed { stage, reason } => self.failed.push(FailedBundle {
                bundle_id: outcome.bundle_id,
                stage,
                kind: reason.kind.as_str().to_string(),
                detail: reason.detail,
            }),
            BundleState::Active(_) => {}
        }
    }

    pub fn record_malformed(&mut self, malformed: Vec<MalformedBundle>) {
        self.skipped_malformed.extend(malformed);
    }

    /// 0 when no bundle failed, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() {
            0
        } else {
            1
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} completed, {} failed, {} malformed, {} claimed elsewhere{}",
            self.completed.len(),
            self.failed.len(),
            self.skipped_malformed.len(),
            self.skipped_claimed.len(),
            if self.interrupted { " (interrupted)" } else { "" }
        )?;
        for id in &self.completed {
            writeln!(f, "  completed  {}", id)?;
        }
        for failed in &self.failed {
            writeln!(
                f,
                "  failed     {} at {} ({}): {}",
                failed.bundle_id, failed.stage, failed.kind, failed.detail
            )?;
        }
        for skipped in &self.skipped_malformed {
            writeln!(f, "  malformed  {}: {}", skipped.path.display(), skipped.reason)?;
        }
        for id in &self.notifications_pending {
            writeln!(f, "  notification pending for {}", id)?;
        }
        Ok(())
    }
}

/// Result of replaying pending notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    pub published: Vec<String>,
    pub failed: Vec<String>,
}

impl ReplaySummary {
    pub fn exit_code(&self) -> i32 {
        if self.failed.is_empty() {
            0
        } else {
            1
        }
    }
}
