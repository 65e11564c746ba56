//! Completion notifications.
//!
//! One [`CompletionEvent`] is published per completed bundle. Publishing is
//! retried on every failure; an event that still cannot be published stays
//! on disk as a pending notification for `replay-notifications`.
//!
//! A [`FailureEvent`] is published for each bundle that ends in `Failed`.
//! Those are best effort and never replayed.

mod config;
mod error;
mod sns;
mod traits;
mod types;

pub use config::NotifierConfig;
pub use error::{NotifyError, NotifyErrorKind};
pub use sns::SnsNotifier;
pub use traits::{
    notify_failure_best_effort, notify_with_retry, CompletionNotifier, NotifyResult,
};
pub use types::{CompletionEvent, FailureEvent, PublishReceipt};
