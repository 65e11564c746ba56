//! Trait definitions for the notifier module.

use async_trait::async_trait;
use tracing::{info, warn};

use super::error::NotifyError;
use super::types::{CompletionEvent, FailureEvent, PublishReceipt};
use crate::metrics;
use crate::retry::{retry_with_backoff, RetryConfig};

pub type NotifyResult = Result<PublishReceipt, NotifyError>;

/// Publishes packaging outcomes to the notification bus.
#[async_trait]
pub trait CompletionNotifier: Send + Sync {
    /// Returns the name of this notifier implementation.
    fn name(&self) -> &str;

    async fn notify(&self, event: &CompletionEvent) -> NotifyResult;

    async fn notify_failure(&self, event: &FailureEvent) -> NotifyResult;
}

/// Publishes `event`, retrying every failure up to the policy's attempt limit.
pub async fn notify_with_retry(
    notifier: &dyn CompletionNotifier,
    policy: &RetryConfig,
    event: &CompletionEvent,
) -> NotifyResult {
    let operation = format!("notify {} via {}", event.bundle_id, notifier.name());
    let result = retry_with_backoff(policy, &operation, NotifyError::is_retryable, |_| async {
        let result = notifier.notify(event).await;
        let label = match &result {
            Ok(_) => "published",
            Err(e) => e.kind.as_str(),
        };
        metrics::NOTIFICATIONS.with_label_values(&[label]).inc();
        result
    })
    .await;

    if let Ok(receipt) = &result {
        info!(
            "Published completion event {} for {} (message {})",
            event.event_id,
            event.bundle_id,
            receipt.message_id.as_deref().unwrap_or("-")
        );
    }
    result
}

/// Publishes `event` with the same retry policy. Failures are only logged:
/// a failure event that cannot be published is dropped.
pub async fn notify_failure_best_effort(
    notifier: &dyn CompletionNotifier,
    policy: &RetryConfig,
    event: &FailureEvent,
) -> bool {
    let operation = format!("notify failure of {} via {}", event.bundle_id, notifier.name());
    let result = retry_with_backoff(policy, &operation, NotifyError::is_retryable, |_| async {
        let result = notifier.notify_failure(event).await;
        let label = match &result {
            Ok(_) => "failure_published",
            Err(e) => e.kind.as_str(),
        };
        metrics::NOTIFICATIONS.with_label_values(&[label]).inc();
        result
    })
    .await;

    match result {
        Ok(_) => {
            info!("Published failure event {} for {}", event.event_id, event.bundle_id);
            true
        }
        Err(e) => {
            warn!("Failure event for {} not published: {}", event.bundle_id, e);
            false
        }
    }
}
