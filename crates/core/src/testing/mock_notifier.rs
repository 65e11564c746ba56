//! Mock completion notifier for testing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notifier::{
    CompletionEvent, CompletionNotifier, FailureEvent, NotifyError, NotifyResult, PublishReceipt,
};

#[derive(Debug, Default)]
struct NotifierState {
    published: Vec<CompletionEvent>,
    attempts: usize,
    failures: Vec<FailureEvent>,
    queued_errors: VecDeque<NotifyError>,
    persistent_error: Option<NotifyError>,
}

/// Mock implementation of the CompletionNotifier trait.
///
/// Queued errors and attempt counts apply to completion events only. Failure
/// events are refused only while [`MockNotifier::fail_always`] is in effect.
#[derive(Debug, Clone, Default)]
pub struct MockNotifier {
    state: Arc<RwLock<NotifierState>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` publishes with `error`.
    pub async fn fail_next(&self, count: usize, error: NotifyError) {
        let mut state = self.state.write().await;
        for _ in 0..count {
            state.queued_errors.push_back(error.clone());
        }
    }

    /// Fail every publish until [`MockNotifier::recover`] is called.
    pub async fn fail_always(&self, error: NotifyError) {
        self.state.write().await.persistent_error = Some(error);
    }

    pub async fn recover(&self) {
        let mut state = self.state.write().await;
        state.persistent_error = None;
        state.queued_errors.clear();
    }

    /// Successfully published events.
    pub async fn published(&self) -> Vec<CompletionEvent> {
        self.state.read().await.published.clone()
    }

    /// Successfully published failure events.
    pub async fn failures(&self) -> Vec<FailureEvent> {
        self.state.read().await.failures.clone()
    }

    /// Completion publish attempts, failed ones included.
    pub async fn attempts(&self) -> usize {
        self.state.read().await.attempts
    }
}

#[async_trait]
impl CompletionNotifier for MockNotifier {
    fn name(&self) -> &str {
        "mock"
    }

    async fn notify(&self, event: &CompletionEvent) -> NotifyResult {
        let mut state = self.state.write().await;
        state.attempts += 1;

        if let Some(error) = state.queued_errors.pop_front() {
            return Err(error);
        }
        if let Some(error) = &state.persistent_error {
            return Err(error.clone());
        }

        state.published.push(event.clone());
        Ok(PublishReceipt {
            message_id: Some(format!("msg-{}", state.published.len())),
        })
    }

    async fn notify_failure(&self, event: &FailureEvent) -> NotifyResult {
        let mut state = self.state.write().await;
        if let Some(error) = &state.persistent_error {
            return Err(error.clone());
        }

        state.failures.push(event.clone());
        Ok(PublishReceipt {
            message_id: Some(format!("failure-msg-{}", state.failures.len())),
        })
    }
}
