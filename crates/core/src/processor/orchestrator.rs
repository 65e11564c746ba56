//! Packaging orchestrator.

use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, info, info_span, warn, Instrument};

use super::config::ProcessorConfig;
use super::types::{
    BundleOutcome, BundleState, FailureKind, FailureReason, ReplaySummary, RunSummary, Stage,
};
use crate::config::{Config, DestinationsConfig};
use crate::delivery::{DeliveryCoordinator, ObjectStore, RemoteLocation};
use crate::derivative::{
    DerivativeArtifact, DerivativeGenerator, DerivativeSpec, GenerationErrorKind, WorkArea,
};
use crate::locator::{
    AssetLocator, Bundle, BundleClaim, BundleFormat, CompletionRecord, FailureRecord,
    LocatorError, MarkerError, MarkerStore, ReviewRecord,
};
use crate::media::MediaTool;
use crate::metrics;
use crate::notifier::{
    notify_failure_best_effort, notify_with_retry, CompletionEvent, CompletionNotifier,
    FailureEvent,
};
use crate::package::{ArchivalPackager, BagMetadata};
use crate::registrar::{
    describe_with_retry, register_with_retry, DeliveredLocations, MetadataRegistrar,
    RegistrationResult,
};
use crate::retry::RetryConfig;
use crate::validator::{BundleValidator, ValidateError};

/// Errors that stop a whole run. Bundle failures never do.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error(transparent)]
    Marker(#[from] MarkerError),
}

/// External systems the orchestrator drives.
#[derive(Clone)]
pub struct Collaborators {
    pub media: Arc<dyn MediaTool>,
    pub object_store: Arc<dyn ObjectStore>,
    pub registrar: Arc<dyn MetadataRegistrar>,
    pub notifier: Arc<dyn CompletionNotifier>,
}

/// Stops new bundles from starting. In-flight bundles run to their end.
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Locations produced by the Delivering stage.
struct Delivered {
    derivatives: DeliveredLocations,
    package: Option<RemoteLocation>,
}

/// Drives each located bundle through
/// `Validating → Generating → Delivering → Registering → Notifying`.
///
/// A stage runs only after the previous one fully succeeded. Nothing is
/// rolled back on failure: delivered objects and registrations stay, no
/// completion marker is written, and the bundle is re-offered according to
/// the failure policy.
pub struct PackagingOrchestrator {
    environment: String,
    config: ProcessorConfig,
    scratch_root: PathBuf,
    markers: Arc<MarkerStore>,
    locator: AssetLocator,
    validator: BundleValidator,
    generator: DerivativeGenerator,
    delivery: DeliveryCoordinator,
    destinations: DestinationsConfig,
    packager: ArchivalPackager,
    registrar: Arc<dyn MetadataRegistrar>,
    registration_retry: RetryConfig,
    notifier: Arc<dyn CompletionNotifier>,
    notify_retry: RetryConfig,
    shutdown: ShutdownHandle,
}

impl PackagingOrchestrator {
    pub fn new(config: &Config, collaborators: Collaborators) -> Self {
        let markers = Arc::new(MarkerStore::new(config.storage.marker_dir()));
        let locator = AssetLocator::new(
            config.storage.source_root.clone(),
            Arc::clone(&markers),
            config.locator.clone(),
            config.processor.failure_policy,
        );

        Self {
            environment: config.environment.clone(),
            config: config.processor.clone(),
            scratch_root: config.storage.scratch_root.clone(),
            markers,
            locator,
            validator: BundleValidator::new(
                Arc::clone(&collaborators.media),
                config.locator.expected_roles.clone(),
            ),
            generator: DerivativeGenerator::new(collaborators.media),
            delivery: DeliveryCoordinator::new(collaborators.object_store, config.delivery.clone()),
            destinations: config.destinations.clone(),
            packager: ArchivalPackager::new(config.packaging.clone()),
            registrar: collaborators.registrar,
            registration_retry: config.archivesspace.retry.clone(),
            notifier: collaborators.notifier,
            notify_retry: config.notifier.retry.clone(),
            shutdown: ShutdownHandle::default(),
        }
    }

    pub fn markers(&self) -> &Arc<MarkerStore> {
        &self.markers
    }

    /// Handle that stops the run from starting further bundles.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Scans the source root once and processes every eligible bundle.
    ///
    /// Up to `max_concurrent_bundles` bundles are in flight at a time. A
    /// failing bundle is recorded and the run moves on.
    pub async fn run(&self) -> Result<RunSummary, ProcessorError> {
        self.markers.ensure_dir()?;

        let max_in_flight = self.config.max_concurrent_bundles.max(1);
        let mut summary = RunSummary::default();
        let mut scan = self.locator.locate()?;
        let mut in_flight = FuturesUnordered::new();

        info!(
            "Scanning {} (up to {} bundles at a time)",
            self.locator.source_root().display(),
            max_in_flight
        );

        loop {
            if in_flight.len() >= max_in_flight {
                if let Some(outcome) = in_flight.next().await {
                    Self::finish(&mut summary, outcome);
                }
                continue;
            }

            if self.shutdown.is_triggered() {
                info!("Shutdown requested, not starting further bundles");
                summary.interrupted = true;
                break;
            }

            let Some(bundle) = scan.next() else {
                break;
            };

            match self.locator.claim(&bundle) {
                Ok(Some(claim)) => in_flight.push(self.process_claimed(bundle, claim)),
                Ok(None) => {
                    info!("Skipping {}: claimed by another worker", bundle.id);
                    summary.skipped_claimed.push(bundle.id);
                }
                Err(e) => {
                    error!("Failed to claim {}: {}", bundle.id, e);
                    Self::finish(
                        &mut summary,
                        BundleOutcome {
                            bundle_id: bundle.id,
                            state: BundleState::failed(
                                Stage::Discovered,
                                FailureKind::Internal,
                                e.to_string(),
                            ),
                            duration: Duration::ZERO,
                        },
                    );
                }
            }
        }

        while let Some(outcome) = in_flight.next().await {
            Self::finish(&mut summary, outcome);
        }

        let malformed = scan.into_malformed();
        metrics::BUNDLES_MALFORMED.inc_by(malformed.len() as u64);
        summary.record_malformed(malformed);

        info!(
            "Run finished: {} completed, {} failed, {} malformed",
            summary.completed.len(),
            summary.failed.len(),
            summary.skipped_malformed.len()
        );
        Ok(summary)
    }

    /// Republishes every pending completion event, deleting each one accepted.
    pub async fn replay_pending_notifications(&self) -> Result<ReplaySummary, ProcessorError> {
        self.markers.ensure_dir()?;
        let mut summary = ReplaySummary::default();

        for event in self.markers.pending_notifications()? {
            match notify_with_retry(self.notifier.as_ref(), &self.notify_retry, &event).await {
                Ok(_) => {
                    self.markers.remove_pending_notification(&event.bundle_id)?;
                    summary.published.push(event.bundle_id);
                }
                Err(e) => {
                    error!("Replay of {} failed: {}", event.bundle_id, e);
                    summary.failed.push(event.bundle_id);
                }
            }
        }

        info!(
            "Replayed {} pending notifications ({} still pending)",
            summary.published.len(),
            summary.failed.len()
        );
        Ok(summary)
    }

    /// Runs the state machine for one claimed bundle, records the outcome
    /// in the marker store and announces a failure.
    pub async fn process_bundle(&self, bundle: &Bundle, claim: &BundleClaim) -> BundleState {
        let state = self.advance(bundle, claim).await;
        if let BundleState::Failed { stage, reason } = &state {
            self.record_failure(bundle, *stage, reason);
            self.announce_failure(bundle, *stage, reason).await;
        }
        state
    }

    fn finish(summary: &mut RunSummary, outcome: BundleOutcome) {
        let label = if outcome.state.is_completed() {
            "completed"
        } else {
            "failed"
        };
        metrics::BUNDLES_PROCESSED.with_label_values(&[label]).inc();
        summary.record(outcome);
    }

    async fn process_claimed(&self, bundle: Bundle, claim: BundleClaim) -> BundleOutcome {
        let span = info_span!("bundle", bundle_id = %bundle.id);
        async move {
            let started = Instant::now();
            info!("Processing {}", bundle.id);

            let state = self.process_bundle(&bundle, &claim).await;
            drop(claim);

            let duration = started.elapsed();
            match &state {
                BundleState::Failed { stage, reason } => error!(
                    "{} failed at {} ({}): {}",
                    bundle.id, stage, reason.kind, reason.detail
                ),
                _ => info!("{} {} in {:.1}s", bundle.id, state, duration.as_secs_f64()),
            }

            BundleOutcome {
                bundle_id: bundle.id,
                state,
                duration,
            }
        }
        .instrument(span)
        .await
    }

    async fn advance(&self, bundle: &Bundle, claim: &BundleClaim) -> BundleState {
        if let Err(state) = timed(Stage::Validating, self.validate(bundle)).await {
            return state;
        }
        claim.refresh();

        let (format, specs) = match (bundle.format(), DerivativeSpec::for_bundle(bundle)) {
            (Some(format), specs) if !specs.is_empty() => (format, specs),
            _ => {
                return BundleState::failed(
                    Stage::Generating,
                    FailureKind::Generation(GenerationErrorKind::UnsupportedInput),
                    "bundle has neither a video nor an audio master",
                )
            }
        };

        let work_area = match WorkArea::create(&self.scratch_root, &bundle.id) {
            Ok(area) => area,
            Err(e) => {
                return BundleState::failed(
                    Stage::Generating,
                    FailureKind::Internal,
                    format!("failed to create work area: {}", e),
                )
            }
        };

        let delivered = self
            .generate_and_deliver(bundle, format, &specs, &work_area, claim)
            .await;
        // Removed on the blocking pool; the drop inside `remove` only catches leftovers.
        if let Err(e) = work_area.remove().await {
            warn!("Failed to remove work area of {}: {}", bundle.id, e);
        }
        let delivered = match delivered {
            Ok(delivered) => delivered,
            Err(state) => return state,
        };
        claim.refresh();

        let registration =
            match timed(Stage::Registering, self.register(bundle, &delivered)).await {
                Ok(registration) => registration,
                Err(state) => return state,
            };
        claim.refresh();

        timed(
            Stage::Notifying,
            self.complete(bundle, format, &delivered, &registration),
        )
        .await
    }

    async fn generate_and_deliver(
        &self,
        bundle: &Bundle,
        format: BundleFormat,
        specs: &[DerivativeSpec],
        work_area: &WorkArea,
        claim: &BundleClaim,
    ) -> Result<Delivered, BundleState> {
        let artifacts = timed(Stage::Generating, self.generate(bundle, specs, work_area)).await?;
        claim.refresh();

        timed(
            Stage::Delivering,
            self.deliver(bundle, format, &artifacts, work_area, claim),
        )
        .await
    }

    async fn validate(&self, bundle: &Bundle) -> Result<(), BundleState> {
        match self.validator.validate(bundle).await {
            Ok(report) => {
                debug!("{} valid ({} sources probed)", bundle.id, report.probes.len());
                Ok(())
            }
            Err(ValidateError::Invalid(e)) => {
                warn!("{} failed validation, flagging for review: {}", bundle.id, e);
                let record = ReviewRecord {
                    bundle_id: bundle.id.clone(),
                    kind: e.kind.as_str().to_string(),
                    role: Some(e.role),
                    path: e.path.clone(),
                    detail: e.detail.clone(),
                    flagged_at: Utc::now(),
                };
                if let Err(marker_error) = self.markers.flag_review(&record) {
                    error!("Failed to flag {} for review: {}", bundle.id, marker_error);
                }
                Err(BundleState::failed(
                    Stage::Validating,
                    FailureKind::Validation(e.kind),
                    e.to_string(),
                ))
            }
            Err(ValidateError::ToolUnavailable(e)) => Err(BundleState::failed(
                Stage::Validating,
                FailureKind::Internal,
                e.to_string(),
            )),
        }
    }

    async fn generate(
        &self,
        bundle: &Bundle,
        specs: &[DerivativeSpec],
        work_area: &WorkArea,
    ) -> Result<Vec<DerivativeArtifact>, BundleState> {
        let mut artifacts = Vec::with_capacity(specs.len());
        let mut failures = Vec::new();
        for result in self.generator.generate_all(bundle, specs, work_area).await {
            match result {
                Ok(artifact) => artifacts.push(artifact),
                Err(e) => failures.push(e),
            }
        }

        match failures.first() {
            None => Ok(artifacts),
            Some(first) => {
                let detail = failures
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(BundleState::failed(
                    Stage::Generating,
                    FailureKind::Generation(first.kind),
                    detail,
                ))
            }
        }
    }

    async fn deliver(
        &self,
        bundle: &Bundle,
        format: BundleFormat,
        artifacts: &[DerivativeArtifact],
        work_area: &WorkArea,
        claim: &BundleClaim,
    ) -> Result<Delivered, BundleState> {
        let mut derivatives = DeliveredLocations::new();
        for artifact in artifacts {
            let location = self.deliver_one(artifact).await?;
            derivatives.insert(artifact.class, location);
            claim.refresh();
        }

        let package = if self.packager.is_enabled() {
            let description =
                describe_with_retry(self.registrar.as_ref(), &self.registration_retry, bundle)
                    .await
                    .map_err(|e| {
                        BundleState::failed(
                            Stage::Delivering,
                            FailureKind::Registration(e.kind),
                            format!("describing {} for its package: {}", bundle.id, e),
                        )
                    })?;
            let metadata = BagMetadata {
                format,
                description,
            };
            let artifact = self
                .packager
                .build(bundle, &metadata, work_area)
                .await
                .map_err(|e| {
                    BundleState::failed(Stage::Delivering, FailureKind::Packaging, e.to_string())
                })?;
            Some(self.deliver_one(&artifact).await?)
        } else {
            None
        };

        Ok(Delivered {
            derivatives,
            package,
        })
    }

    async fn deliver_one(&self, artifact: &DerivativeArtifact) -> Result<RemoteLocation, BundleState> {
        let destination = self.destinations.for_class(artifact.class);
        let result = self.delivery.deliver(artifact, destination).await;
        match result.outcome {
            Ok(_) => Ok(result.location),
            Err(e) => Err(BundleState::failed(
                Stage::Delivering,
                FailureKind::Delivery(e.kind),
                format!("{} to {}: {}", artifact.class, result.location, e),
            )),
        }
    }

    async fn register(
        &self,
        bundle: &Bundle,
        delivered: &Delivered,
    ) -> Result<RegistrationResult, BundleState> {
        register_with_retry(
            self.registrar.as_ref(),
            &self.registration_retry,
            bundle,
            &delivered.derivatives,
        )
        .await
        .map_err(|e| {
            BundleState::failed(
                Stage::Registering,
                FailureKind::Registration(e.kind),
                e.to_string(),
            )
        })
    }

    /// Writes the pending event and the completion marker, then publishes.
    ///
    /// The marker is written before publishing so a bundle whose notification
    /// keeps failing is still never reprocessed.
    async fn complete(
        &self,
        bundle: &Bundle,
        format: BundleFormat,
        delivered: &Delivered,
        registration: &RegistrationResult,
    ) -> BundleState {
        let event = CompletionEvent::new(
            &bundle.id,
            &self.environment,
            format,
            delivered
                .derivatives
                .iter()
                .map(|(class, location)| (*class, location.uri()))
                .collect(),
            delivered.package.as_ref().map(RemoteLocation::uri),
            &registration.record_uri,
        );

        if let Err(e) = self.markers.write_pending_notification(&event) {
            return BundleState::failed(
                Stage::Notifying,
                FailureKind::Internal,
                format!("failed to record pending notification: {}", e),
            );
        }

        let record = CompletionRecord {
            bundle_id: bundle.id.clone(),
            event_id: event.event_id,
            metadata_record: registration.record_uri.clone(),
            completed_at: event.completed_at,
        };
        if let Err(e) = self.markers.mark_complete(&record) {
            // Never leave an event to replay for a bundle that is not complete.
            if let Err(cleanup) = self.markers.remove_pending_notification(&bundle.id) {
                error!("Failed to remove pending notification for {}: {}", bundle.id, cleanup);
            }
            return BundleState::failed(
                Stage::Notifying,
                FailureKind::Internal,
                format!("failed to write completion marker: {}", e),
            );
        }
        if let Err(e) = self.markers.clear_failure(&bundle.id) {
            warn!("Failed to clear old failure record for {}: {}", bundle.id, e);
        }
        info!("{} marked complete", bundle.id);

        let notification_published =
            match notify_with_retry(self.notifier.as_ref(), &self.notify_retry, &event).await {
                Ok(_) => {
                    if let Err(e) = self.markers.remove_pending_notification(&bundle.id) {
                        warn!("Failed to remove pending notification for {}: {}", bundle.id, e);
                    }
                    true
                }
                Err(e) => {
                    error!(
                        "Completion event {} for {} not published, left for replay: {}",
                        event.event_id, bundle.id, e
                    );
                    false
                }
            };

        BundleState::Completed {
            notification_published,
        }
    }

    fn record_failure(&self, bundle: &Bundle, stage: Stage, reason: &FailureReason) {
        // Validation failures are flagged for review instead.
        if matches!(reason.kind, FailureKind::Validation(_)) {
            return;
        }

        let record = FailureRecord {
            bundle_id: bundle.id.clone(),
            stage: stage.as_str().to_string(),
            kind: reason.kind.as_str().to_string(),
            detail: reason.detail.clone(),
            failed_at: Utc::now(),
        };
        if let Err(e) = self.markers.record_failure(&record) {
            error!("Failed to record failure of {}: {}", bundle.id, e);
        }
    }

    /// Publishes a failure event. Never affects the bundle's outcome.
    async fn announce_failure(&self, bundle: &Bundle, stage: Stage, reason: &FailureReason) {
        let event = FailureEvent::new(
            &bundle.id,
            &self.environment,
            bundle.format(),
            stage.as_str(),
            reason.kind.as_str(),
            &reason.detail,
        );
        notify_failure_best_effort(self.notifier.as_ref(), &self.notify_retry, &event).await;
    }
}

async fn timed<T>(stage: Stage, work: impl Future<Output = T>) -> T {
    debug!("Entering {}", stage);
    let started = Instant::now();
    let output = work.await;
    metrics::STAGE_DURATION
        .with_label_values(&[stage.as_str()])
        .observe(started.elapsed().as_secs_f64());
    output
}
