//! Packaging lifecycle integration tests.
//!
//! These tests drive the orchestrator end to end with mock collaborators:
//! - Full run: derivatives, package, registration, notification, markers
//! - Bundles that are incomplete, malformed or already done are not offered
//! - Failures at each stage stop the bundle without touching later stages
//! - Retry limits for transient and permanent errors
//! - Replay of notifications that could not be published
//! - Audio bundles produce only the audio derivatives

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use avpackager_core::{
    config::Config,
    delivery::{DeliveryError, DeliveryErrorKind},
    derivative::ArtifactClass,
    locator::{BundleFormat, FailurePolicy, SourceRole},
    media::MediaToolError,
    notifier::NotifyError,
    processor::{BundleState, FailureKind, Stage},
    registrar::{DateRange, RegistrationError, RegistrationErrorKind},
    testing::{fixtures, MockMediaTool, MockNotifier, MockObjectStore, MockRegistrar},
    validator::ValidationErrorKind,
    Collaborators, PackagingOrchestrator,
};

/// Orchestrator wired to mocks over a temporary source and scratch root.
struct TestHarness {
    orchestrator: PackagingOrchestrator,
    media: MockMediaTool,
    store: MockObjectStore,
    registrar: MockRegistrar,
    notifier: MockNotifier,
    config: Config,
    _dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        Self::with_config(|_| {})
    }

    fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = fixtures::config(dir.path());
        adjust(&mut config);

        let media = MockMediaTool::new();
        let store = MockObjectStore::new();
        let registrar = MockRegistrar::new();
        let notifier = MockNotifier::new();

        let orchestrator = PackagingOrchestrator::new(
            &config,
            Collaborators {
                media: Arc::new(media.clone()),
                object_store: Arc::new(store.clone()),
                registrar: Arc::new(registrar.clone()),
                notifier: Arc::new(notifier.clone()),
            },
        );

        Self {
            orchestrator,
            media,
            store,
            registrar,
            notifier,
            config,
            _dir: dir,
        }
    }

    fn source_root(&self) -> &Path {
        &self.config.storage.source_root
    }

    fn scratch_root(&self) -> PathBuf {
        self.config.storage.scratch_root.clone()
    }

    /// Writes a complete bundle and registers probe results for it.
    async fn add_bundle(&self, id: &str) -> avpackager_core::locator::Bundle {
        let bundle = fixtures::bundle_on_disk(self.source_root(), id);
        fixtures::probe_bundle(&self.media, &bundle, 600.0).await;
        bundle
    }

    async fn delivered_keys(&self, class: ArtifactClass) -> Vec<String> {
        self.store
            .keys(self.config.destinations.for_class(class))
            .await
    }
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_full_run_delivers_registers_and_notifies() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.completed, vec!["b1".to_string()]);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.exit_code(), 0);

    assert_eq!(harness.delivered_keys(ArtifactClass::Poster).await, vec!["b1.png"]);
    assert_eq!(harness.delivered_keys(ArtifactClass::AudioAccess).await, vec!["b1.mp3"]);
    assert_eq!(harness.delivered_keys(ArtifactClass::VideoAccess).await, vec!["b1.mp4"]);
    assert_eq!(
        harness.delivered_keys(ArtifactClass::VideoMezzanine).await,
        vec!["b1.mov"]
    );
    assert_eq!(harness.delivered_keys(ArtifactClass::Package).await, vec!["b1.tar.gz"]);

    // Registered once with the four derivative locations.
    let registrations = harness.registrar.registrations().await;
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].bundle_id, "b1");
    assert_eq!(registrations[0].locations.len(), 4);
    assert!(!registrations[0].locations.contains_key(&ArtifactClass::Package));

    // One event referencing every delivered location and the record.
    let events = harness.notifier.published().await;
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.bundle_id, "b1");
    assert_eq!(event.environment, "test");
    assert_eq!(
        event.derivatives.get(&ArtifactClass::Poster).map(String::as_str),
        Some("s3://mi-posters/b1.png")
    );
    assert_eq!(event.package.as_deref(), Some("s3://mi-packages/b1.tar.gz"));
    assert_eq!(
        Some(event.metadata_record.clone()),
        harness.registrar.record_for("b1").await
    );

    let markers = harness.orchestrator.markers();
    assert!(markers.is_complete("b1"));
    assert!(!markers.has_pending_notification("b1"));
    let record = markers.read_completion("b1").unwrap().unwrap();
    assert_eq!(record.event_id, event.event_id);

    // Work areas are gone.
    assert_eq!(std::fs::read_dir(harness.scratch_root()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_package_describes_archival_object() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    harness
        .registrar
        .set_dates(DateRange::from_expressions("1961", Some("1963-02")))
        .await;

    let summary = harness.orchestrator.run().await.unwrap();
    assert_eq!(summary.completed, vec!["b1".to_string()]);
    assert_eq!(harness.registrar.describe_count().await, 1);

    let bytes = harness.store.object("mi-packages", "b1.tar.gz").await.unwrap();
    let mut archive = tar::Archive::new(flate2::read::GzDecoder::new(&bytes[..]));
    let mut bag_info = String::new();
    for entry in archive.entries().unwrap() {
        let mut entry = entry.unwrap();
        if entry.path().unwrap().ends_with("bag-info.txt") {
            entry.read_to_string(&mut bag_info).unwrap();
        }
    }

    assert!(bag_info.contains("ArchivesSpace-URI: /repositories/2/archival_objects/b1\n"));
    assert!(bag_info.contains("Start-Date: 1961-01-01\nEnd-Date: 1963-02-28\n"));
    assert!(bag_info.contains("Origin: av_digitization_video\n"));
}

// =============================================================================
// Audio bundles
// =============================================================================

/// Harness whose bundles only need an audio master.
fn audio_harness() -> TestHarness {
    TestHarness::with_config(|config| {
        config.locator.expected_roles = vec![SourceRole::AudioMaster];
    })
}

async fn add_audio_bundle(
    harness: &TestHarness,
    id: &str,
    with_still: bool,
) -> avpackager_core::locator::Bundle {
    let mut bundle = harness.add_bundle(id).await;
    let mut dropped = vec![SourceRole::VideoMaster];
    if !with_still {
        dropped.push(SourceRole::StillImage);
    }
    for role in dropped {
        if let Some(path) = bundle.files.remove(&role) {
            std::fs::remove_file(path).unwrap();
        }
    }
    bundle
}

#[tokio::test]
async fn test_audio_bundle_delivers_only_audio_access() {
    let harness = audio_harness();
    let bundle = add_audio_bundle(&harness, "a1", false).await;
    assert_eq!(bundle.format(), Some(BundleFormat::Audio));

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.completed, vec!["a1".to_string()]);
    assert!(summary.failed.is_empty());

    let jobs = harness.media.recorded_jobs().await;
    assert_eq!(jobs.len(), 1);
    assert!(jobs[0].job_id.contains("audio_access"));

    assert_eq!(harness.delivered_keys(ArtifactClass::AudioAccess).await, vec!["a1.mp3"]);
    assert!(harness.delivered_keys(ArtifactClass::Poster).await.is_empty());
    assert!(harness.delivered_keys(ArtifactClass::VideoAccess).await.is_empty());
    assert!(harness.delivered_keys(ArtifactClass::VideoMezzanine).await.is_empty());
    assert_eq!(harness.delivered_keys(ArtifactClass::Package).await, vec!["a1.tar.gz"]);

    let registrations = harness.registrar.registrations().await;
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].locations.len(), 1);
    assert!(registrations[0]
        .locations
        .contains_key(&ArtifactClass::AudioAccess));

    let events = harness.notifier.published().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].format, BundleFormat::Audio);
    assert_eq!(events[0].derivatives.len(), 1);
    assert!(harness.orchestrator.markers().is_complete("a1"));
}

#[tokio::test]
async fn test_audio_bundle_with_still_gets_poster() {
    let harness = audio_harness();
    add_audio_bundle(&harness, "a2", true).await;

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.completed, vec!["a2".to_string()]);
    assert_eq!(harness.media.recorded_jobs().await.len(), 2);
    assert_eq!(harness.delivered_keys(ArtifactClass::Poster).await, vec!["a2.png"]);
    assert_eq!(harness.delivered_keys(ArtifactClass::AudioAccess).await, vec!["a2.mp3"]);
    assert!(harness.delivered_keys(ArtifactClass::VideoAccess).await.is_empty());
    assert_eq!(harness.registrar.registrations().await[0].locations.len(), 2);
}

#[tokio::test]
async fn test_audio_access_failure_fails_audio_bundle() {
    let harness = audio_harness();
    add_audio_bundle(&harness, "a3", false).await;
    harness
        .media
        .fail_transcode_matching(
            "audio_access",
            MediaToolError::tool_failed("exit status 1", None),
        )
        .await;

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].stage, Stage::Generating);
    assert_eq!(harness.store.object_count().await, 0);
    assert_eq!(harness.registrar.call_count().await, 0);

    let failures = harness.notifier.failures().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].format, Some(BundleFormat::Audio));
}

#[tokio::test]
async fn test_completed_bundle_is_not_processed_again() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;

    harness.orchestrator.run().await.unwrap();
    let jobs_after_first = harness.media.recorded_jobs().await.len();
    let objects_after_first = harness.store.object_count().await;

    let summary = harness.orchestrator.run().await.unwrap();

    assert!(summary.completed.is_empty());
    assert!(summary.failed.is_empty());
    assert_eq!(harness.media.recorded_jobs().await.len(), jobs_after_first);
    assert_eq!(harness.store.object_count().await, objects_after_first);
    assert_eq!(harness.registrar.call_count().await, 1);
    assert_eq!(harness.notifier.published().await.len(), 1);
}

#[tokio::test]
async fn test_packaging_disabled_skips_package() {
    let harness = TestHarness::with_config(|config| config.packaging.enabled = false);
    harness.add_bundle("b1").await;

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.completed.len(), 1);
    assert!(harness.delivered_keys(ArtifactClass::Package).await.is_empty());
    assert_eq!(harness.store.object_count().await, 4);
    assert!(harness.notifier.published().await[0].package.is_none());
}

#[tokio::test]
async fn test_concurrent_bundles_all_complete() {
    let harness = TestHarness::with_config(|config| config.processor.max_concurrent_bundles = 2);
    for id in ["b1", "b2", "b3"] {
        harness.add_bundle(id).await;
    }

    let mut summary = harness.orchestrator.run().await.unwrap();
    summary.completed.sort();

    assert_eq!(summary.completed, vec!["b1", "b2", "b3"]);
    assert_eq!(harness.registrar.call_count().await, 3);
    assert_eq!(harness.notifier.published().await.len(), 3);
    assert_eq!(harness.media.recorded_jobs().await.len(), 12);
}

// =============================================================================
// Discovery
// =============================================================================

#[tokio::test]
async fn test_bundle_missing_a_role_is_never_offered() {
    let harness = TestHarness::new();
    let bundle = harness.add_bundle("b1").await;
    std::fs::remove_file(bundle.file(SourceRole::AudioMaster).unwrap()).unwrap();

    let summary = harness.orchestrator.run().await.unwrap();

    assert!(summary.completed.is_empty());
    assert!(summary.failed.is_empty());
    assert_eq!(harness.media.probe_count().await, 0);
    assert!(!harness.orchestrator.markers().is_complete("b1"));
}

#[tokio::test]
async fn test_malformed_bundle_is_reported_and_others_proceed() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    std::fs::create_dir_all(harness.source_root().join("bad.name")).unwrap();

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.completed, vec!["b1".to_string()]);
    assert_eq!(summary.skipped_malformed.len(), 1);
    assert!(summary.skipped_malformed[0].path.ends_with("bad.name"));
    assert_eq!(summary.exit_code(), 0);
}

#[tokio::test]
async fn test_shutdown_before_run_starts_nothing() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;

    harness.orchestrator.shutdown_handle().trigger();
    let summary = harness.orchestrator.run().await.unwrap();

    assert!(summary.interrupted);
    assert!(summary.completed.is_empty());
    assert_eq!(harness.media.probe_count().await, 0);
}

// =============================================================================
// Validation
// =============================================================================

#[tokio::test]
async fn test_source_vanishing_after_discovery_flags_for_review() {
    let harness = TestHarness::new();
    let bundle = harness.add_bundle("b1").await;
    let markers = harness.orchestrator.markers();
    markers.ensure_dir().unwrap();
    let claim = markers
        .try_claim("b1", Duration::from_secs(60))
        .unwrap()
        .unwrap();

    // Discovered with all roles, then the audio master disappears.
    std::fs::remove_file(bundle.file(SourceRole::AudioMaster).unwrap()).unwrap();
    let state = harness.orchestrator.process_bundle(&bundle, &claim).await;

    match state {
        BundleState::Failed { stage, reason } => {
            assert_eq!(stage, Stage::Validating);
            assert_eq!(
                reason.kind,
                FailureKind::Validation(ValidationErrorKind::MissingFile)
            );
        }
        other => panic!("expected validation failure, got {}", other),
    }

    assert!(markers.is_flagged_for_review("b1"));
    let review = markers.read_review("b1").unwrap().unwrap();
    assert_eq!(review.role, Some(SourceRole::AudioMaster));
    assert!(harness.media.recorded_jobs().await.is_empty());
    assert_eq!(harness.store.object_count().await, 0);
    assert_eq!(harness.registrar.call_count().await, 0);
}

#[tokio::test]
async fn test_flagged_bundle_is_not_re_offered() {
    let harness = TestHarness::new();
    let bundle = harness.add_bundle("b1").await;
    let still = bundle.file(SourceRole::StillImage).unwrap();
    harness
        .media
        .set_probe_result(still, fixtures::video_info(still, 10.0))
        .await;

    let summary = harness.orchestrator.run().await.unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, "format_mismatch");
    assert!(harness.orchestrator.markers().is_flagged_for_review("b1"));

    let summary = harness.orchestrator.run().await.unwrap();
    assert!(summary.failed.is_empty());
    assert!(summary.completed.is_empty());
}

// =============================================================================
// Generation
// =============================================================================

#[tokio::test]
async fn test_generation_failure_stops_before_delivery() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    harness
        .media
        .fail_transcode_matching(
            "video_access",
            MediaToolError::tool_failed("exit status 1", Some("Conversion failed!".to_string())),
        )
        .await;

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].stage, Stage::Generating);
    assert_eq!(summary.failed[0].kind, "tool_invocation_failed");
    assert_eq!(summary.exit_code(), 1);

    // The other three were still attempted.
    assert_eq!(harness.media.recorded_jobs().await.len(), 4);
    assert_eq!(harness.store.object_count().await, 0);
    assert_eq!(harness.registrar.call_count().await, 0);
    assert!(harness.notifier.published().await.is_empty());

    let markers = harness.orchestrator.markers();
    assert!(!markers.is_complete("b1"));
    let failure = markers.read_failure("b1").unwrap().unwrap();
    assert_eq!(failure.stage, "generating");
    assert_eq!(std::fs::read_dir(harness.scratch_root()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_failed_bundle_announces_failure() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    harness
        .media
        .fail_transcode_matching(
            "poster",
            MediaToolError::tool_failed("exit status 1", Some("Invalid data".to_string())),
        )
        .await;

    harness.orchestrator.run().await.unwrap();

    assert!(harness.notifier.published().await.is_empty());
    let failures = harness.notifier.failures().await;
    assert_eq!(failures.len(), 1);
    let failure = &failures[0];
    assert_eq!(failure.bundle_id, "b1");
    assert_eq!(failure.environment, "test");
    assert_eq!(failure.format, Some(BundleFormat::Video));
    assert_eq!(failure.stage, "generating");
    assert_eq!(failure.kind, "tool_invocation_failed");
    assert!(failure.message.contains("poster"));
}

#[tokio::test]
async fn test_unpublished_failure_does_not_change_outcome() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    harness
        .media
        .fail_transcode_matching("poster", MediaToolError::tool_failed("exit status 1", None))
        .await;
    harness
        .notifier
        .fail_always(NotifyError::unreachable("sns unavailable"))
        .await;

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].kind, "tool_invocation_failed");
    assert!(harness.notifier.failures().await.is_empty());
    assert!(!harness.orchestrator.markers().has_pending_notification("b1"));
}

#[tokio::test]
async fn test_failed_bundle_is_retried_on_next_run() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    harness
        .media
        .fail_transcode_matching("poster", MediaToolError::tool_failed("exit status 1", None))
        .await;

    let first = harness.orchestrator.run().await.unwrap();
    assert_eq!(first.failed.len(), 1);

    let second = harness.orchestrator.run().await.unwrap();
    assert_eq!(second.completed, vec!["b1".to_string()]);
    let markers = harness.orchestrator.markers();
    assert!(markers.is_complete("b1"));
    assert!(markers.read_failure("b1").unwrap().is_none());
}

#[tokio::test]
async fn test_manual_policy_holds_failed_bundle() {
    let harness = TestHarness::with_config(|config| {
        config.processor.failure_policy = FailurePolicy::Manual;
    });
    harness.add_bundle("b1").await;
    harness
        .media
        .fail_transcode_matching("poster", MediaToolError::tool_failed("exit status 1", None))
        .await;

    harness.orchestrator.run().await.unwrap();
    let second = harness.orchestrator.run().await.unwrap();

    assert!(second.completed.is_empty());
    assert!(second.failed.is_empty());
    assert_eq!(harness.media.recorded_jobs().await.len(), 4);
}

// =============================================================================
// Delivery
// =============================================================================

#[tokio::test]
async fn test_transient_delivery_failure_retried_three_times() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    harness
        .store
        .fail_next_puts(10, DeliveryError::transient("connection reset"))
        .await;

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].stage, Stage::Delivering);
    assert_eq!(summary.failed[0].kind, "transient_network");
    // Three attempts on the first artifact, nothing after it.
    assert_eq!(harness.store.put_calls().await, 3);
    assert_eq!(harness.registrar.call_count().await, 0);
}

#[tokio::test]
async fn test_access_denied_is_not_retried_and_blocks_registration() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    harness
        .store
        .deny_bucket(
            "mi-video-access",
            DeliveryError::new(DeliveryErrorKind::AccessDenied, "AccessDenied"),
        )
        .await;

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].stage, Stage::Delivering);
    assert_eq!(summary.failed[0].kind, "access_denied");
    // Poster and audio access once each, video access once, nothing after.
    assert_eq!(harness.store.put_calls().await, 3);
    assert_eq!(harness.delivered_keys(ArtifactClass::Poster).await, vec!["b1.png"]);
    assert!(harness
        .delivered_keys(ArtifactClass::VideoMezzanine)
        .await
        .is_empty());
    assert_eq!(harness.registrar.call_count().await, 0);
    assert!(!harness.orchestrator.markers().is_complete("b1"));
}

// =============================================================================
// Registration
// =============================================================================

#[tokio::test]
async fn test_unreachable_registrar_is_retried() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    harness
        .registrar
        .fail_next(2, RegistrationError::unreachable("connection refused"))
        .await;

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.completed, vec!["b1".to_string()]);
    assert_eq!(harness.registrar.call_count().await, 3);
}

#[tokio::test]
async fn test_missing_archival_record_fails_bundle() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    harness
        .registrar
        .fail_next(
            1,
            RegistrationError::new(RegistrationErrorKind::RecordNotFound, "no archival object b1"),
        )
        .await;

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].stage, Stage::Registering);
    assert_eq!(summary.failed[0].kind, "record_not_found");
    assert_eq!(harness.registrar.call_count().await, 1);
    assert!(harness.notifier.published().await.is_empty());

    // Delivered objects stay in place.
    assert_eq!(harness.store.object_count().await, 5);
    assert!(!harness.orchestrator.markers().is_complete("b1"));
}

#[tokio::test]
async fn test_undescribable_bundle_is_not_packaged() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    harness
        .registrar
        .fail_next_describe(
            1,
            RegistrationError::new(RegistrationErrorKind::RecordNotFound, "no archival object b1"),
        )
        .await;

    let summary = harness.orchestrator.run().await.unwrap();

    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].stage, Stage::Delivering);
    assert_eq!(summary.failed[0].kind, "record_not_found");
    assert!(harness.delivered_keys(ArtifactClass::Package).await.is_empty());
    assert_eq!(harness.registrar.call_count().await, 0);
    assert_eq!(harness.notifier.failures().await[0].stage, "delivering");
}

// =============================================================================
// Notification
// =============================================================================

#[tokio::test]
async fn test_unpublished_notification_is_kept_and_replayed() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    harness
        .notifier
        .fail_always(NotifyError::unreachable("sns unavailable"))
        .await;

    let summary = harness.orchestrator.run().await.unwrap();

    // Still complete: the bundle is not reprocessed because of the notification.
    assert_eq!(summary.completed, vec!["b1".to_string()]);
    assert_eq!(summary.notifications_pending, vec!["b1".to_string()]);
    assert_eq!(summary.exit_code(), 0);
    assert_eq!(harness.notifier.attempts().await, 3);

    let markers = harness.orchestrator.markers();
    assert!(markers.is_complete("b1"));
    assert!(markers.has_pending_notification("b1"));

    let second = harness.orchestrator.run().await.unwrap();
    assert!(second.completed.is_empty());
    assert_eq!(harness.registrar.call_count().await, 1);

    harness.notifier.recover().await;
    let replay = harness
        .orchestrator
        .replay_pending_notifications()
        .await
        .unwrap();

    assert_eq!(replay.published, vec!["b1".to_string()]);
    assert_eq!(replay.exit_code(), 0);
    assert!(!markers.has_pending_notification("b1"));

    let events = harness.notifier.published().await;
    assert_eq!(events.len(), 1);
    let record = markers.read_completion("b1").unwrap().unwrap();
    assert_eq!(events[0].event_id, record.event_id);
}

#[tokio::test]
async fn test_replay_failure_keeps_event_pending() {
    let harness = TestHarness::new();
    harness.add_bundle("b1").await;
    harness
        .notifier
        .fail_always(NotifyError::rejected("topic does not exist"))
        .await;

    harness.orchestrator.run().await.unwrap();
    let replay = harness
        .orchestrator
        .replay_pending_notifications()
        .await
        .unwrap();

    assert_eq!(replay.failed, vec!["b1".to_string()]);
    assert_eq!(replay.exit_code(), 1);
    assert!(harness.orchestrator.markers().has_pending_notification("b1"));
}

#[tokio::test]
async fn test_replay_with_nothing_pending() {
    let harness = TestHarness::new();

    let replay = harness
        .orchestrator
        .replay_pending_notifications()
        .await
        .unwrap();

    assert!(replay.published.is_empty());
    assert!(replay.failed.is_empty());
    assert_eq!(harness.notifier.attempts().await, 0);
}
