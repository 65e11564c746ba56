//! Durable per-bundle state kept as small files next to the source tree.
//!
//! Every run is a fresh process, so "already processed", "in flight" and
//! "needs a human" live here rather than in memory:
//!
//! | file | meaning |
//! |---|---|
//! | `<id>.complete` | bundle fully processed, never re-offered |
//! | `<id>.claim` | a worker owns the bundle right now |
//! | `<id>.failed` | last non-validation failure |
//! | `<id>.review` | validation failed, waiting for a human |
//! | `<id>.notify-pending.json` | completion event not yet accepted by the bus |
//!
//! Records are written to a temporary name and renamed into place so a crash
//! never leaves a half-written marker. Claims are created with `create_new`,
//! which the filesystem guarantees to succeed for exactly one caller.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::types::SourceRole;
use crate::notifier::CompletionEvent;

const COMPLETE_EXT: &str = "complete";
const CLAIM_EXT: &str = "claim";
const FAILED_EXT: &str = "failed";
const REVIEW_EXT: &str = "review";
const PENDING_EXT: &str = "notify-pending.json";

/// Errors from reading or writing markers.
#[derive(Debug, Error)]
pub enum MarkerError {
    #[error("Marker I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Marker {path} is unreadable: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Failed to serialize marker: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl MarkerError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Contents of a completion marker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub bundle_id: String,
    pub event_id: Uuid,
    pub metadata_record: String,
    pub completed_at: DateTime<Utc>,
}

/// Contents of a failure record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub bundle_id: String,
    pub stage: String,
    pub kind: String,
    pub detail: String,
    pub failed_at: DateTime<Utc>,
}

/// Contents of a review flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord {
    pub bundle_id: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<SourceRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub detail: String,
    pub flagged_at: DateTime<Utc>,
}

/// Contents of a claim file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ClaimRecord {
    token: Uuid,
    pid: u32,
    claimed_at: DateTime<Utc>,
}

/// State of a bundle's claim file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    Unclaimed,
    Live,
    Stale,
}

/// Exclusive ownership of one bundle for the duration of a processing attempt.
///
/// Dropping the claim removes the claim file, provided it still carries this
/// claim's token.
#[derive(Debug)]
pub struct BundleClaim {
    bundle_id: String,
    path: PathBuf,
    token: Uuid,
}

impl BundleClaim {
    pub fn bundle_id(&self) -> &str {
        &self.bundle_id
    }

    pub fn token(&self) -> Uuid {
        self.token
    }

    /// Bumps the claim's modification time so long stages do not look abandoned.
    pub fn refresh(&self) {
        let result = OpenOptions::new()
            .write(true)
            .open(&self.path)
            .and_then(|f| f.set_modified(SystemTime::now()));
        if let Err(e) = result {
            warn!("Failed to refresh claim {}: {}", self.path.display(), e);
        }
    }

    fn still_ours(&self) -> bool {
        fs::read(&self.path)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<ClaimRecord>(&bytes).ok())
            .map(|record| record.token == self.token)
            .unwrap_or(false)
    }
}

impl Drop for BundleClaim {
    fn drop(&mut self) {
        if self.still_ours() {
            if let Err(e) = fs::remove_file(&self.path) {
                warn!("Failed to release claim {}: {}", self.path.display(), e);
            } else {
                debug!("Released claim for {}", self.bundle_id);
            }
        }
    }
}

/// Marker files for all bundles under one directory.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    dir: PathBuf,
}

impl MarkerStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the marker directory if needed.
    pub fn ensure_dir(&self) -> Result<(), MarkerError> {
        fs::create_dir_all(&self.dir).map_err(|e| MarkerError::io(&self.dir, e))
    }

    fn path(&self, bundle_id: &str, ext: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", bundle_id, ext))
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), MarkerError> {
        let bytes = serde_json::to_vec_pretty(value)?;
        let tmp = path.with_extension(format!("tmp-{}", Uuid::new_v4()));

        let result = (|| {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(MarkerError::io(path, e));
        }
        Ok(())
    }

    fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>, MarkerError> {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MarkerError::io(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| MarkerError::Corrupt {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    fn remove(&self, path: &Path) -> Result<(), MarkerError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MarkerError::io(path, e)),
        }
    }

    // Completion

    pub fn is_complete(&self, bundle_id: &str) -> bool {
        self.path(bundle_id, COMPLETE_EXT).exists()
    }

    pub fn mark_complete(&self, record: &CompletionRecord) -> Result<(), MarkerError> {
        self.write_json(&self.path(&record.bundle_id, COMPLETE_EXT), record)
    }

    pub fn read_completion(&self, bundle_id: &str) -> Result<Option<CompletionRecord>, MarkerError> {
        self.read_json(&self.path(bundle_id, COMPLETE_EXT))
    }

    // Failure and review

    pub fn record_failure(&self, record: &FailureRecord) -> Result<(), MarkerError> {
        self.write_json(&self.path(&record.bundle_id, FAILED_EXT), record)
    }

    pub fn read_failure(&self, bundle_id: &str) -> Result<Option<FailureRecord>, MarkerError> {
        self.read_json(&self.path(bundle_id, FAILED_EXT))
    }

    pub fn clear_failure(&self, bundle_id: &str) -> Result<(), MarkerError> {
        self.remove(&self.path(bundle_id, FAILED_EXT))
    }

    pub fn flag_review(&self, record: &ReviewRecord) -> Result<(), MarkerError> {
        self.write_json(&self.path(&record.bundle_id, REVIEW_EXT), record)
    }

    pub fn is_flagged_for_review(&self, bundle_id: &str) -> bool {
        self.path(bundle_id, REVIEW_EXT).exists()
    }

    pub fn read_review(&self, bundle_id: &str) -> Result<Option<ReviewRecord>, MarkerError> {
        self.read_json(&self.path(bundle_id, REVIEW_EXT))
    }

    // Pending notifications

    pub fn write_pending_notification(&self, event: &CompletionEvent) -> Result<(), MarkerError> {
        self.write_json(&self.path(&event.bundle_id, PENDING_EXT), event)
    }

    pub fn remove_pending_notification(&self, bundle_id: &str) -> Result<(), MarkerError> {
        self.remove(&self.path(bundle_id, PENDING_EXT))
    }

    pub fn has_pending_notification(&self, bundle_id: &str) -> bool {
        self.path(bundle_id, PENDING_EXT).exists()
    }

    /// All recorded pending notifications, oldest first.
    pub fn pending_notifications(&self) -> Result<Vec<CompletionEvent>, MarkerError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MarkerError::io(&self.dir, e)),
        };

        let suffix = format!(".{}", PENDING_EXT);
        let mut events = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MarkerError::io(&self.dir, e))?;
            let is_pending = entry
                .file_name()
                .to_str()
                .map(|name| name.ends_with(&suffix))
                .unwrap_or(false);
            if !is_pending {
                continue;
            }
            if let Some(event) = self.read_json::<CompletionEvent>(&entry.path())? {
                events.push(event);
            }
        }

        events.sort_by_key(|e| e.completed_at);
        Ok(events)
    }

    // Claims

    /// Inspects the claim file for `bundle_id`.
    pub fn claim_state(&self, bundle_id: &str, ttl: Duration) -> ClaimState {
        claim_state_at(&self.path(bundle_id, CLAIM_EXT), ttl)
    }

    /// Tries to take exclusive ownership of a bundle.
    ///
    /// Returns `Ok(None)` when another worker holds a live claim or won a race
    /// for a stale one.
    pub fn try_claim(&self, bundle_id: &str, ttl: Duration) -> Result<Option<BundleClaim>, MarkerError> {
        let path = self.path(bundle_id, CLAIM_EXT);

        if let Some(claim) = self.create_claim(bundle_id, &path)? {
            return Ok(Some(claim));
        }

        if claim_state_at(&path, ttl) != ClaimState::Stale {
            return Ok(None);
        }

        // Only one contender can rename the stale claim away.
        let tombstone = path.with_extension(format!("claim-stale-{}", Uuid::new_v4()));
        match fs::rename(&path, &tombstone) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(MarkerError::io(&path, e)),
        }

        // Between the staleness check and the rename another worker may have
        // taken over. Put a live claim back where it was.
        if claim_state_at(&tombstone, ttl) == ClaimState::Live {
            let _ = fs::hard_link(&tombstone, &path);
            let _ = fs::remove_file(&tombstone);
            return Ok(None);
        }

        warn!("Taking over stale claim for {}", bundle_id);
        let _ = fs::remove_file(&tombstone);
        self.create_claim(bundle_id, &path)
    }

    fn create_claim(&self, bundle_id: &str, path: &Path) -> Result<Option<BundleClaim>, MarkerError> {
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => return Err(MarkerError::io(path, e)),
        };

        let record = ClaimRecord {
            token: Uuid::new_v4(),
            pid: std::process::id(),
            claimed_at: Utc::now(),
        };
        let bytes = serde_json::to_vec(&record)?;
        if let Err(e) = file.write_all(&bytes).and_then(|_| file.sync_all()) {
            let _ = fs::remove_file(path);
            return Err(MarkerError::io(path, e));
        }

        debug!("Claimed bundle {}", bundle_id);
        Ok(Some(BundleClaim {
            bundle_id: bundle_id.to_string(),
            path: path.to_path_buf(),
            token: record.token,
        }))
    }
}

fn claim_state_at(path: &Path, ttl: Duration) -> ClaimState {
    let modified = match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(e) if e.kind() == ErrorKind::NotFound => return ClaimState::Unclaimed,
        // Unreadable claims are treated as held.
        Err(_) => return ClaimState::Live,
    };

    let age = SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO);
    if age >= ttl {
        ClaimState::Stale
    } else {
        ClaimState::Live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    const TTL: Duration = Duration::from_secs(3600);

    fn store() -> (TempDir, MarkerStore) {
        let dir = TempDir::new().unwrap();
        let store = MarkerStore::new(dir.path().join("markers"));
        store.ensure_dir().unwrap();
        (dir, store)
    }

    fn event(bundle_id: &str) -> CompletionEvent {
        CompletionEvent {
            event_id: Uuid::new_v4(),
            bundle_id: bundle_id.to_string(),
            environment: "test".to_string(),
            format: crate::locator::BundleFormat::Video,
            derivatives: BTreeMap::new(),
            package: None,
            metadata_record: "/repositories/2/digital_objects/1".to_string(),
            spec_version: 1,
            completed_at: Utc::now(),
        }
    }

    #[test]
    fn test_completion_marker_roundtrip() {
        let (_dir, store) = store();
        assert!(!store.is_complete("b1"));

        let record = CompletionRecord {
            bundle_id: "b1".to_string(),
            event_id: Uuid::new_v4(),
            metadata_record: "/repositories/2/digital_objects/1".to_string(),
            completed_at: Utc::now(),
        };
        store.mark_complete(&record).unwrap();

        assert!(store.is_complete("b1"));
        assert_eq!(store.read_completion("b1").unwrap(), Some(record));
    }

    #[test]
    fn test_claim_is_exclusive() {
        let (_dir, store) = store();

        let first = store.try_claim("b1", TTL).unwrap();
        assert!(first.is_some());
        assert!(store.try_claim("b1", TTL).unwrap().is_none());
        assert_eq!(store.claim_state("b1", TTL), ClaimState::Live);

        drop(first);
        assert_eq!(store.claim_state("b1", TTL), ClaimState::Unclaimed);
        assert!(store.try_claim("b1", TTL).unwrap().is_some());
    }

    #[test]
    fn test_stale_claim_is_taken_over() {
        let (_dir, store) = store();

        let abandoned = store.try_claim("b1", TTL).unwrap().unwrap();
        // Leak the claim as a crashed process would.
        std::mem::forget(abandoned);

        assert!(store.try_claim("b1", TTL).unwrap().is_none());

        let claim = store.try_claim("b1", Duration::ZERO).unwrap();
        assert!(claim.is_some());
    }

    #[test]
    fn test_dropping_superseded_claim_keeps_new_owner() {
        let (_dir, store) = store();

        let old = store.try_claim("b1", TTL).unwrap().unwrap();
        let new = store.try_claim("b1", Duration::ZERO).unwrap().unwrap();
        assert_ne!(old.token(), new.token());

        drop(old);
        assert_eq!(store.claim_state("b1", TTL), ClaimState::Live);
        drop(new);
        assert_eq!(store.claim_state("b1", TTL), ClaimState::Unclaimed);
    }

    #[test]
    fn test_failure_record_and_clear() {
        let (_dir, store) = store();
        let record = FailureRecord {
            bundle_id: "b1".to_string(),
            stage: "delivering".to_string(),
            kind: "access_denied".to_string(),
            detail: "bucket policy".to_string(),
            failed_at: Utc::now(),
        };

        store.record_failure(&record).unwrap();
        assert_eq!(store.read_failure("b1").unwrap(), Some(record));

        store.clear_failure("b1").unwrap();
        assert!(store.read_failure("b1").unwrap().is_none());
        // Clearing twice is fine.
        store.clear_failure("b1").unwrap();
    }

    #[test]
    fn test_review_flag() {
        let (_dir, store) = store();
        store
            .flag_review(&ReviewRecord {
                bundle_id: "b1".to_string(),
                kind: "empty_file".to_string(),
                role: Some(SourceRole::AudioMaster),
                path: Some("/src/b1/b1_ma.wav".into()),
                detail: "0 bytes".to_string(),
                flagged_at: Utc::now(),
            })
            .unwrap();

        assert!(store.is_flagged_for_review("b1"));
        assert_eq!(
            store.read_review("b1").unwrap().unwrap().role,
            Some(SourceRole::AudioMaster)
        );
    }

    #[test]
    fn test_pending_notifications() {
        let (_dir, store) = store();
        assert!(store.pending_notifications().unwrap().is_empty());

        store.write_pending_notification(&event("b1")).unwrap();
        store.write_pending_notification(&event("b2")).unwrap();
        assert!(store.has_pending_notification("b1"));

        let pending = store.pending_notifications().unwrap();
        assert_eq!(pending.len(), 2);

        store.remove_pending_notification("b1").unwrap();
        let pending = store.pending_notifications().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].bundle_id, "b2");
    }

    #[test]
    fn test_corrupt_marker_is_reported() {
        let (_dir, store) = store();
        fs::write(store.dir().join("b1.failed"), b"not json").unwrap();
        assert!(matches!(
            store.read_failure("b1"),
            Err(MarkerError::Corrupt { .. })
        ));
    }
}
