//! Source tree scanning.

use chrono::Utc;
use std::fs::{self, ReadDir};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use super::config::{FailurePolicy, LocatorConfig};
use super::markers::{BundleClaim, ClaimState, MarkerError, MarkerStore};
use super::types::{is_valid_bundle_id, Bundle, MalformedBundle, MalformedReason, SourceRole};

/// Errors that stop a scan from starting.
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("Source root {path} is not readable: {source}")]
    SourceRootUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Finds bundles that are complete and not yet processed.
#[derive(Debug, Clone)]
pub struct AssetLocator {
    source_root: PathBuf,
    markers: Arc<MarkerStore>,
    config: LocatorConfig,
    failure_policy: FailurePolicy,
}

impl AssetLocator {
    pub fn new(
        source_root: impl Into<PathBuf>,
        markers: Arc<MarkerStore>,
        config: LocatorConfig,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            source_root: source_root.into(),
            markers,
            config,
            failure_policy,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    pub fn markers(&self) -> &Arc<MarkerStore> {
        &self.markers
    }

    /// Starts a fresh scan of the source root.
    ///
    /// The returned iterator reads the directory lazily. Every call re-scans;
    /// nothing is cached between calls.
    pub fn locate(&self) -> Result<BundleScan<'_>, LocatorError> {
        let entries =
            fs::read_dir(&self.source_root).map_err(|e| LocatorError::SourceRootUnreadable {
                path: self.source_root.clone(),
                source: e,
            })?;

        Ok(BundleScan {
            locator: self,
            entries,
            malformed: Vec::new(),
        })
    }

    /// Takes exclusive ownership of a located bundle.
    ///
    /// Returns `Ok(None)` if another worker got there first or the bundle was
    /// completed since it was located.
    pub fn claim(&self, bundle: &Bundle) -> Result<Option<BundleClaim>, MarkerError> {
        let claim = match self.markers.try_claim(&bundle.id, self.config.claim_ttl())? {
            Some(claim) => claim,
            None => return Ok(None),
        };

        // A worker may have finished and released between our scan and claim.
        if self.markers.is_complete(&bundle.id) {
            return Ok(None);
        }

        Ok(Some(claim))
    }

    /// Whether the marker state allows offering `bundle_id` now.
    fn is_eligible(&self, bundle_id: &str) -> bool {
        if self.markers.is_complete(bundle_id) {
            debug!("Skipping {}: already complete", bundle_id);
            return false;
        }

        if self.markers.is_flagged_for_review(bundle_id) {
            debug!("Skipping {}: flagged for review", bundle_id);
            return false;
        }

        if self.markers.claim_state(bundle_id, self.config.claim_ttl()) == ClaimState::Live {
            debug!("Skipping {}: claimed by another worker", bundle_id);
            return false;
        }

        match self.failure_policy {
            FailurePolicy::Immediate => true,
            FailurePolicy::Manual => {
                let failed = self.markers.read_failure(bundle_id);
                match failed {
                    Ok(None) => true,
                    Ok(Some(_)) => {
                        debug!("Skipping {}: failed, waiting for manual re-trigger", bundle_id);
                        false
                    }
                    Err(e) => {
                        warn!("Skipping {}: {}", bundle_id, e);
                        false
                    }
                }
            }
            FailurePolicy::Cooldown { cooldown_secs } => match self.markers.read_failure(bundle_id) {
                Ok(None) => true,
                Ok(Some(record)) => {
                    let age = Utc::now().signed_duration_since(record.failed_at);
                    let cooldown = i64::try_from(cooldown_secs).unwrap_or(i64::MAX);
                    let ready = age.num_seconds() >= cooldown;
                    if !ready {
                        debug!("Skipping {}: failure cooldown not elapsed", bundle_id);
                    }
                    ready
                }
                Err(e) => {
                    warn!("Skipping {}: {}", bundle_id, e);
                    false
                }
            },
        }
    }

    /// Groups the files of one bundle directory into roles.
    fn read_bundle(&self, id: &str, dir: &Path) -> Result<Bundle, MalformedReason> {
        let entries = fs::read_dir(dir).map_err(|e| MalformedReason::Unreadable {
            detail: e.to_string(),
        })?;

        let mut bundle = Bundle::new(id, dir);
        for entry in entries {
            let entry = entry.map_err(|e| MalformedReason::Unreadable {
                detail: e.to_string(),
            })?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let name = entry.file_name();
            let role = name.to_str().and_then(|n| SourceRole::classify(id, n));
            match role {
                Some(role) if bundle.has_role(role) => {
                    return Err(MalformedReason::DuplicateRole { role });
                }
                Some(role) => {
                    bundle.files.insert(role, path);
                }
                None => bundle.extra_files.push(path),
            }
        }

        bundle.extra_files.sort();
        Ok(bundle)
    }
}

/// A single pass over the source root.
///
/// Yields eligible bundles; malformed directories are collected and can be
/// read with [`BundleScan::malformed`] once iteration is done.
pub struct BundleScan<'a> {
    locator: &'a AssetLocator,
    entries: ReadDir,
    malformed: Vec<MalformedBundle>,
}

impl BundleScan<'_> {
    /// Directories skipped so far.
    pub fn malformed(&self) -> &[MalformedBundle] {
        &self.malformed
    }

    pub fn into_malformed(self) -> Vec<MalformedBundle> {
        self.malformed
    }

    fn skip(&mut self, path: PathBuf, reason: MalformedReason) {
        warn!("Skipping malformed bundle {}: {}", path.display(), reason);
        self.malformed.push(MalformedBundle { path, reason });
    }
}

impl Iterator for BundleScan<'_> {
    type Item = Bundle;

    fn next(&mut self) -> Option<Bundle> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    let root = self.locator.source_root.clone();
                    self.skip(
                        root,
                        MalformedReason::Unreadable {
                            detail: e.to_string(),
                        },
                    );
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_dir() || path == self.locator.markers.dir() {
                continue;
            }

            let name = entry.file_name();
            let name = match name.to_str() {
                Some(name) if name.starts_with('.') => continue,
                Some(name) if is_valid_bundle_id(name) => name.to_string(),
                _ => {
                    self.skip(path, MalformedReason::InvalidName);
                    continue;
                }
            };

            let bundle = match self.locator.read_bundle(&name, &path) {
                Ok(bundle) => bundle,
                Err(reason) => {
                    self.skip(path, reason);
                    continue;
                }
            };

            let missing = bundle.missing_roles(&self.locator.config.expected_roles);
            if !missing.is_empty() {
                debug!("Skipping {}: missing roles {:?}", name, missing);
                continue;
            }

            if !self.locator.is_eligible(&name) {
                continue;
            }

            return Some(bundle);
        }
    }
}
