//! Structural and content-type checks for a located bundle.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::error::{ValidateError, ValidationError, ValidationErrorKind};
use crate::locator::{Bundle, SourceRole};
use crate::media::{MediaInfo, MediaTool, MediaToolError};

/// Probed information for every role of a bundle that passed validation.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub bundle_id: String,
    pub probes: BTreeMap<SourceRole, MediaInfo>,
}

impl ValidationReport {
    pub fn probe(&self, role: SourceRole) -> Option<&MediaInfo> {
        self.probes.get(&role)
    }
}

/// Outcome of validating one bundle.
pub type ValidationResult = Result<ValidationReport, ValidateError>;

/// Checks that every expected source file exists, is non-empty, and really
/// holds the kind of media its role says.
pub struct BundleValidator {
    media: Arc<dyn MediaTool>,
    expected_roles: Vec<SourceRole>,
}

impl BundleValidator {
    pub fn new(media: Arc<dyn MediaTool>, expected_roles: Vec<SourceRole>) -> Self {
        Self {
            media,
            expected_roles,
        }
    }

    /// Validates a bundle.
    ///
    /// Cheap filesystem checks run for every role before any probe, so a
    /// missing file is reported without waiting on the media tool.
    pub async fn validate(&self, bundle: &Bundle) -> ValidationResult {
        let mut roles: Vec<SourceRole> = self.expected_roles.clone();
        for role in bundle.files.keys() {
            if !roles.contains(role) {
                roles.push(*role);
            }
        }
        roles.sort();

        for role in &roles {
            check_file(bundle, *role).await?;
        }

        let mut probes = BTreeMap::new();
        for role in roles {
            // check_file guarantees the path is present
            let Some(path) = bundle.file(role) else {
                continue;
            };
            let info = self.probe(role, path).await?;
            check_role(role, path, &info)?;
            debug!(
                "{} {} ok: format={} duration={:.1}s",
                bundle.id, role, info.format, info.duration_secs
            );
            probes.insert(role, info);
        }

        info!("Bundle {} passed validation ({} files)", bundle.id, probes.len());
        Ok(ValidationReport {
            bundle_id: bundle.id.clone(),
            probes,
        })
    }

    async fn probe(&self, role: SourceRole, path: &Path) -> Result<MediaInfo, ValidateError> {
        match self.media.probe(path).await {
            Ok(info) => Ok(info),
            Err(MediaToolError::InputNotFound { path }) => Err(ValidationError::new(
                ValidationErrorKind::MissingFile,
                role,
                Some(path),
                "file disappeared before probing",
            )
            .into()),
            Err(e @ (MediaToolError::ProbeFailed { .. } | MediaToolError::ParseError { .. })) => {
                Err(ValidationError::new(
                    ValidationErrorKind::CorruptContainer,
                    role,
                    Some(path.to_path_buf()),
                    e.to_string(),
                )
                .into())
            }
            Err(e) => Err(ValidateError::ToolUnavailable(e)),
        }
    }
}

async fn check_file(bundle: &Bundle, role: SourceRole) -> Result<(), ValidationError> {
    let Some(path) = bundle.file(role) else {
        return Err(ValidationError::new(
            ValidationErrorKind::MissingFile,
            role,
            None,
            format!("bundle {} has no {} file", bundle.id, role),
        ));
    };

    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        ValidationError::new(
            ValidationErrorKind::MissingFile,
            role,
            Some(path.to_path_buf()),
            e.to_string(),
        )
    })?;

    if !metadata.is_file() {
        return Err(ValidationError::new(
            ValidationErrorKind::MissingFile,
            role,
            Some(path.to_path_buf()),
            "not a regular file",
        ));
    }

    if metadata.len() == 0 {
        return Err(ValidationError::new(
            ValidationErrorKind::EmptyFile,
            role,
            Some(path.to_path_buf()),
            "file has 0 bytes",
        ));
    }

    Ok(())
}

fn check_role(role: SourceRole, path: &Path, info: &MediaInfo) -> Result<(), ValidationError> {
    let mismatch = |detail: String| -> Result<(), ValidationError> {
        Err(ValidationError::new(
            ValidationErrorKind::FormatMismatch,
            role,
            Some(path.to_path_buf()),
            detail,
        ))
    };

    match role {
        SourceRole::VideoMaster if !info.has_video() => {
            mismatch(format!("container '{}' has no video stream", info.format))
        }
        SourceRole::AudioMaster if !info.has_audio() => {
            mismatch(format!("container '{}' has no audio stream", info.format))
        }
        SourceRole::AudioMaster if info.has_video() => {
            mismatch(format!("container '{}' carries video", info.format))
        }
        SourceRole::AudioMaster if info.duration_secs <= 0.0 => {
            mismatch("audio has no duration".to_string())
        }
        SourceRole::StillImage if !info.is_still_image() => {
            mismatch(format!("'{}' is not a single still image", info.format))
        }
        _ => Ok(()),
    }
}
