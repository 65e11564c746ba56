//! Types for the locator module.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Role a source file plays inside a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    /// Preservation master of a video transfer.
    VideoMaster,
    /// Preservation master of an audio transfer.
    AudioMaster,
    /// Designated still image (label, box scan, ...).
    StillImage,
}

impl SourceRole {
    /// All roles, in processing order.
    pub const ALL: [SourceRole; 3] = [Self::VideoMaster, Self::AudioMaster, Self::StillImage];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VideoMaster => "video_master",
            Self::AudioMaster => "audio_master",
            Self::StillImage => "still_image",
        }
    }

    /// File name suffix placed between the bundle id and the extension.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::VideoMaster | Self::AudioMaster => "_ma",
            Self::StillImage => "_still",
        }
    }

    /// Accepted extensions, lowercase.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Self::VideoMaster => &["mov", "mkv", "mp4", "avi", "dv"],
            Self::AudioMaster => &["wav", "flac", "bwf", "aif", "aiff"],
            Self::StillImage => &["tif", "tiff", "jpg", "jpeg", "png"],
        }
    }

    /// Determines which role, if any, a file name plays in bundle `bundle_id`.
    pub fn classify(bundle_id: &str, file_name: &str) -> Option<SourceRole> {
        let (stem, ext) = file_name.rsplit_once('.')?;
        let suffix = stem.strip_prefix(bundle_id)?;
        let ext = ext.to_ascii_lowercase();

        Self::ALL
            .into_iter()
            .find(|role| role.suffix() == suffix && role.extensions().contains(&ext.as_str()))
    }
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of transfer a bundle holds, decided by its master file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleFormat {
    Audio,
    Video,
}

impl BundleFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for BundleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One digitized AV item: a directory of source files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bundle {
    /// Bundle identifier. Also the archival reference identifier.
    pub id: String,
    /// Bundle directory.
    pub root: PathBuf,
    /// Discovered file per role.
    pub files: BTreeMap<SourceRole, PathBuf>,
    /// Files in the bundle directory that play no role.
    #[serde(default)]
    pub extra_files: Vec<PathBuf>,
}

impl Bundle {
    /// Creates an empty bundle rooted at `root`.
    pub fn new(id: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            root: root.into(),
            files: BTreeMap::new(),
            extra_files: Vec::new(),
        }
    }

    /// Adds a role file. Builder style, mostly for tests.
    pub fn with_file(mut self, role: SourceRole, path: impl Into<PathBuf>) -> Self {
        self.files.insert(role, path.into());
        self
    }

    pub fn file(&self, role: SourceRole) -> Option<&Path> {
        self.files.get(&role).map(PathBuf::as_path)
    }

    pub fn has_role(&self, role: SourceRole) -> bool {
        self.files.contains_key(&role)
    }

    /// Video when a video master is present, else audio when an audio
    /// master is. `None` for a bundle with neither.
    pub fn format(&self) -> Option<BundleFormat> {
        if self.has_role(SourceRole::VideoMaster) {
            Some(BundleFormat::Video)
        } else if self.has_role(SourceRole::AudioMaster) {
            Some(BundleFormat::Audio)
        } else {
            None
        }
    }

    /// Roles from `expected` that have no file.
    pub fn missing_roles(&self, expected: &[SourceRole]) -> Vec<SourceRole> {
        expected
            .iter()
            .copied()
            .filter(|role| !self.has_role(*role))
            .collect()
    }

    /// Every source file, role files first, sorted within each group.
    pub fn source_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = self.files.values().cloned().collect();
        let mut extra = self.extra_files.clone();
        extra.sort();
        files.extend(extra);
        files
    }
}

/// Why a bundle directory was skipped as malformed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum MalformedReason {
    /// Directory name is not a usable identifier.
    InvalidName,
    /// Two or more files claim the same role.
    DuplicateRole { role: SourceRole },
    /// The directory could not be listed.
    Unreadable { detail: String },
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidName => write!(f, "invalid bundle name"),
            Self::DuplicateRole { role } => write!(f, "more than one {} file", role),
            Self::Unreadable { detail } => write!(f, "unreadable: {}", detail),
        }
    }
}

/// A bundle directory skipped during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MalformedBundle {
    pub path: PathBuf,
    pub reason: MalformedReason,
}

/// Returns true when `name` is usable as a bundle identifier.
pub fn is_valid_bundle_id(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
