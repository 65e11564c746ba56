use serde::{Deserialize, Serialize};

use crate::checksum::ChecksumAlgorithm;

/// Archival package settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagingConfig {
    /// Build and deliver the package (default: true).
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Written to bag-info.txt as one `Rights-ID` line each. Also accepts a
    /// comma-separated string.
    #[serde(
        default,
        deserialize_with = "crate::config::string_or_number::deserialize_list"
    )]
    pub rights_ids: Vec<String>,
    /// Payload manifest algorithms (default: sha256, md5).
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<ChecksumAlgorithm>,
}

fn default_enabled() -> bool {
    true
}

fn default_algorithms() -> Vec<ChecksumAlgorithm> {
    vec![ChecksumAlgorithm::Sha256, ChecksumAlgorithm::Md5]
}

impl Default for PackagingConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            rights_ids: Vec::new(),
            algorithms: default_algorithms(),
        }
    }
}

impl PackagingConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}
