use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::delivery::DeliveryConfig;
use crate::derivative::ArtifactClass;
use crate::locator::LocatorConfig;
use crate::media::MediaToolConfig;
use crate::notifier::NotifierConfig;
use crate::package::PackagingConfig;
use crate::processor::ProcessorConfig;
use crate::registrar::ArchivesSpaceConfig;
use crate::retry::RetryConfig;

/// Root configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Deployment environment tag, carried in every completion event.
    #[serde(deserialize_with = "super::string_or_number::deserialize")]
    pub environment: String,
    pub storage: StorageConfig,
    pub destinations: DestinationsConfig,
    #[serde(default)]
    pub aws: AwsConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
    pub archivesspace: ArchivesSpaceConfig,
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub media: MediaToolConfig,
    #[serde(default)]
    pub locator: LocatorConfig,
    #[serde(default)]
    pub processor: ProcessorConfig,
    #[serde(default)]
    pub packaging: PackagingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Source and scratch storage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per bundle.
    pub source_root: PathBuf,
    /// Directory for per-bundle work areas.
    pub scratch_root: PathBuf,
    /// Marker directory (default: `<source_root>/.avpackager`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub marker_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn marker_dir(&self) -> PathBuf {
        self.marker_dir
            .clone()
            .unwrap_or_else(|| self.source_root.join(".avpackager"))
    }
}

/// Destination bucket per artifact class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationsConfig {
    pub poster: String,
    pub audio_access: String,
    pub video_access: String,
    pub video_mezzanine: String,
    /// General destination, receives the archival package.
    pub package: String,
}

impl DestinationsConfig {
    pub fn for_class(&self, class: ArtifactClass) -> &str {
        match class {
            ArtifactClass::Poster => &self.poster,
            ArtifactClass::AudioAccess => &self.audio_access,
            ArtifactClass::VideoAccess => &self.video_access,
            ArtifactClass::VideoMezzanine => &self.video_mezzanine,
            ArtifactClass::Package => &self.package,
        }
    }
}

/// Shared AWS client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwsConfig {
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint (MinIO, LocalStack).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint_url: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

impl Default for AwsConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Write the metrics registry here at the end of a run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub textfile_path: Option<PathBuf>,
}

/// Sanitized config for display (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub environment: String,
    pub storage: SanitizedStorageConfig,
    pub destinations: DestinationsConfig,
    pub aws: AwsConfig,
    pub delivery: DeliveryConfig,
    pub archivesspace: SanitizedArchivesSpaceConfig,
    pub notifier: NotifierConfig,
    pub media: MediaToolConfig,
    pub locator: LocatorConfig,
    pub processor: ProcessorConfig,
    pub packaging: PackagingConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedStorageConfig {
    pub source_root: PathBuf,
    pub scratch_root: PathBuf,
    pub marker_dir: PathBuf,
}

/// ArchivesSpace config with the password hidden
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedArchivesSpaceConfig {
    pub base_url: String,
    pub repository: String,
    pub username: String,
    pub password_configured: bool,
    pub timeout_secs: u64,
    pub retry: RetryConfig,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        let aspace = &config.archivesspace;
        Self {
            environment: config.environment.clone(),
            storage: SanitizedStorageConfig {
                source_root: config.storage.source_root.clone(),
                scratch_root: config.storage.scratch_root.clone(),
                marker_dir: config.storage.marker_dir(),
            },
            destinations: config.destinations.clone(),
            aws: config.aws.clone(),
            delivery: config.delivery.clone(),
            archivesspace: SanitizedArchivesSpaceConfig {
                base_url: aspace.base_url.clone(),
                repository: aspace.repository.clone(),
                username: aspace.username.clone(),
                password_configured: !aspace.password.is_empty(),
                timeout_secs: aspace.timeout_secs,
                retry: aspace.retry.clone(),
            },
            notifier: config.notifier.clone(),
            media: config.media.clone(),
            locator: config.locator.clone(),
            processor: config.processor.clone(),
            packaging: config.packaging.clone(),
            metrics: config.metrics.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::FailurePolicy;

    const MINIMAL: &str = r#"
environment = "test"

[storage]
source_root = "/mnt/source"
scratch_root = "/tmp/scratch"

[destinations]
poster = "posters"
audio_access = "audio-access"
video_access = "video-access"
video_mezzanine = "video-mezzanine"
package = "packages"

[archivesspace]
base_url = "http://aspace:8089"
username = "packager"
password = "hunter2"

[notifier]
topic_arn = "arn:aws:sns:us-east-1:123456789012:packaging"
"#;

    #[test]
    fn test_deserialize_minimal_config_applies_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.environment, "test");
        assert_eq!(config.archivesspace.repository, "2");
        assert_eq!(config.aws.region, "us-east-1");
        assert_eq!(config.processor.max_concurrent_bundles, 1);
        assert_eq!(config.processor.failure_policy, FailurePolicy::Immediate);
        assert!(config.packaging.enabled);
        assert_eq!(config.delivery.retry.max_attempts, 3);
        assert!(config.metrics.textfile_path.is_none());
        assert_eq!(
            config.storage.marker_dir(),
            PathBuf::from("/mnt/source/.avpackager")
        );
    }

    #[test]
    fn test_deserialize_missing_destinations_fails() {
        let toml = MINIMAL.replace("[destinations]", "[unused]");
        assert!(toml::from_str::<Config>(&toml).is_err());
    }

    #[test]
    fn test_failure_policy_from_toml() {
        let toml = format!(
            "{}\n[processor]\nmax_concurrent_bundles = 2\nfailure_policy = {{ mode = \"cooldown\", cooldown_secs = 600 }}\n",
            MINIMAL
        );
        let config: Config = toml::from_str(&toml).unwrap();
        assert_eq!(config.processor.max_concurrent_bundles, 2);
        assert_eq!(
            config.processor.failure_policy,
            FailurePolicy::Cooldown { cooldown_secs: 600 }
        );
    }

    #[test]
    fn test_destination_for_class() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.destinations.for_class(ArtifactClass::Poster), "posters");
        assert_eq!(config.destinations.for_class(ArtifactClass::Package), "packages");
    }

    #[test]
    fn test_sanitized_config_hides_password() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.archivesspace.password_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("hunter2"));
        assert!(json.contains("/mnt/source/.avpackager"));
    }
}
