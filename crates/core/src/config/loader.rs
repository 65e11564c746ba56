use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use std::path::Path;

use super::{types::Config, ConfigError};

const ENV_PREFIX: &str = "AVPACKAGER_";

fn env_provider() -> Env {
    Env::prefixed(ENV_PREFIX).split("__")
}

/// Load configuration from file with environment variable overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.display().to_string()));
    }

    let config: Config = Figment::new()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))?;

    Ok(config)
}

/// Load configuration from environment variables alone
///
/// Nested keys use a double underscore: `AVPACKAGER_STORAGE__SOURCE_ROOT`.
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    Figment::new()
        .merge(env_provider())
        .extract()
        .map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Load configuration from TOML string (useful for testing)
pub fn load_config_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    toml::from_str(toml_str).map_err(|e| ConfigError::ParseError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::NamedTempFile;

    const CONFIG: &str = r#"
environment = "staging"

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
password = "secret"

[notifier]
topic_arn = "arn:aws:sns:us-east-1:123456789012:packaging"
"#;

    #[test]
    fn test_load_config_from_str_valid() {
        let config = load_config_from_str(CONFIG).unwrap();
        assert_eq!(config.environment, "staging");
        assert_eq!(config.destinations.video_mezzanine, "video-mezzanine");
    }

    #[test]
    fn test_load_config_from_str_missing_storage() {
        let result = load_config_from_str("environment = \"x\"\n");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "{}", CONFIG).unwrap();

        let config = load_config(temp_file.path()).unwrap();
        assert_eq!(config.storage.source_root, PathBuf::from("/mnt/source"));
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("avpackager.toml", CONFIG)?;
            jail.set_env("AVPACKAGER_ENVIRONMENT", "prod");
            jail.set_env("AVPACKAGER_PROCESSOR__MAX_CONCURRENT_BUNDLES", "3");
            jail.set_env("AVPACKAGER_ARCHIVESSPACE__USERNAME", "robot");

            let config =
                load_config(Path::new("avpackager.toml")).map_err(|e| e.to_string())?;
            assert_eq!(config.environment, "prod");
            assert_eq!(config.processor.max_concurrent_bundles, 3);
            assert_eq!(config.archivesspace.username, "robot");
            assert_eq!(config.destinations.poster, "posters");
            Ok(())
        });
    }

    #[test]
    fn test_load_config_from_env_only() {
        Jail::expect_with(|jail| {
            for (key, value) in [
                ("ENVIRONMENT", "prod"),
                ("STORAGE__SOURCE_ROOT", "/mnt/source"),
                ("STORAGE__SCRATCH_ROOT", "/tmp/scratch"),
                ("DESTINATIONS__POSTER", "posters"),
                ("DESTINATIONS__AUDIO_ACCESS", "audio-access"),
                ("DESTINATIONS__VIDEO_ACCESS", "video-access"),
                ("DESTINATIONS__VIDEO_MEZZANINE", "video-mezzanine"),
                ("DESTINATIONS__PACKAGE", "packages"),
                ("ARCHIVESSPACE__BASE_URL", "http://aspace:8089"),
                ("ARCHIVESSPACE__USERNAME", "packager"),
                ("ARCHIVESSPACE__PASSWORD", "secret"),
                ("NOTIFIER__TOPIC_ARN", "arn:aws:sns:us-east-1:1:t"),
            ] {
                jail.set_env(format!("{}{}", ENV_PREFIX, key), value);
            }

            let config = load_config_from_env().map_err(|e| e.to_string())?;
            assert_eq!(config.storage.scratch_root, PathBuf::from("/tmp/scratch"));
            assert_eq!(config.notifier.topic_arn, "arn:aws:sns:us-east-1:1:t");
            assert_eq!(config.archivesspace.timeout_secs, 30);
            Ok(())
        });
    }

    #[test]
    fn test_numeric_env_values_load_as_strings() {
        Jail::expect_with(|jail| {
            for (key, value) in [
                ("ENVIRONMENT", "2024"),
                ("STORAGE__SOURCE_ROOT", "/mnt/source"),
                ("STORAGE__SCRATCH_ROOT", "/tmp/scratch"),
                ("DESTINATIONS__POSTER", "posters"),
                ("DESTINATIONS__AUDIO_ACCESS", "audio-access"),
                ("DESTINATIONS__VIDEO_ACCESS", "video-access"),
                ("DESTINATIONS__VIDEO_MEZZANINE", "video-mezzanine"),
                ("DESTINATIONS__PACKAGE", "packages"),
                ("ARCHIVESSPACE__BASE_URL", "http://aspace:8089"),
                ("ARCHIVESSPACE__REPOSITORY", "2"),
                ("ARCHIVESSPACE__USERNAME", "packager"),
                ("ARCHIVESSPACE__PASSWORD", "123456"),
                ("NOTIFIER__TOPIC_ARN", "arn:aws:sns:us-east-1:1:t"),
                ("PACKAGING__RIGHTS_IDS", "12,13"),
            ] {
                jail.set_env(format!("{}{}", ENV_PREFIX, key), value);
            }

            let config = load_config_from_env().map_err(|e| e.to_string())?;
            assert_eq!(config.environment, "2024");
            assert_eq!(config.archivesspace.repository, "2");
            assert_eq!(config.archivesspace.password, "123456");
            assert_eq!(config.packaging.rights_ids, vec!["12", "13"]);
            Ok(())
        });
    }
}
