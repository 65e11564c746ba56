//! Testing utilities and mock implementations.
//!
//! Every external system the orchestrator drives has an in-memory mock here,
//! so a full packaging run can be exercised without ffmpeg, S3,
//! ArchivesSpace or SNS.
//!
//! # Example
//!
//! ```rust,ignore
//! use avpackager_core::testing::{fixtures, MockMediaTool, MockObjectStore};
//!
//! let media = MockMediaTool::new();
//! let bundle = fixtures::bundle_on_disk(&source_root, "b1");
//! fixtures::probe_bundle(&media, &bundle, 600.0).await;
//!
//! let store = MockObjectStore::new();
//! // ... run the orchestrator ...
//! assert_eq!(store.keys("mi-posters").await, vec!["b1.png"]);
//! ```

mod mock_media_tool;
mod mock_notifier;
mod mock_object_store;
mod mock_registrar;

pub use mock_media_tool::MockMediaTool;
pub use mock_notifier::MockNotifier;
pub use mock_object_store::MockObjectStore;
pub use mock_registrar::{MockRegistrar, RecordedRegistration};

/// Test fixtures and helper functions.
pub mod fixtures {
    use std::fs;
    use std::path::{Path, PathBuf};

    use super::MockMediaTool;
    use crate::config::{load_config_from_str, Config};
    use crate::locator::{Bundle, SourceRole};
    use crate::media::{MediaInfo, StreamInfo, StreamKind};
    use crate::retry::RetryConfig;

    fn stream(kind: StreamKind, codec: &str) -> StreamInfo {
        StreamInfo {
            kind,
            codec: Some(codec.to_string()),
            attached_pic: false,
        }
    }

    /// Probe result of a 1080p ProRes master with stereo PCM audio.
    pub fn video_info(path: impl AsRef<Path>, duration_secs: f64) -> MediaInfo {
        MediaInfo {
            path: path.as_ref().to_path_buf(),
            size_bytes: 1024 * 1024 * 1024,
            duration_secs,
            format: "mov".to_string(),
            streams: vec![
                stream(StreamKind::Video, "prores"),
                stream(StreamKind::Audio, "pcm_s24le"),
            ],
            video_width: Some(1920),
            video_height: Some(1080),
            video_fps: Some(29.97),
            audio_sample_rate: Some(48_000),
            audio_channels: Some(2),
        }
    }

    /// Probe result of a 96 kHz stereo WAV master.
    pub fn audio_info(path: impl AsRef<Path>, duration_secs: f64) -> MediaInfo {
        MediaInfo {
            path: path.as_ref().to_path_buf(),
            size_bytes: 200 * 1024 * 1024,
            duration_secs,
            format: "wav".to_string(),
            streams: vec![stream(StreamKind::Audio, "pcm_s24le")],
            video_width: None,
            video_height: None,
            video_fps: None,
            audio_sample_rate: Some(96_000),
            audio_channels: Some(2),
        }
    }

    /// Probe result of a TIFF scan.
    pub fn still_info(path: impl AsRef<Path>) -> MediaInfo {
        MediaInfo {
            path: path.as_ref().to_path_buf(),
            size_bytes: 5 * 1024 * 1024,
            duration_secs: 0.0,
            format: "image2".to_string(),
            streams: vec![stream(StreamKind::Video, "tiff")],
            video_width: Some(3000),
            video_height: Some(2000),
            video_fps: None,
            audio_sample_rate: None,
            audio_channels: None,
        }
    }

    /// Creates `<source_root>/<id>/` with one small file per role.
    ///
    /// Panics on I/O errors; test use only.
    pub fn bundle_on_disk(source_root: &Path, id: &str) -> Bundle {
        let root = source_root.join(id);
        fs::create_dir_all(&root).unwrap();

        let mut bundle = Bundle::new(id, &root);
        for (role, ext, content) in [
            (SourceRole::VideoMaster, "mov", &b"video master"[..]),
            (SourceRole::AudioMaster, "wav", &b"audio master"[..]),
            (SourceRole::StillImage, "tif", &b"still"[..]),
        ] {
            let path = root.join(format!("{}{}.{}", id, role.suffix(), ext));
            fs::write(&path, content).unwrap();
            bundle = bundle.with_file(role, path);
        }
        bundle
    }

    /// Registers well-formed probe results for every role file of `bundle`.
    pub async fn probe_bundle(media: &MockMediaTool, bundle: &Bundle, duration_secs: f64) {
        for (role, path) in &bundle.files {
            let info = match role {
                SourceRole::VideoMaster => video_info(path, duration_secs),
                SourceRole::AudioMaster => audio_info(path, duration_secs),
                SourceRole::StillImage => still_info(path),
            };
            media.set_probe_result(path, info).await;
        }
    }

    /// Configuration rooted at `root` with `source/` and `scratch/` below it
    /// and immediate retries of three attempts everywhere.
    pub fn config(root: &Path) -> Config {
        let source_root: PathBuf = root.join("source");
        let scratch_root: PathBuf = root.join("scratch");
        fs::create_dir_all(&source_root).unwrap();
        fs::create_dir_all(&scratch_root).unwrap();

        let mut config = load_config_from_str(&format!(
            r#"
environment = "test"

[storage]
source_root = '{}'
scratch_root = '{}'

[destinations]
poster = "mi-posters"
audio_access = "mi-audio-access"
video_access = "mi-video-access"
video_mezzanine = "mi-video-mezzanine"
package = "mi-packages"

[archivesspace]
base_url = "http://aspace.test:8089"
username = "packager"
password = "secret"

[notifier]
topic_arn = "arn:aws:sns:us-east-1:123456789012:av-packaging"
"#,
            source_root.display(),
            scratch_root.display()
        ))
        .unwrap();

        config.delivery.retry = RetryConfig::immediate(3);
        config.archivesspace.retry = RetryConfig::immediate(3);
        config.notifier.retry = RetryConfig::immediate(3);
        config
    }
}
