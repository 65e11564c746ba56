//! Fixed derivative specifications.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::locator::{Bundle, BundleFormat, SourceRole};
use crate::media::{
    AudioFormat, AudioParams, ContainerFormat, OutputParams, StillParams, VideoCodec, VideoParams,
};

/// Version of the derivative parameter set. Bump whenever any parameter below
/// changes so downstream consumers can tell generations apart.
pub const SPEC_VERSION: u32 = 1;

/// Longest offset into a video the poster frame is taken from.
const POSTER_MAX_SEEK_SECS: f64 = 10.0;

/// Class of a delivered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactClass {
    Poster,
    AudioAccess,
    VideoAccess,
    VideoMezzanine,
    /// Compressed archival package of the source files.
    Package,
}

impl ArtifactClass {
    /// The four derivative classes, in delivery order.
    pub const DERIVATIVES: [ArtifactClass; 4] = [
        Self::Poster,
        Self::AudioAccess,
        Self::VideoAccess,
        Self::VideoMezzanine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Poster => "poster",
            Self::AudioAccess => "audio_access",
            Self::VideoAccess => "video_access",
            Self::VideoMezzanine => "video_mezzanine",
            Self::Package => "package",
        }
    }

    /// Extension of the remote object.
    pub fn remote_extension(&self) -> &'static str {
        match self {
            Self::Poster => "png",
            Self::AudioAccess => "mp3",
            Self::VideoAccess => "mp4",
            Self::VideoMezzanine => "mov",
            Self::Package => "tar.gz",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Poster => "image/png",
            Self::AudioAccess => "audio/mpeg",
            Self::VideoAccess => "video/mp4",
            Self::VideoMezzanine => "video/quicktime",
            Self::Package => "application/gzip",
        }
    }

    /// Deterministic object key for a bundle's artifact of this class.
    ///
    /// Each class goes to its own destination, so the bundle id alone keeps
    /// keys unique.
    pub fn remote_key(&self, bundle_id: &str) -> String {
        format!("{}.{}", bundle_id, self.remote_extension())
    }
}

impl fmt::Display for ArtifactClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static description of one derivative to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivativeSpec {
    pub class: ArtifactClass,
    /// Parameter set version.
    pub version: u32,
    /// Source roles to derive from, most preferred first.
    pub sources: &'static [SourceRole],
    /// Output parameters. Poster seek offsets are filled in per source.
    pub params: OutputParams,
}

impl DerivativeSpec {
    /// The four fixed derivative specs.
    pub fn standard() -> Vec<DerivativeSpec> {
        ArtifactClass::DERIVATIVES
            .iter()
            .filter_map(|class| Self::for_class(*class))
            .collect()
    }

    /// The specs a bundle must produce, in delivery order.
    ///
    /// A video bundle gets all four. An audio bundle gets the audio access
    /// copy, plus a poster when it carries a still image. A bundle with no
    /// master gets none.
    pub fn for_bundle(bundle: &Bundle) -> Vec<DerivativeSpec> {
        match bundle.format() {
            Some(BundleFormat::Video) => Self::standard(),
            Some(BundleFormat::Audio) => {
                let mut classes = Vec::with_capacity(2);
                if bundle.has_role(SourceRole::StillImage) {
                    classes.push(ArtifactClass::Poster);
                }
                classes.push(ArtifactClass::AudioAccess);
                classes.into_iter().filter_map(Self::for_class).collect()
            }
            None => Vec::new(),
        }
    }

    /// The fixed spec for a derivative class. `None` for [`ArtifactClass::Package`].
    pub fn for_class(class: ArtifactClass) -> Option<DerivativeSpec> {
        let (sources, params): (&'static [SourceRole], OutputParams) = match class {
            ArtifactClass::Poster => (
                &[SourceRole::StillImage, SourceRole::VideoMaster],
                OutputParams::Still(StillParams {
                    max_width: 1280,
                    max_height: 720,
                    seek_secs: None,
                }),
            ),
            ArtifactClass::AudioAccess => (
                &[SourceRole::AudioMaster, SourceRole::VideoMaster],
                OutputParams::Audio(AudioParams {
                    format: AudioFormat::Mp3,
                    bitrate_kbps: Some(320),
                    sample_rate_hz: Some(44_100),
                    channels: Some(2),
                }),
            ),
            ArtifactClass::VideoAccess => (
                &[SourceRole::VideoMaster],
                OutputParams::Video(VideoParams {
                    codec: VideoCodec::H264,
                    container: ContainerFormat::Mp4,
                    bitrate_kbps: Some(2500),
                    max_width: Some(1280),
                    max_height: Some(720),
                    pixel_format: Some("yuv420p".to_string()),
                    faststart: true,
                    audio: Some(AudioParams {
                        format: AudioFormat::Aac,
                        bitrate_kbps: Some(192),
                        sample_rate_hz: Some(48_000),
                        channels: Some(2),
                    }),
                }),
            ),
            ArtifactClass::VideoMezzanine => (
                &[SourceRole::VideoMaster],
                OutputParams::Video(VideoParams {
                    codec: VideoCodec::ProResHq,
                    container: ContainerFormat::Mov,
                    bitrate_kbps: None,
                    max_width: None,
                    max_height: None,
                    pixel_format: Some("yuv422p10le".to_string()),
                    faststart: false,
                    audio: Some(AudioParams {
                        format: AudioFormat::Pcm24,
                        bitrate_kbps: None,
                        sample_rate_hz: Some(48_000),
                        channels: None,
                    }),
                }),
            ),
            ArtifactClass::Package => return None,
        };

        Some(DerivativeSpec {
            class,
            version: SPEC_VERSION,
            sources,
            params,
        })
    }

    /// Name of the file written in the work area.
    pub fn local_file_name(&self, bundle_id: &str) -> String {
        match self.class {
            ArtifactClass::Poster => "poster.png".to_string(),
            ArtifactClass::AudioAccess => format!("{}_a.mp3", bundle_id),
            ArtifactClass::VideoAccess => format!("{}_a.mp4", bundle_id),
            ArtifactClass::VideoMezzanine => format!("{}_me.mov", bundle_id),
            ArtifactClass::Package => format!("{}.tar.gz", bundle_id),
        }
    }

    /// Output parameters for a given source.
    ///
    /// A poster taken from a video grabs the frame at
    /// `min(10 s, duration / 2)`; from an image it takes the only frame.
    pub fn params_for(&self, source_role: SourceRole, source_duration_secs: f64) -> OutputParams {
        match (&self.params, source_role) {
            (OutputParams::Still(still), SourceRole::VideoMaster) => {
                let seek = POSTER_MAX_SEEK_SECS.min(source_duration_secs.max(0.0) / 2.0);
                OutputParams::Still(StillParams {
                    seek_secs: Some(seek),
                    ..still.clone()
                })
            }
            (params, _) => params.clone(),
        }
    }
}

/// A produced artifact, ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivativeArtifact {
    pub bundle_id: String,
    pub class: ArtifactClass,
    pub local_path: PathBuf,
    pub remote_key: String,
    pub content_type: String,
    pub size_bytes: u64,
    /// SHA-256, hex encoded.
    pub sha256: String,
}
