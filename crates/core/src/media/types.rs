//! Types for the media tool boundary.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Codecs ffprobe reports for single-image inputs.
const IMAGE_CODECS: &[&str] = &["png", "mjpeg", "tiff", "bmp", "webp", "jpeg2000"];

/// Kind of an elementary stream inside a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Other,
}

impl StreamKind {
    /// Maps an ffprobe `codec_type` string.
    pub fn from_codec_type(codec_type: &str) -> Self {
        match codec_type {
            "video" => Self::Video,
            "audio" => Self::Audio,
            "subtitle" => Self::Subtitle,
            "data" => Self::Data,
            _ => Self::Other,
        }
    }
}

/// One stream reported by a probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub kind: StreamKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// Embedded cover art rather than a real picture track.
    #[serde(default)]
    pub attached_pic: bool,
}

/// Media file information from probing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// File path.
    pub path: PathBuf,
    /// File size in bytes.
    pub size_bytes: u64,
    /// Duration in seconds (0.0 for still images).
    pub duration_secs: f64,
    /// Primary container format name (first entry of ffprobe's list).
    pub format: String,
    /// All streams in the container.
    pub streams: Vec<StreamInfo>,
    /// Video width in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_width: Option<u32>,
    /// Video height in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_height: Option<u32>,
    /// Video frame rate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_fps: Option<f32>,
    /// Audio sample rate in Hz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_sample_rate: Option<u32>,
    /// Number of audio channels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_channels: Option<u8>,
}

impl MediaInfo {
    fn first(&self, kind: StreamKind) -> Option<&StreamInfo> {
        self.streams
            .iter()
            .find(|s| s.kind == kind && !s.attached_pic)
    }

    /// Codec of the first video stream.
    pub fn video_codec(&self) -> Option<&str> {
        self.first(StreamKind::Video).and_then(|s| s.codec.as_deref())
    }

    /// Codec of the first audio stream.
    pub fn audio_codec(&self) -> Option<&str> {
        self.first(StreamKind::Audio).and_then(|s| s.codec.as_deref())
    }

    /// Whether the container holds at least one audio stream.
    pub fn has_audio(&self) -> bool {
        self.first(StreamKind::Audio).is_some()
    }

    /// Whether the container holds moving video (not a single picture).
    pub fn has_video(&self) -> bool {
        self.first(StreamKind::Video).is_some() && !self.is_still_image()
    }

    /// Whether this is a single still picture.
    ///
    /// ffprobe reports images through the `image2` demuxer or one of the
    /// `*_pipe` demuxers, with one video stream of an image codec and no
    /// meaningful duration.
    pub fn is_still_image(&self) -> bool {
        let image_demuxer = self.format == "image2" || self.format.ends_with("_pipe");
        let video_streams: Vec<_> = self
            .streams
            .iter()
            .filter(|s| s.kind == StreamKind::Video && !s.attached_pic)
            .collect();
        let image_codec = video_streams.len() == 1
            && video_streams[0]
                .codec
                .as_deref()
                .map(|c| IMAGE_CODECS.contains(&c))
                .unwrap_or(false);

        image_codec && !self.has_audio() && (image_demuxer || self.duration_secs <= 0.0)
    }
}

/// Audio output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// MPEG Audio Layer III
    Mp3,
    /// Advanced Audio Coding
    Aac,
    /// 16-bit little-endian PCM
    Pcm16,
    /// 24-bit little-endian PCM
    Pcm24,
}

impl AudioFormat {
    /// Returns the ffmpeg codec name for this format.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::Pcm16 => "pcm_s16le",
            Self::Pcm24 => "pcm_s24le",
        }
    }

    /// Whether this format is uncompressed.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Pcm16 | Self::Pcm24)
    }
}

/// Video output codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoCodec {
    /// H.264 / AVC
    H264,
    /// Apple ProRes 422 HQ
    ProResHq,
}

impl VideoCodec {
    /// Returns the ffmpeg encoder name for this codec.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::ProResHq => "prores_ks",
        }
    }

    /// Codec-specific encoder arguments.
    pub fn encoder_args(&self) -> &'static [&'static str] {
        match self {
            Self::H264 => &["-preset", "medium", "-profile:v", "high"],
            // prores_ks profile 3 is 422 HQ
            Self::ProResHq => &["-profile:v", "3", "-vendor", "apl0"],
        }
    }
}

/// Container format for video outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerFormat {
    /// MPEG-4 Part 14 (.mp4)
    Mp4,
    /// QuickTime (.mov)
    Mov,
}

impl ContainerFormat {
    /// Returns the file extension for this container.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
        }
    }
}

/// Parameters for an audio-only output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioParams {
    /// Target audio format.
    pub format: AudioFormat,
    /// Target bitrate in kbps (lossy formats only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    /// Target sample rate in Hz.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate_hz: Option<u32>,
    /// Number of audio channels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u8>,
}

/// Parameters for a video output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoParams {
    /// Target video codec.
    pub codec: VideoCodec,
    /// Target container.
    pub container: ContainerFormat,
    /// Target video bitrate in kbps. `None` leaves rate control to the codec profile.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
    /// Maximum width (height scaled proportionally).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    /// Maximum height (width scaled proportionally).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    /// Output pixel format.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pixel_format: Option<String>,
    /// Move the moov atom to the front for progressive playback.
    #[serde(default)]
    pub faststart: bool,
    /// Audio track parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioParams>,
}

/// Parameters for a single still picture output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StillParams {
    /// Maximum width (height scaled proportionally).
    pub max_width: u32,
    /// Maximum height (width scaled proportionally).
    pub max_height: u32,
    /// Offset into the input to grab the frame from. `None` for image inputs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seek_secs: Option<f64>,
}

/// Output parameters for one transcode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputParams {
    /// Single still picture (PNG).
    Still(StillParams),
    /// Audio-only file.
    Audio(AudioParams),
    /// Video file with optional audio track.
    Video(VideoParams),
}

/// One transcode request.
#[derive(Debug, Clone)]
pub struct TranscodeJob {
    /// Job identifier used in logs.
    pub job_id: String,
    /// Input file.
    pub input_path: PathBuf,
    /// Output file to write.
    pub output_path: PathBuf,
    /// Output parameters.
    pub params: OutputParams,
}

/// Result of a finished transcode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeResult {
    /// Job identifier.
    pub job_id: String,
    /// Output file that was written.
    pub output_path: PathBuf,
    /// Output size in bytes.
    pub output_size_bytes: u64,
    /// Wall time in milliseconds.
    pub duration_ms: u64,
}
