//! Configuration for the media tool.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the FFmpeg-based media tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaToolConfig {
    /// Path to ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Path to ffprobe binary.
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,

    /// Timeout for a single transcode in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Timeout for a single probe in seconds.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[serde(default = "default_log_level")]
    pub ffmpeg_log_level: String,

    /// Maximum number of stderr bytes kept as diagnostic output.
    #[serde(default = "default_diagnostic_limit")]
    pub diagnostic_limit_bytes: usize,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_timeout() -> u64 {
    4 * 3600 // mezzanine encodes of long tapes are slow
}

fn default_probe_timeout() -> u64 {
    60
}

fn default_log_level() -> String {
    "error".to_string()
}

fn default_diagnostic_limit() -> usize {
    16 * 1024
}

impl Default for MediaToolConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_timeout(),
            probe_timeout_secs: default_probe_timeout(),
            ffmpeg_log_level: default_log_level(),
            diagnostic_limit_bytes: default_diagnostic_limit(),
        }
    }
}

impl MediaToolConfig {
    /// Creates a new config with custom ffmpeg/ffprobe paths.
    pub fn with_paths(ffmpeg_path: PathBuf, ffprobe_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ffprobe_path,
            ..Default::default()
        }
    }

    /// Sets the transcode timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}
