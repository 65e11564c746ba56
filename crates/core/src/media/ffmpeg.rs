//! FFmpeg-based media tool implementation.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::time::{timeout, Duration};
use tracing::debug;

use super::config::MediaToolConfig;
use super::error::MediaToolError;
use super::traits::MediaTool;
use super::types::{
    AudioParams, MediaInfo, OutputParams, StillParams, StreamInfo, StreamKind, TranscodeJob,
    TranscodeResult, VideoParams,
};

/// How often transcode progress is written to the debug log.
const PROGRESS_LOG_INTERVAL: Duration = Duration::from_secs(30);

/// FFmpeg/FFprobe-backed media tool.
pub struct FfmpegTool {
    config: MediaToolConfig,
}

impl FfmpegTool {
    /// Creates a new FFmpeg tool with the given configuration.
    pub fn new(config: MediaToolConfig) -> Self {
        Self { config }
    }

    /// Creates a tool with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(MediaToolConfig::default())
    }

    /// Arguments shared by every invocation, placed right after the inputs.
    fn common_output_args(&self) -> Vec<String> {
        vec![
            // Strip encoder version tags so identical inputs give identical bytes.
            "-fflags".to_string(),
            "+bitexact".to_string(),
            "-flags:v".to_string(),
            "+bitexact".to_string(),
            "-flags:a".to_string(),
            "+bitexact".to_string(),
            "-map_metadata".to_string(),
            "-1".to_string(),
            "-loglevel".to_string(),
            self.config.ffmpeg_log_level.clone(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ]
    }

    /// Builds ffmpeg arguments for extracting one still picture.
    fn build_still_args(&self, input_path: &Path, output_path: &Path, params: &StillParams) -> Vec<String> {
        let mut args = vec!["-y".to_string()];

        // Input seeking is frame-accurate for decoded output and much faster.
        if let Some(seek) = params.seek_secs {
            args.extend(["-ss".to_string(), format!("{:.3}", seek)]);
        }

        args.extend([
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-frames:v".to_string(),
            "1".to_string(),
            "-an".to_string(),
            "-vf".to_string(),
            scale_filter(Some(params.max_width), Some(params.max_height)),
            "-c:v".to_string(),
            "png".to_string(),
        ]);

        args.extend(self.common_output_args());
        args.push(output_path.to_string_lossy().to_string());
        args
    }

    /// Builds ffmpeg arguments for an audio-only output.
    fn build_audio_args(&self, input_path: &Path, output_path: &Path, params: &AudioParams) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-vn".to_string(),
            "-map".to_string(),
            "0:a:0".to_string(),
        ];
        push_audio_args(&mut args, params);
        args.extend(self.common_output_args());
        args.push(output_path.to_string_lossy().to_string());
        args
    }

    /// Builds ffmpeg arguments for a video output.
    fn build_video_args(&self, input_path: &Path, output_path: &Path, params: &VideoParams) -> Vec<String> {
        let mut args = vec![
            "-y".to_string(),
            "-i".to_string(),
            input_path.to_string_lossy().to_string(),
            "-map".to_string(),
            "0:v:0".to_string(),
        ];

        if params.audio.is_some() {
            // Trailing '?' keeps silent masters from failing the map.
            args.extend(["-map".to_string(), "0:a:0?".to_string()]);
        }

        args.extend([
            "-c:v".to_string(),
            params.codec.ffmpeg_codec().to_string(),
        ]);
        args.extend(params.codec.encoder_args().iter().map(|a| a.to_string()));

        if let Some(bitrate) = params.bitrate_kbps {
            args.extend([
                "-b:v".to_string(),
                format!("{}k", bitrate),
                "-maxrate".to_string(),
                format!("{}k", bitrate),
                "-bufsize".to_string(),
                format!("{}k", bitrate * 2),
            ]);
        }

        if params.max_width.is_some() || params.max_height.is_some() {
            args.extend([
                "-vf".to_string(),
                scale_filter(params.max_width, params.max_height),
            ]);
        }

        if let Some(ref pix_fmt) = params.pixel_format {
            args.extend(["-pix_fmt".to_string(), pix_fmt.clone()]);
        }

        match params.audio {
            Some(ref audio) => push_audio_args(&mut args, audio),
            None => args.push("-an".to_string()),
        }

        if params.faststart {
            args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        }

        args.extend(self.common_output_args());
        args.push(output_path.to_string_lossy().to_string());
        args
    }

    /// Builds the full argument list for a job.
    fn build_args(&self, job: &TranscodeJob) -> Vec<String> {
        match &job.params {
            OutputParams::Still(still) => self.build_still_args(&job.input_path, &job.output_path, still),
            OutputParams::Audio(audio) => self.build_audio_args(&job.input_path, &job.output_path, audio),
            OutputParams::Video(video) => self.build_video_args(&job.input_path, &job.output_path, video),
        }
    }

    /// Parses ffprobe JSON output into MediaInfo.
    fn parse_probe_output(path: &Path, output: &str) -> Result<MediaInfo, MediaToolError> {
        #[derive(Deserialize)]
        struct ProbeOutput {
            format: Option<ProbeFormat>,
            #[serde(default)]
            streams: Vec<ProbeStream>,
        }

        #[derive(Deserialize)]
        struct ProbeFormat {
            format_name: String,
            duration: Option<String>,
            size: Option<String>,
        }

        #[derive(Deserialize, Default)]
        struct ProbeDisposition {
            #[serde(default)]
            attached_pic: u8,
        }

        #[derive(Deserialize)]
        struct ProbeStream {
            codec_type: String,
            #[serde(default)]
            disposition: ProbeDisposition,
            codec_name: Option<String>,
            sample_rate: Option<String>,
            channels: Option<u8>,
            width: Option<u32>,
            height: Option<u32>,
            r_frame_rate: Option<String>,
        }

        let probe: ProbeOutput =
            serde_json::from_str(output).map_err(|e| MediaToolError::ParseError {
                reason: format!("Failed to parse ffprobe output: {}", e),
            })?;

        // ffprobe prints an empty object for files it cannot demux
        let format = probe
            .format
            .ok_or_else(|| MediaToolError::probe_failed("no container format detected"))?;

        let duration_secs = format
            .duration
            .as_ref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0);

        let size_bytes = format
            .size
            .as_ref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let audio_stream = probe.streams.iter().find(|s| s.codec_type == "audio");
        let video_stream = probe
            .streams
            .iter()
            .find(|s| s.codec_type == "video" && s.disposition.attached_pic != 1);

        let format_name = format.format_name.split(',').next().unwrap_or("unknown");

        Ok(MediaInfo {
            path: path.to_path_buf(),
            size_bytes,
            duration_secs,
            format: format_name.to_string(),
            streams: probe
                .streams
                .iter()
                .map(|s| StreamInfo {
                    kind: StreamKind::from_codec_type(&s.codec_type),
                    codec: s.codec_name.clone(),
                    attached_pic: s.disposition.attached_pic == 1,
                })
                .collect(),
            video_width: video_stream.and_then(|s| s.width),
            video_height: video_stream.and_then(|s| s.height),
            video_fps: video_stream
                .and_then(|s| s.r_frame_rate.as_ref())
                .and_then(|r| parse_frame_rate(r)),
            audio_sample_rate: audio_stream
                .and_then(|s| s.sample_rate.as_ref())
                .and_then(|r| r.parse::<u32>().ok()),
            audio_channels: audio_stream.and_then(|s| s.channels),
        })
    }

    /// Keeps the last `limit` bytes of diagnostic output.
    fn truncate_diagnostic(&self, mut diagnostic: String) -> Option<String> {
        let limit = self.config.diagnostic_limit_bytes;
        if diagnostic.trim().is_empty() {
            return None;
        }
        if diagnostic.len() > limit {
            let mut cut = diagnostic.len() - limit;
            while !diagnostic.is_char_boundary(cut) {
                cut += 1;
            }
            diagnostic = diagnostic.split_off(cut);
        }
        Some(diagnostic)
    }

    /// Runs ffmpeg for one job.
    async fn run_transcode(&self, job: &TranscodeJob) -> Result<TranscodeResult, MediaToolError> {
        let start = Instant::now();

        if !job.input_path.exists() {
            return Err(MediaToolError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        if let Some(parent) = job.output_path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|_| {
                MediaToolError::OutputDirectoryFailed {
                    path: parent.to_path_buf(),
                }
            })?;
        }

        let args = self.build_args(job);
        debug!("ffmpeg {} args: {:?}", job.job_id, args);

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaToolError::FfmpegNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    MediaToolError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| std::io::Error::other("ffmpeg stderr was not captured"))?;
        let mut reader = BufReader::new(stderr).lines();

        let progress_regex = Regex::new(r"^[a-z_0-9]+=\S*$").ok();
        let time_regex = Regex::new(r"^out_time_ms=(\d+)").ok();

        let timeout_duration = Duration::from_secs(self.config.timeout_secs);
        let result = timeout(timeout_duration, async {
            let mut diagnostic = String::new();
            let mut last_progress_log = Instant::now();

            while let Ok(Some(line)) = reader.next_line().await {
                let is_progress = progress_regex
                    .as_ref()
                    .map(|re| re.is_match(&line))
                    .unwrap_or(false);

                if !is_progress {
                    diagnostic.push_str(&line);
                    diagnostic.push('\n');
                    continue;
                }

                if last_progress_log.elapsed() >= PROGRESS_LOG_INTERVAL {
                    if let Some(caps) = time_regex.as_ref().and_then(|re| re.captures(&line)) {
                        if let Some(us) = caps.get(1).and_then(|m| m.as_str().parse::<f64>().ok()) {
                            debug!("ffmpeg {} at {:.1}s of output", job.job_id, us / 1_000_000.0);
                            last_progress_log = Instant::now();
                        }
                    }
                }
            }

            let status = child.wait().await?;
            Ok::<(std::process::ExitStatus, String), std::io::Error>((status, diagnostic))
        })
        .await;

        match result {
            Ok(Ok((status, diagnostic))) => {
                if !status.success() {
                    return Err(MediaToolError::tool_failed(
                        format!("FFmpeg exited with code: {:?}", status.code()),
                        self.truncate_diagnostic(diagnostic),
                    ));
                }
            }
            Ok(Err(e)) => return Err(MediaToolError::Io(e)),
            Err(_) => {
                let _ = child.kill().await;
                return Err(MediaToolError::Timeout {
                    timeout_secs: self.config.timeout_secs,
                });
            }
        }

        let output_meta = tokio::fs::metadata(&job.output_path).await.map_err(|_| {
            MediaToolError::tool_failed("FFmpeg reported success but wrote no output file", None)
        })?;

        Ok(TranscodeResult {
            job_id: job.job_id.clone(),
            output_path: job.output_path.clone(),
            output_size_bytes: output_meta.len(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

/// Scale filter that only ever shrinks, keeping the aspect ratio and even dimensions.
fn scale_filter(max_width: Option<u32>, max_height: Option<u32>) -> String {
    let width = max_width.unwrap_or(u32::MAX);
    let height = max_height.unwrap_or(u32::MAX);
    format!(
        "scale='min({},iw)':'min({},ih)':force_original_aspect_ratio=decrease:force_divisible_by=2",
        width, height
    )
}

fn push_audio_args(args: &mut Vec<String>, params: &AudioParams) {
    args.extend(["-c:a".to_string(), params.format.ffmpeg_codec().to_string()]);

    if !params.format.is_lossless() {
        if let Some(bitrate) = params.bitrate_kbps {
            args.extend(["-b:a".to_string(), format!("{}k", bitrate)]);
        }
    }

    if let Some(rate) = params.sample_rate_hz {
        args.extend(["-ar".to_string(), rate.to_string()]);
    }

    if let Some(channels) = params.channels {
        args.extend(["-ac".to_string(), channels.to_string()]);
    }
}

/// Parses a frame rate like "30000/1001" or "25".
fn parse_frame_rate(rate: &str) -> Option<f32> {
    match rate.split_once('/') {
        Some((num, den)) => {
            let num = num.parse::<f32>().ok()?;
            let den = den.parse::<f32>().ok()?;
            if den > 0.0 {
                Some(num / den)
            } else {
                None
            }
        }
        None => rate.parse::<f32>().ok(),
    }
}

#[async_trait]
impl MediaTool for FfmpegTool {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn probe(&self, path: &Path) -> Result<MediaInfo, MediaToolError> {
        if !path.exists() {
            return Err(MediaToolError::InputNotFound {
                path: path.to_path_buf(),
            });
        }

        let probe = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .kill_on_drop(true)
            .output();

        let output = timeout(Duration::from_secs(self.config.probe_timeout_secs), probe)
            .await
            .map_err(|_| MediaToolError::Timeout {
                timeout_secs: self.config.probe_timeout_secs,
            })?
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    MediaToolError::FfprobeNotFound {
                        path: self.config.ffprobe_path.clone(),
                    }
                } else {
                    MediaToolError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(MediaToolError::probe_failed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Self::parse_probe_output(path, &stdout)
    }

    async fn transcode(&self, job: TranscodeJob) -> Result<TranscodeResult, MediaToolError> {
        self.run_transcode(&job).await
    }

    async fn validate(&self) -> Result<(), MediaToolError> {
        for (path, not_found) in [
            (
                &self.config.ffmpeg_path,
                MediaToolError::FfmpegNotFound {
                    path: self.config.ffmpeg_path.clone(),
                },
            ),
            (
                &self.config.ffprobe_path,
                MediaToolError::FfprobeNotFound {
                    path: self.config.ffprobe_path.clone(),
                },
            ),
        ] {
            match Command::new(path).arg("-version").output().await {
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(not_found),
                Err(e) => return Err(MediaToolError::Io(e)),
            }
        }

        Ok(())
    }
}
