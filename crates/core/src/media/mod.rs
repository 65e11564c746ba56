//! Media tool boundary.
//!
//! The packaging pipeline never decodes media itself. Everything that needs to
//! look inside a file (probing container and stream types) or produce a new
//! one (transcoding, frame extraction) goes through the [`MediaTool`] trait.
//! [`FfmpegTool`] is the production implementation; tests use
//! `testing::MockMediaTool`.
//!
//! # Example
//!
//! ```ignore
//! use avpackager_core::media::{FfmpegTool, MediaTool, MediaToolConfig};
//!
//! let tool = FfmpegTool::new(MediaToolConfig::default());
//! tool.validate().await?;
//!
//! let info = tool.probe(Path::new("/mnt/av/source/b9086/b9086_ma.mov")).await?;
//! assert!(info.has_video());
//! ```

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::MediaToolConfig;
pub use error::MediaToolError;
pub use ffmpeg::FfmpegTool;
pub use traits::MediaTool;
pub use types::{
    AudioFormat, AudioParams, ContainerFormat, MediaInfo, OutputParams, StillParams, StreamInfo,
    StreamKind, TranscodeJob, TranscodeResult, VideoCodec, VideoParams,
};
