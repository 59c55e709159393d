#![deny(unreachable_patterns)]
//! FFmpeg CLI wrapper for incident clipping.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Timeouts and kill-on-drop supervision of the child process
//! - Frame-accurate clip extraction as a lazy progress stream
//! - Concat-demuxer joins driven by a scoped manifest
//! - Frame-rate reduction ahead of detection

pub mod command;
pub mod concat;
pub mod error;
pub mod extract;
pub mod framerate;
pub mod fs_utils;
pub mod progress;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner, DEFAULT_FFMPEG_BINARY};
pub use concat::{ClipConcatenator, ConcatManifest, ConcatMode};
pub use error::{MediaError, MediaResult};
pub use extract::{clip_paths, ClipExtractor, ExtractionProgress};
pub use framerate::reduce_frame_rate;
pub use fs_utils::{ensure_dir, remove_path_best_effort, PartialOutputGuard, Removal};
pub use progress::FfmpegProgress;
