//! Error types for media operations.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg binary not found: {0}")]
    FfmpegNotFound(PathBuf),

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("Extraction of clip {sequence_index} failed: {source}")]
    ClipFailed {
        sequence_index: usize,
        #[source]
        source: Box<MediaError>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Attach the 1-based clip index to an extraction failure.
    pub fn clip_failed(sequence_index: usize, source: MediaError) -> Self {
        Self::ClipFailed {
            sequence_index,
            source: Box::new(source),
        }
    }

    /// Create an invalid input error.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// True when the external tool itself failed (spawn, exit status, timeout).
    pub fn is_tool_failure(&self) -> bool {
        match self {
            MediaError::FfmpegNotFound(_)
            | MediaError::FfmpegFailed { .. }
            | MediaError::Timeout(_) => true,
            MediaError::ClipFailed { source, .. } => source.is_tool_failure(),
            _ => false,
        }
    }

    /// Missing input file, unwrapping clip context.
    pub fn missing_path(&self) -> Option<&PathBuf> {
        match self {
            MediaError::FileNotFound(path) => Some(path),
            MediaError::ClipFailed { source, .. } => source.missing_path(),
            _ => None,
        }
    }

    /// Index of the failing clip, if the error came from extraction.
    pub fn clip_index(&self) -> Option<usize> {
        match self {
            MediaError::ClipFailed { sequence_index, .. } => Some(*sequence_index),
            _ => None,
        }
    }
}
