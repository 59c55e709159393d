//! Pipeline error types.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use kclip_media::MediaError;
use kclip_models::{ModelError, PipelineStage};

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Coarse failure classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A required upstream file or directory is absent
    MissingArtifact,
    /// The detection log or incident document failed validation
    MalformedInput,
    /// FFmpeg or the detector failed, could not start, or timed out
    ExternalToolError,
    /// A clustering, merge, or config value is outside its domain
    InvalidParameter,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::MissingArtifact => "missing_artifact",
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::ExternalToolError => "external_tool_error",
            ErrorKind::InvalidParameter => "invalid_parameter",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("Missing artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("FFmpeg failed for {subject}: {source}")]
    ExternalTool {
        subject: String,
        #[source]
        source: MediaError,
    },

    #[error("Detector {program} failed: {message}")]
    DetectorFailed { program: String, message: String },

    #[error("Invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn missing(path: impl Into<PathBuf>) -> Self {
        Self::MissingArtifact { path: path.into() }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn detector_failed(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DetectorFailed {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Tag the error with the stage it happened in. Already-tagged errors keep their stage.
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        match self {
            PipelineError::Stage { .. } => self,
            other => PipelineError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage the error was raised in, if known.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Stage { source, .. } => source.kind(),
            PipelineError::MissingArtifact { .. } => ErrorKind::MissingArtifact,
            PipelineError::MalformedInput(_) => ErrorKind::MalformedInput,
            PipelineError::ExternalTool { .. } | PipelineError::DetectorFailed { .. } => {
                ErrorKind::ExternalToolError
            }
            PipelineError::InvalidParameter { .. } => ErrorKind::InvalidParameter,
            PipelineError::Io(_) | PipelineError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 1-based interval whose extraction failed.
    pub fn interval_index(&self) -> Option<usize> {
        match self {
            PipelineError::Stage { source, .. } => source.interval_index(),
            PipelineError::ExternalTool { source, .. } => source.clip_index(),
            _ => None,
        }
    }
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::MalformedDetection { .. } => PipelineError::MalformedInput(err.to_string()),
            ModelError::InvalidParameter { name, reason } => {
                PipelineError::InvalidParameter { name, reason }
            }
            ModelError::InvalidInterval { .. } => {
                PipelineError::invalid_parameter("interval", err.to_string())
            }
            ModelError::UnknownProfile(profile) => {
                PipelineError::invalid_parameter("profile", format!("unknown profile '{}'", profile))
            }
        }
    }
}

impl From<MediaError> for PipelineError {
    fn from(err: MediaError) -> Self {
        if let Some(path) = err.missing_path() {
            return PipelineError::missing(path.clone());
        }
        if err.is_tool_failure() {
            let subject = match err.clip_index() {
                Some(index) => format!("interval {}", index),
                None => "ffmpeg".to_string(),
            };
            return PipelineError::ExternalTool {
                subject,
                source: err,
            };
        }
        match err {
            MediaError::InvalidInput(reason) => PipelineError::invalid_parameter("media", reason),
            MediaError::Io(e) => PipelineError::Io(e),
            MediaError::ClipFailed { source, .. } => PipelineError::from(*source),
            other => PipelineError::Internal(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::MalformedInput(err.to_string())
    }
}
