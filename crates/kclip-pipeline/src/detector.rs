//! Detector adapters.
//!
//! The detection model is external. A [`Detector`] only has to leave a JSON
//! array of detection events at the requested log path.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use kclip_media::{reduce_frame_rate, FfmpegRunner};

use crate::error::{PipelineError, PipelineResult};

/// Produces a detection log for a source video.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Write the detection log for `source_video` to `log_path`.
    async fn detect(&self, source_video: &Path, log_path: &Path) -> PipelineResult<()>;

    /// Intermediate files this detector leaves behind for cleanup.
    fn intermediates(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Uses a detection log captured earlier.
#[derive(Debug, Clone, Default)]
pub struct ExistingLogDetector {
    source_log: Option<PathBuf>,
}

impl ExistingLogDetector {
    /// Expect the log to already be at the pipeline's log path.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy a log from `path` into the pipeline's log path.
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source_log: Some(path.into()),
        }
    }
}

#[async_trait]
impl Detector for ExistingLogDetector {
    fn name(&self) -> &str {
        "existing_log"
    }

    async fn detect(&self, _source_video: &Path, log_path: &Path) -> PipelineResult<()> {
        match &self.source_log {
            Some(source) if source != log_path => {
                if !source.is_file() {
                    return Err(PipelineError::missing(source));
                }
                if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::copy(source, log_path).await?;
                debug!("Copied detection log {} -> {}", source.display(), log_path.display());
                Ok(())
            }
            _ if log_path.is_file() => Ok(()),
            _ => Err(PipelineError::missing(log_path)),
        }
    }
}

/// Runs an external detector program.
///
/// Invoked as `<program> [args..] <video> <fps> <log_path>`, optionally on a
/// copy of the source resampled to `fps` first.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: PathBuf,
    args: Vec<String>,
    fps: u32,
    reduction: Option<(FfmpegRunner, PathBuf)>,
    timeout: Option<Duration>,
}

impl CommandDetector {
    pub fn new(program: impl Into<PathBuf>, fps: u32) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            fps,
            reduction: None,
            timeout: None,
        }
    }

    /// Leading arguments placed before the video path.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Resample the source to the detector's frame rate into `reduced_video` first.
    pub fn with_frame_rate_reduction(
        mut self,
        runner: FfmpegRunner,
        reduced_video: impl Into<PathBuf>,
    ) -> Self {
        self.reduction = Some((runner, reduced_video.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

#[async_trait]
impl Detector for CommandDetector {
    fn name(&self) -> &str {
        "command"
    }

    async fn detect(&self, source_video: &Path, log_path: &Path) -> PipelineResult<()> {
        if self.fps == 0 {
            return Err(PipelineError::invalid_parameter("detection_fps", "must be > 0"));
        }

        let video = match &self.reduction {
            Some((runner, reduced)) => {
                reduce_frame_rate(runner, source_video, reduced, self.fps).await?;
                reduced.clone()
            }
            None => source_video.to_path_buf(),
        };

        if let Some(parent) = log_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!(
            "Running detector {} on {} at {} fps",
            self.program.display(),
            video.display(),
            self.fps
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(&video)
            .arg(self.fps.to_string())
            .arg(log_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let run = cmd.output();
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, run).await.map_err(|_| {
                PipelineError::detector_failed(
                    self.program_name(),
                    format!("timed out after {} seconds", limit.as_secs()),
                )
            })?,
            None => run.await,
        }
        .map_err(|e| PipelineError::detector_failed(self.program_name(), e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            return Err(PipelineError::detector_failed(
                self.program_name(),
                format!("exit status {:?}: {}", output.status.code(), tail.join(" | ")),
            ));
        }

        if !log_path.is_file() {
            return Err(PipelineError::missing(log_path));
        }
        Ok(())
    }

    fn intermediates(&self) -> Vec<PathBuf> {
        self.reduction
            .iter()
            .map(|(_, reduced)| reduced.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_existing_log_must_exist() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("detection_timestamps.json");
        let detector = ExistingLogDetector::new();

        let err = detector.detect(Path::new("/videos/bout.mp4"), &log).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingArtifact);

        tokio::fs::write(&log, b"[]").await.unwrap();
        detector.detect(Path::new("/videos/bout.mp4"), &log).await.unwrap();
    }

    #[tokio::test]
    async fn test_existing_log_copied_into_place() {
        let dir = TempDir::new().unwrap();
        let captured = dir.path().join("captured.json");
        let log = dir.path().join("work").join("detection_timestamps.json");
        tokio::fs::write(&captured, b"[]").await.unwrap();

        ExistingLogDetector::from_file(&captured)
            .detect(Path::new("/videos/bout.mp4"), &log)
            .await
            .unwrap();
        assert_eq!(tokio::fs::read(&log).await.unwrap(), b"[]");
    }

    #[tokio::test]
    async fn test_command_detector_missing_program() {
        let dir = TempDir::new().unwrap();
        let detector = CommandDetector::new("/nonexistent/bin/detector-kclip", 5);
        let err = detector
            .detect(Path::new("/videos/bout.mp4"), &dir.path().join("log.json"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ExternalToolError);
    }

    #[cfg(unix)]
    mod with_fake_detector {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake-detector");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_passes_explicit_arguments() {
            let dir = TempDir::new().unwrap();
            let program = script(dir.path(), "echo \"$1 $2 $3 $4\" > \"$4\".args\necho '[]' > \"$4\"");
            let log = dir.path().join("detection_timestamps.json");

            CommandDetector::new(&program, 5)
                .with_args(["--weights"])
                .detect(Path::new("/videos/bout.mp4"), &log)
                .await
                .unwrap();

            let args = std::fs::read_to_string(dir.path().join("detection_timestamps.json.args")).unwrap();
            assert_eq!(args.trim(), format!("--weights /videos/bout.mp4 5 {}", log.display()));
            assert!(log.is_file());
        }

        #[tokio::test]
        async fn test_failure_carries_stderr() {
            let dir = TempDir::new().unwrap();
            let program = script(dir.path(), "echo 'model weights not found' >&2\nexit 2");

            let err = CommandDetector::new(&program, 5)
                .detect(Path::new("/videos/bout.mp4"), &dir.path().join("log.json"))
                .await
                .unwrap_err();

            assert_eq!(err.kind(), ErrorKind::ExternalToolError);
            assert!(err.to_string().contains("model weights not found"));
        }

        #[tokio::test]
        async fn test_exit_zero_without_log() {
            let dir = TempDir::new().unwrap();
            let program = script(dir.path(), "exit 0");

            let err = CommandDetector::new(&program, 5)
                .detect(Path::new("/videos/bout.mp4"), &dir.path().join("log.json"))
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MissingArtifact);
        }
    }
}
