//! Filesystem helpers for scoped outputs and best-effort cleanup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::MediaResult;

/// Outcome of a best-effort removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    /// Nothing was there to remove
    Absent,
}

/// Create `dir` and its parents if needed. Idempotent.
pub async fn ensure_dir(dir: impl AsRef<Path>) -> MediaResult<()> {
    fs::create_dir_all(dir.as_ref()).await?;
    Ok(())
}

/// Remove a file or a directory tree.
///
/// A target that is already gone is not an error; reruns of a cleanup are
/// therefore safe.
pub async fn remove_path_best_effort(path: impl AsRef<Path>) -> MediaResult<Removal> {
    let path = path.as_ref();

    let metadata = match fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Removal::Absent),
        Err(e) => return Err(e.into()),
    };

    let result = if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    };

    match result {
        Ok(()) => {
            tracing::debug!("Removed {}", path.display());
            Ok(Removal::Removed)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(Removal::Absent),
        Err(e) => Err(e.into()),
    }
}

/// Deletes an output file on drop unless the producing step succeeded.
///
/// Guards a clip while FFmpeg writes it: a failed or cancelled cut never
/// leaves a truncated file behind.
#[derive(Debug)]
pub struct PartialOutputGuard {
    path: PathBuf,
    armed: bool,
}

impl PartialOutputGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            armed: true,
        }
    }

    /// Keep the file.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for PartialOutputGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed partial output {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove partial output {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_ensure_dir_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("clips").join("output_clips");

        ensure_dir(&nested).await.unwrap();
        ensure_dir(&nested).await.unwrap();
        assert!(nested.is_dir());
    }

    #[tokio::test]
    async fn test_remove_file_and_tree() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("detections.json");
        let tree = dir.path().join("detection_frames");
        fs::write(&file, b"[]").await.unwrap();
        fs::create_dir_all(tree.join("inner")).await.unwrap();
        fs::write(tree.join("inner").join("f.jpg"), b"x").await.unwrap();

        assert_eq!(remove_path_best_effort(&file).await.unwrap(), Removal::Removed);
        assert_eq!(remove_path_best_effort(&tree).await.unwrap(), Removal::Removed);
        assert!(!file.exists());
        assert!(!tree.exists());
    }

    #[tokio::test]
    async fn test_remove_absent_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("reduced_fps_video.mp4");
        assert_eq!(remove_path_best_effort(&missing).await.unwrap(), Removal::Absent);
    }

    #[test]
    fn test_partial_output_guard() {
        let dir = TempDir::new().unwrap();
        let kept = dir.path().join("clip_1.mp4");
        let dropped = dir.path().join("clip_2.mp4");
        std::fs::write(&kept, b"ok").unwrap();
        std::fs::write(&dropped, b"partial").unwrap();

        PartialOutputGuard::new(&kept).disarm();
        drop(PartialOutputGuard::new(&dropped));
        // Guarding a file that never appeared is fine
        drop(PartialOutputGuard::new(dir.path().join("clip_3.mp4")));

        assert!(kept.exists());
        assert!(!dropped.exists());
    }
}
