//! Clip artifacts written by the extractor.

use std::path::{Path, PathBuf};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::interval::MergedInterval;

/// Prefix for numbered clip files.
pub const CLIP_FILE_PREFIX: &str = "clip_";
/// Default clip container extension.
pub const DEFAULT_CLIP_EXTENSION: &str = "mp4";

/// Deterministic file name for the clip at `sequence_index` (1-based).
pub fn clip_file_name(sequence_index: usize, extension: &str) -> String {
    format!("{}{}.{}", CLIP_FILE_PREFIX, sequence_index, extension)
}

/// Whether a clip file exists on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    Created,
    Missing,
}

/// One numbered clip cut from the source video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClipArtifact {
    /// 1-based position in the output sequence
    pub sequence_index: usize,
    /// Window this clip was cut from
    pub source_interval: MergedInterval,
    /// Location of the clip file
    pub file_path: PathBuf,
    /// Last observed status
    pub status: ClipStatus,
}

impl ClipArtifact {
    /// Plan a clip inside `output_dir`. Status starts as `Missing`.
    pub fn planned(
        sequence_index: usize,
        source_interval: MergedInterval,
        output_dir: &Path,
        extension: &str,
    ) -> Self {
        Self {
            sequence_index,
            source_interval,
            file_path: output_dir.join(clip_file_name(sequence_index, extension)),
            status: ClipStatus::Missing,
        }
    }

    /// Re-check the file on disk and update `status`.
    pub fn refresh_status(&mut self) -> ClipStatus {
        self.status = if self.file_path.is_file() {
            ClipStatus::Created
        } else {
            ClipStatus::Missing
        };
        self.status
    }

    pub fn is_created(&self) -> bool {
        self.status == ClipStatus::Created
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clip_file_name() {
        assert_eq!(clip_file_name(1, "mp4"), "clip_1.mp4");
        assert_eq!(clip_file_name(12, "mkv"), "clip_12.mkv");
    }

    #[test]
    fn test_planned_clip_is_missing() {
        let interval = MergedInterval::new(0.0, 4.0).unwrap();
        let mut clip =
            ClipArtifact::planned(3, interval, Path::new("/nonexistent/clips"), "mp4");

        assert_eq!(clip.file_path, PathBuf::from("/nonexistent/clips/clip_3.mp4"));
        assert_eq!(clip.status, ClipStatus::Missing);
        assert_eq!(clip.refresh_status(), ClipStatus::Missing);
        assert!(!clip.is_created());
    }
}
