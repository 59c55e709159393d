//! Clip extraction.
//!
//! Cuts one numbered clip per merged interval out of the source video.
//! Clips are always re-encoded: a stream copy can only start on a keyframe,
//! which would shift clip boundaries and break the joined timeline.
//!
//! Extraction is exposed as a lazy stream of progress items. Nothing runs
//! until the stream is polled, it is consumed once, and it ends after the
//! first failure.

use std::path::{Path, PathBuf};
use std::time::Instant;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tracing::{debug, info, warn};

use kclip_models::clip::DEFAULT_CLIP_EXTENSION;
use kclip_models::{ClipArtifact, ClipStatus, EncodingConfig, MergedInterval};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_dir, PartialOutputGuard};

/// Progress after one more clip finished.
#[derive(Debug, Clone)]
pub struct ExtractionProgress {
    /// Clips finished so far
    pub completed: usize,
    /// Clips in this extraction
    pub total: usize,
    /// The clip that just finished
    pub clip: ClipArtifact,
}

impl ExtractionProgress {
    /// Completed share in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.completed as f64 / self.total as f64
    }
}

/// Drives FFmpeg to cut one clip per interval.
#[derive(Debug, Clone)]
pub struct ClipExtractor {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
    extension: String,
    max_parallel: usize,
}

struct ExtractionState<'a> {
    pending: Option<BoxStream<'a, MediaResult<ClipArtifact>>>,
    completed: usize,
    total: usize,
}

impl ClipExtractor {
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig) -> Self {
        Self {
            runner,
            encoding,
            extension: DEFAULT_CLIP_EXTENSION.to_string(),
            max_parallel: 1,
        }
    }

    /// Container extension for clip files (default `mp4`).
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Number of clips cut concurrently (default 1).
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn max_parallel(&self) -> usize {
        self.max_parallel
    }

    /// Clip artifacts for `intervals`, numbered from 1 inside `output_dir`.
    pub fn plan(&self, intervals: &[MergedInterval], output_dir: &Path) -> Vec<ClipArtifact> {
        intervals
            .iter()
            .enumerate()
            .map(|(i, interval)| ClipArtifact::planned(i + 1, *interval, output_dir, &self.extension))
            .collect()
    }

    /// Lazily cut every interval, yielding progress after each finished clip.
    ///
    /// The first item is an error if the source video is missing or the
    /// output directory cannot be created. On an FFmpeg failure for clip `i`
    /// the stream yields [`MediaError::ClipFailed`] for `i` and ends; clips
    /// still running are cancelled and their partial files removed.
    pub fn extract<'a>(
        &'a self,
        source_video: &'a Path,
        intervals: &'a [MergedInterval],
        output_dir: &'a Path,
    ) -> impl Stream<Item = MediaResult<ExtractionProgress>> + Send + 'a {
        let clips = self.plan(intervals, output_dir);
        let total = clips.len();

        let pending = stream::once(async move {
            if !source_video.is_file() {
                return Err(MediaError::FileNotFound(source_video.to_path_buf()));
            }
            ensure_dir(output_dir).await?;
            info!(
                "Extracting {} clips from {} into {}",
                total,
                source_video.display(),
                output_dir.display()
            );

            let cuts = stream::iter(clips)
                .map(move |clip| self.extract_clip(source_video, clip))
                .buffer_unordered(self.max_parallel);
            Ok(cuts)
        })
        .map(|prepared| match prepared {
            Ok(cuts) => cuts.boxed(),
            Err(e) => stream::once(async move { Err(e) }).boxed(),
        })
        .flatten()
        .boxed();

        let state = ExtractionState {
            pending: Some(pending),
            completed: 0,
            total,
        };

        stream::unfold(state, |mut state| async move {
            let next = state.pending.as_mut()?.next().await?;
            match next {
                Ok(clip) => {
                    state.completed += 1;
                    let progress = ExtractionProgress {
                        completed: state.completed,
                        total: state.total,
                        clip,
                    };
                    Some((Ok(progress), state))
                }
                Err(e) => {
                    // Dropping the pending cuts kills in-flight FFmpeg processes
                    state.pending = None;
                    Some((Err(e), state))
                }
            }
        })
    }

    /// Run the whole extraction, reporting each step to `on_progress`.
    ///
    /// Returns the created clips ordered by sequence index.
    pub async fn extract_all<F>(
        &self,
        source_video: &Path,
        intervals: &[MergedInterval],
        output_dir: &Path,
        mut on_progress: F,
    ) -> MediaResult<Vec<ClipArtifact>>
    where
        F: FnMut(&ExtractionProgress),
    {
        let mut clips = Vec::with_capacity(intervals.len());
        let progress = self.extract(source_video, intervals, output_dir);
        futures::pin_mut!(progress);

        while let Some(step) = progress.next().await {
            let step = step?;
            on_progress(&step);
            clips.push(step.clip);
        }

        clips.sort_by_key(|clip| clip.sequence_index);
        Ok(clips)
    }

    async fn extract_clip(
        &self,
        source_video: &Path,
        mut clip: ClipArtifact,
    ) -> MediaResult<ClipArtifact> {
        let index = clip.sequence_index;
        let start = clip.source_interval.start_time;
        let duration = clip.source_interval.duration();
        let guard = PartialOutputGuard::new(&clip.file_path);
        let started = Instant::now();

        info!(
            "Cutting clip {}: {:.2}s + {:.2}s -> {}",
            index,
            start,
            duration,
            clip.file_path.display()
        );

        let cmd = FfmpegCommand::new(source_video, &clip.file_path)
            .seek(start)
            .duration(duration)
            .encoding(&self.encoding);

        let total_ms = (duration * 1000.0) as i64;
        let result = self
            .runner
            .run_with_progress(&cmd, move |progress| {
                debug!(
                    clip = index,
                    eta_secs = ?progress.eta_seconds(total_ms),
                    "Clip progress: {:.1}%",
                    progress.percentage(total_ms)
                );
            })
            .await;

        if let Err(e) = result {
            warn!("Clip {} failed: {}", index, e);
            metrics::counter!("kclip_clip_failures_total").increment(1);
            return Err(MediaError::clip_failed(index, e));
        }

        if clip.refresh_status() == ClipStatus::Missing {
            return Err(MediaError::clip_failed(
                index,
                MediaError::FileNotFound(clip.file_path.clone()),
            ));
        }

        guard.disarm();
        metrics::counter!("kclip_clips_extracted_total").increment(1);
        metrics::histogram!("kclip_clip_extract_seconds").record(started.elapsed().as_secs_f64());

        Ok(clip)
    }
}

/// Paths of `clips` in sequence order.
pub fn clip_paths(clips: &[ClipArtifact]) -> Vec<PathBuf> {
    let mut ordered: Vec<&ClipArtifact> = clips.iter().collect();
    ordered.sort_by_key(|clip| clip.sequence_index);
    ordered.into_iter().map(|clip| clip.file_path.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn intervals() -> Vec<MergedInterval> {
        vec![
            MergedInterval::new(0.0, 4.0).unwrap(),
            MergedInterval::new(10.0, 12.5).unwrap(),
        ]
    }

    #[test]
    fn test_plan_numbers_clips_from_one() {
        let extractor = ClipExtractor::new(FfmpegRunner::new(), EncodingConfig::default());
        let plan = extractor.plan(&intervals(), Path::new("/out"));

        assert_eq!(plan.len(), 2);
        assert_eq!(plan[0].sequence_index, 1);
        assert_eq!(plan[0].file_path, PathBuf::from("/out/clip_1.mp4"));
        assert_eq!(plan[1].file_path, PathBuf::from("/out/clip_2.mp4"));
        assert!(plan.iter().all(|c| c.status == ClipStatus::Missing));
    }

    #[test]
    fn test_progress_fraction() {
        let clip = ClipArtifact::planned(1, intervals()[0], Path::new("/out"), "mp4");
        let progress = ExtractionProgress {
            completed: 1,
            total: 4,
            clip,
        };
        assert!((progress.fraction() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_clip_paths_sorted() {
        let out = Path::new("/out");
        let mut clips = ClipExtractor::new(FfmpegRunner::new(), EncodingConfig::default())
            .plan(&intervals(), out);
        clips.reverse();
        assert_eq!(
            clip_paths(&clips),
            vec![out.join("clip_1.mp4"), out.join("clip_2.mp4")]
        );
    }

    #[tokio::test]
    async fn test_missing_source_fails_first() {
        let dir = TempDir::new().unwrap();
        let extractor = ClipExtractor::new(FfmpegRunner::new(), EncodingConfig::default());
        let out = dir.path().join("clips");
        let missing = dir.path().join("missing.mp4");

        let err = extractor
            .extract_all(&missing, &intervals(), &out, |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.missing_path(), Some(&missing));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_empty_interval_list_yields_nothing() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("source.mp4");
        std::fs::write(&source, b"video").unwrap();
        let extractor = ClipExtractor::new(FfmpegRunner::new(), EncodingConfig::default());

        let clips = extractor
            .extract_all(&source, &[], &dir.path().join("clips"), |_| {})
            .await
            .unwrap();
        assert!(clips.is_empty());
    }

    #[cfg(unix)]
    mod with_fake_ffmpeg {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Writes its last argument; fails when that path contains `fail_on`.
        fn fake_ffmpeg(dir: &Path, fail_on: &str) -> PathBuf {
            let script = dir.join("fake-ffmpeg");
            let body = format!(
                "#!/bin/sh\nfor last; do :; done\ncase \"$last\" in *{fail_on}*) echo 'encoder exploded' >&2; exit 1;; esac\necho clip > \"$last\"\necho progress=end >&2\n"
            );
            std::fs::write(&script, body).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            script
        }

        fn three_intervals() -> Vec<MergedInterval> {
            vec![
                MergedInterval::new(0.0, 2.0).unwrap(),
                MergedInterval::new(5.0, 7.0).unwrap(),
                MergedInterval::new(9.0, 11.0).unwrap(),
            ]
        }

        #[tokio::test]
        async fn test_progress_is_monotonic_and_complete() {
            let dir = TempDir::new().unwrap();
            let source = dir.path().join("source.mp4");
            std::fs::write(&source, b"video").unwrap();
            let runner = FfmpegRunner::new().with_binary(fake_ffmpeg(dir.path(), "never"));
            let extractor = ClipExtractor::new(runner, EncodingConfig::default());
            let out = dir.path().join("clips");

            let mut fractions = Vec::new();
            let clips = extractor
                .extract_all(&source, &three_intervals(), &out, |p| fractions.push(p.fraction()))
                .await
                .unwrap();

            assert_eq!(clips.len(), 3);
            assert!(clips.iter().all(|c| c.is_created()));
            assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
            assert!((fractions.last().unwrap() - 1.0).abs() < 1e-9);
        }

        #[tokio::test]
        async fn test_fail_fast_on_second_clip() {
            let dir = TempDir::new().unwrap();
            let source = dir.path().join("source.mp4");
            std::fs::write(&source, b"video").unwrap();
            let runner = FfmpegRunner::new().with_binary(fake_ffmpeg(dir.path(), "clip_2"));
            let extractor = ClipExtractor::new(runner, EncodingConfig::default());
            let out = dir.path().join("clips");

            let err = extractor
                .extract_all(&source, &three_intervals(), &out, |_| {})
                .await
                .unwrap_err();

            assert_eq!(err.clip_index(), Some(2));
            assert!(err.is_tool_failure());
            if let MediaError::ClipFailed { source, .. } = &err {
                if let MediaError::FfmpegFailed { stderr, .. } = source.as_ref() {
                    assert!(stderr.as_deref().unwrap_or_default().contains("encoder exploded"));
                }
            }
            assert!(out.join("clip_1.mp4").exists());
            assert!(!out.join("clip_2.mp4").exists());
            assert!(!out.join("clip_3.mp4").exists());
        }

        #[tokio::test]
        async fn test_parallel_failure_surfaces_single_error() {
            let dir = TempDir::new().unwrap();
            let source = dir.path().join("source.mp4");
            std::fs::write(&source, b"video").unwrap();
            let runner = FfmpegRunner::new().with_binary(fake_ffmpeg(dir.path(), "clip_2"));
            let extractor =
                ClipExtractor::new(runner, EncodingConfig::default()).with_max_parallel(3);

            let err = extractor
                .extract_all(&source, &three_intervals(), &dir.path().join("clips"), |_| {})
                .await
                .unwrap_err();
            assert_eq!(err.clip_index(), Some(2));
        }
    }
}
