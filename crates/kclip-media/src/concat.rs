//! Joining clips with FFmpeg's concat demuxer.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::{debug, info};

use kclip_models::EncodingConfig;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::ensure_dir;

/// How clips are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcatMode {
    /// Copy streams as-is; lossless since every clip shares one encoding profile
    #[default]
    StreamCopy,
    /// Encode a second time with the extraction settings
    Reencode,
}

/// Concat-demuxer list file, deleted when dropped.
#[derive(Debug)]
pub struct ConcatManifest {
    file: NamedTempFile,
}

impl ConcatManifest {
    /// Write a manifest listing `clips` in order inside `dir`.
    pub fn create(dir: &Path, clips: &[PathBuf]) -> MediaResult<Self> {
        let mut file = tempfile::Builder::new()
            .prefix("kclip_concat_")
            .suffix(".txt")
            .tempfile_in(dir)?;

        file.write_all(Self::render(clips).as_bytes())?;
        file.flush()?;

        Ok(Self { file })
    }

    /// Manifest body, one `file '<path>'` line per clip.
    pub fn render(clips: &[PathBuf]) -> String {
        clips
            .iter()
            .map(|path| format!("file '{}'\n", escape_path(path)))
            .collect()
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Quote a path for the concat demuxer: `'` becomes `'\''`.
fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('\'', r"'\''")
}

/// Joins numbered clips into a single output video.
#[derive(Debug, Clone)]
pub struct ClipConcatenator {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
    mode: ConcatMode,
}

impl ClipConcatenator {
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig) -> Self {
        Self {
            runner,
            encoding,
            mode: ConcatMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ConcatMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ConcatMode {
        self.mode
    }

    /// Join `clips` in order into `output`.
    ///
    /// Every clip must exist; a missing one fails with
    /// [`MediaError::FileNotFound`] before FFmpeg runs. The manifest is
    /// removed whether or not the join succeeds.
    pub async fn concatenate(&self, clips: &[PathBuf], output: &Path) -> MediaResult<()> {
        if clips.is_empty() {
            return Err(MediaError::invalid_input("no clips to concatenate"));
        }

        let mut resolved = Vec::with_capacity(clips.len());
        for clip in clips {
            if !clip.is_file() {
                return Err(MediaError::FileNotFound(clip.clone()));
            }
            resolved.push(tokio::fs::canonicalize(clip).await?);
        }

        let output_dir = match output.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        ensure_dir(&output_dir).await?;

        let manifest = ConcatManifest::create(&output_dir, &resolved)?;
        debug!("Concat manifest at {}", manifest.path().display());

        let cmd = FfmpegCommand::new(manifest.path(), output).concat_demuxer();
        let cmd = match self.mode {
            ConcatMode::Reencode => cmd.encoding(&self.encoding),
            ConcatMode::StreamCopy => cmd.stream_copy(),
        };

        info!(
            "Joining {} clips into {} ({:?})",
            clips.len(),
            output.display(),
            self.mode
        );
        self.runner.run(&cmd).await?;

        if !output.is_file() {
            return Err(MediaError::FileNotFound(output.to_path_buf()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_manifest_body() {
        let body = ConcatManifest::render(&[
            PathBuf::from("/clips/clip_1.mp4"),
            PathBuf::from("/clips/clip_2.mp4"),
        ]);
        assert_eq!(
            body,
            "file '/clips/clip_1.mp4'\nfile '/clips/clip_2.mp4'\n"
        );
    }

    #[test]
    fn test_manifest_escapes_quotes() {
        let body = ConcatManifest::render(&[PathBuf::from("/clips/owner's/clip_1.mp4")]);
        assert_eq!(body, "file '/clips/owner'\\''s/clip_1.mp4'\n");
    }

    #[test]
    fn test_manifest_removed_on_drop() {
        let dir = TempDir::new().unwrap();
        let manifest =
            ConcatManifest::create(dir.path(), &[PathBuf::from("/clips/clip_1.mp4")]).unwrap();
        let path = manifest.path().to_path_buf();

        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("kclip_concat_") && name.ends_with(".txt"));

        drop(manifest);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_rejects_empty_clip_list() {
        let dir = TempDir::new().unwrap();
        let concatenator = ClipConcatenator::new(FfmpegRunner::new(), EncodingConfig::default());
        let err = concatenator
            .concatenate(&[], &dir.path().join("out.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_clip_fails_before_ffmpeg() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("clip_1.mp4");
        let missing = dir.path().join("clip_2.mp4");
        std::fs::write(&present, b"clip").unwrap();

        // A binary that cannot exist proves FFmpeg is never reached
        let runner = FfmpegRunner::new().with_binary("/nonexistent/bin/ffmpeg-kclip");
        let concatenator = ClipConcatenator::new(runner, EncodingConfig::default());
        let out_dir = dir.path().join("merged");

        let err = concatenator
            .concatenate(&[present, missing.clone()], &out_dir.join("out.mp4"))
            .await
            .unwrap_err();

        assert_eq!(err.missing_path(), Some(&missing));
        assert!(!out_dir.exists());
    }

    #[cfg(unix)]
    mod with_fake_ffmpeg {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        /// Copies the manifest (the `-i` argument) to the output path.
        fn fake_ffmpeg(dir: &Path, exit_code: i32) -> PathBuf {
            let script = dir.join("fake-ffmpeg");
            let body = format!(
                "#!/bin/sh\nprev=''\nfor arg; do\n  if [ \"$prev\" = '-i' ]; then list=\"$arg\"; fi\n  prev=\"$arg\"; last=\"$arg\"\ndone\n[ {exit_code} -eq 0 ] || exit {exit_code}\ncp \"$list\" \"$last\"\n"
            );
            std::fs::write(&script, body).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            script
        }

        fn clips(dir: &Path) -> Vec<PathBuf> {
            (1..=2)
                .map(|i| {
                    let path = dir.join(format!("clip_{i}.mp4"));
                    std::fs::write(&path, b"clip").unwrap();
                    path
                })
                .collect()
        }

        fn leftover_manifests(dir: &Path) -> usize {
            std::fs::read_dir(dir)
                .unwrap()
                .filter_map(Result::ok)
                .filter(|e| e.file_name().to_string_lossy().starts_with("kclip_concat_"))
                .count()
        }

        /// Writes its own arguments to the output path.
        fn echo_ffmpeg(dir: &Path) -> PathBuf {
            let script = dir.join("echo-ffmpeg");
            let body = "#!/bin/sh\nfor arg; do last=\"$arg\"; done\necho \"$@\" > \"$last\"\n";
            std::fs::write(&script, body).unwrap();
            std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
            script
        }

        #[tokio::test]
        async fn test_default_join_copies_streams() {
            let dir = TempDir::new().unwrap();
            let clips = clips(dir.path());
            let runner = FfmpegRunner::new().with_binary(echo_ffmpeg(dir.path()));
            let concatenator = ClipConcatenator::new(runner, EncodingConfig::default());
            assert_eq!(concatenator.mode(), ConcatMode::StreamCopy);
            let output = dir.path().join("merged.mp4");

            tokio_test::assert_ok!(concatenator.concatenate(&clips, &output).await);

            let args = std::fs::read_to_string(&output).unwrap();
            assert!(args.contains("-f concat -safe 0 -i"));
            assert!(args.contains("-c copy"));
            assert!(!args.contains("libx264"));
        }

        #[tokio::test]
        async fn test_reencode_join_uses_encoding() {
            let dir = TempDir::new().unwrap();
            let clips = clips(dir.path());
            let runner = FfmpegRunner::new().with_binary(echo_ffmpeg(dir.path()));
            let concatenator = ClipConcatenator::new(runner, EncodingConfig::default())
                .with_mode(ConcatMode::Reencode);
            let output = dir.path().join("merged.mp4");

            tokio_test::assert_ok!(concatenator.concatenate(&clips, &output).await);

            let args = std::fs::read_to_string(&output).unwrap();
            assert!(args.contains("-c:v libx264 -preset fast -crf 18"));
            assert!(!args.contains("-c copy"));
        }

        #[tokio::test]
        async fn test_concatenate_writes_ordered_manifest() {
            let dir = TempDir::new().unwrap();
            let clips = clips(dir.path());
            let runner = FfmpegRunner::new().with_binary(fake_ffmpeg(dir.path(), 0));
            let concatenator = ClipConcatenator::new(runner, EncodingConfig::default());
            let output = dir.path().join("final").join("merged.mp4");

            concatenator.concatenate(&clips, &output).await.unwrap();

            let manifest = std::fs::read_to_string(&output).unwrap();
            let lines: Vec<&str> = manifest.lines().collect();
            assert_eq!(lines.len(), 2);
            assert!(lines[0].ends_with("clip_1.mp4'"));
            assert!(lines[1].ends_with("clip_2.mp4'"));
            assert_eq!(leftover_manifests(&dir.path().join("final")), 0);
        }

        #[tokio::test]
        async fn test_manifest_removed_on_failure() {
            let dir = TempDir::new().unwrap();
            let clips = clips(dir.path());
            let runner = FfmpegRunner::new().with_binary(fake_ffmpeg(dir.path(), 3));
            let concatenator = ClipConcatenator::new(runner, EncodingConfig::default());
            let output = dir.path().join("merged.mp4");

            let err = concatenator.concatenate(&clips, &output).await.unwrap_err();

            assert!(err.is_tool_failure());
            assert!(!output.exists());
            assert_eq!(leftover_manifests(dir.path()), 0);
        }
    }
}
