//! Pipeline configuration.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use kclip_media::{ConcatMode, DEFAULT_FFMPEG_BINARY};
use kclip_models::{ClusteringParams, ClusteringProfile, EncodingConfig};

use crate::error::{PipelineError, PipelineResult};

/// Default detection log file name inside the work directory.
pub const DETECTION_LOG_FILE: &str = "detection_timestamps.json";
/// Default incident document file name inside the work directory.
pub const INCIDENTS_FILE: &str = "formatted_clusters.json";
/// Default clip directory name inside the work directory.
pub const CLIPS_DIR: &str = "output_clips";
/// Default reduced frame-rate video name inside the work directory.
pub const REDUCED_VIDEO_FILE: &str = "reduced_fps_video.mp4";
/// Default per-frame crops directory name inside the work directory.
pub const CROPS_DIR: &str = "detection_frames";

/// What cleanup removes after a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupPolicy {
    /// Remove the incident document
    pub remove_incidents: bool,
    /// Remove the clip directory once the output is written
    pub remove_clips: bool,
}

impl Default for CleanupPolicy {
    fn default() -> Self {
        Self {
            remove_incidents: true,
            remove_clips: false,
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Named profile the clustering values started from
    pub profile: ClusteringProfile,
    /// Clustering, filter, and padding values
    pub params: ClusteringParams,
    /// Re-encode settings for clips and joins
    pub encoding: EncodingConfig,
    /// FFmpeg binary path or name
    pub ffmpeg_binary: PathBuf,
    /// Per-invocation timeout for external tools
    pub tool_timeout: Duration,
    /// Clips cut concurrently
    pub max_parallel_extractions: usize,
    /// How clips are joined
    pub concat_mode: ConcatMode,
    /// Frame rate the detector analyses at
    pub detection_fps: u32,
    /// Intermediates removed after a successful join
    pub cleanup: CleanupPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let profile = ClusteringProfile::default();
        Self {
            profile,
            params: profile.params(),
            encoding: EncodingConfig::default(),
            ffmpeg_binary: PathBuf::from(DEFAULT_FFMPEG_BINARY),
            tool_timeout: Duration::from_secs(3600), // 1 hour
            max_parallel_extractions: 1,
            concat_mode: ConcatMode::StreamCopy,
            detection_fps: 5,
            cleanup: CleanupPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Start from a named profile with default tool settings.
    pub fn with_profile(profile: ClusteringProfile) -> Self {
        Self {
            profile,
            params: profile.params(),
            ..Self::default()
        }
    }

    /// Create config from `KCLIP_*` environment variables.
    pub fn from_env() -> PipelineResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create config from any key lookup (used by `from_env`).
    pub fn from_lookup<F>(lookup: F) -> PipelineResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let profile = match lookup("KCLIP_PROFILE") {
            Some(name) => name.parse::<ClusteringProfile>()?,
            None => ClusteringProfile::default(),
        };
        let defaults = Self::with_profile(profile);
        let base = defaults.params;

        let params = ClusteringParams {
            time_threshold: parse_var(&lookup, "KCLIP_TIME_THRESHOLD")?
                .unwrap_or(base.time_threshold),
            frame_gap: parse_var(&lookup, "KCLIP_FRAME_GAP")?.unwrap_or(base.frame_gap),
            min_cluster_len: parse_var(&lookup, "KCLIP_MIN_CLUSTER_LEN")?
                .unwrap_or(base.min_cluster_len),
            pre_padding: parse_var(&lookup, "KCLIP_PRE_PADDING")?.unwrap_or(base.pre_padding),
            post_padding: parse_var(&lookup, "KCLIP_POST_PADDING")?.unwrap_or(base.post_padding),
        };
        params.validate()?;

        let concat_mode = match lookup("KCLIP_CONCAT_MODE").as_deref().map(str::trim) {
            None | Some("copy") => ConcatMode::StreamCopy,
            Some("reencode") => ConcatMode::Reencode,
            Some(other) => {
                return Err(PipelineError::invalid_parameter(
                    "KCLIP_CONCAT_MODE",
                    format!("expected 'reencode' or 'copy', got '{}'", other),
                ))
            }
        };

        let mut encoding = defaults.encoding;
        if let Some(crf) = parse_var::<u8, _>(&lookup, "KCLIP_CRF")? {
            if crf > 51 {
                return Err(PipelineError::invalid_parameter("KCLIP_CRF", "must be in 0..=51"));
            }
            encoding = encoding.with_crf(crf);
        }
        if let Some(preset) = lookup("KCLIP_PRESET") {
            encoding = encoding.with_preset(preset.trim());
        }
        if parse_var(&lookup, "KCLIP_NVENC")?.unwrap_or(false) {
            encoding = encoding.with_nvenc();
        }

        let detection_fps = parse_var(&lookup, "KCLIP_DETECTION_FPS")?
            .unwrap_or(defaults.detection_fps);
        if detection_fps == 0 {
            return Err(PipelineError::invalid_parameter("KCLIP_DETECTION_FPS", "must be > 0"));
        }

        Ok(Self {
            profile,
            params,
            encoding,
            ffmpeg_binary: lookup("KCLIP_FFMPEG")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_binary),
            tool_timeout: Duration::from_secs(
                parse_var(&lookup, "KCLIP_TOOL_TIMEOUT_SECS")?
                    .unwrap_or(defaults.tool_timeout.as_secs()),
            ),
            max_parallel_extractions: parse_var::<usize, _>(&lookup, "KCLIP_MAX_PARALLEL")?
                .unwrap_or(defaults.max_parallel_extractions)
                .max(1),
            concat_mode,
            detection_fps,
            cleanup: CleanupPolicy {
                remove_incidents: !parse_var(&lookup, "KCLIP_KEEP_INCIDENTS")?.unwrap_or(false),
                remove_clips: parse_var(&lookup, "KCLIP_REMOVE_CLIPS")?
                    .unwrap_or(defaults.cleanup.remove_clips),
            },
        })
    }

    pub fn with_params(mut self, params: ClusteringParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_ffmpeg_binary(mut self, binary: impl Into<PathBuf>) -> Self {
        self.ffmpeg_binary = binary.into();
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    pub fn with_max_parallel_extractions(mut self, max: usize) -> Self {
        self.max_parallel_extractions = max.max(1);
        self
    }

    pub fn with_concat_mode(mut self, mode: ConcatMode) -> Self {
        self.concat_mode = mode;
        self
    }

    pub fn with_cleanup(mut self, cleanup: CleanupPolicy) -> Self {
        self.cleanup = cleanup;
        self
    }
}

/// Parse an optional variable; a present but unparseable value is an error.
fn parse_var<T, F>(lookup: &F, key: &str) -> PipelineResult<Option<T>>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse().map(Some).map_err(|_| {
            PipelineError::invalid_parameter(key, format!("cannot parse '{}'", raw))
        }),
    }
}

/// Every file and directory a run reads or writes.
///
/// All paths are explicit; nothing is resolved against the working directory
/// at run time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelinePaths {
    pub source_video: PathBuf,
    pub work_dir: PathBuf,
    pub detection_log: PathBuf,
    pub incidents: PathBuf,
    pub clips_dir: PathBuf,
    pub output: PathBuf,
    pub reduced_video: PathBuf,
    pub crops_dir: PathBuf,
}

impl PipelinePaths {
    /// Lay out intermediates inside `work_dir` with the default names.
    pub fn new(
        source_video: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
    ) -> Self {
        let work_dir = work_dir.into();
        Self {
            source_video: source_video.into(),
            detection_log: work_dir.join(DETECTION_LOG_FILE),
            incidents: work_dir.join(INCIDENTS_FILE),
            clips_dir: work_dir.join(CLIPS_DIR),
            reduced_video: work_dir.join(REDUCED_VIDEO_FILE),
            crops_dir: work_dir.join(CROPS_DIR),
            output: output.into(),
            work_dir,
        }
    }

    pub fn with_detection_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.detection_log = path.into();
        self
    }

    pub fn with_incidents(mut self, path: impl Into<PathBuf>) -> Self {
        self.incidents = path.into();
        self
    }

    pub fn with_clips_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.clips_dir = path.into();
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tokio_test::assert_err;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_use_operational_profile() {
        let config = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.profile, ClusteringProfile::Operational);
        assert_eq!(config.params.frame_gap, 3);
        assert_eq!(config.params.pre_padding, 6.0);
        assert_eq!(config.tool_timeout, Duration::from_secs(3600));
        assert_eq!(config.concat_mode, ConcatMode::StreamCopy);
        assert!(config.cleanup.remove_incidents);
    }

    #[test]
    fn test_legacy_profile_with_override() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("KCLIP_PROFILE", "Legacy"),
            ("KCLIP_POST_PADDING", "4.5"),
        ]))
        .unwrap();
        assert_eq!(config.params.frame_gap, 2);
        assert_eq!(config.params.pre_padding, 10.0);
        assert_eq!(config.params.post_padding, 4.5);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert_err!(PipelineConfig::from_lookup(lookup(&[("KCLIP_PROFILE", "fast")])));

        let unparseable = PipelineConfig::from_lookup(lookup(&[("KCLIP_FRAME_GAP", "three")]));
        assert!(unparseable.unwrap_err().to_string().contains("KCLIP_FRAME_GAP"));

        assert_err!(PipelineConfig::from_lookup(lookup(&[("KCLIP_FRAME_GAP", "0")])));
        assert_err!(PipelineConfig::from_lookup(lookup(&[("KCLIP_CONCAT_MODE", "fast")])));
    }

    #[test]
    fn test_reencode_join_and_parallelism() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("KCLIP_CONCAT_MODE", "reencode"),
            ("KCLIP_MAX_PARALLEL", "0"),
            ("KCLIP_FFMPEG", "/opt/ffmpeg/bin/ffmpeg"),
        ]))
        .unwrap();
        assert_eq!(config.concat_mode, ConcatMode::Reencode);
        assert_eq!(config.max_parallel_extractions, 1);
        assert_eq!(config.ffmpeg_binary, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
    }

    #[test]
    fn test_encoding_overrides() {
        let config = PipelineConfig::from_lookup(lookup(&[
            ("KCLIP_CRF", "23"),
            ("KCLIP_PRESET", "slow"),
            ("KCLIP_NVENC", "true"),
        ]))
        .unwrap();
        assert_eq!(config.encoding.crf, 23);
        assert_eq!(config.encoding.preset, "slow");
        assert_eq!(config.encoding.codec, "h264_nvenc");
        assert!(config.encoding.to_ffmpeg_args().contains(&"-cq".to_string()));

        let defaults = PipelineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(defaults.encoding, EncodingConfig::default());

        assert_err!(PipelineConfig::from_lookup(lookup(&[("KCLIP_CRF", "60")])));
        assert_err!(PipelineConfig::from_lookup(lookup(&[("KCLIP_NVENC", "yes")])));
    }

    #[test]
    fn test_default_paths() {
        let paths = PipelinePaths::new("/videos/bout.mp4", "/tmp/kclip", "/out/final.mp4");
        assert_eq!(paths.detection_log, PathBuf::from("/tmp/kclip/detection_timestamps.json"));
        assert_eq!(paths.incidents, PathBuf::from("/tmp/kclip/formatted_clusters.json"));
        assert_eq!(paths.clips_dir, PathBuf::from("/tmp/kclip/output_clips"));
        assert_eq!(paths.crops_dir, PathBuf::from("/tmp/kclip/detection_frames"));
    }
}
