//! Incident clipping pipeline.
//!
//! Turns a detector's log of per-frame detections into incident clips:
//! detections are clustered by temporal and frame proximity, weak clusters
//! are dropped, the survivors are padded and coalesced into extraction
//! windows, and FFmpeg cuts and joins the windows into one output video.

pub mod cleanup;
pub mod clustering;
pub mod config;
pub mod detector;
pub mod documents;
pub mod error;
pub mod logging;
pub mod merge;
pub mod orchestrator;
pub mod progress;

pub use cleanup::{cleanup_targets, remove_intermediates, CleanupReport};
pub use clustering::{cluster_events, filter_clusters, format_clusters, incidents_from_detections};
pub use config::{CleanupPolicy, PipelineConfig, PipelinePaths};
pub use detector::{CommandDetector, Detector, ExistingLogDetector};
pub use documents::{read_detection_log, read_incidents, write_detection_log, write_incidents};
pub use error::{ErrorKind, PipelineError, PipelineResult};
pub use logging::RunLogger;
pub use merge::{merge, merge_intervals, MIN_CLIP_DURATION_SECS};
pub use orchestrator::{Pipeline, PipelineOutcome};
pub use progress::{PipelineProgress, ProgressReporter};
