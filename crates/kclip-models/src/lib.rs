//! Shared data models for the kclip incident pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Detection events as written by the external detector
//! - Incident clusters and formatted incidents
//! - Merged extraction intervals and clip artifacts
//! - Encoding configuration and clustering profiles
//! - Pipeline stages and their progress ranges

pub mod clip;
pub mod detection;
pub mod encoding;
pub mod error;
pub mod incident;
pub mod interval;
pub mod profile;
pub mod stage;

// Re-export common types
pub use clip::{clip_file_name, ClipArtifact, ClipStatus};
pub use detection::{validate_detections, BoundingBox, DetectionEvent};
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use incident::{FormattedIncident, IncidentCluster};
pub use interval::MergedInterval;
pub use profile::{ClusteringParams, ClusteringProfile};
pub use stage::PipelineStage;
