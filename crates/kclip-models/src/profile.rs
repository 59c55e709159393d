//! Named clustering and padding profiles.
//!
//! Two sets of defaults are in circulation: the legacy one (frame gap 2,
//! 10s/3s padding) and the operational one (frame gap 3, 6s/2s padding).
//! Both are exposed as profiles over a single parameter set, and every
//! value can be overridden individually.

use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Default maximum seconds between consecutive detections of one incident.
pub const DEFAULT_TIME_THRESHOLD_SECS: f64 = 2.0;
/// Default minimum number of detections for an incident to survive.
pub const DEFAULT_MIN_CLUSTER_LEN: usize = 3;

/// Named parameter profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClusteringProfile {
    /// Frame gap 2, padding 10s before / 3s after
    Legacy,
    /// Frame gap 3, padding 6s before / 2s after
    #[default]
    Operational,
}

impl ClusteringProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusteringProfile::Legacy => "legacy",
            ClusteringProfile::Operational => "operational",
        }
    }

    /// Parameter set for this profile.
    pub fn params(&self) -> ClusteringParams {
        match self {
            ClusteringProfile::Legacy => ClusteringParams {
                time_threshold: DEFAULT_TIME_THRESHOLD_SECS,
                frame_gap: 2,
                min_cluster_len: DEFAULT_MIN_CLUSTER_LEN,
                pre_padding: 10.0,
                post_padding: 3.0,
            },
            ClusteringProfile::Operational => ClusteringParams {
                time_threshold: DEFAULT_TIME_THRESHOLD_SECS,
                frame_gap: 3,
                min_cluster_len: DEFAULT_MIN_CLUSTER_LEN,
                pre_padding: 6.0,
                post_padding: 2.0,
            },
        }
    }
}

impl fmt::Display for ClusteringProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ClusteringProfile {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(ClusteringProfile::Legacy),
            "operational" => Ok(ClusteringProfile::Operational),
            _ => Err(ModelError::UnknownProfile(s.to_string())),
        }
    }
}

/// Clustering, filtering, and padding parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ClusteringParams {
    /// Max seconds between consecutive members of a cluster
    pub time_threshold: f64,
    /// Max frame-index difference between consecutive members
    pub frame_gap: u64,
    /// Clusters shorter than this are discarded
    pub min_cluster_len: usize,
    /// Seconds of context kept before each incident
    pub pre_padding: f64,
    /// Seconds of context kept after each incident
    pub post_padding: f64,
}

impl Default for ClusteringParams {
    fn default() -> Self {
        ClusteringProfile::default().params()
    }
}

impl ClusteringParams {
    pub fn with_time_threshold(mut self, secs: f64) -> Self {
        self.time_threshold = secs;
        self
    }

    pub fn with_frame_gap(mut self, frames: u64) -> Self {
        self.frame_gap = frames;
        self
    }

    pub fn with_min_cluster_len(mut self, len: usize) -> Self {
        self.min_cluster_len = len;
        self
    }

    pub fn with_padding(mut self, pre: f64, post: f64) -> Self {
        self.pre_padding = pre;
        self.post_padding = post;
        self
    }

    /// Check every value against its domain.
    pub fn validate(&self) -> ModelResult<()> {
        if !self.time_threshold.is_finite() || self.time_threshold <= 0.0 {
            return Err(ModelError::invalid_parameter(
                "time_threshold",
                format!("must be > 0, got {}", self.time_threshold),
            ));
        }
        if self.frame_gap == 0 {
            return Err(ModelError::invalid_parameter("frame_gap", "must be > 0"));
        }
        if self.min_cluster_len == 0 {
            return Err(ModelError::invalid_parameter("min_cluster_len", "must be >= 1"));
        }
        for (name, value) in [("pre_padding", self.pre_padding), ("post_padding", self.post_padding)] {
            if !value.is_finite() || value < 0.0 {
                return Err(ModelError::invalid_parameter(
                    name,
                    format!("must be >= 0, got {}", value),
                ));
            }
        }
        Ok(())
    }
}
