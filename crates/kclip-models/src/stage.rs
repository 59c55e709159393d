//! Pipeline stages and their progress ranges.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// State of one pipeline run.
///
/// ```text
/// Idle → Detecting → Clustering → Merging → Extracting → Concatenating → CleaningUp → Done
///                                    └─→ NothingToExtract
/// any non-terminal state ─→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Idle,
    Detecting,
    Clustering,
    Merging,
    Extracting,
    Concatenating,
    CleaningUp,
    Done,
    /// No incident survived filtering
    NothingToExtract,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Detecting => "detecting",
            PipelineStage::Clustering => "clustering",
            PipelineStage::Merging => "merging",
            PipelineStage::Extracting => "extracting",
            PipelineStage::Concatenating => "concatenating",
            PipelineStage::CleaningUp => "cleaning_up",
            PipelineStage::Done => "done",
            PipelineStage::NothingToExtract => "nothing_to_extract",
            PipelineStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineStage::Done | PipelineStage::NothingToExtract | PipelineStage::Failed
        )
    }

    /// Stage that normally follows this one.
    pub fn next(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Idle => Some(PipelineStage::Detecting),
            PipelineStage::Detecting => Some(PipelineStage::Clustering),
            PipelineStage::Clustering => Some(PipelineStage::Merging),
            PipelineStage::Merging => Some(PipelineStage::Extracting),
            PipelineStage::Extracting => Some(PipelineStage::Concatenating),
            PipelineStage::Concatenating => Some(PipelineStage::CleaningUp),
            PipelineStage::CleaningUp => Some(PipelineStage::Done),
            _ => None,
        }
    }

    /// Whether moving from `self` to `to` is a legal transition.
    pub fn can_transition_to(&self, to: PipelineStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        match to {
            PipelineStage::Failed => true,
            PipelineStage::NothingToExtract => *self == PipelineStage::Merging,
            other => self.next() == Some(other),
        }
    }

    /// Disjoint `[start, end]` slice of overall progress (percent) owned by the stage.
    pub fn progress_range(&self) -> (u8, u8) {
        match self {
            PipelineStage::Idle => (0, 0),
            PipelineStage::Detecting => (0, 5),
            PipelineStage::Clustering => (5, 8),
            PipelineStage::Merging => (8, 10),
            PipelineStage::Extracting => (10, 90),
            PipelineStage::Concatenating => (90, 99),
            PipelineStage::CleaningUp => (99, 100),
            PipelineStage::Done | PipelineStage::NothingToExtract => (100, 100),
            PipelineStage::Failed => (0, 100),
        }
    }

    /// Map a fraction of this stage's work onto overall percent.
    pub fn scale(&self, fraction: f64) -> f64 {
        let (start, end) = self.progress_range();
        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        start as f64 + (end - start) as f64 * fraction
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
