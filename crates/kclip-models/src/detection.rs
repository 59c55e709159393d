//! Detection events produced by the external detector.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Bounding box as `[x1, y1, x2, y2]` pixel coordinates.
pub type BoundingBox = [i32; 4];

/// One object detection reported by the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionEvent {
    /// Frame index in the analysed video
    pub frame: u64,
    /// Presentation time in seconds
    pub timestamp: f64,
    /// Class label reported by the model
    pub label: String,
    /// Model confidence (0.0-1.0)
    pub confidence: f64,
    /// Detection box
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
}

impl DetectionEvent {
    /// Create a detection event.
    pub fn new(
        frame: u64,
        timestamp: f64,
        label: impl Into<String>,
        confidence: f64,
        bbox: BoundingBox,
    ) -> Self {
        Self {
            frame,
            timestamp,
            label: label.into(),
            confidence,
            bbox,
        }
    }

    /// Seconds elapsed since `earlier`.
    pub fn seconds_since(&self, earlier: &DetectionEvent) -> f64 {
        self.timestamp - earlier.timestamp
    }

    /// Frames elapsed since `earlier` (zero if `earlier` is ahead).
    pub fn frames_since(&self, earlier: &DetectionEvent) -> u64 {
        self.frame.saturating_sub(earlier.frame)
    }
}

/// Validate shape and ordering of a detection log.
///
/// Each event must carry a finite, non-negative timestamp and a confidence
/// in `[0, 1]`, and the sequence must be non-decreasing in both frame and
/// timestamp.
pub fn validate_detections(events: &[DetectionEvent]) -> ModelResult<()> {
    for (index, event) in events.iter().enumerate() {
        if !event.timestamp.is_finite() || event.timestamp < 0.0 {
            return Err(ModelError::malformed(
                index,
                format!("timestamp {} is not a non-negative number", event.timestamp),
            ));
        }
        if !(0.0..=1.0).contains(&event.confidence) {
            return Err(ModelError::malformed(
                index,
                format!("confidence {} outside [0, 1]", event.confidence),
            ));
        }
        if index == 0 {
            continue;
        }

        let prev = &events[index - 1];
        if event.frame < prev.frame {
            return Err(ModelError::malformed(
                index,
                format!("frame {} precedes frame {}", event.frame, prev.frame),
            ));
        }
        if event.timestamp < prev.timestamp {
            return Err(ModelError::malformed(
                index,
                format!(
                    "timestamp {:.3}s precedes {:.3}s",
                    event.timestamp, prev.timestamp
                ),
            ));
        }
    }

    Ok(())
}
