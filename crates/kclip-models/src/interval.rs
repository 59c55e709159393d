//! Padded extraction windows.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// A time window of the source video to cut into one clip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MergedInterval {
    /// Start time in seconds (>= 0)
    pub start_time: f64,
    /// End time in seconds (> start_time)
    pub end_time: f64,
}

impl MergedInterval {
    /// Create a validated interval.
    pub fn new(start_time: f64, end_time: f64) -> ModelResult<Self> {
        let invalid = |reason: &str| ModelError::InvalidInterval {
            start_time,
            end_time,
            reason: reason.to_string(),
        };

        if !start_time.is_finite() || !end_time.is_finite() {
            return Err(invalid("bounds must be finite"));
        }
        if start_time < 0.0 {
            return Err(invalid("start must be non-negative"));
        }
        if end_time <= start_time {
            return Err(invalid("end must be after start"));
        }

        Ok(Self {
            start_time,
            end_time,
        })
    }

    /// Length of the window in seconds.
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }

    /// Whether a window starting at `start` should coalesce into this one.
    pub fn absorbs(&self, start: f64) -> bool {
        start <= self.end_time
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn test_interval_validation() {
        assert_ok!(MergedInterval::new(0.0, 1.0));
        assert_err!(MergedInterval::new(-0.5, 1.0));
        assert_err!(MergedInterval::new(2.0, 2.0));
        assert_err!(MergedInterval::new(0.0, f64::INFINITY));
    }

    #[test]
    fn test_duration_and_absorbs() {
        let interval = MergedInterval::new(3.0, 8.0).unwrap();
        assert!((interval.duration() - 5.0).abs() < 1e-9);
        assert!(interval.absorbs(8.0));
        assert!(interval.absorbs(6.0));
        assert!(!interval.absorbs(8.01));
    }
}
