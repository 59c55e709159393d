//! Ordered, monotonic run progress.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use kclip_models::PipelineStage;

/// One progress update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineProgress {
    pub stage: PipelineStage,
    /// Overall percent in `[0, 100]`
    pub percent: f64,
    pub message: String,
    /// When the update was emitted
    pub at: DateTime<Utc>,
}

/// Emits progress that never goes backwards.
///
/// Each stage owns a disjoint slice of `0..=100`; a fraction of the stage's
/// work is mapped into that slice. A value lower than the last one sent is
/// raised to it, so consumers see a non-decreasing sequence.
#[derive(Debug, Default)]
pub struct ProgressReporter {
    tx: Option<UnboundedSender<PipelineProgress>>,
    last_percent: f64,
}

impl ProgressReporter {
    pub fn new(tx: UnboundedSender<PipelineProgress>) -> Self {
        Self {
            tx: Some(tx),
            last_percent: 0.0,
        }
    }

    /// Reporter that only logs.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Report `fraction` of `stage`'s work as done.
    pub fn report(&mut self, stage: PipelineStage, fraction: f64, message: impl Into<String>) {
        let percent = stage.scale(fraction).max(self.last_percent);
        self.last_percent = percent;

        let update = PipelineProgress {
            stage,
            percent,
            message: message.into(),
            at: Utc::now(),
        };
        debug!(stage = %stage, percent, "{}", update.message);

        // A dropped receiver only means nobody is watching
        let closed = match &self.tx {
            Some(tx) => tx.send(update).is_err(),
            None => false,
        };
        if closed {
            self.tx = None;
        }
    }

    /// Report a stage as started.
    pub fn enter(&mut self, stage: PipelineStage, message: impl Into<String>) {
        self.report(stage, 0.0, message);
    }

    /// Report the final 100%.
    pub fn finish(&mut self, stage: PipelineStage, message: impl Into<String>) {
        let percent = 100.0;
        self.last_percent = percent;
        let update = PipelineProgress {
            stage,
            percent,
            message: message.into(),
            at: Utc::now(),
        };
        if let Some(tx) = &self.tx {
            let _ = tx.send(update);
        }
    }

    pub fn last_percent(&self) -> f64 {
        self.last_percent
    }
}
