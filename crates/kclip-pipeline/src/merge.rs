//! Padding and coalescing of incidents into extraction windows.

use kclip_models::{FormattedIncident, MergedInterval, ModelError};

use crate::error::{PipelineError, PipelineResult};

/// Shortest window ever produced, in seconds.
pub const MIN_CLIP_DURATION_SECS: f64 = 0.001;

/// Pad each incident and coalesce overlapping windows.
///
/// Incident `[s, e]` becomes `[max(0, s - pre), e + post]`. A window that
/// starts at or before the end of the previous one extends it to the later
/// of the two ends. Output is sorted and non-overlapping.
pub fn merge(
    incidents: &[FormattedIncident],
    pre_padding: f64,
    post_padding: f64,
) -> PipelineResult<Vec<MergedInterval>> {
    for (name, value) in [("pre_padding", pre_padding), ("post_padding", post_padding)] {
        if !value.is_finite() || value < 0.0 {
            return Err(ModelError::invalid_parameter(name, format!("must be >= 0, got {}", value)).into());
        }
    }

    let mut windows = Vec::with_capacity(incidents.len());
    for incident in incidents {
        let (start, end) = (incident.start_timestamp, incident.end_timestamp);
        if !start.is_finite() || !end.is_finite() || start < 0.0 || end < start {
            return Err(PipelineError::malformed(format!(
                "incident {} spans [{}, {}]",
                incident.id, start, end
            )));
        }
        windows.push(((start - pre_padding).max(0.0), end + post_padding));
    }

    coalesce(windows)
}

/// Coalesce already-padded intervals. Idempotent on its own output.
pub fn merge_intervals(intervals: &[MergedInterval]) -> PipelineResult<Vec<MergedInterval>> {
    coalesce(intervals.iter().map(|i| (i.start_time, i.end_time)).collect())
}

fn coalesce(mut windows: Vec<(f64, f64)>) -> PipelineResult<Vec<MergedInterval>> {
    // Stable: ordered input keeps its order
    windows.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut merged: Vec<MergedInterval> = Vec::with_capacity(windows.len());
    for (start, end) in windows {
        let end = if end > start { end } else { start + MIN_CLIP_DURATION_SECS };

        match merged.last_mut() {
            Some(last) if last.absorbs(start) => last.end_time = last.end_time.max(end),
            _ => merged.push(MergedInterval::new(start, end)?),
        }
    }

    Ok(merged)
}
