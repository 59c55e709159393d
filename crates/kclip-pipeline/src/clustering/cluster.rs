//! Temporal clustering of detections.

use kclip_models::{validate_detections, DetectionEvent, IncidentCluster, ModelError};

use crate::error::PipelineResult;

/// Group ordered detections into incident clusters.
///
/// Each event is compared with the last member of the open cluster, not the
/// first, so a steady run of detections keeps extending one incident past the
/// nominal threshold. An event joins when both
/// `timestamp_delta <= time_threshold` and `frame_delta <= frame_gap` hold;
/// otherwise the open cluster is closed and a new one started.
///
/// Concatenating the returned clusters reproduces `events` exactly.
pub fn cluster_events(
    events: Vec<DetectionEvent>,
    time_threshold: f64,
    frame_gap: u64,
) -> PipelineResult<Vec<IncidentCluster>> {
    if !time_threshold.is_finite() || time_threshold <= 0.0 {
        return Err(ModelError::invalid_parameter(
            "time_threshold",
            format!("must be > 0, got {}", time_threshold),
        )
        .into());
    }
    if frame_gap == 0 {
        return Err(ModelError::invalid_parameter("frame_gap", "must be > 0").into());
    }
    validate_detections(&events)?;

    let mut clusters = Vec::new();
    let mut open: Option<IncidentCluster> = None;

    for event in events {
        open = match open.take() {
            Some(mut cluster) if belongs(cluster.last(), &event, time_threshold, frame_gap) => {
                cluster.push(event);
                Some(cluster)
            }
            Some(closed) => {
                clusters.push(closed);
                Some(IncidentCluster::new(event))
            }
            None => Some(IncidentCluster::new(event)),
        };
    }
    clusters.extend(open);

    Ok(clusters)
}

fn belongs(last: &DetectionEvent, event: &DetectionEvent, time_threshold: f64, frame_gap: u64) -> bool {
    event.seconds_since(last) <= time_threshold && event.frames_since(last) <= frame_gap
}
