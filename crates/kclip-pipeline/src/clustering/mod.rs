//! Detection clustering: group, filter, and number incidents.

use tracing::debug;

use kclip_models::{ClusteringParams, DetectionEvent, FormattedIncident};

use crate::error::PipelineResult;

pub mod cluster;
pub mod filter;
pub mod format;

pub use cluster::cluster_events;
pub use filter::filter_clusters;
pub use format::format_clusters;

/// Run clustering, filtering, and formatting over a detection log.
pub fn incidents_from_detections(
    events: Vec<DetectionEvent>,
    params: &ClusteringParams,
) -> PipelineResult<Vec<FormattedIncident>> {
    params.validate()?;

    let detections = events.len();
    let clusters = cluster_events(events, params.time_threshold, params.frame_gap)?;
    let candidates = clusters.len();
    let kept = filter_clusters(clusters, params.min_cluster_len)?;

    debug!(
        detections,
        candidates,
        kept = kept.len(),
        "Clustered detections into incidents"
    );

    Ok(format_clusters(&kept))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn knockdowns(points: &[(u64, f64)]) -> Vec<DetectionEvent> {
        points
            .iter()
            .map(|&(frame, ts)| DetectionEvent::new(frame, ts, "knockdown", 0.9, [0, 0, 8, 8]))
            .collect()
    }

    #[test]
    fn test_short_incident_dropped() {
        let events = knockdowns(&[(1, 0.1), (10, 1.0), (19, 1.9), (100, 10.0)]);
        let params = ClusteringParams::default().with_frame_gap(10);

        let incidents = incidents_from_detections(events, &params).unwrap();

        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].id, 1);
        assert_eq!(incidents[0].start_timestamp, 0.1);
        assert_eq!(incidents[0].end_timestamp, 1.9);
        assert_eq!(incidents[0].detections.len(), 3);
    }

    #[test]
    fn test_literal_frame_gap_leaves_nothing() {
        let events = knockdowns(&[(1, 0.1), (10, 1.0), (19, 1.9), (100, 10.0)]);
        let incidents = incidents_from_detections(events, &ClusteringParams::default()).unwrap();
        assert!(incidents.is_empty());
    }

    #[test]
    fn test_invalid_params_rejected_up_front() {
        let params = ClusteringParams::default().with_padding(-1.0, 2.0);
        assert!(incidents_from_detections(Vec::new(), &params).is_err());
    }
}
