//! Projection of clusters into incident records.

use kclip_models::{FormattedIncident, IncidentCluster};

/// Number clusters from 1 in input order.
pub fn format_clusters(clusters: &[IncidentCluster]) -> Vec<FormattedIncident> {
    clusters
        .iter()
        .zip(1u32..)
        .map(|(cluster, id)| FormattedIncident::from_cluster(id, cluster))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kclip_models::DetectionEvent;

    #[test]
    fn test_ids_and_bounds() {
        let clusters: Vec<_> = [(1u64, 0.1f64), (50, 5.0)]
            .iter()
            .map(|&(frame, ts)| {
                IncidentCluster::from_events(vec![
                    DetectionEvent::new(frame, ts, "knockdown", 0.9, [0, 0, 1, 1]),
                    DetectionEvent::new(frame + 2, ts + 0.4, "knockdown", 0.6, [0, 0, 1, 1]),
                ])
                .unwrap()
            })
            .collect();

        let incidents = format_clusters(&clusters);
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].id, 1);
        assert_eq!(incidents[1].id, 2);
        assert_eq!(incidents[1].start_frame, 50);
        assert_eq!(incidents[1].end_frame, 52);
        assert!((incidents[1].end_timestamp - 5.4).abs() < 1e-9);
    }

    #[test]
    fn test_empty() {
        assert!(format_clusters(&[]).is_empty());
    }
}
