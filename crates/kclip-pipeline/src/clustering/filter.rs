//! Evidence filter for incident clusters.

use kclip_models::{IncidentCluster, ModelError};

use crate::error::PipelineResult;

/// Keep clusters with at least `min_len` detections, in order.
pub fn filter_clusters(
    clusters: Vec<IncidentCluster>,
    min_len: usize,
) -> PipelineResult<Vec<IncidentCluster>> {
    if min_len == 0 {
        return Err(ModelError::invalid_parameter("min_cluster_len", "must be >= 1").into());
    }

    Ok(clusters
        .into_iter()
        .filter(|cluster| cluster.len() >= min_len)
        .collect())
}
