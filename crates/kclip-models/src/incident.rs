//! Incident clusters and their formatted projections.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::detection::DetectionEvent;

/// A non-empty, ordered run of detections forming one candidate incident.
#[derive(Debug, Clone, PartialEq)]
pub struct IncidentCluster {
    events: Vec<DetectionEvent>,
}

impl IncidentCluster {
    /// Open a cluster with its first member.
    pub fn new(first: DetectionEvent) -> Self {
        Self {
            events: vec![first],
        }
    }

    /// Build a cluster from an existing run. Returns `None` for an empty run.
    pub fn from_events(events: Vec<DetectionEvent>) -> Option<Self> {
        if events.is_empty() {
            None
        } else {
            Some(Self { events })
        }
    }

    /// Append a member at the end of the run.
    pub fn push(&mut self, event: DetectionEvent) {
        self.events.push(event);
    }

    /// First member.
    pub fn first(&self) -> &DetectionEvent {
        &self.events[0]
    }

    /// Most recently placed member.
    pub fn last(&self) -> &DetectionEvent {
        &self.events[self.events.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Never true for a constructed cluster.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[DetectionEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<DetectionEvent> {
        self.events
    }
}

/// A surviving cluster projected into a stable, persisted incident record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormattedIncident {
    /// 1-based id in assignment order
    #[serde(alias = "cluster_id")]
    pub id: u32,
    /// Frame of the first detection
    pub start_frame: u64,
    /// Frame of the last detection
    pub end_frame: u64,
    /// Timestamp of the first detection (seconds)
    pub start_timestamp: f64,
    /// Timestamp of the last detection (seconds)
    pub end_timestamp: f64,
    /// Member detections in order
    pub detections: Vec<DetectionEvent>,
}

impl FormattedIncident {
    /// Project a cluster into an incident with the given id.
    pub fn from_cluster(id: u32, cluster: &IncidentCluster) -> Self {
        let first = cluster.first();
        let last = cluster.last();
        Self {
            id,
            start_frame: first.frame,
            end_frame: last.frame,
            start_timestamp: first.timestamp,
            end_timestamp: last.timestamp,
            detections: cluster.events().to_vec(),
        }
    }

    /// Span covered by the detections, in seconds.
    pub fn span_secs(&self) -> f64 {
        self.end_timestamp - self.start_timestamp
    }
}
