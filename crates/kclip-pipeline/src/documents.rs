//! Detection log and incident document persistence.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use kclip_models::{DetectionEvent, FormattedIncident};

use crate::error::{PipelineError, PipelineResult};

/// Read the detector's JSON array of detection events.
pub async fn read_detection_log(path: &Path) -> PipelineResult<Vec<DetectionEvent>> {
    read_json_array(path).await
}

/// Write a detection log (used by detector adapters and fixtures).
pub async fn write_detection_log(path: &Path, events: &[DetectionEvent]) -> PipelineResult<()> {
    write_json_pretty(path, events).await
}

/// Read a persisted incident list. Accepts the legacy `cluster_id` key.
pub async fn read_incidents(path: &Path) -> PipelineResult<Vec<FormattedIncident>> {
    read_json_array(path).await
}

/// Persist the incident list as a pretty-printed JSON array.
pub async fn write_incidents(path: &Path, incidents: &[FormattedIncident]) -> PipelineResult<()> {
    write_json_pretty(path, incidents).await
}

async fn read_json_array<T: DeserializeOwned>(path: &Path) -> PipelineResult<Vec<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(PipelineError::missing(path))
        }
        Err(e) => return Err(e.into()),
    };

    serde_json::from_slice(&bytes).map_err(|e| {
        PipelineError::malformed(format!("{}: {}", path.display(), e))
    })
}

async fn write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let body = serde_json::to_vec_pretty(value)
        .map_err(|e| PipelineError::Internal(format!("serialize {}: {}", path.display(), e)))?;
    tokio::fs::write(path, body).await?;
    debug!("Wrote {}", path.display());
    Ok(())
}
