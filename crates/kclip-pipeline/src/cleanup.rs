//! Best-effort removal of intermediate artifacts.

use std::path::PathBuf;

use tracing::warn;

use kclip_media::{remove_path_best_effort, Removal};

use crate::config::{CleanupPolicy, PipelinePaths};

/// What a cleanup pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    /// Targets that were already gone
    pub absent: Vec<PathBuf>,
    /// Targets that could not be removed, with the reason
    pub failed: Vec<(PathBuf, String)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Intermediates a successful run leaves behind.
pub fn cleanup_targets(paths: &PipelinePaths, policy: CleanupPolicy) -> Vec<PathBuf> {
    let mut targets = vec![
        paths.reduced_video.clone(),
        paths.detection_log.clone(),
        paths.crops_dir.clone(),
    ];
    if policy.remove_incidents {
        targets.push(paths.incidents.clone());
    }
    if policy.remove_clips {
        targets.push(paths.clips_dir.clone());
    }
    targets
}

/// Remove every target. Never fails; problems are logged and reported.
pub async fn remove_intermediates<I>(targets: I) -> CleanupReport
where
    I: IntoIterator<Item = PathBuf>,
{
    let mut report = CleanupReport::default();

    for target in targets {
        match remove_path_best_effort(&target).await {
            Ok(Removal::Removed) => report.removed.push(target),
            Ok(Removal::Absent) => report.absent.push(target),
            Err(e) => {
                warn!("Failed to remove {}: {}", target.display(), e);
                report.failed.push((target, e.to_string()));
            }
        }
    }

    report
}
