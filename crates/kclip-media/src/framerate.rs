//! Frame-rate reduction ahead of detection.

use std::path::Path;

use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_dir, PartialOutputGuard};

/// Resample `input` to `fps` frames per second into `output`.
pub async fn reduce_frame_rate(
    runner: &FfmpegRunner,
    input: &Path,
    output: &Path,
    fps: u32,
) -> MediaResult<()> {
    if fps == 0 {
        return Err(MediaError::invalid_input("frame rate must be positive"));
    }
    if !input.is_file() {
        return Err(MediaError::FileNotFound(input.to_path_buf()));
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent).await?;
    }

    info!("Reducing {} to {} fps", input.display(), fps);

    let guard = PartialOutputGuard::new(output);
    let cmd = FfmpegCommand::new(input, output).frame_rate(fps);
    runner.run(&cmd).await?;
    guard.disarm();

    Ok(())
}
