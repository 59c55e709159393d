//! Pipeline orchestrator.
//!
//! Runs one pass from source video to joined output:
//!
//! ```text
//! Idle → Detecting → Clustering → Merging → Extracting → Concatenating → CleaningUp → Done
//!                                    └─→ NothingToExtract
//! ```
//!
//! Each stage checks that its predecessor's artifact exists before starting.
//! Any error moves the run to `Failed` and is returned tagged with the stage
//! it happened in.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use tokio::sync::mpsc::UnboundedSender;
use tracing::Instrument;

use kclip_media::{clip_paths, ClipConcatenator, ClipExtractor, FfmpegRunner};
use kclip_models::{ClipArtifact, FormattedIncident, MergedInterval, PipelineStage};

use crate::cleanup::{cleanup_targets, remove_intermediates};
use crate::clustering::incidents_from_detections;
use crate::config::{PipelineConfig, PipelinePaths};
use crate::detector::Detector;
use crate::documents::{read_detection_log, read_incidents, write_incidents};
use crate::error::{PipelineError, PipelineResult};
use crate::logging::RunLogger;
use crate::merge::merge;
use crate::progress::{PipelineProgress, ProgressReporter};

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Clips were cut and joined into `output`
    Completed {
        output: PathBuf,
        clips: Vec<ClipArtifact>,
        incidents: Vec<FormattedIncident>,
    },
    /// No incident survived filtering; nothing was extracted
    NothingToExtract,
}

impl PipelineOutcome {
    pub fn final_stage(&self) -> PipelineStage {
        match self {
            PipelineOutcome::Completed { .. } => PipelineStage::Done,
            PipelineOutcome::NothingToExtract => PipelineStage::NothingToExtract,
        }
    }
}

/// Sequences detection, clustering, merging, extraction, joining, and cleanup.
///
/// Runs sharing one output directory must not overlap.
pub struct Pipeline {
    config: PipelineConfig,
    detector: Arc<dyn Detector>,
    extractor: ClipExtractor,
    concatenator: ClipConcatenator,
    progress_tx: Option<UnboundedSender<PipelineProgress>>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, detector: Arc<dyn Detector>) -> Self {
        let runner = FfmpegRunner::new()
            .with_binary(&config.ffmpeg_binary)
            .with_timeout(config.tool_timeout);
        let extractor = ClipExtractor::new(runner.clone(), config.encoding.clone())
            .with_max_parallel(config.max_parallel_extractions);
        let concatenator = ClipConcatenator::new(runner, config.encoding.clone())
            .with_mode(config.concat_mode);

        Self {
            config,
            detector,
            extractor,
            concatenator,
            progress_tx: None,
        }
    }

    /// Send progress updates to `tx` as well as the log.
    pub fn with_progress(mut self, tx: UnboundedSender<PipelineProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one run over `paths`.
    pub async fn run(&self, paths: &PipelinePaths) -> PipelineResult<PipelineOutcome> {
        let logger = RunLogger::new("incident_clipping");
        let span = logger.create_span();
        let reporter = match &self.progress_tx {
            Some(tx) => ProgressReporter::new(tx.clone()),
            None => ProgressReporter::silent(),
        };

        async move {
            logger.log_start(&format!(
                "{} (profile {})",
                paths.source_video.display(),
                self.config.profile
            ));
            let mut run = RunState::new(logger, reporter);

            match self.execute(paths, &mut run).await {
                Ok(outcome) => {
                    metrics::counter!("kclip_runs_total", "outcome" => outcome.final_stage().as_str())
                        .increment(1);
                    Ok(outcome)
                }
                Err(e) => {
                    let e = e.at_stage(run.stage);
                    run.fail(&e);
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn execute(
        &self,
        paths: &PipelinePaths,
        run: &mut RunState,
    ) -> PipelineResult<PipelineOutcome> {
        let params = &self.config.params;

        run.advance(PipelineStage::Detecting, "running detector")?;
        require(&paths.source_video)?;
        self.detector
            .detect(&paths.source_video, &paths.detection_log)
            .await?;
        run.progress(1.0, format!("detector {} finished", self.detector.name()));

        run.advance(PipelineStage::Clustering, "clustering detections")?;
        require(&paths.detection_log)?;
        let events = read_detection_log(&paths.detection_log).await?;
        let detections = events.len();
        let incidents = incidents_from_detections(events, params)?;
        write_incidents(&paths.incidents, &incidents).await?;
        run.progress(
            1.0,
            format!("{} incidents from {} detections", incidents.len(), detections),
        );

        run.advance(PipelineStage::Merging, "merging incident windows")?;
        require(&paths.incidents)?;
        let incidents = read_incidents(&paths.incidents).await?;
        let intervals = merge(&incidents, params.pre_padding, params.post_padding)?;
        run.progress(1.0, format!("{} extraction windows", intervals.len()));

        if intervals.is_empty() {
            run.advance(PipelineStage::NothingToExtract, "no incidents survived filtering")?;
            run.logger.log_completion("nothing to extract");
            return Ok(PipelineOutcome::NothingToExtract);
        }

        run.advance(PipelineStage::Extracting, "cutting clips")?;
        require(&paths.source_video)?;
        let clips = self.extract(paths, &intervals, run).await?;

        run.advance(PipelineStage::Concatenating, "joining clips")?;
        self.concatenator
            .concatenate(&clip_paths(&clips), &paths.output)
            .await?;
        run.progress(1.0, format!("wrote {}", paths.output.display()));

        run.advance(PipelineStage::CleaningUp, "removing intermediates")?;
        let mut targets = cleanup_targets(paths, self.config.cleanup);
        targets.extend(self.detector.intermediates());
        let report = remove_intermediates(targets).await;
        for (path, reason) in &report.failed {
            run.logger
                .log_warning(&format!("could not remove {}: {}", path.display(), reason));
        }
        run.progress(1.0, format!("removed {} intermediates", report.removed.len()));

        run.advance(PipelineStage::Done, "done")?;
        run.logger.log_completion(&format!(
            "{} clips joined into {}",
            clips.len(),
            paths.output.display()
        ));

        Ok(PipelineOutcome::Completed {
            output: paths.output.clone(),
            clips,
            incidents,
        })
    }

    async fn extract(
        &self,
        paths: &PipelinePaths,
        intervals: &[MergedInterval],
        run: &mut RunState,
    ) -> PipelineResult<Vec<ClipArtifact>> {
        let mut clips = Vec::with_capacity(intervals.len());
        let steps = self
            .extractor
            .extract(&paths.source_video, intervals, &paths.clips_dir);
        futures::pin_mut!(steps);

        while let Some(step) = steps.next().await {
            let step = step?;
            run.progress(
                step.fraction(),
                format!("clip {}/{} ready", step.completed, step.total),
            );
            clips.push(step.clip);
        }

        clips.sort_by_key(|clip| clip.sequence_index);
        Ok(clips)
    }
}

fn require(path: &Path) -> PipelineResult<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(PipelineError::missing(path))
    }
}

/// Mutable state of one run.
struct RunState {
    stage: PipelineStage,
    entered: Instant,
    logger: RunLogger,
    reporter: ProgressReporter,
}

impl RunState {
    fn new(logger: RunLogger, reporter: ProgressReporter) -> Self {
        Self {
            stage: PipelineStage::Idle,
            entered: Instant::now(),
            logger,
            reporter,
        }
    }

    fn advance(&mut self, to: PipelineStage, message: &str) -> PipelineResult<()> {
        if !self.stage.can_transition_to(to) {
            return Err(PipelineError::Internal(format!(
                "illegal transition {} -> {}",
                self.stage, to
            )));
        }

        self.record_stage_duration();
        self.stage = to;
        self.entered = Instant::now();
        self.logger.log_stage(to, message);

        if to.is_terminal() {
            self.reporter.finish(to, message);
        } else {
            self.reporter.enter(to, message);
        }
        Ok(())
    }

    fn progress(&mut self, fraction: f64, message: String) {
        self.reporter.report(self.stage, fraction, message);
    }

    fn fail(&mut self, err: &PipelineError) {
        let failed_at = self.stage;
        self.record_stage_duration();
        self.logger.log_error(failed_at, &err.to_string());
        metrics::counter!("kclip_runs_total", "outcome" => PipelineStage::Failed.as_str())
            .increment(1);

        self.stage = PipelineStage::Failed;
        self.reporter
            .report(PipelineStage::Failed, 0.0, format!("{} failed: {}", failed_at, err.kind()));
    }

    fn record_stage_duration(&self) {
        if self.stage == PipelineStage::Idle {
            return;
        }
        metrics::histogram!("kclip_stage_duration_seconds", "stage" => self.stage.as_str())
            .record(self.entered.elapsed().as_secs_f64());
    }
}
