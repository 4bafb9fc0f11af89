use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, Utc};
use tracing::{debug, error, info, info_span, warn};

use crate::aggregate::{AggregateError, AggregationResult, Aggregator};
use crate::broadcast::job_progress::JobPhase;
use crate::corpus::{CorpusSnapshot, CorpusSource};
use crate::db::job_repo::{self, CompletedJob};
use crate::db::{settings_repo, Database};
use crate::matcher::{self, search, InternetMatcher, WebSearch};
use crate::processor::ProcessorRegistry;
use crate::report::{ReportInput, ReportSynthesizer};
use crate::sanitize;
use crate::segment::Segmenter;
use crate::storage::{MediaStorage, StoredReport};
use crate::worker::job::{CheckJob, JobResult};

use super::config::PipelineConfig;
use super::context::PipelineContext;
use super::error::PipelineError;
use super::progress::{ProgressEvent, ProgressReporter};

pub const PROGRESS_EXTRACTED: u8 = 10;
pub const PROGRESS_SEGMENTED: u8 = 20;
pub const PROGRESS_MATCHED: u8 = 80;
pub const PROGRESS_REPORTED: u8 = 95;

/// Removes the job's temporary input when the run ends, including on panic.
struct TempInput {
    path: PathBuf,
}

impl Drop for TempInput {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %sanitize::redact_path(&self.path), "Removed temporary input"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                path = %sanitize::redact_path(&self.path),
                error = %e,
                "Failed to remove temporary input"
            ),
        }
    }
}

struct Outcome {
    aggregation: AggregationResult,
    report: StoredReport,
}

pub struct Pipeline {
    config: Arc<PipelineConfig>,
    db: Database,
    processor: ProcessorRegistry,
    segmenter: Segmenter,
    reports: ReportSynthesizer,
    search: Arc<dyn WebSearch>,
    corpus: Arc<dyn CorpusSource>,
}

impl Pipeline {
    /// Production constructor: the corpus comes from the database and the
    /// search provider from the config.
    pub fn from_config(config: Arc<PipelineConfig>, db: Database) -> Self {
        let search = search::from_config(&config.internet);
        Self::new(config, db, search)
    }

    pub fn new(config: Arc<PipelineConfig>, db: Database, search: Arc<dyn WebSearch>) -> Self {
        let segmenter = Segmenter::new(&config.language);
        let reports = ReportSynthesizer::new(MediaStorage::new(&config.media_root));

        Self {
            corpus: Arc::new(db.clone()),
            config,
            db,
            processor: ProcessorRegistry::new(),
            segmenter,
            reports,
            search,
        }
    }

    /// Replaces the web search provider.
    pub fn with_search(mut self, search: Arc<dyn WebSearch>) -> Self {
        self.search = search;
        self
    }

    /// Runs the full check for one admitted job.
    ///
    /// Every outcome is persisted on the history record; the returned
    /// result mirrors it. The temporary input is removed in all cases.
    pub fn run(&self, job: CheckJob, progress: &dyn ProgressReporter) -> JobResult {
        let filename = sanitize::redact_path(&job.input_path);
        let _pipeline_span = info_span!("pipeline",
            job_id = %job.id,
            user_id = %job.user_id,
            input = %filename,
            mode = %job.mode,
        )
        .entered();

        let _temp = TempInput {
            path: job.input_path.clone(),
        };

        let mut ctx = PipelineContext::new(job);
        match self.execute(&mut ctx, progress) {
            Ok(outcome) => {
                info!(
                    sentences = ctx.sentence_count,
                    pages = ?ctx.page_count,
                    similarity_global = outcome.aggregation.similarity_global,
                    report = %outcome.report.pointer,
                    "Check completed"
                );
                JobResult::success(&ctx.job, &outcome.aggregation, outcome.report.pointer)
            }
            Err(e) => self.fail(&ctx, e, progress),
        }
    }

    /// Records a panic that escaped [`Pipeline::run`] as a system failure.
    pub fn record_panic(&self, job: &CheckJob, message: &str, progress: &dyn ProgressReporter) -> JobResult {
        let ctx = PipelineContext::new(job.clone());
        let ctx = PipelineContext {
            progress: job_repo::find_by_id(&self.db, &job.id)
                .ok()
                .flatten()
                .map(|record| record.progress)
                .unwrap_or(0),
            ..ctx
        };
        self.fail(&ctx, PipelineError::Panicked(message.to_string()), progress)
    }

    fn execute(
        &self,
        ctx: &mut PipelineContext,
        progress: &dyn ProgressReporter,
    ) -> Result<Outcome, PipelineError> {
        if !job_repo::mark_processing(&self.db, &ctx.job.id, Utc::now())? {
            return Err(PipelineError::NotPending(ctx.job.id.clone()));
        }
        ctx.settings = settings_repo::get(&self.db)?;

        // Step 1: Extract text
        let text = {
            let _step = info_span!("extract").entered();
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Extracting,
                progress: 0,
                message: "Extracting text...".to_string(),
            });
            let extracted = self.processor.process(&ctx.job.input_path, ctx.job.format)?;
            ctx.page_count = extracted.page_count;
            extracted.text
        };
        self.checkpoint(ctx, PROGRESS_EXTRACTED, JobPhase::Segmenting, "Splitting sentences...", progress)?;

        // Step 2: Segment
        let sentences = {
            let _step = info_span!("segment").entered();
            let sentences = self.segmenter.segment(&text);
            if sentences.is_empty() {
                return Err(AggregateError::NoSentences.into());
            }
            ctx.sentence_count = sentences.len();
            sentences
        };
        self.checkpoint(ctx, PROGRESS_SEGMENTED, JobPhase::Matching, "Matching sentences...", progress)?;

        // Step 3: Match and aggregate
        let aggregation = {
            let _step = info_span!("aggregate", sentences = sentences.len()).entered();
            self.step_aggregate(ctx, &sentences, progress)?
        };
        self.checkpoint(ctx, PROGRESS_MATCHED, JobPhase::Reporting, "Generating report...", progress)?;

        // Step 4: Report
        let report = {
            let _step = info_span!("report").entered();
            self.reports.generate(&ReportInput {
                filename: &ctx.job.filename,
                checked_at: Local::now(),
                threshold: ctx.settings.threshold(),
                mode: ctx.job.mode,
                result: &aggregation,
            })?
        };
        if let Err(e) = self.checkpoint(ctx, PROGRESS_REPORTED, JobPhase::Reporting, "Saving results...", progress) {
            discard_report(&report.path);
            return Err(e);
        }

        // Step 5: Persist
        {
            let _step = info_span!("persist").entered();
            let completed = CompletedJob {
                similarity_global: aggregation.similarity_global,
                similarity_local: aggregation.similarity_local,
                similarity_internet: aggregation.similarity_internet,
                matched_sources: aggregation.sources.clone(),
                report_path: report.pointer.clone(),
            };
            match job_repo::mark_completed(&self.db, &ctx.job.id, &completed, Utc::now()) {
                Ok(true) => {}
                Ok(false) => {
                    discard_report(&report.path);
                    return Err(PipelineError::NotPending(ctx.job.id.clone()));
                }
                Err(e) => {
                    discard_report(&report.path);
                    return Err(e.into());
                }
            }
            ctx.progress = 100;
        }

        progress.report(ProgressEvent::Completed {
            similarity_global: aggregation.similarity_global,
            report_path: report.pointer.clone(),
        });

        Ok(Outcome {
            aggregation,
            report,
        })
    }

    fn step_aggregate(
        &self,
        ctx: &mut PipelineContext,
        sentences: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<AggregationResult, PipelineError> {
        let snapshot = if ctx.job.mode.includes_local() {
            CorpusSnapshot::load(self.corpus.as_ref(), &self.config.media_root)?
        } else {
            CorpusSnapshot::default()
        };
        let local = matcher::local_matcher(self.config.local_strategy, &snapshot)?;
        let internet = InternetMatcher::new(
            Arc::clone(&self.search),
            self.config.internet.max_results,
            self.config.request_delay(),
        );
        let aggregator = Aggregator::new(local.as_ref(), &internet, ctx.settings.threshold());

        let job_id = ctx.job.id.clone();
        let mut reached = ctx.progress;
        let result = aggregator.aggregate(sentences, ctx.job.mode, &mut |done, total| {
            let span = usize::from(PROGRESS_MATCHED - PROGRESS_SEGMENTED);
            let value = PROGRESS_SEGMENTED + (span * done / total.max(1)) as u8;
            // The matched checkpoint is written after aggregation returns.
            if value <= reached || value >= PROGRESS_MATCHED {
                return;
            }
            reached = value;
            if let Err(e) = job_repo::update_progress(&self.db, &job_id, value) {
                warn!(error = %e, "Failed to persist sentence progress");
            }
            progress.report(ProgressEvent::Phase {
                phase: JobPhase::Matching,
                progress: value,
                message: format!("Matched {} of {} sentences", done, total),
            });
        })?;
        ctx.progress = reached;

        Ok(result)
    }

    /// Persists a progress checkpoint before the next stage begins.
    fn checkpoint(
        &self,
        ctx: &mut PipelineContext,
        value: u8,
        next: JobPhase,
        message: &str,
        progress: &dyn ProgressReporter,
    ) -> Result<(), PipelineError> {
        job_repo::update_progress(&self.db, &ctx.job.id, value)?;
        ctx.progress = ctx.progress.max(value);
        progress.report(ProgressEvent::Phase {
            phase: next,
            progress: ctx.progress,
            message: message.to_string(),
        });
        Ok(())
    }

    fn fail(&self, ctx: &PipelineContext, err: PipelineError, progress: &dyn ProgressReporter) -> JobResult {
        let message = err.stored_message();

        if err.is_user_facing() {
            warn!(job_id = %ctx.job.id, error = %err, "Check rejected");
        } else {
            error!(job_id = %ctx.job.id, error = %err, details = ?err, "Check failed");
        }

        // A job that was never ours to run keeps its record as is.
        if !matches!(err, PipelineError::NotPending(_)) {
            if let Err(e) = job_repo::mark_failed(&self.db, &ctx.job.id, &message, Utc::now()) {
                error!(job_id = %ctx.job.id, error = %e, "Failed to record job failure");
            }
        }

        progress.report(ProgressEvent::Failed {
            progress: ctx.progress,
            error: message.clone(),
        });

        JobResult::failure(&ctx.job, message)
    }
}

fn discard_report(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        warn!(path = %sanitize::redact_path(path), error = %e, "Failed to remove orphaned report");
    }
}
