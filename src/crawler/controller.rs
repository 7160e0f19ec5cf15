//! Run controller - end-to-end orchestration of one semester's crawl
//!
//! This module ties the components together:
//! - Acquiring the session and opening the catalog walk
//! - Fetching and extracting course-detail pages in concurrent batches
//! - Feeding records and failures into the aggregator
//! - Progress reporting and the external stop signal

use crate::config::Config;
use crate::crawler::aggregator::Aggregator;
use crate::crawler::extractor::RecordExtractor;
use crate::crawler::fetcher::{FetchErrorKind, PageFetcher, RequestSpec};
use crate::crawler::parser::CatalogSelectors;
use crate::crawler::session::{SessionError, SessionHandle, SessionManager};
use crate::crawler::walker::{CatalogWalker, PageReference};
use crate::model::{CourseRecord, FailureStage, PageFailure, Progress, RunResult, Semester};
use crate::state::VisitedSet;
use crate::HarvestError;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;
use url::Url;

/// Callback receiving progress notifications
pub type ProgressCallback = Arc<dyn Fn(Progress) + Send + Sync>;

/// Request to halt a run after its in-flight batch
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one course-detail page
enum DetailOutcome {
    Record(CourseRecord),
    Failed(PageFailure),
}

/// Drives one crawl per call to [`RunController::run_for`]
pub struct RunController {
    config: Arc<Config>,
    progress: Option<ProgressCallback>,
    stop: StopSignal,
}

impl RunController {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            progress: None,
            stop: StopSignal::new(),
        }
    }

    pub fn with_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(Progress) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    /// Handle to stop running and future runs of this controller
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Crawls `semester` and returns its de-duplicated records
    ///
    /// Per-page problems end up in `RunResult::failures`. Only a session that
    /// cannot be established or renewed fails the run.
    pub async fn run_for(&self, semester: Semester) -> Result<RunResult, HarvestError> {
        let start_time = Instant::now();
        tracing::info!("Starting run for {}", semester);

        let selectors = CatalogSelectors::compile(&self.config.selectors)?;
        let extractor = Arc::new(RecordExtractor::new(&self.config.selectors, semester)?);
        let fetcher = Arc::new(PageFetcher::new(&self.config.fetch, &self.config.portal));

        let manager = SessionManager::new(self.config.clone());
        let sessions = Arc::new(SessionHandle::open(manager, semester).await?);

        let root = sessions.current().await;
        let mut walker = CatalogWalker::new(
            sessions.clone(),
            fetcher.clone(),
            selectors,
            semester,
            VisitedSet::new(),
            root.catalog_url().clone(),
            &root.page_key(root.catalog_url()),
        );
        drop(root);

        let aggregator = Aggregator::new(semester);
        let details_done = AtomicU64::new(0);
        let batch_size = self.config.fetch.concurrency.max(1) as usize;
        let mut stopped = false;

        loop {
            if self.stop.is_stopped() {
                tracing::info!("Stop requested; ending run after the current batch");
                stopped = true;
                break;
            }

            sessions.ensure_valid().await?;

            let mut batch = Vec::with_capacity(batch_size);
            while batch.len() < batch_size {
                match walker.next_page().await? {
                    Some(reference) => batch.push(reference),
                    None => break,
                }
            }
            for failure in walker.take_failures() {
                aggregator.record_failure(failure);
            }
            if batch.is_empty() {
                break;
            }

            let pending: BTreeMap<u64, Url> =
                batch.iter().map(|r| (r.seq, r.url.clone())).collect();
            let mut tasks = JoinSet::new();
            for reference in batch {
                tasks.spawn(process_detail(
                    sessions.clone(),
                    fetcher.clone(),
                    extractor.clone(),
                    self.config.selectors.detail_marker.clone(),
                    reference,
                ));
            }

            for (seq, outcome) in join_batch(tasks, pending).await? {
                match outcome {
                    DetailOutcome::Record(record) => {
                        tracing::debug!("Extracted '{}'", record.title);
                        aggregator.add_record(seq, record);
                    }
                    DetailOutcome::Failed(failure) => aggregator.record_failure(failure),
                }
                let done = details_done.fetch_add(1, Ordering::SeqCst) + 1;
                self.report(Progress {
                    pages_visited: walker.lists_visited() + done,
                    total_known: Some(walker.lists_visited() + walker.discovered()),
                });
            }
        }

        let pages_visited = walker.lists_visited() + details_done.load(Ordering::SeqCst);
        let result = aggregator.finalize(pages_visited, stopped);

        if result.is_usable() {
            tracing::info!(
                "Run for {} finished: {} records, {} pages, {} failures in {:?}",
                semester,
                result.records.len(),
                result.pages_visited,
                result.failure_count(),
                start_time.elapsed()
            );
        } else {
            tracing::warn!(
                "Run for {} produced no records ({} pages, {} failures)",
                semester,
                result.pages_visited,
                result.failure_count()
            );
        }

        Ok(result)
    }

    fn report(&self, progress: Progress) {
        if let Some(callback) = &self.progress {
            callback(progress);
        }
    }
}

/// Fetches and extracts one course-detail page
async fn process_detail(
    sessions: Arc<SessionHandle>,
    fetcher: Arc<PageFetcher>,
    extractor: Arc<RecordExtractor>,
    detail_marker: String,
    reference: PageReference,
) -> Result<(u64, DetailOutcome), SessionError> {
    let spec = RequestSpec::get(reference.url.clone()).expecting(detail_marker);

    let page = loop {
        let session = sessions.current().await;
        match fetcher.fetch(&session, &spec).await {
            Ok(page) => {
                session.touch();
                break page;
            }
            Err(e) if e.kind == FetchErrorKind::SessionExpired => {
                session.revoke();
                sessions.renew_if_stale(session.generation()).await?;
            }
            Err(e) => {
                let failure = PageFailure::new(reference.url.as_str(), FailureStage::Detail, &e);
                return Ok((reference.seq, DetailOutcome::Failed(failure)));
            }
        }
    };

    let outcome = match extractor.extract(&page) {
        Ok(record) => DetailOutcome::Record(record),
        Err(e) => DetailOutcome::Failed(PageFailure::new(
            reference.url.as_str(),
            FailureStage::Extraction,
            &e.kind,
        )),
    };
    Ok((reference.seq, outcome))
}

type DetailTask = Result<(u64, DetailOutcome), SessionError>;

/// Waits for a batch of detail tasks; outcomes come back sorted by `seq`
///
/// `pending` maps every spawned task's sequence number to its URL. A task
/// that panicked or was cancelled becomes a detail failure for its URL.
async fn join_batch(
    mut tasks: JoinSet<DetailTask>,
    mut pending: BTreeMap<u64, Url>,
) -> Result<Vec<(u64, DetailOutcome)>, SessionError> {
    let mut outcomes = Vec::with_capacity(pending.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => {
                let (seq, outcome) = outcome?;
                pending.remove(&seq);
                outcomes.push((seq, outcome));
            }
            Err(e) => tracing::error!("Detail task failed: {}", e),
        }
    }

    for (seq, url) in pending {
        let failure = PageFailure::new(
            url.as_str(),
            FailureStage::Detail,
            "detail task did not complete",
        );
        outcomes.push((seq, DetailOutcome::Failed(failure)));
    }

    outcomes.sort_by_key(|(seq, _)| *seq);
    Ok(outcomes)
}

/// Crawls `semester` with a controller built from `config`
pub async fn run_for(semester: Semester, config: &Config) -> Result<RunResult, HarvestError> {
    RunController::new(config.clone()).run_for(semester).await
}
