mod expand;
mod types;

pub use types::{Action, Job, JobDetail, LeafRecord, Pipeline, Step, Workflow, WorkflowInfo};

use log::{debug, info};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::client::{ApiRoutes, CircleCiClient, Paginator};
use crate::config::CrawlConfig;
use crate::error::{CiStreamError, Result};
use crate::progress::{Level, ProgressObserver};
use crate::sink::RecordSink;

/// Item counts for one finished (or aborted) crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlReport {
    pub pipelines: usize,
    pub workflows: usize,
    pub jobs: usize,
    pub skipped_jobs: usize,
    pub records: usize,
}

#[derive(Default)]
struct Counters {
    pipelines: AtomicUsize,
    workflows: AtomicUsize,
    jobs: AtomicUsize,
    skipped_jobs: AtomicUsize,
    records: AtomicUsize,
}

impl Counters {
    fn report(&self) -> CrawlReport {
        CrawlReport {
            pipelines: self.pipelines.load(Ordering::Relaxed),
            workflows: self.workflows.load(Ordering::Relaxed),
            jobs: self.jobs.load(Ordering::Relaxed),
            skipped_jobs: self.skipped_jobs.load(Ordering::Relaxed),
            records: self.records.load(Ordering::Relaxed),
        }
    }
}

/// The streaming fan-out/flatten pipeline.
///
/// Four stages chained by bounded channels: pipeline pagination, workflow
/// expansion, job pagination, and job-detail flattening into leaf records,
/// which a final driver hands to the sink one at a time. Each fan-out stage
/// runs at most `concurrency` expansions at once; ordering is preserved
/// within one parent's children and nowhere else.
pub struct Crawler {
    client: Arc<CircleCiClient>,
    routes: ApiRoutes,
    config: CrawlConfig,
    progress: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new(
        client: Arc<CircleCiClient>,
        routes: ApiRoutes,
        config: CrawlConfig,
        progress: Arc<dyn ProgressObserver>,
    ) -> Self {
        Self {
            client,
            routes,
            config,
            progress,
            cancel: CancellationToken::new(),
        }
    }

    /// Token cancelling the whole crawl; used to wire up signal handling.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the crawl to completion, writing every leaf record to `sink`.
    ///
    /// `limit` bounds the number of top-level pipelines; `None` is
    /// unbounded. Any hard error cancels all stages and is returned; an
    /// externally cancelled crawl returns `Interrupted`.
    pub async fn run(
        &self,
        limit: Option<usize>,
        sink: Box<dyn RecordSink + Send>,
    ) -> Result<CrawlReport> {
        let capacity = self.config.channel_capacity.max(1);
        let concurrency = self.config.concurrency.max(1);
        let counters = Arc::new(Counters::default());

        let (pipeline_tx, pipeline_rx) = mpsc::channel::<Pipeline>(capacity);
        let (workflow_tx, workflow_rx) = mpsc::channel::<Workflow>(capacity);
        let (job_tx, job_rx) = mpsc::channel::<Job>(capacity);
        let (record_tx, record_rx) = mpsc::channel::<LeafRecord>(capacity);

        let mut drivers: JoinSet<Result<()>> = JoinSet::new();

        // Stage 0: paginate pipelines.
        {
            let client = Arc::clone(&self.client);
            let url = self.routes.pipelines()?;
            let cancel = self.cancel.clone();
            let progress = Arc::clone(&self.progress);
            let counters = Arc::clone(&counters);
            drivers.spawn(async move {
                let mut paginator: Paginator<Pipeline> = Paginator::new(client, url, limit);
                loop {
                    let next = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(CiStreamError::Interrupted),
                        next = paginator.next_item() => next,
                    };
                    match next {
                        Ok(Some(pipeline)) => {
                            progress.increment(Level::Pipelines);
                            counters.pipelines.fetch_add(1, Ordering::Relaxed);
                            if pipeline_tx.send(pipeline).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            cancel.cancel();
                            return Err(e);
                        }
                    }
                }
                Ok(())
            });
        }

        // Stage 1: pipeline -> workflows (one-shot fetch per pipeline).
        {
            let client = Arc::clone(&self.client);
            let routes = self.routes.clone();
            let progress = Arc::clone(&self.progress);
            let counters = Arc::clone(&counters);
            let expand_workflows = move |pipeline: Pipeline| {
                let client = Arc::clone(&client);
                let routes = routes.clone();
                let progress = Arc::clone(&progress);
                let counters = Arc::clone(&counters);
                let tx = workflow_tx.clone();
                async move {
                    let workflows = expand::fetch_workflows(&client, &routes, &pipeline).await?;
                    for workflow in workflows {
                        progress.increment(Level::Workflows);
                        counters.workflows.fetch_add(1, Ordering::Relaxed);
                        if tx.send(workflow).await.is_err() {
                            break;
                        }
                    }
                    Ok(())
                }
            };
            drivers.spawn(fan_out(
                pipeline_rx,
                concurrency,
                self.cancel.clone(),
                expand_workflows,
            ));
        }

        // Stage 2: workflow -> jobs (unbounded pagination per workflow).
        {
            let client = Arc::clone(&self.client);
            let routes = self.routes.clone();
            let progress = Arc::clone(&self.progress);
            let counters = Arc::clone(&counters);
            let expand_jobs = move |workflow: Workflow| {
                let client = Arc::clone(&client);
                let routes = routes.clone();
                let progress = Arc::clone(&progress);
                let counters = Arc::clone(&counters);
                let tx = job_tx.clone();
                async move {
                    let url = routes.jobs(&workflow.id)?;
                    let mut paginator: Paginator<Job> = Paginator::new(client, url, None);
                    while let Some(job) = paginator.next_item().await? {
                        progress.increment(Level::Jobs);
                        counters.jobs.fetch_add(1, Ordering::Relaxed);
                        if tx.send(job).await.is_err() {
                            break;
                        }
                    }
                    Ok(())
                }
            };
            drivers.spawn(fan_out(
                workflow_rx,
                concurrency,
                self.cancel.clone(),
                expand_jobs,
            ));
        }

        // Stage 3+4: job -> detail -> leaf records.
        {
            let client = Arc::clone(&self.client);
            let routes = self.routes.clone();
            let counters = Arc::clone(&counters);
            let expand_records = move |job: Job| {
                let client = Arc::clone(&client);
                let routes = routes.clone();
                let counters = Arc::clone(&counters);
                let tx = record_tx.clone();
                async move {
                    match expand::fetch_job_detail(&client, &routes, &job).await? {
                        None => {
                            counters.skipped_jobs.fetch_add(1, Ordering::Relaxed);
                        }
                        Some(detail) => {
                            for record in expand::flatten_detail(&detail) {
                                if tx.send(record).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Ok(())
                }
            };
            drivers.spawn(fan_out(
                job_rx,
                concurrency,
                self.cancel.clone(),
                expand_records,
            ));
        }

        // Sink driver: the only writer, one record at a time.
        {
            let cancel = self.cancel.clone();
            let counters = Arc::clone(&counters);
            drivers.spawn(async move {
                let mut sink = sink;
                let mut record_rx = record_rx;
                loop {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(CiStreamError::Interrupted),
                        next = record_rx.recv() => match next {
                            Some(record) => {
                                if let Err(e) = sink.write(&record) {
                                    cancel.cancel();
                                    return Err(e);
                                }
                                counters.records.fetch_add(1, Ordering::Relaxed);
                            }
                            None => break,
                        }
                    }
                }
                sink.flush()?;
                Ok(())
            });
        }

        let mut first_error: Option<CiStreamError> = None;
        let mut interrupted = false;
        while let Some(joined) = drivers.join_next().await {
            match flatten_join(joined) {
                Ok(()) => {}
                Err(CiStreamError::Interrupted) => interrupted = true,
                Err(e) => {
                    self.cancel.cancel();
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }
        if interrupted || self.cancel.is_cancelled() {
            return Err(CiStreamError::Interrupted);
        }

        let report = counters.report();
        info!(
            "Crawl finished: {} pipelines, {} workflows, {} jobs ({} skipped), {} records",
            report.pipelines, report.workflows, report.jobs, report.skipped_jobs, report.records
        );
        Ok(report)
    }
}

/// Bounded fan-out dispatcher for one stage.
///
/// Pulls parent items from `rx`, takes a semaphore permit, and spawns the
/// expansion; results from concurrent expansions interleave downstream.
/// The first expansion error cancels the token and wins; observing an
/// already-cancelled token returns `Interrupted`.
async fn fan_out<I, F, Fut>(
    rx: mpsc::Receiver<I>,
    concurrency: usize,
    cancel: CancellationToken,
    expand: F,
) -> Result<()>
where
    I: Send + 'static,
    F: Fn(I) -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency));
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();
    let mut rx = rx;
    let mut failure: Option<CiStreamError> = None;

    'dispatch: loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                failure = Some(CiStreamError::Interrupted);
                break 'dispatch;
            }
            Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                if let Err(e) = flatten_join(joined) {
                    cancel.cancel();
                    failure = Some(e);
                    break 'dispatch;
                }
            }
            next = rx.recv() => {
                let Some(item) = next else { break 'dispatch };
                let permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        failure = Some(CiStreamError::Interrupted);
                        break 'dispatch;
                    }
                    permit = Arc::clone(&semaphore).acquire_owned() => {
                        permit.map_err(|e| CiStreamError::Task(e.to_string()))?
                    }
                };
                let fut = expand(item);
                let task_cancel = cancel.clone();
                tasks.spawn(async move {
                    let _permit = permit;
                    tokio::select! {
                        biased;
                        () = task_cancel.cancelled() => Ok(()),
                        result = fut => result,
                    }
                });
            }
        }
    }

    // Closing the receiver here stops upstream sends from blocking forever
    // while the remaining expansions drain.
    rx.close();
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = flatten_join(joined) {
            cancel.cancel();
            if failure.is_none() {
                failure = Some(e);
            }
        }
    }

    match failure {
        None => Ok(()),
        Some(CiStreamError::Interrupted) => Err(CiStreamError::Interrupted),
        Some(e) => {
            debug!("stage failed, crawl cancelled: {e}");
            Err(e)
        }
    }
}

fn flatten_join(joined: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(CiStreamError::Task(e.to_string())),
    }
}
