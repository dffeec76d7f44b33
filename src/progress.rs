use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Hierarchy level an item was consumed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Pipelines,
    Workflows,
    Jobs,
}

/// Fire-and-forget progress counters, one per hierarchy level.
///
/// Purely observational: an implementation must never block or fail the
/// crawl. Each stage receives the observer at construction; there is no
/// ambient global state.
pub trait ProgressObserver: Send + Sync {
    fn increment(&self, level: Level);
}

/// Observer that ignores everything; used with `--quiet` and in tests.
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {
    fn increment(&self, _level: Level) {}
}

/// Stacked progress bars on stderr, one per hierarchy level.
///
/// The pipeline bar has a known length when the crawl is bounded; the
/// lower levels have no predictable totals, so they tick as plain counters.
pub struct MultiBarProgress {
    multi: MultiProgress,
    pipelines: ProgressBar,
    workflows: ProgressBar,
    jobs: ProgressBar,
}

impl MultiBarProgress {
    pub fn new(pipeline_limit: Option<usize>) -> Self {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());

        let pipelines = match pipeline_limit {
            Some(limit) => {
                let pb = multi.add(ProgressBar::new(limit as u64));
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{msg:>10} {bar:40.cyan/blue} {pos}/{len}")
                        .unwrap(),
                );
                pb
            }
            None => multi.add(counter_bar()),
        };
        pipelines.set_message("pipelines");

        let workflows = multi.add(counter_bar());
        workflows.set_message("workflows");

        let jobs = multi.add(counter_bar());
        jobs.set_message("jobs");

        Self {
            multi,
            pipelines,
            workflows,
            jobs,
        }
    }

    /// Finish all bars and release the terminal.
    pub fn finish(&self) {
        self.pipelines.finish();
        self.workflows.finish();
        self.jobs.finish();
        let _ = self.multi.clear();
    }
}

impl ProgressObserver for MultiBarProgress {
    fn increment(&self, level: Level) {
        match level {
            Level::Pipelines => self.pipelines.inc(1),
            Level::Workflows => self.workflows.inc(1),
            Level::Jobs => self.jobs.inc(1),
        }
    }
}

fn counter_bar() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{msg:>10} {spinner:.green} {pos}")
            .unwrap(),
    );
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
