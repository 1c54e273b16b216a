//! Batch dispatch
//!
//! The [`Dispatcher`] runs fetch-then-extract for every source of a batch,
//! either in input order or across a bounded pool of tokio tasks, and
//! collects one [`TaskReport`] per source.


use crate::config::Config;
use crate::error::Result;
use crate::extraction::Extractor;
use crate::fetcher::Fetcher;
use crate::transfer;
use crate::types::{BatchReport, DispatchOptions, DownloadTask, Sources, TaskReport};
use crate::utils::ensure_dir;
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, error, info, warn};

/// Runs batches of downloads
///
/// Cheap to clone; the fetcher and extractor are shared between tasks.
///
/// # Examples
///
/// ```no_run
/// use dataset_dl::{Config, DispatchOptions, Dispatcher};
///
/// # #[tokio::main]
/// # async fn main() -> dataset_dl::Result<()> {
/// let dispatcher = Dispatcher::new(Config::default())?;
/// let options = DispatchOptions { workers: 4, ..Default::default() };
/// let report = dispatcher
///     .dispatch(
///         vec!["https://example.com/patch0.tar.gz", "https://example.com/patch1.tar.gz"],
///         "images/train",
///         &options,
///     )
///     .await?;
/// println!("{} of {} succeeded", report.succeeded(), report.total());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    fetcher: Arc<Fetcher>,
    extractor: Arc<Extractor>,
    defaults: DispatchOptions,
}

impl Dispatcher {
    /// Build a dispatcher from configuration
    ///
    /// Selects the transfer backend and tar capability described by `config`.
    /// Fails if the configuration is invalid or a required tool is missing.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let transfer = transfer::from_config(&config)?;
        let extractor = Extractor::from_config(&config);
        let fetcher = Fetcher::new(transfer, config.retry.clone());

        info!(
            transfer = fetcher.transfer_name(),
            tar = extractor.tar_handler_name(),
            "dispatcher ready"
        );

        Ok(Self {
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            defaults: DispatchOptions::from(&config),
        })
    }

    /// Build a dispatcher from ready-made components
    pub fn with_components(fetcher: Fetcher, extractor: Extractor) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            extractor: Arc::new(extractor),
            defaults: DispatchOptions::default(),
        }
    }

    /// Options derived from the configuration this dispatcher was built with
    pub fn default_options(&self) -> &DispatchOptions {
        &self.defaults
    }

    /// Fetch every source into `destination_dir`, extracting archives on the way
    ///
    /// Returns once every task has finished. Per-task failures are recorded
    /// in the returned [`BatchReport`]; only failing to create
    /// `destination_dir` aborts the batch.
    pub async fn dispatch(
        &self,
        sources: impl Into<Sources>,
        destination_dir: impl AsRef<Path>,
        options: &DispatchOptions,
    ) -> Result<BatchReport> {
        let destination_dir = destination_dir.as_ref();
        ensure_dir(destination_dir)?;

        // One task per source, all sharing the destination directory
        let tasks: Vec<DownloadTask> = sources
            .into()
            .into_iter()
            .map(|source| DownloadTask::new(source, destination_dir))
            .collect();

        debug!(
            count = tasks.len(),
            workers = options.workers,
            dir = ?destination_dir,
            "dispatching batch"
        );

        let report = if options.workers <= 1 {
            self.run_sequential(tasks, options).await
        } else {
            self.run_parallel(tasks, options).await
        };

        log_summary(&report);
        Ok(report)
    }

    async fn run_sequential(&self, tasks: Vec<DownloadTask>, options: &DispatchOptions) -> BatchReport {
        let mut report = BatchReport::default();
        for task in tasks {
            let source = task.source.clone();
            // A panicking task is recorded and the loop moves on
            let result = AssertUnwindSafe(process_task(
                &self.fetcher,
                &self.extractor,
                task,
                options,
                false,
            ))
            .catch_unwind()
            .await;
            report.tasks.push(result.unwrap_or_else(|_| panicked(source)));
        }
        report
    }

    async fn run_parallel(&self, tasks: Vec<DownloadTask>, options: &DispatchOptions) -> BatchReport {
        let limit = Arc::new(Semaphore::new(options.workers));
        let mut set = JoinSet::new();
        // Source of each spawned task, for tasks that end without a report
        let mut sources = HashMap::with_capacity(tasks.len());

        for task in tasks {
            let fetcher = Arc::clone(&self.fetcher);
            let extractor = Arc::clone(&self.extractor);
            let limit = Arc::clone(&limit);
            let options = options.clone();
            let source = task.source.clone();

            let handle = set.spawn(async move {
                let source = task.source.clone();
                // Wait for a free worker slot
                let _permit = match limit.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return failed(source, format!("worker pool closed: {}", e)),
                };
                AssertUnwindSafe(process_task(&fetcher, &extractor, task, &options, true))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|_| panicked(source))
            });
            sources.insert(handle.id(), source);
        }

        collect_reports(set, sources).await
    }
}

/// Drain `set` into a report, in completion order
///
/// A task that ends without producing a report (aborted, or panicked outside
/// its own guard) is recorded as a failure of the source it was spawned for.
async fn collect_reports(
    mut set: JoinSet<TaskReport>,
    mut sources: HashMap<task::Id, String>,
) -> BatchReport {
    let mut report = BatchReport::default();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(task_report) => report.tasks.push(task_report),
            Err(e) => {
                let source = sources.remove(&e.id()).unwrap_or_default();
                error!(source = %source, error = %e, "download task did not complete");
                report.tasks.push(failed(source, e.to_string()));
            }
        }
    }
    report
}

/// Fetch one source, then extract it if asked to
async fn process_task(
    fetcher: &Fetcher,
    extractor: &Extractor,
    task: DownloadTask,
    options: &DispatchOptions,
    quiet: bool,
) -> TaskReport {
    let outcome = match fetcher
        .fetch(&task.source, &task.destination_dir, options.retry_limit, quiet)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(source = %task.source, error = %e, "download task failed");
            return failed(task.source, e.to_string());
        }
    };

    // Only a file that actually arrived is handed to the extractor
    let extraction = if options.unzip && outcome.succeeded {
        Some(
            extractor
                .extract(&outcome.path, outcome.succeeded, options.delete_after)
                .await,
        )
    } else {
        None
    };

    TaskReport {
        source: task.source,
        outcome: Some(outcome),
        extraction,
        error: None,
    }
}

fn failed(source: String, error: String) -> TaskReport {
    TaskReport {
        source,
        outcome: None,
        extraction: None,
        error: Some(error),
    }
}

fn panicked(source: String) -> TaskReport {
    error!(source = %source, "download task panicked");
    failed(source, "task panicked".to_string())
}

fn log_summary(report: &BatchReport) {
    info!(
        total = report.total(),
        succeeded = report.succeeded(),
        extracted = report.extracted(),
        "batch finished"
    );
    for source in report.failed_sources() {
        warn!(source, "failed to retrieve");
    }
}
