use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;

use virtwho_base::{run_cooperative_loop, CoreMetrics, Datastore, TerminateFlag, WorkerTerminate};
use virtwho_core::{ConfigError, ConfigHandle, DestinationManager, Report};

use crate::backend;
use crate::config::{DestinationInfo, ResolvedConfig};
use crate::destination::general::DestinationWorker;
use crate::destination::satellite5::Satellite5DestinationWorker;
use crate::manager_stub::StubManager;
use crate::source::SourceWorker;

struct WorkerHandle {
    name: String,
    terminate: WorkerTerminate,
    task: tokio::task::JoinHandle<Vec<Report>>,
}

/// Owns the worker set and the shared terminate signal (spec §4.6): builds
/// one source worker per source configuration and one destination worker
/// per destination configuration, starts them, and offers the
/// wait/terminate/reload operations that make up the Executor's public
/// surface.
pub struct Executor {
    datastore: Arc<Datastore>,
    external: TerminateFlag,
    workers: Vec<WorkerHandle>,
    printed: Vec<Report>,
    metrics: Arc<CoreMetrics>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor {
    pub fn new() -> Self {
        Self {
            datastore: Arc::new(Datastore::new()),
            external: TerminateFlag::new(),
            workers: Vec::new(),
            printed: Vec::new(),
            metrics: Arc::new(
                CoreMetrics::new("virtwho").expect("metric descriptors are static and well-formed"),
            ),
        }
    }

    pub fn datastore(&self) -> &Arc<Datastore> {
        &self.datastore
    }

    /// The process-wide metrics registry every worker in the current set
    /// reports cycle/send counts through.
    pub fn metrics(&self) -> &Arc<CoreMetrics> {
        &self.metrics
    }

    /// The process-wide shared terminate flag: setting it (from a signal
    /// handler, say) marks every worker in the current set as terminated
    /// within about a second (spec §5).
    pub fn shared_terminate_flag(&self) -> TerminateFlag {
        self.external.clone()
    }

    /// Builds and spawns the worker set named by `config`.
    pub fn start(&mut self, config: &ResolvedConfig) -> Result<(), ConfigError> {
        config.validate()?;

        for source in &config.sources {
            let backend = backend::build(source)?;
            let terminate = WorkerTerminate::new(self.external.clone());
            let worker = SourceWorker::new(
                ConfigHandle::new(source.name.clone()),
                backend,
                self.datastore.clone(),
                terminate.clone(),
                Duration::from_secs(config.global.interval),
                config.global.one_shot,
                source.exclude_hosts.clone(),
                source.filter_hosts.clone(),
                Some(self.metrics.clone()),
            );
            let task = tokio::spawn(async move {
                run_cooperative_loop(worker).await;
                Vec::new()
            });
            self.workers.push(WorkerHandle {
                name: source.name.clone(),
                terminate,
                task,
            });
        }

        for destination in &config.destinations {
            let manager: Arc<dyn DestinationManager> = Arc::new(StubManager::new(destination));
            let terminate = WorkerTerminate::new(self.external.clone());
            let interval = Duration::from_secs(config.global.interval);
            let polling_interval =
                Duration::from_secs(destination.polling_interval.unwrap_or(config.global.interval));

            let task = match destination.destination {
                DestinationInfo::Satellite5 => {
                    let worker = Satellite5DestinationWorker::new(
                        ConfigHandle::new(destination.name.clone()),
                        manager,
                        self.datastore.clone(),
                        terminate.clone(),
                        destination.sources.clone(),
                        interval,
                        config.global.one_shot,
                        config.global.print_only,
                        config.global.reporter_id.clone(),
                        Some(self.metrics.clone()),
                    );
                    tokio::spawn(async move {
                        let mut worker = run_cooperative_loop(worker).await;
                        worker.take_reports_to_print()
                    })
                }
                DestinationInfo::Satellite6 | DestinationInfo::Default => {
                    let worker = DestinationWorker::new(
                        ConfigHandle::new(destination.name.clone()),
                        manager,
                        self.datastore.clone(),
                        terminate.clone(),
                        destination.sources.clone(),
                        interval,
                        polling_interval,
                        config.global.one_shot,
                        config.global.print_only,
                        config.global.reporter_id.clone(),
                        Some(self.metrics.clone()),
                    );
                    tokio::spawn(async move {
                        let mut worker = run_cooperative_loop(worker).await;
                        worker.take_reports_to_print()
                    })
                }
            };

            self.workers.push(WorkerHandle {
                name: destination.name.clone(),
                terminate,
                task,
            });
        }

        Ok(())
    }

    /// Polls every worker's terminate predicate once a second until all
    /// have terminated or `max_wait` elapses. On expiry, kills the whole
    /// set if `kill_on_expiry`; otherwise returns the names of workers
    /// still running.
    pub async fn wait_on_threads(&mut self, max_wait: Option<Duration>, kill_on_expiry: bool) -> Vec<String> {
        let deadline = max_wait.map(|d| Instant::now() + d);
        loop {
            if self.workers.iter().all(|w| w.terminate.is_terminated()) {
                return Vec::new();
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    if kill_on_expiry {
                        self.terminate_threads().await;
                        return Vec::new();
                    }
                    return self
                        .workers
                        .iter()
                        .filter(|w| !w.terminate.is_terminated())
                        .map(|w| w.name.clone())
                        .collect();
                }
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    /// Stops every worker in the current set and waits for their tasks to
    /// finish (spec §4.6), collecting any print-only reports they captured
    /// instead of sending.
    pub async fn terminate_threads(&mut self) {
        for handle in &self.workers {
            handle.terminate.stop();
        }
        for handle in self.workers.drain(..) {
            if let Ok(reports) = handle.task.await {
                self.printed.extend(reports);
            }
        }
    }

    /// Drains the reports captured under print-only mode across every
    /// worker that has been joined via [`terminate_threads`](Self::terminate_threads).
    pub fn take_reports_to_print(&mut self) -> Vec<Report> {
        std::mem::take(&mut self.printed)
    }

    /// Tears down the current worker set and builds a fresh one from
    /// `config`, per a `ReloadRequest` (spec §4.6). The worker-set
    /// terminate flag is rebuilt for the new generation (spec §5:
    /// "reloads construct a new flag for the new set").
    pub async fn reload(&mut self, config: &ResolvedConfig) -> Result<(), ConfigError> {
        info!("reloading worker set");
        self.terminate_threads().await;
        self.external = TerminateFlag::new();
        self.start(config)
    }
}
