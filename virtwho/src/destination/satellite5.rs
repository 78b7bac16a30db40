use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{instrument, warn};

use virtwho_base::{CoreMetrics, CycleWorker, Datastore, WorkerTerminate};
use virtwho_core::{
    ConfigHandle, DestinationManager, HostGuestAssociationReport, ManagerError, Report,
    SubmitOptions, VirtError,
};

use super::{gather, SourceBook};

/// The Satellite-5 variant (spec §4.5): no batching and no async job
/// polling — every host/guest association is submitted on its own, and a
/// domain-list report is a configuration mistake this destination cannot
/// serve at all.
///
/// Shares [`DestinationWorker`](super::general::DestinationWorker)'s
/// trait-level `one_shot() == false` trick for the same reason: the worker
/// may need several cycles to work through its source set under one-shot
/// mode, so it stops itself via `terminate.stop()` rather than relying on
/// the generic loop's single-cycle-then-exit rule.
pub struct Satellite5DestinationWorker {
    config: ConfigHandle,
    manager: Arc<dyn DestinationManager>,
    datastore: Arc<Datastore>,
    terminate: WorkerTerminate,
    interval: Duration,
    one_shot: bool,
    print_only: bool,
    options: SubmitOptions,
    book: SourceBook,
    reports_to_print: Vec<Report>,
    metrics: Option<Arc<CoreMetrics>>,
}

impl Satellite5DestinationWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ConfigHandle,
        manager: Arc<dyn DestinationManager>,
        datastore: Arc<Datastore>,
        terminate: WorkerTerminate,
        source_keys: Vec<String>,
        interval: Duration,
        one_shot: bool,
        print_only: bool,
        reporter_id: String,
        metrics: Option<Arc<CoreMetrics>>,
    ) -> Self {
        Self {
            config,
            manager,
            datastore,
            terminate,
            interval,
            one_shot,
            print_only,
            options: SubmitOptions {
                print_only,
                reporter_id,
            },
            book: SourceBook::new(source_keys),
            reports_to_print: Vec::new(),
            metrics,
        }
    }

    fn note_sent(&self) {
        if let Some(metrics) = &self.metrics {
            metrics.report_sent(self.config.name());
        }
    }

    pub fn take_reports_to_print(&mut self) -> Vec<Report> {
        std::mem::take(&mut self.reports_to_print)
    }

    #[instrument(skip(self, key, report), fields(name = %self.config.name(), source = %key))]
    async fn send_one(&mut self, key: String, report: HostGuestAssociationReport) {
        let hash = report.content_hash();

        if self.print_only {
            self.reports_to_print.push(Report::HostGuestAssociation(report));
            self.note_sent();
            self.book.mark_sent(&key, Some(hash));
            return;
        }

        loop {
            match self.manager.hypervisor_check_in(&report, &self.options).await {
                Ok(()) => {
                    self.note_sent();
                    self.book.mark_sent(&key, Some(hash));
                    return;
                }
                Err(ManagerError::Throttle { retry_after }) => {
                    self.terminate.wait(Duration::from_secs(retry_after)).await;
                    if self.terminate.is_terminated() {
                        return;
                    }
                }
                Err(ManagerError::Fatal(msg)) => {
                    warn!(source = %key, error = %msg, "checkin failed fatally");
                    if self.one_shot {
                        self.book.mark_erred(&key);
                    }
                    return;
                }
                Err(ManagerError::Recoverable(msg)) => {
                    warn!(source = %key, error = %msg, "checkin failed, will retry next interval");
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl CycleWorker for Satellite5DestinationWorker {
    type Data = HashMap<String, Report>;

    fn config_name(&self) -> &str {
        self.config.name()
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn one_shot(&self) -> bool {
        false
    }

    fn terminate(&self) -> &WorkerTerminate {
        &self.terminate
    }

    fn metrics(&self) -> Option<&CoreMetrics> {
        self.metrics.as_deref()
    }

    async fn get_data(&mut self) -> Result<Self::Data, VirtError> {
        Ok(gather(&self.datastore, &self.book))
    }

    async fn send_data(&mut self, gathered: Self::Data) {
        if gathered.is_empty() {
            return;
        }

        for (key, report) in gathered {
            match report {
                Report::DomainList(_) => {
                    warn!(source = %key, "satellite5 destinations do not support domain-list reports");
                    self.book.mark_erred(&key);
                    if self.one_shot {
                        self.book.drop_source(&key);
                    }
                }
                Report::HostGuestAssociation(r) => {
                    self.send_one(key, r).await;
                }
                Report::Error(_) => {
                    if self.one_shot {
                        self.book.mark_erred(&key);
                    }
                }
            }
        }

        if self.one_shot {
            self.book.prune_sent();
            if self.book.all_done() {
                self.terminate.stop();
            }
        }
    }
}
