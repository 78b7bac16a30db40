use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use virtwho_base::{CoreMetrics, CycleWorker, Datastore, WorkerTerminate};
use virtwho_core::{
    ConfigHandle, DestinationManager, DomainListReport, HostGuestAssociation,
    HostGuestAssociationReport, ManagerError, Report, ReportState, SubmitOptions, VirtError,
};

use super::{gather, SourceBook};

/// The general destination worker (spec §4.4): batches host/guest
/// associations from every configured source into a single checkin,
/// tracks it to a terminal state, and submits domain-list reports one at a
/// time.
///
/// Its trait-level `one_shot()` always reports `false` so the generic
/// interval loop never auto-stops it after a single cycle (§4.2's rule);
/// under one-shot mode this worker instead keeps cycling — as batching and
/// throttle retries can span several cycles — and calls `terminate.stop()`
/// itself once [`SourceBook::all_done`] holds.
pub struct DestinationWorker {
    config: ConfigHandle,
    manager: Arc<dyn DestinationManager>,
    datastore: Arc<Datastore>,
    terminate: WorkerTerminate,
    interval: Duration,
    polling_interval: Duration,
    interval_modifier: Option<Duration>,
    one_shot: bool,
    print_only: bool,
    options: SubmitOptions,
    book: SourceBook,
    reports_to_print: Vec<Report>,
    metrics: Option<Arc<CoreMetrics>>,
}

impl DestinationWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ConfigHandle,
        manager: Arc<dyn DestinationManager>,
        datastore: Arc<Datastore>,
        terminate: WorkerTerminate,
        source_keys: Vec<String>,
        interval: Duration,
        polling_interval: Duration,
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
            polling_interval,
            interval_modifier: None,
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

    fn note_sent(&self, count: usize) {
        if let Some(metrics) = &self.metrics {
            for _ in 0..count {
                metrics.report_sent(self.config.name());
            }
        }
    }

    /// Reports captured instead of being sent, under print-only mode. The
    /// executor drains this after the worker set has terminated.
    pub fn take_reports_to_print(&mut self) -> Vec<Report> {
        std::mem::take(&mut self.reports_to_print)
    }

    async fn wait_modifier_or(&mut self, default: Duration) -> bool {
        let wait = self.interval_modifier.take().unwrap_or(default);
        self.terminate.wait(wait).await;
        self.terminate.is_terminated()
    }

    #[instrument(skip(self, items), fields(name = %self.config.name()))]
    async fn run_batch_checkin(&mut self, items: Vec<(String, HostGuestAssociationReport)>) {
        let per_source_hashes: Vec<(String, String)> = items
            .iter()
            .map(|(key, report)| (key.clone(), report.content_hash()))
            .collect();

        let mut hypervisors = Vec::new();
        for (_, report) in &items {
            hypervisors.extend(report.effective_association().hypervisors);
        }
        let mut batch = HostGuestAssociationReport::new(
            self.config.clone(),
            HostGuestAssociation { hypervisors },
            None,
            None,
        );

        if self.print_only {
            self.reports_to_print.push(Report::HostGuestAssociation(batch));
            self.note_sent(per_source_hashes.len());
            for (key, hash) in per_source_hashes {
                self.book.mark_sent(&key, Some(hash));
            }
            return;
        }

        loop {
            match self.manager.hypervisor_check_in(&batch, &self.options).await {
                Ok(()) => break,
                Err(ManagerError::Throttle { retry_after }) => {
                    self.interval_modifier = Some(Duration::from_secs(retry_after));
                    if self.wait_modifier_or(Duration::ZERO).await {
                        return;
                    }
                }
                Err(err @ (ManagerError::Recoverable(_) | ManagerError::Fatal(_))) => {
                    warn!(error = %err, "batch checkin failed, abandoning this batch");
                    // Preserves the observed (likely redundant) cooldown wait
                    // from the source this was distilled from: a no-op
                    // unless a throttle has set `interval_modifier`.
                    if let Some(modifier) = self.interval_modifier.take() {
                        self.terminate.wait(modifier).await;
                    }
                    if self.one_shot {
                        for (key, _) in &items {
                            self.book.mark_erred(key);
                        }
                    }
                    return;
                }
            }
        }

        let mut first_poll = true;
        loop {
            if !first_poll {
                if self.wait_modifier_or(self.polling_interval).await {
                    return;
                }
            }
            first_poll = false;

            match self.manager.check_report_state(&mut batch).await {
                Ok(()) => {
                    if batch.state.is_terminal() {
                        break;
                    }
                }
                Err(ManagerError::Throttle { retry_after }) => {
                    self.interval_modifier = Some(Duration::from_secs(retry_after));
                }
                Err(err @ (ManagerError::Recoverable(_) | ManagerError::Fatal(_))) => {
                    warn!(error = %err, "async job poll failed, abandoning this batch");
                    // Observed, preserved quirk (spec §9 Open Questions): these
                    // sources are marked sent, not erred, so the batch is not
                    // retried next cycle even though it never finished.
                    if self.one_shot {
                        for (key, _) in &items {
                            self.book.mark_sent(key, None);
                        }
                    }
                    return;
                }
            }
        }

        if batch.state == ReportState::Finished {
            self.note_sent(per_source_hashes.len());
            for (key, hash) in per_source_hashes {
                self.book.mark_sent(&key, Some(hash));
            }
        }
    }

    #[instrument(skip(self, key, report), fields(name = %self.config.name(), source = %key))]
    async fn send_domain_list(&mut self, key: String, report: DomainListReport) {
        let hash = report.content_hash();

        if self.print_only {
            self.reports_to_print.push(Report::DomainList(report));
            self.note_sent(1);
            self.book.mark_sent(&key, Some(hash));
            return;
        }

        loop {
            match self.manager.send_virt_guests(&report, &self.options).await {
                Ok(()) => {
                    self.note_sent(1);
                    self.book.mark_sent(&key, Some(hash));
                    return;
                }
                Err(ManagerError::Throttle { retry_after }) => {
                    self.terminate.wait(Duration::from_secs(retry_after)).await;
                    if self.terminate.is_terminated() {
                        return;
                    }
                }
                Err(err @ (ManagerError::Recoverable(_) | ManagerError::Fatal(_))) => {
                    warn!(error = %err, source = %key, "domain-list submission failed");
                    if self.one_shot {
                        self.book.mark_erred(&key);
                    }
                    return;
                }
            }
        }
    }
}

#[async_trait]
impl CycleWorker for DestinationWorker {
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

        let mut domain_lists = Vec::new();
        let mut host_assocs = Vec::new();

        for (key, report) in gathered {
            match report {
                Report::DomainList(r) => domain_lists.push((key, r)),
                Report::HostGuestAssociation(r) => host_assocs.push((key, r)),
                Report::Error(_) => {
                    debug!(source = %key, "source reported an error this cycle");
                    if self.one_shot {
                        self.book.mark_erred(&key);
                    }
                }
            }
        }

        if !host_assocs.is_empty() {
            self.run_batch_checkin(host_assocs).await;
        }

        for (key, report) in domain_lists {
            self.send_domain_list(key, report).await;
        }

        if self.one_shot {
            self.book.prune_sent();
            if self.book.all_done() {
                self.terminate.stop();
            }
        }
    }
}
