use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, instrument};

use virtwho_base::{CoreMetrics, CycleWorker, Datastore, WorkerTerminate};
use virtwho_core::{
    ConfigHandle, DomainListReport, ErrorReport, HostGuestAssociationReport, Report, SourceBackend,
    VirtError,
};

/// The specialisation named in spec §4.3: invokes a backend adapter once
/// per cycle and publishes the result into the shared datastore under its
/// own configuration name.
pub struct SourceWorker {
    config: ConfigHandle,
    backend: Arc<dyn SourceBackend>,
    datastore: Arc<Datastore>,
    terminate: WorkerTerminate,
    interval: Duration,
    one_shot: bool,
    exclude_hosts: Option<Vec<String>>,
    filter_hosts: Option<Vec<String>>,
    metrics: Option<Arc<CoreMetrics>>,
}

impl SourceWorker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ConfigHandle,
        backend: Arc<dyn SourceBackend>,
        datastore: Arc<Datastore>,
        terminate: WorkerTerminate,
        interval: Duration,
        one_shot: bool,
        exclude_hosts: Option<Vec<String>>,
        filter_hosts: Option<Vec<String>>,
        metrics: Option<Arc<CoreMetrics>>,
    ) -> Self {
        Self {
            config,
            backend,
            datastore,
            terminate,
            interval,
            one_shot,
            exclude_hosts,
            filter_hosts,
            metrics,
        }
    }

    /// Runs one collection pass directly, without the surrounding
    /// interval/retry machinery. "Use it only in specific cases" — the
    /// source this was distilled from reserves the equivalent for tests and
    /// one-off synchronous invocations.
    pub async fn run_cycle_once(&mut self) -> Result<Report, VirtError> {
        self.collect().await
    }

    async fn collect(&self) -> Result<Report, VirtError> {
        let report = if self.backend.is_hypervisor() {
            let association = self.backend.get_host_guest_mapping().await?;
            Report::HostGuestAssociation(HostGuestAssociationReport::new(
                self.config.clone(),
                association,
                self.exclude_hosts.clone(),
                self.filter_hosts.clone(),
            ))
        } else {
            let guests = self.backend.list_domains().await?;
            Report::DomainList(DomainListReport::new(self.config.clone(), guests, None))
        };

        if let Some(metrics) = &self.metrics {
            metrics.set_last_cycle_guests(self.config.name(), guest_count(&report) as i64);
        }

        Ok(report)
    }
}

fn guest_count(report: &Report) -> usize {
    match report {
        Report::HostGuestAssociation(r) => {
            r.effective_association().hypervisors.iter().map(|h| h.guests().len()).sum()
        }
        Report::DomainList(r) => r.guests.len(),
        Report::Error(_) => 0,
    }
}

#[async_trait]
impl CycleWorker for SourceWorker {
    type Data = Report;

    fn config_name(&self) -> &str {
        self.config.name()
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    fn one_shot(&self) -> bool {
        self.one_shot
    }

    fn terminate(&self) -> &WorkerTerminate {
        &self.terminate
    }

    fn metrics(&self) -> Option<&CoreMetrics> {
        self.metrics.as_deref()
    }

    #[instrument(skip(self), fields(name = %self.config_name()))]
    async fn get_data(&mut self) -> Result<Report, VirtError> {
        self.collect().await
    }

    async fn send_data(&mut self, data: Report) {
        if self.terminate.is_terminated() {
            debug!(name = %self.config_name(), "terminate requested before publish, discarding this cycle's report");
            return;
        }
        self.datastore.put(self.config.name().to_string(), data);
    }

    async fn send_error_report(&mut self) {
        self.datastore.put(
            self.config.name().to_string(),
            Report::Error(ErrorReport::new(self.config.clone())),
        );
    }
}
