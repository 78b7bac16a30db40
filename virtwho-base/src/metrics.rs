use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

/// The small set of counters/gauges every agent exposes regardless of which
/// backends or destinations it is running, mirroring the shape of the
/// teacher's `CoreMetrics` (one `Registry`, named vectors labeled by
/// configuration name rather than one metric per source).
pub struct CoreMetrics {
    registry: Registry,
    cycles_total: IntCounterVec,
    cycle_errors_total: IntCounterVec,
    reports_sent_total: IntCounterVec,
    last_cycle_guests: IntGaugeVec,
}

impl CoreMetrics {
    pub fn new(namespace: &str) -> prometheus::Result<Self> {
        let registry = Registry::new();

        let cycles_total = IntCounterVec::new(
            Opts::new("cycles_total", "Number of collection/submission cycles run")
                .namespace(namespace),
            &["config"],
        )?;
        let cycle_errors_total = IntCounterVec::new(
            Opts::new("cycle_errors_total", "Number of cycles that ended in error")
                .namespace(namespace),
            &["config"],
        )?;
        let reports_sent_total = IntCounterVec::new(
            Opts::new("reports_sent_total", "Number of reports accepted by a destination")
                .namespace(namespace),
            &["config"],
        )?;
        let last_cycle_guests = IntGaugeVec::new(
            Opts::new("last_cycle_guests", "Guest count observed in the most recent cycle")
                .namespace(namespace),
            &["config"],
        )?;

        registry.register(Box::new(cycles_total.clone()))?;
        registry.register(Box::new(cycle_errors_total.clone()))?;
        registry.register(Box::new(reports_sent_total.clone()))?;
        registry.register(Box::new(last_cycle_guests.clone()))?;

        Ok(Self {
            registry,
            cycles_total,
            cycle_errors_total,
            reports_sent_total,
            last_cycle_guests,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn cycle_ran(&self, config: &str) {
        self.cycles_total.with_label_values(&[config]).inc();
    }

    pub fn cycle_errored(&self, config: &str) {
        self.cycle_errors_total.with_label_values(&[config]).inc();
    }

    pub fn report_sent(&self, config: &str) {
        self.reports_sent_total.with_label_values(&[config]).inc();
    }

    pub fn set_last_cycle_guests(&self, config: &str, count: i64) {
        self.last_cycle_guests.with_label_values(&[config]).set(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero_and_increment() {
        let metrics = CoreMetrics::new("virtwho").expect("metrics should register cleanly");
        metrics.cycle_ran("source-a");
        metrics.cycle_ran("source-a");
        assert_eq!(
            metrics
                .cycles_total
                .with_label_values(&["source-a"])
                .get(),
            2
        );
    }
}
