use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use virtwho_core::VirtError;

use crate::metrics::CoreMetrics;
use crate::terminate::WorkerTerminate;

/// A unit of cooperative, interval-driven work: a source polling a
/// hypervisor, or a destination draining the datastore. `run_cooperative_loop`
/// turns one of these into the full retry/one-shot/terminate state machine
/// described in spec §4.2-§4.4, so implementors only need to describe a
/// single cycle.
#[async_trait]
pub trait CycleWorker: Send {
    /// The value produced by a successful [`get_data`](Self::get_data) call.
    type Data: Send;

    /// The configuration name this worker is attached to, used only for
    /// tracing spans.
    fn config_name(&self) -> &str;

    /// How long to wait between cycles.
    fn interval(&self) -> Duration;

    /// Whether this worker should stop after a single successful cycle.
    fn one_shot(&self) -> bool;

    fn terminate(&self) -> &WorkerTerminate;

    /// The shared metrics handle this worker reports cycle counts through,
    /// if one was wired up at construction. Default is `None` so tests and
    /// standalone workers aren't forced to carry one.
    fn metrics(&self) -> Option<&CoreMetrics> {
        None
    }

    /// Runs once before the first cycle. Default is a no-op.
    async fn prepare(&mut self) {}

    /// Performs one cycle's worth of work, returning the data gathered or a
    /// recoverable [`VirtError`].
    async fn get_data(&mut self) -> Result<Self::Data, VirtError>;

    /// Hands a successful cycle's data off (publishing to the datastore,
    /// submitting to a destination, ...).
    async fn send_data(&mut self, data: Self::Data);

    /// Called instead of [`send_data`](Self::send_data) when a cycle fails
    /// under one-shot mode, so the destination still learns the source
    /// erred (spec §4.3's "send_error_report" hook in `original_source/`).
    async fn send_error_report(&mut self) {}

    /// Runs once after the loop exits, win or lose. Default is a no-op.
    fn cleanup(&mut self) {}
}

/// How [`run_until_stop_or_error`] exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Terminated cleanly (either one-shot success or a terminate signal).
    Stopped,
    /// A cycle failed with a [`VirtError`].
    Errored,
}

async fn run_until_stop_or_error<W: CycleWorker>(worker: &mut W) -> CycleOutcome {
    loop {
        if worker.terminate().is_terminated() {
            return CycleOutcome::Stopped;
        }

        let cycle_start = Instant::now();
        match worker.get_data().await {
            Ok(data) => {
                if let Some(metrics) = worker.metrics() {
                    metrics.cycle_ran(worker.config_name());
                }
                worker.send_data(data).await;
                if worker.one_shot() {
                    info!("Running in one-shot mode, will not continue");
                    return CycleOutcome::Stopped;
                }
            }
            Err(err) => {
                if let Some(metrics) = worker.metrics() {
                    metrics.cycle_errored(worker.config_name());
                }
                error!(error = %err, "Unable to gather data this cycle");
                if worker.one_shot() {
                    worker.send_error_report().await;
                }
                return CycleOutcome::Errored;
            }
        }

        if worker.terminate().is_terminated() {
            return CycleOutcome::Stopped;
        }

        let elapsed = cycle_start.elapsed();
        let interval = worker.interval();
        if elapsed >= interval {
            debug!(
                "Getting the data took longer than the configured interval. Trying again immediately."
            );
            continue;
        }
        worker.terminate().wait(interval - elapsed).await;
    }
}

/// The outer retry wrapper: on [`CycleOutcome::Errored`], waits one interval
/// and restarts the inner loop, unless the worker is one-shot (in which case
/// it has already sent its error report and is done) or has been told to
/// terminate in the meantime. Returns the worker so a caller can pull any
/// final state out of it (e.g. a print-only buffer) after it stops.
pub async fn run_cooperative_loop<W: CycleWorker>(mut worker: W) -> W {
    worker.prepare().await;

    loop {
        match run_until_stop_or_error(&mut worker).await {
            CycleOutcome::Stopped => break,
            CycleOutcome::Errored => {
                if worker.one_shot() || worker.terminate().is_terminated() {
                    break;
                }
                warn!(
                    config = worker.config_name(),
                    "Will try again in {}s", worker.interval().as_secs()
                );
                worker.terminate().wait(worker.interval()).await;
            }
        }
    }

    // Guarantees the invariant external observers rely on: once this
    // future resolves, `worker.terminate().is_terminated()` is true,
    // even when the loop exited because of one-shot success rather than
    // an explicit `stop()`.
    worker.terminate().stop();
    worker.cleanup();
    worker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminate::TerminateFlag;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingWorker {
        terminate: WorkerTerminate,
        calls: Arc<AtomicUsize>,
        one_shot: bool,
        stop_after: usize,
    }

    #[async_trait]
    impl CycleWorker for CountingWorker {
        type Data = usize;

        fn config_name(&self) -> &str {
            "counting"
        }

        fn interval(&self) -> Duration {
            Duration::from_secs(60)
        }

        fn one_shot(&self) -> bool {
            self.one_shot
        }

        fn terminate(&self) -> &WorkerTerminate {
            &self.terminate
        }

        async fn get_data(&mut self) -> Result<Self::Data, VirtError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.stop_after {
                self.terminate.stop();
            }
            Ok(n)
        }

        async fn send_data(&mut self, _data: Self::Data) {}
    }

    #[tokio::test(start_paused = true)]
    async fn one_shot_runs_exactly_once() {
        let external = TerminateFlag::new();
        let worker = CountingWorker {
            terminate: WorkerTerminate::new(external),
            calls: Arc::new(AtomicUsize::new(0)),
            one_shot: true,
            stop_after: usize::MAX,
        };
        let calls = worker.calls.clone();
        run_cooperative_loop(worker).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_terminate_is_set_mid_loop() {
        let external = TerminateFlag::new();
        let worker = CountingWorker {
            terminate: WorkerTerminate::new(external),
            calls: Arc::new(AtomicUsize::new(0)),
            one_shot: false,
            stop_after: 3,
        };
        let calls = worker.calls.clone();

        let handle = tokio::spawn(run_cooperative_loop(worker));
        tokio::time::timeout(Duration::from_secs(600), handle)
            .await
            .expect("loop should stop once stop_after cycles have run")
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
