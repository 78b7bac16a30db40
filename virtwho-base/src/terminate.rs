use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A settable-once, shareable boolean. Cloning shares the same underlying
/// flag, so setting it through any clone is observed by all of them.
#[derive(Clone, Default)]
pub struct TerminateFlag(Arc<AtomicBool>);

impl TerminateFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A worker's termination predicate: terminated iff either its own
/// `internal` flag (set by its own `stop()`) or the `external` flag shared
/// across the whole worker set is set (spec §4.2).
#[derive(Clone)]
pub struct WorkerTerminate {
    internal: TerminateFlag,
    external: TerminateFlag,
}

impl WorkerTerminate {
    pub fn new(external: TerminateFlag) -> Self {
        Self {
            internal: TerminateFlag::new(),
            external,
        }
    }

    /// Causes this worker to stop at the next idle moment. Affects only
    /// this worker, not the shared flag.
    pub fn stop(&self) {
        self.internal.set();
    }

    pub fn is_terminated(&self) -> bool {
        self.internal.is_set() || self.external.is_set()
    }

    /// Waits `duration`, checking the terminate predicate every second so
    /// that setting either flag causes an in-progress wait to return within
    /// one second (spec §4.2, §8).
    pub async fn wait(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_terminated() {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            let step = (deadline - now).min(Duration::from_secs(1));
            tokio::time::sleep(step).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn external_flag_wakes_internal_wait() {
        let external = TerminateFlag::new();
        let terminate = WorkerTerminate::new(external.clone());

        let waiter = tokio::spawn({
            let terminate = terminate.clone();
            async move {
                terminate.wait(Duration::from_secs(3600)).await;
            }
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        external.set();
        tokio::time::advance(Duration::from_secs(1)).await;

        tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("wait should return promptly after the flag is set")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stop_only_affects_this_worker() {
        let external = TerminateFlag::new();
        let a = WorkerTerminate::new(external.clone());
        let b = WorkerTerminate::new(external);

        a.stop();
        assert!(a.is_terminated());
        assert!(!b.is_terminated());
    }
}
