use std::collections::HashMap;
use std::sync::RwLock;

use virtwho_core::Report;

/// The shared table sources publish into and destinations drain from,
/// keyed by configuration name. A plain `RwLock<HashMap<_>>` is enough:
/// writes are one-per-cycle-per-source and reads are one-per-cycle-per-
/// destination, so contention never builds up (spec §5).
#[derive(Default)]
pub struct Datastore {
    reports: RwLock<HashMap<String, Report>>,
}

impl Datastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the most recent report for `key`, discarding whatever was
    /// there before. There is deliberately no "and also keep the old value"
    /// mode: only the latest report per source ever matters.
    pub fn put(&self, key: impl Into<String>, report: Report) {
        let mut reports = self.reports.write().expect("datastore lock poisoned");
        reports.insert(key.into(), report);
    }

    /// Returns the current report for `key`, or `None` if the source has
    /// not published anything yet. Replaces the `NotSetSentinel` idiom this
    /// was distilled from; `None` is the actual "nothing there" value.
    pub fn get(&self, key: &str) -> Option<Report> {
        let reports = self.reports.read().expect("datastore lock poisoned");
        reports.get(key).cloned()
    }

    pub fn remove(&self, key: &str) -> Option<Report> {
        let mut reports = self.reports.write().expect("datastore lock poisoned");
        reports.remove(key)
    }

    pub fn keys(&self) -> Vec<String> {
        let reports = self.reports.read().expect("datastore lock poisoned");
        reports.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use virtwho_core::{ConfigHandle, ErrorReport};

    fn error_report(name: &str) -> Report {
        Report::Error(ErrorReport::new(ConfigHandle::new(name)))
    }

    #[test]
    fn get_is_none_until_a_put() {
        let store = Datastore::new();
        assert!(store.get("source-a").is_none());
        store.put("source-a", error_report("source-a"));
        assert!(store.get("source-a").is_some());
    }

    #[test]
    fn put_replaces_the_previous_value() {
        let store = Datastore::new();
        store.put("source-a", error_report("source-a"));
        store.put("source-a", error_report("source-a"));
        assert_eq!(store.keys().len(), 1);
    }
}
