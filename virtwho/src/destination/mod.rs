pub mod general;
pub mod satellite5;

use std::collections::{HashMap, HashSet};

use virtwho_base::Datastore;
use virtwho_core::Report;

/// Per-destination bookkeeping shared by the general and satellite5
/// destination workers (spec §4.4, §4.5): which source keys are still
/// active, each one's last-sent content hash (dedup), and the one-shot
/// sent/erred sets used to decide when the worker is done.
#[derive(Default)]
pub struct SourceBook {
    pub source_keys: Vec<String>,
    last_sent_hash: HashMap<String, String>,
    sent: HashSet<String>,
    erred: HashSet<String>,
}

impl SourceBook {
    pub fn new(source_keys: Vec<String>) -> Self {
        Self {
            source_keys,
            ..Default::default()
        }
    }

    /// Records `key` as sent this run. `hash` is `None` for the async-poll
    /// error case (spec §9 Open Questions: the batch is abandoned but its
    /// sources are still counted as sent, not erred, so there is no retry).
    pub fn mark_sent(&mut self, key: &str, hash: Option<String>) {
        if let Some(hash) = hash {
            self.last_sent_hash.insert(key.to_string(), hash);
        }
        self.erred.remove(key);
        self.sent.insert(key.to_string());
    }

    pub fn mark_erred(&mut self, key: &str) {
        self.erred.insert(key.to_string());
    }

    pub fn is_duplicate(&self, key: &str, hash: &str) -> bool {
        self.last_sent_hash.get(key).map(|h| h == hash).unwrap_or(false)
    }

    /// True once every source key this worker was configured with has been
    /// either sent or erred (spec §4.4's one-shot termination condition).
    pub fn all_done(&self) -> bool {
        self.source_keys
            .iter()
            .all(|k| self.sent.contains(k) || self.erred.contains(k))
    }

    /// Drops sent source keys from the active set. Called once per cycle
    /// under one-shot mode (spec §4.4).
    pub fn prune_sent(&mut self) {
        self.source_keys.retain(|k| !self.sent.contains(k));
    }

    /// Drops a specific erred source key from the active set. The general
    /// destination worker keeps erred sources active (they retry next
    /// interval); satellite5 drops domain-list sources outright (spec §4.5).
    pub fn drop_source(&mut self, key: &str) {
        self.source_keys.retain(|k| k != key);
    }
}

/// Reads the freshest report for each of `book`'s active source keys,
/// skipping sources with no entry yet and sources whose content hash
/// matches what was last sent (spec §4.4's `_get_data` deduplication).
pub fn gather(datastore: &Datastore, book: &SourceBook) -> HashMap<String, Report> {
    let mut out = HashMap::new();
    for key in &book.source_keys {
        let Some(report) = datastore.get(key) else {
            continue;
        };
        if let Some(hash) = report.content_hash() {
            if book.is_duplicate(key, &hash) {
                continue;
            }
        }
        out.insert(key.clone(), report);
    }
    out
}
