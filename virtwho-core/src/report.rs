use std::sync::Arc;

use regex::Regex;
use serde_json::{json, Map, Value};

use crate::canonical::{canonical_json, sha256_hex};

/// A borrowed handle to the configuration a report (or worker) belongs to.
/// Cheap to clone; reports own one of these rather than the configuration
/// itself, since configuration objects are read-only and shared freely
/// (spec §5).
#[derive(Debug, Clone)]
pub struct ConfigHandle(Arc<ConfigInfo>);

#[derive(Debug)]
struct ConfigInfo {
    name: String,
}

impl ConfigHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(Arc::new(ConfigInfo { name: name.into() }))
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }
}

/// The lifecycle state of a guest, a fixed set of eight values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuestState {
    Unknown = 0,
    Running = 1,
    Blocked = 2,
    Paused = 3,
    ShuttingDown = 4,
    ShutOff = 5,
    Crashed = 6,
    PmSuspended = 7,
}

impl GuestState {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// One virtualization guest running on some hypervisor. Immutable after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guest {
    id: String,
    state: GuestState,
    virt_who_type: String,
}

impl Guest {
    pub fn new(id: impl Into<String>, state: GuestState, virt_who_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            state,
            virt_who_type: virt_who_type.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> GuestState {
        self.state
    }

    /// `active` is 1 iff state ∈ {RUNNING, PAUSED}.
    pub fn active(&self) -> bool {
        matches!(self.state, GuestState::Running | GuestState::Paused)
    }

    pub fn to_value(&self) -> Value {
        json!({
            "guestId": self.id,
            "state": self.state.code(),
            "attributes": {
                "virtWhoType": self.virt_who_type,
                "active": if self.active() { 1 } else { 0 },
            },
        })
    }
}

fn sort_by_guest_id(values: &mut [Value]) {
    values.sort_by(|a, b| {
        a["guestId"]
            .as_str()
            .unwrap_or_default()
            .cmp(b["guestId"].as_str().unwrap_or_default())
    });
}

fn sort_by_hypervisor_id(values: &mut [Value]) {
    values.sort_by(|a, b| {
        a["hypervisorId"]["hypervisorId"]
            .as_str()
            .unwrap_or_default()
            .cmp(b["hypervisorId"]["hypervisorId"].as_str().unwrap_or_default())
    });
}

/// A hypervisor and the guests it hosts. Immutable after construction.
#[derive(Debug, Clone)]
pub struct Hypervisor {
    id: String,
    name: Option<String>,
    facts: Option<Map<String, Value>>,
    guests: Vec<Guest>,
}

impl Hypervisor {
    pub fn new(
        id: impl Into<String>,
        guests: Vec<Guest>,
        name: Option<String>,
        facts: Option<Map<String, Value>>,
    ) -> Self {
        Self {
            id: id.into(),
            name,
            facts,
            guests,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn guests(&self) -> &[Guest] {
        &self.guests
    }

    pub fn to_value(&self) -> Value {
        let mut guest_ids: Vec<Value> = self.guests.iter().map(Guest::to_value).collect();
        sort_by_guest_id(&mut guest_ids);

        let mut obj = Map::new();
        obj.insert("hypervisorId".into(), json!({ "hypervisorId": self.id }));
        if let Some(name) = &self.name {
            obj.insert("name".into(), json!(name));
        }
        obj.insert("guestIds".into(), Value::Array(guest_ids));
        if let Some(facts) = &self.facts {
            obj.insert("facts".into(), Value::Object(facts.clone()));
        }
        Value::Object(obj)
    }

    /// SHA-256 over the canonical (sorted-keys) JSON of this hypervisor's
    /// serialized form.
    pub fn content_hash(&self) -> String {
        sha256_hex(canonical_json(&self.to_value()))
    }
}

/// The raw host/guest mapping a hypervisor-mode backend returns from
/// `getHostGuestMapping()`, before it is wrapped into a report.
#[derive(Debug, Clone, Default)]
pub struct HostGuestAssociation {
    pub hypervisors: Vec<Hypervisor>,
}

/// The lifecycle state of a report, updated by the destination as the
/// remote job progresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportState {
    #[default]
    Created,
    Processing,
    Finished,
    Failed,
    Canceled,
}

impl ReportState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed | Self::Canceled)
    }
}

/// Report from a non-hypervisor backend: a flat list of guests on one
/// system, optionally owned by a named hypervisor.
#[derive(Debug, Clone)]
pub struct DomainListReport {
    pub config: ConfigHandle,
    pub guests: Vec<Guest>,
    pub hypervisor_id: Option<String>,
    pub state: ReportState,
}

impl DomainListReport {
    pub fn new(config: ConfigHandle, guests: Vec<Guest>, hypervisor_id: Option<String>) -> Self {
        Self {
            config,
            guests,
            hypervisor_id,
            state: ReportState::default(),
        }
    }

    /// SHA-256 of the canonical JSON of the sorted guest list, concatenated
    /// with the string form of the hypervisor id (`"None"` when absent, to
    /// match the source this was distilled from).
    pub fn content_hash(&self) -> String {
        let mut guests: Vec<Value> = self.guests.iter().map(Guest::to_value).collect();
        sort_by_guest_id(&mut guests);
        let guests_json = canonical_json(&Value::Array(guests));
        let hypervisor_id = self.hypervisor_id.clone().unwrap_or_else(|| "None".into());
        sha256_hex(format!("{guests_json}{hypervisor_id}"))
    }
}

/// Translates a shell glob (`*`, `?`, `[...]`) into an anchored,
/// case-insensitive regex fragment.
fn translate_glob(glob: &str) -> String {
    let mut re = String::new();
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            '[' => {
                re.push('[');
                if let Some('!') = chars.peek() {
                    re.push('^');
                    chars.next();
                }
                for c2 in chars.by_ref() {
                    re.push(c2);
                    if c2 == ']' {
                        break;
                    }
                }
            }
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re
}

/// Returns whether `host` matches any pattern in `patterns`, trying each
/// pattern first as a shell glob, then as an anchored regex — the two
/// forms `exclude_hosts`/`filter_hosts` may contain.
fn host_matches(host: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        let glob = format!("(?i)^{}$", translate_glob(pattern));
        if Regex::new(&glob).map(|re| re.is_match(host)).unwrap_or(false) {
            return true;
        }
        let anchored = format!("(?i)^{pattern}$");
        Regex::new(&anchored).map(|re| re.is_match(host)).unwrap_or(false)
    })
}

/// Report from a hypervisor-mode backend: a host/guest association, with
/// optional include/exclude filtering applied before it is ever batched or
/// hashed.
#[derive(Debug, Clone)]
pub struct HostGuestAssociationReport {
    pub config: ConfigHandle,
    association: HostGuestAssociation,
    pub exclude_hosts: Option<Vec<String>>,
    pub filter_hosts: Option<Vec<String>>,
    pub state: ReportState,
}

impl HostGuestAssociationReport {
    pub fn new(
        config: ConfigHandle,
        association: HostGuestAssociation,
        exclude_hosts: Option<Vec<String>>,
        filter_hosts: Option<Vec<String>>,
    ) -> Self {
        Self {
            config,
            association,
            exclude_hosts,
            filter_hosts,
            state: ReportState::default(),
        }
    }

    /// The association with any hypervisor excluded by `exclude_hosts`, or
    /// not matched by `filter_hosts`, removed.
    pub fn effective_association(&self) -> HostGuestAssociation {
        let hypervisors = self
            .association
            .hypervisors
            .iter()
            .filter(|h| {
                if let Some(exclude) = &self.exclude_hosts {
                    if host_matches(h.id(), exclude) {
                        return false;
                    }
                }
                if let Some(filter) = &self.filter_hosts {
                    if !host_matches(h.id(), filter) {
                        return false;
                    }
                }
                true
            })
            .cloned()
            .collect();
        HostGuestAssociation { hypervisors }
    }

    pub fn serialized_association(&self) -> Value {
        let mut hypervisors: Vec<Value> = self
            .effective_association()
            .hypervisors
            .iter()
            .map(Hypervisor::to_value)
            .collect();
        sort_by_hypervisor_id(&mut hypervisors);
        json!({ "hypervisors": hypervisors })
    }

    /// SHA-256 of the canonical JSON of the effective association, with
    /// hypervisors sorted by id.
    pub fn content_hash(&self) -> String {
        sha256_hex(canonical_json(&self.serialized_association()))
    }
}

/// Signals that a source failed to produce data this cycle.
#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub config: ConfigHandle,
    pub state: ReportState,
}

impl ErrorReport {
    pub fn new(config: ConfigHandle) -> Self {
        Self {
            config,
            state: ReportState::default(),
        }
    }
}

/// The tagged union of everything a source backend can hand off to the
/// datastore. Dispatch on the variant rather than a class hierarchy, per
/// the design note against deep polymorphism.
#[derive(Debug, Clone)]
pub enum Report {
    DomainList(DomainListReport),
    HostGuestAssociation(HostGuestAssociationReport),
    Error(ErrorReport),
}

impl Report {
    pub fn config(&self) -> &ConfigHandle {
        match self {
            Report::DomainList(r) => &r.config,
            Report::HostGuestAssociation(r) => &r.config,
            Report::Error(r) => &r.config,
        }
    }

    pub fn state(&self) -> ReportState {
        match self {
            Report::DomainList(r) => r.state,
            Report::HostGuestAssociation(r) => r.state,
            Report::Error(r) => r.state,
        }
    }

    /// `None` for an [`ErrorReport`], which carries no content to hash.
    pub fn content_hash(&self) -> Option<String> {
        match self {
            Report::DomainList(r) => Some(r.content_hash()),
            Report::HostGuestAssociation(r) => Some(r.content_hash()),
            Report::Error(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest(id: &str, state: GuestState) -> Guest {
        Guest::new(id, state, "fake")
    }

    #[test]
    fn guest_active_matches_running_and_paused() {
        assert!(guest("g1", GuestState::Running).active());
        assert!(guest("g1", GuestState::Paused).active());
        assert!(!guest("g1", GuestState::ShutOff).active());
        assert!(!guest("g1", GuestState::Unknown).active());
    }

    #[test]
    fn hypervisor_hash_is_order_independent() {
        let h1 = Hypervisor::new(
            "h1",
            vec![guest("g1", GuestState::Running), guest("g2", GuestState::ShutOff)],
            None,
            None,
        );
        let h2 = Hypervisor::new(
            "h1",
            vec![guest("g2", GuestState::ShutOff), guest("g1", GuestState::Running)],
            None,
            None,
        );
        assert_eq!(h1.content_hash(), h2.content_hash());
    }

    #[test]
    fn hypervisor_hash_changes_with_content() {
        let h1 = Hypervisor::new("h1", vec![guest("g1", GuestState::Running)], None, None);
        let h2 = Hypervisor::new("h1", vec![guest("g1", GuestState::ShutOff)], None, None);
        assert_ne!(h1.content_hash(), h2.content_hash());
    }

    #[test]
    fn filter_hosts_excludes_non_matching() {
        let config = ConfigHandle::new("source-a");
        let assoc = HostGuestAssociation {
            hypervisors: vec![
                Hypervisor::new("h-prod", vec![], None, None),
                Hypervisor::new("h-dev", vec![], None, None),
            ],
        };
        let report = HostGuestAssociationReport::new(
            config,
            assoc,
            Some(vec!["*-dev".into()]),
            None,
        );
        let effective = report.effective_association();
        assert_eq!(effective.hypervisors.len(), 1);
        assert_eq!(effective.hypervisors[0].id(), "h-prod");
    }

    #[test]
    fn filtering_changes_the_hash() {
        let config = ConfigHandle::new("source-a");
        let assoc = HostGuestAssociation {
            hypervisors: vec![
                Hypervisor::new("h-prod", vec![], None, None),
                Hypervisor::new("h-dev", vec![], None, None),
            ],
        };
        let unfiltered = HostGuestAssociationReport::new(config.clone(), assoc.clone(), None, None);
        let filtered =
            HostGuestAssociationReport::new(config, assoc, Some(vec!["*-dev".into()]), None);
        assert_ne!(unfiltered.content_hash(), filtered.content_hash());
    }

    #[test]
    fn filtering_is_idempotent() {
        let config = ConfigHandle::new("source-a");
        let assoc = HostGuestAssociation {
            hypervisors: vec![
                Hypervisor::new("h-prod", vec![], None, None),
                Hypervisor::new("h-dev", vec![], None, None),
            ],
        };
        let report =
            HostGuestAssociationReport::new(config, assoc, Some(vec!["*-dev".into()]), None);
        let once = report.serialized_association();
        let twice = report.serialized_association();
        assert_eq!(once, twice);
    }

    #[test]
    fn domain_list_hash_stable_under_guest_reorder() {
        let config = ConfigHandle::new("source-a");
        let r1 = DomainListReport::new(
            config.clone(),
            vec![guest("g1", GuestState::Running), guest("g2", GuestState::Crashed)],
            Some("hv1".into()),
        );
        let r2 = DomainListReport::new(
            config,
            vec![guest("g2", GuestState::Crashed), guest("g1", GuestState::Running)],
            Some("hv1".into()),
        );
        assert_eq!(r1.content_hash(), r2.content_hash());
    }
}
