use std::sync::Arc;
use std::time::Duration;

use virtwho_base::{CycleWorker, Datastore, TerminateFlag, WorkerTerminate};
use virtwho_core::{ConfigHandle, Guest, GuestState, HostGuestAssociation, Hypervisor, Report};
use virtwho_test::MockSourceBackend;

fn hypervisor(id: &str) -> Hypervisor {
    Hypervisor::new(
        id,
        vec![Guest::new(format!("{id}-g1"), GuestState::Running, "fake")],
        None,
        None,
    )
}

/// Scenario 5: `exclude_hosts`/`filter_hosts` are applied to the effective
/// association a source worker publishes, not to the raw backend output.
#[tokio::test(start_paused = true)]
async fn exclude_hosts_drops_matching_hypervisors() {
    let datastore = Arc::new(Datastore::new());

    let mut backend = MockSourceBackend::new();
    backend.expect__is_hypervisor().returning(|| true);
    backend.expect__get_host_guest_mapping().returning(|| {
        Ok(HostGuestAssociation {
            hypervisors: vec![hypervisor("prod-1"), hypervisor("dev-1")],
        })
    });

    let mut source = virtwho::source::SourceWorker::new(
        ConfigHandle::new("a"),
        Arc::new(backend),
        datastore.clone(),
        WorkerTerminate::new(TerminateFlag::new()),
        Duration::from_secs(3600),
        true,
        Some(vec!["dev-*".into()]),
        None,
        None,
    );

    let report = source.run_cycle_once().await.unwrap();
    source.send_data(report).await;

    let published = datastore.get("a").expect("source should have published a report");
    let Report::HostGuestAssociation(r) = published else {
        panic!("expected a host/guest association report");
    };
    let effective = r.effective_association();
    assert_eq!(effective.hypervisors.len(), 1);
    assert_eq!(effective.hypervisors[0].id(), "prod-1");
}
