use std::sync::Arc;
use std::time::Duration;

use virtwho::destination::general::DestinationWorker;
use virtwho::source::SourceWorker;
use virtwho_base::{CycleWorker, Datastore, TerminateFlag, WorkerTerminate};
use virtwho_core::{
    ConfigHandle, Guest, GuestState, HostGuestAssociation, HostGuestAssociationReport, Hypervisor,
    ManagerError, Report, ReportState,
};
use virtwho_test::{MockDestinationManager, MockSourceBackend};

fn hypervisor(id: &str) -> Hypervisor {
    Hypervisor::new(
        id,
        vec![Guest::new(format!("{id}-g1"), GuestState::Running, "fake")],
        None,
        None,
    )
}

fn worker_terminate() -> WorkerTerminate {
    WorkerTerminate::new(TerminateFlag::new())
}

/// Scenario 1: two sources publish one hypervisor each; the destination
/// worker batches them into a single checkin and polls it to completion.
#[tokio::test(start_paused = true)]
async fn two_source_batch_checkin() {
    let datastore = Arc::new(Datastore::new());
    datastore.put(
        "a",
        Report::HostGuestAssociation(HostGuestAssociationReport::new(
            ConfigHandle::new("a"),
            HostGuestAssociation {
                hypervisors: vec![hypervisor("h1")],
            },
            None,
            None,
        )),
    );
    datastore.put(
        "b",
        Report::HostGuestAssociation(HostGuestAssociationReport::new(
            ConfigHandle::new("b"),
            HostGuestAssociation {
                hypervisors: vec![hypervisor("h2")],
            },
            None,
            None,
        )),
    );

    let mut manager = MockDestinationManager::new();
    manager
        .expect__hypervisor_check_in()
        .times(1)
        .returning(|report, _| {
            assert_eq!(report.effective_association().hypervisors.len(), 2);
            Ok(())
        });
    manager.expect__check_report_state().times(1).returning(|report| {
        report.state = ReportState::Finished;
        Ok(())
    });

    let mut worker = DestinationWorker::new(
        ConfigHandle::new("dest"),
        Arc::new(manager),
        datastore.clone(),
        worker_terminate(),
        vec!["a".into(), "b".into()],
        Duration::from_secs(3600),
        Duration::from_secs(60),
        true,
        false,
        "reporter".into(),
        None,
    );

    let data = worker.get_data().await.unwrap();
    assert_eq!(data.len(), 2);
    worker.send_data(data).await;

    // Scenario 2: the same content republished next cycle is deduplicated;
    // no outbound call happens (the manager mocks above accept exactly one
    // call each, so a second call here would panic the mock).
    let data = worker.get_data().await.unwrap();
    assert!(data.is_empty(), "unchanged reports must be deduplicated");
}

/// Scenario 3: a throttle response is retried and succeeds.
#[tokio::test(start_paused = true)]
async fn rate_limiting_retries_after_throttle() {
    let datastore = Arc::new(Datastore::new());
    datastore.put(
        "a",
        Report::HostGuestAssociation(HostGuestAssociationReport::new(
            ConfigHandle::new("a"),
            HostGuestAssociation {
                hypervisors: vec![hypervisor("h1")],
            },
            None,
            None,
        )),
    );

    let mut manager = MockDestinationManager::new();
    let mut seq = mockall::Sequence::new();
    manager
        .expect__hypervisor_check_in()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(ManagerError::Throttle { retry_after: 7 }));
    manager
        .expect__hypervisor_check_in()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    manager.expect__check_report_state().times(1).returning(|report| {
        report.state = ReportState::Finished;
        Ok(())
    });

    let mut worker = DestinationWorker::new(
        ConfigHandle::new("dest"),
        Arc::new(manager),
        datastore,
        worker_terminate(),
        vec!["a".into()],
        Duration::from_secs(3600),
        Duration::from_secs(60),
        true,
        false,
        "reporter".into(),
        None,
    );

    let data = worker.get_data().await.unwrap();
    worker.send_data(data).await;
}

/// Scenario 4: a batch reaching FAILED leaves the last-sent hash untouched,
/// so the same content is re-submitted next cycle.
#[tokio::test(start_paused = true)]
async fn async_failure_does_not_update_last_sent_hash() {
    let datastore = Arc::new(Datastore::new());
    datastore.put(
        "a",
        Report::HostGuestAssociation(HostGuestAssociationReport::new(
            ConfigHandle::new("a"),
            HostGuestAssociation {
                hypervisors: vec![hypervisor("h1")],
            },
            None,
            None,
        )),
    );

    let mut manager = MockDestinationManager::new();
    manager.expect__hypervisor_check_in().times(1).returning(|_, _| Ok(()));
    manager.expect__check_report_state().times(1).returning(|report| {
        report.state = ReportState::Failed;
        Ok(())
    });

    let mut worker = DestinationWorker::new(
        ConfigHandle::new("dest"),
        Arc::new(manager),
        datastore,
        worker_terminate(),
        vec!["a".into()],
        Duration::from_secs(3600),
        Duration::from_secs(60),
        true,
        false,
        "reporter".into(),
        None,
    );

    let data = worker.get_data().await.unwrap();
    worker.send_data(data).await;

    let data = worker.get_data().await.unwrap();
    assert_eq!(data.len(), 1, "a failed batch must be retried next cycle");
}

/// Scenario 6: a source failing under one-shot publishes an ErrorReport and
/// exits; the destination worker records it dealt-with and stops once every
/// configured source is accounted for.
#[tokio::test(start_paused = true)]
async fn one_shot_source_error_is_recorded_and_drains() {
    let datastore = Arc::new(Datastore::new());

    let mut backend = MockSourceBackend::new();
    backend.expect__is_hypervisor().returning(|| true);
    backend
        .expect__get_host_guest_mapping()
        .returning(|| Err(virtwho_core::VirtError::new("login failed")));

    let source_terminate = worker_terminate();
    let source = SourceWorker::new(
        ConfigHandle::new("a"),
        Arc::new(backend),
        datastore.clone(),
        source_terminate,
        Duration::from_secs(3600),
        true,
        None,
        None,
        None,
    );

    let task = tokio::spawn(virtwho_base::run_cooperative_loop(source));
    task.await.expect("source worker should finish");

    let published = datastore.get("a").expect("source should publish an error report");
    assert!(matches!(published, Report::Error(_)));

    // An ErrorReport never reaches the manager (see `send_data` above), so
    // the mock needs no expectations configured.
    let manager = MockDestinationManager::new();
    let mut destination = DestinationWorker::new(
        ConfigHandle::new("dest"),
        Arc::new(manager),
        datastore,
        worker_terminate(),
        vec!["a".into()],
        Duration::from_secs(3600),
        Duration::from_secs(60),
        true,
        false,
        "reporter".into(),
        None,
    );

    let data = destination.get_data().await.unwrap();
    assert_eq!(data.len(), 1);
    destination.send_data(data).await;
    assert!(destination.terminate().is_terminated());
}
