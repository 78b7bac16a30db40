use std::time::Duration;

use virtwho::config::{BackendKind, ResolvedConfig, SourceConfig};
use virtwho::Executor;
use virtwho_base::GlobalOptions;

fn fake_source(name: &str) -> SourceConfig {
    SourceConfig {
        name: name.into(),
        kind: BackendKind::Fake,
        server: None,
        username: None,
        password: None,
        env: None,
        owner: None,
        exclude_hosts: None,
        filter_hosts: None,
    }
}

/// Scenario 7: under one-shot, `wait_on_threads` returns once every worker
/// has completed its single cycle, well before any `max_wait` deadline.
#[tokio::test(start_paused = true)]
async fn wait_on_threads_returns_once_one_shot_workers_finish() {
    let config = ResolvedConfig {
        global: GlobalOptions {
            interval: 60,
            one_shot: true,
            print_only: true,
            reporter_id: "test".into(),
            debug: false,
            config_dir: None,
        },
        sources: vec![fake_source("a"), fake_source("b")],
        destinations: vec![],
    };

    let mut executor = Executor::new();
    executor.start(&config).expect("fake sources require no credentials");

    let still_running = executor
        .wait_on_threads(Some(Duration::from_secs(300)), false)
        .await;
    assert!(
        still_running.is_empty(),
        "one-shot workers should all finish well inside the deadline"
    );

    executor.terminate_threads().await;
}
