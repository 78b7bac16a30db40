//! Shared runtime scaffolding for virt-who agents: the datastore, the
//! cooperative interval loop, layered settings resolution, metrics and
//! tracing initialization. This plays the role `hyperlane-base` plays for
//! its teacher's agent binaries.

pub mod datastore;
pub mod interval;
pub mod metrics;
pub mod settings;
pub mod terminate;
pub mod trace;

pub use datastore::Datastore;
pub use interval::{run_cooperative_loop, CycleOutcome, CycleWorker};
pub use metrics::CoreMetrics;
pub use settings::{resolve, GlobalOptions, RawOptions, DEFAULT_INTERVAL, MIN_INTERVAL};
pub use terminate::{TerminateFlag, WorkerTerminate};
pub use trace::TracingConfig;
