//! The virt-who agent: backend registry, source/destination workers, and
//! the executor that wires them together from resolved configuration. This
//! plays the role the teacher gives its per-chain agent binaries
//! (`agents/relayer`, `agents/validator`) — the crate `main.rs` runs.

pub mod backend;
pub mod config;
pub mod destination;
pub mod executor;
pub mod manager_stub;
pub mod source;

pub use config::{BackendKind, DestinationConfig, DestinationInfo, ResolvedConfig, SourceConfig};
pub use executor::Executor;
pub use source::SourceWorker;
