//! Hand-scripted test doubles for the external-collaborator traits
//! (`SourceBackend`, `DestinationManager`). Mirrors the mock-module layout
//! of the teacher's `hyperlane-test` crate: one `mockall::mock!` block per
//! trait, in its own module.

pub mod backend;
pub mod manager;

pub use backend::MockSourceBackend;
pub use manager::MockDestinationManager;
