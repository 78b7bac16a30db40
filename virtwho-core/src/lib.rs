//! Report model, error taxonomy and external-collaborator traits shared by
//! every virt-who component.
//!
//! This crate mirrors the role `hyperlane-core` plays in its teacher
//! workspace: value objects and trait contracts only, no tokio, no I/O.

mod canonical;
mod error;
mod report;
mod traits;

pub use canonical::{canonical_json, sha256_hex};
pub use error::{ConfigError, ManagerError, VirtError};
pub use report::{
    ConfigHandle, DomainListReport, ErrorReport, Guest, GuestState, HostGuestAssociation,
    HostGuestAssociationReport, Hypervisor, Report, ReportState,
};
pub use traits::{DestinationManager, SourceBackend, SubmitOptions};
