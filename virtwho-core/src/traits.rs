use async_trait::async_trait;

use crate::error::{ManagerError, VirtError};
use crate::report::{DomainListReport, Guest, HostGuestAssociation, HostGuestAssociationReport};

/// Options threaded through to a [`DestinationManager`] call: the bits of
/// the resolved configuration surface (spec §6) a manager needs to decide
/// how to submit.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Suppress outbound calls; the caller is gathering reports to print.
    pub print_only: bool,
    /// The stable per-agent identifier attached to every submission.
    pub reporter_id: String,
}

/// The backend-adapter contract named in spec §6: the interface a source
/// plugin (libvirt, esx, ...) must implement. Implementations of this trait
/// are the external collaborators this crate does not provide; only the
/// `fake` backend used for tests lives in this repository.
#[async_trait]
pub trait SourceBackend: Send + Sync {
    /// Whether this backend represents a hypervisor environment (as
    /// opposed to a single virtual server).
    fn is_hypervisor(&self) -> bool;

    /// Hypervisor-mode collection: returns the host/guest mapping this
    /// cycle observed. Only called when `is_hypervisor()` is true.
    async fn get_host_guest_mapping(&self) -> Result<HostGuestAssociation, VirtError>;

    /// Non-hypervisor-mode collection: returns the guest list this cycle
    /// observed. Only called when `is_hypervisor()` is false.
    async fn list_domains(&self) -> Result<Vec<Guest>, VirtError>;
}

/// The destination-manager contract named in spec §6: the interface a
/// subscription-management server adapter must implement. The wire
/// protocol itself is out of scope; this crate ships only a test double
/// (`virtwho-test::MockManager`).
#[async_trait]
pub trait DestinationManager: Send + Sync {
    /// Submits a batch host/guest association report, returning once a job
    /// handle has been accepted server-side (the job itself may still be
    /// processing — poll with [`check_report_state`](Self::check_report_state)).
    async fn hypervisor_check_in(
        &self,
        report: &HostGuestAssociationReport,
        options: &SubmitOptions,
    ) -> Result<(), ManagerError>;

    /// Polls the remote job for a previously submitted report, advancing
    /// `report.state` toward a terminal state.
    async fn check_report_state(
        &self,
        report: &mut HostGuestAssociationReport,
    ) -> Result<(), ManagerError>;

    /// Submits a single domain-list report (no batching, no async job).
    async fn send_virt_guests(
        &self,
        report: &DomainListReport,
        options: &SubmitOptions,
    ) -> Result<(), ManagerError>;
}
