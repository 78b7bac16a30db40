use async_trait::async_trait;

use virtwho_core::{
    DestinationManager, DomainListReport, HostGuestAssociationReport, ManagerError, SubmitOptions,
};

use crate::config::DestinationConfig;

/// Placeholder for the wire-level subscription-manager protocols (§1 names
/// these as out-of-scope external collaborators: Satellite5, Satellite6,
/// the default Candlepin-style API). A real build wires one concrete
/// manager per destination; this repository exercises the destination
/// workers against `virtwho-test::MockDestinationManager` instead, and uses
/// this stub only so the executor can construct a worker set from
/// configuration alone.
pub struct StubManager {
    name: String,
}

impl StubManager {
    pub fn new(config: &DestinationConfig) -> Self {
        Self {
            name: config.name.clone(),
        }
    }
}

#[async_trait]
impl DestinationManager for StubManager {
    async fn hypervisor_check_in(
        &self,
        _report: &HostGuestAssociationReport,
        _options: &SubmitOptions,
    ) -> Result<(), ManagerError> {
        Err(ManagerError::Fatal(format!(
            "destination '{}' has no wire-protocol implementation in this build",
            self.name
        )))
    }

    async fn check_report_state(
        &self,
        _report: &mut HostGuestAssociationReport,
    ) -> Result<(), ManagerError> {
        Err(ManagerError::Fatal(format!(
            "destination '{}' has no wire-protocol implementation in this build",
            self.name
        )))
    }

    async fn send_virt_guests(
        &self,
        _report: &DomainListReport,
        _options: &SubmitOptions,
    ) -> Result<(), ManagerError> {
        Err(ManagerError::Fatal(format!(
            "destination '{}' has no wire-protocol implementation in this build",
            self.name
        )))
    }
}
