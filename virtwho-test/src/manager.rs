use async_trait::async_trait;
use mockall::*;

use virtwho_core::{
    DestinationManager, DomainListReport, HostGuestAssociationReport, ManagerError, SubmitOptions,
};

mock! {
    pub DestinationManager {
        pub fn _hypervisor_check_in(
            &self,
            report: &HostGuestAssociationReport,
            options: &SubmitOptions,
        ) -> Result<(), ManagerError> {}

        pub fn _check_report_state(
            &self,
            report: &mut HostGuestAssociationReport,
        ) -> Result<(), ManagerError> {}

        pub fn _send_virt_guests(
            &self,
            report: &DomainListReport,
            options: &SubmitOptions,
        ) -> Result<(), ManagerError> {}
    }
}

impl std::fmt::Debug for MockDestinationManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockDestinationManager")
    }
}

#[async_trait]
impl DestinationManager for MockDestinationManager {
    async fn hypervisor_check_in(
        &self,
        report: &HostGuestAssociationReport,
        options: &SubmitOptions,
    ) -> Result<(), ManagerError> {
        self._hypervisor_check_in(report, options)
    }

    async fn check_report_state(
        &self,
        report: &mut HostGuestAssociationReport,
    ) -> Result<(), ManagerError> {
        self._check_report_state(report)
    }

    async fn send_virt_guests(
        &self,
        report: &DomainListReport,
        options: &SubmitOptions,
    ) -> Result<(), ManagerError> {
        self._send_virt_guests(report, options)
    }
}
