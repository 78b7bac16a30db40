use async_trait::async_trait;
use mockall::*;

use virtwho_core::{Guest, HostGuestAssociation, SourceBackend, VirtError};

mock! {
    pub SourceBackend {
        pub fn _is_hypervisor(&self) -> bool {}
        pub fn _get_host_guest_mapping(&self) -> Result<HostGuestAssociation, VirtError> {}
        pub fn _list_domains(&self) -> Result<Vec<Guest>, VirtError> {}
    }
}

impl std::fmt::Debug for MockSourceBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockSourceBackend")
    }
}

#[async_trait]
impl SourceBackend for MockSourceBackend {
    fn is_hypervisor(&self) -> bool {
        self._is_hypervisor()
    }

    async fn get_host_guest_mapping(&self) -> Result<HostGuestAssociation, VirtError> {
        self._get_host_guest_mapping()
    }

    async fn list_domains(&self) -> Result<Vec<Guest>, VirtError> {
        self._list_domains()
    }
}
