use async_trait::async_trait;

use virtwho_core::{Guest, HostGuestAssociation, SourceBackend, VirtError};

/// Placeholder for the hypervisor-specific scraping backends (libvirt, esx,
/// xen, rhevm, vdsm, hyperv) named in spec §1 as out-of-scope external
/// collaborators. A real build wires one concrete adapter per tag; this
/// repository registers the tag and returns a recoverable error so a
/// misconfigured source fails its cycle loudly instead of silently
/// producing no data.
pub struct StubBackend {
    tag: &'static str,
    is_hypervisor: bool,
}

impl StubBackend {
    pub fn new(tag: &'static str, is_hypervisor: bool) -> Self {
        Self { tag, is_hypervisor }
    }
}

#[async_trait]
impl SourceBackend for StubBackend {
    fn is_hypervisor(&self) -> bool {
        self.is_hypervisor
    }

    async fn get_host_guest_mapping(&self) -> Result<HostGuestAssociation, VirtError> {
        Err(VirtError::new(format!(
            "'{}' backend is not implemented in this build",
            self.tag
        )))
    }

    async fn list_domains(&self) -> Result<Vec<Guest>, VirtError> {
        Err(VirtError::new(format!(
            "'{}' backend is not implemented in this build",
            self.tag
        )))
    }
}
