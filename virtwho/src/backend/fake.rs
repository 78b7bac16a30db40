use async_trait::async_trait;

use virtwho_core::{Guest, GuestState, HostGuestAssociation, Hypervisor, SourceBackend, VirtError};

use crate::config::SourceConfig;

/// A backend that fabricates a single hypervisor with one running guest,
/// named after its own configuration. Exists for local smoke-testing and
/// demos (`type = "fake"`), not for production collection — the `fake` tag
/// is the one entry in the registry this repository actually implements.
pub struct FakeBackend {
    name: String,
    is_hypervisor: bool,
}

impl FakeBackend {
    pub fn new(config: &SourceConfig) -> Self {
        Self {
            name: config.name.clone(),
            is_hypervisor: true,
        }
    }
}

#[async_trait]
impl SourceBackend for FakeBackend {
    fn is_hypervisor(&self) -> bool {
        self.is_hypervisor
    }

    async fn get_host_guest_mapping(&self) -> Result<HostGuestAssociation, VirtError> {
        let guest = Guest::new(format!("{}-guest-1", self.name), GuestState::Running, "fake");
        let hypervisor = Hypervisor::new(format!("{}-hv-1", self.name), vec![guest], None, None);
        Ok(HostGuestAssociation {
            hypervisors: vec![hypervisor],
        })
    }

    async fn list_domains(&self) -> Result<Vec<Guest>, VirtError> {
        Ok(vec![Guest::new(
            format!("{}-guest-1", self.name),
            GuestState::Running,
            "fake",
        )])
    }
}
