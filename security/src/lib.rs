pub mod ace;
pub mod acl;
pub mod descriptor;
pub mod error;
pub mod memory;
pub mod service;
pub mod sid;
#[cfg(windows)]
pub mod windows;

pub use ace::{Ace, AceHeader, AceType};
pub use acl::{hex_dump, Acl, AclHeader, AclReader, AclWriter, ACL_REVISION, ACL_REVISION_DS};
pub use descriptor::{DescriptorUpdate, SecurityDescriptor};
pub use error::{Applied, Result, SecurityError};
pub use memory::{Fault, MemorySecurityService};
pub use service::{Resolution, SecurityService};
pub use sid::Sid;
#[cfg(windows)]
pub use windows::WindowsSecurityService;

use std::sync::Arc;

/// The service for the running platform, or `None` where descriptors cannot
/// be edited.
pub fn platform_service() -> Option<Arc<dyn SecurityService>> {
    #[cfg(windows)]
    {
        Some(Arc::new(WindowsSecurityService::new()))
    }
    #[cfg(not(windows))]
    {
        None
    }
}
