use std::path::Path;

use crate::descriptor::{DescriptorUpdate, SecurityDescriptor};
use crate::error::Result;
use crate::sid::Sid;

/// Answer of a principal lookup. An unmapped SID is an expected outcome,
/// not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved { account_name: String },
    Unresolved,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// Platform security calls used by the remediation engine.
///
/// All methods block; callers run them off the async runtime.
pub trait SecurityService: Send + Sync {
    fn read_descriptor(&self, path: &Path) -> Result<SecurityDescriptor>;

    /// Applies the present parts of `update` as one logical change. When only
    /// one part lands the error is `PartialWriteFailure`.
    fn write_descriptor(&self, path: &Path, update: &DescriptorUpdate) -> Result<()>;

    fn resolve_principal(&self, sid: &Sid) -> Result<Resolution>;

    /// Account name to SID, for configured principals given by name.
    fn lookup_account(&self, name: &str) -> Result<Sid>;
}

impl<T: SecurityService + ?Sized> SecurityService for std::sync::Arc<T> {
    fn read_descriptor(&self, path: &Path) -> Result<SecurityDescriptor> {
        (**self).read_descriptor(path)
    }

    fn write_descriptor(&self, path: &Path, update: &DescriptorUpdate) -> Result<()> {
        (**self).write_descriptor(path, update)
    }

    fn resolve_principal(&self, sid: &Sid) -> Result<Resolution> {
        (**self).resolve_principal(sid)
    }

    fn lookup_account(&self, name: &str) -> Result<Sid> {
        (**self).lookup_account(name)
    }
}
