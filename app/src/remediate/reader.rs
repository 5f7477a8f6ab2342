use std::path::Path;
use std::sync::Arc;

use security::{SecurityDescriptor, SecurityError, SecurityService};

/// 安全描述符读取器
///
/// 成功时 DACL 已完全解码为有序的 ACE 值，不保留任何对平台缓冲区的引用。
#[derive(Clone)]
pub struct DescriptorReader {
    service: Arc<dyn SecurityService>,
}

impl DescriptorReader {
    pub fn new(service: Arc<dyn SecurityService>) -> Self {
        Self { service }
    }

    pub fn read(&self, path: &Path) -> Result<SecurityDescriptor, SecurityError> {
        let descriptor = self.service.read_descriptor(path)?;
        log::debug!(
            "Read {}: owner {}, {} DACL entries",
            path.display(),
            descriptor
                .owner
                .as_ref()
                .map(|sid| sid.to_string())
                .unwrap_or_else(|| "<none>".to_string()),
            descriptor
                .dacl
                .as_ref()
                .map(|acl| acl.len().to_string())
                .unwrap_or_else(|| "NULL".to_string())
        );
        Ok(descriptor)
    }
}
