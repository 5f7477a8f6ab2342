use std::path::Path;
use std::sync::Arc;

use security::{hex_dump, Acl, DescriptorUpdate, SecurityError, SecurityService};

/// 安全描述符写入器 - 所有者与 DACL 作为一次逻辑更新写入
#[derive(Clone)]
pub struct DescriptorWriter {
    service: Arc<dyn SecurityService>,
}

impl DescriptorWriter {
    pub fn new(service: Arc<dyn SecurityService>) -> Self {
        Self { service }
    }

    pub fn write(&self, path: &Path, update: &DescriptorUpdate) -> Result<(), SecurityError> {
        if update.is_empty() {
            return Ok(());
        }

        // 写入前通过编解码器重新校验重建的 ACL
        if let Some(dacl) = &update.dacl {
            if let Err(e) = dacl.validate() {
                log_invalid_acl(path, dacl, &e);
                return Err(e);
            }
        }

        match self.service.write_descriptor(path, update) {
            Err(e @ SecurityError::InvalidAcl(_)) => {
                if let Some(dacl) = &update.dacl {
                    log_invalid_acl(path, dacl, &e);
                }
                Err(e)
            }
            other => other,
        }
    }
}

/// InvalidAcl 说明重建逻辑有缺陷，记录完整诊断信息
fn log_invalid_acl(path: &Path, dacl: &Acl, error: &SecurityError) {
    let encoded = dacl
        .entries
        .iter()
        .try_fold(Vec::new(), |mut buf, ace| ace.write_to(&mut buf).map(|_| buf))
        .map(|buf| hex_dump(&buf))
        .unwrap_or_else(|e| format!("<unencodable: {e}>"));

    log::error!(
        "Rebuilt ACL rejected for {}: {} | revision {} | {} entries | {} bytes expected | entries: [{}] | body: {}",
        path.display(),
        error,
        dacl.revision,
        dacl.len(),
        dacl.encoded_len(),
        dacl.entries
            .iter()
            .map(|ace| format!(
                "{} flags={:#04x} size={} mask={:#010x} {}",
                ace.header.ace_type, ace.header.flags, ace.header.size, ace.mask, ace.trustee
            ))
            .collect::<Vec<_>>()
            .join("; "),
        encoded
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use security::{Ace, MemorySecurityService, SecurityDescriptor, Sid};

    fn sid(s: &str) -> Sid {
        s.parse().unwrap()
    }

    #[test]
    fn corrupted_acl_never_reaches_the_service() {
        let service = Arc::new(MemorySecurityService::new());
        let path = Path::new("/srv/share/doc.txt");
        service.set_descriptor(path, SecurityDescriptor::default());
        let writer = DescriptorWriter::new(service.clone());

        let mut ace = Ace::allow(1, sid("S-1-5-18"));
        ace.header.size += 4;
        let update = DescriptorUpdate {
            dacl: Some(Acl::new(2, vec![ace])),
            ..Default::default()
        };

        assert!(matches!(
            writer.write(path, &update),
            Err(SecurityError::InvalidAcl(_))
        ));
        assert_eq!(service.write_count(), 0);
    }

    #[test]
    fn empty_update_is_a_no_op() {
        let service = Arc::new(MemorySecurityService::new());
        let writer = DescriptorWriter::new(service.clone());
        writer
            .write(Path::new("/missing"), &DescriptorUpdate::default())
            .unwrap();
        assert_eq!(service.write_count(), 0);
    }
}
