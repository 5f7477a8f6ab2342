use security::{Ace, Acl, SecurityError, Sid};

/// ACL 重建结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rebuilt {
    pub acl: Acl,
    /// 被删除的条目，按原始顺序
    pub removed: Vec<Ace>,
}

impl Rebuilt {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    pub fn is_unchanged(&self) -> bool {
        self.removed.is_empty()
    }
}

/// 按原始顺序遍历条目，保留非孤立条目，丢弃孤立条目
///
/// 孤立条目直接删除而不是替换。没有删除任何条目时返回与输入等价的 ACL。
/// 判定函数出错时整个重建中止，不会在不确定的情况下删除条目。
pub fn rebuild<F>(acl: &Acl, mut is_orphan: F) -> Result<Rebuilt, SecurityError>
where
    F: FnMut(&Sid) -> Result<bool, SecurityError>,
{
    let mut kept = Vec::with_capacity(acl.len());
    let mut removed = Vec::new();

    for ace in &acl.entries {
        if is_orphan(&ace.trustee)? {
            removed.push(ace.clone());
        } else {
            kept.push(ace.clone());
        }
    }

    let rebuilt = Acl::new(acl.revision, kept);
    if rebuilt.encoded_len() > acl.encoded_len() {
        return Err(SecurityError::InvalidAcl(format!(
            "rebuilt ACL grew from {} to {} bytes",
            acl.encoded_len(),
            rebuilt.encoded_len()
        )));
    }

    Ok(Rebuilt {
        acl: rebuilt,
        removed,
    })
}
