use std::collections::HashMap;
use std::sync::Arc;

use security::{Resolution, SecurityError, SecurityService, Sid};

/// SID 解析器 - 只查询，不修改任何状态
#[derive(Clone)]
pub struct SidResolver {
    service: Arc<dyn SecurityService>,
}

impl SidResolver {
    pub fn new(service: Arc<dyn SecurityService>) -> Self {
        Self { service }
    }

    /// 无法映射的 SID 返回 `Unresolved`；只有环境级故障才返回错误
    pub fn resolve(&self, sid: &Sid) -> Result<Resolution, SecurityError> {
        self.service.resolve_principal(sid)
    }
}

/// 孤立 SID 判定器 - 每个对象一个实例，同一对象内每个 SID 最多解析一次
pub struct OrphanClassifier<'a> {
    resolver: &'a SidResolver,
    preserve_prefixes: &'a [String],
    memo: HashMap<Sid, bool>,
}

impl<'a> OrphanClassifier<'a> {
    pub fn new(resolver: &'a SidResolver, preserve_prefixes: &'a [String]) -> Self {
        Self {
            resolver,
            preserve_prefixes,
            memo: HashMap::new(),
        }
    }

    /// 匹配保留前缀（能力 SID、完整性标签等）的 SID 永远不算孤立
    pub fn is_preserved(&self, sid: &Sid) -> bool {
        if self.preserve_prefixes.is_empty() {
            return false;
        }
        let text = sid.to_string();
        self.preserve_prefixes
            .iter()
            .any(|prefix| text.starts_with(prefix.as_str()))
    }

    pub fn is_orphan(&mut self, sid: &Sid) -> Result<bool, SecurityError> {
        if let Some(known) = self.memo.get(sid) {
            return Ok(*known);
        }
        let orphan = if self.is_preserved(sid) {
            false
        } else {
            match self.resolver.resolve(sid)? {
                Resolution::Resolved { account_name } => {
                    log::trace!("{} resolves to {}", sid, account_name);
                    false
                }
                Resolution::Unresolved => true,
            }
        };
        self.memo.insert(sid.clone(), orphan);
        Ok(orphan)
    }

    /// 本对象内已解析的不同 SID 数
    pub fn distinct_checked(&self) -> usize {
        self.memo.len()
    }
}
