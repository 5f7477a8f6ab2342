use std::path::Path;
use std::sync::Arc;

use security::{Ace, DescriptorUpdate, SecurityError, SecurityService, Sid};
use utils::app_config::RemediateConfig;

use crate::remediate::outcome::{RemediationOutcome, Stage};
use crate::remediate::owner::OwnerReplacer;
use crate::remediate::reader::DescriptorReader;
use crate::remediate::rebuild::{rebuild, Rebuilt};
use crate::remediate::resolver::{OrphanClassifier, SidResolver};
use crate::remediate::writer::DescriptorWriter;

/// 修复开关：两个独立开关组合出只清理 ACL、只替换所有者或两者兼有
#[derive(Debug, Clone)]
pub struct RemediationOptions {
    pub clean_acl: bool,
    pub replace_owner: bool,
    pub preserve_prefixes: Vec<String>,
}

impl Default for RemediationOptions {
    fn default() -> Self {
        Self {
            clean_acl: true,
            replace_owner: true,
            preserve_prefixes: vec!["S-1-15-".to_string(), "S-1-16-".to_string()],
        }
    }
}

impl From<&RemediateConfig> for RemediationOptions {
    fn from(config: &RemediateConfig) -> Self {
        Self {
            clean_acl: config.clean_acl,
            replace_owner: config.replace_owner,
            preserve_prefixes: config.preserve_prefixes.clone(),
        }
    }
}

/// 修复引擎 - 按路径执行 读取 → 分类 → 重建/替换 → 写入
///
/// 跨对象无状态：每次调用都从当前环境重新分类，同一路径可随时重入。
pub struct RemediationEngine {
    options: RemediationOptions,
    reader: DescriptorReader,
    resolver: SidResolver,
    writer: DescriptorWriter,
    owner: Option<OwnerReplacer>,
}

impl RemediationEngine {
    /// 创建引擎；启用所有者替换时先验证替换主体
    pub fn new(
        service: Arc<dyn SecurityService>, options: RemediationOptions, replacement_principal: &str,
    ) -> Result<Self, SecurityError> {
        let owner = if options.replace_owner {
            Some(OwnerReplacer::from_principal(
                service.as_ref(),
                replacement_principal,
            )?)
        } else {
            None
        };
        Ok(Self::with_replacer(service, options, owner))
    }

    pub fn with_replacer(
        service: Arc<dyn SecurityService>, options: RemediationOptions, owner: Option<OwnerReplacer>,
    ) -> Self {
        Self {
            reader: DescriptorReader::new(service.clone()),
            resolver: SidResolver::new(service.clone()),
            writer: DescriptorWriter::new(service),
            options,
            owner,
        }
    }

    pub fn options(&self) -> &RemediationOptions {
        &self.options
    }

    pub fn replacement(&self) -> Option<&Sid> {
        self.owner.as_ref().map(|o| o.replacement())
    }

    /// 处理单个对象，总是返回一个终态结果
    pub fn process(&self, path: &Path) -> RemediationOutcome {
        let mut outcome = RemediationOutcome::new(path);

        let descriptor = match self.reader.read(path) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                match &e {
                    SecurityError::ObjectNotFound { .. } => {
                        log::debug!("{} vanished before its descriptor was read", path.display())
                    }
                    _ => log::warn!("Read failed for {}: {}", path.display(), e),
                }
                outcome.access_denied = e.is_access_denied();
                outcome.fail(Stage::ReadFailed, &e);
                return outcome;
            }
        };
        outcome.stage = Stage::Read;
        let entries = descriptor.dacl.as_ref().map_or(0, |acl| acl.len());
        outcome.original_entries = entries;
        outcome.kept_entries = entries;

        let mut classifier = OrphanClassifier::new(&self.resolver, &self.options.preserve_prefixes);

        let rebuilt: Option<Rebuilt> = match (&descriptor.dacl, self.options.clean_acl) {
            (Some(dacl), true) => match rebuild(dacl, |sid| classifier.is_orphan(sid)) {
                Ok(rebuilt) => Some(rebuilt),
                Err(e) => {
                    log::warn!("Classification failed for {}: {}", path.display(), e);
                    outcome.fail(Stage::Read, &e);
                    return outcome;
                }
            },
            _ => None,
        };

        let new_owner = match (&self.owner, &descriptor.owner, self.options.replace_owner) {
            (Some(replacer), Some(owner), true) => {
                match replacer.replace(owner, |sid| classifier.is_orphan(sid)) {
                    Ok(candidate) if candidate != *owner => Some((owner.clone(), candidate)),
                    Ok(_) => None,
                    Err(e) => {
                        log::warn!("Owner classification failed for {}: {}", path.display(), e);
                        outcome.fail(Stage::Read, &e);
                        return outcome;
                    }
                }
            }
            _ => None,
        };
        outcome.stage = Stage::Classified;

        let mut update = DescriptorUpdate {
            dacl_protected: descriptor.dacl_protected,
            ..Default::default()
        };
        let removed: &[Ace] = match &rebuilt {
            Some(rebuilt) if !rebuilt.is_unchanged() => {
                update.dacl = Some(rebuilt.acl.clone());
                &rebuilt.removed
            }
            _ => &[],
        };
        if let Some((_, replacement)) = &new_owner {
            update.owner = Some(replacement.clone());
        }

        if update.is_empty() {
            outcome.stage = Stage::Unchanged;
            log::debug!("{} unchanged", path.display());
            return outcome;
        }
        outcome.stage = Stage::Rebuilt;

        let (dacl_applied, owner_applied) = match self.writer.write(path, &update) {
            Ok(()) => {
                outcome.stage = Stage::Written;
                (update.dacl.is_some(), update.owner.is_some())
            }
            Err(SecurityError::PartialWriteFailure { applied, source }) => {
                log::warn!(
                    "Partial write on {}: owner applied {}, DACL applied {}: {}",
                    path.display(),
                    applied.owner,
                    applied.dacl,
                    source
                );
                outcome.fail(
                    Stage::WriteFailed,
                    SecurityError::PartialWriteFailure { applied, source },
                );
                (
                    applied.dacl && update.dacl.is_some(),
                    applied.owner && update.owner.is_some(),
                )
            }
            Err(e) => {
                log::warn!("Write failed for {}: {}", path.display(), e);
                outcome.fail(Stage::WriteFailed, &e);
                (false, false)
            }
        };

        if dacl_applied {
            for ace in removed {
                let detail = format!(
                    "Orphaned SID removed: {} ({}, {:#010x})",
                    ace.trustee, ace.header.ace_type, ace.mask
                );
                log::info!("{}: {}", path.display(), detail);
                outcome.info(detail);
            }
            outcome.acl_updated = true;
            outcome.kept_entries = entries - removed.len();
        }
        if owner_applied {
            if let Some((previous, replacement)) = &new_owner {
                let detail = format!("Orphaned owner {} replaced by {}", previous, replacement);
                log::info!("{}: {}", path.display(), detail);
                outcome.info(detail);
                outcome.previous_owner = Some(previous.to_string());
                outcome.new_owner = Some(replacement.to_string());
                outcome.owner_changed = true;
            }
        }
        outcome
    }
}
