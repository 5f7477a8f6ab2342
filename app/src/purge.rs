use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use utils::app_config::AppConfig;
use utils::error::{Error, Result};

use crate::consumer::config::ConsumerConfig;
use crate::consumer::{ConsumerManager, ReportMessage, ReportSender, RunStats};
use crate::remediate::outcome::{Action, ReportRow};
use crate::walk::{spawn_walk, CancelFlag, SubtreeGate, TraversalPolicy, WalkItem};

/// 文件名通配模式，支持 `*`（任意长度）和 `?`（单个字符），其余字符按字面匹配
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WildcardPattern {
    pattern: Vec<char>,
}

impl WildcardPattern {
    /// 模式统一转换为小写，与小写化的文件名比较
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_lowercase().chars().collect(),
        }
    }

    pub fn matches(&self, name: &str) -> bool {
        let name: Vec<char> = name.chars().collect();
        let (mut p, mut n) = (0, 0);
        // 最近一个 `*` 的位置，以及它当前吸收到的文件名位置
        let mut backtrack: Option<(usize, usize)> = None;

        while n < name.len() {
            match self.pattern.get(p) {
                Some('*') => {
                    backtrack = Some((p, n));
                    p += 1;
                }
                Some(&c) if c == '?' || c == name[n] => {
                    p += 1;
                    n += 1;
                }
                _ => match backtrack {
                    Some((star, absorbed)) => {
                        p = star + 1;
                        n = absorbed + 1;
                        backtrack = Some((star, absorbed + 1));
                    }
                    None => return false,
                },
            }
        }
        self.pattern[p..].iter().all(|&c| c == '*')
    }
}

impl fmt::Display for WildcardPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pattern.iter().collect::<String>())
    }
}

/// 清理运行的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeSummary {
    /// 检查过的文件数（不含目录）
    pub scanned: usize,
    pub deleted: usize,
    pub errors: usize,
}

impl PurgeSummary {
    pub fn row(&self, root: impl AsRef<Path>) -> ReportRow {
        ReportRow::new(Action::Summary, root, self.to_string())
    }
}

impl fmt::Display for PurgeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scanned: {}, Deleted: {}", self.scanned, self.deleted)
    }
}

/// 临时文件清理器
pub struct Purger {
    patterns: Vec<WildcardPattern>,
    policy: TraversalPolicy,
    queue_capacity: usize,
    cancel: CancelFlag,
}

impl Purger {
    pub fn new(patterns: &[String], policy: TraversalPolicy, queue_capacity: usize) -> Self {
        Self {
            patterns: patterns.iter().map(|p| WildcardPattern::new(p)).collect(),
            policy,
            queue_capacity,
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// 文件名（小写化后）匹配任一模式
    pub fn is_match(&self, file_name: &str) -> bool {
        let name = file_name.to_lowercase();
        self.patterns.iter().any(|p| p.matches(&name))
    }

    /// 遍历并删除匹配的文件，目录永远不会被删除
    pub async fn run(&self, root: &Path, mut sender: ReportSender) -> Result<PurgeSummary> {
        let started = Instant::now();
        let mut summary = PurgeSummary::default();

        let (mut rx, walk_handle) = spawn_walk(
            root.to_path_buf(),
            self.policy.clone(),
            SubtreeGate::new(),
            self.cancel.clone(),
            self.queue_capacity,
        );

        while let Some(item) = rx.recv().await {
            let row = match item {
                WalkItem::Entry(entry) if entry.is_dir => continue,
                WalkItem::Entry(entry) => {
                    summary.scanned += 1;
                    let matched = entry
                        .path
                        .file_name()
                        .map(|name| self.is_match(&name.to_string_lossy()))
                        .unwrap_or(false);
                    if !matched {
                        continue;
                    }
                    self.delete(&entry.path, &mut summary).await
                }
                WalkItem::Error { path, detail } => {
                    log::warn!("{}: {}", path.display(), detail);
                    summary.errors += 1;
                    ReportRow::new(Action::Error, path, detail)
                }
            };
            sender.send(ReportMessage::Row(row)).await?;
        }

        walk_handle
            .await
            .map_err(|e| Error::with_source("Traversal task failed", Box::new(e)))?;

        log::info!("Purge of {} finished: {}", root.display(), summary);
        let stats = RunStats::purge(root, &summary, started.elapsed());
        sender.send(ReportMessage::Summary(Arc::new(stats))).await?;
        Ok(summary)
    }

    async fn delete(&self, path: &Path, summary: &mut PurgeSummary) -> ReportRow {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                summary.deleted += 1;
                log::debug!("Deleted {}", path.display());
                ReportRow::new(Action::Delete, path, chrono::Local::now().to_rfc3339())
            }
            Err(e) => {
                summary.errors += 1;
                log::warn!("Failed to delete {}: {}", path.display(), e);
                ReportRow::new(Action::Error, path, format!("Delete error: {e}"))
            }
        }
    }
}

/// 清理参数
#[derive(Debug, Clone)]
pub struct PurgeParams {
    pub path: PathBuf,
    pub cancel: CancelFlag,
}

/// 按当前配置执行一次清理：启动消费者、遍历删除、输出汇总
pub async fn purge(params: PurgeParams) -> Result<PurgeSummary> {
    let app_config = AppConfig::fetch().map_err(|e| {
        Error::with_source("Failed to load application configuration", Box::new(e))
    })?;
    log::info!(
        "Purging {} with {} patterns",
        params.path.display(),
        app_config.purge.patterns.len()
    );

    let mut consumer_manager = ConsumerManager::with_config(&ConsumerConfig::for_purge(&app_config));
    consumer_manager.start_consumers().await?;

    let purger = Purger::new(
        &app_config.purge.patterns,
        TraversalPolicy::from(&app_config.traversal),
        app_config.remediate.queue_capacity,
    )
    .with_cancel(params.cancel);

    let result = purger.run(&params.path, consumer_manager.sender()).await;
    consumer_manager.shutdown().await?;
    result
}
