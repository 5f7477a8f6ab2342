use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use utils::app_config::TraversalConfig;
use walkdir::WalkDir;

/// 遍历策略 - 由调用方传入生产者，而不是通过异常控制流穿过核心
#[derive(Debug, Clone)]
pub struct TraversalPolicy {
    /// 0 表示不限深度
    pub max_depth: usize,
    pub follow_links: bool,
    /// 目录读取描述符被拒绝时跳过其子树
    pub skip_denied_subtrees: bool,
}

impl Default for TraversalPolicy {
    fn default() -> Self {
        Self {
            max_depth: 0,
            follow_links: false,
            skip_denied_subtrees: true,
        }
    }
}

impl From<&TraversalConfig> for TraversalPolicy {
    fn from(config: &TraversalConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            follow_links: config.follow_links,
            skip_denied_subtrees: config.skip_denied_subtrees,
        }
    }
}

/// 被拒绝访问的目录集合，工作线程写入，生产者据此剪枝
#[derive(Debug, Clone, Default)]
pub struct SubtreeGate {
    denied: Arc<RwLock<Vec<PathBuf>>>,
}

impl SubtreeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deny(&self, dir: impl Into<PathBuf>) {
        let dir = dir.into();
        log::info!("Skipping subtree of {}", dir.display());
        self.denied
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(dir);
    }

    /// 路径位于某个被拒绝目录之下（目录本身不算）
    pub fn is_gated(&self, path: &Path) -> bool {
        self.denied
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|dir| path != dir && path.starts_with(dir))
    }

    pub fn len(&self) -> usize {
        self.denied
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 取消标志（Ctrl-C），只停止生产者；已排队和进行中的对象会完成
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// 收到 Ctrl-C 时置位
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let flag = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received, finishing queued objects");
                flag.cancel();
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    pub path: PathBuf,
    pub is_dir: bool,
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkItem {
    Entry(WalkEntry),
    Error { path: PathBuf, detail: String },
}

/// 使用 walkdir 的流式遍历 - 在阻塞任务中运行，通过有界队列返回条目
pub fn spawn_walk(
    root: PathBuf, policy: TraversalPolicy, gate: SubtreeGate, cancel: CancelFlag,
    capacity: usize,
) -> (mpsc::Receiver<WalkItem>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));

    let handle = tokio::task::spawn_blocking(move || {
        let mut walker = WalkDir::new(&root)
            .follow_links(policy.follow_links)
            .max_open(100);
        if policy.max_depth > 0 {
            walker = walker.max_depth(policy.max_depth);
        }

        let skip_denied = policy.skip_denied_subtrees;
        let entries = walker
            .into_iter()
            .filter_entry(|entry| !(skip_denied && gate.is_gated(entry.path())));

        for item in entries {
            if cancel.is_cancelled() {
                log::warn!("Traversal of {} cancelled", root.display());
                break;
            }
            let message = match item {
                Ok(entry) => WalkItem::Entry(WalkEntry {
                    is_dir: entry.file_type().is_dir(),
                    depth: entry.depth(),
                    path: entry.into_path(),
                }),
                Err(e) => WalkItem::Error {
                    path: e
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| root.clone()),
                    detail: format!("Scan error: {e}"),
                },
            };
            if tx.blocking_send(message).is_err() {
                // 接收端已关闭
                break;
            }
        }
    });

    (rx, handle)
}
