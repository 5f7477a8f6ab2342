use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::Serialize;
use utils::error::{Error, Result};

use crate::walk::{spawn_walk, CancelFlag, SubtreeGate, TraversalPolicy, WalkItem};

/// 文件计数结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CountSummary {
    /// 普通文件数量，不含目录
    pub files: usize,
    /// 遍历时遇到的错误，不计入文件数
    pub errors: usize,
    pub elapsed: Duration,
}

impl fmt::Display for CountSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scan finished in: {:.3} seconds", self.elapsed.as_secs_f64())?;
        write!(f, "Number of files: {}", self.files)
    }
}

/// 统计目录树下的文件数量
pub async fn count_files(
    root: &Path, policy: TraversalPolicy, cancel: CancelFlag, queue_capacity: usize,
) -> Result<CountSummary> {
    let started = Instant::now();
    let (mut rx, handle) = spawn_walk(
        root.to_path_buf(),
        policy,
        SubtreeGate::new(),
        cancel,
        queue_capacity,
    );

    let (mut files, mut errors) = (0, 0);
    while let Some(item) = rx.recv().await {
        match item {
            WalkItem::Entry(entry) if !entry.is_dir => files += 1,
            WalkItem::Entry(_) => {}
            WalkItem::Error { path, detail } => {
                log::debug!("{}: {}", path.display(), detail);
                errors += 1;
            }
        }
    }
    handle
        .await
        .map_err(|e| Error::with_source("Traversal task failed", Box::new(e)))?;

    let summary = CountSummary {
        files,
        errors,
        elapsed: started.elapsed(),
    };
    log::info!(
        "Counted {} files under {} ({} errors)",
        summary.files,
        root.display(),
        summary.errors
    );
    Ok(summary)
}
