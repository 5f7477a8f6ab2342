use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use security::SecurityService;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use utils::app_config::AppConfig;
use utils::error::{Error, Result};

use crate::consumer::config::ConsumerConfig;
use crate::consumer::{ConsumerManager, ReportMessage, ReportSender, RunStats};
use crate::remediate::engine::{RemediationEngine, RemediationOptions};
use crate::remediate::outcome::{RemediationOutcome, RunSummary, Stage};
use crate::walk::{spawn_walk, CancelFlag, SubtreeGate, TraversalPolicy, WalkEntry, WalkItem};

/// 修复运行 - 遍历生产者、工作池与结果收集
pub struct RemediationRun {
    engine: Arc<RemediationEngine>,
    policy: TraversalPolicy,
    workers: usize,
    queue_capacity: usize,
    cancel: CancelFlag,
}

impl RemediationRun {
    pub fn new(
        engine: RemediationEngine, policy: TraversalPolicy, workers: usize, queue_capacity: usize,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            policy,
            workers: workers.max(1),
            queue_capacity: queue_capacity.max(1),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// 处理根目录下的所有对象，返回从结果中累计的汇总
    pub async fn run(&self, root: &Path, mut sender: ReportSender) -> Result<RunSummary> {
        let started = Instant::now();
        let gate = SubtreeGate::new();
        log::info!(
            "Remediating {} with {} workers (clean ACL: {}, replace owner: {})",
            root.display(),
            self.workers,
            self.engine.options().clean_acl,
            self.engine.options().replace_owner
        );

        let (mut walk_rx, walk_handle) = spawn_walk(
            root.to_path_buf(),
            self.policy.clone(),
            gate.clone(),
            self.cancel.clone(),
            self.queue_capacity,
        );
        let (path_tx, path_rx) = mpsc::channel::<WalkEntry>(self.queue_capacity);
        let path_rx = Arc::new(Mutex::new(path_rx));
        let (report_tx, mut report_rx) = mpsc::channel::<ReportMessage>(self.queue_capacity);

        let workers: Vec<JoinHandle<()>> = (0..self.workers)
            .map(|id| {
                spawn_worker(
                    id,
                    self.engine.clone(),
                    path_rx.clone(),
                    report_tx.clone(),
                    gate.clone(),
                    self.policy.skip_denied_subtrees,
                )
            })
            .collect();

        // 遍历条目交给工作池，遍历错误直接进入结果流
        let error_tx = report_tx;
        let dispatcher = tokio::spawn(async move {
            while let Some(item) = walk_rx.recv().await {
                match item {
                    WalkItem::Entry(entry) => {
                        if path_tx.send(entry).await.is_err() {
                            break;
                        }
                    }
                    WalkItem::Error { path, detail } => {
                        log::warn!("{}: {}", path.display(), detail);
                        let message = ReportMessage::WalkError { path, detail };
                        if error_tx.send(message).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let mut summary = RunSummary::default();
        let mut reporting = true;
        while let Some(message) = report_rx.recv().await {
            match &message {
                ReportMessage::Outcome(outcome) => summary.record(outcome),
                ReportMessage::WalkError { .. } => summary.record_walk_error(),
                _ => {}
            }
            if reporting {
                if let Err(e) = sender.send(message).await {
                    log::error!("Reports are no longer delivered: {}", e);
                    reporting = false;
                }
            }
        }

        dispatcher
            .await
            .map_err(|e| Error::with_source("Dispatcher task failed", Box::new(e)))?;
        for worker in workers {
            worker
                .await
                .map_err(|e| Error::with_source("Worker task failed", Box::new(e)))?;
        }
        walk_handle
            .await
            .map_err(|e| Error::with_source("Traversal task failed", Box::new(e)))?;

        if !summary.is_reconciled() {
            log::error!("Summary does not reconcile: {}", summary);
        }
        log::info!("Remediation of {} finished: {}", root.display(), summary);

        if reporting {
            let stats = RunStats::remediation(root, &summary, started.elapsed());
            sender.send(ReportMessage::Summary(Arc::new(stats))).await?;
        }
        Ok(summary)
    }
}

fn spawn_worker(
    id: usize, engine: Arc<RemediationEngine>, paths: Arc<Mutex<mpsc::Receiver<WalkEntry>>>,
    reports: mpsc::Sender<ReportMessage>, gate: SubtreeGate, skip_denied_subtrees: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let entry = {
                let mut receiver = paths.lock().await;
                receiver.recv().await
            };
            let Some(entry) = entry else {
                break;
            };

            let outcome = process(engine.clone(), entry.path.clone()).await;
            if skip_denied_subtrees && entry.is_dir && outcome.access_denied {
                gate.deny(&entry.path);
            }
            if reports
                .send(ReportMessage::Outcome(Arc::new(outcome)))
                .await
                .is_err()
            {
                break;
            }
        }
        log::debug!("Worker {} finished", id);
    })
}

/// 在阻塞线程上执行单个对象的管道
async fn process(engine: Arc<RemediationEngine>, path: PathBuf) -> RemediationOutcome {
    let task_path = path.clone();
    match tokio::task::spawn_blocking(move || engine.process(&task_path)).await {
        Ok(outcome) => outcome,
        Err(e) => {
            log::error!("Remediation task for {} failed: {}", path.display(), e);
            let mut outcome = RemediationOutcome::new(path);
            outcome.fail(Stage::Pending, format!("Remediation task failed: {e}"));
            outcome
        }
    }
}

/// 修复参数（命令行覆盖项）
#[derive(Debug, Clone, Default)]
pub struct CleanParams {
    pub path: PathBuf,
    pub acl_only: bool,
    pub owner_only: bool,
    pub new_owner: Option<String>,
    pub workers: Option<usize>,
    pub cancel: CancelFlag,
}

impl CleanParams {
    /// 在配置的基础上应用命令行开关
    pub fn options(&self, config: &AppConfig) -> RemediationOptions {
        let mut options = RemediationOptions::from(&config.remediate);
        if self.acl_only {
            options.clean_acl = true;
            options.replace_owner = false;
        }
        if self.owner_only {
            options.clean_acl = false;
            options.replace_owner = true;
        }
        options
    }
}

/// 按当前配置执行一次修复运行
///
/// 替换主体无效时在产生任何路径之前返回错误；单个对象的失败只体现在报告中。
pub async fn clean(params: CleanParams, service: Arc<dyn SecurityService>) -> Result<RunSummary> {
    let app_config = AppConfig::fetch().map_err(|e| {
        Error::with_source("Failed to load application configuration", Box::new(e))
    })?;

    let options = params.options(&app_config);
    let principal = params
        .new_owner
        .clone()
        .unwrap_or_else(|| app_config.remediate.replacement_principal.clone());
    let engine = RemediationEngine::new(service, options, &principal)
        .map_err(|e| Error::with_source("Cannot start remediation", Box::new(e)))?;

    let mut consumer_manager =
        ConsumerManager::with_config(&ConsumerConfig::for_remediation(&app_config));
    consumer_manager.start_consumers().await?;

    let run = RemediationRun::new(
        engine,
        TraversalPolicy::from(&app_config.traversal),
        params.workers.unwrap_or(app_config.remediate.workers),
        app_config.remediate.queue_capacity,
    )
    .with_cancel(params.cancel);

    let result = run.run(&params.path, consumer_manager.sender()).await;
    consumer_manager.shutdown().await?;
    result
}
