use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use utils::error::{Error, Result};

use crate::remediate::outcome::{Action, RemediationOutcome, ReportRow};

pub mod config;
pub mod console;
pub mod csv;
pub mod log;
pub mod manager;
pub mod stats;

pub use console::ConsoleConsumer;
pub use csv::CsvConsumer;
pub use log::LogConsumer;
pub use manager::ConsumerManager;
pub use stats::RunStats;

/// 发往消费者的报告消息
#[derive(Debug, Clone)]
pub enum ReportMessage {
    /// 单个对象的修复结果
    Outcome(Arc<RemediationOutcome>),
    /// 遍历错误
    WalkError { path: PathBuf, detail: String },
    /// 已渲染好的行（清理运行的 DELETE / ERROR）
    Row(ReportRow),
    /// 运行结束时的汇总
    Summary(Arc<RunStats>),
    /// 不会再有消息
    Complete,
}

impl ReportMessage {
    /// 渲染为报告行
    pub fn rows(&self) -> Vec<ReportRow> {
        match self {
            ReportMessage::Outcome(outcome) => outcome.rows(),
            ReportMessage::WalkError { path, detail } => {
                vec![ReportRow::new(Action::Error, path, detail.clone())]
            }
            ReportMessage::Row(row) => vec![row.clone()],
            ReportMessage::Summary(stats) => vec![stats.summary_row.clone()],
            ReportMessage::Complete => Vec::new(),
        }
    }

    /// 是否算作一个被处理的对象（用于进度显示）
    pub fn is_item(&self) -> bool {
        matches!(
            self,
            ReportMessage::Outcome(_) | ReportMessage::WalkError { .. } | ReportMessage::Row(_)
        )
    }
}

/// 消费者 trait - 定义消费者接口
///
/// 每个消费者拥有自己的有界通道和任务，同一消费者收到的记录不会交错。
#[async_trait::async_trait]
pub trait Consumer: Send + Sync {
    /// 启动消费者
    async fn start(
        &mut self, receiver: mpsc::Receiver<ReportMessage>,
    ) -> Result<JoinHandle<Result<()>>>;

    /// 获取消费者名称
    fn name(&self) -> &'static str;
}

/// 向所有已启动消费者扇出消息的发送端
#[derive(Clone, Default)]
pub struct ReportSender {
    senders: Vec<(&'static str, mpsc::Sender<ReportMessage>)>,
}

impl ReportSender {
    pub(crate) fn new(senders: Vec<(&'static str, mpsc::Sender<ReportMessage>)>) -> Self {
        Self { senders }
    }

    /// 没有任何消费者时发送为空操作
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// 按顺序发送给每个消费者；通道满时等待，不丢弃记录
    ///
    /// 已退出的消费者会被移除，只有当最后一个消费者也退出时才返回错误。
    pub async fn send(&mut self, message: ReportMessage) -> Result<()> {
        if self.senders.is_empty() {
            return Ok(());
        }

        let mut stopped = Vec::new();
        for (index, (name, sender)) in self.senders.iter().enumerate() {
            if sender.send(message.clone()).await.is_err() {
                ::log::warn!("Consumer {} stopped receiving reports", name);
                stopped.push(index);
            }
        }
        for index in stopped.into_iter().rev() {
            self.senders.remove(index);
        }

        if self.senders.is_empty() {
            return Err(Error::new("All report consumers have stopped"));
        }
        Ok(())
    }
}
