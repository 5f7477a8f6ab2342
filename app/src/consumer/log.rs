use crate::consumer::{Consumer, ReportMessage};
use crate::remediate::outcome::Action;
use tokio::sync::mpsc;
use utils::error::Result;

/// 日志消费者 - 每个报告行一条日志记录
pub struct LogConsumer;

#[async_trait::async_trait]
impl Consumer for LogConsumer {
    async fn start(
        &mut self, mut receiver: mpsc::Receiver<ReportMessage>,
    ) -> Result<tokio::task::JoinHandle<Result<()>>> {
        let handle = tokio::spawn(async move {
            while let Some(message) = receiver.recv().await {
                if let ReportMessage::Complete = message {
                    log::debug!("[LogConsumer] Run completed");
                    break;
                }
                for row in message.rows() {
                    match row.action {
                        Action::Error => {
                            log::warn!("[{}] {} | {}", row.action, row.path, row.details)
                        }
                        Action::Unchanged => {
                            log::debug!("[{}] {} | {}", row.action, row.path, row.details)
                        }
                        _ => log::info!("[{}] {} | {}", row.action, row.path, row.details),
                    }
                }
            }
            Ok(())
        });

        Ok(handle)
    }

    fn name(&self) -> &'static str {
        "log_consumer"
    }
}
