use crate::consumer::{Consumer, ReportMessage};
use crate::remediate::outcome::Action;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use utils::error::Result;

const PROGRESS_INTERVAL: Duration = Duration::from_secs(10);

/// 控制台消费者 - 定期打印进度，结束时打印汇总块
pub struct ConsoleConsumer {
    progress_interval: Duration,
}

impl ConsoleConsumer {
    pub fn new() -> Self {
        Self {
            progress_interval: PROGRESS_INTERVAL,
        }
    }
}

impl Default for ConsoleConsumer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl Consumer for ConsoleConsumer {
    async fn start(
        &mut self, mut receiver: mpsc::Receiver<ReportMessage>,
    ) -> Result<tokio::task::JoinHandle<Result<()>>> {
        let interval = self.progress_interval;
        let handle = tokio::spawn(async move {
            let mut items = 0usize;
            let mut errors = 0usize;
            let mut last_progress_time = Instant::now();

            println!("sidclean {}\n", env!("CARGO_PKG_VERSION"));

            while let Some(message) = receiver.recv().await {
                match &message {
                    ReportMessage::Summary(stats) => {
                        println!("\n{}", stats);
                    }
                    ReportMessage::Complete => {
                        log::debug!("[ConsoleConsumer] Run completed");
                        break;
                    }
                    _ => {
                        if message.is_item() {
                            items += 1;
                        }
                        errors += message
                            .rows()
                            .iter()
                            .filter(|row| row.action == Action::Error)
                            .count();
                    }
                }

                // 每10秒打印一次进度
                if last_progress_time.elapsed() >= interval {
                    let now = chrono::Local::now();
                    println!(
                        "[{}] Progress: {} objects, {} errors",
                        now.format("%Y-%m-%d %H:%M:%S"),
                        items,
                        errors
                    );
                    last_progress_time = Instant::now();
                }
            }
            Ok(())
        });

        Ok(handle)
    }

    fn name(&self) -> &'static str {
        "console_consumer"
    }
}
