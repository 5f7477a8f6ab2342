use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use utils::error::{Error, Result};

use crate::consumer::config::ConsumerConfig;
use crate::consumer::{ConsoleConsumer, Consumer, CsvConsumer, LogConsumer, ReportMessage, ReportSender};

/// 消费者管理器 - 管理多个消费者
pub struct ConsumerManager {
    /// 每个消费者的通道容量
    channel_capacity: usize,
    /// 消费者列表
    consumers: Vec<Box<dyn Consumer>>,
    /// 已启动消费者的发送端
    senders: Vec<(&'static str, mpsc::Sender<ReportMessage>)>,
    handles: Vec<(&'static str, JoinHandle<Result<()>>)>,
}

impl ConsumerManager {
    /// 创建不带任何消费者的管理器
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            channel_capacity: channel_capacity.max(1),
            consumers: Vec::new(),
            senders: Vec::new(),
            handles: Vec::new(),
        }
    }

    /// 根据配置创建消费者管理器
    pub fn with_config(config: &ConsumerConfig) -> Self {
        let mut manager = Self::new(config.channel_capacity);

        if config.enable_log {
            manager.add_consumer(Box::new(LogConsumer));
        }
        if let Some(csv) = &config.csv {
            manager.add_consumer(Box::new(CsvConsumer::new(&csv.directory, &csv.file_prefix)));
        }
        if config.enable_console {
            manager.add_consumer(Box::new(ConsoleConsumer::new()));
        }

        manager
    }

    /// 添加消费者
    pub fn add_consumer(&mut self, consumer: Box<dyn Consumer>) {
        self.consumers.push(consumer);
    }

    /// 启动所有消费者，每个消费者一个独立的有界通道
    pub async fn start_consumers(&mut self) -> Result<()> {
        for consumer in &mut self.consumers {
            let (sender, receiver) = mpsc::channel(self.channel_capacity);
            let handle = consumer.start(receiver).await?;
            log::debug!("Consumer {} started", consumer.name());
            self.senders.push((consumer.name(), sender));
            self.handles.push((consumer.name(), handle));
        }
        Ok(())
    }

    /// 获取发送端
    pub fn sender(&self) -> ReportSender {
        ReportSender::new(self.senders.clone())
    }

    /// 获取消费者数量
    pub fn get_consumer_count(&self) -> usize {
        self.consumers.len()
    }

    /// 发送完成消息并等待所有消费者退出
    ///
    /// 返回第一个失败消费者的错误。
    pub async fn shutdown(&mut self) -> Result<()> {
        for (_, sender) in self.senders.drain(..) {
            // 消费者可能已经退出
            let _ = sender.send(ReportMessage::Complete).await;
        }

        let mut first_error = None;
        for (name, handle) in self.handles.drain(..) {
            let result = handle.await.map_err(|e| {
                Error::with_source(format!("Consumer {name} task failed"), Box::new(e))
            });
            if let Err(e) = result.and_then(|r| r) {
                log::error!("Consumer {} failed: {}", name, e);
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
