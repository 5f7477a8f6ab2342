use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utils::app_config::AppConfig;

/// CSV 报告位置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvReportConfig {
    pub directory: PathBuf,
    pub file_prefix: String,
}

/// 消费者配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// 是否启用控制台消费者
    pub enable_console: bool,
    /// 是否启用日志消费者
    pub enable_log: bool,
    /// CSV 报告，`None` 表示不写报告文件
    pub csv: Option<CsvReportConfig>,
    /// 每个消费者的通道容量
    pub channel_capacity: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            enable_console: false,
            enable_log: false,
            csv: None,
            channel_capacity: 1000,
        }
    }
}

impl ConsumerConfig {
    /// 修复运行：控制台、日志，以及按 `[report]` 配置的 CSV
    pub fn for_remediation(config: &AppConfig) -> Self {
        Self::with_report(config, &config.report.file_prefix)
    }

    /// 清理运行：与修复共用报告目录，文件前缀取自 `[purge]`
    pub fn for_purge(config: &AppConfig) -> Self {
        Self::with_report(config, &config.purge.file_prefix)
    }

    fn with_report(config: &AppConfig, file_prefix: &str) -> Self {
        let csv = config.report.enabled.then(|| CsvReportConfig {
            directory: PathBuf::from(&config.report.directory),
            file_prefix: file_prefix.to_string(),
        });
        Self {
            enable_console: true,
            enable_log: true,
            csv,
            channel_capacity: config.remediate.queue_capacity.max(1),
        }
    }

    /// 仅日志消费者
    pub fn log_only() -> Self {
        Self {
            enable_log: true,
            ..Default::default()
        }
    }
}
