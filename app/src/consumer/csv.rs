use crate::consumer::{Consumer, ReportMessage};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use utils::error::Result;

const HEADER: [&str; 3] = ["Action", "Path", "Details"];

/// CSV 报告消费者 - `<prefix>_<YYYYmmdd_HHMMSS>.csv`
pub struct CsvConsumer {
    path: PathBuf,
}

impl CsvConsumer {
    pub fn new(directory: impl AsRef<Path>, file_prefix: &str) -> Self {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        Self {
            path: directory
                .as_ref()
                .join(format!("{}_{}.csv", file_prefix, stamp)),
        }
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl Consumer for CsvConsumer {
    async fn start(
        &mut self, receiver: mpsc::Receiver<ReportMessage>,
    ) -> Result<tokio::task::JoinHandle<Result<()>>> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(&self.path)?;
        writer.write_record(HEADER)?;
        log::info!("Writing report to {}", self.path.display());

        let path = self.path.clone();
        let handle = tokio::task::spawn_blocking(move || write_rows(writer, receiver, path));

        Ok(handle)
    }

    fn name(&self) -> &'static str {
        "csv_consumer"
    }
}

// File writes stay off the async workers.
fn write_rows(
    mut writer: csv::Writer<std::fs::File>, mut receiver: mpsc::Receiver<ReportMessage>,
    path: PathBuf,
) -> Result<()> {
    while let Some(message) = receiver.blocking_recv() {
        if let ReportMessage::Complete = message {
            break;
        }
        for row in message.rows() {
            writer.serialize(&row)?;
        }
    }
    writer.flush()?;
    log::info!("Report written to {}", path.display());
    Ok(())
}
