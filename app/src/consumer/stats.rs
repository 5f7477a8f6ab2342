use crate::purge::PurgeSummary;
use crate::remediate::outcome::{RunSummary, ReportRow};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// 运行统计 - 控制台汇总块与 SUMMARY 行
#[derive(Debug, Clone, Serialize)]
pub struct RunStats {
    pub title: &'static str,
    pub command: String,
    pub root: PathBuf,
    pub total_time: String,
    pub log_path: String,
    /// 按显示顺序排列的计数
    pub counters: Vec<(&'static str, usize)>,
    pub summary_row: ReportRow,
}

impl RunStats {
    pub fn remediation(root: &Path, summary: &RunSummary, elapsed: Duration) -> Self {
        Self {
            title: "Remediation Statistics",
            command: format!("sidclean clean \"{}\"", root.display()),
            root: root.to_path_buf(),
            total_time: format_elapsed(elapsed),
            log_path: Self::build_log_path(),
            counters: vec![
                ("Processed", summary.processed),
                ("Unchanged", summary.unchanged),
                ("Updated", summary.updated),
                ("ACL updated", summary.acl_updated),
                ("Owners changed", summary.owners_changed),
                ("ACL entries removed", summary.acl_entries_removed),
                ("Errors", summary.errors),
            ],
            summary_row: summary.row(root),
        }
    }

    pub fn purge(root: &Path, summary: &PurgeSummary, elapsed: Duration) -> Self {
        Self {
            title: "Purge Statistics",
            command: format!("sidclean purge \"{}\"", root.display()),
            root: root.to_path_buf(),
            total_time: format_elapsed(elapsed),
            log_path: Self::build_log_path(),
            counters: vec![
                ("Scanned", summary.scanned),
                ("Deleted", summary.deleted),
                ("Errors", summary.errors),
            ],
            summary_row: summary.row(root),
        }
    }

    /// 日志文件路径，与日志模块使用同一目录
    pub fn build_log_path() -> String {
        utils::logger::log_directory()
            .unwrap_or_else(|_| PathBuf::from("logs"))
            .join("sidclean.log")
            .to_string_lossy()
            .to_string()
    }

    pub fn counter(&self, name: &str) -> Option<usize> {
        self.counters
            .iter()
            .find(|(label, _)| *label == name)
            .map(|(_, value)| *value)
    }
}

pub fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}

impl fmt::Display for RunStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            " =================================================================="
        )?;
        writeln!(f, "{:^68}", self.title)?;
        writeln!(
            f,
            " =================================================================="
        )?;
        writeln!(f)?;
        writeln!(f, "   Command    :    {}", self.command)?;
        writeln!(f, "   Total time :    {}", self.total_time)?;
        writeln!(f, "   Log Path   :    {}", self.log_path)?;
        writeln!(f)?;
        writeln!(
            f,
            " ---------------------------- Objects ----------------------------"
        )?;
        for (label, value) in &self.counters {
            writeln!(f, "   {:<44}{}", format!("{label}:"), value)?;
        }
        writeln!(
            f,
            " ================================================================="
        )
    }
}
