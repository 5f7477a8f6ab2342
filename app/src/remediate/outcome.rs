use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// 报告行的动作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Unchanged,
    AclUpdated,
    OwnerChanged,
    Error,
    Info,
    Summary,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Unchanged => "UNCHANGED",
            Action::AclUpdated => "ACL_UPDATED",
            Action::OwnerChanged => "OWNER_CHANGED",
            Action::Error => "ERROR",
            Action::Info => "INFO",
            Action::Summary => "SUMMARY",
            Action::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一行报告：`Action,Path,Details`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    #[serde(rename = "Action")]
    pub action: Action,
    #[serde(rename = "Path")]
    pub path: String,
    #[serde(rename = "Details")]
    pub details: String,
}

impl ReportRow {
    pub fn new(action: Action, path: impl AsRef<Path>, details: impl Into<String>) -> Self {
        Self {
            action,
            path: path.as_ref().display().to_string(),
            details: details.into(),
        }
    }
}

/// 单个对象的处理阶段
///
/// `Pending -> Read -> Classified -> (Unchanged | Rebuilt) -> (Written | WriteFailed)`,
/// 读取失败时为 `Pending -> ReadFailed`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Pending,
    Read,
    ReadFailed,
    Classified,
    Unchanged,
    Rebuilt,
    Written,
    WriteFailed,
}

impl Stage {
    /// 管道在此阶段结束
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Stage::ReadFailed | Stage::Unchanged | Stage::Written | Stage::WriteFailed
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub action: Action,
    pub detail: String,
}

/// 单个对象的处理结果
#[derive(Debug, Clone, Serialize)]
pub struct RemediationOutcome {
    pub path: PathBuf,
    /// 管道到达的最后阶段；分类失败时停在 `Read`
    pub stage: Stage,
    pub original_entries: usize,
    pub kept_entries: usize,
    pub acl_updated: bool,
    pub owner_changed: bool,
    /// 写入前的所有者（仅当计划替换时）
    pub previous_owner: Option<String>,
    pub new_owner: Option<String>,
    pub events: Vec<Event>,
    pub error: Option<String>,
    /// 读取描述符时被拒绝访问
    pub access_denied: bool,
}

impl RemediationOutcome {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            stage: Stage::Pending,
            original_entries: 0,
            kept_entries: 0,
            acl_updated: false,
            owner_changed: false,
            previous_owner: None,
            new_owner: None,
            events: Vec::new(),
            error: None,
            access_denied: false,
        }
    }

    pub fn info(&mut self, detail: impl Into<String>) {
        self.events.push(Event {
            action: Action::Info,
            detail: detail.into(),
        });
    }

    pub fn fail(&mut self, stage: Stage, error: impl fmt::Display) {
        self.stage = stage;
        self.error = Some(error.to_string());
    }

    pub fn removed_entries(&self) -> usize {
        if self.acl_updated {
            self.original_entries - self.kept_entries
        } else {
            0
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_unchanged(&self) -> bool {
        !self.is_error() && !self.acl_updated && !self.owner_changed
    }

    /// 渲染为报告行：先 INFO，再 ACL_UPDATED / OWNER_CHANGED，或 UNCHANGED，最后 ERROR
    pub fn rows(&self) -> Vec<ReportRow> {
        let mut rows: Vec<ReportRow> = self
            .events
            .iter()
            .map(|e| ReportRow::new(e.action, &self.path, e.detail.clone()))
            .collect();

        if self.acl_updated {
            rows.push(ReportRow::new(
                Action::AclUpdated,
                &self.path,
                format!(
                    "ACL cleaned: {} of {} entries removed",
                    self.removed_entries(),
                    self.original_entries
                ),
            ));
        }
        if self.owner_changed {
            let new_owner = self.new_owner.as_deref().unwrap_or("?");
            let details = match &self.previous_owner {
                Some(previous) => format!("New owner set: {new_owner} (was {previous})"),
                None => format!("New owner set: {new_owner}"),
            };
            rows.push(ReportRow::new(Action::OwnerChanged, &self.path, details));
        }
        match &self.error {
            Some(error) => rows.push(ReportRow::new(Action::Error, &self.path, error.clone())),
            None if self.is_unchanged() => rows.push(ReportRow::new(
                Action::Unchanged,
                &self.path,
                format!("{} entries checked", self.original_entries),
            )),
            None => {}
        }
        rows
    }
}

/// 整个运行的汇总，只从结果记录中累计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub processed: usize,
    pub unchanged: usize,
    /// 成功更新（ACL 或所有者）的对象数
    pub updated: usize,
    pub acl_updated: usize,
    pub owners_changed: usize,
    pub acl_entries_removed: usize,
    pub errors: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &RemediationOutcome) {
        self.processed += 1;
        if outcome.acl_updated {
            self.acl_updated += 1;
            self.acl_entries_removed += outcome.removed_entries();
        }
        if outcome.owner_changed {
            self.owners_changed += 1;
        }

        if outcome.is_error() {
            self.errors += 1;
        } else if outcome.is_unchanged() {
            self.unchanged += 1;
        } else {
            self.updated += 1;
        }
    }

    /// 遍历错误也算作一个已处理的对象
    pub fn record_walk_error(&mut self) {
        self.processed += 1;
        self.errors += 1;
    }

    pub fn is_reconciled(&self) -> bool {
        self.processed == self.unchanged + self.updated + self.errors
    }

    pub fn row(&self, root: impl AsRef<Path>) -> ReportRow {
        ReportRow::new(Action::Summary, root, self.to_string())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Processed: {}, Unchanged: {}, ACL updated: {}, Owners changed: {}, ACL entries removed: {}, Errors: {}",
            self.processed,
            self.unchanged,
            self.acl_updated,
            self.owners_changed,
            self.acl_entries_removed,
            self.errors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updated() -> RemediationOutcome {
        let mut outcome = RemediationOutcome::new("C:\\data\\report.xlsx");
        outcome.stage = Stage::Written;
        outcome.original_entries = 3;
        outcome.kept_entries = 2;
        outcome.acl_updated = true;
        outcome.owner_changed = true;
        outcome.previous_owner = Some("S-1-5-21-1-2-3-1104".to_string());
        outcome.new_owner = Some("S-1-5-32-544".to_string());
        outcome.info("Orphaned SID removed: S-1-5-21-1-2-3-1104 (allow, 0x001f01ff)");
        outcome
    }

    #[test]
    fn rows_put_info_first() {
        let actions: Vec<Action> = updated().rows().into_iter().map(|r| r.action).collect();
        assert_eq!(
            actions,
            vec![Action::Info, Action::AclUpdated, Action::OwnerChanged]
        );
    }

    #[test]
    fn unchanged_outcome_has_single_row() {
        let mut outcome = RemediationOutcome::new("/srv/share/a");
        outcome.stage = Stage::Unchanged;
        outcome.original_entries = 4;
        outcome.kept_entries = 4;
        let rows = outcome.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, Action::Unchanged);
        assert_eq!(rows[0].details, "4 entries checked");
    }

    #[test]
    fn partial_write_reports_applied_half_and_error() {
        let mut outcome = updated();
        outcome.owner_changed = false;
        outcome.fail(Stage::WriteFailed, "Partial write");
        let actions: Vec<Action> = outcome.rows().into_iter().map(|r| r.action).collect();
        assert_eq!(actions, vec![Action::Info, Action::AclUpdated, Action::Error]);

        let mut summary = RunSummary::default();
        summary.record(&outcome);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.acl_entries_removed, 1);
        assert!(summary.is_reconciled());
    }

    #[test]
    fn summary_reconciles() {
        let mut summary = RunSummary::default();
        summary.record(&updated());
        let mut clean = RemediationOutcome::new("b");
        clean.stage = Stage::Unchanged;
        summary.record(&clean);
        summary.record_walk_error();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.updated, 1);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.errors, 1);
        assert_eq!(summary.owners_changed, 1);
        assert!(summary.is_reconciled());
        assert!(summary.row("C:\\data").details.starts_with("Processed: 3, Unchanged: 1"));
    }

    #[test]
    fn action_names_match_report_format() {
        assert_eq!(Action::AclUpdated.to_string(), "ACL_UPDATED");
        assert_eq!(Action::OwnerChanged.to_string(), "OWNER_CHANGED");
    }
}
