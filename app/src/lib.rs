pub mod consumer;
pub mod count;
pub mod purge;
pub mod remediate;
pub mod walk;

/// 公共API的prelude模块
/// 用户可以通过 `use app::prelude::*` 来导入最常用的类型
pub mod prelude {
    pub use crate::consumer::config::ConsumerConfig;
    pub use crate::consumer::{
        ConsoleConsumer, Consumer, ConsumerManager, CsvConsumer, LogConsumer, ReportMessage,
        ReportSender,
    };
    pub use crate::count::{count_files, CountSummary};
    pub use crate::purge::{purge, PurgeParams, PurgeSummary, Purger};
    pub use crate::remediate::{
        clean, CleanParams, RemediationEngine, RemediationOptions, RemediationOutcome,
        RemediationRun, RunSummary,
    };
    pub use crate::walk::{CancelFlag, SubtreeGate, TraversalPolicy};
}
