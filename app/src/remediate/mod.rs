pub mod engine;
pub mod outcome;
pub mod owner;
pub mod reader;
pub mod rebuild;
pub mod resolver;
pub mod run;
pub mod writer;

pub use engine::{RemediationEngine, RemediationOptions};
pub use outcome::{Action, RemediationOutcome, ReportRow, RunSummary, Stage};
pub use owner::OwnerReplacer;
pub use run::{clean, CleanParams, RemediationRun};
