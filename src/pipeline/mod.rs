// Pipeline execution module
// Orchestrates the full extraction-sort-align sequence for each run

pub mod gfix;
pub mod orchestrator;
pub mod runlog;

pub use gfix::{parse_catgt_log, CorrectionVector, GfixError};
pub use orchestrator::{BatchSummary, Orchestrator, PipelineError};
pub use runlog::{read_run_log, RunLog, RunLogEntry, RunLogError};
