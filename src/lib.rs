// Glxpipe - SpikeGLX spike sorting pipeline runner
// Module declarations

pub mod config;
pub mod pipeline;
pub mod spikeglx;
pub mod stage;

pub use config::{load_config, ConfigError, PipelineConfig, RunSpec};
pub use pipeline::{BatchSummary, Orchestrator, PipelineError};
pub use stage::{ProcessRunner, StageRunner};
