// Glxpipe - SpikeGLX spike sorting pipeline runner
// CLI entry point

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use glxpipe::{load_config, Orchestrator, ProcessRunner};

#[derive(Debug, Parser)]
#[command(name = "glxpipe", about = "SpikeGLX spike sorting pipeline runner")]
struct Cli {
    /// Path to the pipeline configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Log at debug level, overriding RUST_LOG
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    ensure_log_filter(cli.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match load_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("could not load {}: {}", cli.config.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let runner = ProcessRunner::new(config.python.clone(), config.module_package.clone());
    let summary = Orchestrator::new(&config, &runner).run_batch();

    info!(
        "batch finished: {} completed, {} failed",
        summary.completed.len(),
        summary.failed.len()
    );
    for (run_name, e) in &summary.failed {
        error!("{}: {}", run_name, e);
    }
    if summary.all_completed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn ensure_log_filter(verbose: bool) {
    if verbose {
        env::set_var("RUST_LOG", "debug");
        return;
    }
    if env::var("RUST_LOG").is_ok() {
        return;
    }
    env::set_var("RUST_LOG", "info");
}
