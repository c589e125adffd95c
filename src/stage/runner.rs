// External stage invocation
// Every stage runs as a separate blocking child process; the pipeline waits on
// the exit status before anything else happens. Stage stdout/stderr pass
// straight through to the operator.

use std::path::Path;
use std::process::Command;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("stage {stage} exited with code {exit_code}")]
    StageFailure { stage: String, exit_code: i32 },

    #[error("failed to spawn stage {stage}: {source}")]
    Spawn {
        stage: String,
        source: std::io::Error,
    },
}

/// Invokes one external processing stage by name, blocking until it exits
pub trait StageRunner {
    fn run_stage(
        &self,
        stage: &str,
        input_json: &Path,
        output_json: &Path,
    ) -> Result<(), RunnerError>;
}

/// Runs stages through the Python module entry points shipped with the
/// processing toolchain:
/// `{program} -W ignore -m {package}.{stage} --input_json <in> --output_json <out>`
///
/// Arguments are passed as a discrete vector, never assembled into a shell
/// string, so paths with spaces survive intact.
pub struct ProcessRunner {
    program: String,
    module_package: String,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>, module_package: impl Into<String>) -> Self {
        ProcessRunner {
            program: program.into(),
            module_package: module_package.into(),
        }
    }
}

impl StageRunner for ProcessRunner {
    fn run_stage(
        &self,
        stage: &str,
        input_json: &Path,
        output_json: &Path,
    ) -> Result<(), RunnerError> {
        tracing::info!("running stage {} with {}", stage, input_json.display());

        let status = Command::new(&self.program)
            .args(["-W", "ignore", "-m"])
            .arg(format!("{}.{}", self.module_package, stage))
            .arg("--input_json")
            .arg(input_json)
            .arg("--output_json")
            .arg(output_json)
            .status()
            .map_err(|source| RunnerError::Spawn {
                stage: stage.to_string(),
                source,
            })?;

        if status.success() {
            tracing::info!("stage {} finished", stage);
            Ok(())
        } else {
            // Termination by signal carries no exit code; report -1
            let exit_code = status.code().unwrap_or(-1);
            Err(RunnerError::StageFailure {
                stage: stage.to_string(),
                exit_code,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn doc_paths() -> (PathBuf, PathBuf) {
        (
            PathBuf::from("/tmp/in.json"),
            PathBuf::from("/tmp/out.json"),
        )
    }

    #[test]
    #[cfg(unix)]
    fn test_zero_exit_is_success() {
        // `true` ignores its arguments and exits 0
        let runner = ProcessRunner::new("true", "ecephys.modules");
        let (input, output) = doc_paths();
        assert!(runner.run_stage("kilosort_helper", &input, &output).is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn test_nonzero_exit_is_stage_failure() {
        let runner = ProcessRunner::new("false", "ecephys.modules");
        let (input, output) = doc_paths();
        match runner.run_stage("kilosort_helper", &input, &output) {
            Err(RunnerError::StageFailure { stage, exit_code }) => {
                assert_eq!(stage, "kilosort_helper");
                assert_eq!(exit_code, 1);
            }
            other => panic!("expected StageFailure, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let runner = ProcessRunner::new("glxpipe-no-such-interpreter", "ecephys.modules");
        let (input, output) = doc_paths();
        assert!(matches!(
            runner.run_stage("catGT_helper", &input, &output),
            Err(RunnerError::Spawn { .. })
        ));
    }
}
