// Pipeline Configuration - Startup settings for a batch of runs
// Loaded once from a JSON file, validated, then passed around by reference.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// One recording run to process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSpec {
    /// Run name as chosen in SpikeGLX (e.g. "SC024_092319_NP1.0_Midbrain")
    pub run_name: String,

    /// Gate index as recorded (e.g. "0")
    pub gate_index: String,

    /// Trigger range selector: "first,last" where either bound may be
    /// the sentinel "start" or "end"
    pub trigger_range: String,

    /// Probe selector: single id "0", comma list "0,3", or half-open
    /// range "0:3"
    pub probe_selector: String,
}

/// Full pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Root directory containing the raw SpikeGLX run folders
    pub npx_directory: PathBuf,

    /// Root directory for processed output (one subfolder per run spec)
    pub output_directory: PathBuf,

    /// Directory where stage input/output documents are written
    pub json_directory: PathBuf,

    /// Runs to process, in order
    pub run_specs: Vec<RunSpec>,

    /// Per-probe stage names, executed in order for every probe
    pub modules: Vec<String>,

    /// Whether to run the extraction stage (CatGT) for each run
    pub run_catgt: bool,

    /// CatGT stream selection string (e.g. "-ap -ni")
    pub catgt_stream_string: String,

    /// CatGT command string: filter and artifact-correction options
    pub catgt_cmd_string: String,

    /// Event extraction parameter for PSTH event detection
    #[serde(default)]
    pub event_ex_param_str: String,

    /// Whether to run the time-alignment stage (TPrime) for each run
    pub run_tprime: bool,

    /// Sync pulse period in seconds (typically 1.0)
    pub sync_period: f64,

    /// Sync channel parameters for the reference (to) stream
    pub tostream_sync_params: String,

    /// Sync channel parameters for the auxiliary NI stream, if present
    #[serde(default)]
    pub nistream_sync_params: Option<String>,

    /// Tag appended to per-probe sort output folders ("imec{p}_{tag}")
    #[serde(default = "default_sort_output_tag")]
    pub sort_output_tag: String,

    /// Whether the noise-template stage uses the RF classifier
    #[serde(default)]
    pub noise_template_use_rf: bool,

    /// Interpreter used to launch stages
    #[serde(default = "default_python")]
    pub python: String,

    /// Package root the stage modules live under
    #[serde(default = "default_module_package")]
    pub module_package: String,

    /// Directory the external tools write their logs to
    #[serde(default = "default_tool_log_directory")]
    pub tool_log_directory: PathBuf,
}

fn default_sort_output_tag() -> String {
    "ks2".to_string()
}

fn default_python() -> String {
    "python".to_string()
}

fn default_module_package() -> String {
    "ecephys_spike_sorting.modules".to_string()
}

fn default_tool_log_directory() -> PathBuf {
    PathBuf::from(".")
}

impl PipelineConfig {
    /// Check cross-field consistency after deserialization
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.npx_directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "npx_directory must not be empty".to_string(),
            ));
        }
        if self.output_directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "output_directory must not be empty".to_string(),
            ));
        }
        if self.json_directory.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "json_directory must not be empty".to_string(),
            ));
        }
        if self.run_specs.is_empty() {
            return Err(ConfigError::Invalid(
                "run_specs list is empty".to_string(),
            ));
        }
        for spec in &self.run_specs {
            if spec.run_name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "run_name must not be empty".to_string(),
                ));
            }
            if spec.gate_index.trim().is_empty()
                || !spec.gate_index.chars().all(|c| c.is_ascii_digit())
            {
                return Err(ConfigError::Invalid(format!(
                    "gate_index must be a digit string, got '{}' for run '{}'",
                    spec.gate_index, spec.run_name
                )));
            }
            if spec.trigger_range.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "trigger_range must not be empty for run '{}'",
                    spec.run_name
                )));
            }
            if spec.probe_selector.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "probe_selector must not be empty for run '{}'",
                    spec.run_name
                )));
            }
        }
        if self.sort_output_tag.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "sort_output_tag must not be empty".to_string(),
            ));
        }
        if !(self.sync_period > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sync_period must be positive, got {}",
                self.sync_period
            )));
        }
        Ok(())
    }
}

/// Load and validate a pipeline configuration file
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let contents = fs::read_to_string(path)?;
    let config: PipelineConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_config_value() -> serde_json::Value {
        serde_json::json!({
            "npx_directory": "/data/npx",
            "output_directory": "/data/out",
            "json_directory": "/data/json",
            "run_specs": [{
                "run_name": "SC024_092319_NP1.0_Midbrain",
                "gate_index": "0",
                "trigger_range": "start,end",
                "probe_selector": "0,1"
            }],
            "modules": ["kilosort_helper", "quality_metrics"],
            "run_catgt": true,
            "catgt_stream_string": "-ap -ni",
            "catgt_cmd_string": "-prb_fld -out_prb_fld -aphipass=300 -gbldmx -gfix=0.40,0.10,0.02",
            "run_tprime": true,
            "sync_period": 1.0,
            "tostream_sync_params": "SY=0,384,6,500"
        })
    }

    fn load_from_value(value: &serde_json::Value) -> Result<PipelineConfig, ConfigError> {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
        load_config(&path)
    }

    #[test]
    fn test_load_valid_config() {
        let config = load_from_value(&create_test_config_value()).unwrap();
        assert_eq!(config.run_specs.len(), 1);
        assert_eq!(config.run_specs[0].run_name, "SC024_092319_NP1.0_Midbrain");
        assert_eq!(config.modules.len(), 2);
        assert!(config.run_catgt);
    }

    #[test]
    fn test_defaults_are_applied() {
        let config = load_from_value(&create_test_config_value()).unwrap();
        assert_eq!(config.sort_output_tag, "ks2");
        assert_eq!(config.python, "python");
        assert_eq!(config.module_package, "ecephys_spike_sorting.modules");
        assert_eq!(config.tool_log_directory, PathBuf::from("."));
        assert!(!config.noise_template_use_rf);
        assert!(config.nistream_sync_params.is_none());
        assert_eq!(config.event_ex_param_str, "");
    }

    #[test]
    fn test_missing_field_is_a_parse_error() {
        let mut value = create_test_config_value();
        value.as_object_mut().unwrap().remove("npx_directory");
        let result = load_from_value(&value);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_empty_run_specs_rejected() {
        let mut value = create_test_config_value();
        value["run_specs"] = serde_json::json!([]);
        let result = load_from_value(&value);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_non_numeric_gate_rejected() {
        let mut value = create_test_config_value();
        value["run_specs"][0]["gate_index"] = serde_json::json!("g0");
        let result = load_from_value(&value);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_sync_period_rejected() {
        let mut value = create_test_config_value();
        value["sync_period"] = serde_json::json!(0.0);
        let result = load_from_value(&value);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, "{ not json").unwrap();
        let result = load_config(&path);
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file_is_an_io_error() {
        let result = load_config(Path::new("/nonexistent/pipeline.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
