// Pipeline Orchestrator - Drives a batch of recording runs end to end
// Fans each run out to extraction, per-probe stages, and alignment, threading
// the measured correction rates into every downstream stage document.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{PipelineConfig, RunSpec};
use crate::pipeline::gfix::{self, CorrectionVector, GfixError};
use crate::pipeline::runlog::{RunLog, RunLogEntry, RunLogError};
use crate::spikeglx::naming;
use crate::spikeglx::spec::{
    parse_probe_selector, resolve_trigger_range, SpecError, TriggerRange,
};
use crate::stage::document::{DocumentBuilder, DocumentError, StageKind};
use crate::stage::runner::{RunnerError, StageRunner};

/// Stage that concatenates triggers and corrects artifacts, once per run
pub const EXTRACTION_STAGE: &str = "catGT_helper";

/// Stage that aligns event times across streams, once per run
pub const ALIGNMENT_STAGE: &str = "tPrime_helper";

/// External tool logs removed before the first run of a batch, so the
/// correction parse can never pick up a previous batch's output
const TOOL_LOG_NAMES: [&str; 3] = ["CatGT.log", "Tprime.log", "C_Waves.log"];

/// Per-probe stages that rewrite the sorter output in place; their presence
/// means the original sorter output must be copied aside first
const SORT_MODIFYING_MODULES: [&str; 2] = ["kilosort_postprocessing", "noise_templates"];

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("selector error: {0}")]
    Spec(#[from] SpecError),

    #[error("stage document error: {0}")]
    Document(#[from] DocumentError),

    #[error("stage execution error: {0}")]
    Runner(#[from] RunnerError),

    #[error("correction parse error: {0}")]
    Gfix(#[from] GfixError),

    #[error("run log error: {0}")]
    RunLog(#[from] RunLogError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one batch: which runs completed and which aborted
#[derive(Debug)]
pub struct BatchSummary {
    pub completed: Vec<String>,
    pub failed: Vec<(String, PipelineError)>,
}

impl BatchSummary {
    pub fn all_completed(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What one probe's stages leave behind for the alignment stage
struct ProbeArtifacts {
    continuous_file: PathBuf,
    kilosort_output_directory: PathBuf,
}

/// Drives every run spec in the configuration through the stage sequence
pub struct Orchestrator<'a> {
    config: &'a PipelineConfig,
    runner: &'a dyn StageRunner,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a PipelineConfig, runner: &'a dyn StageRunner) -> Self {
        Orchestrator { config, runner }
    }

    /// Process every run spec in order. A failed run aborts that run only;
    /// the batch continues with the next spec.
    pub fn run_batch(&self) -> BatchSummary {
        self.clean_tool_logs();

        let mut summary = BatchSummary {
            completed: Vec::new(),
            failed: Vec::new(),
        };
        for spec in &self.config.run_specs {
            info!("processing run {}", spec.run_name);
            match self.process_run(spec) {
                Ok(()) => {
                    info!("run {} complete", spec.run_name);
                    summary.completed.push(spec.run_name.clone());
                }
                Err(e) => {
                    error!("run {} aborted: {}", spec.run_name, e);
                    summary.failed.push((spec.run_name.clone(), e));
                }
            }
        }
        summary
    }

    /// Remove stale external tool logs from a previous batch. Missing files
    /// are expected; anything else is reported but not fatal.
    fn clean_tool_logs(&self) {
        for name in TOOL_LOG_NAMES {
            let path = self.config.tool_log_directory.join(name);
            match fs::remove_file(&path) {
                Ok(()) => info!("removed stale tool log {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("could not remove {}: {}", path.display(), e),
            }
        }
    }

    /// Run one spec through extraction, per-probe stages, and alignment
    pub fn process_run(&self, spec: &RunSpec) -> Result<(), PipelineError> {
        let probes = parse_probe_selector(&spec.probe_selector)?;

        // Sentinel trigger bounds are resolved against the first listed
        // probe's input folder; all probes share the same trigger set
        let first_probe_dir = naming::input_probe_dir(
            &self.config.npx_directory,
            &spec.run_name,
            &spec.gate_index,
            probes[0],
        );
        let triggers = resolve_trigger_range(&spec.trigger_range, &first_probe_dir)?;

        let dest = naming::dest_dir(
            &self.config.output_directory,
            &spec.run_name,
            &spec.gate_index,
            &triggers,
        );
        naming::ensure_dir(&dest)?;
        naming::ensure_dir(&self.config.json_directory)?;

        let run_log = RunLog::create(naming::run_log_path(&dest))?;

        let corrections = if self.config.run_catgt {
            self.run_extraction(spec, &probes, &triggers, &dest, &run_log)?
        } else {
            info!("extraction disabled, correction rates default to 0.0");
            CorrectionVector::zeros(&probes)
        };
        for (probe, rate) in corrections.iter() {
            info!("probe {}: gfix edits/sec {:.3}", probe, rate);
        }

        let ks_make_copy = self
            .config
            .modules
            .iter()
            .any(|m| SORT_MODIFYING_MODULES.contains(&m.as_str()));

        let mut artifacts = Vec::with_capacity(probes.len());
        for &probe in &probes {
            let rate = corrections.rate_for(probe).unwrap_or(0.0);
            let probe_artifacts =
                self.process_probe(spec, probe, &triggers, &dest, rate, ks_make_copy, &run_log)?;
            artifacts.push(probe_artifacts);
        }

        if self.config.run_tprime {
            self.run_alignment(spec, &triggers, &dest, &artifacts, &run_log)?;
        }

        Ok(())
    }

    /// Build and run the extraction stage, then read the correction rates
    /// back out of its log
    fn run_extraction(
        &self,
        spec: &RunSpec,
        probes: &[u32],
        triggers: &TriggerRange,
        dest: &Path,
        run_log: &RunLog,
    ) -> Result<CorrectionVector, PipelineError> {
        let input_json = naming::input_doc_path(&self.config.json_directory, &spec.run_name);
        let output_json = naming::output_doc_path(&self.config.json_directory, &spec.run_name);

        let document = DocumentBuilder::new()
            .set_path("npx_directory", &self.config.npx_directory)
            .set("spikeGLX_data", true)
            .set("catGT_run_name", spec.run_name.as_str())
            .set("gate_string", spec.gate_index.as_str())
            .set("trigger_string", triggers.as_arg())
            .set("probe_string", spec.probe_selector.as_str())
            .set("catGT_stream_string", self.config.catgt_stream_string.as_str())
            .set("catGT_cmd_string", self.config.catgt_cmd_string.as_str())
            .set_path("extracted_data_directory", dest)
            .build(StageKind::Extraction)?;
        document.write_atomic(&input_json)?;

        self.runner
            .run_stage(EXTRACTION_STAGE, &input_json, &output_json)?;

        let corrections = gfix::parse_catgt_log(
            &self.config.tool_log_directory,
            &spec.run_name,
            &spec.gate_index,
            probes,
        )?;
        run_log.append(&RunLogEntry::completed(
            spec.run_name.as_str(),
            EXTRACTION_STAGE,
        ))?;
        Ok(corrections)
    }

    /// Build one probe's stage document and run each configured module on it
    #[allow(clippy::too_many_arguments)]
    fn process_probe(
        &self,
        spec: &RunSpec,
        probe: u32,
        triggers: &TriggerRange,
        dest: &Path,
        gfix_rate: f64,
        ks_make_copy: bool,
        run_log: &RunLog,
    ) -> Result<ProbeArtifacts, PipelineError> {
        let entity = naming::probe_entity_id(&spec.run_name, probe);
        let data_directory =
            naming::extracted_probe_dir(dest, &spec.run_name, &spec.gate_index, probe);
        let continuous_file =
            data_directory.join(naming::tcat_ap_bin(&spec.run_name, &spec.gate_index, probe));
        let kilosort_output_directory = data_directory
            .join(naming::sort_output_folder(probe, &self.config.sort_output_tag));
        info!("probe {} data directory {}", probe, data_directory.display());

        let document = DocumentBuilder::new()
            .set_path("npx_directory", &self.config.npx_directory)
            .set_path("continuous_file", &continuous_file)
            .set("spikeGLX_data", true)
            .set_path("kilosort_output_directory", &kilosort_output_directory)
            .set("ks_make_copy", ks_make_copy)
            .set("noise_template_use_rf", self.config.noise_template_use_rf)
            .set("catGT_run_name", entity.as_str())
            .set("gate_string", spec.gate_index.as_str())
            .set("trigger_string", triggers.as_arg())
            .set("probe_string", spec.probe_selector.as_str())
            .set("catGT_stream_string", self.config.catgt_stream_string.as_str())
            .set("catGT_cmd_string", self.config.catgt_cmd_string.as_str())
            .set("catGT_gfix_edits", gfix_rate)
            .set_path("extracted_data_directory", dest)
            .set("event_ex_param_str", self.config.event_ex_param_str.as_str())
            .build(StageKind::PerProbe)?;

        let input_json = naming::input_doc_path(&self.config.json_directory, &entity);
        document.write_atomic(&input_json)?;

        // Keep a copy of the document next to the data as a record of the
        // parameters (and correction rate) the stages actually received
        naming::ensure_dir(&data_directory)?;
        fs::copy(&input_json, naming::input_doc_path(&data_directory, &entity))?;

        for module in &self.config.modules {
            let output_json =
                naming::module_output_doc_path(&self.config.json_directory, &entity, module);
            self.runner.run_stage(module, &input_json, &output_json)?;
            run_log.append(&RunLogEntry::completed(entity.as_str(), module.as_str()))?;
        }

        Ok(ProbeArtifacts {
            continuous_file,
            kilosort_output_directory,
        })
    }

    /// Build and run the alignment stage over every probe's artifacts
    fn run_alignment(
        &self,
        spec: &RunSpec,
        triggers: &TriggerRange,
        dest: &Path,
        artifacts: &[ProbeArtifacts],
        run_log: &RunLog,
    ) -> Result<(), PipelineError> {
        let entity = naming::alignment_entity_id(&spec.run_name);
        let input_json = naming::input_doc_path(&self.config.json_directory, &entity);
        let output_json = naming::output_doc_path(&self.config.json_directory, &entity);

        let continuous_files: Vec<String> = artifacts
            .iter()
            .map(|a| a.continuous_file.to_string_lossy().into_owned())
            .collect();
        let kilosort_output_directories: Vec<String> = artifacts
            .iter()
            .map(|a| a.kilosort_output_directory.to_string_lossy().into_owned())
            .collect();

        let mut builder = DocumentBuilder::new()
            .set_path("npx_directory", &self.config.npx_directory)
            .set("spikeGLX_data", true)
            .set("catGT_run_name", spec.run_name.as_str())
            .set("gate_string", spec.gate_index.as_str())
            .set("trigger_string", triggers.as_arg())
            .set("probe_string", spec.probe_selector.as_str())
            .set_path("extracted_data_directory", dest)
            .set("event_ex_param_str", self.config.event_ex_param_str.as_str())
            .set("sync_period", self.config.sync_period)
            .set("toStream_sync_params", self.config.tostream_sync_params.as_str())
            .set("continuous_files", continuous_files)
            .set("kilosort_output_directories", kilosort_output_directories);
        if let Some(ni_params) = &self.config.nistream_sync_params {
            builder = builder.set("niStream_sync_params", ni_params.as_str());
        }
        let document = builder.build(StageKind::Alignment)?;
        document.write_atomic(&input_json)?;

        self.runner
            .run_stage(ALIGNMENT_STAGE, &input_json, &output_json)?;
        run_log.append(&RunLogEntry::completed(entity.as_str(), ALIGNMENT_STAGE))?;
        Ok(())
    }
}
