// SpikeGLX naming conventions
// Every input/output path the pipeline touches is derived here and nowhere else.
// Assumes data saved with "Folder per probe" and CatGT run with -out_prb_fld.

use std::io;
use std::path::{Path, PathBuf};

use super::spec::TriggerRange;

/// File name of the per-run audit log, created in the destination folder.
pub const RUN_LOG_NAME: &str = "1_log.csv";

/// Run folder name on the acquisition side: `{run}_g{gate}`
pub fn run_folder(run: &str, gate: &str) -> String {
    format!("{}_g{}", run, gate)
}

/// Per-probe subfolder name, used both pre- and post-extraction:
/// `{run}_g{gate}_imec{probe}`
pub fn probe_folder(run: &str, gate: &str, probe: u32) -> String {
    format!("{}_g{}_imec{}", run, gate, probe)
}

/// Raw-data folder for one probe: `<npx>/{run}_g{gate}/{run}_g{gate}_imec{probe}`
pub fn input_probe_dir(npx_directory: &Path, run: &str, gate: &str, probe: u32) -> PathBuf {
    npx_directory
        .join(run_folder(run, gate))
        .join(probe_folder(run, gate, probe))
}

/// Destination folder for one pipeline run, named with the resolved trigger
/// bounds: `<output_root>/{run}_g{gate}_t{first},{last}`
pub fn dest_dir(output_root: &Path, run: &str, gate: &str, triggers: &TriggerRange) -> PathBuf {
    output_root.join(format!(
        "{}_g{}_t{}",
        run,
        gate,
        triggers.as_arg()
    ))
}

/// Folder CatGT creates under the destination: `catgt_{run}_g{gate}`
pub fn catgt_run_folder(run: &str, gate: &str) -> String {
    format!("catgt_{}", run_folder(run, gate))
}

/// Extracted data folder for one probe:
/// `<dest>/catgt_{run}_g{gate}/{run}_g{gate}_imec{probe}`
pub fn extracted_probe_dir(dest: &Path, run: &str, gate: &str, probe: u32) -> PathBuf {
    dest.join(catgt_run_folder(run, gate))
        .join(probe_folder(run, gate, probe))
}

/// Concatenated AP-band binary CatGT writes for one probe:
/// `{run}_g{gate}_tcat.imec{probe}.ap.bin`
pub fn tcat_ap_bin(run: &str, gate: &str, probe: u32) -> String {
    format!("{}_g{}_tcat.imec{}.ap.bin", run, gate, probe)
}

/// Sorter output folder name under the probe folder: `imec{probe}_{tag}`
pub fn sort_output_folder(probe: u32, sort_output_tag: &str) -> String {
    format!("imec{}_{}", probe, sort_output_tag)
}

/// Entity id for per-probe stages: `{run}_imec{probe}`
pub fn probe_entity_id(run: &str, probe: u32) -> String {
    format!("{}_imec{}", run, probe)
}

/// Entity id for the cross-stream alignment stage: `{run}_TPrime`
pub fn alignment_entity_id(run: &str) -> String {
    format!("{}_TPrime", run)
}

/// Stage input document path: `<json_dir>/{entity}-input.json`
pub fn input_doc_path(json_directory: &Path, entity: &str) -> PathBuf {
    json_directory.join(format!("{}-input.json", entity))
}

/// Stage output document path: `<json_dir>/{entity}-output.json`
pub fn output_doc_path(json_directory: &Path, entity: &str) -> PathBuf {
    json_directory.join(format!("{}-output.json", entity))
}

/// Per-module output document path: `<json_dir>/{entity}-{module}-output.json`
pub fn module_output_doc_path(json_directory: &Path, entity: &str, module: &str) -> PathBuf {
    json_directory.join(format!("{}-{}-output.json", entity, module))
}

/// Run log path inside a destination folder
pub fn run_log_path(dest: &Path) -> PathBuf {
    dest.join(RUN_LOG_NAME)
}

/// Idempotent directory creation; succeeds if the directory already exists
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)
}
