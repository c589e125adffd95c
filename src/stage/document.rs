// Stage configuration documents
// A flat key/value JSON document is assembled fresh for every stage invocation
// and persisted before the stage is spawned; stages never share a live document.

use serde_json::{Map, Value};
use std::fmt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("{kind} document is missing required option \"{key}\"")]
    MissingRequiredOption { kind: StageKind, key: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The three document shapes the pipeline produces. Extraction and alignment
/// documents are built once per run, per-probe documents once per probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Extraction,
    PerProbe,
    Alignment,
}

impl StageKind {
    /// Options every document of this kind must carry. Options irrelevant to
    /// the kind are tolerated and simply passed through to the stage.
    fn required_keys(self) -> &'static [&'static str] {
        match self {
            StageKind::Extraction => &[
                "npx_directory",
                "catGT_run_name",
                "gate_string",
                "trigger_string",
                "probe_string",
                "catGT_stream_string",
                "catGT_cmd_string",
                "extracted_data_directory",
            ],
            StageKind::PerProbe => &[
                "npx_directory",
                "continuous_file",
                "kilosort_output_directory",
                "catGT_run_name",
                "gate_string",
                "trigger_string",
                "catGT_gfix_edits",
                "extracted_data_directory",
            ],
            StageKind::Alignment => &[
                "catGT_run_name",
                "gate_string",
                "trigger_string",
                "extracted_data_directory",
                "sync_period",
                "toStream_sync_params",
                "continuous_files",
                "kilosort_output_directories",
            ],
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StageKind::Extraction => "extraction",
            StageKind::PerProbe => "per-probe",
            StageKind::Alignment => "alignment",
        };
        f.write_str(label)
    }
}

/// Collects options for one stage invocation. Keys are kept in a sorted map so
/// the persisted JSON is byte-stable for identical inputs.
#[derive(Debug, Default)]
pub struct DocumentBuilder {
    options: Map<String, Value>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        DocumentBuilder {
            options: Map::new(),
        }
    }

    /// Set one option. Later writes to the same key win.
    pub fn set(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }

    /// Set a filesystem path option, rendered as a string
    pub fn set_path(self, key: &str, path: &Path) -> Self {
        let rendered = path.to_string_lossy().into_owned();
        self.set(key, rendered)
    }

    /// Validate against the required-key set for `kind`. A required key that
    /// is absent or explicitly null fails the build.
    pub fn build(self, kind: StageKind) -> Result<StageDocument, DocumentError> {
        for key in kind.required_keys() {
            match self.options.get(*key) {
                Some(value) if !value.is_null() => {}
                _ => {
                    return Err(DocumentError::MissingRequiredOption { kind, key });
                }
            }
        }
        Ok(StageDocument {
            kind,
            options: self.options,
        })
    }
}

/// A validated, immutable configuration document for one stage invocation
#[derive(Debug, Clone, PartialEq)]
pub struct StageDocument {
    kind: StageKind,
    options: Map<String, Value>,
}

impl StageDocument {
    pub fn kind(&self) -> StageKind {
        self.kind
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.options.get(key)
    }

    /// Serialize to pretty JSON bytes
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(&self.options)
    }

    /// Persist atomically: write a sibling temp file, flush it to disk, then
    /// rename over the target. A crash mid-write leaves either the old
    /// document or none, never a truncated one.
    pub fn write_atomic(&self, path: &Path) -> Result<(), DocumentError> {
        let bytes = self.to_json_bytes()?;
        let tmp = temp_sibling(path);
        {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

/// Read a persisted document back as its raw key/value map
pub fn read_document(path: &Path) -> Result<Map<String, Value>, DocumentError> {
    let contents = std::fs::read(path)?;
    let map: Map<String, Value> = serde_json::from_slice(&contents)?;
    Ok(map)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
