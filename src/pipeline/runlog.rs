// Run log
// Append-only CSV audit trail for one pipeline run: header at creation, then
// one row per (entity, stage) that completed. Never read back while running.

use chrono::Utc;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunLogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed run log row: {0}")]
    MalformedRow(String),
}

const HEADER: &str = "entity,stage,status,timestamp";

/// One executed (entity, stage) pair
#[derive(Debug, Clone, PartialEq)]
pub struct RunLogEntry {
    /// Run name for run-level stages, `{run}_imec{probe}` for probe stages
    pub entity_id: String,

    /// Stage name as configured (e.g. "catGT_helper", "kilosort_helper")
    pub stage_name: String,

    /// Completion status; rows are only appended for completed stages
    pub status: String,

    /// ISO 8601 timestamp of when the row was written
    pub timestamp: String,
}

impl RunLogEntry {
    /// Create a completed-stage entry stamped with the current time
    pub fn completed(entity_id: impl Into<String>, stage_name: impl Into<String>) -> Self {
        RunLogEntry {
            entity_id: entity_id.into(),
            stage_name: stage_name.into(),
            status: "ok".to_string(),
            timestamp: Utc::now().to_rfc3339(),
        }
    }

    fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{}\n",
            self.entity_id, self.stage_name, self.status, self.timestamp
        )
    }
}

/// Writer for the per-run audit log
pub struct RunLog {
    file_path: PathBuf,
}

impl RunLog {
    /// Create the log file, truncating any previous one, and write the header
    pub fn create(file_path: PathBuf) -> Result<Self, RunLogError> {
        let mut file = File::create(&file_path)?;
        writeln!(file, "{}", HEADER)?;
        file.flush()?;
        Ok(RunLog { file_path })
    }

    /// Append one entry
    pub fn append(&self, entry: &RunLogEntry) -> Result<(), RunLogError> {
        let mut file = OpenOptions::new().append(true).open(&self.file_path)?;
        file.write_all(entry.to_csv_row().as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// Read a run log back into entries (post-mortem and test support)
pub fn read_run_log(path: &Path) -> Result<Vec<RunLogEntry>, RunLogError> {
    let contents = std::fs::read_to_string(path)?;
    let mut entries = Vec::new();

    for line in contents.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.splitn(4, ',');
        let entry = match (
            fields.next(),
            fields.next(),
            fields.next(),
            fields.next(),
        ) {
            (Some(entity), Some(stage), Some(status), Some(timestamp)) => RunLogEntry {
                entity_id: entity.to_string(),
                stage_name: stage.to_string(),
                status: status.to_string(),
                timestamp: timestamp.to_string(),
            },
            _ => return Err(RunLogError::MalformedRow(line.to_string())),
        };
        entries.push(entry);
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1_log.csv");

        RunLog::create(path.clone()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "entity,stage,status,timestamp\n");
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1_log.csv");

        let log = RunLog::create(path.clone()).unwrap();
        log.append(&RunLogEntry::completed("SC024", "catGT_helper"))
            .unwrap();
        log.append(&RunLogEntry::completed("SC024_imec0", "kilosort_helper"))
            .unwrap();

        let entries = read_run_log(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entity_id, "SC024");
        assert_eq!(entries[0].stage_name, "catGT_helper");
        assert_eq!(entries[0].status, "ok");
        assert_eq!(entries[1].entity_id, "SC024_imec0");
    }

    #[test]
    fn test_create_truncates_previous_log() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1_log.csv");

        let log = RunLog::create(path.clone()).unwrap();
        log.append(&RunLogEntry::completed("old", "stage")).unwrap();

        RunLog::create(path.clone()).unwrap();
        let entries = read_run_log(&path).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_rows_are_written_in_append_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("1_log.csv");

        let log = RunLog::create(path.clone()).unwrap();
        for stage in ["kilosort_helper", "kilosort_postprocessing", "quality_metrics"] {
            log.append(&RunLogEntry::completed("SC024_imec0", stage))
                .unwrap();
        }

        let stages: Vec<String> = read_run_log(&path)
            .unwrap()
            .into_iter()
            .map(|e| e.stage_name)
            .collect();
        assert_eq!(
            stages,
            vec!["kilosort_helper", "kilosort_postprocessing", "quality_metrics"]
        );
    }

    #[test]
    fn test_timestamps_are_rfc3339() {
        let entry = RunLogEntry::completed("SC024", "catGT_helper");
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
    }
}
