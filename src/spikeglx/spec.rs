// Probe and trigger selector parsing
// Expands the compact run-spec notation ("0,3", "0:3", "start,end") into
// concrete ordered values before any stage runs

use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("invalid selector \"{selector}\": {reason}")]
    InvalidFormat { selector: String, reason: String },

    #[error("no trigger-indexed files found in {0}")]
    NoTriggerFiles(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpecError {
    fn invalid(selector: &str, reason: impl Into<String>) -> Self {
        SpecError::InvalidFormat {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }
}

/// A trigger-file range after sentinel resolution. Always first <= last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerRange {
    pub first: u32,
    pub last: u32,
}

impl TriggerRange {
    /// Render as the "first,last" string handed to stage documents
    pub fn as_arg(&self) -> String {
        format!("{},{}", self.first, self.last)
    }
}

/// Parse a probe selector into a list of probe indices.
///
/// Supported forms:
/// - single index: "0"
/// - comma list: "0,3"
/// - half-open colon range: "0:3" -> 0, 1, 2
///
/// The result is sorted ascending and deduplicated, so downstream ordering
/// (stage documents, run-log rows) is deterministic for any accepted input.
pub fn parse_probe_selector(raw: &str) -> Result<Vec<u32>, SpecError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SpecError::invalid(raw, "empty selector"));
    }

    let mut probes = Vec::new();
    if let Some((lo, hi)) = trimmed.split_once(':') {
        let lo = parse_probe_token(raw, lo)?;
        let hi = parse_probe_token(raw, hi)?;
        if lo >= hi {
            return Err(SpecError::invalid(raw, "range bounds reversed"));
        }
        probes.extend(lo..hi);
    } else {
        for token in trimmed.split(',') {
            probes.push(parse_probe_token(raw, token)?);
        }
    }

    probes.sort_unstable();
    probes.dedup();
    Ok(probes)
}

fn parse_probe_token(selector: &str, token: &str) -> Result<u32, SpecError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(SpecError::invalid(selector, "empty probe index"));
    }
    token
        .parse::<u32>()
        .map_err(|_| SpecError::invalid(selector, format!("\"{}\" is not a probe index", token)))
}

/// Resolve a trigger selector into concrete first/last trigger indices.
///
/// The selector is a "first,last" pair; "start" may stand in for the first
/// bound and "end" for the last. Sentinels are resolved by scanning the given
/// probe folder for trigger-indexed SpikeGLX binaries (the `_tN.` field of
/// `*_tN.imecP.ap.bin`) and substituting the minimum/maximum index found.
pub fn resolve_trigger_range(raw: &str, probe_folder: &Path) -> Result<TriggerRange, SpecError> {
    let trimmed = raw.trim();
    let (first_raw, last_raw) = trimmed
        .split_once(',')
        .ok_or_else(|| SpecError::invalid(raw, "expected \"first,last\""))?;
    let first_raw = first_raw.trim();
    let last_raw = last_raw.trim();

    // One folder scan covers both sentinel bounds
    let scanned = if first_raw == "start" || last_raw == "end" {
        Some(scan_trigger_indices(probe_folder)?)
    } else {
        None
    };

    let first = match (first_raw, scanned) {
        ("start", Some((min, _))) => min,
        _ => parse_trigger_bound(raw, first_raw)?,
    };
    let last = match (last_raw, scanned) {
        ("end", Some((_, max))) => max,
        _ => parse_trigger_bound(raw, last_raw)?,
    };

    if first > last {
        return Err(SpecError::invalid(raw, "first trigger after last"));
    }
    Ok(TriggerRange { first, last })
}

fn parse_trigger_bound(selector: &str, token: &str) -> Result<u32, SpecError> {
    token.parse::<u32>().map_err(|_| {
        SpecError::invalid(
            selector,
            format!("\"{}\" is not a trigger index", token),
        )
    })
}

/// Scan a probe folder for trigger-indexed .ap.bin files and return the
/// (min, max) trigger indices present.
fn scan_trigger_indices(probe_folder: &Path) -> Result<(u32, u32), SpecError> {
    let pattern = Regex::new(r"_t(\d+)\.imec\d+\.ap\.bin$").expect("static pattern");

    let mut min: Option<u32> = None;
    let mut max: Option<u32> = None;
    for entry in std::fs::read_dir(probe_folder)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if let Some(caps) = pattern.captures(name) {
            if let Ok(index) = caps[1].parse::<u32>() {
                min = Some(min.map_or(index, |m| m.min(index)));
                max = Some(max.map_or(index, |m| m.max(index)));
            }
        }
    }

    match (min, max) {
        (Some(min), Some(max)) => Ok((min, max)),
        _ => Err(SpecError::NoTriggerFiles(probe_folder.to_path_buf())),
    }
}
