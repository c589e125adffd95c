// CatGT log parsing
// CatGT appends one gfix summary line per probe to its own CatGT.log; the
// edits/sec rate found there is threaded into every downstream stage document.

use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::spikeglx::naming;

/// Log file CatGT writes into the tool-log directory
pub const CATGT_LOG_NAME: &str = "CatGT.log";

#[derive(Debug, Error)]
pub enum GfixError {
    #[error("{log}: found {found} gfix summaries for this run, expected {expected}")]
    CorrectionValueNotFound {
        log: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-probe clock-drift correction rates, in probe-list order.
///
/// `measured` is false only for the all-zero placeholder used when extraction
/// is skipped for a run; a parsed vector is always measured, and a log with
/// fewer summaries than probes is an error rather than a padded vector.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionVector {
    rates: Vec<(u32, f64)>,
    measured: bool,
}

impl CorrectionVector {
    /// All-zero placeholder for runs that skip the extraction stage
    pub fn zeros(probes: &[u32]) -> Self {
        CorrectionVector {
            rates: probes.iter().map(|&p| (p, 0.0)).collect(),
            measured: false,
        }
    }

    pub fn measured(&self) -> bool {
        self.measured
    }

    pub fn len(&self) -> usize {
        self.rates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    /// Rate for one probe, if the probe is part of this run
    pub fn rate_for(&self, probe: u32) -> Option<f64> {
        self.rates
            .iter()
            .find(|(p, _)| *p == probe)
            .map(|(_, rate)| *rate)
    }

    /// (probe, rate) pairs in probe-list order
    pub fn iter(&self) -> impl Iterator<Item = (u32, f64)> + '_ {
        self.rates.iter().copied()
    }
}

/// Parse the CatGT log for one run's per-probe gfix summaries.
///
/// A summary line carries the run tag (`{run}_g{gate}`) and an `edits/sec`
/// figure. CatGT reports probes in the order it processed them, which is the
/// order of `probes`, so matching lines are consumed positionally. Finding
/// fewer summaries than probes means the extraction output is malformed and
/// fails hard instead of defaulting anything to zero.
pub fn parse_catgt_log(
    log_dir: &Path,
    run: &str,
    gate: &str,
    probes: &[u32],
) -> Result<CorrectionVector, GfixError> {
    let log_path = log_dir.join(CATGT_LOG_NAME);
    let contents = std::fs::read_to_string(&log_path)?;
    let run_tag = naming::run_folder(run, gate);
    let rate_pattern =
        Regex::new(r"edits/sec\s*[:=]?\s*([0-9]+(?:\.[0-9]+)?)").expect("static pattern");

    let mut rates: Vec<(u32, f64)> = Vec::new();
    for line in contents.lines() {
        if rates.len() == probes.len() {
            break;
        }
        if !line.contains(&run_tag) {
            continue;
        }
        if let Some(caps) = rate_pattern.captures(line) {
            if let Ok(rate) = caps[1].parse::<f64>() {
                let probe = probes[rates.len()];
                rates.push((probe, rate));
            }
        }
    }

    if rates.len() < probes.len() {
        return Err(GfixError::CorrectionValueNotFound {
            log: log_path,
            expected: probes.len(),
            found: rates.len(),
        });
    }

    Ok(CorrectionVector {
        rates,
        measured: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write_log(dir: &Path, lines: &[&str]) {
        fs::write(dir.join(CATGT_LOG_NAME), lines.join("\n")).unwrap();
    }

    #[test]
    fn test_parses_one_rate_per_probe_in_order() {
        let dir = TempDir::new().unwrap();
        write_log(
            dir.path(),
            &[
                "[Thd 100 CPU 0 13:49:10.870] Cmdline: CatGT -dir=/data -run=SC024 -g=0",
                "[Thd 100 CPU 0 13:52:01.002] Gfix SC024_g0 imec0 edits/sec: 0.120",
                "[Thd 100 CPU 0 13:55:43.310] Gfix SC024_g0 imec3 edits/sec: 0.080",
            ],
        );

        let vector = parse_catgt_log(dir.path(), "SC024", "0", &[0, 3]).unwrap();
        assert!(vector.measured());
        assert_eq!(vector.rate_for(0), Some(0.12));
        assert_eq!(vector.rate_for(3), Some(0.08));
        let pairs: Vec<(u32, f64)> = vector.iter().collect();
        assert_eq!(pairs, vec![(0, 0.12), (3, 0.08)]);
    }

    #[test]
    fn test_lines_for_other_runs_are_ignored() {
        let dir = TempDir::new().unwrap();
        write_log(
            dir.path(),
            &[
                "[Thd 100] Gfix OTHER_g0 imec0 edits/sec: 9.999",
                "[Thd 100] Gfix SC024_g0 imec0 edits/sec: 0.25",
            ],
        );

        let vector = parse_catgt_log(dir.path(), "SC024", "0", &[0]).unwrap();
        assert_eq!(vector.rate_for(0), Some(0.25));
    }

    #[test]
    fn test_fewer_summaries_than_probes_fails() {
        let dir = TempDir::new().unwrap();
        write_log(
            dir.path(),
            &["[Thd 100] Gfix SC024_g0 imec0 edits/sec: 0.12"],
        );

        match parse_catgt_log(dir.path(), "SC024", "0", &[0, 1]) {
            Err(GfixError::CorrectionValueNotFound {
                expected, found, ..
            }) => {
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("expected CorrectionValueNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_extra_summaries_beyond_probe_list_are_ignored() {
        let dir = TempDir::new().unwrap();
        write_log(
            dir.path(),
            &[
                "[Thd 100] Gfix SC024_g0 imec0 edits/sec: 0.12",
                "[Thd 100] Gfix SC024_g0 imec1 edits/sec: 0.30",
            ],
        );

        let vector = parse_catgt_log(dir.path(), "SC024", "0", &[0]).unwrap();
        assert_eq!(vector.len(), 1);
        assert_eq!(vector.rate_for(0), Some(0.12));
    }

    #[test]
    fn test_missing_log_is_io_error() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            parse_catgt_log(dir.path(), "SC024", "0", &[0]),
            Err(GfixError::Io(_))
        ));
    }

    #[test]
    fn test_zeros_placeholder_is_unmeasured() {
        let vector = CorrectionVector::zeros(&[0, 1, 2]);
        assert!(!vector.measured());
        assert_eq!(vector.len(), 3);
        assert_eq!(vector.rate_for(2), Some(0.0));
        assert_eq!(vector.rate_for(7), None);
    }
}
