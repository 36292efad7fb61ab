use crate::error::{ExpansionFailure, ProbeFailure, Result};
use crate::expand::expand_paths;
use crate::probe::{probe_all, ProbeOptions};
use crate::source::{SourceEntry, SourceLocation};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    pub probe: ProbeOptions,
    /// Worker threads; `None` uses one per CPU
    pub threads: Option<usize>,
}

/// Everything one submission of paths produced.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub entries: Vec<SourceEntry>,
    pub expansion_failures: Vec<ExpansionFailure>,
    pub probe_failures: Vec<ProbeFailure>,
    pub duplicates: usize,
}

impl ScanReport {
    pub fn found(&self) -> usize {
        self.entries.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.expansion_failures.is_empty() || !self.probe_failures.is_empty()
    }
}

/// Expands `paths` and probes the new candidates.
///
/// Candidates whose identity is already in `existing` are skipped before probing,
/// so resubmitting the same paths costs one directory walk and nothing else.
pub fn expand_and_probe(
    paths: &[PathBuf],
    existing: &HashSet<SourceLocation>,
    options: &ScanOptions,
) -> Result<ScanReport> {
    let expansion = expand_paths(paths, existing, options.threads)?;
    let (entries, probe_failures) =
        probe_all(&expansion.candidates, &options.probe, options.threads)?;

    log::info!(
        "Found {} image(s) in {} input(s)",
        entries.len(),
        paths.len()
    );
    if !probe_failures.is_empty() {
        log::info!("Skipped {} unreadable image(s)", probe_failures.len());
    }

    Ok(ScanReport {
        entries,
        expansion_failures: expansion.failures,
        probe_failures,
        duplicates: expansion.duplicates,
    })
}
