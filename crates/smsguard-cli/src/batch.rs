//! Batch input and report files

use anyhow::{Context, Result};
use smsguard_core::{BatchReport, InputRecord};
use smsguard_providers::ScoringConfig;
use std::io::Write;
use std::path::Path;

/// Read a JSON array of input records
pub fn read_inputs(path: &Path) -> Result<Vec<InputRecord>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read input file {}", path.display()))?;
    let records = serde_json::from_str(&content)
        .with_context(|| format!("Invalid input records in {}", path.display()))?;
    Ok(records)
}

/// Write `report` as pretty JSON to `path`, or stdout when absent
pub fn write_report(report: &BatchReport, path: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;

    match path {
        Some(path) => std::fs::write(path, json + "\n")
            .with_context(|| format!("Failed to write report to {}", path.display()))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}

/// Apply command-line overrides on top of the loaded configuration
pub fn apply_overrides(
    config: &mut ScoringConfig,
    max_processes: Option<usize>,
    max_messages: Option<usize>,
    breakdown: bool,
) -> Result<()> {
    if let Some(limit) = max_processes {
        config.max_concurrent_processes = limit;
    }
    if let Some(limit) = max_messages {
        config.max_concurrent_messages = limit;
    }
    if breakdown {
        config.explanation_breakdown = true;
    }
    config.validate()?;
    Ok(())
}
