//! Snapshot of the runs selected by a collection pass.
//!
//! The file is a pretty-printed JSON array of run objects in retrieval order.
//! Each pass replaces the previous file entirely.

use std::path::Path;

use anyhow::{Context, Result};

use crate::model::WorkflowRun;

pub fn write(path: &Path, runs: &[WorkflowRun]) -> Result<()> {
    let json = serde_json::to_string_pretty(runs)?;
    std::fs::write(path, json)
        .with_context(|| format!("failed to write snapshot: {}", path.display()))?;
    tracing::info!(path = %path.display(), runs = runs.len(), "snapshot written");
    Ok(())
}

pub fn read(path: &Path) -> Result<Vec<WorkflowRun>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse snapshot: {}", path.display()))
}
