use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::domain::{JobStatus, PromotionResult};
use crate::orchestrator::JobReport;

pub const RESULTS_SCHEMA_VERSION: &str = "1.0";

/// Results file written after a job and read back by the notifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultsArtifact {
    pub schema_version: String,
    pub generated_at: DateTime<Utc>,
    pub job_id: String,
    pub status: JobStatus,
    pub dry_run: bool,
    pub results: Vec<PromotionResult>,
}

impl ResultsArtifact {
    pub fn from_report(report: &JobReport, dry_run: bool) -> Self {
        Self {
            schema_version: RESULTS_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now(),
            job_id: report.job_id.clone(),
            status: report.status,
            dry_run,
            results: report.results.clone(),
        }
    }
}

/// Either the full artifact or a bare list of results from older jobs.
#[derive(Deserialize)]
#[serde(untagged)]
enum ResultsFile {
    Artifact(ResultsArtifact),
    Bare(Vec<PromotionResult>),
}

/// Write the results file as pretty JSON, creating parent directories.
pub fn write_results_json(path: &Path, artifact: &ResultsArtifact) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("create {:?}", parent))?;
    }
    let content = serde_json::to_string_pretty(artifact).context("serialize results artifact")?;
    std::fs::write(path, content).with_context(|| format!("write {:?}", path))?;
    Ok(())
}

/// Read a results file written by [`write_results_json`] or a bare JSON
/// array of results.
pub fn read_results_json(path: &Path) -> Result<Vec<PromotionResult>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    let parsed: ResultsFile =
        serde_json::from_str(&content).with_context(|| format!("parse results file {:?}", path))?;
    Ok(match parsed {
        ResultsFile::Artifact(artifact) => artifact.results,
        ResultsFile::Bare(results) => results,
    })
}
