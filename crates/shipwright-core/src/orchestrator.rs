//! Cumulative validation/retry orchestration.
//!
//! Walks a plan's batches strictly in order. For batch *i* the
//! orchestrator builds the cumulative manifest of batches 1..=i,
//! persists it as an artifact, and submits it to the external
//! executor. A failure whose structured problems match one of the two
//! recoverable gap patterns (referenced field not found on object,
//! referenced object not found) triggers a bounded number of
//! retrieve-and-revalidate cycles; anything else halts the walk at
//! that batch. A wall-clock budget, checked before each batch starts,
//! turns an overlong walk into a distinct `TimedOut` outcome carrying
//! the resume point. Artifacts produced along the way are kept in
//! every terminal state.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{AssetCategory, DeployPlan, Result};
use crate::executor::{ComponentProblem, GapDescriptor, SubmitMode, TargetExecutor};
use crate::manifest::CumulativeManifest;
use crate::obs;

/// Walk policy: submission mode, retry bound, time budget, artifact
/// location, target schema version.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub mode: SubmitMode,
    /// Maximum retrieve-and-revalidate cycles per batch. The bound is
    /// an explicit parameter, not ambient state.
    pub max_gap_retries: u32,
    /// Wall-clock budget for the whole walk, checked before each batch
    /// is started. An in-flight executor call is never aborted.
    pub time_budget: Duration,
    pub artifacts_dir: PathBuf,
    pub api_version: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            mode: SubmitMode::Validate,
            max_gap_retries: 3,
            time_budget: Duration::from_secs(25 * 60),
            artifacts_dir: PathBuf::from(".shipwright/artifacts"),
            api_version: "59.0".to_string(),
        }
    }
}

/// Terminal state of a walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WalkOutcome {
    /// Every batch validated.
    Completed,
    /// The walk halted at `batch`; later batches were not attempted.
    Failed { batch: usize },
    /// The time budget ran out; resume with a new invocation starting
    /// at `resume_at_batch`.
    TimedOut { resume_at_batch: usize },
}

impl WalkOutcome {
    fn label(&self) -> &'static str {
        match self {
            WalkOutcome::Completed => "completed",
            WalkOutcome::Failed { .. } => "failed",
            WalkOutcome::TimedOut { .. } => "timed_out",
        }
    }
}

/// Result of one manifest submission within the walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub success: bool,
    pub errors: Vec<String>,
    pub recoverable_gaps: Vec<GapDescriptor>,
    pub items_validated: usize,
    pub manifest_path: PathBuf,
}

/// Per-batch record kept in the walk report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch_number: usize,
    pub category: AssetCategory,
    /// Assets in this batch alone.
    pub item_count: usize,
    /// Assets covered by the batch's cumulative manifest submission,
    /// i.e. the union of batches 1..=batch_number.
    pub items_validated: usize,
    /// Submissions performed for this batch, including gap-retry
    /// revalidations.
    pub attempts: u32,
    pub success: bool,
    pub manifest_path: PathBuf,
    pub errors: Vec<String>,
}

/// Full walk report, persisted as an audit artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalkReport {
    pub walk_id: String,
    pub generated_at: DateTime<Utc>,
    pub mode: SubmitMode,
    pub outcome: WalkOutcome,
    pub batches: Vec<BatchRecord>,
    pub duration_ms: u64,
}

impl WalkReport {
    pub fn succeeded(&self) -> bool {
        self.outcome == WalkOutcome::Completed
    }
}

/// Walk a plan's batches against the external executor.
///
/// Batches are processed strictly sequentially: batch i+1 is never
/// started before batch i's outcome is known. All manifests written
/// along the way are retained, whatever the terminal state.
pub async fn walk_plan(
    plan: &DeployPlan,
    executor: &dyn TargetExecutor,
    config: &OrchestratorConfig,
) -> Result<WalkReport> {
    let start = Instant::now();
    let walk_id = Uuid::new_v4().to_string();
    let _span = obs::WalkSpan::enter(&walk_id);

    info!(
        mode = config.mode.as_arg(),
        batches = plan.batches.len(),
        "starting walk"
    );

    let mut records: Vec<BatchRecord> = Vec::new();
    let mut outcome = WalkOutcome::Completed;

    for batch in &plan.batches {
        if start.elapsed() >= config.time_budget {
            warn!(batch = batch.number, "time budget exhausted before batch");
            outcome = WalkOutcome::TimedOut {
                resume_at_batch: batch.number,
            };
            break;
        }

        let manifest =
            CumulativeManifest::from_batches(&plan.batches, batch.number, &config.api_version);
        let manifest_path = manifest.write_artifact(&config.artifacts_dir)?;

        let mut attempts = 0u32;
        let mut retries_used = 0u32;
        let record = loop {
            attempts += 1;
            let validation = submit_once(
                executor,
                &manifest_path,
                config.mode,
                manifest.item_count(),
            )
            .await;

            if validation.success {
                break BatchRecord {
                    batch_number: batch.number,
                    category: batch.category,
                    item_count: batch.items.len(),
                    items_validated: validation.items_validated,
                    attempts,
                    success: true,
                    manifest_path: validation.manifest_path,
                    errors: vec![],
                };
            }

            if validation.recoverable_gaps.is_empty() || retries_used >= config.max_gap_retries {
                break BatchRecord {
                    batch_number: batch.number,
                    category: batch.category,
                    item_count: batch.items.len(),
                    items_validated: validation.items_validated,
                    attempts,
                    success: false,
                    manifest_path: validation.manifest_path,
                    errors: validation.errors,
                };
            }

            retries_used += 1;
            let mut retrieval_failed = None;
            for gap in &validation.recoverable_gaps {
                obs::emit_gap_retrieval(&walk_id, batch.number, &gap.describe());
                if let Err(err) = executor.retrieve(gap).await {
                    retrieval_failed = Some(format!(
                        "retrieval of {} failed: {}",
                        gap.describe(),
                        err
                    ));
                    break;
                }
            }
            if let Some(error) = retrieval_failed {
                let mut errors = validation.errors;
                errors.push(error);
                break BatchRecord {
                    batch_number: batch.number,
                    category: batch.category,
                    item_count: batch.items.len(),
                    items_validated: validation.items_validated,
                    attempts,
                    success: false,
                    manifest_path: validation.manifest_path,
                    errors,
                };
            }
            // Re-validate the same cumulative manifest.
        };

        obs::emit_batch_submitted(&walk_id, batch.number, record.attempts, record.success);
        let failed = !record.success;
        records.push(record);
        if failed {
            outcome = WalkOutcome::Failed {
                batch: batch.number,
            };
            break;
        }
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    obs::emit_walk_finished(&walk_id, outcome.label(), duration_ms);

    Ok(WalkReport {
        walk_id,
        generated_at: Utc::now(),
        mode: config.mode,
        outcome,
        batches: records,
        duration_ms,
    })
}

/// Submit one cumulative manifest and fold the executor's report into
/// a [`ValidationOutcome`]. Executor transport errors (spawn failure,
/// timeout) are folded into a failed outcome so the walk records them
/// instead of aborting without a report.
async fn submit_once(
    executor: &dyn TargetExecutor,
    manifest_path: &Path,
    mode: SubmitMode,
    item_count: usize,
) -> ValidationOutcome {
    match executor.submit(manifest_path, mode).await {
        Ok(report) => {
            let errors = report.problems.iter().map(render_problem).collect();
            let recoverable_gaps = classify_gaps(&report.problems);
            ValidationOutcome {
                success: report.success,
                errors,
                recoverable_gaps,
                items_validated: if report.items_processed > 0 {
                    report.items_processed
                } else {
                    item_count
                },
                manifest_path: manifest_path.to_path_buf(),
            }
        }
        Err(err) => ValidationOutcome {
            success: false,
            errors: vec![format!("executor error: {}", err)],
            recoverable_gaps: vec![],
            items_validated: 0,
            manifest_path: manifest_path.to_path_buf(),
        },
    }
}

fn render_problem(problem: &ComponentProblem) -> String {
    let mut text = String::new();
    if let Some(category) = &problem.category {
        text.push_str(category);
        text.push(' ');
    }
    if let Some(name) = &problem.name {
        text.push_str(name);
        text.push_str(": ");
    }
    text.push_str(&problem.message);
    if let (Some(line), Some(column)) = (problem.line, problem.column) {
        text.push_str(&format!(" ({}:{})", line, column));
    }
    text
}

/// Scan structured problems for the two recoverable gap patterns.
/// Duplicate gaps are collapsed.
pub fn classify_gaps(problems: &[ComponentProblem]) -> Vec<GapDescriptor> {
    let field_pattern =
        Regex::new(r"(?i)referenced field\s+([A-Za-z0-9_.]+)\s+not found on object\s+([A-Za-z0-9_.]+)");
    let object_pattern = Regex::new(r"(?i)referenced object\s+([A-Za-z0-9_.]+)\s+not found");

    let mut gaps = Vec::new();
    let mut seen = BTreeSet::new();
    for problem in problems {
        if let Ok(re) = &field_pattern {
            if let Some(caps) = re.captures(&problem.message) {
                let gap = GapDescriptor::MissingField {
                    field: caps[1].to_string(),
                    object: caps[2].to_string(),
                };
                if seen.insert(gap.describe()) {
                    gaps.push(gap);
                }
                continue;
            }
        }
        if let Ok(re) = &object_pattern {
            if let Some(caps) = re.captures(&problem.message) {
                let gap = GapDescriptor::MissingObject {
                    object: caps[1].to_string(),
                };
                if seen.insert(gap.describe()) {
                    gaps.push(gap);
                }
            }
        }
    }
    gaps
}

/// Write `walk-report.json` in pretty JSON format. Returns the path.
pub fn write_walk_report(report: &WalkReport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join("walk-report.json");
    let content = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, content)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn problem(message: &str) -> ComponentProblem {
        ComponentProblem::message_only(message)
    }

    #[test]
    fn classify_recognizes_missing_field() {
        let gaps = classify_gaps(&[problem(
            "referenced field X__c not found on object Y",
        )]);
        assert_eq!(
            gaps,
            vec![GapDescriptor::MissingField {
                field: "X__c".to_string(),
                object: "Y".to_string(),
            }]
        );
    }

    #[test]
    fn classify_recognizes_missing_object() {
        let gaps = classify_gaps(&[problem("referenced object Invoice not found")]);
        assert_eq!(
            gaps,
            vec![GapDescriptor::MissingObject {
                object: "Invoice".to_string(),
            }]
        );
    }

    #[test]
    fn classify_collapses_duplicates_and_ignores_other_failures() {
        let gaps = classify_gaps(&[
            problem("referenced object Invoice not found"),
            problem("referenced object Invoice not found"),
            problem("syntax error at line 3"),
        ]);
        assert_eq!(gaps.len(), 1);
    }

    #[test]
    fn walk_outcome_serializes_with_state_tag() {
        let raw = serde_json::to_value(WalkOutcome::TimedOut { resume_at_batch: 4 }).unwrap();
        assert_eq!(raw["state"], "timed_out");
        assert_eq!(raw["resume_at_batch"], 4);
    }
}
