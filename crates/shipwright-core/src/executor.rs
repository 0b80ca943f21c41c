//! External validation/deploy/retrieve executor.
//!
//! The remote platform is reached through its command-line client,
//! invoked as an opaque external executor: submit a manifest in
//! validate-only or deploy mode, or retrieve one missing definition
//! into the local workspace. Calls are blocking and long-latency
//! (tens of seconds), so every invocation carries a timeout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::domain::{Result, ShipwrightError};

/// Operation mode for a manifest submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitMode {
    /// Validate the manifest against the target without deploying.
    Validate,
    /// Deploy the manifest.
    Deploy,
}

impl SubmitMode {
    pub fn as_arg(&self) -> &'static str {
        match self {
            SubmitMode::Validate => "validate",
            SubmitMode::Deploy => "deploy",
        }
    }
}

/// One component-level problem reported by the target platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentProblem {
    /// Component category, when the platform attributes one.
    pub category: Option<String>,
    /// Component name, when the platform attributes one.
    pub name: Option<String>,
    /// Human-readable problem text.
    pub message: String,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl ComponentProblem {
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            category: None,
            name: None,
            message: message.into(),
            line: None,
            column: None,
        }
    }
}

/// Structured result of one manifest submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutorReport {
    pub success: bool,
    #[serde(default)]
    pub problems: Vec<ComponentProblem>,
    /// Components the target reports having processed.
    #[serde(default)]
    pub items_processed: usize,
}

/// A recoverable validation gap, eligible for bounded auto-retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GapDescriptor {
    /// A referenced custom field is missing from the local workspace.
    MissingField { field: String, object: String },
    /// A referenced object definition is missing from the local workspace.
    MissingObject { object: String },
}

impl GapDescriptor {
    pub fn describe(&self) -> String {
        match self {
            GapDescriptor::MissingField { field, object } => {
                format!("field {} on object {}", field, object)
            }
            GapDescriptor::MissingObject { object } => format!("object {}", object),
        }
    }
}

/// The external executor interface the orchestrator drives.
#[async_trait]
pub trait TargetExecutor: Send + Sync {
    /// Submit a manifest artifact in the given mode.
    async fn submit(&self, manifest: &Path, mode: SubmitMode) -> Result<ExecutorReport>;

    /// Retrieve one missing definition from the remote target into the
    /// local workspace.
    async fn retrieve(&self, gap: &GapDescriptor) -> Result<()>;
}

/// Configuration for the platform CLI executor.
#[derive(Debug, Clone)]
pub struct CliExecutorConfig {
    /// Platform CLI program name.
    pub program: String,
    /// Target environment alias, passed as `--target`.
    pub target: Option<String>,
    /// Target-platform schema version, passed as `--api-version`.
    pub api_version: String,
    /// Per-invocation timeout.
    pub timeout: Duration,
}

impl Default for CliExecutorConfig {
    fn default() -> Self {
        Self {
            program: "platform".to_string(),
            target: None,
            api_version: "59.0".to_string(),
            timeout: Duration::from_secs(600),
        }
    }
}

/// [`TargetExecutor`] backed by the platform command-line client.
pub struct CliExecutor {
    config: CliExecutorConfig,
}

impl CliExecutor {
    pub fn new(config: CliExecutorConfig) -> Self {
        Self { config }
    }

    async fn run(&self, args: Vec<String>) -> Result<(bool, String, String)> {
        debug!(program = %self.config.program, ?args, "invoking platform CLI");

        let child = Command::new(&self.config.program)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let output = tokio::time::timeout(self.config.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                ShipwrightError::Executor(format!(
                    "{} timed out after {} seconds",
                    self.config.program,
                    self.config.timeout.as_secs()
                ))
            })??;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        Ok((output.status.success(), stdout, stderr))
    }

    fn common_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(target) = &self.config.target {
            args.push("--target".to_string());
            args.push(target.clone());
        }
        args.push("--json".to_string());
        args
    }
}

#[async_trait]
impl TargetExecutor for CliExecutor {
    async fn submit(&self, manifest: &Path, mode: SubmitMode) -> Result<ExecutorReport> {
        let mut args = vec![
            "manifest".to_string(),
            mode.as_arg().to_string(),
            "--manifest".to_string(),
            manifest.display().to_string(),
            "--api-version".to_string(),
            self.config.api_version.clone(),
        ];
        args.extend(self.common_args());

        let (success, stdout, stderr) = self.run(args).await?;

        // The CLI reports structured JSON on both success and failure;
        // anything else degrades to an exit-code report.
        match serde_json::from_str::<ExecutorReport>(stdout.trim()) {
            Ok(report) => Ok(report),
            Err(_) => Ok(ExecutorReport {
                success,
                problems: if success {
                    vec![]
                } else {
                    vec![ComponentProblem::message_only(if stderr.is_empty() {
                        stdout
                    } else {
                        stderr
                    })]
                },
                items_processed: 0,
            }),
        }
    }

    async fn retrieve(&self, gap: &GapDescriptor) -> Result<()> {
        let mut args = vec!["retrieve".to_string()];
        match gap {
            GapDescriptor::MissingObject { object } => {
                args.push("--object".to_string());
                args.push(object.clone());
            }
            GapDescriptor::MissingField { field, object } => {
                args.push("--object".to_string());
                args.push(object.clone());
                args.push("--field".to_string());
                args.push(field.clone());
            }
        }
        args.extend(self.common_args());

        let (success, _stdout, stderr) = self.run(args).await?;
        if success {
            Ok(())
        } else {
            Err(ShipwrightError::Executor(format!(
                "retrieve of {} failed: {}",
                gap.describe(),
                stderr.trim()
            )))
        }
    }
}

/// Conventional artifact path helper for callers that only hold a dir.
pub fn manifest_artifact_path(dir: &Path, batch_number: usize) -> PathBuf {
    dir.join(crate::manifest::CumulativeManifest::artifact_file_name(
        batch_number,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_descriptions_name_the_missing_definition() {
        let field = GapDescriptor::MissingField {
            field: "X__c".to_string(),
            object: "Y".to_string(),
        };
        assert_eq!(field.describe(), "field X__c on object Y");

        let object = GapDescriptor::MissingObject {
            object: "Account".to_string(),
        };
        assert_eq!(object.describe(), "object Account");
    }

    #[test]
    fn executor_report_parses_platform_json() {
        let raw = r#"{
            "success": false,
            "problems": [
                {
                    "category": "AgentFunction",
                    "name": "F1",
                    "message": "referenced field X__c not found on object Y",
                    "line": 4,
                    "column": 12
                }
            ],
            "items_processed": 3
        }"#;
        let report: ExecutorReport = serde_json::from_str(raw).unwrap();
        assert!(!report.success);
        assert_eq!(report.problems.len(), 1);
        assert_eq!(report.items_processed, 3);
    }

    #[tokio::test]
    async fn unparsable_output_degrades_to_exit_code() {
        let executor = CliExecutor::new(CliExecutorConfig {
            program: "echo".to_string(),
            ..Default::default()
        });

        let report = executor
            .submit(Path::new("manifest.xml"), SubmitMode::Validate)
            .await
            .unwrap();
        assert!(report.success);
        assert!(report.problems.is_empty());
    }

    #[tokio::test]
    async fn failing_program_reports_failure() {
        let executor = CliExecutor::new(CliExecutorConfig {
            program: "false".to_string(),
            ..Default::default()
        });

        let report = executor
            .submit(Path::new("manifest.xml"), SubmitMode::Validate)
            .await
            .unwrap();
        assert!(!report.success);
        assert_eq!(report.problems.len(), 1);
    }

    #[tokio::test]
    async fn failed_retrieve_is_an_executor_error() {
        let executor = CliExecutor::new(CliExecutorConfig {
            program: "false".to_string(),
            ..Default::default()
        });
        let gap = GapDescriptor::MissingObject {
            object: "Y".to_string(),
        };
        let err = executor.retrieve(&gap).await.unwrap_err();
        assert!(err.to_string().contains("retrieve of object Y failed"));
    }
}
