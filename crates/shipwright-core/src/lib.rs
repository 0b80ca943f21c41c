//! Shipwright Core Library
//!
//! Dependency resolution and deploy orchestration for
//! conversational-agent metadata: extract typed references from asset
//! definitions, build the locally-deployable transitive closure, plan
//! category-ordered deploy batches, and drive cumulative validation
//! against the target platform with bounded gap retries.

pub mod closure;
pub mod domain;
pub mod executor;
pub mod extract;
pub mod inventory;
pub mod manifest;
pub mod obs;
pub mod orchestrator;
pub mod planner;
pub mod selection;
pub mod telemetry;

pub use domain::{
    AssetCategory, AssetId, DependencyClosure, DeployBatch, DeployPlan, Reference, ReferenceKind,
    Result, ShipwrightError, SkippedDependency, DEPLOY_LAYER_ORDER,
};

pub use closure::ClosureBuilder;
pub use executor::{
    CliExecutor, CliExecutorConfig, ComponentProblem, ExecutorReport, GapDescriptor, SubmitMode,
    TargetExecutor,
};
pub use extract::extract_references;
pub use inventory::{FsInventory, Inventory};
pub use manifest::CumulativeManifest;
pub use orchestrator::{
    classify_gaps, walk_plan, write_walk_report, BatchRecord, OrchestratorConfig,
    ValidationOutcome, WalkOutcome, WalkReport,
};
pub use planner::{build_plan, render_plan_summary, validate_plan, PlanVerdict};
pub use selection::parse_selections;
pub use telemetry::init_tracing;

/// Shipwright version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
