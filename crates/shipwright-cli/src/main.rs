//! Shipwright - deploy planner CLI for conversational-agent metadata
//!
//! The `shipwright` command resolves asset dependencies and drives
//! batch-ordered validation/deployment against the target platform.
//!
//! ## Commands
//!
//! - `plan`: Resolve a selection and print the batch plan
//! - `validate`: Walk the plan in validate-only mode
//! - `deploy`: Walk the plan in deploy mode
//! - `refs`: Print the references extracted from one asset

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::Level;

use shipwright_core::{
    build_plan, parse_selections, render_plan_summary, validate_plan, walk_plan,
    write_walk_report, AssetId, CliExecutor, CliExecutorConfig, ClosureBuilder, DeployPlan,
    FsInventory, Inventory, OrchestratorConfig, PlanVerdict, SubmitMode, WalkOutcome,
};

#[derive(Parser)]
#[command(name = "shipwright")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Dependency-aware deploy planner for agent metadata", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SelectionArgs {
    /// Selection tokens: `Category:Name` or a bare name
    #[arg(required = true)]
    selections: Vec<String>,

    /// Metadata workspace root
    #[arg(long, default_value = ".")]
    root: PathBuf,
}

#[derive(Args)]
struct WalkArgs {
    #[command(flatten)]
    selection: SelectionArgs,

    /// Directory for manifest and report artifacts
    #[arg(long, default_value = ".shipwright/artifacts")]
    artifacts_dir: PathBuf,

    /// Target-platform schema version
    #[arg(long, default_value = "59.0")]
    api_version: String,

    /// Maximum retrieve-and-revalidate cycles per batch
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Wall-clock budget for the whole walk, in seconds
    #[arg(long, default_value = "1500")]
    time_budget_secs: u64,

    /// Platform CLI program to invoke
    #[arg(long, default_value = "platform")]
    executor: String,

    /// Target environment alias
    #[arg(long)]
    target: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a selection and print the batch plan
    Plan {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Walk the plan batch by batch in validate-only mode
    Validate {
        #[command(flatten)]
        walk: WalkArgs,
    },

    /// Walk the plan batch by batch, deploying each cumulative manifest
    Deploy {
        #[command(flatten)]
        walk: WalkArgs,
    },

    /// Print the references extracted from one asset's definition
    Refs {
        /// Selection token: `Category:Name` or a bare name
        selection: String,

        /// Metadata workspace root
        #[arg(long, default_value = ".")]
        root: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    shipwright_core::init_tracing(cli.json, level);

    match cli.command {
        Commands::Plan { selection } => cmd_plan(&selection, cli.json).await,
        Commands::Validate { walk } => cmd_walk(&walk, SubmitMode::Validate).await,
        Commands::Deploy { walk } => cmd_walk(&walk, SubmitMode::Deploy).await,
        Commands::Refs { selection, root } => cmd_refs(&root, &selection).await,
    }
}

/// Resolve a selection into a validated plan.
async fn resolve_plan(root: &Path, selections: &[String]) -> Result<(DeployPlan, PlanVerdict)> {
    let (seeds, warnings) = parse_selections(selections);
    for warning in &warnings {
        eprintln!("warning: {}", warning);
    }
    if seeds.is_empty() {
        bail!("no deployable assets in selection");
    }

    let inventory = FsInventory::new(root);
    let closure = ClosureBuilder::new(&inventory)
        .resolve(&seeds)
        .await
        .context("failed to resolve dependency closure")?;

    let plan = build_plan(&closure);
    let verdict = validate_plan(&plan);
    Ok((plan, verdict))
}

async fn cmd_plan(args: &SelectionArgs, json: bool) -> Result<()> {
    let (plan, verdict) = resolve_plan(&args.root, &args.selections).await?;

    if json {
        let output = serde_json::json!({
            "plan": plan,
            "validation": verdict,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("{}", render_plan_summary(&plan));
    if verdict.valid() {
        println!("Plan validation: ok");
    } else {
        println!("Plan validation: {} error(s)", verdict.errors.len());
        for error in &verdict.errors {
            println!("  - {}", error);
        }
    }
    Ok(())
}

async fn cmd_walk(args: &WalkArgs, mode: SubmitMode) -> Result<()> {
    let (plan, verdict) = resolve_plan(&args.selection.root, &args.selection.selections).await?;
    if plan.is_empty() {
        bail!("nothing to deploy: the selection resolved to an empty plan");
    }
    if !verdict.valid() {
        for error in &verdict.errors {
            eprintln!("plan error: {}", error);
        }
        bail!("refusing to walk an inconsistent plan");
    }

    println!("{}", render_plan_summary(&plan));

    let executor = CliExecutor::new(CliExecutorConfig {
        program: args.executor.clone(),
        target: args.target.clone(),
        api_version: args.api_version.clone(),
        ..Default::default()
    });
    let config = OrchestratorConfig {
        mode,
        max_gap_retries: args.max_retries,
        time_budget: Duration::from_secs(args.time_budget_secs),
        artifacts_dir: args.artifacts_dir.clone(),
        api_version: args.api_version.clone(),
    };

    let report = walk_plan(&plan, &executor, &config)
        .await
        .context("walk failed before producing a report")?;
    let report_path = write_walk_report(&report, &args.artifacts_dir)?;

    for record in &report.batches {
        println!(
            "Batch {} ({}): {} after {} attempt(s), {} component(s) in manifest",
            record.batch_number,
            record.category,
            if record.success { "ok" } else { "failed" },
            record.attempts,
            record.items_validated,
        );
        for error in &record.errors {
            println!("  - {}", error);
        }
    }
    println!("Report: {:?}", report_path);

    match report.outcome {
        WalkOutcome::Completed => {
            println!("Walk completed: {} batch(es)", report.batches.len());
            Ok(())
        }
        WalkOutcome::Failed { batch } => {
            bail!("walk failed at batch {}; artifacts were kept", batch)
        }
        WalkOutcome::TimedOut { resume_at_batch } => {
            bail!(
                "walk timed out; resume a new invocation at batch {}",
                resume_at_batch
            )
        }
    }
}

async fn cmd_refs(root: &Path, selection: &str) -> Result<()> {
    let (seeds, _) = parse_selections(&[selection.to_string()]);
    let Some(id) = seeds.into_iter().next() else {
        bail!("could not parse selection '{}'", selection);
    };

    let inventory = FsInventory::new(root);
    let references = collect_refs(&inventory, &id).await?;

    if references.is_empty() {
        println!("{}: no references", id);
        return Ok(());
    }
    for reference in references {
        println!(
            "{} -> {}:{} ({:?})",
            AssetId::new(reference.source_category, reference.source_name.clone()),
            reference.target_category,
            reference.target_name,
            reference.kind,
        );
    }
    Ok(())
}

/// Extract one asset's references, including colocated bot versions.
async fn collect_refs(
    inventory: &FsInventory,
    id: &AssetId,
) -> Result<Vec<shipwright_core::Reference>> {
    let content = inventory
        .read_definition(id)
        .await
        .with_context(|| format!("failed to read definition of {}", id))?;
    let mut references = shipwright_core::extract_references(id, &content);

    if id.category == shipwright_core::AssetCategory::Bot {
        for (version_id, version_content) in inventory.bot_versions(&id.name).await? {
            references.extend(shipwright_core::extract_references(
                &version_id,
                &version_content,
            ));
        }
    }
    Ok(references)
}
