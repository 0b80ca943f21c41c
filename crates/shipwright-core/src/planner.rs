//! Deploy batch planning.
//!
//! Groups a dependency closure by category, orders each category's
//! members with an intra-category topological sort, and emits one
//! batch per non-empty category in the fixed platform layer order.
//! A same-category reference cycle falls back to stable name order for
//! that category instead of failing the plan.

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::{
    AssetCategory, AssetId, DependencyClosure, DeployBatch, DeployPlan, Reference,
    DEPLOY_LAYER_ORDER,
};
use crate::obs;

/// Build a [`DeployPlan`] from a resolved closure.
pub fn build_plan(closure: &DependencyClosure) -> DeployPlan {
    let mut by_category: BTreeMap<AssetCategory, Vec<AssetId>> = BTreeMap::new();
    for member in &closure.members {
        by_category
            .entry(member.category)
            .or_default()
            .push(member.clone());
    }

    let mut warnings: Vec<String> = closure.skipped.iter().map(|s| s.warning()).collect();
    let mut batches = Vec::new();
    let mut number = 0;
    let mut item_count = 0;

    for category in DEPLOY_LAYER_ORDER {
        let Some(items) = by_category.get(&category) else {
            continue;
        };
        let (ordered, cycle_fallback) = category_order(category, items, &closure.references);
        if cycle_fallback {
            let text = format!(
                "reference cycle within {}: falling back to stable name order",
                category
            );
            warn!("{}", text);
            warnings.push(text);
        }
        number += 1;
        item_count += ordered.len();
        batches.push(DeployBatch {
            number,
            category,
            items: ordered,
        });
    }

    obs::emit_plan_built(batches.len(), item_count, warnings.len());
    DeployPlan {
        batches,
        item_count,
        warnings,
    }
}

/// Topologically sort one category's members along the same-category
/// reference subgraph. Returns the order plus whether a cycle forced
/// the stable-name fallback.
fn category_order(
    category: AssetCategory,
    items: &[AssetId],
    references: &[Reference],
) -> (Vec<AssetId>, bool) {
    let mut names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
    names.sort_unstable();
    names.dedup();

    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut index: BTreeMap<&str, NodeIndex> = BTreeMap::new();
    // toposort emits reverse finish order; inserting reversed keeps
    // edge-free ties name-ascending.
    for &name in names.iter().rev() {
        index.insert(name, graph.add_node(name));
    }

    for reference in references {
        if reference.source_category != category || reference.target_category != category {
            continue;
        }
        let (Some(&source), Some(&target)) = (
            index.get(reference.source_name.as_str()),
            index.get(reference.target_name.as_str()),
        ) else {
            continue;
        };
        if source == target {
            continue;
        }
        // The referenced asset deploys before its referencer.
        graph.add_edge(target, source, ());
    }

    match toposort(&graph, None) {
        Ok(order) => (
            order
                .into_iter()
                .map(|node| AssetId::new(category, graph[node]))
                .collect(),
            false,
        ),
        Err(_) => (
            names
                .into_iter()
                .map(|name| AssetId::new(category, name))
                .collect(),
            true,
        ),
    }
}

// ---------------------------------------------------------------------------
// Plan validation
// ---------------------------------------------------------------------------

/// The outcome of validating a deploy plan's internal consistency.
///
/// Violations are reported as structured errors, never thrown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanVerdict {
    /// Errors found (empty when valid).
    pub errors: Vec<String>,
}

impl PlanVerdict {
    /// Whether the plan is valid (i.e., there are no errors).
    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate a plan: batch category order must be monotonically
/// non-decreasing per the fixed layer order, and no asset may appear
/// in more than one batch.
pub fn validate_plan(plan: &DeployPlan) -> PlanVerdict {
    let mut errors = Vec::new();

    for window in plan.batches.windows(2) {
        let (earlier, later) = (&window[0], &window[1]);
        if later.category.layer() < earlier.category.layer() {
            errors.push(format!(
                "batch {} ({}) is out of layer order after batch {} ({})",
                later.number, later.category, earlier.number, earlier.category
            ));
        }
    }

    let mut seen: BTreeMap<AssetId, usize> = BTreeMap::new();
    for batch in &plan.batches {
        let mut in_batch: BTreeSet<&AssetId> = BTreeSet::new();
        for item in &batch.items {
            if !in_batch.insert(item) {
                errors.push(format!(
                    "duplicate item {} within batch {}",
                    item, batch.number
                ));
                continue;
            }
            if let Some(first) = seen.get(item) {
                errors.push(format!(
                    "duplicate item {} in batches {} and {}",
                    item, first, batch.number
                ));
            } else {
                seen.insert(item.clone(), batch.number);
            }
        }
    }

    PlanVerdict { errors }
}

/// Render a human-readable per-batch order summary.
pub fn render_plan_summary(plan: &DeployPlan) -> String {
    let mut out = String::new();
    out.push_str("# Deploy Plan\n\n");
    out.push_str(&format!(
        "- batches: {}\n- items: {}\n\n",
        plan.batches.len(),
        plan.item_count
    ));

    for batch in &plan.batches {
        out.push_str(&format!(
            "## Batch {} — {} ({} items)\n",
            batch.number,
            batch.category,
            batch.items.len()
        ));
        for item in &batch.items {
            out.push_str(&format!("- {}\n", item.name));
        }
        out.push('\n');
    }

    if !plan.warnings.is_empty() {
        out.push_str("## Warnings\n");
        for warning in &plan.warnings {
            out.push_str(&format!("- {}\n", warning));
        }
    }
    out
}
