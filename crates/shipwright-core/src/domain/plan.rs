//! Deploy batches and plans.

use serde::{Deserialize, Serialize};

use super::asset::{AssetCategory, AssetId};

/// One category's worth of assets, deployed and validated as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployBatch {
    /// 1-based batch number, strictly increasing in layer order.
    pub number: usize,
    pub category: AssetCategory,
    /// Intra-category deployment order (topologically sorted where the
    /// same-category reference subgraph allows it).
    pub items: Vec<AssetId>,
}

/// Ordered list of deploy batches plus planning diagnostics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployPlan {
    pub batches: Vec<DeployBatch>,
    /// Total assets across all batches.
    pub item_count: usize,
    /// Non-fatal warnings produced during planning, e.g. skipped
    /// dependencies or a cycle-fallback ordering.
    pub warnings: Vec<String>,
}

impl DeployPlan {
    /// All assets in batches 1..=`upto`, in batch order.
    pub fn items_through(&self, upto: usize) -> Vec<AssetId> {
        self.batches
            .iter()
            .filter(|b| b.number <= upto)
            .flat_map(|b| b.items.iter().cloned())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
