//! Typed references between assets and the closure they span.

use serde::{Deserialize, Serialize};

use super::asset::{AssetCategory, AssetId};

/// How a reference was recovered from a definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// Extracted from a recognized structural field.
    Direct,
    /// Recovered via a permissive textual pattern match; lower confidence.
    Inferred,
}

/// A directed dependency edge between two assets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub source_category: AssetCategory,
    pub source_name: String,
    pub target_category: AssetCategory,
    pub target_name: String,
    pub kind: ReferenceKind,
}

impl Reference {
    pub fn new(
        source: &AssetId,
        target_category: AssetCategory,
        target_name: impl Into<String>,
        kind: ReferenceKind,
    ) -> Self {
        Self {
            source_category: source.category,
            source_name: source.name.clone(),
            target_category,
            target_name: target_name.into(),
            kind,
        }
    }

    pub fn target(&self) -> AssetId {
        AssetId::new(self.target_category, self.target_name.clone())
    }

    /// Identity used for deduplication: the 4-tuple without the kind.
    pub fn edge_key(&self) -> (AssetCategory, &str, AssetCategory, &str) {
        (
            self.source_category,
            self.source_name.as_str(),
            self.target_category,
            self.target_name.as_str(),
        )
    }
}

/// A referenced asset that is absent from the local workspace.
///
/// Kept as a diagnostic: the plan must never include an asset that
/// cannot actually be deployed from the local workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedDependency {
    /// The absent asset.
    pub target: AssetId,
    /// The asset whose definition referenced it.
    pub referenced_by: AssetId,
}

impl SkippedDependency {
    /// Warning text surfaced in plan output. A target equal to its
    /// referencer marks a selection seed that is itself absent.
    pub fn warning(&self) -> String {
        if self.target == self.referenced_by {
            format!(
                "skipped {}: selected but not present in the local workspace",
                self.target
            )
        } else {
            format!(
                "skipped {}: referenced by {} but not present in the local workspace",
                self.target, self.referenced_by
            )
        }
    }
}

/// The transitive dependency set reachable from a seed selection,
/// restricted to assets confirmed present in the local workspace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependencyClosure {
    /// Locally-present members, in discovery order.
    pub members: Vec<AssetId>,
    /// Every deduplicated reference observed while building the closure,
    /// including edges to skipped targets.
    pub references: Vec<Reference>,
    /// Referenced-but-absent assets, each recorded exactly once.
    pub skipped: Vec<SkippedDependency>,
}

impl DependencyClosure {
    pub fn contains(&self, id: &AssetId) -> bool {
        self.members.iter().any(|m| m == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edge_key_ignores_kind() {
        let source = AssetId::new(AssetCategory::AgentFunction, "F1");
        let direct = Reference::new(
            &source,
            AssetCategory::LogicClass,
            "C1",
            ReferenceKind::Direct,
        );
        let inferred = Reference::new(
            &source,
            AssetCategory::LogicClass,
            "C1",
            ReferenceKind::Inferred,
        );
        assert_eq!(direct.edge_key(), inferred.edge_key());
        assert_ne!(direct, inferred);
    }

    #[test]
    fn skipped_warning_names_both_ends() {
        let skipped = SkippedDependency {
            target: AssetId::new(AssetCategory::LogicClass, "C2"),
            referenced_by: AssetId::new(AssetCategory::AgentFunction, "F1"),
        };
        let text = skipped.warning();
        assert!(text.contains("LogicClass:C2"));
        assert!(text.contains("AgentFunction:F1"));
    }
}
