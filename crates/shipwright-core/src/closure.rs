//! Dependency closure building.
//!
//! Expands a seed selection into the full transitive dependency set by
//! repeatedly extracting references, restricted to assets the local
//! inventory confirms to exist. Cycle-safe by construction: the
//! visited set is written before an identifier is ever queued, so a
//! cyclic reference graph (mutual plugin/function links) terminates.
//!
//! Sibling extractions within one wave run concurrently with bounded
//! parallelism; the visited set and result vectors are only mutated by
//! the driver between waves.

use std::collections::{BTreeSet, HashSet, VecDeque};

use futures::StreamExt;
use tracing::{debug, warn};

use crate::domain::{
    AssetCategory, AssetId, DependencyClosure, Reference, Result, SkippedDependency,
};
use crate::extract::extract_references;
use crate::inventory::Inventory;

/// Bounded concurrency for sibling definition reads within one wave.
const DEFAULT_EXTRACTION_CONCURRENCY: usize = 8;

/// Builds [`DependencyClosure`]s against a workspace inventory.
pub struct ClosureBuilder<'a> {
    inventory: &'a dyn Inventory,
    concurrency: usize,
}

impl<'a> ClosureBuilder<'a> {
    pub fn new(inventory: &'a dyn Inventory) -> Self {
        Self {
            inventory,
            concurrency: DEFAULT_EXTRACTION_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Resolve the transitive dependency closure of `seeds`.
    ///
    /// Referenced assets absent from the workspace are recorded in
    /// `skipped` (exactly once each) instead of being added: a plan
    /// must never include an asset that cannot be deployed locally.
    pub async fn resolve(&self, seeds: &[AssetId]) -> Result<DependencyClosure> {
        let mut visited: BTreeSet<AssetId> = BTreeSet::new();
        let mut members: Vec<AssetId> = Vec::new();
        let mut references: Vec<Reference> = Vec::new();
        let mut seen_edges: HashSet<(AssetCategory, String, AssetCategory, String)> =
            HashSet::new();
        let mut skipped: Vec<SkippedDependency> = Vec::new();
        let mut skipped_seen: BTreeSet<AssetId> = BTreeSet::new();
        let mut queue: VecDeque<AssetId> = VecDeque::new();

        for seed in seeds {
            if visited.contains(seed) {
                continue;
            }
            if self.inventory.contains(seed).await? {
                visited.insert(seed.clone());
                members.push(seed.clone());
                queue.push_back(seed.clone());
            } else if skipped_seen.insert(seed.clone()) {
                let entry = SkippedDependency {
                    target: seed.clone(),
                    referenced_by: seed.clone(),
                };
                warn!(asset = %seed, "{}", entry.warning());
                skipped.push(entry);
            }
        }

        while !queue.is_empty() {
            let wave: Vec<AssetId> = queue.drain(..).collect();
            debug!(wave_size = wave.len(), "extracting references");

            // Concurrent sibling extraction; `buffered` preserves wave
            // order so the closure is deterministic.
            let extractions: Vec<Extraction> = futures::stream::iter(
                wave.into_iter().map(|id| self.load_and_extract(id)),
            )
            .buffered(self.concurrency)
            .collect()
            .await;

            for extraction in extractions {
                for version in extraction.discovered_versions {
                    if visited.insert(version.clone()) {
                        members.push(version);
                    }
                }

                for reference in extraction.references {
                    let edge = (
                        reference.source_category,
                        reference.source_name.clone(),
                        reference.target_category,
                        reference.target_name.clone(),
                    );
                    if seen_edges.insert(edge) {
                        references.push(reference.clone());
                    }

                    let target = reference.target();
                    if visited.contains(&target) {
                        continue;
                    }
                    if !self.inventory.contains(&target).await? {
                        if skipped_seen.insert(target.clone()) {
                            let entry = SkippedDependency {
                                target,
                                referenced_by: AssetId::new(
                                    reference.source_category,
                                    reference.source_name.clone(),
                                ),
                            };
                            warn!("{}", entry.warning());
                            skipped.push(entry);
                        }
                        continue;
                    }

                    visited.insert(target.clone());
                    members.push(target.clone());
                    if target.category.recursable() {
                        queue.push_back(target);
                    }
                }
            }
        }

        Ok(DependencyClosure {
            members,
            references,
            skipped,
        })
    }

    /// Read one asset's definition and extract its references.
    ///
    /// For a bot, every colocated version file is scanned as well and
    /// the version identifiers are surfaced as discovered assets.
    /// Read failures degrade to an empty extraction: resolution is
    /// best-effort per asset and never aborts the whole closure.
    async fn load_and_extract(&self, id: AssetId) -> Extraction {
        let mut references = Vec::new();
        let mut discovered_versions = Vec::new();

        match self.inventory.read_definition(&id).await {
            Ok(content) => references.extend(extract_references(&id, &content)),
            Err(err) => {
                warn!(asset = %id, error = %err, "unreadable definition; extracting nothing");
            }
        }

        if id.category == AssetCategory::Bot {
            match self.inventory.bot_versions(&id.name).await {
                Ok(versions) => {
                    for (version_id, content) in versions {
                        references.extend(extract_references(&version_id, &content));
                        discovered_versions.push(version_id);
                    }
                }
                Err(err) => {
                    warn!(bot = %id.name, error = %err, "failed to scan colocated version files");
                }
            }
        }

        Extraction {
            references,
            discovered_versions,
        }
    }
}

struct Extraction {
    references: Vec<Reference>,
    discovered_versions: Vec<AssetId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::FsInventory;
    use std::path::Path;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn cyclic_references_terminate_with_each_member_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // A and B are mutually-referencing plugins, via their functions list.
        write(
            root,
            "plugins/A.plugin-meta.xml",
            "<agentPlugin><pluginName>B</pluginName></agentPlugin>",
        );
        write(
            root,
            "plugins/B.plugin-meta.xml",
            "<agentPlugin><pluginName>A</pluginName></agentPlugin>",
        );

        let inventory = FsInventory::new(root);
        let builder = ClosureBuilder::new(&inventory);
        let seeds = vec![AssetId::new(AssetCategory::AgentPlugin, "A")];
        let closure = builder.resolve(&seeds).await.unwrap();

        let a_count = closure
            .members
            .iter()
            .filter(|m| m.name == "A")
            .count();
        let b_count = closure
            .members
            .iter()
            .filter(|m| m.name == "B")
            .count();
        assert_eq!(a_count, 1);
        assert_eq!(b_count, 1);
        assert!(closure.skipped.is_empty());
    }

    #[tokio::test]
    async fn absent_references_are_skipped_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        // Two plugins both reference the same missing function.
        write(
            root,
            "plugins/A.plugin-meta.xml",
            "<agentPlugin><functionName>Ghost</functionName><pluginName>B</pluginName></agentPlugin>",
        );
        write(
            root,
            "plugins/B.plugin-meta.xml",
            "<agentPlugin><functionName>Ghost</functionName></agentPlugin>",
        );

        let inventory = FsInventory::new(root);
        let builder = ClosureBuilder::new(&inventory);
        let seeds = vec![AssetId::new(AssetCategory::AgentPlugin, "A")];
        let closure = builder.resolve(&seeds).await.unwrap();

        assert_eq!(closure.skipped.len(), 1);
        assert_eq!(closure.skipped[0].target.name, "Ghost");
        assert!(!closure.contains(&AssetId::new(AssetCategory::AgentFunction, "Ghost")));
    }

    #[tokio::test]
    async fn logic_class_references_are_leaves() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "functions/F1.function-meta.xml",
            "<agentFunction><invocationTarget>C1</invocationTarget>\
             <invocationTargetType>class</invocationTargetType></agentFunction>",
        );
        // C1 exists but is never opened: class sources are not scanned.
        write(root, "classes/C1.cls", "<functionName>NotFollowed</functionName>");

        let inventory = FsInventory::new(root);
        let builder = ClosureBuilder::new(&inventory);
        let seeds = vec![AssetId::new(AssetCategory::AgentFunction, "F1")];
        let closure = builder.resolve(&seeds).await.unwrap();

        assert!(closure.contains(&AssetId::new(AssetCategory::LogicClass, "C1")));
        assert!(!closure
            .members
            .iter()
            .any(|m| m.name == "NotFollowed"));
    }

    #[tokio::test]
    async fn missing_seed_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let inventory = FsInventory::new(dir.path());
        let builder = ClosureBuilder::new(&inventory);
        let seeds = vec![AssetId::new(AssetCategory::Bot, "NoSuchBot")];
        let closure = builder.resolve(&seeds).await.unwrap();

        assert!(closure.members.is_empty());
        assert_eq!(closure.skipped.len(), 1);
        assert!(closure.skipped[0].warning().contains("selected but not present"));
    }
}
