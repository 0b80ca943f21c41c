//! Cumulative deploy manifests.
//!
//! Batch *i*'s manifest carries the union of all assets in batches
//! 1..=i, grouped by category, so every validation step reflects
//! everything that would already be deployed by that point. Manifests
//! are written as human-inspectable XML artifacts named after their
//! batch number, with a digest sidecar, so a manual fallback
//! invocation against the external executor is always possible.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use sha2::{Digest, Sha256};

use crate::domain::{AssetCategory, AssetId, DeployBatch, Result, ShipwrightError};

/// Union of batches 1..=`batch_number`, grouped by category.
/// Immutable once produced; one per batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CumulativeManifest {
    pub batch_number: usize,
    /// Target-platform schema version stamp.
    pub api_version: String,
    groups: BTreeMap<AssetCategory, BTreeSet<String>>,
}

impl CumulativeManifest {
    /// Build the cumulative manifest for batch `batch_number` from a
    /// plan's batches.
    pub fn from_batches(batches: &[DeployBatch], batch_number: usize, api_version: &str) -> Self {
        let mut groups: BTreeMap<AssetCategory, BTreeSet<String>> = BTreeMap::new();
        for batch in batches.iter().filter(|b| b.number <= batch_number) {
            for item in &batch.items {
                groups
                    .entry(item.category)
                    .or_default()
                    .insert(item.name.clone());
            }
        }
        Self {
            batch_number,
            api_version: api_version.to_string(),
            groups,
        }
    }

    /// All members, in category layer order then name order.
    pub fn members(&self) -> Vec<AssetId> {
        self.groups
            .iter()
            .flat_map(|(category, names)| {
                names.iter().map(|name| AssetId::new(*category, name.clone()))
            })
            .collect()
    }

    pub fn item_count(&self) -> usize {
        self.groups.values().map(|names| names.len()).sum()
    }

    /// Artifact file name for a batch's manifest.
    pub fn artifact_file_name(batch_number: usize) -> String {
        format!("deploy-manifest-batch-{}.xml", batch_number)
    }

    /// Render the manifest document. Groups appear in layer order and
    /// members in name order, so artifacts are diffable.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        out.push_str(&format!(
            "<deployManifest version=\"{}\" batch=\"{}\">\n",
            escape(&self.api_version),
            self.batch_number
        ));
        for (category, names) in &self.groups {
            out.push_str(&format!(
                "    <types name=\"{}\">\n",
                category.metadata_name()
            ));
            for name in names {
                out.push_str(&format!("        <members>{}</members>\n", escape(name)));
            }
            out.push_str("    </types>\n");
        }
        out.push_str("</deployManifest>\n");
        out
    }

    /// Parse a rendered manifest document back into a manifest.
    pub fn parse(xml: &str) -> Result<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut batch_number = 0usize;
        let mut api_version = String::new();
        let mut groups: BTreeMap<AssetCategory, BTreeSet<String>> = BTreeMap::new();
        let mut current: Option<AssetCategory> = None;
        let mut in_members = false;

        loop {
            let event = reader
                .read_event()
                .map_err(|e| ShipwrightError::ManifestParse(e.to_string()))?;
            match event {
                Event::Start(e) => match e.name().as_ref() {
                    b"deployManifest" => {
                        for attr in e.attributes() {
                            let attr =
                                attr.map_err(|e| ShipwrightError::ManifestParse(e.to_string()))?;
                            let value = attr
                                .unescape_value()
                                .map_err(|e| ShipwrightError::ManifestParse(e.to_string()))?;
                            match attr.key.as_ref() {
                                b"version" => api_version = value.into_owned(),
                                b"batch" => {
                                    batch_number = value.parse().map_err(|_| {
                                        ShipwrightError::ManifestParse(format!(
                                            "invalid batch attribute: {}",
                                            value
                                        ))
                                    })?
                                }
                                _ => {}
                            }
                        }
                    }
                    b"types" => {
                        for attr in e.attributes() {
                            let attr =
                                attr.map_err(|e| ShipwrightError::ManifestParse(e.to_string()))?;
                            if attr.key.as_ref() == b"name" {
                                let value = attr
                                    .unescape_value()
                                    .map_err(|e| ShipwrightError::ManifestParse(e.to_string()))?;
                                current = Some(AssetCategory::parse(&value).ok_or_else(|| {
                                    ShipwrightError::ManifestParse(format!(
                                        "unknown category: {}",
                                        value
                                    ))
                                })?);
                            }
                        }
                    }
                    b"members" => in_members = true,
                    _ => {}
                },
                Event::Text(t) => {
                    if in_members {
                        if let Some(category) = current {
                            let name = t
                                .unescape()
                                .map_err(|e| ShipwrightError::ManifestParse(e.to_string()))?
                                .trim()
                                .to_string();
                            if !name.is_empty() {
                                groups.entry(category).or_default().insert(name);
                            }
                        }
                    }
                }
                Event::End(e) => match e.name().as_ref() {
                    b"members" => in_members = false,
                    b"types" => current = None,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(Self {
            batch_number,
            api_version,
            groups,
        })
    }

    /// Persist `<dir>/deploy-manifest-batch-<i>.xml` and its
    /// `.digest` sidecar. Returns the manifest path.
    pub fn write_artifact(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let content = self.render();
        let path = dir.join(Self::artifact_file_name(self.batch_number));
        let digest_path = path.with_extension("xml.digest");

        std::fs::write(&path, &content)?;
        std::fs::write(&digest_path, content_digest(content.as_bytes()))?;
        Ok(path)
    }

    /// Read a batch's manifest artifact back, verifying the digest
    /// sidecar.
    pub fn read_artifact(dir: &Path, batch_number: usize) -> Result<Self> {
        let path = dir.join(Self::artifact_file_name(batch_number));
        let digest_path = path.with_extension("xml.digest");

        let content = std::fs::read_to_string(&path)?;
        let expected = std::fs::read_to_string(&digest_path)?;
        let actual = content_digest(content.as_bytes());
        if expected.trim() != actual {
            return Err(ShipwrightError::ManifestDigestMismatch {
                expected: expected.trim().to_string(),
                actual,
            });
        }
        Self::parse(&content)
    }
}

fn content_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_batches() -> Vec<DeployBatch> {
        vec![
            DeployBatch {
                number: 1,
                category: AssetCategory::LogicClass,
                items: vec![
                    AssetId::new(AssetCategory::LogicClass, "C1"),
                    AssetId::new(AssetCategory::LogicClass, "C2"),
                ],
            },
            DeployBatch {
                number: 2,
                category: AssetCategory::AgentFunction,
                items: vec![AssetId::new(AssetCategory::AgentFunction, "F1")],
            },
            DeployBatch {
                number: 3,
                category: AssetCategory::Bot,
                items: vec![AssetId::new(AssetCategory::Bot, "SupportBot")],
            },
        ]
    }

    #[test]
    fn cumulative_union_grows_with_batch_number() {
        let batches = sample_batches();
        let first = CumulativeManifest::from_batches(&batches, 1, "59.0");
        assert_eq!(first.item_count(), 2);

        let last = CumulativeManifest::from_batches(&batches, 3, "59.0");
        assert_eq!(last.item_count(), 4);
        assert!(last
            .members()
            .contains(&AssetId::new(AssetCategory::Bot, "SupportBot")));
    }

    #[test]
    fn render_parse_round_trip_is_exact() {
        let batches = sample_batches();
        for batch_number in 1..=3 {
            let manifest = CumulativeManifest::from_batches(&batches, batch_number, "59.0");
            let parsed = CumulativeManifest::parse(&manifest.render()).unwrap();
            assert_eq!(parsed, manifest);
            assert_eq!(parsed.members(), manifest.members());
        }
    }

    #[test]
    fn members_are_unique_and_layer_ordered() {
        let batches = sample_batches();
        let manifest = CumulativeManifest::from_batches(&batches, 3, "59.0");
        let members = manifest.members();
        let mut deduped = members.clone();
        deduped.dedup();
        assert_eq!(members, deduped);
        // Layer order: classes before functions before bots.
        assert_eq!(members[0].category, AssetCategory::LogicClass);
        assert_eq!(members.last().unwrap().category, AssetCategory::Bot);
    }

    #[test]
    fn artifact_round_trip_verifies_digest() {
        let dir = tempfile::tempdir().unwrap();
        let batches = sample_batches();
        let manifest = CumulativeManifest::from_batches(&batches, 2, "59.0");

        let path = manifest.write_artifact(dir.path()).unwrap();
        assert!(path.ends_with("deploy-manifest-batch-2.xml"));

        let read = CumulativeManifest::read_artifact(dir.path(), 2).unwrap();
        assert_eq!(read, manifest);

        // Tampering is detected.
        std::fs::write(&path, "<deployManifest version=\"59.0\" batch=\"2\"/>").unwrap();
        let err = CumulativeManifest::read_artifact(dir.path(), 2).unwrap_err();
        assert!(matches!(
            err,
            ShipwrightError::ManifestDigestMismatch { .. }
        ));
    }

    #[test]
    fn parse_rejects_unknown_category() {
        let xml = r#"<deployManifest version="59.0" batch="1">
    <types name="Gizmo">
        <members>X</members>
    </types>
</deployManifest>"#;
        assert!(CumulativeManifest::parse(xml).is_err());
    }
}
