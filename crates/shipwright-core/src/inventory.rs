//! Local asset inventory oracle.
//!
//! Answers two questions for the closure builder: which assets of a
//! category exist in the local workspace, and where one asset's
//! definition file lives. Backed by fixed per-category directory and
//! file-naming conventions relative to a metadata root; pluggable via
//! the [`Inventory`] trait.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::domain::{AssetCategory, AssetId, Result, ShipwrightError};

/// Oracle over the local workspace's deployable assets.
#[async_trait]
pub trait Inventory: Send + Sync {
    /// Names of all assets of `category` present in the workspace.
    async fn names(&self, category: AssetCategory) -> Result<BTreeSet<String>>;

    /// Location of one asset's definition file, if present.
    async fn locate(&self, id: &AssetId) -> Result<Option<PathBuf>>;

    /// Read one asset's definition content.
    async fn read_definition(&self, id: &AssetId) -> Result<String>;

    /// Version assets colocated with a bot, paired with their raw
    /// contents. Versions are not separately indexed, so this is the
    /// only way to enumerate them.
    async fn bot_versions(&self, bot: &str) -> Result<Vec<(AssetId, String)>>;

    /// Whether the asset's definition file exists.
    async fn contains(&self, id: &AssetId) -> Result<bool> {
        Ok(self.locate(id).await?.is_some())
    }
}

/// Per-category subdirectory under the metadata root.
fn category_dir(category: AssetCategory) -> &'static str {
    match category {
        AssetCategory::LogicClass => "classes",
        AssetCategory::Workflow => "workflows",
        AssetCategory::AgentFunction => "functions",
        AssetCategory::AgentPlugin => "plugins",
        AssetCategory::PlannerBundle => "planners",
        AssetCategory::Bot | AssetCategory::BotVersion => "bots",
    }
}

/// Definition file suffix for flat-file categories.
fn file_suffix(category: AssetCategory) -> Option<&'static str> {
    match category {
        AssetCategory::LogicClass => Some(".cls"),
        AssetCategory::Workflow => Some(".workflow-meta.xml"),
        AssetCategory::AgentFunction => Some(".function-meta.xml"),
        AssetCategory::AgentPlugin => Some(".plugin-meta.xml"),
        AssetCategory::PlannerBundle => Some(".planner-meta.xml"),
        AssetCategory::Bot | AssetCategory::BotVersion => None,
    }
}

const BOT_SUFFIX: &str = ".bot-meta.xml";
const BOT_VERSION_SUFFIX: &str = ".botVersion-meta.xml";

/// Filesystem-backed inventory over the standard metadata layout:
///
/// ```text
/// <root>/classes/<name>.cls
/// <root>/workflows/<name>.workflow-meta.xml
/// <root>/functions/<name>.function-meta.xml
/// <root>/plugins/<name>.plugin-meta.xml
/// <root>/planners/<name>.planner-meta.xml
/// <root>/bots/<name>/<name>.bot-meta.xml
/// <root>/bots/<name>/<label>.botVersion-meta.xml
/// ```
#[derive(Debug, Clone)]
pub struct FsInventory {
    root: PathBuf,
}

impl FsInventory {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Conventional path of an asset's definition file, whether or not
    /// it exists.
    pub fn definition_path(&self, id: &AssetId) -> PathBuf {
        let dir = self.root.join(category_dir(id.category));
        match id.category {
            AssetCategory::Bot => dir.join(&id.name).join(format!("{}{}", id.name, BOT_SUFFIX)),
            AssetCategory::BotVersion => {
                let (bot, label) = split_version_name(&id.name);
                dir.join(bot).join(format!("{}{}", label, BOT_VERSION_SUFFIX))
            }
            _ => {
                let suffix = file_suffix(id.category).unwrap_or_default();
                dir.join(format!("{}{}", id.name, suffix))
            }
        }
    }

    async fn flat_names(&self, category: AssetCategory) -> Result<BTreeSet<String>> {
        let dir = self.root.join(category_dir(category));
        let suffix = file_suffix(category).unwrap_or_default();
        let mut names = BTreeSet::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            // Absent category directory means no assets of that kind.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = file_name.strip_suffix(suffix) {
                if !stem.is_empty() {
                    names.insert(stem.to_string());
                }
            }
        }
        Ok(names)
    }

    async fn bot_names(&self) -> Result<BTreeSet<String>> {
        let dir = self.root.join(category_dir(AssetCategory::Bot));
        let mut names = BTreeSet::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let bot = entry.file_name().to_string_lossy().into_owned();
            let definition = entry.path().join(format!("{}{}", bot, BOT_SUFFIX));
            if tokio::fs::try_exists(&definition).await? {
                names.insert(bot);
            }
        }
        Ok(names)
    }

    async fn bot_version_names(&self) -> Result<BTreeSet<String>> {
        let mut names = BTreeSet::new();
        for bot in self.bot_names().await? {
            for (id, _) in self.bot_versions(&bot).await? {
                names.insert(id.name);
            }
        }
        Ok(names)
    }
}

fn split_version_name(name: &str) -> (&str, &str) {
    match name.split_once('.') {
        Some((bot, label)) => (bot, label),
        None => (name, ""),
    }
}

#[async_trait]
impl Inventory for FsInventory {
    async fn names(&self, category: AssetCategory) -> Result<BTreeSet<String>> {
        match category {
            AssetCategory::Bot => self.bot_names().await,
            AssetCategory::BotVersion => self.bot_version_names().await,
            _ => self.flat_names(category).await,
        }
    }

    async fn locate(&self, id: &AssetId) -> Result<Option<PathBuf>> {
        let path = self.definition_path(id);
        if tokio::fs::try_exists(&path).await? {
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }

    async fn read_definition(&self, id: &AssetId) -> Result<String> {
        let path = self
            .locate(id)
            .await?
            .ok_or_else(|| ShipwrightError::AssetNotFound(id.to_string()))?;
        Ok(tokio::fs::read_to_string(&path).await?)
    }

    async fn bot_versions(&self, bot: &str) -> Result<Vec<(AssetId, String)>> {
        let dir = self.root.join(category_dir(AssetCategory::Bot)).join(bot);
        let mut versions = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(versions),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if let Some(label) = file_name.strip_suffix(BOT_VERSION_SUFFIX) {
                let content = tokio::fs::read_to_string(entry.path()).await?;
                versions.push((AssetId::bot_version(bot, label), content));
            }
        }
        // read_dir order is platform-dependent
        versions.sort_by(|a, b| a.0.name.cmp(&b.0.name));
        Ok(versions)
    }
}
