//! Asset categories and identifiers.
//!
//! Every deployable unit on the target platform is identified by a
//! (category, name) pair. The category enumeration is fixed and its
//! declaration order is the platform deployment layer order: batches
//! are always emitted bottom-up, with bot versions last because they
//! are the outermost composite referencing everything beneath them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fixed category enumeration for deployable assets.
///
/// The derived `Ord` follows declaration order, which is the platform
/// deployment layer order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AssetCategory {
    /// Business-logic class (leaf of the reference graph).
    LogicClass,
    /// Process-automation definition.
    Workflow,
    /// Conversational-AI function definition.
    AgentFunction,
    /// Conversational-AI plugin bundle.
    AgentPlugin,
    /// Orchestration planner bundle.
    PlannerBundle,
    /// Chat-bot definition.
    Bot,
    /// A single version of a bot, colocated with its parent bot.
    BotVersion,
}

/// Platform deployment layer order, leaves first.
pub const DEPLOY_LAYER_ORDER: [AssetCategory; 7] = [
    AssetCategory::LogicClass,
    AssetCategory::Workflow,
    AssetCategory::AgentFunction,
    AssetCategory::AgentPlugin,
    AssetCategory::PlannerBundle,
    AssetCategory::Bot,
    AssetCategory::BotVersion,
];

impl AssetCategory {
    /// Position of this category in [`DEPLOY_LAYER_ORDER`].
    pub fn layer(&self) -> usize {
        DEPLOY_LAYER_ORDER
            .iter()
            .position(|c| c == self)
            .unwrap_or(DEPLOY_LAYER_ORDER.len())
    }

    /// Platform metadata type name, as it appears in manifests.
    pub fn metadata_name(&self) -> &'static str {
        match self {
            AssetCategory::LogicClass => "LogicClass",
            AssetCategory::Workflow => "Workflow",
            AssetCategory::AgentFunction => "AgentFunction",
            AssetCategory::AgentPlugin => "AgentPlugin",
            AssetCategory::PlannerBundle => "PlannerBundle",
            AssetCategory::Bot => "Bot",
            AssetCategory::BotVersion => "BotVersion",
        }
    }

    /// Parse a metadata type name or common alias.
    ///
    /// Accepts the canonical manifest name (`AgentPlugin`), the serde
    /// snake_case form (`agent_plugin`), and lowercase (`agentplugin`).
    pub fn parse(s: &str) -> Option<Self> {
        let folded: String = s.chars().filter(|c| *c != '_').collect::<String>().to_lowercase();
        match folded.as_str() {
            "logicclass" | "class" => Some(AssetCategory::LogicClass),
            "workflow" | "flow" | "process" => Some(AssetCategory::Workflow),
            "agentfunction" | "function" => Some(AssetCategory::AgentFunction),
            "agentplugin" | "plugin" => Some(AssetCategory::AgentPlugin),
            "plannerbundle" | "planner" => Some(AssetCategory::PlannerBundle),
            "bot" => Some(AssetCategory::Bot),
            "botversion" => Some(AssetCategory::BotVersion),
            _ => None,
        }
    }

    /// Whether the closure builder recurses into references of this
    /// category. Logic classes are leaves; bots and bot versions are
    /// only expanded when selected as seeds.
    pub fn recursable(&self) -> bool {
        matches!(
            self,
            AssetCategory::Workflow
                | AssetCategory::AgentFunction
                | AssetCategory::AgentPlugin
                | AssetCategory::PlannerBundle
        )
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.metadata_name())
    }
}

/// Identifier of a single deployable asset: (category, name).
///
/// Bot version names compose the parent bot name with a version label
/// (`SupportBot.v2`); see [`AssetId::bot_version`].
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct AssetId {
    pub category: AssetCategory,
    pub name: String,
}

impl AssetId {
    pub fn new(category: AssetCategory, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }

    /// Identifier for a version of a bot: `<bot>.<label>`.
    pub fn bot_version(bot: &str, label: &str) -> Self {
        Self::new(AssetCategory::BotVersion, format!("{}.{}", bot, label))
    }

    /// For a bot version, the parent bot name (text before the first `.`).
    pub fn parent_bot(&self) -> Option<&str> {
        if self.category == AssetCategory::BotVersion {
            self.name.split('.').next()
        } else {
            None
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_order_is_monotone_over_declaration() {
        for window in DEPLOY_LAYER_ORDER.windows(2) {
            assert!(window[0].layer() < window[1].layer());
            assert!(window[0] < window[1]);
        }
        assert_eq!(AssetCategory::LogicClass.layer(), 0);
        assert_eq!(AssetCategory::BotVersion.layer(), 6);
    }

    #[test]
    fn parse_accepts_canonical_and_aliases() {
        assert_eq!(
            AssetCategory::parse("AgentPlugin"),
            Some(AssetCategory::AgentPlugin)
        );
        assert_eq!(
            AssetCategory::parse("agent_plugin"),
            Some(AssetCategory::AgentPlugin)
        );
        assert_eq!(AssetCategory::parse("flow"), Some(AssetCategory::Workflow));
        assert_eq!(AssetCategory::parse("nonsense"), None);
    }

    #[test]
    fn bot_version_id_composes_parent_name() {
        let id = AssetId::bot_version("SupportBot", "v2");
        assert_eq!(id.name, "SupportBot.v2");
        assert_eq!(id.parent_bot(), Some("SupportBot"));
        assert_eq!(
            AssetId::new(AssetCategory::Bot, "SupportBot").parent_bot(),
            None
        );
    }

    #[test]
    fn only_mid_layers_are_recursable() {
        assert!(!AssetCategory::LogicClass.recursable());
        assert!(AssetCategory::Workflow.recursable());
        assert!(AssetCategory::AgentFunction.recursable());
        assert!(AssetCategory::AgentPlugin.recursable());
        assert!(AssetCategory::PlannerBundle.recursable());
        assert!(!AssetCategory::Bot.recursable());
        assert!(!AssetCategory::BotVersion.recursable());
    }
}
