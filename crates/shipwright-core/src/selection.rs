//! Plan-request selection parsing.
//!
//! A plan request is a flat list of selection tokens, each either
//! `Category:Name` or a bare name whose category is inferred by simple
//! keyword heuristics. Unknown category tokens produce a warning and
//! are skipped rather than failing the request.

use tracing::warn;

use crate::domain::{AssetCategory, AssetId};

/// Parse selection tokens into seed identifiers plus warnings for
/// anything that could not be understood.
pub fn parse_selections(tokens: &[String]) -> (Vec<AssetId>, Vec<String>) {
    let mut seeds = Vec::new();
    let mut warnings = Vec::new();

    for token in tokens {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }

        let id = match token.split_once(':') {
            Some((category, name)) => match AssetCategory::parse(category.trim()) {
                Some(category) => AssetId::new(category, name.trim()),
                None => {
                    let text = format!("unknown category in selection '{}'", token);
                    warn!("{}", text);
                    warnings.push(text);
                    continue;
                }
            },
            None => AssetId::new(infer_category(token), token),
        };

        if id.name.is_empty() {
            let text = format!("empty asset name in selection '{}'", token);
            warn!("{}", text);
            warnings.push(text);
            continue;
        }
        if !seeds.contains(&id) {
            seeds.push(id);
        }
    }

    (seeds, warnings)
}

/// Keyword heuristics for a bare selection name.
fn infer_category(name: &str) -> AssetCategory {
    let lowered = name.to_lowercase();
    if lowered.contains("bot") {
        AssetCategory::Bot
    } else if lowered.contains("flow") || lowered.contains("proc") {
        AssetCategory::Workflow
    } else if lowered.contains("plugin") {
        AssetCategory::AgentPlugin
    } else if lowered.contains("planner") {
        AssetCategory::PlannerBundle
    } else if lowered.contains("func") {
        AssetCategory::AgentFunction
    } else {
        AssetCategory::LogicClass
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn qualified_tokens_parse_category_and_name() {
        let (seeds, warnings) = parse_selections(&tokens(&["Bot:SupportBot", "flow:Onboard"]));
        assert!(warnings.is_empty());
        assert_eq!(
            seeds,
            vec![
                AssetId::new(AssetCategory::Bot, "SupportBot"),
                AssetId::new(AssetCategory::Workflow, "Onboard"),
            ]
        );
    }

    #[test]
    fn bare_names_use_keyword_heuristics() {
        let (seeds, _) = parse_selections(&tokens(&[
            "SupportBot",
            "RefundFlow",
            "OrderPlugin",
            "BillingHelper",
        ]));
        assert_eq!(seeds[0].category, AssetCategory::Bot);
        assert_eq!(seeds[1].category, AssetCategory::Workflow);
        assert_eq!(seeds[2].category, AssetCategory::AgentPlugin);
        assert_eq!(seeds[3].category, AssetCategory::LogicClass);
    }

    #[test]
    fn unknown_category_is_a_warning_not_an_error() {
        let (seeds, warnings) = parse_selections(&tokens(&["Gizmo:Thing", "Bot:SupportBot"]));
        assert_eq!(seeds.len(), 1);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("Gizmo:Thing"));
    }

    #[test]
    fn duplicates_collapse() {
        let (seeds, _) = parse_selections(&tokens(&["Bot:SupportBot", "Bot:SupportBot"]));
        assert_eq!(seeds.len(), 1);
    }
}
