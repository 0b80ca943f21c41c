//! Pattern fallback extraction.
//!
//! Definition schemas evolve outside this system's control, so the
//! structured walk is backed by a fixed battery of permissive textual
//! patterns over the raw content. Anything recovered here is emitted
//! as an [`ReferenceKind::Inferred`] reference; the composing layer
//! drops matches already captured structurally.

use regex::Regex;

use crate::domain::{AssetCategory, AssetId, Reference, ReferenceKind};

/// One fallback pattern and the category its matches are attributed to.
struct PatternRule {
    regex: Regex,
    target: AssetCategory,
}

/// The fixed pattern battery: paired tag and attribute lookalikes for
/// each reference-bearing field, plus the free-text `source` field
/// heuristic (a bare identifier there usually names a function).
fn battery() -> Vec<PatternRule> {
    let specs: &[(&str, AssetCategory)] = &[
        (
            r"<invocationTarget>\s*([A-Za-z0-9_.]+)\s*</invocationTarget>",
            AssetCategory::Workflow,
        ),
        (
            r#"invocationTarget\s*=\s*"([A-Za-z0-9_.]+)""#,
            AssetCategory::Workflow,
        ),
        (
            r"<actionName>\s*([A-Za-z0-9_.]+)\s*</actionName>",
            AssetCategory::LogicClass,
        ),
        (
            r#"actionName\s*=\s*"([A-Za-z0-9_.]+)""#,
            AssetCategory::LogicClass,
        ),
        (
            r"<plannerName>\s*([A-Za-z0-9_.]+)\s*</plannerName>",
            AssetCategory::PlannerBundle,
        ),
        (
            r#"plannerName\s*=\s*"([A-Za-z0-9_.]+)""#,
            AssetCategory::PlannerBundle,
        ),
        (
            r"<pluginName>\s*([A-Za-z0-9_.]+)\s*</pluginName>",
            AssetCategory::AgentPlugin,
        ),
        (
            r#"pluginName\s*=\s*"([A-Za-z0-9_.]+)""#,
            AssetCategory::AgentPlugin,
        ),
        (
            r"<functionName>\s*([A-Za-z0-9_.]+)\s*</functionName>",
            AssetCategory::AgentFunction,
        ),
        (
            r#"functionName\s*=\s*"([A-Za-z0-9_.]+)""#,
            AssetCategory::AgentFunction,
        ),
        (
            r"<className>\s*([A-Za-z0-9_.]+)\s*</className>",
            AssetCategory::LogicClass,
        ),
        (
            r#"className\s*=\s*"([A-Za-z0-9_.]+)""#,
            AssetCategory::LogicClass,
        ),
        (
            r"<source>\s*([A-Za-z][A-Za-z0-9_]*)\s*</source>",
            AssetCategory::AgentFunction,
        ),
    ];

    specs
        .iter()
        .filter_map(|(pattern, target)| {
            Regex::new(pattern).ok().map(|regex| PatternRule {
                regex,
                target: *target,
            })
        })
        .collect()
}

/// A templated or internal identifier, excluded from inferred results
/// to suppress false positives.
fn is_internal_identifier(name: &str) -> bool {
    name.contains("__") || name.contains('.')
}

/// Re-scan the raw content with the pattern battery.
pub(crate) fn scan(source: &AssetId, content: &str) -> Vec<Reference> {
    let mut refs = Vec::new();
    for rule in battery() {
        for caps in rule.regex.captures_iter(content) {
            let name = &caps[1];
            if is_internal_identifier(name) {
                continue;
            }
            refs.push(Reference::new(
                source,
                rule.target,
                name,
                ReferenceKind::Inferred,
            ));
        }
    }
    refs
}
