//! Structured extraction: pull-parse a definition document and walk
//! the substructures expected for each asset category.
//!
//! The walk is schema-tolerant: fields are collected as (parent,
//! name, value) leaves and paired by parent element instance, so a
//! definition can nest invocation pairs at any depth without the
//! walker knowing the full schema.

use std::collections::BTreeMap;

use quick_xml::events::Event;
use quick_xml::Reader;

use crate::domain::{AssetCategory, AssetId, Reference, ReferenceKind};

/// A leaf element's text, tagged with the element instance containing it.
#[derive(Debug, Clone)]
struct LeafField {
    parent_id: u64,
    parent_name: String,
    name: String,
    value: String,
}

/// Collect every text-bearing leaf element of the document.
fn collect_leaf_fields(content: &str) -> Result<Vec<LeafField>, quick_xml::Error> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    // Stack of (element name, instance id) for currently-open elements.
    let mut stack: Vec<(String, u64)> = Vec::new();
    let mut next_id: u64 = 0;
    let mut fields = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                next_id += 1;
                stack.push((name, next_id));
            }
            Event::Text(t) => {
                let value = t.unescape()?.trim().to_string();
                if value.is_empty() || stack.len() < 2 {
                    continue;
                }
                let (leaf_name, _) = stack[stack.len() - 1].clone();
                let (parent_name, parent_id) = stack[stack.len() - 2].clone();
                fields.push(LeafField {
                    parent_id,
                    parent_name,
                    name: leaf_name,
                    value,
                });
            }
            Event::End(_) => {
                stack.pop();
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(fields)
}

/// Map an invocation type discriminator to its target category.
fn invocation_category(target_type: &str) -> Option<AssetCategory> {
    match target_type.to_lowercase().as_str() {
        "class" | "apex" => Some(AssetCategory::LogicClass),
        "workflow" | "flow" => Some(AssetCategory::Workflow),
        "function" => Some(AssetCategory::AgentFunction),
        _ => None,
    }
}

/// Group leaf fields by the element instance that contains them.
fn group_by_parent(fields: &[LeafField]) -> BTreeMap<u64, Vec<&LeafField>> {
    let mut groups: BTreeMap<u64, Vec<&LeafField>> = BTreeMap::new();
    for field in fields {
        groups.entry(field.parent_id).or_default().push(field);
    }
    groups
}

/// Emit a reference per `invocationTarget` + `invocationTargetType`
/// pair found under the same parent element.
fn invocation_pairs(source: &AssetId, fields: &[LeafField], out: &mut Vec<Reference>) {
    for group in group_by_parent(fields).values() {
        let target = group.iter().find(|f| f.name == "invocationTarget");
        let target_type = group.iter().find(|f| f.name == "invocationTargetType");
        if let (Some(target), Some(target_type)) = (target, target_type) {
            if let Some(category) = invocation_category(&target_type.value) {
                out.push(Reference::new(
                    source,
                    category,
                    target.value.clone(),
                    ReferenceKind::Direct,
                ));
            }
        }
    }
}

/// Emit a reference for every occurrence of a single named field.
fn named_field(
    source: &AssetId,
    fields: &[LeafField],
    field_name: &str,
    category: AssetCategory,
    out: &mut Vec<Reference>,
) {
    for field in fields.iter().filter(|f| f.name == field_name) {
        out.push(Reference::new(
            source,
            category,
            field.value.clone(),
            ReferenceKind::Direct,
        ));
    }
}

/// Emit workflow action-call references: `actionName` paired with an
/// `actionType` discriminator under the same parent element.
fn action_calls(source: &AssetId, fields: &[LeafField], out: &mut Vec<Reference>) {
    for group in group_by_parent(fields).values() {
        let name = group.iter().find(|f| f.name == "actionName");
        let action_type = group.iter().find(|f| f.name == "actionType");
        if let (Some(name), Some(action_type)) = (name, action_type) {
            let category = match action_type.value.to_lowercase().as_str() {
                "class" | "apex" => Some(AssetCategory::LogicClass),
                "workflow" | "subworkflow" | "flow" => Some(AssetCategory::Workflow),
                _ => None,
            };
            if let Some(category) = category {
                out.push(Reference::new(
                    source,
                    category,
                    name.value.clone(),
                    ReferenceKind::Direct,
                ));
            }
        }
    }
}

/// Walk the substructures expected for the source asset's category.
///
/// Unknown or missing substructures simply contribute nothing; a
/// malformed document surfaces as a parse error which the caller
/// downgrades to an empty result.
pub(crate) fn walk(
    source: &AssetId,
    content: &str,
) -> Result<Vec<Reference>, quick_xml::Error> {
    let fields = collect_leaf_fields(content)?;
    let mut refs = Vec::new();

    match source.category {
        AssetCategory::AgentFunction => {
            invocation_pairs(source, &fields, &mut refs);
        }
        AssetCategory::AgentPlugin => {
            named_field(
                source,
                &fields,
                "functionName",
                AssetCategory::AgentFunction,
                &mut refs,
            );
            invocation_pairs(source, &fields, &mut refs);
        }
        AssetCategory::PlannerBundle => {
            named_field(
                source,
                &fields,
                "pluginName",
                AssetCategory::AgentPlugin,
                &mut refs,
            );
            named_field(
                source,
                &fields,
                "functionName",
                AssetCategory::AgentFunction,
                &mut refs,
            );
        }
        AssetCategory::Bot | AssetCategory::BotVersion => {
            named_field(
                source,
                &fields,
                "plannerName",
                AssetCategory::PlannerBundle,
                &mut refs,
            );
            invocation_pairs(source, &fields, &mut refs);
        }
        AssetCategory::Workflow => {
            for field in fields.iter() {
                if field.name == "name" && field.parent_name == "subworkflows" {
                    refs.push(Reference::new(
                        source,
                        AssetCategory::Workflow,
                        field.value.clone(),
                        ReferenceKind::Direct,
                    ));
                }
            }
            action_calls(source, &fields, &mut refs);
            named_field(
                source,
                &fields,
                "className",
                AssetCategory::LogicClass,
                &mut refs,
            );
        }
        // Logic classes are source code, not structured definitions.
        AssetCategory::LogicClass => {}
    }

    Ok(refs)
}
