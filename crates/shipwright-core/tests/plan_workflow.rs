//! End-to-end planning over a filesystem workspace: selection →
//! closure → batch plan, covering the full bot dependency chain,
//! absent-dependency diagnostics, and cyclic reference graphs.

use std::path::Path;

use shipwright_core::{
    build_plan, validate_plan, AssetCategory, AssetId, ClosureBuilder, FsInventory,
    DEPLOY_LAYER_ORDER,
};

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

/// SupportBot's version references planner P1, P1 references plugin
/// G1, G1 references function F1, F1 references class C1 and workflow
/// W1. When `with_missing_class` is set, F1 additionally references
/// class C2, which is not written to the workspace.
fn support_bot_workspace(root: &Path, with_missing_class: bool) {
    write(
        root,
        "bots/SupportBot/SupportBot.bot-meta.xml",
        "<bot><label>Support Bot</label></bot>",
    );
    write(
        root,
        "bots/SupportBot/v1.botVersion-meta.xml",
        "<botVersion><plannerName>P1</plannerName></botVersion>",
    );
    write(
        root,
        "planners/P1.planner-meta.xml",
        "<plannerBundle><plugins><pluginName>G1</pluginName></plugins></plannerBundle>",
    );
    write(
        root,
        "plugins/G1.plugin-meta.xml",
        "<agentPlugin><functions><functionName>F1</functionName></functions></agentPlugin>",
    );

    let extra = if with_missing_class {
        "<escalation>\
            <invocationTarget>C2</invocationTarget>\
            <invocationTargetType>class</invocationTargetType>\
        </escalation>"
    } else {
        ""
    };
    write(
        root,
        "functions/F1.function-meta.xml",
        &format!(
            "<agentFunction>\
                <invocationTarget>C1</invocationTarget>\
                <invocationTargetType>class</invocationTargetType>\
                <fallback>\
                    <invocationTarget>W1</invocationTarget>\
                    <invocationTargetType>workflow</invocationTargetType>\
                </fallback>{}\
            </agentFunction>",
            extra
        ),
    );

    write(root, "workflows/W1.workflow-meta.xml", "<workflow></workflow>");
    write(root, "classes/C1.cls", "public class C1 {}");
}

#[tokio::test]
async fn bot_selection_plans_the_full_chain_in_layer_order() {
    let dir = tempfile::tempdir().unwrap();
    support_bot_workspace(dir.path(), false);

    let inventory = FsInventory::new(dir.path());
    let closure = ClosureBuilder::new(&inventory)
        .resolve(&[AssetId::new(AssetCategory::Bot, "SupportBot")])
        .await
        .unwrap();
    let plan = build_plan(&closure);

    assert_eq!(plan.batches.len(), 7);
    let categories: Vec<AssetCategory> = plan.batches.iter().map(|b| b.category).collect();
    assert_eq!(categories, DEPLOY_LAYER_ORDER.to_vec());

    // Every asset in the chain appears exactly once across all batches.
    let expected = [
        AssetId::new(AssetCategory::LogicClass, "C1"),
        AssetId::new(AssetCategory::Workflow, "W1"),
        AssetId::new(AssetCategory::AgentFunction, "F1"),
        AssetId::new(AssetCategory::AgentPlugin, "G1"),
        AssetId::new(AssetCategory::PlannerBundle, "P1"),
        AssetId::new(AssetCategory::Bot, "SupportBot"),
        AssetId::bot_version("SupportBot", "v1"),
    ];
    let all_items: Vec<AssetId> = plan
        .batches
        .iter()
        .flat_map(|b| b.items.iter().cloned())
        .collect();
    assert_eq!(all_items.len(), 7);
    for id in &expected {
        assert_eq!(
            all_items.iter().filter(|item| *item == id).count(),
            1,
            "{} should appear exactly once",
            id
        );
    }

    assert!(plan.warnings.is_empty());
    assert!(validate_plan(&plan).valid());
}

#[tokio::test]
async fn missing_dependency_is_excluded_with_exactly_one_warning() {
    let dir = tempfile::tempdir().unwrap();
    support_bot_workspace(dir.path(), true);

    let inventory = FsInventory::new(dir.path());
    let closure = ClosureBuilder::new(&inventory)
        .resolve(&[AssetId::new(AssetCategory::Bot, "SupportBot")])
        .await
        .unwrap();
    let plan = build_plan(&closure);

    let c2 = AssetId::new(AssetCategory::LogicClass, "C2");
    assert!(plan
        .batches
        .iter()
        .all(|batch| !batch.items.contains(&c2)));

    let naming_c2: Vec<&String> = plan
        .warnings
        .iter()
        .filter(|w| w.contains("LogicClass:C2"))
        .collect();
    assert_eq!(naming_c2.len(), 1);
    assert!(naming_c2[0].contains("AgentFunction:F1"));
}

#[tokio::test]
async fn cross_category_reference_cycle_terminates() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    // Plugin and function reference each other: G1 -> F1 -> G1.
    write(
        root,
        "plugins/G1.plugin-meta.xml",
        "<agentPlugin><functions><functionName>F1</functionName></functions></agentPlugin>",
    );
    write(
        root,
        "functions/F1.function-meta.xml",
        "<agentFunction><pluginName>G1</pluginName></agentFunction>",
    );

    let inventory = FsInventory::new(root);
    let closure = ClosureBuilder::new(&inventory)
        .resolve(&[AssetId::new(AssetCategory::AgentPlugin, "G1")])
        .await
        .unwrap();

    assert_eq!(closure.members.len(), 2);
    let plan = build_plan(&closure);
    assert_eq!(plan.batches.len(), 2);
    assert_eq!(plan.batches[0].category, AssetCategory::AgentFunction);
    assert_eq!(plan.batches[1].category, AssetCategory::AgentPlugin);
    assert!(validate_plan(&plan).valid());
}

#[tokio::test]
async fn definition_without_links_contributes_a_single_batch() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "workflows/Solo.workflow-meta.xml",
        "<workflow><label>Solo</label></workflow>",
    );

    let inventory = FsInventory::new(dir.path());
    let closure = ClosureBuilder::new(&inventory)
        .resolve(&[AssetId::new(AssetCategory::Workflow, "Solo")])
        .await
        .unwrap();

    assert_eq!(closure.members.len(), 1);
    assert!(closure.references.is_empty());

    let plan = build_plan(&closure);
    assert_eq!(plan.batches.len(), 1);
    assert_eq!(plan.item_count, 1);
}
