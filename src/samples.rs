//! Built-in sample concept maps that can be quickly loaded from the UI.
//!
//! This module defines a few curated starter maps ranging from a small
//! concept cluster to a codebase-shaped map to help new users get started.

use crate::types::*;

/// Kinds of built-in samples available from the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// A small cluster of Rust ownership concepts
    OwnershipBasics,
    /// Modules and dependencies of a small web service codebase
    WebServiceModules,
    /// A study map with a parent topic containing grouped sub-concepts
    GroupedStudyMap,
}

/// Metadata for a single sample.
pub struct SampleInfo {
    /// Stable identifier for the sample
    pub kind: SampleKind,
    /// Human-friendly display name
    pub name: &'static str,
}

/// Returns all samples with their display names.
pub const fn all_samples() -> &'static [SampleInfo] {
    const SAMPLES: &[SampleInfo] = &[
        SampleInfo {
            kind: SampleKind::OwnershipBasics,
            name: "Ownership Basics",
        },
        SampleInfo {
            kind: SampleKind::WebServiceModules,
            name: "Web Service Modules",
        },
        SampleInfo {
            kind: SampleKind::GroupedStudyMap,
            name: "Grouped Study Map",
        },
    ];
    SAMPLES
}

/// Builds the graph for the given sample kind.
pub fn build_sample(kind: SampleKind) -> MapData {
    match kind {
        SampleKind::OwnershipBasics => build_ownership_basics(),
        SampleKind::WebServiceModules => build_web_service_modules(),
        SampleKind::GroupedStudyMap => build_grouped_study_map(),
    }
}

fn add_node(data: &mut MapData, node: ConceptNode) -> NodeId {
    let id = node.id;
    data.nodes.insert(id, node);
    id
}

fn add_edge(data: &mut MapData, source: NodeId, target: NodeId, label: &str) {
    let edge = ConceptEdge::new(source, target, label);
    data.edges.insert(edge.id, edge);
}

fn build_ownership_basics() -> MapData {
    let mut data = MapData::new();

    let mut ownership = ConceptNode::new("Ownership", (0.0, 0.0), "concept");
    ownership.details = Some("Every value has a single owner.".to_string());
    let ownership_id = add_node(&mut data, ownership);

    let mut borrowing = ConceptNode::new("Borrowing", (-250.0, 150.0), "concept");
    borrowing.details = Some("References grant access without transferring ownership.".to_string());
    let borrowing_id = add_node(&mut data, borrowing);

    let moves_id = add_node(&mut data, ConceptNode::new("Moves", (250.0, 150.0), "concept"));
    let lifetimes_id =
        add_node(&mut data, ConceptNode::new("Lifetimes", (0.0, 300.0), "concept"));

    add_edge(&mut data, ownership_id, borrowing_id, "allows");
    add_edge(&mut data, ownership_id, moves_id, "transfers via");
    add_edge(&mut data, borrowing_id, lifetimes_id, "bounded by");

    data
}

fn build_web_service_modules() -> MapData {
    let mut data = MapData::new();

    let router_id = add_node(&mut data, ConceptNode::new("Router", (0.0, 0.0), "module"));
    let handlers_id =
        add_node(&mut data, ConceptNode::new("Handlers", (250.0, 0.0), "module"));
    let db_id = add_node(&mut data, ConceptNode::new("Database Layer", (500.0, 0.0), "module"));
    let mut config = ConceptNode::new("Config", (250.0, -200.0), "module");
    config.style = Some(NodeStyle {
        fill: Some([230, 210, 160]),
        shape: Some(NodeShape::Ellipse),
        width: None,
        height: None,
    });
    let config_id = add_node(&mut data, config);

    add_edge(&mut data, router_id, handlers_id, "dispatches to");
    add_edge(&mut data, handlers_id, db_id, "queries");
    let mut dashed = ConceptEdge::new(config_id, handlers_id, "configures");
    dashed.line_style = LineStyle::Dashed;
    data.edges.insert(dashed.id, dashed);

    data
}

fn build_grouped_study_map() -> MapData {
    let mut data = MapData::new();

    let mut topic = ConceptNode::new("Error Handling", (0.0, 0.0), "topic");
    let topic_id = topic.id;

    let mut result_node = ConceptNode::new("Result", (-150.0, 150.0), "concept");
    result_node.parent = Some(topic_id);
    let result_id = result_node.id;

    let mut panic_node = ConceptNode::new("Panic", (150.0, 150.0), "concept");
    panic_node.parent = Some(topic_id);
    let panic_id = panic_node.id;

    topic.children = vec![result_id, panic_id];
    add_node(&mut data, topic);
    add_node(&mut data, result_node);
    add_node(&mut data, panic_node);

    add_edge(&mut data, result_id, panic_id, "preferred over");

    data
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_sample_builds_a_consistent_graph() {
        for info in all_samples() {
            let data = build_sample(info.kind);
            assert!(!data.is_empty(), "sample '{}' is empty", info.name);
            assert!(
                data.integrity().is_empty(),
                "sample '{}' has integrity problems",
                info.name
            );
        }
    }

    #[test]
    fn test_grouped_sample_links_parent_and_children() {
        let data = build_sample(SampleKind::GroupedStudyMap);
        let topic = data
            .nodes
            .values()
            .find(|n| n.kind == "topic")
            .expect("topic node");
        assert_eq!(topic.children.len(), 2);
        for child in &topic.children {
            assert_eq!(data.nodes[child].parent, Some(topic.id));
        }
    }
}
