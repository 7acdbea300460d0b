//! Core data types and structures for the concept-map tool.
//!
//! This module defines all the fundamental data structures used throughout the
//! application, including concept nodes, edges, the `MapData` aggregate that a
//! map's graph is stored and persisted as, and the owning `ConceptMap` record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier for concept nodes.
pub type NodeId = Uuid;

/// Unique identifier for edges between concepts.
pub type EdgeId = Uuid;

/// Unique identifier for a saved concept map.
pub type MapId = Uuid;

/// Unique identifier for a user (map owner).
pub type UserId = Uuid;

/// Unique identifier for a classroom a map can be shared with.
pub type ClassroomId = Uuid;

/// Visual shape used when rendering a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum NodeShape {
    /// Rounded rectangle (the default)
    Rectangle,
    /// Ellipse fitted to the node bounds
    Ellipse,
    /// Diamond fitted to the node bounds
    Diamond,
}

/// Optional per-node styling attributes.
///
/// Absent attributes fall back to kind-based defaults at render time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeStyle {
    /// Background fill as RGB
    pub fill: Option<[u8; 3]>,
    /// Shape override
    pub shape: Option<NodeShape>,
    /// Width override in world units
    pub width: Option<f32>,
    /// Height override in world units
    pub height: Option<f32>,
}

/// Line style for rendering an edge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum LineStyle {
    /// Continuous line
    #[default]
    Solid,
    /// Dashed line
    Dashed,
}

/// Represents a single concept in a map.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptNode {
    /// Unique identifier for this node
    pub id: NodeId,
    /// User-displayable label of the concept
    pub label: String,
    /// Optional longer description shown in the properties panel
    #[serde(default)]
    pub details: Option<String>,
    /// Free-form type tag used for styling (e.g. "concept", "module", "question")
    pub kind: String,
    /// Position on the canvas as (x, y) coordinates
    pub position: (f32, f32),
    /// Optional parent node for grouping/containment
    #[serde(default)]
    pub parent: Option<NodeId>,
    /// Ids of child nodes contained by this node
    #[serde(default)]
    pub children: Vec<NodeId>,
    /// Optional styling overrides
    #[serde(default)]
    pub style: Option<NodeStyle>,
    /// Whether the node is highlighted in the editor
    #[serde(default)]
    pub highlighted: bool,
}

impl ConceptNode {
    /// Creates a new concept node with a fresh id and no parent, children,
    /// styling, or highlight.
    ///
    /// # Arguments
    ///
    /// * `label` - The display label for the concept
    /// * `position` - The (x, y) position on the canvas
    /// * `kind` - The free-form type tag used for styling
    pub fn new(label: impl Into<String>, position: (f32, f32), kind: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            details: None,
            kind: kind.into(),
            position,
            parent: None,
            children: Vec::new(),
            style: None,
            highlighted: false,
        }
    }

    /// Effective width of the node in world units, falling back to the default.
    pub fn width(&self) -> f32 {
        self.style
            .as_ref()
            .and_then(|s| s.width)
            .unwrap_or(crate::constants::NODE_WIDTH)
    }

    /// Effective height of the node in world units, falling back to the default.
    pub fn height(&self) -> f32 {
        self.style
            .as_ref()
            .and_then(|s| s.height)
            .unwrap_or(crate::constants::NODE_HEIGHT)
    }
}

/// Represents a labeled, directional edge between two concepts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptEdge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// ID of the source node
    pub source: NodeId,
    /// ID of the target node
    pub target: NodeId,
    /// Relation label shown at the midpoint of the edge
    pub label: String,
    /// Attachment point identifier on the source node, if any
    #[serde(default)]
    pub source_handle: Option<String>,
    /// Attachment point identifier on the target node, if any
    #[serde(default)]
    pub target_handle: Option<String>,
    /// Line color as RGB; a default is chosen at render time when absent
    #[serde(default)]
    pub color: Option<[u8; 3]>,
    /// Solid or dashed rendering
    #[serde(default)]
    pub line_style: LineStyle,
    /// Marker tag drawn at the source end, if any
    #[serde(default)]
    pub start_marker: Option<String>,
    /// Marker tag drawn at the target end, if any
    #[serde(default)]
    pub end_marker: Option<String>,
}

impl ConceptEdge {
    /// Creates a new solid, unstyled edge between two nodes.
    ///
    /// # Arguments
    ///
    /// * `source` - The ID of the source node
    /// * `target` - The ID of the target node
    /// * `label` - The relation label
    pub fn new(source: NodeId, target: NodeId, label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            target,
            label: label.into(),
            source_handle: None,
            target_handle: None,
            color: None,
            line_style: LineStyle::Solid,
            start_marker: None,
            end_marker: None,
        }
    }
}

/// The graph value of a map: all nodes and edges, indexed by id.
///
/// `MapData` is the unit of staging, committing, undo snapshots, and
/// persistence. It carries no editor state of its own.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MapData {
    /// Map of all nodes, indexed by their ID
    pub nodes: HashMap<NodeId, ConceptNode>,
    /// Map of all edges, indexed by their ID
    pub edges: HashMap<EdgeId, ConceptEdge>,
}

impl MapData {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the graph holds no nodes and no edges.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Serialize the graph to a pretty JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize a graph from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Checks referential integrity of the graph, optionally allowing
    /// references into a second graph (used when validating a staged buffer
    /// against the committed map it will merge into).
    ///
    /// # Arguments
    ///
    /// * `base` - An additional graph whose nodes count as resolvable targets
    ///
    /// # Returns
    ///
    /// A list of human-readable problems; empty when the graph is consistent.
    pub fn integrity_against(&self, base: Option<&MapData>) -> Vec<String> {
        let mut problems = Vec::new();
        let resolves = |id: &NodeId| {
            self.nodes.contains_key(id) || base.is_some_and(|b| b.nodes.contains_key(id))
        };

        for edge in self.edges.values() {
            if !resolves(&edge.source) {
                problems.push(format!(
                    "edge '{}' has a dangling source {}",
                    edge.label, edge.source
                ));
            }
            if !resolves(&edge.target) {
                problems.push(format!(
                    "edge '{}' has a dangling target {}",
                    edge.label, edge.target
                ));
            }
        }

        for node in self.nodes.values() {
            if let Some(parent) = node.parent {
                if !resolves(&parent) {
                    problems.push(format!(
                        "node '{}' references a missing parent {}",
                        node.label, parent
                    ));
                }
            }
            for child in &node.children {
                let agrees = self
                    .nodes
                    .get(child)
                    .or_else(|| base.and_then(|b| b.nodes.get(child)))
                    .is_some_and(|c| c.parent == Some(node.id));
                if !agrees {
                    problems.push(format!(
                        "node '{}' lists child {} that does not point back to it",
                        node.label, child
                    ));
                }
            }
        }

        problems
    }

    /// Checks referential integrity of this graph on its own.
    pub fn integrity(&self) -> Vec<String> {
        self.integrity_against(None)
    }
}

/// A named, owned concept map as stored by the persistence boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConceptMap {
    /// Unique identifier for this map
    pub id: MapId,
    /// User-displayable name of the map
    pub name: String,
    /// Owner of the map
    pub owner: UserId,
    /// The graph value
    pub data: MapData,
    /// Whether the map is visible to everyone
    pub is_public: bool,
    /// Classroom the map is shared with, if any
    #[serde(default)]
    pub shared_classroom: Option<ClassroomId>,
    /// Creation timestamp (ISO 8601 when serialized)
    pub created_at: DateTime<Utc>,
    /// Last-update timestamp (ISO 8601 when serialized)
    pub updated_at: DateTime<Utc>,
}

impl ConceptMap {
    /// Creates a new map record stamped with the current time.
    ///
    /// # Arguments
    ///
    /// * `name` - Display name for the map
    /// * `owner` - Owning user
    /// * `data` - The graph value
    /// * `is_public` - Public visibility flag
    /// * `shared_classroom` - Optional classroom share
    pub fn new(
        name: impl Into<String>,
        owner: UserId,
        data: MapData,
        is_public: bool,
        shared_classroom: Option<ClassroomId>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            owner,
            data,
            is_public,
            shared_classroom,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_creation() {
        let node = ConceptNode::new("Ownership", (100.0, 200.0), "concept");

        assert_eq!(node.label, "Ownership");
        assert_eq!(node.position, (100.0, 200.0));
        assert_eq!(node.kind, "concept");
        assert!(node.details.is_none());
        assert!(node.parent.is_none());
        assert!(node.children.is_empty());
        assert!(!node.highlighted);
        assert!(!node.id.is_nil());
    }

    #[test]
    fn test_node_size_falls_back_to_defaults() {
        let mut node = ConceptNode::new("A", (0.0, 0.0), "concept");
        assert_eq!(node.width(), crate::constants::NODE_WIDTH);
        assert_eq!(node.height(), crate::constants::NODE_HEIGHT);

        node.style = Some(NodeStyle {
            fill: None,
            shape: Some(NodeShape::Ellipse),
            width: Some(250.0),
            height: None,
        });
        assert_eq!(node.width(), 250.0);
        assert_eq!(node.height(), crate::constants::NODE_HEIGHT);
    }

    #[test]
    fn test_edge_creation() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let edge = ConceptEdge::new(a, b, "depends on");

        assert_eq!(edge.source, a);
        assert_eq!(edge.target, b);
        assert_eq!(edge.label, "depends on");
        assert_eq!(edge.line_style, LineStyle::Solid);
        assert!(edge.color.is_none());
    }

    #[test]
    fn test_map_data_default_is_empty() {
        let data = MapData::default();
        assert!(data.is_empty());
        assert!(data.integrity().is_empty());
    }

    #[test]
    fn test_integrity_flags_dangling_edge() {
        let mut data = MapData::new();
        let node = ConceptNode::new("A", (0.0, 0.0), "concept");
        let edge = ConceptEdge::new(node.id, Uuid::new_v4(), "relates to");
        data.nodes.insert(node.id, node);
        data.edges.insert(edge.id, edge);

        let problems = data.integrity();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("dangling target"));
    }

    #[test]
    fn test_integrity_flags_missing_parent() {
        let mut data = MapData::new();
        let mut node = ConceptNode::new("A", (0.0, 0.0), "concept");
        node.parent = Some(Uuid::new_v4());
        data.nodes.insert(node.id, node);

        let problems = data.integrity();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("missing parent"));
    }

    #[test]
    fn test_integrity_flags_disagreeing_children() {
        let mut data = MapData::new();
        let child = ConceptNode::new("Child", (0.0, 0.0), "concept");
        let mut parent = ConceptNode::new("Parent", (0.0, 0.0), "concept");
        parent.children.push(child.id);
        // child.parent deliberately left unset
        data.nodes.insert(child.id, child);
        data.nodes.insert(parent.id, parent);

        let problems = data.integrity();
        assert_eq!(problems.len(), 1);
        assert!(problems[0].contains("does not point back"));
    }

    #[test]
    fn test_integrity_against_resolves_into_base() {
        let mut base = MapData::new();
        let committed = ConceptNode::new("Committed", (0.0, 0.0), "concept");
        let committed_id = committed.id;
        base.nodes.insert(committed_id, committed);

        let mut staged = MapData::new();
        let fresh = ConceptNode::new("Fresh", (10.0, 10.0), "concept");
        let edge = ConceptEdge::new(committed_id, fresh.id, "explains");
        staged.nodes.insert(fresh.id, fresh);
        staged.edges.insert(edge.id, edge);

        // Standalone, the staged edge's source is dangling; against the base
        // graph it resolves.
        assert_eq!(staged.integrity().len(), 1);
        assert!(staged.integrity_against(Some(&base)).is_empty());
    }

    #[test]
    fn test_map_data_roundtrip_serialization() {
        let mut data = MapData::new();
        let a = ConceptNode::new("Borrowing", (0.0, 0.0), "concept");
        let b = ConceptNode::new("Lifetimes", (200.0, 100.0), "concept");
        let edge = ConceptEdge::new(a.id, b.id, "requires");
        let (a_id, b_id, e_id) = (a.id, b.id, edge.id);
        data.nodes.insert(a.id, a);
        data.nodes.insert(b.id, b);
        data.edges.insert(edge.id, edge);

        let json = data.to_json().unwrap();
        let restored = MapData::from_json(&json).unwrap();

        assert_eq!(restored.nodes.len(), 2);
        assert_eq!(restored.edges.len(), 1);
        assert_eq!(restored.edges[&e_id].source, a_id);
        assert_eq!(restored.edges[&e_id].target, b_id);
        assert_eq!(restored, data);
    }

    #[test]
    fn test_concept_map_timestamps_serialize_as_dates() {
        let map = ConceptMap::new("Rust basics", Uuid::new_v4(), MapData::new(), false, None);
        assert_eq!(map.created_at, map.updated_at);

        let json = serde_json::to_string(&map).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let created = value["created_at"].as_str().unwrap();
        assert!(created.parse::<DateTime<Utc>>().is_ok());

        let restored: ConceptMap = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.created_at, map.created_at);
    }

    #[test]
    fn test_edge_optional_fields_default_on_deserialize() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let json = format!(
            r#"{{"id":"{}","source":"{}","target":"{}","label":"uses"}}"#,
            Uuid::new_v4(),
            a,
            b
        );
        let edge: ConceptEdge = serde_json::from_str(&json).unwrap();
        assert_eq!(edge.line_style, LineStyle::Solid);
        assert!(edge.source_handle.is_none());
        assert!(edge.start_marker.is_none());
    }
}
