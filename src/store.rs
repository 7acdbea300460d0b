//! The graph state store: the single authoritative container for the active
//! map and its editing buffers.
//!
//! All mutation of a map flows through the operation set defined here. The
//! store owns four things besides the committed map: the staging buffer that
//! AI flows propose changes into, the ghost-preview buffer that layout
//! suggestions wait in, the undo/redo snapshot history, and a bounded debug
//! log of committed mutations.

use crate::constants::{DEBUG_LOG_CAP, MAX_UNDO_HISTORY};
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// Proposed node positions held by the ghost-preview buffer.
pub type GhostPositions = HashMap<NodeId, (f32, f32)>;

/// Errors surfaced by store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The input failed validation; nothing was mutated.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The staged buffer violates map invariants; it was discarded and the
    /// committed map left untouched.
    #[error("staged data violates map invariants: {0}")]
    InvariantViolation(String),
}

/// A partial update to a node, applied by [`GraphStore::update_node`].
///
/// Outer `None` means "leave unchanged"; for the fields that are themselves
/// optional on the node, the inner value is the replacement (so
/// `details: Some(None)` clears the details).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodePatch {
    /// New label
    pub label: Option<String>,
    /// New details (or `Some(None)` to clear them)
    pub details: Option<Option<String>>,
    /// New kind tag
    pub kind: Option<String>,
    /// New canvas position
    pub position: Option<(f32, f32)>,
    /// New style overrides (or `Some(None)` to clear them)
    pub style: Option<Option<NodeStyle>>,
    /// New highlight flag
    pub highlighted: Option<bool>,
}

impl NodePatch {
    fn apply(&self, node: &mut ConceptNode) {
        if let Some(label) = &self.label {
            node.label = label.clone();
        }
        if let Some(details) = &self.details {
            node.details = details.clone();
        }
        if let Some(kind) = &self.kind {
            node.kind = kind.clone();
        }
        if let Some(position) = self.position {
            node.position = position;
        }
        if let Some(style) = &self.style {
            node.style = style.clone();
        }
        if let Some(highlighted) = self.highlighted {
            node.highlighted = highlighted;
        }
    }
}

/// A partial update to an edge, applied by [`GraphStore::update_edge`].
///
/// Same convention as [`NodePatch`]: outer `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgePatch {
    /// New relation label
    pub label: Option<String>,
    /// New line color (or `Some(None)` to clear it)
    pub color: Option<Option<[u8; 3]>>,
    /// New line style
    pub line_style: Option<LineStyle>,
}

impl EdgePatch {
    fn apply(&self, edge: &mut ConceptEdge) {
        if let Some(label) = &self.label {
            edge.label = label.clone();
        }
        if let Some(color) = self.color {
            edge.color = color;
        }
        if let Some(line_style) = self.line_style {
            edge.line_style = line_style;
        }
    }
}

/// One structured record in the store's diagnostics log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugEntry {
    /// Name of the operation that mutated the map
    pub op: &'static str,
    /// Short human-readable description of what changed
    pub detail: String,
}

/// Bounded ring of [`DebugEntry`] records; oldest entries are dropped once
/// the cap is reached. Inspectable, with no effect on map semantics.
#[derive(Debug, Default)]
pub struct DebugLog {
    entries: VecDeque<DebugEntry>,
}

impl DebugLog {
    fn push(&mut self, op: &'static str, detail: String) {
        self.entries.push_back(DebugEntry { op, detail });
        while self.entries.len() > DEBUG_LOG_CAP {
            self.entries.pop_front();
        }
    }

    /// All retained entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &DebugEntry> {
        self.entries.iter()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are retained.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Manages undo/redo history as bounded stacks of whole-map snapshots.
///
/// Snapshots are taken immediately before each committing mutation; undo
/// swaps the current map with the top snapshot, so repeated undo/redo
/// round-trips restore states exactly.
#[derive(Debug, Default)]
pub struct UndoHistory {
    undo_stack: Vec<MapData>,
    redo_stack: Vec<MapData>,
}

impl UndoHistory {
    /// Creates a new empty undo history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the pre-mutation state of the map.
    ///
    /// This clears the redo stack since a new mutation invalidates any
    /// previously undone states, and drops the oldest snapshot past the cap.
    fn record(&mut self, snapshot: MapData) {
        self.undo_stack.push(snapshot);
        self.redo_stack.clear();
        if self.undo_stack.len() > MAX_UNDO_HISTORY {
            self.undo_stack.remove(0);
        }
    }

    /// Returns true if there are states that can be restored by undo.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Returns true if there are states that can be restored by redo.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Clears all undo and redo history.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

/// Single authoritative container for the active map, selection-independent
/// editing buffers, and history.
///
/// The committed map serializes with the application state; the staging
/// buffer, ghost preview, history, and debug log are transient by design.
#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GraphStore {
    /// The committed map
    map: MapData,
    /// Staged AI-proposed additions, if a staging cycle is active
    #[serde(skip)]
    staged: Option<MapData>,
    /// Proposed layout positions awaiting accept/cancel, if any
    #[serde(skip)]
    ghost: Option<GhostPositions>,
    /// Undo/redo snapshot history
    #[serde(skip)]
    history: UndoHistory,
    /// Bounded diagnostics log of committed mutations
    #[serde(skip)]
    debug_log: DebugLog,
}

impl GraphStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read access to the committed map.
    pub fn map(&self) -> &MapData {
        &self.map
    }

    /// Read access to the staging buffer, if a staging cycle is active.
    pub fn staged(&self) -> Option<&MapData> {
        self.staged.as_ref()
    }

    /// True while a staging cycle is active (at least one staged node or edge).
    pub fn is_staged(&self) -> bool {
        self.staged.is_some()
    }

    /// Read access to the ghost-preview positions, if a preview is active.
    pub fn ghost_preview(&self) -> Option<&GhostPositions> {
        self.ghost.as_ref()
    }

    /// Read access to the diagnostics log.
    pub fn debug_log(&self) -> &DebugLog {
        &self.debug_log
    }

    /// True if undo has a state to restore.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// True if redo has a state to restore.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Replaces the committed map wholesale (file load, sample maps),
    /// clearing every transient buffer and the history.
    pub fn load_map(&mut self, data: MapData) {
        self.map = data;
        self.staged = None;
        self.ghost = None;
        self.history.clear();
        self.debug_log.push(
            "load_map",
            format!("{} nodes, {} edges", self.map.nodes.len(), self.map.edges.len()),
        );
    }

    /// Adds a node to the committed map.
    ///
    /// A node whose `parent` does not exist in the map is rejected. A node
    /// reusing an existing id overwrites that node (last writer wins). On
    /// success the node is linked into its parent's `children`.
    ///
    /// # Returns
    ///
    /// The id of the added node.
    pub fn add_node(&mut self, node: ConceptNode) -> Result<NodeId, StoreError> {
        if let Some(parent) = node.parent {
            if !self.map.nodes.contains_key(&parent) {
                return Err(StoreError::Validation(format!(
                    "parent node {parent} does not exist"
                )));
            }
        }

        let snapshot = self.map.clone();
        let id = node.id;
        let label = node.label.clone();
        let parent = node.parent;
        self.map.nodes.insert(id, node);
        if let Some(parent) = parent {
            if let Some(parent_node) = self.map.nodes.get_mut(&parent) {
                if !parent_node.children.contains(&id) {
                    parent_node.children.push(id);
                }
            }
        }
        self.finish_mutation(snapshot, "add_node", format!("'{label}' ({id})"));
        Ok(id)
    }

    /// Applies a partial update to a node.
    ///
    /// Unknown ids are a silent no-op, as are patches that change nothing.
    ///
    /// # Returns
    ///
    /// True if the node existed and the patch changed it.
    pub fn update_node(&mut self, id: NodeId, patch: &NodePatch) -> bool {
        let Some(existing) = self.map.nodes.get(&id) else {
            return false;
        };
        let mut updated = existing.clone();
        patch.apply(&mut updated);
        if updated == *existing {
            return false;
        }

        let snapshot = self.map.clone();
        let label = updated.label.clone();
        self.map.nodes.insert(id, updated);
        self.finish_mutation(snapshot, "update_node", format!("'{label}' ({id})"));
        true
    }

    /// Deletes a node from the committed map.
    ///
    /// Deleting cascades to every edge referencing the node, detaches it from
    /// its parent's `children`, and clears `parent` on its own children.
    /// Idempotent: deleting an unknown id changes nothing.
    ///
    /// # Returns
    ///
    /// True if the node existed and was removed.
    pub fn delete_node(&mut self, id: NodeId) -> bool {
        if !self.map.nodes.contains_key(&id) {
            return false;
        }

        let snapshot = self.map.clone();
        let removed = self.map.nodes.remove(&id).expect("presence checked above");

        // Cascade: edges referencing the node
        self.map
            .edges
            .retain(|_, e| e.source != id && e.target != id);

        // Detach from the parent's child list
        if let Some(parent) = removed.parent {
            if let Some(parent_node) = self.map.nodes.get_mut(&parent) {
                parent_node.children.retain(|c| *c != id);
            }
        }

        // Orphan the node's own children
        for child in &removed.children {
            if let Some(child_node) = self.map.nodes.get_mut(child) {
                if child_node.parent == Some(id) {
                    child_node.parent = None;
                }
            }
        }

        self.finish_mutation(snapshot, "delete_node", format!("'{}' ({id})", removed.label));
        true
    }

    /// Adds an edge to the committed map.
    ///
    /// Rejected when either endpoint is absent from the map; the map is left
    /// unchanged in that case.
    ///
    /// # Returns
    ///
    /// The id of the added edge.
    pub fn add_edge(&mut self, edge: ConceptEdge) -> Result<EdgeId, StoreError> {
        if !self.map.nodes.contains_key(&edge.source) {
            return Err(StoreError::Validation(format!(
                "edge source {} does not exist",
                edge.source
            )));
        }
        if !self.map.nodes.contains_key(&edge.target) {
            return Err(StoreError::Validation(format!(
                "edge target {} does not exist",
                edge.target
            )));
        }

        let snapshot = self.map.clone();
        let id = edge.id;
        let label = edge.label.clone();
        self.map.edges.insert(id, edge);
        self.finish_mutation(snapshot, "add_edge", format!("'{label}' ({id})"));
        Ok(id)
    }

    /// Applies a partial update to an edge.
    ///
    /// Unknown ids are a silent no-op, as are patches that change nothing.
    ///
    /// # Returns
    ///
    /// True if the edge existed and the patch changed it.
    pub fn update_edge(&mut self, id: EdgeId, patch: &EdgePatch) -> bool {
        let Some(existing) = self.map.edges.get(&id) else {
            return false;
        };
        let mut updated = existing.clone();
        patch.apply(&mut updated);
        if updated == *existing {
            return false;
        }

        let snapshot = self.map.clone();
        let label = updated.label.clone();
        self.map.edges.insert(id, updated);
        self.finish_mutation(snapshot, "update_edge", format!("'{label}' ({id})"));
        true
    }

    /// Deletes an edge from the committed map. Unknown ids are a no-op.
    ///
    /// # Returns
    ///
    /// True if the edge existed and was removed.
    pub fn delete_edge(&mut self, id: EdgeId) -> bool {
        if !self.map.edges.contains_key(&id) {
            return false;
        }
        let snapshot = self.map.clone();
        let removed = self.map.edges.remove(&id).expect("presence checked above");
        self.finish_mutation(snapshot, "delete_edge", format!("'{}' ({id})", removed.label));
        true
    }

    /// Moves a set of nodes to new positions as a single undoable mutation.
    ///
    /// Used when a drag gesture ends. Unknown ids and unchanged positions are
    /// ignored; if nothing actually moves, no history entry is created.
    ///
    /// # Returns
    ///
    /// True if at least one node moved.
    pub fn move_nodes(&mut self, positions: &[(NodeId, (f32, f32))]) -> bool {
        let moved: Vec<(NodeId, (f32, f32))> = positions
            .iter()
            .copied()
            .filter(|(id, pos)| {
                self.map
                    .nodes
                    .get(id)
                    .is_some_and(|n| n.position != *pos)
            })
            .collect();
        if moved.is_empty() {
            return false;
        }

        let snapshot = self.map.clone();
        let count = moved.len();
        for (id, pos) in moved {
            if let Some(node) = self.map.nodes.get_mut(&id) {
                node.position = pos;
            }
        }
        self.finish_mutation(snapshot, "move_nodes", format!("{count} nodes moved"));
        true
    }

    /// Replaces the staging buffer wholesale with an AI-proposed candidate
    /// set. A later call replaces (never merges with) the prior buffer; an
    /// empty candidate set clears it.
    pub fn set_staged_map_data(&mut self, data: MapData) {
        if data.is_empty() {
            self.staged = None;
        } else {
            self.staged = Some(data);
        }
    }

    /// Discards the staging buffer without touching the committed map or the
    /// history.
    pub fn clear_staged_map_data(&mut self) {
        self.staged = None;
    }

    /// Atomically merges the staging buffer into the committed map.
    ///
    /// The buffer is first validated against the committed map: every staged
    /// edge endpoint and staged parent reference must resolve in the union of
    /// staged and committed nodes. On violation the buffer is discarded, the
    /// committed map is left untouched, and an error is returned. On success
    /// staged nodes and edges merge id-wise (last writer wins), one undo
    /// entry is pushed, and the buffer empties. Committing with an empty
    /// buffer is a no-op.
    pub fn commit_staged_map_data(&mut self) -> Result<(), StoreError> {
        let Some(staged) = self.staged.take() else {
            return Ok(());
        };

        let problems = staged.integrity_against(Some(&self.map));
        if !problems.is_empty() {
            let detail = problems.join("; ");
            self.debug_log.push("commit_staged", format!("rejected: {detail}"));
            return Err(StoreError::InvariantViolation(detail));
        }

        let snapshot = self.map.clone();
        let staged_node_ids: Vec<NodeId> = staged.nodes.keys().copied().collect();
        let node_count = staged.nodes.len();
        let edge_count = staged.edges.len();

        self.map.nodes.extend(staged.nodes);
        self.map.edges.extend(staged.edges);

        // Keep parent/child links mutually consistent for merged nodes.
        for id in staged_node_ids {
            let parent = self.map.nodes.get(&id).and_then(|n| n.parent);
            if let Some(parent) = parent {
                if let Some(parent_node) = self.map.nodes.get_mut(&parent) {
                    if !parent_node.children.contains(&id) {
                        parent_node.children.push(id);
                    }
                }
            }
        }

        self.finish_mutation(
            snapshot,
            "commit_staged",
            format!("{node_count} nodes, {edge_count} edges"),
        );
        Ok(())
    }

    /// Replaces the ghost-preview buffer with a new set of proposed
    /// positions. A later call replaces the prior preview without applying
    /// it; an empty proposal clears the preview.
    pub fn set_ghost_preview(&mut self, positions: GhostPositions) {
        if positions.is_empty() {
            self.ghost = None;
        } else {
            self.ghost = Some(positions);
        }
    }

    /// Applies the previewed positions to matching committed nodes as a
    /// single undoable mutation. Ids with no committed counterpart are
    /// ignored; the preview is cleared either way.
    ///
    /// # Returns
    ///
    /// True if at least one node moved.
    pub fn accept_ghost_preview(&mut self) -> bool {
        let Some(positions) = self.ghost.take() else {
            return false;
        };

        let moved: Vec<(NodeId, (f32, f32))> = positions
            .into_iter()
            .filter(|(id, pos)| {
                self.map
                    .nodes
                    .get(id)
                    .is_some_and(|n| n.position != *pos)
            })
            .collect();
        if moved.is_empty() {
            return false;
        }

        let snapshot = self.map.clone();
        let count = moved.len();
        for (id, pos) in moved {
            if let Some(node) = self.map.nodes.get_mut(&id) {
                node.position = pos;
            }
        }
        self.finish_mutation(snapshot, "accept_ghost_preview", format!("{count} nodes moved"));
        true
    }

    /// Discards the ghost preview with no mutation.
    pub fn cancel_ghost_preview(&mut self) {
        self.ghost = None;
    }

    /// Restores the previous committed state. A no-op at the history
    /// boundary.
    ///
    /// # Returns
    ///
    /// True if a state was restored.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.history.undo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.map, previous);
        self.history.redo_stack.push(current);
        true
    }

    /// Re-applies the most recently undone state. A no-op at the history
    /// boundary.
    ///
    /// # Returns
    ///
    /// True if a state was restored.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.history.redo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.map, next);
        self.history.undo_stack.push(current);
        true
    }

    /// Shared tail of every committing mutation: push the pre-mutation
    /// snapshot and append a diagnostics entry.
    fn finish_mutation(&mut self, snapshot: MapData, op: &'static str, detail: String) {
        self.history.record(snapshot);
        self.debug_log.push(op, detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn store_with_two_nodes() -> (GraphStore, NodeId, NodeId) {
        let mut store = GraphStore::new();
        let a = store
            .add_node(ConceptNode::new("A", (0.0, 0.0), "concept"))
            .unwrap();
        let b = store
            .add_node(ConceptNode::new("B", (100.0, 0.0), "concept"))
            .unwrap();
        (store, a, b)
    }

    #[test]
    fn test_add_node_and_edge() {
        let (mut store, a, b) = store_with_two_nodes();
        let edge_id = store.add_edge(ConceptEdge::new(a, b, "relates to")).unwrap();

        assert_eq!(store.map().nodes.len(), 2);
        assert_eq!(store.map().edges.len(), 1);
        assert_eq!(store.map().edges[&edge_id].source, a);
    }

    #[test]
    fn test_add_edge_with_dangling_reference_is_rejected() {
        let (mut store, a, _) = store_with_two_nodes();
        let missing = Uuid::new_v4();
        let before = store.map().clone();

        let result = store.add_edge(ConceptEdge::new(a, missing, "broken"));

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(*store.map(), before);
    }

    #[test]
    fn test_add_node_with_missing_parent_is_rejected() {
        let mut store = GraphStore::new();
        let mut node = ConceptNode::new("Orphan", (0.0, 0.0), "concept");
        node.parent = Some(Uuid::new_v4());

        let result = store.add_node(node);

        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert!(store.map().is_empty());
    }

    #[test]
    fn test_add_node_links_into_parent_children() {
        let mut store = GraphStore::new();
        let parent = store
            .add_node(ConceptNode::new("Parent", (0.0, 0.0), "module"))
            .unwrap();
        let mut child = ConceptNode::new("Child", (50.0, 50.0), "concept");
        child.parent = Some(parent);
        let child_id = store.add_node(child).unwrap();

        assert!(store.map().nodes[&parent].children.contains(&child_id));
        assert!(store.map().integrity().is_empty());
    }

    #[test]
    fn test_delete_node_cascades_edges() {
        let (mut store, a, b) = store_with_two_nodes();
        let c = store
            .add_node(ConceptNode::new("C", (200.0, 0.0), "concept"))
            .unwrap();
        store.add_edge(ConceptEdge::new(a, b, "e1")).unwrap();
        store.add_edge(ConceptEdge::new(b, c, "e2")).unwrap();
        store.add_edge(ConceptEdge::new(a, c, "e3")).unwrap();

        assert!(store.delete_node(b));

        assert_eq!(store.map().nodes.len(), 2);
        assert_eq!(store.map().edges.len(), 1);
        assert!(store
            .map()
            .edges
            .values()
            .all(|e| e.source != b && e.target != b));
    }

    #[test]
    fn test_delete_node_detaches_parent_and_children() {
        let mut store = GraphStore::new();
        let parent = store
            .add_node(ConceptNode::new("Parent", (0.0, 0.0), "module"))
            .unwrap();
        let mut mid = ConceptNode::new("Mid", (10.0, 0.0), "concept");
        mid.parent = Some(parent);
        let mid_id = store.add_node(mid).unwrap();
        let mut leaf = ConceptNode::new("Leaf", (20.0, 0.0), "concept");
        leaf.parent = Some(mid_id);
        let leaf_id = store.add_node(leaf).unwrap();

        assert!(store.delete_node(mid_id));

        assert!(!store.map().nodes[&parent].children.contains(&mid_id));
        assert_eq!(store.map().nodes[&leaf_id].parent, None);
        assert!(store.map().integrity().is_empty());
    }

    #[test]
    fn test_delete_node_is_idempotent() {
        let (mut store, a, b) = store_with_two_nodes();
        store.add_edge(ConceptEdge::new(a, b, "e")).unwrap();

        assert!(store.delete_node(a));
        let after_first = store.map().clone();
        assert!(!store.delete_node(a));

        assert_eq!(*store.map(), after_first);
    }

    #[test]
    fn test_update_node_applies_only_set_fields() {
        let (mut store, a, _) = store_with_two_nodes();
        let patch = NodePatch {
            label: Some("Renamed".to_string()),
            details: Some(Some("extra context".to_string())),
            highlighted: Some(true),
            ..Default::default()
        };

        assert!(store.update_node(a, &patch));

        let node = &store.map().nodes[&a];
        assert_eq!(node.label, "Renamed");
        assert_eq!(node.details.as_deref(), Some("extra context"));
        assert!(node.highlighted);
        assert_eq!(node.kind, "concept");
        assert_eq!(node.position, (0.0, 0.0));
    }

    #[test]
    fn test_update_edge_changes_label_and_style() {
        let (mut store, a, b) = store_with_two_nodes();
        let edge_id = store.add_edge(ConceptEdge::new(a, b, "old")).unwrap();

        let patch = EdgePatch {
            label: Some("renamed".to_string()),
            line_style: Some(LineStyle::Dashed),
            ..Default::default()
        };
        assert!(store.update_edge(edge_id, &patch));

        let edge = &store.map().edges[&edge_id];
        assert_eq!(edge.label, "renamed");
        assert_eq!(edge.line_style, LineStyle::Dashed);

        // A no-change patch is a no-op
        assert!(!store.update_edge(edge_id, &patch));
        // Unknown ids are a no-op
        assert!(!store.update_edge(Uuid::new_v4(), &patch));
    }

    #[test]
    fn test_update_unknown_node_is_silent_noop() {
        let (mut store, _, _) = store_with_two_nodes();
        let before = store.map().clone();
        let patch = NodePatch {
            label: Some("ghost".to_string()),
            ..Default::default()
        };

        assert!(!store.update_node(Uuid::new_v4(), &patch));
        assert_eq!(*store.map(), before);
    }

    #[test]
    fn test_no_change_patch_creates_no_history() {
        let (mut store, a, _) = store_with_two_nodes();
        let patch = NodePatch {
            label: Some("A".to_string()),
            ..Default::default()
        };

        assert!(!store.update_node(a, &patch));

        // Only the two add_node calls should be undoable.
        let mut undone = 0;
        while store.undo() {
            undone += 1;
        }
        assert_eq!(undone, 2);
    }

    #[test]
    fn test_move_nodes_is_one_undo_entry() {
        let (mut store, a, b) = store_with_two_nodes();
        let before = store.map().clone();

        assert!(store.move_nodes(&[(a, (10.0, 10.0)), (b, (20.0, 20.0))]));
        assert_eq!(store.map().nodes[&a].position, (10.0, 10.0));

        assert!(store.undo());
        assert_eq!(*store.map(), before);
    }

    #[test]
    fn test_move_nodes_with_no_effective_change_is_noop() {
        let (mut store, a, _) = store_with_two_nodes();
        let history_len = store.debug_log().len();

        assert!(!store.move_nodes(&[(a, (0.0, 0.0)), (Uuid::new_v4(), (5.0, 5.0))]));
        assert_eq!(store.debug_log().len(), history_len);
    }

    #[test]
    fn test_staging_replacement_last_proposal_wins() {
        let (mut store, a, b) = store_with_two_nodes();

        let mut first = MapData::new();
        let n1 = ConceptNode::new("From A", (10.0, 10.0), "suggestion");
        first.nodes.insert(n1.id, n1.clone());
        store.set_staged_map_data(first);

        let mut second = MapData::new();
        let n2 = ConceptNode::new("From B", (20.0, 20.0), "suggestion");
        let e2 = ConceptEdge::new(a, b, "suggested");
        second.nodes.insert(n2.id, n2.clone());
        second.edges.insert(e2.id, e2);
        store.set_staged_map_data(second);

        store.commit_staged_map_data().unwrap();

        assert!(!store.map().nodes.contains_key(&n1.id));
        assert!(store.map().nodes.contains_key(&n2.id));
        assert_eq!(store.map().edges.len(), 1);
        assert!(!store.is_staged());
    }

    #[test]
    fn test_clear_after_commit_is_noop_on_committed_data() {
        let (mut store, _, _) = store_with_two_nodes();
        let mut staged = MapData::new();
        let n = ConceptNode::new("Staged", (0.0, 0.0), "suggestion");
        staged.nodes.insert(n.id, n);
        store.set_staged_map_data(staged);

        store.commit_staged_map_data().unwrap();
        let committed = store.map().clone();
        store.clear_staged_map_data();

        assert!(!store.is_staged());
        assert_eq!(*store.map(), committed);
    }

    #[test]
    fn test_commit_overwrites_colliding_ids() {
        let (mut store, a, _) = store_with_two_nodes();

        let mut staged = MapData::new();
        let mut replacement = ConceptNode::new("A rewritten", (5.0, 5.0), "concept");
        replacement.id = a;
        staged.nodes.insert(a, replacement);
        store.set_staged_map_data(staged);

        store.commit_staged_map_data().unwrap();

        assert_eq!(store.map().nodes.len(), 2);
        assert_eq!(store.map().nodes[&a].label, "A rewritten");
    }

    #[test]
    fn test_commit_with_corrupt_staged_data_discards_buffer() {
        let (mut store, a, _) = store_with_two_nodes();
        let before = store.map().clone();

        let mut staged = MapData::new();
        let broken = ConceptEdge::new(a, Uuid::new_v4(), "dangling");
        staged.edges.insert(broken.id, broken);
        store.set_staged_map_data(staged);

        let result = store.commit_staged_map_data();

        assert!(matches!(result, Err(StoreError::InvariantViolation(_))));
        assert_eq!(*store.map(), before);
        assert!(!store.is_staged());
    }

    #[test]
    fn test_commit_empty_buffer_is_noop() {
        let (mut store, _, _) = store_with_two_nodes();
        let before = store.map().clone();
        let could_undo = store.can_undo();

        store.commit_staged_map_data().unwrap();

        assert_eq!(*store.map(), before);
        assert_eq!(store.can_undo(), could_undo);
    }

    #[test]
    fn test_staged_edges_may_reference_committed_nodes() {
        let (mut store, a, b) = store_with_two_nodes();
        let mut staged = MapData::new();
        let edge = ConceptEdge::new(a, b, "suggested relation");
        staged.edges.insert(edge.id, edge);
        store.set_staged_map_data(staged);

        store.commit_staged_map_data().unwrap();
        assert_eq!(store.map().edges.len(), 1);
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut store = GraphStore::new();
        let states = {
            let mut states = vec![store.map().clone()];
            let a = store
                .add_node(ConceptNode::new("A", (0.0, 0.0), "concept"))
                .unwrap();
            states.push(store.map().clone());
            let b = store
                .add_node(ConceptNode::new("B", (50.0, 0.0), "concept"))
                .unwrap();
            states.push(store.map().clone());
            store.add_edge(ConceptEdge::new(a, b, "e")).unwrap();
            states.push(store.map().clone());
            store.delete_node(a);
            states.push(store.map().clone());
            states
        };

        // Walk all the way back, checking each restored state
        for expected in states.iter().rev().skip(1) {
            assert!(store.undo());
            assert_eq!(store.map(), expected);
        }
        assert!(!store.undo());

        // And all the way forward again
        for expected in states.iter().skip(1) {
            assert!(store.redo());
            assert_eq!(store.map(), expected);
        }
        assert!(!store.redo());
    }

    #[test]
    fn test_new_mutation_invalidates_redo() {
        let mut store = GraphStore::new();
        store
            .add_node(ConceptNode::new("A", (0.0, 0.0), "concept"))
            .unwrap();
        store
            .add_node(ConceptNode::new("B", (10.0, 0.0), "concept"))
            .unwrap();

        assert!(store.undo());
        assert!(store.can_redo());

        store
            .add_node(ConceptNode::new("C", (20.0, 0.0), "concept"))
            .unwrap();
        assert!(!store.can_redo());
    }

    #[test]
    fn test_staging_does_not_create_history() {
        let (mut store, _, _) = store_with_two_nodes();
        let could_undo_depth = {
            // two add_node calls were recorded
            assert!(store.can_undo());
            2
        };

        let mut staged = MapData::new();
        let n = ConceptNode::new("Staged", (0.0, 0.0), "suggestion");
        staged.nodes.insert(n.id, n);
        store.set_staged_map_data(staged);
        store.clear_staged_map_data();

        let mut undone = 0;
        while store.undo() {
            undone += 1;
        }
        assert_eq!(undone, could_undo_depth);
    }

    #[test]
    fn test_ghost_preview_replacement_applies_only_second() {
        let (mut store, a, b) = store_with_two_nodes();

        let first: GhostPositions = [(a, (500.0, 500.0))].into_iter().collect();
        store.set_ghost_preview(first);

        let second: GhostPositions = [(b, (300.0, 300.0))].into_iter().collect();
        store.set_ghost_preview(second);

        assert!(store.accept_ghost_preview());

        assert_eq!(store.map().nodes[&a].position, (0.0, 0.0));
        assert_eq!(store.map().nodes[&b].position, (300.0, 300.0));
        assert!(store.ghost_preview().is_none());
    }

    #[test]
    fn test_ghost_preview_ignores_unmatched_ids() {
        let (mut store, a, _) = store_with_two_nodes();
        let positions: GhostPositions = [
            (a, (42.0, 42.0)),
            (Uuid::new_v4(), (1000.0, 1000.0)),
        ]
        .into_iter()
        .collect();
        store.set_ghost_preview(positions);

        assert!(store.accept_ghost_preview());
        assert_eq!(store.map().nodes[&a].position, (42.0, 42.0));
        assert_eq!(store.map().nodes.len(), 2);
    }

    #[test]
    fn test_ghost_preview_cancel_mutates_nothing() {
        let (mut store, a, _) = store_with_two_nodes();
        let before = store.map().clone();
        store.set_ghost_preview([(a, (999.0, 999.0))].into_iter().collect());

        store.cancel_ghost_preview();

        assert_eq!(*store.map(), before);
        assert!(store.ghost_preview().is_none());
    }

    #[test]
    fn test_ghost_preview_accept_is_one_undo_entry() {
        let (mut store, a, b) = store_with_two_nodes();
        let before = store.map().clone();
        store.set_ghost_preview(
            [(a, (111.0, 0.0)), (b, (222.0, 0.0))].into_iter().collect(),
        );
        assert!(store.accept_ghost_preview());

        assert!(store.undo());
        assert_eq!(*store.map(), before);
    }

    #[test]
    fn test_debug_log_records_commits_and_is_bounded() {
        let mut store = GraphStore::new();
        store
            .add_node(ConceptNode::new("A", (0.0, 0.0), "concept"))
            .unwrap();
        assert_eq!(store.debug_log().len(), 1);
        assert_eq!(store.debug_log().entries().next().unwrap().op, "add_node");

        for i in 0..(crate::constants::DEBUG_LOG_CAP + 10) {
            let patch = NodePatch {
                position: Some((i as f32, 0.0)),
                ..Default::default()
            };
            let id = *store.map().nodes.keys().next().unwrap();
            store.update_node(id, &patch);
        }
        assert_eq!(store.debug_log().len(), crate::constants::DEBUG_LOG_CAP);
    }

    #[test]
    fn test_undo_history_is_bounded() {
        let mut store = GraphStore::new();
        let id = store
            .add_node(ConceptNode::new("A", (0.0, 0.0), "concept"))
            .unwrap();
        for i in 0..(crate::constants::MAX_UNDO_HISTORY + 25) {
            let patch = NodePatch {
                position: Some((i as f32, 1.0)),
                ..Default::default()
            };
            store.update_node(id, &patch);
        }

        let mut undone = 0;
        while store.undo() {
            undone += 1;
        }
        assert_eq!(undone, crate::constants::MAX_UNDO_HISTORY);
    }
}
