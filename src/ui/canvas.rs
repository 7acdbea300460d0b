//! Canvas interaction and navigation functionality.
//!
//! This module handles canvas panning, zooming, node dragging, edge drawing,
//! and coordinate transformations between screen and world space. Committed
//! nodes are the only interactive elements; staged items and ghost outlines
//! are display-only until accepted.

use super::state::CodeMapApp;
use crate::types::*;
use eframe::egui;

impl CodeMapApp {
    /// Converts screen coordinates to world coordinates accounting for zoom and pan.
    pub fn screen_to_world(&self, screen_pos: egui::Pos2) -> egui::Pos2 {
        (screen_pos - self.canvas.offset) / self.canvas.zoom_factor
    }

    /// Converts world coordinates to screen coordinates accounting for zoom and pan.
    pub fn world_to_screen(&self, world_pos: egui::Pos2) -> egui::Pos2 {
        world_pos * self.canvas.zoom_factor + self.canvas.offset
    }

    /// Snaps a position to the nearest grid point.
    ///
    /// Useful for aligning nodes when shift-dragging.
    pub fn snap_to_grid(&self, pos: egui::Pos2) -> egui::Pos2 {
        let grid = crate::constants::GRID_SIZE;
        egui::pos2((pos.x / grid).round() * grid, (pos.y / grid).round() * grid)
    }

    /// The position a node should be rendered at: its live drag position when
    /// it is part of an active drag, its committed position otherwise.
    pub fn display_position(&self, node: &ConceptNode) -> (f32, f32) {
        self.interaction
            .drag_live_positions
            .get(&node.id)
            .copied()
            .unwrap_or(node.position)
    }

    /// Handles middle-click or Cmd/Ctrl+left-click canvas panning.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    /// * `response` - The response from the canvas widget
    pub fn handle_canvas_panning(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        // modifiers.command automatically uses Cmd on macOS and Ctrl elsewhere
        let should_pan = ui.input(|i| {
            i.pointer.middle_down() || (i.pointer.primary_down() && i.modifiers.command)
        });

        if should_pan {
            if let Some(current_pos) = response.interact_pointer_pos() {
                if !self.interaction.is_panning {
                    self.interaction.is_panning = true;
                    self.interaction.last_pan_pos = Some(current_pos);
                } else if let Some(last_pos) = self.interaction.last_pan_pos {
                    let delta = current_pos - last_pos;
                    self.canvas.offset += delta;
                    self.interaction.last_pan_pos = Some(current_pos);
                }
            }
        } else {
            self.interaction.is_panning = false;
            self.interaction.last_pan_pos = None;
        }
    }

    /// Handles scroll wheel zooming.
    ///
    /// Zooms in/out while keeping the mouse cursor position fixed in world
    /// space. Zoom range is clamped between 0.25x and 5.0x, and only applies
    /// while the cursor is over the canvas.
    pub fn handle_canvas_zoom(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        let scroll_delta = ui.input(|i| i.smooth_scroll_delta.y);

        if scroll_delta != 0.0 {
            let mouse_pos = ui
                .input(|i| i.pointer.hover_pos())
                .or_else(|| response.interact_pointer_pos());

            if let Some(mouse_pos) = mouse_pos {
                if !response.rect.contains(mouse_pos) {
                    return;
                }

                let world_pos_before_zoom = self.screen_to_world(mouse_pos);

                let zoom_delta = if scroll_delta > 0.0 { 0.025 } else { -0.025 };
                let old_zoom = self.canvas.zoom_factor;
                self.canvas.zoom_factor = (self.canvas.zoom_factor + zoom_delta).clamp(0.25, 5.0);

                if (self.canvas.zoom_factor - old_zoom).abs() > f32::EPSILON {
                    // Keep the world position under the cursor fixed
                    let world_pos_after_zoom = self.world_to_screen(world_pos_before_zoom);
                    let offset_adjustment = mouse_pos - world_pos_after_zoom;
                    self.canvas.offset += offset_adjustment;
                }
            }
        }
    }

    /// Handles node dragging with the left mouse button.
    ///
    /// Supports shift+drag for grid-snapped movement and shift+drag from a
    /// node to draw an edge. Positions only reach the store as one
    /// `move_nodes` operation when the drag ends, so a whole drag gesture is
    /// a single undo entry.
    ///
    /// # Arguments
    ///
    /// * `ui` - The egui UI context
    /// * `response` - The response from the canvas widget
    pub fn handle_node_dragging(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        // An active marquee takes priority over node drags and edge drawing
        if self.interaction.marquee_start.is_some() {
            return;
        }
        if ui.input(|i| i.pointer.primary_down()) && !self.interaction.is_panning {
            if let Some(current_pos) = response.interact_pointer_pos() {
                let world_pos = self.screen_to_world(current_pos);
                let shift_held = ui.input(|i| i.modifiers.shift);

                if self.interaction.dragging_node.is_none()
                    && self.interaction.drawing_edge_from.is_none()
                    && self.interaction.pending_shift_edge_from.is_none()
                {
                    if let Some(node_id) = self.find_node_at_position(world_pos) {
                        if shift_held {
                            // Defer the edge start until the drag threshold is
                            // exceeded; a plain shift-click toggles selection.
                            self.interaction.pending_shift_edge_from = Some(node_id);
                            self.interaction.pending_shift_start_screen_pos = Some(current_pos);
                        } else {
                            self.start_node_drag(node_id, world_pos);
                        }
                    }
                } else if let Some(dragging_id) = self.interaction.dragging_node {
                    self.update_dragged_positions(dragging_id, world_pos, ui);
                } else if self.interaction.drawing_edge_from.is_some() {
                    self.interaction.edge_draw_pos = Some(current_pos);
                } else if let (Some(from_id), Some(start_pos)) = (
                    self.interaction.pending_shift_edge_from,
                    self.interaction.pending_shift_start_screen_pos,
                ) {
                    let start_world = self.screen_to_world(start_pos);
                    let cur_world = self.screen_to_world(current_pos);
                    if (cur_world - start_world).length() >= crate::constants::CLICK_THRESHOLD {
                        self.interaction.drawing_edge_from = Some(from_id);
                        self.interaction.edge_draw_pos = Some(current_pos);
                        self.interaction.pending_shift_edge_from = None;
                        self.interaction.pending_shift_start_screen_pos = None;
                    }
                }
            }
        } else {
            // Mouse released - finalize an edge if one was being drawn
            if self.interaction.drawing_edge_from.is_some() {
                if let Some(current_pos) = response.interact_pointer_pos() {
                    let world_pos = self.screen_to_world(current_pos);
                    self.finalize_edge(world_pos);
                }
            }

            // A pending shift-click that never became an edge toggles selection
            if let Some(node_id) = self.interaction.pending_shift_edge_from.take() {
                if let Some(pos) = self
                    .interaction
                    .selected_nodes
                    .iter()
                    .position(|id| *id == node_id)
                {
                    self.interaction.selected_nodes.remove(pos);
                } else {
                    self.interaction.selected_nodes.push(node_id);
                }
                match self.interaction.selected_nodes.as_slice() {
                    [only] => self.interaction.selected_node = Some(*only),
                    _ => self.interaction.selected_node = None,
                }
                self.interaction.selected_edge = None;
                self.interaction.editing_node_label = None;
            }
            self.interaction.pending_shift_start_screen_pos = None;

            // Apply the finished drag to the store as one operation
            if self.interaction.dragging_node.is_some()
                && !self.interaction.drag_live_positions.is_empty()
            {
                let finals: Vec<(NodeId, (f32, f32))> = self
                    .interaction
                    .drag_live_positions
                    .iter()
                    .map(|(id, pos)| (*id, *pos))
                    .collect();
                if self.store.move_nodes(&finals) {
                    self.file.has_unsaved_changes = true;
                }
            }

            self.interaction.dragging_node = None;
            self.interaction.drag_original_position = None;
            self.interaction.drag_original_positions_multi.clear();
            self.interaction.drag_live_positions.clear();
            self.interaction.drawing_edge_from = None;
            self.interaction.edge_draw_pos = None;
        }
    }

    /// Starts dragging the specified node, selecting it if needed and
    /// seeding the live position buffer.
    fn start_node_drag(&mut self, node_id: NodeId, world_pos: egui::Pos2) {
        self.interaction.dragging_node = Some(node_id);

        if !self.interaction.selected_nodes.contains(&node_id) {
            self.interaction.selected_nodes.clear();
            self.interaction.selected_nodes.push(node_id);
            self.interaction.selected_node = Some(node_id);
            self.interaction.selected_edge = None;
            self.interaction.editing_node_label = None;
        }

        self.interaction.drag_original_positions_multi = self
            .interaction
            .selected_nodes
            .iter()
            .filter_map(|id| self.store.map().nodes.get(id).map(|n| (*id, n.position)))
            .collect();
        self.interaction.drag_live_positions = self
            .interaction
            .drag_original_positions_multi
            .iter()
            .copied()
            .collect();

        if let Some(node) = self.store.map().nodes.get(&node_id) {
            let node_center = egui::pos2(node.position.0, node.position.1);
            self.interaction.node_drag_offset = node_center - world_pos;
            self.interaction.drag_original_position = Some(node.position);
        }
    }

    /// Updates the live positions of the dragged node(s); with Shift held the
    /// anchor node snaps to the grid.
    fn update_dragged_positions(&mut self, node_id: NodeId, world_pos: egui::Pos2, ui: &egui::Ui) {
        let Some(original) = self.interaction.drag_original_position else {
            return;
        };

        let mut anchor_pos = world_pos + self.interaction.node_drag_offset;
        if ui.input(|i| i.modifiers.shift) {
            anchor_pos = self.snap_to_grid(anchor_pos);
        }
        let delta = (anchor_pos.x - original.0, anchor_pos.y - original.1);

        for (id, start) in self.interaction.drag_original_positions_multi.clone() {
            let live = if id == node_id {
                (anchor_pos.x, anchor_pos.y)
            } else {
                (start.0 + delta.0, start.1 + delta.1)
            };
            self.interaction.drag_live_positions.insert(id, live);
        }
    }

    /// Finalizes edge creation when the mouse is released.
    ///
    /// Self-edges and duplicate source/target pairs are skipped; a dangling
    /// target is impossible here because the store validates endpoints.
    fn finalize_edge(&mut self, world_pos: egui::Pos2) {
        let Some(from_id) = self.interaction.drawing_edge_from else {
            return;
        };
        let Some(to_id) = self.find_node_at_position(world_pos) else {
            return;
        };
        if from_id == to_id {
            return;
        }
        let already_exists = self
            .store
            .map()
            .edges
            .values()
            .any(|e| e.source == from_id && e.target == to_id);
        if already_exists {
            return;
        }

        match self.store.add_edge(ConceptEdge::new(from_id, to_id, "")) {
            Ok(edge_id) => {
                self.interaction.selected_edge = Some(edge_id);
                self.file.has_unsaved_changes = true;
            }
            Err(err) => {
                self.notice = Some(err.to_string());
            }
        }
    }

    /// Finds the committed node at the given world position, if any.
    ///
    /// Hit testing uses each node's effective size; staged nodes are not
    /// interactive and are never returned.
    pub fn find_node_at_position(&self, pos: egui::Pos2) -> Option<NodeId> {
        for (id, node) in &self.store.map().nodes {
            let display = self.display_position(node);
            let rect = egui::Rect::from_center_size(
                egui::pos2(display.0, display.1),
                egui::vec2(node.width(), node.height()),
            );
            if rect.contains(pos) {
                return Some(*id);
            }
        }
        None
    }

    /// Finds the committed edge at the given world position, if any.
    ///
    /// Uses distance-to-line-segment calculation with a threshold for hit
    /// detection.
    pub fn find_edge_at_position(&self, pos: egui::Pos2) -> Option<EdgeId> {
        let threshold = crate::constants::CLICK_THRESHOLD;
        for (id, edge) in &self.store.map().edges {
            if let (Some(from), Some(to)) = (
                self.store.map().nodes.get(&edge.source),
                self.store.map().nodes.get(&edge.target),
            ) {
                let start = egui::pos2(from.position.0, from.position.1);
                let end = egui::pos2(to.position.0, to.position.1);
                if point_to_line_distance(pos, start, end) < threshold {
                    return Some(*id);
                }
            }
        }
        None
    }
}

/// Calculates the distance from a point to a line segment using vector
/// projection clamped to the segment.
fn point_to_line_distance(point: egui::Pos2, line_start: egui::Pos2, line_end: egui::Pos2) -> f32 {
    let line_vec = line_end - line_start;
    let point_vec = point - line_start;
    let line_len_sq = line_vec.length_sq();

    if line_len_sq < 0.0001 {
        // Line segment is essentially a point
        return point_vec.length();
    }

    let t = (point_vec.dot(line_vec) / line_len_sq).clamp(0.0, 1.0);
    let projection = line_start + line_vec * t;

    (point - projection).length()
}
