//! Canvas rendering functionality for nodes, edges, staged items, ghost
//! previews, and the grid.
//!
//! Committed elements draw at full opacity; staged nodes and edges draw
//! translucent with an accent outline so proposed additions are visually
//! distinct until they are accepted; ghost previews draw as dashed outlines
//! at the proposed positions with a guide line from the current ones.

use super::state::CodeMapApp;
use crate::types::*;
use eframe::egui;
use eframe::epaint::StrokeKind;

/// Accent color marking staged (not yet committed) elements.
const STAGED_ACCENT: egui::Color32 = egui::Color32::from_rgb(160, 100, 240);
/// Color for ghost-preview outlines and guide lines.
const GHOST_COLOR: egui::Color32 = egui::Color32::from_rgb(120, 180, 160);

impl CodeMapApp {
    /// Renders all map elements on the canvas.
    ///
    /// Elements are drawn in layers: grid first, then committed edges and the
    /// edge-draw preview, then committed nodes, then staged items, then ghost
    /// outlines, ensuring proposed changes always read on top.
    ///
    /// # Arguments
    ///
    /// * `painter` - The egui painter for drawing operations
    /// * `canvas_rect` - The screen-space rectangle of the canvas area
    pub fn render_map_elements(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        if self.canvas.show_grid {
            self.draw_grid(painter, canvas_rect);
        }

        for (id, edge) in &self.store.map().edges {
            let is_selected = self.interaction.selected_edge == Some(*id);
            self.draw_edge(painter, edge, is_selected, false);
        }

        if let Some(from_node_id) = self.interaction.drawing_edge_from {
            if let Some(draw_pos) = self.interaction.edge_draw_pos {
                self.draw_edge_preview(painter, from_node_id, draw_pos);
            }
        }

        for node in self.store.map().nodes.values() {
            self.draw_node(painter, node, false);
        }

        // Staged items render above committed ones
        if let Some(staged) = self.store.staged() {
            for edge in staged.edges.values() {
                self.draw_staged_edge(painter, staged, edge);
            }
            for node in staged.nodes.values() {
                self.draw_node(painter, node, true);
            }
        }

        if let Some(ghost) = self.store.ghost_preview() {
            self.draw_ghost_preview(painter, ghost);
        }

        if let (Some(start), Some(end)) =
            (self.interaction.marquee_start, self.interaction.marquee_end)
        {
            let rect = egui::Rect::from_two_pos(start, end);
            let fill = egui::Color32::from_rgba_unmultiplied(100, 150, 255, 40);
            let stroke = egui::Stroke::new(1.5, egui::Color32::from_rgb(100, 150, 255));
            painter.rect_filled(rect, 0.0, fill);
            painter.rect_stroke(rect, 0.0, stroke, StrokeKind::Inside);
        }
    }

    /// Draws a zoom-aware grid on the canvas for visual reference.
    ///
    /// Grid lines are drawn every 20 world units; axis lines (x=0, y=0) are
    /// drawn more prominently at higher zoom levels.
    pub fn draw_grid(&self, painter: &egui::Painter, canvas_rect: egui::Rect) {
        let grid_size = crate::constants::GRID_SIZE;
        let grid_color = egui::Color32::from_rgba_unmultiplied(128, 128, 128, 32);
        let stroke = egui::Stroke::new(1.0, grid_color);

        let top_left_world = self.screen_to_world(canvas_rect.min);
        let bottom_right_world = self.screen_to_world(canvas_rect.max);

        let start_x = (top_left_world.x / grid_size).floor() * grid_size;
        let end_x = (bottom_right_world.x / grid_size).ceil() * grid_size;
        let start_y = (top_left_world.y / grid_size).floor() * grid_size;
        let end_y = (bottom_right_world.y / grid_size).ceil() * grid_size;

        // Skip drawing when the grid would be too dense to read
        let screen_grid_size = grid_size * self.canvas.zoom_factor;
        if screen_grid_size < 2.0 {
            return;
        }

        let mut x = start_x;
        while x <= end_x {
            let screen_x = self.world_to_screen(egui::pos2(x, 0.0)).x;
            if screen_x >= canvas_rect.min.x && screen_x <= canvas_rect.max.x {
                painter.line_segment(
                    [
                        egui::pos2(screen_x, canvas_rect.min.y),
                        egui::pos2(screen_x, canvas_rect.max.y),
                    ],
                    stroke,
                );
            }
            x += grid_size;
        }

        let mut y = start_y;
        while y <= end_y {
            let screen_y = self.world_to_screen(egui::pos2(0.0, y)).y;
            if screen_y >= canvas_rect.min.y && screen_y <= canvas_rect.max.y {
                painter.line_segment(
                    [
                        egui::pos2(canvas_rect.min.x, screen_y),
                        egui::pos2(canvas_rect.max.x, screen_y),
                    ],
                    stroke,
                );
            }
            y += grid_size;
        }

        if screen_grid_size > 10.0 {
            let axis_color = egui::Color32::from_rgba_unmultiplied(128, 128, 128, 80);
            let axis_stroke = egui::Stroke::new(1.5, axis_color);

            let x_axis_screen_y = self.world_to_screen(egui::pos2(0.0, 0.0)).y;
            if x_axis_screen_y >= canvas_rect.min.y && x_axis_screen_y <= canvas_rect.max.y {
                painter.line_segment(
                    [
                        egui::pos2(canvas_rect.min.x, x_axis_screen_y),
                        egui::pos2(canvas_rect.max.x, x_axis_screen_y),
                    ],
                    axis_stroke,
                );
            }

            let y_axis_screen_x = self.world_to_screen(egui::pos2(0.0, 0.0)).x;
            if y_axis_screen_x >= canvas_rect.min.x && y_axis_screen_x <= canvas_rect.max.x {
                painter.line_segment(
                    [
                        egui::pos2(y_axis_screen_x, canvas_rect.min.y),
                        egui::pos2(y_axis_screen_x, canvas_rect.max.y),
                    ],
                    axis_stroke,
                );
            }
        }
    }

    /// Draws one edge with its label, direction arrow, and line style.
    ///
    /// # Arguments
    ///
    /// * `painter` - The egui painter for drawing operations
    /// * `edge` - The edge to render
    /// * `is_selected` - Whether this edge is currently selected
    /// * `staged` - Whether the edge comes from the staging buffer
    fn draw_edge(&self, painter: &egui::Painter, edge: &ConceptEdge, is_selected: bool, staged: bool) {
        let Some(from) = self.store.map().nodes.get(&edge.source) else {
            return;
        };
        let Some(to) = self.store.map().nodes.get(&edge.target) else {
            return;
        };
        let from_pos = self.display_position(from);
        let to_pos = self.display_position(to);
        let start_pos = self.world_to_screen(egui::pos2(from_pos.0, from_pos.1));
        let end_pos = self.world_to_screen(egui::pos2(to_pos.0, to_pos.1));
        self.draw_edge_line(painter, edge, start_pos, end_pos, is_selected, staged);
    }

    /// Draws a staged edge, resolving endpoints in the staged buffer first
    /// and falling back to the committed map.
    fn draw_staged_edge(&self, painter: &egui::Painter, staged: &MapData, edge: &ConceptEdge) {
        let resolve = |id: &NodeId| {
            staged
                .nodes
                .get(id)
                .or_else(|| self.store.map().nodes.get(id))
                .map(|n| n.position)
        };
        let (Some(from_pos), Some(to_pos)) = (resolve(&edge.source), resolve(&edge.target)) else {
            return;
        };
        let start_pos = self.world_to_screen(egui::pos2(from_pos.0, from_pos.1));
        let end_pos = self.world_to_screen(egui::pos2(to_pos.0, to_pos.1));
        self.draw_edge_line(painter, edge, start_pos, end_pos, false, true);
    }

    /// Shared edge drawing: line (solid or dashed), center arrow, label.
    fn draw_edge_line(
        &self,
        painter: &egui::Painter,
        edge: &ConceptEdge,
        start_pos: egui::Pos2,
        end_pos: egui::Pos2,
        is_selected: bool,
        staged: bool,
    ) {
        let base_color = edge
            .color
            .map(|[r, g, b]| egui::Color32::from_rgb(r, g, b))
            .unwrap_or(egui::Color32::DARK_GRAY);
        let (line_color, line_width) = if staged {
            (STAGED_ACCENT.gamma_multiply(0.7), 2.0)
        } else if is_selected {
            (egui::Color32::from_rgb(100, 150, 255), 3.0)
        } else {
            (base_color, 2.0)
        };
        let stroke = egui::Stroke::new(line_width, line_color);

        match edge.line_style {
            LineStyle::Solid => {
                painter.line_segment([start_pos, end_pos], stroke);
            }
            LineStyle::Dashed => {
                let dash = 8.0 * self.canvas.zoom_factor;
                let gap = 5.0 * self.canvas.zoom_factor;
                painter.add(egui::Shape::dashed_line(&[start_pos, end_pos], stroke, dash, gap));
            }
        }

        self.draw_arrow_at_center(painter, start_pos, end_pos, line_color);

        if !edge.label.is_empty() {
            let center = start_pos + (end_pos - start_pos) * 0.5;
            let font_size = (11.0 * self.canvas.zoom_factor).clamp(8.0, 24.0);
            let offset = egui::vec2(0.0, -10.0 * self.canvas.zoom_factor);
            painter.text(
                center + offset,
                egui::Align2::CENTER_BOTTOM,
                &edge.label,
                egui::FontId::proportional(font_size),
                if self.dark_mode {
                    egui::Color32::from_gray(200)
                } else {
                    egui::Color32::from_gray(60)
                },
            );
        }
    }

    /// Draws a directional arrow at the center of an edge line.
    ///
    /// The arrow is rendered as a filled triangle pointing from source to
    /// target; its size scales with the current zoom level.
    fn draw_arrow_at_center(
        &self,
        painter: &egui::Painter,
        start: egui::Pos2,
        end: egui::Pos2,
        color: egui::Color32,
    ) {
        let center = start + (end - start) * 0.5;
        let direction = (end - start).normalized();

        let arrow_size = 8.0 * self.canvas.zoom_factor;
        let arrow_width = 6.0 * self.canvas.zoom_factor;
        let perpendicular = egui::vec2(-direction.y, direction.x);

        let arrow_tip = center + direction * arrow_size;
        let arrow_left = center - direction * arrow_size + perpendicular * arrow_width;
        let arrow_right = center - direction * arrow_size - perpendicular * arrow_width;

        painter.add(egui::Shape::convex_polygon(
            vec![arrow_tip, arrow_left, arrow_right],
            color,
            egui::Stroke::NONE,
        ));
    }

    /// Renders a preview of the edge being drawn during shift-click drag.
    ///
    /// The line is blue while the target is valid, red when it is not
    /// (self-edge or duplicate).
    fn draw_edge_preview(
        &self,
        painter: &egui::Painter,
        from_node_id: NodeId,
        to_screen_pos: egui::Pos2,
    ) {
        let Some(from_node) = self.store.map().nodes.get(&from_node_id) else {
            return;
        };
        let from_pos = self.display_position(from_node);
        let from_screen = self.world_to_screen(egui::pos2(from_pos.0, from_pos.1));

        let to_world_pos = self.screen_to_world(to_screen_pos);
        let is_valid = match self.find_node_at_position(to_world_pos) {
            Some(target) if target == from_node_id => false,
            Some(target) => !self
                .store
                .map()
                .edges
                .values()
                .any(|e| e.source == from_node_id && e.target == target),
            None => true,
        };

        let color = if is_valid {
            egui::Color32::from_rgb(100, 150, 255)
        } else {
            egui::Color32::from_rgb(255, 80, 80)
        };

        painter.line_segment([from_screen, to_screen_pos], egui::Stroke::new(2.0, color));
        painter.circle_filled(to_screen_pos, 4.0, color);
    }

    /// Default fill color for a node kind, used when the node carries no
    /// style override.
    fn kind_fill(&self, kind: &str) -> egui::Color32 {
        match kind {
            "module" => egui::Color32::from_rgb(170, 220, 170),
            "topic" => egui::Color32::from_rgb(235, 210, 140),
            "question" => egui::Color32::from_rgb(235, 170, 170),
            "suggestion" => egui::Color32::from_rgb(205, 185, 235),
            _ => egui::Color32::from_rgb(170, 200, 235),
        }
    }

    /// Renders a single node with its styling, selection state, and label.
    ///
    /// Staged nodes draw translucent with the staging accent outline and are
    /// never shown as selected or dragged.
    ///
    /// # Arguments
    ///
    /// * `painter` - The egui painter for drawing operations
    /// * `node` - The node to render
    /// * `staged` - Whether the node comes from the staging buffer
    fn draw_node(&self, painter: &egui::Painter, node: &ConceptNode, staged: bool) {
        let display = if staged {
            node.position
        } else {
            self.display_position(node)
        };
        let screen_pos = self.world_to_screen(egui::pos2(display.0, display.1));
        let scaled_size = egui::vec2(node.width(), node.height()) * self.canvas.zoom_factor;
        let rect = egui::Rect::from_center_size(screen_pos, scaled_size);

        let mut fill = node
            .style
            .as_ref()
            .and_then(|s| s.fill)
            .map(|[r, g, b]| egui::Color32::from_rgb(r, g, b))
            .unwrap_or_else(|| self.kind_fill(&node.kind));
        if staged {
            fill = fill.gamma_multiply(0.45);
        } else if Some(node.id) == self.interaction.dragging_node {
            fill = egui::Color32::from_rgba_unmultiplied(
                (fill.r() as f32 * 0.8) as u8,
                (fill.g() as f32 * 0.8) as u8,
                (fill.b() as f32 * 0.8) as u8,
                fill.a(),
            );
        }

        let (stroke_color, stroke_width) = if staged {
            (STAGED_ACCENT, 2.5)
        } else if Some(node.id) == self.interaction.dragging_node {
            (egui::Color32::from_rgb(255, 165, 0), 4.0)
        } else if Some(node.id) == self.interaction.selected_node
            || self.interaction.selected_nodes.contains(&node.id)
        {
            (egui::Color32::YELLOW, 3.0)
        } else if node.highlighted {
            (egui::Color32::from_rgb(255, 120, 60), 3.0)
        } else {
            (egui::Color32::BLACK, 2.0)
        };
        let stroke = egui::Stroke::new(stroke_width, stroke_color);

        let shape = node
            .style
            .as_ref()
            .and_then(|s| s.shape)
            .unwrap_or(NodeShape::Rectangle);
        match shape {
            NodeShape::Rectangle => {
                painter.rect_filled(rect, 5.0, fill);
                painter.rect_stroke(rect, 5.0, stroke, StrokeKind::Outside);
            }
            NodeShape::Ellipse => {
                painter.add(egui::Shape::ellipse_filled(
                    rect.center(),
                    rect.size() * 0.5,
                    fill,
                ));
                painter.add(egui::Shape::ellipse_stroke(
                    rect.center(),
                    rect.size() * 0.5,
                    stroke,
                ));
            }
            NodeShape::Diamond => {
                let points = vec![
                    egui::pos2(rect.center().x, rect.min.y),
                    egui::pos2(rect.max.x, rect.center().y),
                    egui::pos2(rect.center().x, rect.max.y),
                    egui::pos2(rect.min.x, rect.center().y),
                ];
                painter.add(egui::Shape::convex_polygon(points.clone(), fill, egui::Stroke::NONE));
                painter.add(egui::Shape::closed_line(points, stroke));
            }
        }

        self.draw_node_text(painter, node, screen_pos, scaled_size, staged);
    }

    /// Renders the node's label with wrapping and vertical centering. Font
    /// size scales with zoom level for readability.
    fn draw_node_text(
        &self,
        painter: &egui::Painter,
        node: &ConceptNode,
        pos: egui::Pos2,
        size: egui::Vec2,
        staged: bool,
    ) {
        let text_rect = egui::Rect::from_center_size(
            pos,
            egui::vec2(
                size.x - 10.0 * self.canvas.zoom_factor,
                size.y - 10.0 * self.canvas.zoom_factor,
            ),
        );

        let base_font_size = 12.0;
        let scaled_font_size = (base_font_size * self.canvas.zoom_factor).clamp(8.0, 48.0);
        let font_id = egui::FontId::proportional(scaled_font_size);

        let text_color = if staged {
            egui::Color32::from_gray(70)
        } else {
            egui::Color32::BLACK
        };

        let wrapped_text = wrap_text(&node.label, text_rect.width(), &font_id, painter);
        let line_height = painter.fonts_mut(|f| f.row_height(&font_id));
        let total_height = line_height * wrapped_text.len() as f32;
        let start_y = text_rect.center().y - total_height / 2.0;

        for (i, line) in wrapped_text.iter().enumerate() {
            let line_pos = egui::pos2(text_rect.center().x, start_y + i as f32 * line_height);
            painter.text(
                line_pos,
                egui::Align2::CENTER_CENTER,
                line,
                font_id.clone(),
                text_color,
            );
        }
    }

    /// Renders the ghost preview: a dashed outline at each proposed position
    /// with a guide line back to the node's current position.
    fn draw_ghost_preview(&self, painter: &egui::Painter, ghost: &crate::store::GhostPositions) {
        let stroke = egui::Stroke::new(1.5, GHOST_COLOR);
        for (id, proposed) in ghost {
            let Some(node) = self.store.map().nodes.get(id) else {
                continue;
            };
            let current_screen =
                self.world_to_screen(egui::pos2(node.position.0, node.position.1));
            let proposed_screen = self.world_to_screen(egui::pos2(proposed.0, proposed.1));
            let scaled_size = egui::vec2(node.width(), node.height()) * self.canvas.zoom_factor;
            let rect = egui::Rect::from_center_size(proposed_screen, scaled_size);

            painter.add(egui::Shape::dashed_line(
                &[current_screen, proposed_screen],
                stroke,
                6.0,
                4.0,
            ));
            painter.rect_stroke(rect, 5.0, stroke, StrokeKind::Outside);
            painter.rect_filled(rect, 5.0, GHOST_COLOR.gamma_multiply(0.08));
        }
    }
}

/// Wraps text to fit within the specified width, returning a vector of lines.
///
/// Breaks text at word boundaries; a single word too long for the width is
/// placed on its own line anyway.
pub fn wrap_text(
    text: &str,
    max_width: f32,
    font_id: &egui::FontId,
    painter: &egui::Painter,
) -> Vec<String> {
    let mut lines = Vec::new();
    let words: Vec<&str> = text.split_whitespace().collect();

    if words.is_empty() {
        return vec![text.to_string()];
    }

    let mut current_line = String::new();

    for word in words {
        let test_line = if current_line.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current_line, word)
        };

        let text_width = painter.fonts_mut(|f| {
            f.layout_no_wrap(test_line.clone(), font_id.clone(), egui::Color32::BLACK)
                .size()
                .x
        });

        if text_width <= max_width {
            current_line = test_line;
        } else if !current_line.is_empty() {
            lines.push(current_line);
            current_line = word.to_string();
        } else {
            // Single word too long, add it anyway
            lines.push(word.to_string());
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(text.to_string());
    }

    lines
}
