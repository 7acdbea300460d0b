//! User interface components and rendering logic for the concept-map tool.
//!
//! This module contains all the UI-related code including the main
//! application struct, canvas rendering, the staging and layout-preview
//! banners, property panels, context menus, AI flows, and user interaction
//! handling.
//!
//! # Module Organization
//!
//! - `state` - Application state structures and the main CodeMapApp
//! - `file_ops` - Map save/load and archive upload for native and WASM
//! - `canvas` - Canvas navigation, zooming, panning, and interaction
//! - `rendering` - Drawing nodes, edges, staged items, ghost previews, grid

mod canvas;
mod file_ops;
mod rendering;
mod state;

pub use state::CodeMapApp;

use self::state::{GenerationOutcome, PendingConfirmAction};
use crate::ai::{GenerationError, GenerationPayload};
use crate::layout::{propose_layout, ArrangeMode};
use crate::persistence::MapStore;
use crate::store::{EdgePatch, NodePatch};
use crate::types::*;
use eframe::egui;

#[cfg(not(target_arch = "wasm32"))]
use crate::ai::{HttpTextGenerator, Orchestrator};

/// One background generation task: everything it needs is captured by value
/// so a stale result can never read newer editor state.
enum GenerationTask {
    /// Expand a concept into sub-concepts around the origin node
    Expand { origin: ConceptNode },
    /// Suggest relations between committed concepts
    SuggestRelations { concept: String, map: MapData },
    /// Ask a question about one concept
    AskQuestion {
        node_label: String,
        details: Option<String>,
        question: String,
    },
    /// Extract concepts from free-text excerpts
    Extract {
        excerpts: Vec<String>,
        anchor: (f32, f32),
    },
    /// Summarize the selected concepts' contents
    Summarize { excerpts: Vec<String> },
}

/// Runs one generation task to completion against the configured endpoint.
#[cfg(not(target_arch = "wasm32"))]
fn run_generation_task(
    task: GenerationTask,
    endpoint: String,
) -> Result<GenerationPayload, GenerationError> {
    let mut orchestrator = Orchestrator::new(Box::new(HttpTextGenerator::new(endpoint)));
    match task {
        GenerationTask::Expand { origin } => orchestrator
            .expand_concept(&origin)
            .map(GenerationPayload::Candidates),
        GenerationTask::SuggestRelations { concept, map } => orchestrator
            .suggest_relations(&concept, None, &map)
            .map(GenerationPayload::Candidates),
        GenerationTask::AskQuestion {
            node_label,
            details,
            question,
        } => orchestrator
            .ask_question(&node_label, details.as_deref(), &question)
            .map(GenerationPayload::Answer),
        GenerationTask::Extract { excerpts, anchor } => orchestrator
            .extract_concepts(&excerpts, anchor)
            .map(GenerationPayload::Candidates),
        GenerationTask::Summarize { excerpts } => {
            orchestrator.summarize(&excerpts).map(GenerationPayload::Summary)
        }
    }
}

impl eframe::App for CodeMapApp {
    /// Persist entire app state between restarts.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        match self.to_json() {
            Ok(json) => {
                storage.set_string("app_state", json);
            }
            Err(err) => {
                log::error!("failed to serialize app state: {err}");
            }
        }
    }

    /// Main update function called by egui for each frame.
    ///
    /// Handles the overall UI layout: toolbar, staging/preview banner,
    /// properties panel, canvas, and the floating dialogs. Completed
    /// background work (file operations, generations) is drained here and
    /// applied as single store updates.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let visuals = if self.dark_mode {
            egui::Visuals::dark()
        } else {
            egui::Visuals::light()
        };
        ctx.set_visuals(visuals);

        self.handle_pending_operations(ctx);
        self.handle_generation_results();
        self.handle_undo_redo_keys(ctx);
        self.handle_delete_key(ctx);
        self.handle_file_shortcuts(ctx);

        // Intercept native window close requests (titlebar X)
        #[cfg(not(target_arch = "wasm32"))]
        {
            if ctx.input(|i| i.viewport().close_requested()) {
                if self.file.has_unsaved_changes && !self.file.allow_close_on_next_request {
                    ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
                    if !self.file.show_unsaved_dialog {
                        self.file.show_unsaved_dialog = true;
                        self.file.pending_confirm_action = Some(PendingConfirmAction::Quit);
                    }
                } else {
                    self.file.allow_close_on_next_request = false;
                }
            }
        }

        // Restore native window size once per session (desktop only)
        #[cfg(not(target_arch = "wasm32"))]
        {
            if !self.applied_viewport_restore {
                if let Some((w, h)) = self.window_inner_size {
                    ctx.send_viewport_cmd(egui::ViewportCommand::InnerSize(egui::vec2(w, h)));
                }
                self.applied_viewport_restore = true;
            }
            let size = ctx.input(|i| i.screen_rect().size());
            self.window_inner_size = Some((size.x, size.y));
        }

        egui::TopBottomPanel::top("top_toolbar").show(ctx, |ui| {
            self.draw_toolbar(ui);
        });

        // Staging / layout-preview / notice banner, only when something is pending
        if self.store.is_staged() || self.store.ghost_preview().is_some() || self.notice.is_some()
        {
            egui::TopBottomPanel::top("pending_banner").show(ctx, |ui| {
                self.draw_pending_banner(ui);
            });
        }

        let viewport_width = ctx.input(|i| i.screen_rect().width());
        let clamped_width = self
            .properties_panel_width
            .clamp(200.0, (viewport_width * 0.9).max(200.0));

        egui::SidePanel::right("properties_panel")
            .resizable(true)
            .default_width(clamped_width)
            .show(ctx, |ui| {
                let current_width = ui.available_width();
                let max_allowed = (viewport_width * 0.9).max(200.0);
                self.properties_panel_width = current_width.clamp(200.0, max_allowed);
                self.draw_properties_panel(ui);
            });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.draw_canvas(ui);
        });

        self.draw_unsaved_dialog(ctx);
        self.draw_answer_floater(ctx);
        self.draw_extract_dialog(ctx);
    }
}

impl CodeMapApp {
    /// Handles undo/redo keyboard shortcuts (Ctrl+Z, Ctrl+Shift+Z / Ctrl+Y).
    fn handle_undo_redo_keys(&mut self, ctx: &egui::Context) {
        // Skip while a text edit widget has keyboard focus
        let is_editing_text = ctx.wants_keyboard_input();

        if !is_editing_text {
            if ctx
                .input(|i| i.key_pressed(egui::Key::Z) && i.modifiers.command && !i.modifiers.shift)
            {
                self.perform_undo();
            } else if ctx.input(|i| {
                (i.key_pressed(egui::Key::Z) && i.modifiers.command && i.modifiers.shift)
                    || (i.key_pressed(egui::Key::Y) && i.modifiers.command)
            }) {
                self.perform_redo();
            }
        }
    }

    /// Handles delete key presses to remove selected nodes or edges.
    fn handle_delete_key(&mut self, ctx: &egui::Context) {
        let is_editing_text = ctx.wants_keyboard_input();
        if !ctx.input(|i| i.key_pressed(egui::Key::Delete)) || is_editing_text {
            return;
        }

        if !self.interaction.selected_nodes.is_empty() {
            let mut deleted_any = false;
            for id in self.interaction.selected_nodes.clone() {
                deleted_any |= self.store.delete_node(id);
            }
            self.interaction.selected_nodes.clear();
            self.interaction.selected_node = None;
            self.interaction.selected_edge = None;
            self.interaction.editing_node_label = None;
            if deleted_any {
                self.file.has_unsaved_changes = true;
            }
        } else if let Some(edge_id) = self.interaction.selected_edge {
            if self.store.delete_edge(edge_id) {
                self.file.has_unsaved_changes = true;
            }
            self.interaction.selected_edge = None;
        }
    }

    /// Handles file-related keyboard shortcuts (New/Open/Save).
    fn handle_file_shortcuts(&mut self, ctx: &egui::Context) {
        if ctx.wants_keyboard_input() {
            return;
        }
        let (new_pressed, open_pressed, save_pressed, save_as_pressed) = ctx.input(|i| {
            (
                i.key_pressed(egui::Key::N) && i.modifiers.command,
                i.key_pressed(egui::Key::O) && i.modifiers.command,
                i.key_pressed(egui::Key::S) && i.modifiers.command && !i.modifiers.shift,
                i.key_pressed(egui::Key::S) && i.modifiers.command && i.modifiers.shift,
            )
        });

        if new_pressed {
            self.request_new_map();
        }
        if open_pressed {
            self.request_open_map();
        }
        if save_as_pressed {
            self.save_as_map();
        } else if save_pressed {
            self.save_map();
        }
    }

    /// Starts a new map, asking for confirmation when there are unsaved changes.
    fn request_new_map(&mut self) {
        if self.file.has_unsaved_changes {
            self.file.show_unsaved_dialog = true;
            self.file.pending_confirm_action = Some(PendingConfirmAction::New);
        } else {
            self.new_map();
        }
    }

    /// Opens a map, asking for confirmation when there are unsaved changes.
    fn request_open_map(&mut self) {
        if self.file.has_unsaved_changes {
            self.file.show_unsaved_dialog = true;
            self.file.pending_confirm_action = Some(PendingConfirmAction::Open);
        } else {
            self.open_map();
        }
    }

    /// Performs an undo operation and refreshes dependent UI state.
    fn perform_undo(&mut self) {
        if self.store.undo() {
            self.file.has_unsaved_changes = true;
            self.clear_selection_state();
        }
    }

    /// Performs a redo operation and refreshes dependent UI state.
    fn perform_redo(&mut self) {
        if self.store.redo() {
            self.file.has_unsaved_changes = true;
            self.clear_selection_state();
        }
    }

    /// Clears selection and the temp editors so panels repopulate.
    fn clear_selection_state(&mut self) {
        self.interaction.selected_node = None;
        self.interaction.selected_nodes.clear();
        self.interaction.selected_edge = None;
        self.interaction.editing_node_label = None;
        self.interaction.temp_fields_node = None;
        self.interaction.temp_label_edge = None;
    }

    /// Renders the toolbar with file operations, history, layout preview, AI
    /// entry points, and view options.
    fn draw_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            if ui.button("New").clicked() {
                self.request_new_map();
            }
            if ui.button("Open").clicked() {
                self.request_open_map();
            }
            if ui.button("Save").clicked() {
                self.save_map();
            }
            if ui.button("Save As").clicked() {
                self.save_as_map();
            }

            ui.menu_button("Samples", |ui| {
                for info in crate::samples::all_samples() {
                    if ui.button(info.name).clicked() {
                        self.store.load_map(crate::samples::build_sample(info.kind));
                        self.map_name = info.name.to_string();
                        self.file.current_path = None;
                        self.file.has_unsaved_changes = true;
                        self.clear_selection_state();
                        ui.close_menu();
                    }
                }
            });

            ui.separator();

            ui.add_enabled_ui(self.store.can_undo(), |ui| {
                if ui.button("⟲ Undo").clicked() {
                    self.perform_undo();
                }
            });
            ui.add_enabled_ui(self.store.can_redo(), |ui| {
                if ui.button("⟳ Redo").clicked() {
                    self.perform_redo();
                }
            });

            ui.separator();

            // Layout suggestion: propose positions into the ghost preview
            if ui.button("Suggest Layout").clicked() {
                self.request_layout_preview();
            }
            egui::ComboBox::from_id_source("arrange_mode_combo")
                .selected_text(match self.arrange_mode {
                    ArrangeMode::ForceDirected => "Force-directed",
                    ArrangeMode::Grid => "Grid",
                    ArrangeMode::Line => "Line",
                })
                .show_ui(ui, |ui| {
                    ui.selectable_value(
                        &mut self.arrange_mode,
                        ArrangeMode::ForceDirected,
                        "Force-directed",
                    );
                    ui.selectable_value(&mut self.arrange_mode, ArrangeMode::Grid, "Grid");
                    ui.selectable_value(&mut self.arrange_mode, ArrangeMode::Line, "Line");
                });

            ui.separator();

            if ui.button("Extract Concepts…").clicked() {
                self.ai.show_extract_dialog = true;
            }
            if ui.button("Upload Project…").clicked() {
                self.upload_archive();
            }

            ui.separator();

            ui.checkbox(&mut self.canvas.show_grid, "Show Grid");
            ui.separator();
            ui.checkbox(&mut self.dark_mode, "Dark Mode");

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let status = if self.file.has_unsaved_changes { "*" } else { "" };
                ui.label(format!("{}{}", self.map_name, status));
                ui.label(format!("Zoom: {:.0}%", self.canvas.zoom_factor * 100.0));
                if self.ai.in_flight.is_some() {
                    ui.spinner();
                    ui.label("Generating…");
                }
            });
        });
    }

    /// Renders the banner for pending staged suggestions, an active layout
    /// preview, and user notices.
    fn draw_pending_banner(&mut self, ui: &mut egui::Ui) {
        if let Some(staged) = self.store.staged() {
            let nodes = staged.nodes.len();
            let edges = staged.edges.len();
            ui.horizontal(|ui| {
                ui.label(
                    egui::RichText::new(format!(
                        "AI suggestions pending: {nodes} concepts, {edges} relations"
                    ))
                    .color(egui::Color32::from_rgb(160, 100, 240)),
                );
                if ui.button("Accept All").clicked() {
                    match self.store.commit_staged_map_data() {
                        Ok(()) => {
                            self.file.has_unsaved_changes = true;
                        }
                        Err(err) => {
                            self.notice = Some(err.to_string());
                        }
                    }
                }
                if ui.button("Discard").clicked() {
                    self.store.clear_staged_map_data();
                }
            });
        }

        if let Some(ghost) = self.store.ghost_preview() {
            let count = ghost.len();
            ui.horizontal(|ui| {
                ui.label(
                    egui::RichText::new(format!("Layout preview for {count} nodes"))
                        .color(egui::Color32::from_rgb(120, 180, 160)),
                );
                if ui.button("Apply Layout").clicked() {
                    if self.store.accept_ghost_preview() {
                        self.file.has_unsaved_changes = true;
                    }
                }
                if ui.button("Cancel").clicked() {
                    self.store.cancel_ghost_preview();
                }
            });
        }

        if let Some(notice) = self.notice.clone() {
            ui.horizontal(|ui| {
                ui.colored_label(egui::Color32::from_rgb(230, 140, 80), notice);
                if ui.button("Dismiss").clicked() {
                    self.notice = None;
                }
            });
        }
    }

    /// Computes a layout proposal for the selection (or the whole map) and
    /// puts it in the ghost-preview buffer.
    fn request_layout_preview(&mut self) {
        let targets: Vec<NodeId> = if self.interaction.selected_nodes.len() > 1 {
            self.interaction.selected_nodes.clone()
        } else {
            self.store.map().nodes.keys().copied().collect()
        };
        if targets.is_empty() {
            return;
        }
        let proposed = propose_layout(self.arrange_mode, self.store.map(), &targets);
        self.store.set_ghost_preview(proposed);
    }

    /// Renders the properties panel for the current selection, plus the AI,
    /// library, submissions, and diagnostics sections.
    fn draw_properties_panel(&mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .auto_shrink([false; 2])
            .show(ui, |ui| {
                ui.heading("Properties");
                ui.separator();

                if let Some(node_id) = self.interaction.selected_node {
                    self.draw_node_properties(ui, node_id);
                } else if self.interaction.selected_nodes.len() > 1 {
                    ui.label(format!(
                        "{} concepts selected",
                        self.interaction.selected_nodes.len()
                    ));
                    if ui.button("Summarize Selection (AI)").clicked() {
                        self.start_summarize_selection();
                    }
                } else if let Some(edge_id) = self.interaction.selected_edge {
                    self.draw_edge_properties(ui, edge_id);
                } else {
                    ui.label("Click a concept or relation to edit it.");
                    ui.label("Right-click the canvas to add a concept.");
                    ui.label("Shift-drag between concepts to draw a relation.");
                }

                ui.separator();
                self.draw_ai_section(ui);
                ui.separator();
                self.draw_library_section(ui);
                ui.separator();
                self.draw_debug_log_section(ui);
            });
    }

    /// Renders editable fields for the selected node.
    fn draw_node_properties(&mut self, ui: &mut egui::Ui, node_id: NodeId) {
        let Some(node) = self.store.map().nodes.get(&node_id).cloned() else {
            return;
        };

        // (Re)load temp editors when the selection changed
        if self.interaction.temp_fields_node != Some(node_id) {
            self.interaction.temp_fields_node = Some(node_id);
            self.interaction.temp_node_label = node.label.clone();
            self.interaction.temp_node_details = node.details.clone().unwrap_or_default();
            self.interaction.temp_node_kind = node.kind.clone();
        }

        ui.label("Label:");
        let label_response = ui.text_edit_singleline(&mut self.interaction.temp_node_label);
        ui.label("Details:");
        let details_response = ui.text_edit_multiline(&mut self.interaction.temp_node_details);
        ui.label("Kind:");
        let kind_response = ui.text_edit_singleline(&mut self.interaction.temp_node_kind);

        // Commit text edits when focus leaves the fields, one store op per field
        if label_response.lost_focus() && self.interaction.temp_node_label != node.label {
            let patch = NodePatch {
                label: Some(self.interaction.temp_node_label.clone()),
                ..Default::default()
            };
            if self.store.update_node(node_id, &patch) {
                self.file.has_unsaved_changes = true;
            }
        }
        if details_response.lost_focus() {
            let details = if self.interaction.temp_node_details.is_empty() {
                None
            } else {
                Some(self.interaction.temp_node_details.clone())
            };
            if details != node.details {
                let patch = NodePatch {
                    details: Some(details),
                    ..Default::default()
                };
                if self.store.update_node(node_id, &patch) {
                    self.file.has_unsaved_changes = true;
                }
            }
        }
        if kind_response.lost_focus() && self.interaction.temp_node_kind != node.kind {
            let patch = NodePatch {
                kind: Some(self.interaction.temp_node_kind.clone()),
                ..Default::default()
            };
            if self.store.update_node(node_id, &patch) {
                self.file.has_unsaved_changes = true;
            }
        }

        let mut highlighted = node.highlighted;
        if ui.checkbox(&mut highlighted, "Highlighted").changed() {
            let patch = NodePatch {
                highlighted: Some(highlighted),
                ..Default::default()
            };
            if self.store.update_node(node_id, &patch) {
                self.file.has_unsaved_changes = true;
            }
        }

        ui.horizontal(|ui| {
            if ui.button("Expand (AI)").clicked() {
                self.start_expand(node_id);
            }
            if ui.button("Suggest Relations (AI)").clicked() {
                self.start_suggest_relations(node_id);
            }
        });

        ui.add_space(4.0);
        if ui.button("Delete Concept").clicked() {
            if self.store.delete_node(node_id) {
                self.file.has_unsaved_changes = true;
            }
            self.clear_selection_state();
        }
    }

    /// Renders editable fields for the selected edge.
    fn draw_edge_properties(&mut self, ui: &mut egui::Ui, edge_id: EdgeId) {
        let Some(edge) = self.store.map().edges.get(&edge_id).cloned() else {
            return;
        };

        if self.interaction.temp_label_edge != Some(edge_id) {
            self.interaction.temp_label_edge = Some(edge_id);
            self.interaction.temp_edge_label = edge.label.clone();
        }

        let source = self
            .store
            .map()
            .nodes
            .get(&edge.source)
            .map(|n| n.label.clone())
            .unwrap_or_default();
        let target = self
            .store
            .map()
            .nodes
            .get(&edge.target)
            .map(|n| n.label.clone())
            .unwrap_or_default();
        ui.label(format!("Relation: {source} → {target}"));

        ui.label("Label:");
        let label_response = ui.text_edit_singleline(&mut self.interaction.temp_edge_label);
        if label_response.lost_focus() && self.interaction.temp_edge_label != edge.label {
            let patch = EdgePatch {
                label: Some(self.interaction.temp_edge_label.clone()),
                ..Default::default()
            };
            if self.store.update_edge(edge_id, &patch) {
                self.file.has_unsaved_changes = true;
            }
        }

        let mut line_style = edge.line_style;
        egui::ComboBox::from_label("Line style")
            .selected_text(match line_style {
                LineStyle::Solid => "Solid",
                LineStyle::Dashed => "Dashed",
            })
            .show_ui(ui, |ui| {
                ui.selectable_value(&mut line_style, LineStyle::Solid, "Solid");
                ui.selectable_value(&mut line_style, LineStyle::Dashed, "Dashed");
            });
        if line_style != edge.line_style {
            let patch = EdgePatch {
                line_style: Some(line_style),
                ..Default::default()
            };
            if self.store.update_edge(edge_id, &patch) {
                self.file.has_unsaved_changes = true;
            }
        }

        ui.add_space(4.0);
        if ui.button("Delete Relation").clicked() {
            if self.store.delete_edge(edge_id) {
                self.file.has_unsaved_changes = true;
            }
            self.interaction.selected_edge = None;
        }
    }

    /// Renders the AI configuration and question box.
    fn draw_ai_section(&mut self, ui: &mut egui::Ui) {
        ui.collapsing("AI Assistant", |ui| {
            ui.label("Generation endpoint:");
            ui.text_edit_singleline(&mut self.ai.settings.endpoint);

            if let Some(node_id) = self.interaction.selected_node {
                ui.label("Ask about the selected concept:");
                ui.text_edit_singleline(&mut self.ai.question_text);
                if ui.button("Ask").clicked() {
                    self.start_ask_question(node_id);
                }
            } else {
                ui.label("Select a concept to ask questions about it.");
            }

            if !self.interaction.selected_nodes.is_empty()
                && ui.button("Summarize Selection").clicked()
            {
                self.start_summarize_selection();
            }
        });
    }

    /// Renders the map library and submissions sections, backed by the
    /// persistence boundary.
    fn draw_library_section(&mut self, ui: &mut egui::Ui) {
        ui.collapsing("Library", |ui| {
            ui.horizontal(|ui| {
                ui.label("Name:");
                ui.text_edit_singleline(&mut self.library.save_name);
            });
            ui.checkbox(&mut self.library.save_public, "Public");
            if ui.button("Save to Library").clicked() {
                let name = if self.library.save_name.trim().is_empty() {
                    self.map_name.clone()
                } else {
                    self.library.save_name.clone()
                };
                let owner = self.library.owner;
                let data = self.store.map().clone();
                let is_public = self.library.save_public;
                match self.library.maps.create_map(&name, owner, data, is_public, None) {
                    Ok(map) => {
                        log::info!("map '{}' saved to library", map.name);
                        self.library.save_name.clear();
                    }
                    Err(err) => {
                        self.notice = Some(err.to_string());
                    }
                }
            }

            let owner = self.library.owner;
            match self.library.maps.list_maps_by_owner(owner) {
                Ok(maps) if !maps.is_empty() => {
                    ui.separator();
                    for map in maps {
                        ui.label(format!(
                            "{} — {} concepts, {} relations{}",
                            map.name,
                            map.data.nodes.len(),
                            map.data.edges.len(),
                            if map.is_public { " (public)" } else { "" },
                        ));
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    self.notice = Some(err.to_string());
                }
            }

            if !self.library.submissions.is_empty() {
                ui.separator();
                ui.label("Submissions:");
                for submission in &self.library.submissions {
                    ui.label(format!(
                        "{} ({} bytes) → {}",
                        submission.file_name, submission.size_bytes, submission.storage_path
                    ));
                }
            }
        });
    }

    /// Renders the store's bounded diagnostics log.
    fn draw_debug_log_section(&mut self, ui: &mut egui::Ui) {
        ui.collapsing("Debug Log", |ui| {
            let entries: Vec<String> = self
                .store
                .debug_log()
                .entries()
                .map(|e| format!("{}: {}", e.op, e.detail))
                .collect();
            if entries.is_empty() {
                ui.label("No committed mutations yet.");
            } else {
                // Newest entries first, capped for readability
                for line in entries.iter().rev().take(20) {
                    ui.monospace(line);
                }
            }
        });
    }

    /// Renders the right-click context menu.
    fn draw_context_menu(&mut self, ui: &mut egui::Ui) {
        let screen_pos = egui::pos2(self.context_menu.screen_pos.0, self.context_menu.screen_pos.1);

        let area_response = egui::Area::new(egui::Id::new("context_menu"))
            .fixed_pos(screen_pos)
            .show(ui.ctx(), |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    ui.vertical(|ui| {
                        if ui.button("Add Concept Here").clicked() {
                            self.create_node_at_pos("concept");
                            self.context_menu.show = false;
                        }
                        if ui.button("Add Topic Here").clicked() {
                            self.create_node_at_pos("topic");
                            self.context_menu.show = false;
                        }

                        if let Some(target) = self.context_menu.target_node {
                            ui.separator();
                            if ui.button("Expand Concept (AI)").clicked() {
                                self.start_expand(target);
                                self.context_menu.show = false;
                            }
                            if ui.button("Suggest Relations (AI)").clicked() {
                                self.start_suggest_relations(target);
                                self.context_menu.show = false;
                            }
                        }

                        ui.separator();
                        if ui.button("Cancel").clicked() {
                            self.context_menu.show = false;
                        }
                    });
                })
            });

        // Handle click-outside-to-close after the first frame
        if !self.context_menu.just_opened && ui.input(|i| i.pointer.primary_clicked()) {
            if let Some(click_pos) = ui.input(|i| i.pointer.interact_pos()) {
                if !area_response.response.rect.contains(click_pos) {
                    self.context_menu.show = false;
                }
            }
        }

        self.context_menu.just_opened = false;
    }

    /// Creates a new node at the context menu position and selects it.
    fn create_node_at_pos(&mut self, kind: &str) {
        self.node_counter += 1;
        let label = format!("Concept {}", self.node_counter);
        let node = ConceptNode::new(label, self.context_menu.world_pos, kind);

        match self.store.add_node(node) {
            Ok(node_id) => {
                self.interaction.selected_node = Some(node_id);
                self.interaction.selected_nodes = vec![node_id];
                self.interaction.temp_fields_node = None;
                self.file.has_unsaved_changes = true;
            }
            Err(err) => {
                self.notice = Some(err.to_string());
            }
        }
    }

    /// Renders the main canvas area and routes interactions.
    fn draw_canvas(&mut self, ui: &mut egui::Ui) {
        let (response, painter) =
            ui.allocate_painter(ui.available_size(), egui::Sense::click_and_drag());

        // Center the origin on first frame of a fresh map
        if self.canvas.offset == egui::Vec2::ZERO && self.node_counter == 0 {
            let canvas_center = response.rect.center();
            self.canvas.offset = canvas_center.to_vec2();
        }

        self.handle_canvas_panning(ui, &response);
        self.handle_canvas_zoom(ui, &response);
        // Marquee gets priority over node drags
        self.handle_canvas_interactions(ui, &response);
        self.handle_node_dragging(ui, &response);

        self.render_map_elements(&painter, response.rect);

        if self.context_menu.show {
            self.draw_context_menu(ui);
        }
    }

    /// Handles canvas click interactions: marquee, selection, context menu.
    fn handle_canvas_interactions(&mut self, ui: &mut egui::Ui, response: &egui::Response) {
        // Marquee handling: primary down on empty space starts one
        if ui.input(|i| i.pointer.primary_down())
            && !self.interaction.is_panning
            && self.interaction.dragging_node.is_none()
            && self.interaction.drawing_edge_from.is_none()
            && self.interaction.pending_shift_edge_from.is_none()
        {
            if let Some(pos) = response.interact_pointer_pos() {
                if self.interaction.marquee_start.is_some() {
                    self.interaction.marquee_end = Some(pos);
                } else {
                    let world_pos = self.screen_to_world(pos);
                    let over_node = self.find_node_at_position(world_pos).is_some();
                    let over_edge = self.find_edge_at_position(world_pos).is_some();
                    if !over_node && !over_edge {
                        self.interaction.marquee_start = Some(pos);
                        self.interaction.marquee_end = Some(pos);
                        self.interaction.marquee_additive = ui.input(|i| i.modifiers.shift);
                        if !self.interaction.marquee_additive {
                            self.interaction.selected_nodes.clear();
                            self.interaction.selected_node = None;
                            self.interaction.selected_edge = None;
                        }
                    }
                }
            }
        } else if self.interaction.marquee_start.is_some()
            && self.interaction.marquee_end.is_some()
        {
            // On release: finalize the marquee selection
            let start_screen = self.interaction.marquee_start.unwrap();
            let end_screen = self.interaction.marquee_end.unwrap();
            let rect_screen = egui::Rect::from_two_pos(start_screen, end_screen);

            let min_world = self.screen_to_world(rect_screen.min);
            let max_world = self.screen_to_world(rect_screen.max);
            let world_rect = egui::Rect::from_min_max(min_world, max_world);

            if !self.interaction.marquee_additive {
                self.interaction.selected_nodes.clear();
            }
            for (id, node) in &self.store.map().nodes {
                let center = egui::pos2(node.position.0, node.position.1);
                if world_rect.contains(center) && !self.interaction.selected_nodes.contains(id) {
                    self.interaction.selected_nodes.push(*id);
                }
            }
            if self.interaction.selected_nodes.len() == 1 {
                self.interaction.selected_node = Some(self.interaction.selected_nodes[0]);
            } else {
                self.interaction.selected_node = None;
            }

            self.interaction.marquee_start = None;
            self.interaction.marquee_end = None;
            self.interaction.marquee_additive = false;
        }

        // Left-click selection (only if not dragging or panning)
        if response.clicked()
            && !self.interaction.is_panning
            && self.interaction.dragging_node.is_none()
        {
            // A pending shift-click is handled by the dragging logic
            if self.interaction.pending_shift_edge_from.is_some() {
                return;
            }
            if let Some(pos) = response.interact_pointer_pos() {
                let world_pos = self.screen_to_world(pos);

                if let Some(node_id) = self.find_node_at_position(world_pos) {
                    let shift = ui.input(|i| i.modifiers.shift);
                    if shift {
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
                    } else {
                        self.interaction.selected_node = Some(node_id);
                        self.interaction.selected_nodes.clear();
                        self.interaction.selected_nodes.push(node_id);
                    }
                    self.interaction.selected_edge = None;
                    self.interaction.editing_node_label = None;
                } else if let Some(edge_id) = self.find_edge_at_position(world_pos) {
                    self.interaction.selected_edge = Some(edge_id);
                    self.interaction.selected_node = None;
                    self.interaction.selected_nodes.clear();
                    self.interaction.editing_node_label = None;
                } else {
                    self.interaction.selected_node = None;
                    self.interaction.selected_nodes.clear();
                    self.interaction.selected_edge = None;
                    self.interaction.editing_node_label = None;
                }
            }
        }

        // Right-click for the context menu
        if response.secondary_clicked()
            && !self.interaction.is_panning
            && self.interaction.dragging_node.is_none()
        {
            if let Some(screen_pos) = response.interact_pointer_pos() {
                let world_pos = self.screen_to_world(screen_pos);
                self.context_menu.screen_pos = (screen_pos.x, screen_pos.y);
                self.context_menu.world_pos = (world_pos.x, world_pos.y);
                self.context_menu.target_node = self.find_node_at_position(world_pos);
                self.context_menu.show = true;
                self.context_menu.just_opened = true;
            }
        }
    }

    /// Renders the unsaved-changes confirmation dialog.
    fn draw_unsaved_dialog(&mut self, ctx: &egui::Context) {
        if !self.file.show_unsaved_dialog {
            return;
        }
        let title = match self.file.pending_confirm_action {
            Some(PendingConfirmAction::Quit) => "Unsaved changes — Quit?",
            Some(PendingConfirmAction::New) => "Unsaved changes — Create New?",
            Some(PendingConfirmAction::Open) => "Unsaved changes — Open Map?",
            None => "Unsaved changes",
        };
        egui::Window::new(title)
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .show(ctx, |ui| {
                ui.label("You have unsaved changes. Are you sure you want to continue?");
                ui.horizontal(|ui| {
                    let confirm_label = match self.file.pending_confirm_action {
                        Some(PendingConfirmAction::Quit) => "Discard and Quit",
                        Some(PendingConfirmAction::New) => "Discard and Create New",
                        Some(PendingConfirmAction::Open) => "Discard and Open",
                        None => "Discard",
                    };
                    if ui.button(confirm_label).clicked() {
                        match self.file.pending_confirm_action {
                            Some(PendingConfirmAction::New) => {
                                self.new_map();
                            }
                            Some(PendingConfirmAction::Open) => {
                                self.open_map();
                            }
                            Some(PendingConfirmAction::Quit) => {
                                self.file.allow_close_on_next_request = true;
                                ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                            }
                            None => {}
                        }
                        self.file.show_unsaved_dialog = false;
                        self.file.pending_confirm_action = None;
                    }
                    if ui.button("Cancel").clicked() {
                        self.file.show_unsaved_dialog = false;
                        self.file.pending_confirm_action = None;
                    }
                });
            });
    }

    /// Renders the floating window showing the latest AI answer or summary.
    fn draw_answer_floater(&mut self, ctx: &egui::Context) {
        if !self.ai.show_answer {
            return;
        }
        let Some(answer) = self.ai.last_answer.clone() else {
            self.ai.show_answer = false;
            return;
        };
        let mut open = true;
        egui::Window::new("AI Answer")
            .open(&mut open)
            .default_width(360.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().max_height(260.0).show(ui, |ui| {
                    ui.label(answer);
                });
            });
        self.ai.show_answer = open;
    }

    /// Renders the extract-concepts dialog: paste text, split into excerpts,
    /// dispatch a generation.
    fn draw_extract_dialog(&mut self, ctx: &egui::Context) {
        if !self.ai.show_extract_dialog {
            return;
        }
        let mut open = true;
        let mut submitted = false;
        egui::Window::new("Extract Concepts")
            .open(&mut open)
            .default_width(420.0)
            .show(ctx, |ui| {
                ui.label("Paste text or code excerpts; blank lines separate excerpts.");
                ui.add(
                    egui::TextEdit::multiline(&mut self.ai.extract_text)
                        .desired_rows(10)
                        .desired_width(f32::INFINITY),
                );
                if ui.button("Extract").clicked() {
                    submitted = true;
                }
            });
        self.ai.show_extract_dialog = open;

        if submitted {
            let excerpts: Vec<String> = self
                .ai
                .extract_text
                .split("\n\n")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if excerpts.is_empty() {
                self.notice = Some("Paste at least one excerpt to extract concepts.".to_string());
            } else {
                // Anchor the extracted grid at the world point under the
                // middle of the viewport
                let screen_center = ctx.input(|i| i.screen_rect().center());
                let world_center = self.screen_to_world(screen_center);
                self.dispatch_generation(GenerationTask::Extract {
                    excerpts,
                    anchor: (world_center.x, world_center.y),
                });
                self.ai.show_extract_dialog = false;
            }
        }
    }

    /// Starts an expand-concept generation for the given node.
    fn start_expand(&mut self, node_id: NodeId) {
        let Some(origin) = self.store.map().nodes.get(&node_id).cloned() else {
            return;
        };
        self.dispatch_generation(GenerationTask::Expand { origin });
    }

    /// Starts a suggest-relations generation anchored on the given node.
    fn start_suggest_relations(&mut self, node_id: NodeId) {
        let Some(node) = self.store.map().nodes.get(&node_id) else {
            return;
        };
        let task = GenerationTask::SuggestRelations {
            concept: node.label.clone(),
            map: self.store.map().clone(),
        };
        self.dispatch_generation(task);
    }

    /// Starts an ask-question generation for the given node.
    fn start_ask_question(&mut self, node_id: NodeId) {
        let Some(node) = self.store.map().nodes.get(&node_id) else {
            return;
        };
        let question = self.ai.question_text.trim().to_string();
        if question.is_empty() {
            self.notice = Some("Type a question first.".to_string());
            return;
        }
        let task = GenerationTask::AskQuestion {
            node_label: node.label.clone(),
            details: node.details.clone(),
            question,
        };
        self.dispatch_generation(task);
    }

    /// Summarizes the contents of the selected nodes.
    ///
    /// An empty selection resolves locally with the fixed message, matching
    /// the orchestration contract, without dispatching anything.
    fn start_summarize_selection(&mut self) {
        let excerpts: Vec<String> = self
            .interaction
            .selected_nodes
            .iter()
            .filter_map(|id| self.store.map().nodes.get(id))
            .map(|n| match &n.details {
                Some(details) => format!("{}: {}", n.label, details),
                None => n.label.clone(),
            })
            .collect();
        if excerpts.is_empty() {
            self.ai.last_answer = Some(crate::ai::EMPTY_SUMMARY_MESSAGE.to_string());
            self.ai.show_answer = true;
            return;
        }
        self.dispatch_generation(GenerationTask::Summarize { excerpts });
    }

    /// Dispatches one generation task on a background worker.
    ///
    /// Each dispatch bumps the sequence counter and restarts the staging
    /// cycle, so a response from an older request can never be told apart
    /// from the current one by accident: outcomes carry their sequence and
    /// only the latest is applied.
    fn dispatch_generation(&mut self, task: GenerationTask) {
        if self.ai.settings.endpoint.trim().is_empty() {
            self.notice =
                Some("Set a generation endpoint in the AI Assistant section first.".to_string());
            return;
        }

        self.ai.seq += 1;
        let seq = self.ai.seq;
        self.ai.in_flight = Some(seq);
        // A new generation starts a new staging cycle
        self.store.clear_staged_map_data();

        #[cfg(not(target_arch = "wasm32"))]
        {
            let endpoint = self.ai.settings.endpoint.clone();
            let sender = self.ai.sender.clone();
            tokio::task::spawn_blocking(move || {
                let result = run_generation_task(task, endpoint);
                if let Some(tx) = sender {
                    let _ = tx.send(GenerationOutcome { seq, result });
                }
            });
        }

        #[cfg(target_arch = "wasm32")]
        {
            let _ = task;
            if let Some(tx) = &self.ai.sender {
                let _ = tx.send(GenerationOutcome {
                    seq,
                    result: Err(GenerationError::ServiceFailure(
                        "AI generation is only available in the desktop build.".to_string(),
                    )),
                });
            }
        }
    }

    /// Drains completed generations and applies the latest one as a single
    /// store update; stale outcomes are discarded.
    fn handle_generation_results(&mut self) {
        let mut outcomes = Vec::new();
        if let Some(receiver) = &self.ai.receiver {
            while let Ok(outcome) = receiver.try_recv() {
                outcomes.push(outcome);
            }
        }
        for outcome in outcomes {
            if self.ai.in_flight != Some(outcome.seq) {
                log::debug!("discarding stale generation result (seq {})", outcome.seq);
                continue;
            }
            self.ai.in_flight = None;
            match outcome.result {
                Ok(GenerationPayload::Candidates(data)) => {
                    if data.is_empty() {
                        self.notice = Some("The AI returned no suggestions.".to_string());
                    } else {
                        self.store.set_staged_map_data(data);
                    }
                }
                Ok(GenerationPayload::Answer(answer))
                | Ok(GenerationPayload::Summary(answer)) => {
                    self.ai.last_answer = Some(answer);
                    self.ai.show_answer = true;
                    self.ai.question_text.clear();
                }
                Err(err) => {
                    // The staging cycle stays Empty; only the notice surfaces
                    self.notice = Some(err.to_string());
                    log::warn!("generation failed: {err}");
                }
            }
        }
    }
}

// Test module for headless egui-driven UI unit tests.
// Placed inside the `ui` module so tests can access private methods like
// `draw_canvas` and `handle_undo_redo_keys` without exposing them publicly.
#[cfg(test)]
mod tests;
