//! Application state management structures.
//!
//! This module contains all the state structures that track the application's
//! current UI state, including canvas navigation, user interactions, context
//! menus, file operations, AI generation flows, and the map library.

use crate::ai::{GenerationError, GenerationPayload};
use crate::layout::ArrangeMode;
use crate::persistence::{InMemoryMapStore, Submission};
use crate::store::GraphStore;
use crate::types::*;
use eframe::egui;
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{channel, Receiver, Sender};
use uuid::Uuid;

/// State related to canvas navigation and display.
///
/// Tracks the current pan offset, zoom level, and display options for the canvas.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasState {
    /// Current canvas pan offset for navigation (in screen space)
    #[serde(skip)]
    pub offset: egui::Vec2,
    /// Current zoom level (1.0 = normal, 2.0 = 2x zoom, 0.5 = 50% zoom)
    pub zoom_factor: f32,
    /// Whether the grid should be displayed on the canvas
    pub show_grid: bool,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            offset: egui::Vec2::ZERO,
            zoom_factor: 1.0,
            show_grid: true,
        }
    }
}

/// State related to user interactions with nodes and the canvas.
///
/// Tracks selection, dragging, editing, and edge drawing operations.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionState {
    /// Currently selected node ID, if exactly one node is selected
    #[serde(skip)]
    pub selected_node: Option<NodeId>,
    /// Currently selected multiple nodes (if empty, no node selected)
    #[serde(skip)]
    pub selected_nodes: Vec<NodeId>,
    /// Currently selected edge, if any
    #[serde(skip)]
    pub selected_edge: Option<EdgeId>,
    /// Node currently being edited for label changes
    #[serde(skip)]
    pub editing_node_label: Option<NodeId>,
    /// Temporary storage for node label while editing
    #[serde(skip)]
    pub temp_node_label: String,
    /// Temporary storage for node details while editing
    #[serde(skip)]
    pub temp_node_details: String,
    /// Temporary storage for node kind while editing
    #[serde(skip)]
    pub temp_node_kind: String,
    /// Track which node's fields are loaded into the temp editors
    #[serde(skip)]
    pub temp_fields_node: Option<NodeId>,
    /// Temporary storage for the selected edge's label
    #[serde(skip)]
    pub temp_edge_label: String,
    /// Track which edge's label is loaded into the temp editor
    #[serde(skip)]
    pub temp_label_edge: Option<EdgeId>,
    /// Flag indicating text should be selected in the label field
    #[serde(skip)]
    pub should_select_text: bool,
    /// Node currently being dragged by the user
    #[serde(skip)]
    pub dragging_node: Option<NodeId>,
    /// Original node position before drag started (for the undo snapshot)
    #[serde(skip)]
    pub drag_original_position: Option<(f32, f32)>,
    /// Original positions for multi-node drag (for the undo snapshot)
    #[serde(skip)]
    pub drag_original_positions_multi: Vec<(NodeId, (f32, f32))>,
    /// Live positions of nodes mid-drag; applied to the store as one
    /// operation when the drag ends
    #[serde(skip)]
    pub drag_live_positions: std::collections::HashMap<NodeId, (f32, f32)>,
    /// Offset from mouse to node center during dragging
    #[serde(skip)]
    pub node_drag_offset: egui::Vec2,
    /// Whether the user is currently panning the canvas
    #[serde(skip)]
    pub is_panning: bool,
    /// Last mouse position during panning operation
    #[serde(skip)]
    pub last_pan_pos: Option<egui::Pos2>,
    /// Marquee selection state: start and current end positions in screen space
    #[serde(skip)]
    pub marquee_start: Option<egui::Pos2>,
    #[serde(skip)]
    pub marquee_end: Option<egui::Pos2>,
    /// Whether the current marquee adds to the existing selection (Shift-held)
    #[serde(skip)]
    pub marquee_additive: bool,
    /// Node from which an edge is being drawn (shift-click drag)
    #[serde(skip)]
    pub drawing_edge_from: Option<NodeId>,
    /// Current mouse position while drawing an edge
    #[serde(skip)]
    pub edge_draw_pos: Option<egui::Pos2>,
    /// Pending shift-press on a node that becomes an edge once dragged beyond
    /// the click threshold
    #[serde(skip)]
    pub pending_shift_edge_from: Option<NodeId>,
    /// Start screen position for the pending shift-edge gesture
    #[serde(skip)]
    pub pending_shift_start_screen_pos: Option<egui::Pos2>,
}

impl Default for InteractionState {
    fn default() -> Self {
        Self {
            selected_node: None,
            selected_nodes: Vec::new(),
            selected_edge: None,
            editing_node_label: None,
            temp_node_label: String::new(),
            temp_node_details: String::new(),
            temp_node_kind: String::new(),
            temp_fields_node: None,
            temp_edge_label: String::new(),
            temp_label_edge: None,
            should_select_text: false,
            dragging_node: None,
            drag_original_position: None,
            drag_original_positions_multi: Vec::new(),
            drag_live_positions: std::collections::HashMap::new(),
            node_drag_offset: egui::Vec2::ZERO,
            is_panning: false,
            last_pan_pos: None,
            marquee_start: None,
            marquee_end: None,
            marquee_additive: false,
            drawing_edge_from: None,
            edge_draw_pos: None,
            pending_shift_edge_from: None,
            pending_shift_start_screen_pos: None,
        }
    }
}

/// State related to context menu display and interaction.
///
/// Manages the right-click context menu for creating nodes and launching AI
/// flows on an existing node.
#[derive(Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ContextMenuState {
    /// Whether the context menu is currently visible
    #[serde(skip)]
    pub show: bool,
    /// Screen position where the context menu should appear
    #[serde(skip)]
    pub screen_pos: (f32, f32),
    /// World position where nodes should be created from the context menu
    #[serde(skip)]
    pub world_pos: (f32, f32),
    /// Node the menu was opened on, if any (enables the AI actions)
    #[serde(skip)]
    pub target_node: Option<NodeId>,
    /// Flag to prevent the context menu from closing immediately after opening
    #[serde(skip)]
    pub just_opened: bool,
}

/// Messages sent from async file/upload operations back to the main app.
#[derive(Debug)]
pub enum FileOperationResult {
    /// Save operation completed successfully with the given path
    SaveCompleted(String),
    /// Load operation completed successfully with path and content
    LoadCompleted(String, String),
    /// An uploaded archive was stored and recorded
    ArchiveStored(Submission),
    /// Operation failed with an error message
    OperationFailed(String),
}

/// Represents a pending save operation type.
#[derive(Debug)]
pub enum PendingSaveOperation {
    /// Save with a new file path (show file picker)
    SaveAs,
    /// Save to the existing file path
    Save,
}

/// Represents a pending load operation type.
#[derive(Debug)]
pub enum PendingLoadOperation {
    /// Load a map from a file (show file picker)
    Load,
    /// Pick a project archive and store it as a submission
    UploadArchive,
}

/// Pending confirmation actions that may require user approval due to unsaved changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingConfirmAction {
    /// User is attempting to create a new map
    New,
    /// User is attempting to open a map file
    Open,
    /// User is attempting to quit the application
    Quit,
}

/// State related to file operations and persistence.
///
/// Manages file paths, unsaved changes tracking, and async file operations.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct FileState {
    /// Current file path for save/load operations
    #[serde(skip)]
    pub current_path: Option<String>,
    /// Flag indicating if the map has unsaved changes
    #[serde(skip)]
    pub has_unsaved_changes: bool,
    /// Pending file operations for WASM compatibility
    #[serde(skip)]
    pub pending_save_operation: Option<PendingSaveOperation>,
    #[serde(skip)]
    pub pending_load_operation: Option<PendingLoadOperation>,
    /// Channel for receiving file operation results from async contexts
    #[serde(skip)]
    pub file_operation_sender: Option<Sender<FileOperationResult>>,
    #[serde(skip)]
    pub file_operation_receiver: Option<Receiver<FileOperationResult>>,
    /// Whether to show an unsaved-changes confirmation dialog
    #[serde(skip)]
    pub show_unsaved_dialog: bool,
    /// The action the user attempted that requires confirmation (e.g., New or Quit)
    #[serde(skip)]
    pub pending_confirm_action: Option<PendingConfirmAction>,
    /// One-shot flag to allow the next close request to proceed after user confirmation (native only)
    #[serde(skip)]
    pub allow_close_on_next_request: bool,
}

impl Default for FileState {
    fn default() -> Self {
        let (sender, receiver) = channel();
        Self {
            current_path: None,
            has_unsaved_changes: false,
            pending_save_operation: None,
            pending_load_operation: None,
            file_operation_sender: Some(sender),
            file_operation_receiver: Some(receiver),
            show_unsaved_dialog: false,
            pending_confirm_action: None,
            allow_close_on_next_request: false,
        }
    }
}

/// Outcome of one background generation task, correlated by sequence number.
#[derive(Debug)]
pub struct GenerationOutcome {
    /// Sequence number the task was dispatched with
    pub seq: u64,
    /// The normalized payload, or the error to surface
    pub result: Result<GenerationPayload, GenerationError>,
}

/// Persisted AI configuration.
#[derive(Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AiSettings {
    /// Generation endpoint URL; empty disables AI flows
    pub endpoint: String,
}

/// State for the AI generation flows.
///
/// A sequence number correlates in-flight requests with the staging cycle
/// they belong to: only the outcome matching the latest dispatched sequence
/// is applied, so stale responses never overwrite newer staged data.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct AiState {
    /// Persisted settings
    pub settings: AiSettings,
    /// Sequence counter for dispatched generation requests
    #[serde(skip)]
    pub seq: u64,
    /// Sequence of the request currently in flight, if any
    #[serde(skip)]
    pub in_flight: Option<u64>,
    /// Channel for receiving completed generations
    #[serde(skip)]
    pub sender: Option<Sender<GenerationOutcome>>,
    #[serde(skip)]
    pub receiver: Option<Receiver<GenerationOutcome>>,
    /// Latest answer or summary, shown in the floater window
    #[serde(skip)]
    pub last_answer: Option<String>,
    /// Whether the answer floater is open
    #[serde(skip)]
    pub show_answer: bool,
    /// Temporary storage for the question box
    #[serde(skip)]
    pub question_text: String,
    /// Whether the extract-concepts dialog is open
    #[serde(skip)]
    pub show_extract_dialog: bool,
    /// Temporary storage for the extract-concepts text area
    #[serde(skip)]
    pub extract_text: String,
}

impl Default for AiState {
    fn default() -> Self {
        let (sender, receiver) = channel();
        Self {
            settings: AiSettings::default(),
            seq: 0,
            in_flight: None,
            sender: Some(sender),
            receiver: Some(receiver),
            last_answer: None,
            show_answer: false,
            question_text: String::new(),
            show_extract_dialog: false,
            extract_text: String::new(),
        }
    }
}

/// State for the map library and archive submissions, backed by the
/// persistence boundary traits.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryState {
    /// Stable owner id for maps saved from this install
    pub owner: UserId,
    /// Temporary storage for the save-to-library name field
    #[serde(skip)]
    pub save_name: String,
    /// Whether maps saved to the library are public
    #[serde(skip)]
    pub save_public: bool,
    /// In-memory library backend
    #[serde(skip)]
    pub maps: InMemoryMapStore,
    /// Archive submissions recorded this session
    #[serde(skip)]
    pub submissions: Vec<Submission>,
}

impl Default for LibraryState {
    fn default() -> Self {
        Self {
            owner: Uuid::new_v4(),
            save_name: String::new(),
            save_public: false,
            maps: InMemoryMapStore::new(),
            submissions: Vec::new(),
        }
    }
}

/// The main application structure containing UI state and the graph store.
///
/// This struct implements the `eframe::App` trait and handles all user
/// interface rendering and interaction logic. All map mutation funnels
/// through the store's operation set.
#[derive(Serialize, Deserialize)]
#[serde(default)]
pub struct CodeMapApp {
    /// The graph store holding the active map and its editing buffers
    pub store: GraphStore,
    /// Display name of the active map
    pub map_name: String,
    /// Counter for generating unique default node labels
    pub node_counter: u32,
    /// Canvas navigation and display state
    pub canvas: CanvasState,
    /// User interaction state
    pub interaction: InteractionState,
    /// Context menu state
    pub context_menu: ContextMenuState,
    /// File operations state
    pub file: FileState,
    /// AI generation state
    pub ai: AiState,
    /// Map library and submissions state
    pub library: LibraryState,
    /// Selected arrangement mode for the layout-preview button
    pub arrange_mode: ArrangeMode,
    /// One-line notice shown to the user; only typed error kinds land here
    #[serde(skip)]
    pub notice: Option<String>,
    /// Whether dark mode visuals are enabled
    pub dark_mode: bool,
    /// Remembered width of the properties panel across sessions
    pub properties_panel_width: f32,
    /// Persisted last known window inner size in logical points (desktop only)
    pub window_inner_size: Option<(f32, f32)>,
    /// Whether we've already applied the stored window geometry this session
    #[serde(skip)]
    pub applied_viewport_restore: bool,
}

impl Default for CodeMapApp {
    fn default() -> Self {
        Self {
            store: GraphStore::new(),
            map_name: "Untitled Map".to_string(),
            node_counter: 0,
            canvas: CanvasState::default(),
            interaction: InteractionState::default(),
            context_menu: ContextMenuState::default(),
            file: FileState::default(),
            ai: AiState::default(),
            library: LibraryState::default(),
            arrange_mode: ArrangeMode::ForceDirected,
            notice: None,
            dark_mode: true,
            properties_panel_width: 320.0,
            window_inner_size: None,
            applied_viewport_restore: false,
        }
    }
}

impl CodeMapApp {
    /// Serializes the application state to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserializes application state from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
