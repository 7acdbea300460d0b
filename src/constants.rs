//! Shared application-wide constants.
//! Centralizes tweakable values used across the store, layout engine, and UI.

// Node dimensions
/// Default node width in world units.
pub const NODE_WIDTH: f32 = 140.0;
/// Default node height in world units.
pub const NODE_HEIGHT: f32 = 60.0;

// Grid/drawing
/// Grid cell size in world units.
pub const GRID_SIZE: f32 = 20.0;

// Canvas interactions
/// Click threshold in world units used for distinguishing click vs drag.
pub const CLICK_THRESHOLD: f32 = 10.0;

// Undo/redo
/// Maximum number of undo snapshots to retain.
pub const MAX_UNDO_HISTORY: usize = 100;

// Diagnostics
/// Maximum number of debug log entries retained by the store.
pub const DEBUG_LOG_CAP: usize = 256;

// Layout
/// Horizontal spacing between columns when arranging nodes in a grid.
pub const LAYOUT_COLUMN_SPACING: f32 = 200.0;
/// Vertical spacing between rows when arranging nodes in a grid.
pub const LAYOUT_ROW_SPACING: f32 = 120.0;
/// Radius used when placing AI-proposed nodes in a ring around their origin.
pub const SUGGESTION_RING_RADIUS: f32 = 220.0;
