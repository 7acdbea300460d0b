//! # CodeMap Studio
//!
//! A concept-map editor for exploring codebases and course material. Maps are
//! graphs of labeled concept nodes and relations; an AI assistant can propose
//! additions which land in a staging buffer and only become part of the map
//! when the user accepts them.
//!
//! ## Features
//! - Interactive concept creation, selection, and repositioning
//! - AI-assisted expansion, extraction, relation suggestions, Q&A, summaries
//! - Staged suggestions rendered distinctly and committed atomically
//! - Layout previews (force-directed, grid, line) applied only on accept
//! - Snapshot-based undo/redo over committed mutations
//! - Map library and project-archive submissions behind storage seams
//! - Canvas panning, zooming, grid snapping, and marquee selection

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod ai;
pub mod constants;
pub mod layout;
pub mod persistence;
pub mod samples;
pub mod store;
pub mod types;
mod ui;

// Re-export the model and the app entry point
pub use types::*;
pub use ui::CodeMapApp;

/// Runs the concept-map application with default settings.
///
/// This function initializes the egui application window and starts the main
/// event loop. On native builds it also starts the async runtime used for
/// file dialogs, archive uploads, and AI generation calls.
///
/// # Returns
///
/// Returns `Ok(())` if the application runs successfully, or an
/// `eframe::Error` if initialization fails.
///
/// # Example
///
/// ```no_run
/// use codemap_studio::run_app;
///
/// fn main() -> Result<(), eframe::Error> {
///     run_app()
/// }
/// ```
pub fn run_app() -> Result<(), eframe::Error> {
    // Background work (dialogs, uploads, generation calls) runs on tokio;
    // entering the runtime here makes spawn available from UI callbacks.
    #[cfg(not(target_arch = "wasm32"))]
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to create async runtime");
    #[cfg(not(target_arch = "wasm32"))]
    let _guard = runtime.enter();

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "CodeMap Studio",
        options,
        Box::new(|cc| {
            let app = cc
                .storage
                .and_then(|storage| storage.get_string("app_state"))
                .and_then(|json| CodeMapApp::from_json(&json).ok())
                .unwrap_or_default();
            Ok(Box::new(app))
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_data_default() {
        let data = MapData::default();
        assert!(data.nodes.is_empty());
        assert!(data.edges.is_empty());
        assert!(data.is_empty());
    }

    #[test]
    fn test_node_creation_reexport() {
        let node = ConceptNode::new("Traits", (10.0, 20.0), "concept");
        assert_eq!(node.label, "Traits");
        assert_eq!(node.position, (10.0, 20.0));
    }
}
