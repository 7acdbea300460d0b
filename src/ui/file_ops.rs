//! File operations for saving and loading maps and uploading project
//! archives.
//!
//! This module handles all file I/O including native file dialogs and
//! WASM-compatible browser-based operations. Map documents travel as
//! `MapData` JSON; archives go through the archive-store boundary and are
//! recorded as submissions without ever being parsed.

use super::state::{
    CodeMapApp, FileOperationResult, PendingLoadOperation, PendingSaveOperation,
};
use crate::types::MapData;
use eframe::egui;

#[cfg(not(target_arch = "wasm32"))]
use crate::persistence::{ArchiveStore, LocalArchiveStore, Submission};

impl CodeMapApp {
    /// Handles pending file operations for both native and WASM platforms.
    ///
    /// Processes completed async operations from the channel and initiates
    /// newly requested ones.
    ///
    /// # Arguments
    ///
    /// * `ctx` - The egui context for requesting repaints
    pub fn handle_pending_operations(&mut self, ctx: &egui::Context) {
        // First, drain any completed operations from the channel
        let mut completed = Vec::new();
        if let Some(receiver) = &self.file.file_operation_receiver {
            while let Ok(result) = receiver.try_recv() {
                completed.push(result);
            }
        }
        for result in completed {
            match result {
                FileOperationResult::SaveCompleted(path) => {
                    self.file.current_path = Some(path);
                    self.file.has_unsaved_changes = false;
                    log::info!("map saved");
                }
                FileOperationResult::LoadCompleted(path, content) => {
                    match MapData::from_json(&content) {
                        Ok(data) => {
                            self.store.load_map(data);
                            self.map_name = map_name_from_path(&path);
                            self.file.current_path = Some(path);
                            self.file.has_unsaved_changes = false;
                            self.interaction.selected_node = None;
                            self.interaction.selected_nodes.clear();
                            self.interaction.selected_edge = None;
                            self.interaction.editing_node_label = None;
                            self.node_counter = self.store.map().nodes.len() as u32;
                            log::info!("map loaded");
                        }
                        Err(e) => {
                            self.notice = Some(format!("Could not read map file: {e}"));
                            log::error!("failed to parse map file: {e}");
                        }
                    }
                }
                FileOperationResult::ArchiveStored(submission) => {
                    log::info!(
                        "archive '{}' stored at {}",
                        submission.file_name,
                        submission.storage_path
                    );
                    self.library.submissions.push(submission);
                }
                FileOperationResult::OperationFailed(error) => {
                    self.notice = Some(error.clone());
                    log::error!("file operation failed: {error}");
                }
            }
        }

        // Initiate a requested save
        if let Some(save_op) = self.file.pending_save_operation.take() {
            let ctx = ctx.clone();
            let map_json = self.store.map().to_json().unwrap_or_default();
            let sender = self.file.file_operation_sender.clone();

            match save_op {
                PendingSaveOperation::SaveAs => {
                    let file_name = format!("{}.json", self.map_name.replace(' ', "_"));

                    #[cfg(target_arch = "wasm32")]
                    {
                        // Synchronous download for Firefox compatibility
                        match Self::trigger_download(&file_name, &map_json) {
                            Ok(_) => {
                                if let Some(tx) = sender {
                                    let _ = tx.send(FileOperationResult::SaveCompleted(file_name));
                                }
                            }
                            Err(e) => {
                                if let Some(tx) = sender {
                                    let _ = tx.send(FileOperationResult::OperationFailed(e));
                                }
                            }
                        }
                        ctx.request_repaint();
                    }

                    #[cfg(not(target_arch = "wasm32"))]
                    {
                        tokio::spawn(async move {
                            if let Some(handle) = rfd::AsyncFileDialog::new()
                                .add_filter("JSON", &["json"])
                                .set_file_name(&file_name)
                                .save_file()
                                .await
                            {
                                let path = handle.path();
                                let result = match std::fs::write(path, map_json) {
                                    Ok(_) => FileOperationResult::SaveCompleted(
                                        path.display().to_string(),
                                    ),
                                    Err(e) => FileOperationResult::OperationFailed(format!(
                                        "Failed to save map: {e}"
                                    )),
                                };
                                if let Some(tx) = sender {
                                    let _ = tx.send(result);
                                }
                            }
                            ctx.request_repaint();
                        });
                    }
                }
                PendingSaveOperation::Save => {
                    if let Some(path) = self.file.current_path.clone() {
                        #[cfg(not(target_arch = "wasm32"))]
                        {
                            tokio::spawn(async move {
                                let result = match std::fs::write(&path, map_json) {
                                    Ok(_) => FileOperationResult::SaveCompleted(path),
                                    Err(e) => FileOperationResult::OperationFailed(format!(
                                        "Failed to save map: {e}"
                                    )),
                                };
                                if let Some(tx) = sender {
                                    let _ = tx.send(result);
                                }
                                ctx.request_repaint();
                            });
                        }

                        #[cfg(target_arch = "wasm32")]
                        {
                            // Browsers cannot re-save to a path without user
                            // interaction; fall back to Save As
                            self.file.pending_save_operation = Some(PendingSaveOperation::SaveAs);
                        }
                    } else {
                        self.file.pending_save_operation = Some(PendingSaveOperation::SaveAs);
                    }
                }
            }
        }

        // Initiate a requested load or archive upload
        if let Some(load_op) = self.file.pending_load_operation.take() {
            match load_op {
                PendingLoadOperation::Load => self.start_map_load(ctx),
                PendingLoadOperation::UploadArchive => self.start_archive_upload(ctx),
            }
        }
    }

    /// Opens a picker and loads the chosen map file.
    fn start_map_load(&mut self, ctx: &egui::Context) {
        let ctx = ctx.clone();
        let sender = self.file.file_operation_sender.clone();

        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(async move {
                match Self::show_open_file_picker().await {
                    Some(file) => {
                        let filename = file.name();
                        match Self::read_file(file).await {
                            Ok(content) => {
                                if let Some(tx) = sender {
                                    let _ = tx
                                        .send(FileOperationResult::LoadCompleted(filename, content));
                                }
                            }
                            Err(e) => {
                                if let Some(tx) = sender {
                                    let _ = tx.send(FileOperationResult::OperationFailed(e));
                                }
                            }
                        }
                    }
                    None => {
                        log::warn!("open dialog cancelled or API not supported");
                    }
                }
                ctx.request_repaint();
            });
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            tokio::spawn(async move {
                if let Some(handle) = rfd::AsyncFileDialog::new()
                    .add_filter("JSON", &["json"])
                    .pick_file()
                    .await
                {
                    let path = handle.path();
                    let result = match std::fs::read_to_string(path) {
                        Ok(json) => {
                            FileOperationResult::LoadCompleted(path.display().to_string(), json)
                        }
                        Err(e) => {
                            FileOperationResult::OperationFailed(format!("Failed to read map: {e}"))
                        }
                    };
                    if let Some(tx) = sender {
                        let _ = tx.send(result);
                    }
                }
                ctx.request_repaint();
            });
        }
    }

    /// Opens a picker for a project archive, stores it through the archive
    /// boundary, and records the submission. Native builds only; the browser
    /// build surfaces a notice instead.
    fn start_archive_upload(&mut self, ctx: &egui::Context) {
        #[cfg(target_arch = "wasm32")]
        {
            let _ = ctx;
            self.notice =
                Some("Project upload is only available in the desktop build.".to_string());
        }

        #[cfg(not(target_arch = "wasm32"))]
        {
            let ctx = ctx.clone();
            let sender = self.file.file_operation_sender.clone();
            tokio::spawn(async move {
                if let Some(handle) = rfd::AsyncFileDialog::new()
                    .add_filter("Archives", &["zip", "tar", "gz", "tgz"])
                    .pick_file()
                    .await
                {
                    let path = handle.path().to_path_buf();
                    let file_name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_else(|| "archive".to_string());
                    let result = match std::fs::read(&path) {
                        Ok(bytes) => {
                            let root = std::env::temp_dir().join("codemap-studio-uploads");
                            let mut store = LocalArchiveStore::new(root);
                            match store.store_archive(&file_name, &bytes) {
                                Ok(storage_path) => FileOperationResult::ArchiveStored(
                                    Submission::new(file_name, bytes.len() as u64, storage_path),
                                ),
                                Err(e) => FileOperationResult::OperationFailed(e.to_string()),
                            }
                        }
                        Err(e) => FileOperationResult::OperationFailed(format!(
                            "Failed to read archive: {e}"
                        )),
                    };
                    if let Some(tx) = sender {
                        let _ = tx.send(result);
                    }
                }
                ctx.request_repaint();
            });
        }
    }

    /// Triggers a file download in the browser (WASM only, Firefox-compatible).
    ///
    /// Creates a temporary anchor element with a blob URL and triggers a download.
    #[cfg(target_arch = "wasm32")]
    fn trigger_download(filename: &str, content: &str) -> Result<(), String> {
        use wasm_bindgen::JsCast;

        let window = web_sys::window().ok_or("No window found")?;
        let document = window.document().ok_or("No document found")?;

        let blob_parts = js_sys::Array::new();
        blob_parts.push(&wasm_bindgen::JsValue::from_str(content));

        let mut blob_options = web_sys::BlobPropertyBag::new();
        blob_options.type_("application/json");

        let blob = web_sys::Blob::new_with_str_sequence_and_options(&blob_parts, &blob_options)
            .map_err(|_| "Failed to create blob")?;

        let url = web_sys::Url::create_object_url_with_blob(&blob)
            .map_err(|_| "Failed to create object URL")?;

        let anchor = document
            .create_element("a")
            .map_err(|_| "Failed to create anchor element")?
            .dyn_into::<web_sys::HtmlAnchorElement>()
            .map_err(|_| "Failed to cast to anchor element")?;

        anchor.set_href(&url);
        anchor.set_download(filename);
        anchor.style().set_property("display", "none").ok();

        document
            .body()
            .ok_or("No body found")?
            .append_child(&anchor)
            .map_err(|_| "Failed to append anchor")?;

        anchor.click();

        document
            .body()
            .ok_or("No body found")?
            .remove_child(&anchor)
            .map_err(|_| "Failed to remove anchor")?;

        web_sys::Url::revoke_object_url(&url).map_err(|_| "Failed to revoke object URL")?;

        Ok(())
    }

    /// Opens a file picker dialog in the browser (WASM only, Firefox-compatible).
    ///
    /// Creates a temporary file input element and waits for the user to select a file.
    #[cfg(target_arch = "wasm32")]
    async fn show_open_file_picker() -> Option<web_sys::File> {
        use wasm_bindgen::closure::Closure;
        use wasm_bindgen::JsCast;

        let window = web_sys::window()?;
        let document = window.document()?;

        let input = document
            .create_element("input")
            .ok()?
            .dyn_into::<web_sys::HtmlInputElement>()
            .ok()?;

        input.set_type("file");
        input.set_accept(".json,application/json");
        input.style().set_property("display", "none").ok()?;

        let (sender, receiver) = futures::channel::oneshot::channel::<Option<web_sys::File>>();
        let sender = std::rc::Rc::new(std::cell::RefCell::new(Some(sender)));

        let onchange = Closure::wrap(Box::new(move |event: web_sys::Event| {
            let input = event
                .target()
                .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok());

            if let Some(input) = input {
                let file = input.files().and_then(|files| files.get(0));
                if let Some(sender) = sender.borrow_mut().take() {
                    let _ = sender.send(file);
                }
            }
        }) as Box<dyn FnMut(_)>);

        input.set_onchange(Some(onchange.as_ref().unchecked_ref()));
        onchange.forget();

        document.body()?.append_child(&input).ok()?;
        input.click();

        let file = receiver.await.ok()??;

        document.body()?.remove_child(&input).ok()?;

        Some(file)
    }

    /// Reads content from a File object (WASM only).
    ///
    /// Uses the FileReader API to asynchronously read the file contents as text.
    #[cfg(target_arch = "wasm32")]
    async fn read_file(file: web_sys::File) -> Result<String, String> {
        use wasm_bindgen::JsCast;
        use wasm_bindgen::JsValue;

        let file_reader =
            web_sys::FileReader::new().map_err(|_| "Failed to create FileReader".to_string())?;

        let promise = js_sys::Promise::new(&mut |resolve, reject| {
            let reader = file_reader.clone();

            let onload = wasm_bindgen::closure::Closure::wrap(Box::new(
                move |_event: web_sys::ProgressEvent| {
                    if let Ok(result) = reader.result() {
                        let _ = resolve.call1(&JsValue::NULL, &result);
                    }
                },
            )
                as Box<dyn FnMut(_)>);

            file_reader.set_onload(Some(onload.as_ref().unchecked_ref()));
            onload.forget();

            let onerror = wasm_bindgen::closure::Closure::wrap(Box::new(
                move |_event: web_sys::ProgressEvent| {
                    let _ = reject.call1(&JsValue::NULL, &JsValue::from_str("Failed to read file"));
                },
            )
                as Box<dyn FnMut(_)>);

            file_reader.set_onerror(Some(onerror.as_ref().unchecked_ref()));
            onerror.forget();
        });

        file_reader
            .read_as_text(&file)
            .map_err(|_| "Failed to start reading file".to_string())?;

        let result = wasm_bindgen_futures::JsFuture::from(promise)
            .await
            .map_err(|e| format!("Failed to read file: {e:?}"))?;

        result
            .as_string()
            .ok_or_else(|| "File content is not a string".to_string())
    }

    /// Opens a file dialog to save the map with a new name.
    pub fn save_as_map(&mut self) {
        self.file.pending_save_operation = Some(PendingSaveOperation::SaveAs);
    }

    /// Saves the map to the current file path, or triggers "Save As" if no path is set.
    pub fn save_map(&mut self) {
        if self.file.current_path.is_some() {
            self.file.pending_save_operation = Some(PendingSaveOperation::Save);
        } else {
            self.save_as_map();
        }
    }

    /// Opens a file dialog to load a map from disk or browser storage.
    pub fn open_map(&mut self) {
        self.file.pending_load_operation = Some(PendingLoadOperation::Load);
    }

    /// Opens a file dialog to upload a project archive as a submission.
    pub fn upload_archive(&mut self) {
        self.file.pending_load_operation = Some(PendingLoadOperation::UploadArchive);
    }

    /// Creates a new empty map, resetting all editor state.
    pub fn new_map(&mut self) {
        self.store.load_map(MapData::new());
        self.map_name = "Untitled Map".to_string();
        self.file.current_path = None;
        self.file.has_unsaved_changes = false;
        self.interaction.selected_node = None;
        self.interaction.selected_nodes.clear();
        self.interaction.selected_edge = None;
        self.interaction.editing_node_label = None;
        self.node_counter = 0;
        self.canvas.offset = egui::Vec2::ZERO;
        self.canvas.zoom_factor = 1.0;
    }
}

/// Derives a human-friendly map name from a file path.
fn map_name_from_path(path: &str) -> String {
    std::path::Path::new(path)
        .file_stem()
        .map(|s| s.to_string_lossy().replace('_', " "))
        .unwrap_or_else(|| "Untitled Map".to_string())
}
