//! HTTP route handlers for the PDF combiner web application.
//!
//! All routes return either HTML (for HTMX consumption) or binary data (images, PDFs).
//! HTML routes use Askama templates from the `templates` module. Every action
//! on the page list or the editor answers with the editor fragment, which
//! carries the page list out of band.

mod editor;
mod export;
mod images;
mod list;
mod pages;
mod sources;

pub use editor::{
    add_text, close_editor, delete_text, drag_text, edit_text, revert_editor, set_color,
    set_font, set_scale,
};
pub use export::{download_pdf, export_to_path};
pub use images::{page_image, thumbnail};
pub use list::{clear_pages, move_down, move_up, remove_selected, select_entry};
pub use pages::{editor_view, index, page_list, workspace};
pub use sources::{open_path, upload_more, upload_new};

use askama::Template;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    response::Response,
    routing::{get, post},
};
use pdf_combiner_core::{Error, OverlayEditor, PageModel, Result as CoreResult};
use serde::Deserialize as SerdeDeserialize;
use std::sync::Arc;
use tracing::debug;

use crate::helpers::{ResultExt, RouteResult, Toast, fragment, toast_only};
use crate::state::{AppState, Session};
use crate::templates::{EditorTemplate, PageListTemplate, page_items};

/// Upload size limit (all files of one request).
const MAX_UPLOAD_BYTES: usize = 300 * 1024 * 1024;

/// Application routes, without static files and middleware.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Pages
        .route("/", get(index))
        .route("/s/{session_id}", get(workspace))
        // Loading sources
        .route("/api/upload", post(upload_new))
        .route("/api/{session_id}/upload", post(upload_more))
        .route("/api/{session_id}/open", post(open_path))
        // Page list
        .route("/api/{session_id}/list", get(page_list))
        .route("/api/{session_id}/list/{entry}/select", post(select_entry))
        .route("/api/{session_id}/list/move-up", post(move_up))
        .route("/api/{session_id}/list/move-down", post(move_down))
        .route("/api/{session_id}/list/remove", post(remove_selected))
        .route("/api/{session_id}/list/clear", post(clear_pages))
        // Overlay editor
        .route("/api/{session_id}/editor", get(editor_view))
        .route("/api/{session_id}/editor/scale", post(set_scale))
        .route("/api/{session_id}/editor/add", post(add_text))
        .route("/api/{session_id}/editor/drag", post(drag_text))
        .route("/api/{session_id}/editor/text", post(edit_text))
        .route("/api/{session_id}/editor/font", post(set_font))
        .route("/api/{session_id}/editor/color", post(set_color))
        .route("/api/{session_id}/editor/delete", post(delete_text))
        .route("/api/{session_id}/editor/revert", post(revert_editor))
        .route("/api/{session_id}/editor/close", post(close_editor))
        // Binary responses
        .route("/api/{session_id}/thumb/{entry}", get(thumbnail))
        .route("/api/{session_id}/page/{entry}", get(page_image))
        .route("/api/{session_id}/download", get(download_pdf))
        .route("/api/{session_id}/export", post(export_to_path))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

// =============================================================================
// Forms
// =============================================================================

/// A server-local path (open a source, or export destination).
#[derive(SerdeDeserialize)]
pub struct PathForm {
    pub path: String,
}

/// Optional canvas point in editor pixels.
#[derive(SerdeDeserialize, Default)]
pub struct PointForm {
    #[serde(default)]
    pub x: Option<f32>,
    #[serde(default)]
    pub y: Option<f32>,
}

/// A finished drag: where the record was grabbed and where it was dropped.
#[derive(SerdeDeserialize)]
pub struct DragForm {
    pub record: u64,
    pub grab_x: f32,
    pub grab_y: f32,
    pub drop_x: f32,
    pub drop_y: f32,
}

/// Double-click edit at a canvas point.
#[derive(SerdeDeserialize)]
pub struct TextForm {
    pub x: f32,
    pub y: f32,
    pub text: String,
}

/// Font change from the context menu. Checkboxes are only sent when checked.
#[derive(SerdeDeserialize)]
pub struct FontForm {
    pub record: u64,
    pub family: String,
    pub size: f32,
    #[serde(default)]
    pub bold: Option<String>,
    #[serde(default)]
    pub italic: Option<String>,
}

#[derive(SerdeDeserialize)]
pub struct ColorForm {
    pub record: u64,
    pub color: String,
}

#[derive(SerdeDeserialize)]
pub struct RecordForm {
    pub record: u64,
}

#[derive(SerdeDeserialize)]
pub struct ScaleForm {
    pub scale: f32,
}

/// Query params for the editor background image.
#[derive(SerdeDeserialize, Default)]
pub struct PageImageQuery {
    #[serde(default)]
    pub scale: Option<f32>,
}

// =============================================================================
// Shared fragment builders
// =============================================================================

fn list_template(session: &Session, session_id: &str, oob: bool) -> PageListTemplate {
    let combiner = &session.combiner;
    PageListTemplate {
        session_id: session_id.to_string(),
        items: page_items(combiner.list().items(combiner.model())),
        oob,
    }
}

fn editor_template(session: &Session, session_id: &str) -> CoreResult<EditorTemplate> {
    let combiner = &session.combiner;
    let items = page_items(combiner.list().items(combiner.model()));
    match &session.editor {
        Some(editor) => {
            EditorTemplate::open(session_id.to_string(), editor, combiner.model(), items)
        }
        None => Ok(EditorTemplate::closed(session_id.to_string(), items)),
    }
}

/// Run an edit against the open editor, then describe the new state.
fn apply_edit<F>(session: &mut Session, session_id: &str, edit: F) -> CoreResult<EditorTemplate>
where
    F: FnOnce(&mut OverlayEditor, &mut PageModel) -> CoreResult<()>,
{
    {
        let Some(editor) = session.editor.as_mut() else {
            return Err(Error::NoSelection);
        };
        edit(editor, session.combiner.model_mut())?;
    }
    editor_template(session, session_id)
}

/// Editor fragment with toasts, or only an error toast.
fn editor_reply(result: CoreResult<EditorTemplate>, toasts: &[Toast]) -> RouteResult<Response> {
    match result {
        Ok(template) => fragment(template.render().or_internal_error()?, toasts),
        Err(e) => {
            debug!("Rejected edit: {}", e);
            toast_only(&Toast::from_error(&e))
        }
    }
}
