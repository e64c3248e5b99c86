//! Askama templates for HTMX responses.
//!
//! ## HTMX Patterns Used
//!
//! - **OOB Swaps**: the editor fragment carries the page list with
//!   `hx-swap-oob="true"` so overlay counts and labels stay current, and toasts
//!   are appended to `#toasts` out of band
//!
//! - **Disabled Elements**: `hx-disabled-elt` prevents double submits of
//!   loads and exports
//!
//! ## Template Structure
//!
//! - `base.html` - Common layout with CSS/JS
//! - `index.html` - Landing page with upload form
//! - `workspace.html` - Page list, editor and export controls of a session
//! - `partials/` - Page list, editor and toast fragments

use askama::Template;
use askama_web::WebTemplate;
use pdf_combiner_core::{
    ListItem, OverlayEditor, OverlayView, PageModel, Result as CoreResult, color_options,
};

/// Font families offered by the editor; all map onto base-14 fonts.
pub const FONT_CHOICES: [&str; 3] = ["Helvetica", "Times", "Courier"];

/// Editor zoom levels offered in the toolbar.
pub const SCALE_CHOICES: [f32; 5] = [1.0, 1.5, 2.0, 3.0, 4.0];

// =============================================================================
// View models
// =============================================================================

/// One row of the page list.
pub struct PageItem {
    pub id: u64,
    /// 1-based position
    pub number: usize,
    pub label: String,
    pub selected: bool,
    pub overlay_count: usize,
    pub has_error: bool,
    pub error: String,
}

impl From<ListItem> for PageItem {
    fn from(item: ListItem) -> Self {
        Self {
            id: item.id.0,
            number: item.position + 1,
            label: item.label,
            selected: item.selected,
            overlay_count: item.overlay_count,
            has_error: item.render_error.is_some(),
            error: item.render_error.unwrap_or_default(),
        }
    }
}

/// An overlay box positioned on the editor canvas.
pub struct OverlayBox {
    pub id: u64,
    pub text: String,
    /// Inline CSS placing and styling the box
    pub style: String,
    pub family: String,
    pub size: String,
    pub bold: bool,
    pub italic: bool,
    pub color: String,
}

impl OverlayBox {
    pub fn new(view: &OverlayView, size_pt: f32) -> Self {
        let style = format!(
            "left:{:.1}px;top:{:.1}px;min-width:{:.1}px;min-height:{:.1}px;\
             font-size:{:.2}px;font-family:{};color:{};font-weight:{};font-style:{}",
            view.left,
            view.top,
            view.width,
            view.height,
            view.font_px,
            view.css_font_stack,
            view.color.to_css(),
            if view.bold { "bold" } else { "normal" },
            if view.italic { "italic" } else { "normal" },
        );
        Self {
            id: view.id.0,
            text: view.text.clone(),
            style,
            family: view.font_family.clone(),
            size: format!("{size_pt}"),
            bold: view.bold,
            italic: view.italic,
            color: view.color.to_hex(),
        }
    }
}

/// A named color offered in the context menu.
pub struct ColorChoice {
    pub name: &'static str,
    pub hex: String,
}

pub fn color_choices() -> Vec<ColorChoice> {
    color_options()
        .into_iter()
        .map(|(name, color)| ColorChoice {
            name,
            hex: color.to_hex(),
        })
        .collect()
}

/// Rows of the page list for the current model.
pub fn page_items(items: Vec<ListItem>) -> Vec<PageItem> {
    items.into_iter().map(PageItem::from).collect()
}

// =============================================================================
// Full Page Templates
// =============================================================================

/// Landing page with upload form.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate;

/// Main workspace of a session.
///
/// The editor panel is fetched by the page itself once loaded.
#[derive(Template, WebTemplate)]
#[template(path = "workspace.html")]
pub struct WorkspaceTemplate {
    pub session_id: String,
    pub items: Vec<PageItem>,
    /// Always false for the full page; shared with the list partial
    pub oob: bool,
}

// =============================================================================
// Fragment Templates (HTMX partial responses)
// =============================================================================

/// Page list fragment (`#page-list`).
#[derive(Template, WebTemplate)]
#[template(path = "partials/page_list.html")]
pub struct PageListTemplate {
    pub session_id: String,
    pub items: Vec<PageItem>,
    pub oob: bool,
}

/// Editor fragment (`#editor`), with the page list swapped out of band.
#[derive(Template, WebTemplate)]
#[template(path = "partials/editor.html")]
pub struct EditorTemplate {
    pub session_id: String,
    /// Whether an editor is open; otherwise a placeholder is shown
    pub open: bool,
    pub entry: u64,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub scale: String,
    pub scales: Vec<ScaleChoice>,
    pub overlays: Vec<OverlayBox>,
    pub has_changes: bool,
    pub fonts: Vec<&'static str>,
    pub colors: Vec<ColorChoice>,
    /// Page list, swapped out of band
    pub items: Vec<PageItem>,
    pub oob: bool,
}

/// A zoom option of the editor toolbar.
pub struct ScaleChoice {
    pub value: String,
    pub label: String,
    pub selected: bool,
}

impl EditorTemplate {
    /// Placeholder shown while no page is open.
    pub fn closed(session_id: String, items: Vec<PageItem>) -> Self {
        Self {
            session_id,
            open: false,
            entry: 0,
            label: String::new(),
            width: 0,
            height: 0,
            scale: String::new(),
            scales: Vec::new(),
            overlays: Vec::new(),
            has_changes: false,
            fonts: Vec::new(),
            colors: Vec::new(),
            items,
            oob: true,
        }
    }

    /// Editor panel for `editor` over the current model.
    pub fn open(
        session_id: String,
        editor: &OverlayEditor,
        model: &PageModel,
        items: Vec<PageItem>,
    ) -> CoreResult<Self> {
        let entry = model.entry(editor.entry_id())?;
        let (width, height) = editor.canvas_size(model)?;
        let overlays = editor
            .overlay_views(model)?
            .iter()
            .map(|view| {
                let size_pt = entry
                    .overlay(view.id)
                    .map_or(view.font_px, |record| record.font.size);
                OverlayBox::new(view, size_pt)
            })
            .collect();
        let scale = editor.scale();

        Ok(Self {
            session_id,
            open: true,
            entry: entry.id().0,
            label: entry.label(),
            width,
            height,
            scale: format!("{scale}"),
            scales: SCALE_CHOICES
                .iter()
                .map(|&s| ScaleChoice {
                    value: format!("{s}"),
                    label: format!("{:.0}%", s * 100.0),
                    selected: (s - scale).abs() < 1e-3,
                })
                .collect(),
            overlays,
            has_changes: editor.has_changes(model)?,
            fonts: FONT_CHOICES.to_vec(),
            colors: color_choices(),
            items,
            oob: true,
        })
    }
}

/// Toast notification, appended to `#toasts` out of band.
#[derive(Template, WebTemplate)]
#[template(path = "partials/toast.html")]
pub struct ToastTemplate {
    pub kind: &'static str,
    pub message: String,
}
