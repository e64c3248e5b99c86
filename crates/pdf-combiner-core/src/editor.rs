//! Overlay editor: direct manipulation of one page's text overlays.
//!
//! The editor is bound to a page entry and a display scale. It never owns
//! the page model; every method takes it by reference and commits changes
//! immediately, so the page list always reflects the current edits.
//!
//! Positions cross this API in display pixels at the editor's scale and are
//! stored in PDF points, so changing the scale never moves a record.

use image::RgbaImage;
use tracing::debug;

use crate::config::{OverlayDefaults, TextColor};
use crate::error::{Error, Result};
use crate::model::{EntryId, FontSpec, OverlayRecord, PageEntry, PageModel, RecordId};
use crate::pdf::{PageGeometry, ScreenPoint, render_file_page};

/// Actions offered by the right-click menu of an overlay.
#[derive(Debug, Clone, PartialEq)]
pub enum ContextAction {
    ChangeFont(FontSpec),
    ChangeColor(TextColor),
    Delete,
}

/// An overlay as it should be drawn on the editor canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayView {
    pub id: RecordId,
    pub text: String,
    /// Top-left corner in display pixels
    pub left: f32,
    pub top: f32,
    /// Approximate box size in display pixels
    pub width: f32,
    pub height: f32,
    /// Font size in display pixels
    pub font_px: f32,
    pub font_family: String,
    pub css_font_stack: &'static str,
    pub bold: bool,
    pub italic: bool,
    pub color: TextColor,
}

impl OverlayView {
    fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.left
            && point.x <= self.left + self.width
            && point.y >= self.top
            && point.y <= self.top + self.height
    }
}

/// A drag in progress. Nothing is committed until it ends.
#[derive(Debug, Clone, Copy)]
struct DragState {
    record: RecordId,
    /// Grab point relative to the record's top-left corner
    grab_dx: f32,
    grab_dy: f32,
    preview: ScreenPoint,
}

/// Controller for the overlay editor of one page entry.
#[derive(Debug)]
pub struct OverlayEditor {
    entry: EntryId,
    scale: f32,
    defaults: OverlayDefaults,
    snapshot: Vec<OverlayRecord>,
    drag: Option<DragState>,
}

impl OverlayEditor {
    /// Open an editor on `entry`, remembering its overlays for [`Self::revert`].
    pub fn open(
        model: &PageModel,
        entry: EntryId,
        scale: f32,
        defaults: OverlayDefaults,
    ) -> Result<Self> {
        let snapshot = model.entry(entry)?.overlays().to_vec();
        debug!("Opened editor on entry {} at scale {}", entry, scale);
        Ok(Self {
            entry,
            scale: sanitize_scale(scale),
            defaults,
            snapshot,
            drag: None,
        })
    }

    pub const fn entry_id(&self) -> EntryId {
        self.entry
    }

    pub const fn scale(&self) -> f32 {
        self.scale
    }

    /// Change the display scale. Stored positions are unaffected.
    pub fn set_scale(&mut self, scale: f32) {
        self.scale = sanitize_scale(scale);
        self.drag = None;
    }

    pub const fn defaults(&self) -> &OverlayDefaults {
        &self.defaults
    }

    fn page<'m>(&self, model: &'m PageModel) -> Result<&'m PageEntry> {
        model.entry(self.entry)
    }

    fn page_mut<'m>(&self, model: &'m mut PageModel) -> Result<&'m mut PageEntry> {
        model.entry_mut(self.entry)
    }

    fn geometry(&self, model: &PageModel) -> Result<PageGeometry> {
        Ok(*self.page(model)?.geometry())
    }

    /// Canvas size in pixels.
    pub fn canvas_size(&self, model: &PageModel) -> Result<(u32, u32)> {
        Ok(self.geometry(model)?.display_pixels(self.scale))
    }

    /// Rasterize the source page at the editor's scale for the background.
    pub fn render_background(&self, model: &PageModel) -> Result<RgbaImage> {
        let page = self.page(model)?;
        render_file_page(page.source_path(), page.page_index(), self.scale)
    }

    /// Add the default text at the default position.
    pub fn add_text(&self, model: &mut PageModel) -> Result<RecordId> {
        let [x, y] = self.defaults.position_px;
        self.add_text_at(
            model,
            ScreenPoint::new(x, y),
            self.defaults.text.clone(),
            FontSpec::from(&self.defaults),
            self.defaults.color,
        )
    }

    /// Add text with its top-left corner at `top_left`.
    pub fn add_text_at(
        &self,
        model: &mut PageModel,
        top_left: ScreenPoint,
        text: impl Into<String>,
        font: FontSpec,
        color: TextColor,
    ) -> Result<RecordId> {
        let position = self.geometry(model)?.screen_to_pdf(top_left, self.scale);
        let id = self
            .page_mut(model)?
            .add_overlay(text, position, font, color)?;
        debug!("Added overlay {} on entry {}", id, self.entry);
        Ok(id)
    }

    /// Move a record so its top-left corner is at `top_left`.
    pub fn move_record(
        &self,
        model: &mut PageModel,
        record: RecordId,
        top_left: ScreenPoint,
    ) -> Result<()> {
        let position = self.geometry(model)?.screen_to_pdf(top_left, self.scale);
        self.page_mut(model)?.overlay_mut(record)?.position = position;
        Ok(())
    }

    /// Start dragging `record`, grabbed at `grab`.
    pub fn begin_drag(
        &mut self,
        model: &PageModel,
        record: RecordId,
        grab: ScreenPoint,
    ) -> Result<()> {
        let view = self.view_of(model, record)?;
        self.drag = Some(DragState {
            record,
            grab_dx: grab.x - view.left,
            grab_dy: grab.y - view.top,
            preview: ScreenPoint::new(view.left, view.top),
        });
        Ok(())
    }

    /// Follow the pointer. Returns the previewed top-left corner.
    pub fn drag_to(&mut self, pointer: ScreenPoint) -> Option<ScreenPoint> {
        let drag = self.drag.as_mut()?;
        drag.preview = pointer.offset(-drag.grab_dx, -drag.grab_dy);
        Some(drag.preview)
    }

    /// Release the drag at `pointer` and commit the new position.
    pub fn end_drag(
        &mut self,
        model: &mut PageModel,
        pointer: ScreenPoint,
    ) -> Result<Option<RecordId>> {
        let Some(drag) = self.drag.take() else {
            return Ok(None);
        };
        let top_left = pointer.offset(-drag.grab_dx, -drag.grab_dy);
        self.move_record(model, drag.record, top_left)?;
        Ok(Some(drag.record))
    }

    pub fn cancel_drag(&mut self) {
        self.drag = None;
    }

    pub const fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// The topmost record under `point`, if any.
    pub fn record_at(&self, model: &PageModel, point: ScreenPoint) -> Result<Option<RecordId>> {
        Ok(self
            .overlay_views(model)?
            .iter()
            .rev()
            .find(|v| v.contains(point))
            .map(|v| v.id))
    }

    pub fn edit_text(
        &self,
        model: &mut PageModel,
        record: RecordId,
        text: impl Into<String>,
    ) -> Result<()> {
        self.page_mut(model)?.overlay_mut(record)?.text = text.into();
        Ok(())
    }

    /// Double-click editing: replace the text of whatever lies under `point`.
    pub fn edit_text_at(
        &self,
        model: &mut PageModel,
        point: ScreenPoint,
        text: impl Into<String>,
    ) -> Result<Option<RecordId>> {
        let Some(record) = self.record_at(model, point)? else {
            return Ok(None);
        };
        self.edit_text(model, record, text)?;
        Ok(Some(record))
    }

    pub fn set_font(&self, model: &mut PageModel, record: RecordId, font: FontSpec) -> Result<()> {
        font.validate()?;
        self.page_mut(model)?.overlay_mut(record)?.font = font;
        Ok(())
    }

    pub fn set_color(&self, model: &mut PageModel, record: RecordId, color: TextColor) -> Result<()> {
        self.page_mut(model)?.overlay_mut(record)?.color = color;
        Ok(())
    }

    pub fn delete(&mut self, model: &mut PageModel, record: RecordId) -> Result<OverlayRecord> {
        if self.drag.is_some_and(|d| d.record == record) {
            self.drag = None;
        }
        let removed = self.page_mut(model)?.remove_overlay(record)?;
        debug!("Deleted overlay {} on entry {}", record, self.entry);
        Ok(removed)
    }

    pub fn apply_context_action(
        &mut self,
        model: &mut PageModel,
        record: RecordId,
        action: ContextAction,
    ) -> Result<()> {
        match action {
            ContextAction::ChangeFont(font) => self.set_font(model, record, font),
            ContextAction::ChangeColor(color) => self.set_color(model, record, color),
            ContextAction::Delete => self.delete(model, record).map(|_| ()),
        }
    }

    /// Overlays in drawing order, positioned for the canvas.
    pub fn overlay_views(&self, model: &PageModel) -> Result<Vec<OverlayView>> {
        let page = self.page(model)?;
        let geometry = page.geometry();
        Ok(page
            .overlays()
            .iter()
            .map(|record| view_for(record, geometry, self.scale))
            .collect())
    }

    fn view_of(&self, model: &PageModel, record: RecordId) -> Result<OverlayView> {
        self.overlay_views(model)?
            .into_iter()
            .find(|v| v.id == record)
            .ok_or(Error::RecordNotFound {
                entry: self.entry.0,
                record: record.0,
            })
    }

    /// Whether the overlays differ from when the editor opened.
    pub fn has_changes(&self, model: &PageModel) -> Result<bool> {
        Ok(self.page(model)?.overlays() != self.snapshot.as_slice())
    }

    /// Restore the overlays as they were when the editor opened.
    pub fn revert(&mut self, model: &mut PageModel) -> Result<()> {
        self.drag = None;
        let snapshot = self.snapshot.clone();
        self.page_mut(model)?.replace_overlays(snapshot);
        debug!("Reverted overlays on entry {}", self.entry);
        Ok(())
    }

    /// Close the editor, keeping all edits.
    pub fn close(self) -> EntryId {
        debug!("Closed editor on entry {}", self.entry);
        self.entry
    }
}

fn view_for(record: &OverlayRecord, geometry: &PageGeometry, scale: f32) -> OverlayView {
    let top_left = geometry.pdf_to_screen(record.position, scale);
    let (width, height) = record.extent();
    OverlayView {
        id: record.id,
        text: record.text.clone(),
        left: top_left.x,
        top: top_left.y,
        width: width * scale,
        height: height * scale,
        font_px: record.font.size * scale,
        font_family: record.font.family.clone(),
        css_font_stack: record.font.standard_family().css_stack(),
        bold: record.font.bold,
        italic: record.font.italic,
        color: record.color,
    }
}

fn sanitize_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 { scale } else { 1.0 }
}
