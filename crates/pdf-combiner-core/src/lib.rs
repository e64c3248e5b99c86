//! PDF Combiner Core Library
//!
//! This library provides the core functionality for annotating and merging PDFs:
//! - PDF rasterization for thumbnails and the editor background
//! - The page model: ordered page entries with their text overlays
//! - Toolkit-independent controllers for the page list and overlay editor
//! - Export of the final order with overlays burned in as vector text

pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod model;
pub mod page_list;
pub mod pdf;
pub mod util;

pub use config::{AppConfig, ExportConfig, OverlayDefaults, RenderConfig, TextColor, color_options};
pub use editor::{ContextAction, OverlayEditor, OverlayView};
pub use error::{Error, ErrorCategory, Result};
pub use export::{ExportOutput, ExportPage, ExportSummary, Exporter, ProgressCallback};
pub use model::{
    EntryId, FontSpec, LoadReport, LoadedSource, OverlayRecord, PageEntry, PageModel, RecordId,
    Thumbnail, load_source,
};
pub use page_list::{ListItem, PageListController};
pub use pdf::{PageGeometry, PageRenderer, PdfDocument, PdfPoint, Rotation, ScreenPoint};

use std::path::Path;
use tracing::info;

/// The page model, its list controller and the configuration, bundled for front ends.
#[derive(Debug, Default)]
pub struct PdfCombiner {
    config: AppConfig,
    model: PageModel,
    list: PageListController,
}

impl PdfCombiner {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            model: PageModel::new(),
            list: PageListController::new(),
        }
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    pub const fn model(&self) -> &PageModel {
        &self.model
    }

    pub const fn model_mut(&mut self) -> &mut PageModel {
        &mut self.model
    }

    pub const fn list(&self) -> &PageListController {
        &self.list
    }

    /// The model and the list controller, borrowed together for list actions.
    pub const fn parts_mut(&mut self) -> (&mut PageModel, &mut PageListController) {
        (&mut self.model, &mut self.list)
    }

    /// Load files in order at the configured thumbnail scale.
    pub fn load_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> LoadReport {
        let report = self
            .model
            .load_files(paths, self.config.render.thumbnail_scale);
        if self.list.selected().is_none() && !self.model.is_empty() {
            self.list.select_position(&self.model, 0);
        }
        report
    }

    /// Commit a source loaded off-thread with [`load_source`].
    pub fn append_source(&mut self, source: LoadedSource) -> Vec<EntryId> {
        let ids = self.model.append_source(source);
        if self.list.selected().is_none() && !ids.is_empty() {
            self.list.select_position(&self.model, 0);
        }
        ids
    }

    /// Open the overlay editor on the selected entry at the configured scale.
    pub fn open_editor(&self) -> Result<OverlayEditor> {
        self.list.activate(
            &self.model,
            self.config.render.editor_scale,
            self.config.overlay.clone(),
        )
    }

    /// Open the overlay editor on a specific entry.
    pub fn open_editor_on(&mut self, id: EntryId, scale: f32) -> Result<OverlayEditor> {
        self.list.select(&self.model, id)?;
        OverlayEditor::open(
            &self.model,
            id,
            self.config.clamp_scale(scale),
            self.config.overlay.clone(),
        )
    }

    pub fn exporter(&self) -> Exporter {
        Exporter::new(self.config.export.clone())
    }

    /// Build the combined document in memory.
    pub fn export_to_bytes(&self) -> Result<ExportOutput> {
        self.exporter().export_to_bytes(&self.model.export_pages())
    }

    /// Write the combined document to `dest`.
    pub fn export_to_file(&self, dest: &Path) -> Result<ExportSummary> {
        info!("Exporting {} pages to {}", self.model.len(), dest.display());
        self.exporter()
            .export_to_file(&self.model.export_pages(), dest)
    }

    /// Forget all pages.
    pub fn clear(&mut self) {
        self.model.clear();
        self.list.clear_selection();
    }
}

/// Convenience function to render a page of a file on disk as PNG
pub fn render_page_png(path: impl AsRef<Path>, page_num: usize, scale: f32) -> Result<Vec<u8>> {
    let doc = PdfDocument::from_file(path)?;
    PageRenderer::with_scale(&doc, scale).render_page_png(page_num)
}

/// Convenience function to render a page of a file on disk as WebP
pub fn render_page_webp(path: impl AsRef<Path>, page_num: usize, scale: f32) -> Result<Vec<u8>> {
    let doc = PdfDocument::from_file(path)?;
    PageRenderer::with_scale(&doc, scale).render_page_webp(page_num)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::LoadedPage;
    use crate::pdf::placeholder_image;
    use std::path::PathBuf;

    fn source(name: &str) -> LoadedSource {
        LoadedSource {
            path: PathBuf::from(name),
            fingerprint: String::new(),
            pages: vec![LoadedPage {
                page_index: 0,
                geometry: PageGeometry::default(),
                thumbnail: Thumbnail::Rendered(placeholder_image(2, 2)),
            }],
        }
    }

    #[test]
    fn test_first_load_selects_first_entry() {
        let mut combiner = PdfCombiner::default();
        let ids = combiner.append_source(source("a.pdf"));
        combiner.append_source(source("b.pdf"));
        assert_eq!(combiner.list().selected(), Some(ids[0]));

        let editor = combiner.open_editor().unwrap();
        assert_eq!(editor.entry_id(), ids[0]);
        assert!((editor.scale() - 2.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_open_editor_on_clamps_scale() {
        let mut combiner = PdfCombiner::default();
        combiner.append_source(source("a.pdf"));
        let ids = combiner.append_source(source("b.pdf"));
        let editor = combiner.open_editor_on(ids[0], 50.0).unwrap();
        assert!((editor.scale() - 8.0).abs() < f32::EPSILON);
        assert_eq!(combiner.list().selected(), Some(ids[0]));
    }

    #[test]
    fn test_clear_and_empty_export() {
        let mut combiner = PdfCombiner::default();
        combiner.append_source(source("a.pdf"));
        combiner.clear();
        assert!(combiner.model().is_empty());
        assert_eq!(combiner.list().selected(), None);
        assert!(matches!(combiner.export_to_bytes(), Err(Error::ExportEmpty)));
    }
}
