//! Loading source PDFs into page entries.
//!
//! Loading is split in two so front ends can rasterize without holding a
//! lock on the model: [`load_source`] does all the I/O and rendering and
//! returns a [`LoadedSource`], which [`super::PageModel::append_source`]
//! then commits in one step.

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::pdf::{PageGeometry, PageRenderer, PdfDocument, placeholder_image};
use super::entry::{EntryId, Thumbnail};

/// One rasterized page, ready to become a page entry.
#[derive(Debug, Clone)]
pub struct LoadedPage {
    pub page_index: usize,
    pub geometry: PageGeometry,
    pub thumbnail: Thumbnail,
}

/// All pages of one source file.
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub path: PathBuf,
    pub fingerprint: String,
    pub pages: Vec<LoadedPage>,
}

impl LoadedSource {
    /// Number of pages that got a placeholder instead of a thumbnail.
    pub fn placeholder_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| p.thumbnail.is_placeholder())
            .count()
    }
}

/// Open a PDF and rasterize every page at `thumbnail_scale`.
///
/// Fails only if the file itself cannot be opened (missing, corrupt,
/// encrypted, empty). Pages that fail to render get a placeholder.
pub fn load_source(path: impl AsRef<Path>, thumbnail_scale: f32) -> Result<LoadedSource> {
    let path = path.as_ref();
    let doc = PdfDocument::from_file(path)?;
    let page_count = doc.page_count();

    let geometries = doc.page_geometries().unwrap_or_else(|e| {
        warn!("Using default page size for {}: {}", path.display(), e);
        vec![PageGeometry::default(); page_count]
    });

    let renderer = PageRenderer::with_scale(&doc, thumbnail_scale);
    let pages = geometries
        .into_iter()
        .enumerate()
        .map(|(page_index, geometry)| {
            let thumbnail = match renderer.render_page(page_index) {
                Ok(image) => Thumbnail::Rendered(image),
                Err(e) => {
                    warn!("Page {} of {}: {}", page_index + 1, path.display(), e);
                    let (w, h) = geometry.display_pixels(thumbnail_scale);
                    Thumbnail::Placeholder {
                        image: placeholder_image(w, h),
                        reason: e.to_string(),
                    }
                }
            };
            LoadedPage {
                page_index,
                geometry,
                thumbnail,
            }
        })
        .collect();

    debug!("Rasterized {} pages of {}", page_count, path.display());

    Ok(LoadedSource {
        path: path.to_path_buf(),
        fingerprint: doc.fingerprint().to_string(),
        pages,
    })
}

/// Outcome of loading one file as part of a batch.
#[derive(Debug)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub entries: Vec<EntryId>,
    /// Pages shown with a placeholder thumbnail
    pub placeholders: usize,
}

/// Outcome of loading several files; failures do not stop the batch.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<LoadedFile>,
    pub failed: Vec<(PathBuf, Error)>,
}

impl LoadReport {
    /// Total number of entries added.
    pub fn page_count(&self) -> usize {
        self.loaded.iter().map(|f| f.entries.len()).sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// One line per failed file, for a message dialog.
    pub fn failure_messages(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|(path, e)| format!("{}: {}", path.display(), e))
            .collect()
    }

    pub(crate) fn log_summary(&self) {
        info!(
            "Loaded {} pages from {} files ({} failed)",
            self.page_count(),
            self.loaded.len(),
            self.failed.len()
        );
    }
}
