//! Page entries: one page's editable state.

use image::RgbaImage;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::TextColor;
use crate::error::{Error, Result};
use crate::pdf::geometry::{PageGeometry, PdfPoint};
use crate::util::display_name;
use super::record::{FontSpec, OverlayRecord, RecordId};

/// Stable handle of a page entry, independent of its position in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a page came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub path: PathBuf,
    /// 0-based page index in the source file
    pub page_index: usize,
    /// MD5 of the source file when it was loaded
    pub fingerprint: String,
}

/// Preview bitmap of a page.
#[derive(Debug, Clone)]
pub enum Thumbnail {
    Rendered(RgbaImage),
    /// Rasterization failed; the image is a gray stand-in
    Placeholder { image: RgbaImage, reason: String },
}

impl Thumbnail {
    pub const fn image(&self) -> &RgbaImage {
        match self {
            Self::Rendered(image) | Self::Placeholder { image, .. } => image,
        }
    }

    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder { .. })
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Rendered(_) => None,
            Self::Placeholder { reason, .. } => Some(reason),
        }
    }
}

/// One page in the document order, with its overlays.
#[derive(Debug, Clone)]
pub struct PageEntry {
    id: EntryId,
    source: SourceRef,
    geometry: PageGeometry,
    thumbnail: Thumbnail,
    overlays: Vec<OverlayRecord>,
    next_record: u64,
}

impl PageEntry {
    pub(crate) const fn new(
        id: EntryId,
        source: SourceRef,
        geometry: PageGeometry,
        thumbnail: Thumbnail,
    ) -> Self {
        Self {
            id,
            source,
            geometry,
            thumbnail,
            overlays: Vec::new(),
            next_record: 1,
        }
    }

    pub const fn id(&self) -> EntryId {
        self.id
    }

    pub const fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn source_path(&self) -> &Path {
        &self.source.path
    }

    pub const fn page_index(&self) -> usize {
        self.source.page_index
    }

    pub const fn geometry(&self) -> &PageGeometry {
        &self.geometry
    }

    pub const fn thumbnail(&self) -> &Thumbnail {
        &self.thumbnail
    }

    /// Overlays in drawing order (last is topmost).
    pub fn overlays(&self) -> &[OverlayRecord] {
        &self.overlays
    }

    pub fn has_overlays(&self) -> bool {
        !self.overlays.is_empty()
    }

    /// List label, e.g. `"a.pdf - Page 2 (Text Added)"`.
    pub fn label(&self) -> String {
        let base = format!(
            "{} - Page {}",
            display_name(&self.source.path),
            self.source.page_index + 1
        );
        if self.has_overlays() {
            format!("{base} (Text Added)")
        } else {
            base
        }
    }

    pub fn overlay(&self, id: RecordId) -> Option<&OverlayRecord> {
        self.overlays.iter().find(|r| r.id == id)
    }

    pub fn overlay_mut(&mut self, id: RecordId) -> Result<&mut OverlayRecord> {
        let entry = self.id;
        self.overlays
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::RecordNotFound {
                entry: entry.0,
                record: id.0,
            })
    }

    /// Append a new overlay on top of the existing ones.
    pub fn add_overlay(
        &mut self,
        text: impl Into<String>,
        position: PdfPoint,
        font: FontSpec,
        color: TextColor,
    ) -> Result<RecordId> {
        font.validate()?;
        let id = RecordId(self.next_record);
        self.next_record += 1;
        self.overlays.push(OverlayRecord {
            id,
            text: text.into(),
            position,
            font,
            color,
        });
        Ok(id)
    }

    pub fn remove_overlay(&mut self, id: RecordId) -> Result<OverlayRecord> {
        let index = self
            .overlays
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| Error::RecordNotFound {
                entry: self.id.0,
                record: id.0,
            })?;
        Ok(self.overlays.remove(index))
    }

    pub fn clear_overlays(&mut self) {
        self.overlays.clear();
    }

    /// Swap the whole overlay list, e.g. to restore a snapshot.
    ///
    /// Record ids keep increasing so restored and new records never collide.
    pub(crate) fn replace_overlays(&mut self, overlays: Vec<OverlayRecord>) {
        let max_id = overlays.iter().map(|r| r.id.0).max().unwrap_or(0);
        self.next_record = self.next_record.max(max_id + 1);
        self.overlays = overlays;
    }
}
