//! The page model: the ordered list of page entries being edited.
//!
//! The model is the single owner of all editing state. The page list
//! controller and the overlay editor both take it by reference and route
//! every mutation through it, addressing entries by [`EntryId`] so that
//! reordering never invalidates a reference.

mod entry;
mod load;
mod record;

pub use entry::{EntryId, PageEntry, SourceRef, Thumbnail};
pub use load::{LoadReport, LoadedFile, LoadedPage, LoadedSource, load_source};
pub use record::{FontSpec, OverlayRecord, RecordId};

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::export::ExportPage;

/// Ordered page entries plus the id counter.
#[derive(Debug, Default)]
pub struct PageModel {
    entries: Vec<PageEntry>,
    next_id: u64,
}

impl PageModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry per loaded page, in source order.
    pub fn append_source(&mut self, source: LoadedSource) -> Vec<EntryId> {
        let LoadedSource {
            path,
            fingerprint,
            pages,
        } = source;

        let mut ids = Vec::with_capacity(pages.len());
        for page in pages {
            self.next_id += 1;
            let id = EntryId(self.next_id);
            let source = SourceRef {
                path: path.clone(),
                page_index: page.page_index,
                fingerprint: fingerprint.clone(),
            };
            self.entries
                .push(PageEntry::new(id, source, page.geometry, page.thumbnail));
            ids.push(id);
        }

        debug!("Appended {} entries from {}", ids.len(), path.display());
        ids
    }

    /// Load one PDF and append its pages.
    pub fn load_pdf(&mut self, path: impl AsRef<Path>, thumbnail_scale: f32) -> Result<Vec<EntryId>> {
        let source = load_source(path, thumbnail_scale)?;
        Ok(self.append_source(source))
    }

    /// Load several PDFs in order, skipping the ones that fail.
    pub fn load_files<P: AsRef<Path>>(&mut self, paths: &[P], thumbnail_scale: f32) -> LoadReport {
        let mut report = LoadReport::default();

        for path in paths {
            let path = path.as_ref();
            match load_source(path, thumbnail_scale) {
                Ok(source) => {
                    let placeholders = source.placeholder_count();
                    let entries = self.append_source(source);
                    report.loaded.push(LoadedFile {
                        path: path.to_path_buf(),
                        entries,
                        placeholders,
                    });
                }
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                    report.failed.push((path.to_path_buf(), e));
                }
            }
        }

        report.log_summary();
        report
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in document order.
    pub fn entries(&self) -> &[PageEntry] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<EntryId> {
        self.entries.iter().map(PageEntry::id).collect()
    }

    pub fn get(&self, id: EntryId) -> Option<&PageEntry> {
        self.entries.iter().find(|e| e.id() == id)
    }

    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut PageEntry> {
        self.entries.iter_mut().find(|e| e.id() == id)
    }

    /// Like [`Self::get`], but an error for unknown ids.
    pub fn entry(&self, id: EntryId) -> Result<&PageEntry> {
        self.get(id).ok_or(Error::EntryNotFound(id.0))
    }

    pub fn entry_mut(&mut self, id: EntryId) -> Result<&mut PageEntry> {
        self.get_mut(id).ok_or(Error::EntryNotFound(id.0))
    }

    /// Current position of an entry in document order.
    pub fn position_of(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id() == id)
    }

    /// Swap an entry with its predecessor. Returns false if it is already first.
    pub fn move_up(&mut self, id: EntryId) -> Result<bool> {
        let pos = self.position_of(id).ok_or(Error::EntryNotFound(id.0))?;
        if pos == 0 {
            return Ok(false);
        }
        self.entries.swap(pos - 1, pos);
        Ok(true)
    }

    /// Swap an entry with its successor. Returns false if it is already last.
    pub fn move_down(&mut self, id: EntryId) -> Result<bool> {
        let pos = self.position_of(id).ok_or(Error::EntryNotFound(id.0))?;
        if pos + 1 >= self.entries.len() {
            return Ok(false);
        }
        self.entries.swap(pos, pos + 1);
        Ok(true)
    }

    pub fn remove(&mut self, id: EntryId) -> Result<PageEntry> {
        let pos = self.position_of(id).ok_or(Error::EntryNotFound(id.0))?;
        Ok(self.entries.remove(pos))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Reorder entries to match `order`, which must be a permutation of the current ids.
    pub fn reorder(&mut self, order: &[EntryId]) -> Result<()> {
        if order.len() != self.entries.len() {
            return Err(Error::InvalidOrder(format!(
                "order lists {} entries, model has {}",
                order.len(),
                self.entries.len()
            )));
        }

        let mut seen = std::collections::HashSet::with_capacity(order.len());
        for id in order {
            if self.position_of(*id).is_none() {
                return Err(Error::EntryNotFound(id.0));
            }
            if !seen.insert(*id) {
                return Err(Error::InvalidOrder(format!("entry {id} listed twice")));
            }
        }

        let mut remaining = std::mem::take(&mut self.entries);
        for id in order {
            if let Some(pos) = remaining.iter().position(|e| e.id() == *id) {
                self.entries.push(remaining.swap_remove(pos));
            }
        }
        Ok(())
    }

    /// `(source path, 0-based page)` for every entry, in document order.
    pub fn source_order(&self) -> Vec<(PathBuf, usize)> {
        self.entries
            .iter()
            .map(|e| (e.source_path().to_path_buf(), e.page_index()))
            .collect()
    }

    /// Thumbnail-free snapshot of the document order for the exporter.
    pub fn export_pages(&self) -> Vec<ExportPage> {
        self.entries.iter().map(ExportPage::from).collect()
    }
}
