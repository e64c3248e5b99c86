use std::path::{Path, PathBuf};
use std::sync::Arc;

use mupdf::Document as MuDocument;

use crate::error::{Error, Result};
use crate::util::fingerprint;
use super::geometry::PageGeometry;

/// A source PDF held in memory, validated as openable and non-empty.
pub struct PdfDocument {
    /// Where the bytes came from, if they came from disk
    path: Option<PathBuf>,
    /// The raw PDF bytes
    bytes: Arc<Vec<u8>>,
    /// Number of pages
    page_count: usize,
    /// MD5 of the bytes, computed once on load
    fingerprint: String,
}

impl PdfDocument {
    /// Open a PDF from bytes.
    ///
    /// Fails for unparseable, password-protected or empty documents.
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Result<Self> {
        Self::open(bytes.into(), None)
    }

    /// Open a PDF from a file path
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            Error::PdfOpen(format!("Failed to read file {}: {}", path.display(), e))
        })?;
        Self::open(bytes, Some(path.to_path_buf()))
    }

    fn open(bytes: Vec<u8>, path: Option<PathBuf>) -> Result<Self> {
        let label = path
            .as_deref()
            .map_or_else(|| "<memory>".to_string(), |p| p.display().to_string());

        let doc = MuDocument::from_bytes(&bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to parse {label}: {e}")))?;

        if doc.needs_password().unwrap_or(false) {
            return Err(Error::PdfEncrypted(label));
        }

        let page_count = doc
            .page_count()
            .map_err(|e| Error::PdfOpen(format!("Failed to get page count of {label}: {e}")))?;
        let page_count = usize::try_from(page_count).unwrap_or(0);

        if page_count == 0 {
            return Err(Error::PdfEmpty(label));
        }

        let fingerprint = fingerprint(&bytes);

        Ok(Self {
            path,
            bytes: Arc::new(bytes),
            page_count,
            fingerprint,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get number of pages
    pub const fn page_count(&self) -> usize {
        self.page_count
    }

    /// Get raw PDF bytes as a slice.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// MD5 hex of the document bytes.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Open the document for rendering (creates a temporary handle)
    pub(crate) fn open_document(&self) -> Result<MuDocument> {
        MuDocument::from_bytes(&self.bytes, "")
            .map_err(|e| Error::PdfOpen(format!("Failed to open document: {e}")))
    }

    /// Page boxes and rotations for every page, in page order.
    ///
    /// Parses the document with lopdf once. Pages lopdf cannot see get the
    /// default geometry, so the result always has `page_count` entries.
    pub fn page_geometries(&self) -> Result<Vec<PageGeometry>> {
        let doc = lopdf::Document::load_mem(&self.bytes)
            .map_err(|e| Error::Lopdf(format!("Failed to parse page tree: {e}")))?;

        let pages = doc.get_pages();
        Ok((1..=self.page_count)
            .map(|number| {
                u32::try_from(number)
                    .ok()
                    .and_then(|n| pages.get(&n))
                    .map_or_else(PageGeometry::default, |&id| PageGeometry::from_page(&doc, id))
            })
            .collect())
    }
}

impl Clone for PdfDocument {
    /// O(1): the bytes are shared through the `Arc`.
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            bytes: Arc::clone(&self.bytes),
            page_count: self.page_count,
            fingerprint: self.fingerprint.clone(),
        }
    }
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("path", &self.path)
            .field("page_count", &self.page_count)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}

/// Report the page count of a PDF on disk.
pub fn page_count(path: impl AsRef<Path>) -> Result<usize> {
    PdfDocument::from_file(path).map(|doc| doc.page_count())
}
