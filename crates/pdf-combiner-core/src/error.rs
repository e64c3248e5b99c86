use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for pdf-combiner-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Loading source PDFs (missing, corrupt, encrypted)
/// - Rasterizing individual pages
/// - Exporting the combined document
/// - Editing the page model (unknown entries, bad styles)
/// - Configuration operations (loading, validation)
/// - General I/O operations
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Load Errors
    // ==========================================================================
    /// Failed to open or parse a PDF file
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// The PDF requires a password, which is not supported
    #[error("PDF is password-protected: {0}")]
    PdfEncrypted(String),

    /// The PDF parsed but has no pages
    #[error("PDF has no pages: {0}")]
    PdfEmpty(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    // ==========================================================================
    // Render Errors
    // ==========================================================================
    /// Failed to render a PDF page
    #[error("failed to render page {page}: {reason}")]
    PdfRender { page: usize, reason: String },

    // ==========================================================================
    // Export Errors
    // ==========================================================================
    /// A page could not be exported (source unreadable, page missing, ...)
    ///
    /// `page` is the 1-based position in the export order.
    #[error("failed to export page {page} from {}: {reason}", path.display())]
    Export {
        page: usize,
        path: PathBuf,
        reason: String,
    },

    /// Nothing to export
    #[error("no pages to export")]
    ExportEmpty,

    /// The destination could not be written
    #[error("failed to write {}: {reason}", path.display())]
    ExportDestination { path: PathBuf, reason: String },

    /// Failed to draw overlays onto a page
    #[error("failed to create PDF overlay: {0}")]
    PdfOverlay(String),

    /// Failed to save a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    /// Error from the lopdf library
    #[error("lopdf error: {0}")]
    Lopdf(String),

    // ==========================================================================
    // Edit Errors
    // ==========================================================================
    /// The page entry no longer exists in the model
    #[error("page entry {0} not found")]
    EntryNotFound(u64),

    /// The overlay record no longer exists on its page
    #[error("overlay {record} not found on page entry {entry}")]
    RecordNotFound { entry: u64, record: u64 },

    /// Invalid style value for an overlay
    #[error("invalid overlay style: {0}")]
    InvalidStyle(String),

    /// A page order that is not a permutation of the current entries
    #[error("invalid page order: {0}")]
    InvalidOrder(String),

    /// A list action needs a selected page
    #[error("no page selected")]
    NoSelection,

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // I/O Errors
    // ==========================================================================
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which user action an error belongs to.
///
/// Front ends use this to word their messages; none of these are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A source file could not be loaded; skip it and continue
    Load,
    /// A single page could not be rasterized; show a placeholder
    Render,
    /// Export aborted; the destination was left untouched
    Export,
    /// An edit referenced something that no longer exists
    Edit,
    Config,
    Io,
}

impl ErrorCategory {
    /// Short title for message dialogs.
    pub const fn title(self) -> &'static str {
        match self {
            Self::Load => "Could not load PDF",
            Self::Render => "Could not render page",
            Self::Export => "Export failed",
            Self::Edit => "Edit failed",
            Self::Config => "Configuration error",
            Self::Io => "I/O error",
        }
    }
}

impl Error {
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::PdfOpen(_) | Self::PdfEncrypted(_) | Self::PdfEmpty(_) => ErrorCategory::Load,
            Self::PdfInvalidPage { .. } | Self::PdfRender { .. } => ErrorCategory::Render,
            Self::Export { .. }
            | Self::ExportEmpty
            | Self::ExportDestination { .. }
            | Self::PdfOverlay(_)
            | Self::PdfSave(_)
            | Self::Lopdf(_) => ErrorCategory::Export,
            Self::EntryNotFound(_)
            | Self::RecordNotFound { .. }
            | Self::InvalidStyle(_)
            | Self::InvalidOrder(_)
            | Self::NoSelection => ErrorCategory::Edit,
            Self::ConfigLoad(_) | Self::ConfigInvalid { .. } => ErrorCategory::Config,
            Self::Io(_) => ErrorCategory::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_error_names_page_and_file() {
        let err = Error::Export {
            page: 3,
            path: PathBuf::from("/tmp/b.pdf"),
            reason: "file not found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("page 3"));
        assert!(msg.contains("/tmp/b.pdf"));
        assert_eq!(err.category(), ErrorCategory::Export);
    }

    #[test]
    fn test_categories() {
        assert_eq!(Error::PdfEncrypted("x".into()).category(), ErrorCategory::Load);
        assert_eq!(
            Error::PdfRender { page: 0, reason: String::new() }.category(),
            ErrorCategory::Render
        );
        assert_eq!(Error::EntryNotFound(4).category(), ErrorCategory::Edit);
        assert_eq!(ErrorCategory::Export.title(), "Export failed");
    }
}
