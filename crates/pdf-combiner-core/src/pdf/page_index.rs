//! Page index newtype shared by the MuPDF and lopdf sides.
//!
//! MuPDF addresses pages with a 0-based `i32`, lopdf with a 1-based `u32`
//! page number, and the page model with a 0-based `usize`. Conversions
//! between the three go through [`PageIndex`].

use std::fmt;

use crate::error::Error;

/// A validated, 0-based page index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(i32);

impl PageIndex {
    /// Get the index as MuPDF expects it.
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// Get the index for Rust collections.
    #[must_use]
    #[allow(clippy::cast_sign_loss)] // never negative, see constructors
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Get the 1-based page number used by `lopdf::Document::get_pages`.
    #[must_use]
    pub const fn as_lopdf_page_number(self) -> u32 {
        (self.0 + 1).cast_unsigned()
    }

    /// Validate a page number against a document's page count.
    ///
    /// Fails if the page is past the end or does not fit MuPDF's `i32`.
    pub fn try_from_page_num(page_num: usize, total_pages: usize) -> Result<Self, Error> {
        let out_of_range = || Error::PdfInvalidPage {
            page: page_num,
            total: total_pages,
        };

        if page_num >= total_pages {
            return Err(out_of_range());
        }

        i32::try_from(page_num).map(Self).map_err(|_| out_of_range())
    }
}

impl From<PageIndex> for i32 {
    fn from(index: PageIndex) -> Self {
        index.0
    }
}

impl fmt::Display for PageIndex {
    /// Displays the 1-based page number, as users count pages.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", i64::from(self.0) + 1)
    }
}
