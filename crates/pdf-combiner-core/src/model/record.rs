//! Overlay records: user-placed text attached to a page entry.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

use crate::config::{OverlayDefaults, TextColor};
use crate::error::{Error, Result};
use crate::pdf::geometry::PdfPoint;
use crate::pdf::standard_font::{StandardFamily, LINE_HEIGHT_FACTOR, resolve_family};

/// Smallest and largest accepted font sizes, in points
const MIN_FONT_SIZE: f32 = 1.0;
const MAX_FONT_SIZE: f32 = 720.0;

/// Stable handle of an overlay record within its page entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Font family, size and style of an overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FontSpec {
    /// Family name as chosen by the user (e.g. "Arial")
    pub family: String,
    /// Size in points
    pub size: f32,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
}

impl FontSpec {
    pub fn new(family: impl Into<String>, size: f32) -> Self {
        Self {
            family: family.into(),
            size,
            bold: false,
            italic: false,
        }
    }

    #[must_use]
    pub const fn with_style(mut self, bold: bool, italic: bool) -> Self {
        self.bold = bold;
        self.italic = italic;
        self
    }

    /// The base-14 family this font is drawn with.
    pub fn standard_family(&self) -> StandardFamily {
        resolve_family(&self.family)
    }

    /// Whether the family is unknown and drawn as Helvetica instead.
    pub fn is_substituted(&self) -> bool {
        StandardFamily::from_name(&self.family).is_none()
    }

    /// PostScript name of the font used in the exported PDF.
    pub fn base_font(&self) -> &'static str {
        self.standard_family().base_font(self.bold, self.italic)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.size.is_finite() && (MIN_FONT_SIZE..=MAX_FONT_SIZE).contains(&self.size)) {
            return Err(Error::InvalidStyle(format!(
                "font size {} outside {MIN_FONT_SIZE}..={MAX_FONT_SIZE}",
                self.size
            )));
        }
        if self.family.trim().is_empty() {
            return Err(Error::InvalidStyle("empty font family".to_string()));
        }
        if self.is_substituted() {
            warn!("Unknown font family '{}', using Helvetica", self.family);
        }
        Ok(())
    }

    /// Approximate width and height of a text block in points.
    #[allow(clippy::cast_precision_loss)]
    pub fn text_extent(&self, text: &str) -> (f32, f32) {
        let char_width = self.size * self.standard_family().char_width_factor();
        let lines: Vec<&str> = text.split('\n').collect();
        let longest = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
        (
            longest as f32 * char_width,
            lines.len() as f32 * self.size * LINE_HEIGHT_FACTOR,
        )
    }
}

impl Default for FontSpec {
    fn default() -> Self {
        Self::new("Helvetica", 12.0)
    }
}

impl From<&OverlayDefaults> for FontSpec {
    fn from(defaults: &OverlayDefaults) -> Self {
        Self::new(defaults.font_family.clone(), defaults.font_size)
    }
}

/// One piece of user-added text.
///
/// `position` is the top-left corner of the text block as displayed,
/// in PDF user-space points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayRecord {
    pub id: RecordId,
    pub text: String,
    pub position: PdfPoint,
    pub font: FontSpec,
    pub color: TextColor,
}

impl OverlayRecord {
    /// Lines of text, split on newlines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.split('\n')
    }

    /// Approximate width and height of the block in points.
    pub fn extent(&self) -> (f32, f32) {
        self.font.text_extent(&self.text)
    }
}
