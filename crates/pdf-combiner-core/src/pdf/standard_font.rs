//! PDF standard 14 fonts for overlay text.
//!
//! Overlay text is drawn with the base-14 Type1 fonts every PDF viewer
//! ships, so nothing has to be embedded. Arbitrary family names from the UI
//! are folded onto Helvetica, Times or Courier, and text is encoded as
//! WinAnsi (CP1252). Characters outside WinAnsi become `?`.

use serde::{Deserialize, Serialize};

/// Line height as a multiple of font size.
pub const LINE_HEIGHT_FACTOR: f32 = 1.25;

/// Distance from the top of a line box to its baseline, as a fraction of size.
pub const ASCENT_FACTOR: f32 = 0.8;

/// Replacement byte for characters WinAnsi cannot represent.
const REPLACEMENT: u8 = b'?';

/// The three base-14 families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardFamily {
    Helvetica,
    Times,
    Courier,
}

impl StandardFamily {
    /// Fold a family name onto a base-14 family, `None` if it is unknown.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_lowercase();
        let family = match lower.as_str() {
            "helvetica" | "arial" | "sans" | "sans-serif" | "sansserif" | "liberation sans"
            | "dejavu sans" | "verdana" | "segoe ui" => Self::Helvetica,
            "times" | "times new roman" | "times-roman" | "serif" | "georgia"
            | "liberation serif" | "dejavu serif" => Self::Times,
            "courier" | "courier new" | "mono" | "monospace" | "consolas" | "menlo"
            | "liberation mono" | "dejavu sans mono" => Self::Courier,
            _ => return None,
        };
        Some(family)
    }

    /// Average glyph advance as a fraction of the font size.
    pub const fn char_width_factor(self) -> f32 {
        match self {
            Self::Helvetica => 0.55,
            Self::Times => 0.5,
            Self::Courier => 0.6,
        }
    }

    /// CSS font stack for previews.
    pub const fn css_stack(self) -> &'static str {
        match self {
            Self::Helvetica => "Helvetica, Arial, sans-serif",
            Self::Times => "'Times New Roman', Times, serif",
            Self::Courier => "'Courier New', Courier, monospace",
        }
    }

    /// PostScript name of the base-14 variant.
    pub const fn base_font(self, bold: bool, italic: bool) -> &'static str {
        match (self, bold, italic) {
            (Self::Helvetica, false, false) => "Helvetica",
            (Self::Helvetica, true, false) => "Helvetica-Bold",
            (Self::Helvetica, false, true) => "Helvetica-Oblique",
            (Self::Helvetica, true, true) => "Helvetica-BoldOblique",
            (Self::Times, false, false) => "Times-Roman",
            (Self::Times, true, false) => "Times-Bold",
            (Self::Times, false, true) => "Times-Italic",
            (Self::Times, true, true) => "Times-BoldItalic",
            (Self::Courier, false, false) => "Courier",
            (Self::Courier, true, false) => "Courier-Bold",
            (Self::Courier, false, true) => "Courier-Oblique",
            (Self::Courier, true, true) => "Courier-BoldOblique",
        }
    }
}

/// Resolve a family name, falling back to Helvetica.
///
/// Called on every render and hit test, so it stays silent; the fallback is
/// reported once, when the font is set on a record.
pub fn resolve_family(name: &str) -> StandardFamily {
    StandardFamily::from_name(name).unwrap_or(StandardFamily::Helvetica)
}

/// Encode text as WinAnsi bytes for a literal PDF string.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars().map(win_ansi_byte).collect()
}

fn win_ansi_byte(c: char) -> u8 {
    let code = u32::from(c);
    // ASCII and the Latin-1 upper half coincide with CP1252
    if (0x20..0x7F).contains(&code) || (0xA0..=0xFF).contains(&code) {
        #[allow(clippy::cast_possible_truncation)]
        return code as u8;
    }
    match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        '\t' => b' ',
        _ => REPLACEMENT,
    }
}
