//! Layout files and `--text` flags: which pages, in what order, with which text.
//!
//! ```toml
//! inputs = ["a.pdf", "b.pdf"]
//! order = "3,1-2"
//! output = "combined.pdf"
//!
//! [[overlay]]
//! page = 1            # position in the final order, 1-based
//! x = 72.0            # points from the left edge of the page as displayed
//! y = 48.0            # points from the top edge
//! text = "Approved"
//! font = "Times New Roman"
//! size = 14.0
//! bold = true
//! color = "dark-red"  # a color name or #rrggbb
//! ```

use anyhow::{Context, Result, bail};
use pdf_combiner_core::{FontSpec, OverlayDefaults, TextColor};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A page/overlay layout read from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Layout {
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub order: Option<String>,
    #[serde(default, rename = "overlay")]
    pub overlays: Vec<OverlaySpec>,
}

impl Layout {
    /// Read a layout file. Relative paths are taken relative to the file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read layout {}", path.display()))?;
        let mut layout: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse layout {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for input in &mut layout.inputs {
            if input.is_relative() {
                *input = base.join(&*input);
            }
        }
        if let Some(output) = layout.output.as_mut()
            && output.is_relative()
        {
            *output = base.join(&*output);
        }
        Ok(layout)
    }
}

/// One piece of text to place, in points from the top-left of the displayed page.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OverlaySpec {
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub font: Option<String>,
    pub size: Option<f32>,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    pub color: Option<String>,
}

impl OverlaySpec {
    /// Parse a `--text` flag of the form `PAGE:X,Y:TEXT`.
    ///
    /// `\n` in TEXT starts a new line.
    pub fn parse_flag(spec: &str) -> Result<Self> {
        let mut parts = spec.splitn(3, ':');
        let (Some(page), Some(position), Some(text)) = (parts.next(), parts.next(), parts.next())
        else {
            bail!("Expected PAGE:X,Y:TEXT, got '{spec}'");
        };

        let page: usize = page.trim().parse().context("Invalid page in --text")?;
        let Some((x, y)) = position.split_once(',') else {
            bail!("Expected X,Y position in --text, got '{position}'");
        };

        Ok(Self {
            page,
            x: x.trim().parse().context("Invalid X in --text")?,
            y: y.trim().parse().context("Invalid Y in --text")?,
            text: text.replace("\\n", "\n"),
            font: None,
            size: None,
            bold: false,
            italic: false,
            color: None,
        })
    }

    /// Font for this overlay, falling back to the given defaults.
    pub fn font(&self, defaults: &OverlayDefaults) -> FontSpec {
        FontSpec::new(
            self.font.clone().unwrap_or_else(|| defaults.font_family.clone()),
            self.size.unwrap_or(defaults.font_size),
        )
        .with_style(self.bold, self.italic)
    }

    pub fn color(&self, fallback: TextColor) -> Result<TextColor> {
        match &self.color {
            None => Ok(fallback),
            Some(value) => {
                TextColor::parse(value).with_context(|| format!("Unknown color '{value}'"))
            }
        }
    }
}

/// Parse an order like `"3,1-2"` into 0-based positions, keeping the given order.
pub fn parse_order(order: &str, total: usize) -> Result<Vec<usize>> {
    let mut result = Vec::new();

    for part in order.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        if let Some((start, end)) = part.split_once('-') {
            let start: usize = start.trim().parse().context("Invalid page range start")?;
            let end: usize = end.trim().parse().context("Invalid page range end")?;
            if start > end {
                bail!("Page range {part} is reversed");
            }
            for page in start..=end {
                result.push(checked_position(page, total)?);
            }
        } else {
            let page: usize = part.parse().context("Invalid page number")?;
            result.push(checked_position(page, total)?);
        }
    }

    if result.is_empty() {
        bail!("Order '{order}' selects no pages");
    }
    Ok(result)
}

fn checked_position(page: usize, total: usize) -> Result<usize> {
    if page == 0 || page > total {
        bail!("Page {page} is out of range (1-{total})");
    }
    Ok(page - 1)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_order_keeps_sequence() {
        assert_eq!(parse_order("3,1-2", 3).unwrap(), [2, 0, 1]);
        assert_eq!(parse_order(" 2 , 1 ", 2).unwrap(), [1, 0]);
        assert!(parse_order("4", 3).is_err());
        assert!(parse_order("0", 3).is_err());
        assert!(parse_order("3-1", 3).is_err());
        assert!(parse_order(",", 3).is_err());
    }

    #[test]
    fn test_parse_text_flag() {
        let spec = OverlaySpec::parse_flag("2:72,36.5:Paid: thanks\\nBob").unwrap();
        assert_eq!(spec.page, 2);
        assert!((spec.x - 72.0).abs() < f32::EPSILON);
        assert!((spec.y - 36.5).abs() < f32::EPSILON);
        assert_eq!(spec.text, "Paid: thanks\nBob");

        assert!(OverlaySpec::parse_flag("2:72:missing y").is_err());
        assert!(OverlaySpec::parse_flag("two:1,2:x").is_err());
        assert!(OverlaySpec::parse_flag("1:1,2").is_err());
    }

    #[test]
    fn test_font_and_color_fallbacks() {
        let mut spec = OverlaySpec::parse_flag("1:0,0:x").unwrap();
        let defaults = OverlayDefaults::default();
        assert_eq!(spec.font(&defaults), FontSpec::new("Helvetica", 12.0));
        assert_eq!(spec.color(TextColor::blue()).unwrap(), TextColor::blue());

        spec.size = Some(20.0);
        spec.bold = true;
        spec.color = Some("#ff0000".to_string());
        assert_eq!(spec.font(&defaults), FontSpec::new("Helvetica", 20.0).with_style(true, false));
        assert_eq!(spec.color(TextColor::black()).unwrap(), TextColor::red());

        spec.color = Some("mauve".to_string());
        assert!(spec.color(TextColor::black()).is_err());
    }

    #[test]
    fn test_layout_paths_are_relative_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.toml");
        std::fs::write(
            &path,
            r#"
            inputs = ["a.pdf", "/abs/b.pdf"]
            output = "out/combined.pdf"
            order = "2,1"

            [[overlay]]
            page = 1
            x = 10.0
            y = 20.0
            text = "Hello"
            color = "blue"
            "#,
        )
        .unwrap();

        let layout = Layout::from_file(&path).unwrap();
        assert_eq!(layout.inputs[0], dir.path().join("a.pdf"));
        assert_eq!(layout.inputs[1], PathBuf::from("/abs/b.pdf"));
        assert_eq!(layout.output.unwrap(), dir.path().join("out/combined.pdf"));
        assert_eq!(layout.order.as_deref(), Some("2,1"));
        assert_eq!(layout.overlays.len(), 1);
        assert!(!layout.overlays[0].bold);
    }

    #[test]
    fn test_layout_rejects_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("layout.toml");
        std::fs::write(&path, "inptus = []\n").unwrap();
        assert!(Layout::from_file(&path).is_err());
    }
}
