use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Prefix for environment overrides, e.g. `PDF_COMBINER__RENDER__EDITOR_SCALE=3`.
pub const ENV_PREFIX: &str = "PDF_COMBINER";

/// Text color for overlay text, components in 0.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl TextColor {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub const fn red() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    pub const fn dark_red() -> Self {
        Self::new(0.8, 0.0, 0.0)
    }

    pub const fn blue() -> Self {
        Self::new(0.0, 0.0, 0.8)
    }

    pub const fn dark_green() -> Self {
        Self::new(0.0, 0.5, 0.0)
    }

    pub const fn purple() -> Self {
        Self::new(0.5, 0.0, 0.5)
    }

    /// Build from 8-bit channels.
    pub fn from_rgb_bytes(r: u8, g: u8, b: u8) -> Self {
        Self::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
        )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "black" => Some(Self::black()),
            "red" => Some(Self::red()),
            "darkred" | "dark_red" | "dark-red" => Some(Self::dark_red()),
            "blue" => Some(Self::blue()),
            "darkgreen" | "dark_green" | "dark-green" => Some(Self::dark_green()),
            "purple" => Some(Self::purple()),
            _ => None,
        }
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::from_rgb_bytes(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Parse either a color name or a hex string.
    pub fn parse(value: &str) -> Option<Self> {
        Self::from_name(value).or_else(|| Self::from_hex(value))
    }

    /// Convert to RGB bytes (0-255)
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_rgb_bytes(&self) -> (u8, u8, u8) {
        // Values are clamped to 0.0-1.0 range, so conversion is safe
        (
            (self.r.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.g.clamp(0.0, 1.0) * 255.0).round() as u8,
            (self.b.clamp(0.0, 1.0) * 255.0).round() as u8,
        )
    }

    /// Convert to `#rrggbb`, as used by HTML color inputs
    pub fn to_hex(&self) -> String {
        let (r, g, b) = self.to_rgb_bytes();
        format!("#{r:02x}{g:02x}{b:02x}")
    }

    /// Convert to CSS rgb() string
    pub fn to_css(&self) -> String {
        let (r, g, b) = self.to_rgb_bytes();
        format!("rgb({r}, {g}, {b})")
    }
}

impl Default for TextColor {
    fn default() -> Self {
        Self::black()
    }
}

/// Rasterization settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Scale for page-list thumbnails (1.0 = 72 dpi)
    #[serde(default = "default_thumbnail_scale")]
    pub thumbnail_scale: f32,

    /// Scale for the overlay editor background
    #[serde(default = "default_editor_scale")]
    pub editor_scale: f32,

    /// Upper bound accepted from front ends
    #[serde(default = "default_max_scale")]
    pub max_scale: f32,
}

const fn default_thumbnail_scale() -> f32 {
    1.0
}

const fn default_editor_scale() -> f32 {
    2.0
}

const fn default_max_scale() -> f32 {
    8.0
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            thumbnail_scale: default_thumbnail_scale(),
            editor_scale: default_editor_scale(),
            max_scale: default_max_scale(),
        }
    }
}

/// Defaults for newly added overlay text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverlayDefaults {
    #[serde(default = "default_overlay_text")]
    pub text: String,

    #[serde(default = "default_font_family")]
    pub font_family: String,

    #[serde(default = "default_font_size")]
    pub font_size: f32,

    #[serde(default)]
    pub color: TextColor,

    /// Where new text appears, in editor pixels from the top-left corner
    #[serde(default = "default_position_px")]
    pub position_px: [f32; 2],
}

fn default_overlay_text() -> String {
    "Double-click to edit".to_string()
}

fn default_font_family() -> String {
    "Helvetica".to_string()
}

const fn default_font_size() -> f32 {
    12.0
}

const fn default_position_px() -> [f32; 2] {
    [50.0, 50.0]
}

impl Default for OverlayDefaults {
    fn default() -> Self {
        Self {
            text: default_overlay_text(),
            font_family: default_font_family(),
            font_size: default_font_size(),
            color: TextColor::default(),
            position_px: default_position_px(),
        }
    }
}

/// Output document settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Compress content streams in the output
    #[serde(default = "default_true")]
    pub compress: bool,

    /// PDF header version of the output
    #[serde(default = "default_pdf_version")]
    pub pdf_version: String,
}

const fn default_true() -> bool {
    true
}

fn default_pdf_version() -> String {
    "1.5".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            compress: true,
            pdf_version: default_pdf_version(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub render: RenderConfig,

    #[serde(default)]
    pub overlay: OverlayDefaults,

    #[serde(default)]
    pub export: ExportConfig,
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load an optional file and layer `PDF_COMBINER__*` environment overrides on top.
    pub fn load_layered(file: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }
        let config: Self = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize::<Self>())
            .map_err(|e| Error::ConfigLoad(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations (~/.config/pdf-combiner/config.toml, ./config.toml)
    pub fn load() -> Self {
        let candidates = crate::util::config_dir()
            .map(|dir| dir.join("pdf-combiner").join("config.toml"))
            .into_iter()
            .chain(std::iter::once(PathBuf::from("config.toml")));

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_layered(Some(&path)) {
                Ok(config) => {
                    tracing::debug!("Loaded config from {}", path.display());
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load {}: {}", path.display(), e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::load_layered(None).unwrap_or_else(|e| {
            tracing::warn!("Ignoring environment overrides: {}", e);
            Self::default()
        })
    }

    /// Reject values that would make rendering or export meaningless.
    pub fn validate(&self) -> Result<()> {
        let positive = |field: &str, value: f32| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(Error::ConfigInvalid {
                    field: field.to_string(),
                    reason: format!("must be a positive number, got {value}"),
                })
            }
        };

        positive("render.thumbnail_scale", self.render.thumbnail_scale)?;
        positive("render.editor_scale", self.render.editor_scale)?;
        positive("render.max_scale", self.render.max_scale)?;
        positive("overlay.font_size", self.overlay.font_size)?;

        if self.render.editor_scale > self.render.max_scale {
            return Err(Error::ConfigInvalid {
                field: "render.editor_scale".to_string(),
                reason: format!("exceeds render.max_scale ({})", self.render.max_scale),
            });
        }
        Ok(())
    }

    /// Clamp a scale requested by a front end into the accepted range.
    pub fn clamp_scale(&self, scale: f32) -> f32 {
        if scale.is_finite() && scale > 0.0 {
            scale.min(self.render.max_scale)
        } else {
            self.render.editor_scale
        }
    }
}

/// Color options for UI
pub fn color_options() -> Vec<(&'static str, TextColor)> {
    vec![
        ("Black", TextColor::black()),
        ("Red", TextColor::red()),
        ("Dark Red", TextColor::dark_red()),
        ("Blue", TextColor::blue()),
        ("Dark Green", TextColor::dark_green()),
        ("Purple", TextColor::purple()),
    ]
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!((config.render.thumbnail_scale - 1.0).abs() < f32::EPSILON);
        assert!((config.render.editor_scale - 2.0).abs() < f32::EPSILON);
        assert_eq!(config.overlay.text, "Double-click to edit");
        assert_eq!(config.overlay.font_family, "Helvetica");
        assert_eq!(config.overlay.color, TextColor::black());
        assert!(config.export.compress);
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [render]
            editor_scale = 3.0

            [overlay]
            font_size = 18.0
            "#,
        )
        .unwrap();
        assert!((config.render.editor_scale - 3.0).abs() < f32::EPSILON);
        assert!((config.render.thumbnail_scale - 1.0).abs() < f32::EPSILON);
        assert!((config.overlay.font_size - 18.0).abs() < f32::EPSILON);
        assert_eq!(config.export.pdf_version, "1.5");
    }

    #[test]
    fn test_from_file_rejects_bad_scale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[render]\nthumbnail_scale = 0.0\n").unwrap();
        let err = AppConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, Error::ConfigInvalid { .. }));
    }

    #[test]
    fn test_load_layered_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[export]\ncompress = false\n").unwrap();
        let config = AppConfig::load_layered(Some(&path)).unwrap();
        assert!(!config.export.compress);
    }

    #[test]
    fn test_color_parsing() {
        assert_eq!(TextColor::parse("blue"), Some(TextColor::blue()));
        assert_eq!(TextColor::parse("#ff0000"), Some(TextColor::red()));
        assert_eq!(TextColor::parse("00ff00").unwrap().to_rgb_bytes(), (0, 255, 0));
        assert_eq!(TextColor::parse("nope"), None);
        assert_eq!(TextColor::parse("#12"), None);
        assert_eq!(TextColor::dark_green().to_hex(), "#008000");
    }

    #[test]
    fn test_clamp_scale() {
        let config = AppConfig::default();
        assert!((config.clamp_scale(100.0) - 8.0).abs() < f32::EPSILON);
        assert!((config.clamp_scale(-1.0) - 2.0).abs() < f32::EPSILON);
        assert!((config.clamp_scale(1.5) - 1.5).abs() < f32::EPSILON);
    }
}
