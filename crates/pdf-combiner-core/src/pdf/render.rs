use std::path::Path;

use image::{ImageEncoder, Rgba, RgbaImage};
use mupdf::{Colorspace, Matrix};
use webp::Encoder as WebpEncoder;

use crate::error::{Error, Result};
use super::document::PdfDocument;
use super::page_index::PageIndex;

/// Rendered page dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSize {
    pub width: u32,
    pub height: u32,
}

/// Default scale factor for rendering (1.0 = 72 dpi)
pub const DEFAULT_RENDER_SCALE: f32 = 1.0;

/// Placeholder background, light gray
const PLACEHOLDER_FILL: Rgba<u8> = Rgba([230, 230, 230, 255]);

/// Placeholder cross, mid gray
const PLACEHOLDER_INK: Rgba<u8> = Rgba([160, 160, 160, 255]);

/// Page rasterizer for PDF documents
pub struct PageRenderer<'a> {
    /// The PDF document to render
    pub doc: &'a PdfDocument,
    /// Scale factor for rendering
    pub scale: f32,
}

impl<'a> PageRenderer<'a> {
    pub const fn new(doc: &'a PdfDocument) -> Self {
        Self {
            doc,
            scale: DEFAULT_RENDER_SCALE,
        }
    }

    pub const fn with_scale(doc: &'a PdfDocument, scale: f32) -> Self {
        Self { doc, scale }
    }

    /// Get the pixel size of a page at the current scale
    pub fn page_size(&self, page_num: usize) -> Result<PageSize> {
        let page = self.load_page(page_num)?;
        let bounds = page.bounds().map_err(|e| render_error(page_num, "get bounds", &e))?;

        Ok(PageSize {
            width: f32_to_u32((bounds.x1 - bounds.x0) * self.scale),
            height: f32_to_u32((bounds.y1 - bounds.y0) * self.scale),
        })
    }

    /// Rasterize a page to an RGBA image buffer
    pub fn render_page(&self, page_num: usize) -> Result<RgbaImage> {
        let page = self.load_page(page_num)?;

        let matrix = Matrix::new_scale(self.scale, self.scale);
        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), 1.0, true)
            .map_err(|e| render_error(page_num, "render", &e))?;

        let width = pixmap.width();
        let height = pixmap.height();
        #[allow(clippy::cast_lossless)]
        let n = pixmap.n() as usize;
        if n == 0 {
            return Err(Error::PdfRender {
                page: page_num,
                reason: "Pixmap has no color components".to_string(),
            });
        }

        // MuPDF hands back 1, 3 or 4 components per pixel
        let mut rgba = Vec::with_capacity(width as usize * height as usize * 4);
        for px in pixmap.samples().chunks_exact(n) {
            match px {
                &[gray] => rgba.extend_from_slice(&[gray, gray, gray, 255]),
                &[r, g, b] => rgba.extend_from_slice(&[r, g, b, 255]),
                &[r, g, b, a] => rgba.extend_from_slice(&[r, g, b, a]),
                _ => {
                    return Err(Error::PdfRender {
                        page: page_num,
                        reason: format!("Unexpected pixel format with {n} components"),
                    });
                }
            }
        }

        RgbaImage::from_raw(width, height, rgba).ok_or_else(|| Error::PdfRender {
            page: page_num,
            reason: "Failed to create image buffer".to_string(),
        })
    }

    /// Render a page to PNG bytes
    pub fn render_page_png(&self, page_num: usize) -> Result<Vec<u8>> {
        encode_png(&self.render_page(page_num)?).map_err(|e| Error::PdfRender {
            page: page_num,
            reason: e,
        })
    }

    /// Render a page to WebP bytes
    pub fn render_page_webp(&self, page_num: usize) -> Result<Vec<u8>> {
        Ok(encode_webp(&self.render_page(page_num)?))
    }

    fn load_page(&self, page_num: usize) -> Result<mupdf::Page> {
        let page_index = PageIndex::try_from_page_num(page_num, self.doc.page_count())?;
        let doc = self.doc.open_document()?;
        doc.load_page(page_index.into())
            .map_err(|e| render_error(page_num, "load page", &e))
    }
}

fn render_error(page: usize, what: &str, err: &dyn std::fmt::Display) -> Error {
    Error::PdfRender {
        page,
        reason: format!("Failed to {what}: {err}"),
    }
}

/// Rasterize one page of a PDF on disk.
pub fn render_file_page(path: impl AsRef<Path>, page_num: usize, scale: f32) -> Result<RgbaImage> {
    let doc = PdfDocument::from_file(path)?;
    PageRenderer::with_scale(&doc, scale).render_page(page_num)
}

/// Encode an image as PNG (fast compression, still lossless)
pub fn encode_png(img: &RgbaImage) -> std::result::Result<Vec<u8>, String> {
    let mut png_data = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new_with_quality(
        &mut png_data,
        image::codecs::png::CompressionType::Fast,
        image::codecs::png::FilterType::Adaptive,
    );

    encoder
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|e| format!("Failed to encode PNG: {e}"))?;

    Ok(png_data)
}

/// Encode an image as lossy WebP (quality 85)
pub fn encode_webp(img: &RgbaImage) -> Vec<u8> {
    let encoder = WebpEncoder::from_rgba(img.as_raw(), img.width(), img.height());
    encoder.encode(85.0).to_vec()
}

/// Gray image with a diagonal cross, shown in place of a page that failed to render.
pub fn placeholder_image(width: u32, height: u32) -> RgbaImage {
    let (width, height) = (width.max(1), height.max(1));
    let mut img = RgbaImage::from_pixel(width, height, PLACEHOLDER_FILL);

    let steps = width.max(height);
    for i in 0..steps {
        let x = u64::from(i) * u64::from(width) / u64::from(steps);
        let y = u64::from(i) * u64::from(height) / u64::from(steps);
        #[allow(clippy::cast_possible_truncation)] // bounded by width/height
        let (x, y) = (x as u32, y as u32);
        img.put_pixel(x, y, PLACEHOLDER_INK);
        img.put_pixel(width - 1 - x, y, PLACEHOLDER_INK);
    }
    img
}

/// Convert f32 dimension to u32, clamping to valid range.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
const fn f32_to_u32(value: f32) -> u32 {
    const MAX: f32 = u32::MAX as f32;
    let clamped = if value < 0.0 {
        0.0
    } else if value > MAX {
        MAX
    } else {
        value
    };
    clamped as u32
}
