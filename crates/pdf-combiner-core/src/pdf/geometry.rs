//! Page geometry and the mapping between display pixels and PDF points.
//!
//! # Coordinate Systems
//!
//! PDF user space has a **bottom-left origin**: X grows to the right, Y grows
//! upward, and the page box may start anywhere (e.g. `[36 36 648 828]`).
//! A page's `/Rotate` turns the page clockwise when it is displayed.
//!
//! Display space is what MuPDF renders: a **top-left origin**, Y grows
//! downward, rotation already applied, measured in pixels at some scale.
//!
//! Overlay positions are stored in user space so they do not depend on the
//! preview scale. For the unrotated case the mapping is:
//! ```text
//! pdf_x = origin_x + screen_x / scale
//! pdf_y = origin_y + height - screen_y / scale
//! ```

use lopdf::{Dictionary, Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

/// US Letter, used when a page carries no usable box
const DEFAULT_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Maximum page-tree depth walked when resolving inherited attributes
const MAX_TREE_DEPTH: usize = 32;

/// A point in PDF user space, in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfPoint {
    pub x: f32,
    pub y: f32,
}

impl PdfPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A point in display space, in pixels at a given scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Offset by a delta (e.g. a drag vector).
    #[must_use]
    pub fn offset(self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Clockwise page rotation from `/Rotate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Cw90,
    Cw180,
    Cw270,
}

impl Rotation {
    /// Normalize a `/Rotate` value. Values that are not multiples of 90 are ignored.
    pub const fn from_degrees(degrees: i64) -> Self {
        match degrees.rem_euclid(360) {
            90 => Self::Cw90,
            180 => Self::Cw180,
            270 => Self::Cw270,
            _ => Self::None,
        }
    }

    pub const fn degrees(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Cw90 => 90,
            Self::Cw180 => 180,
            Self::Cw270 => 270,
        }
    }

    /// Whether display width and height are swapped relative to the page box.
    pub const fn is_sideways(self) -> bool {
        matches!(self, Self::Cw90 | Self::Cw270)
    }

    /// Text matrix `[a b c d]` that draws text upright on the displayed page.
    pub const fn text_matrix(self) -> [f32; 4] {
        match self {
            Self::None => [1.0, 0.0, 0.0, 1.0],
            Self::Cw90 => [0.0, 1.0, -1.0, 0.0],
            Self::Cw180 => [-1.0, 0.0, 0.0, -1.0],
            Self::Cw270 => [0.0, -1.0, 1.0, 0.0],
        }
    }

    /// User-space unit vector pointing "down" on the displayed page.
    pub const fn down_vector(self) -> [f32; 2] {
        match self {
            Self::None => [0.0, -1.0],
            Self::Cw90 => [1.0, 0.0],
            Self::Cw180 => [0.0, 1.0],
            Self::Cw270 => [-1.0, 0.0],
        }
    }
}

/// Visible page box plus rotation, as read from the page tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageGeometry {
    /// Lower-left corner of the page box in user space
    pub origin: PdfPoint,
    /// Unrotated box width in points
    pub width: f32,
    /// Unrotated box height in points
    pub height: f32,
    pub rotation: Rotation,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self::from_box(DEFAULT_BOX, Rotation::None)
    }
}

impl PageGeometry {
    /// Build from a `[x0 y0 x1 y1]` box; corners may come in any order.
    pub fn from_box(rect: [f32; 4], rotation: Rotation) -> Self {
        let (x0, x1) = (rect[0].min(rect[2]), rect[0].max(rect[2]));
        let (y0, y1) = (rect[1].min(rect[3]), rect[1].max(rect[3]));
        Self {
            origin: PdfPoint::new(x0, y0),
            width: x1 - x0,
            height: y1 - y0,
            rotation,
        }
    }

    /// Width and height as displayed, in points.
    pub const fn display_size(&self) -> (f32, f32) {
        if self.rotation.is_sideways() {
            (self.height, self.width)
        } else {
            (self.width, self.height)
        }
    }

    /// Display size in whole pixels at `scale`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn display_pixels(&self, scale: f32) -> (u32, u32) {
        let (w, h) = self.display_size();
        (
            (w * scale).round().max(0.0) as u32,
            (h * scale).round().max(0.0) as u32,
        )
    }

    /// Map a display-space point at `scale` into PDF user space.
    pub fn screen_to_pdf(&self, point: ScreenPoint, scale: f32) -> PdfPoint {
        let dx = point.x / scale;
        let dy = point.y / scale;
        let (w, h) = (self.width, self.height);

        let (ux, uy) = match self.rotation {
            Rotation::None => (dx, h - dy),
            Rotation::Cw90 => (dy, dx),
            Rotation::Cw180 => (w - dx, dy),
            Rotation::Cw270 => (w - dy, h - dx),
        };

        PdfPoint::new(self.origin.x + ux, self.origin.y + uy)
    }

    /// Map a PDF user-space point into display space at `scale`.
    pub fn pdf_to_screen(&self, point: PdfPoint, scale: f32) -> ScreenPoint {
        let ux = point.x - self.origin.x;
        let uy = point.y - self.origin.y;
        let (w, h) = (self.width, self.height);

        let (dx, dy) = match self.rotation {
            Rotation::None => (ux, h - uy),
            Rotation::Cw90 => (uy, ux),
            Rotation::Cw180 => (w - ux, uy),
            Rotation::Cw270 => (h - uy, w - ux),
        };

        ScreenPoint::new(dx * scale, dy * scale)
    }

    /// Read the geometry of a page, resolving inherited attributes.
    pub fn from_page(doc: &Document, page_id: ObjectId) -> Self {
        let rect = inherited_attribute(doc, page_id, b"CropBox")
            .and_then(|o| number_array::<4>(doc, o))
            .or_else(|| {
                inherited_attribute(doc, page_id, b"MediaBox")
                    .and_then(|o| number_array::<4>(doc, o))
            })
            .unwrap_or(DEFAULT_BOX);

        let rotation = inherited_attribute(doc, page_id, b"Rotate")
            .and_then(|o| resolve(doc, o).as_i64().ok())
            .map_or(Rotation::None, Rotation::from_degrees);

        Self::from_box(rect, rotation)
    }
}

/// Follow a reference to its target object, or return the object itself.
pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        other => other,
    }
}

/// Look up a page attribute, walking `/Parent` links for inheritable keys.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        current = parent_of(doc, current)?;
    }
    None
}

fn parent_of<'a>(doc: &'a Document, dict: &Dictionary) -> Option<&'a Dictionary> {
    let parent_id = dict.get(b"Parent").and_then(Object::as_reference).ok()?;
    doc.get_dictionary(parent_id).ok()
}

/// Read a fixed-size array of numbers, resolving indirect elements.
fn number_array<const N: usize>(doc: &Document, object: &Object) -> Option<[f32; N]> {
    let Object::Array(items) = resolve(doc, object) else {
        return None;
    };
    if items.len() != N {
        return None;
    }

    let mut out = [0.0; N];
    for (slot, item) in out.iter_mut().zip(items) {
        *slot = match resolve(doc, item) {
            #[allow(clippy::cast_precision_loss)]
            Object::Integer(i) => *i as f32,
            Object::Real(r) => *r,
            _ => return None,
        };
    }
    Some(out)
}
