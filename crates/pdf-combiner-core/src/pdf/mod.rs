mod document;
pub mod geometry;
pub(crate) mod overlay;
mod page_index;
mod render;
pub mod standard_font;

pub use document::{PdfDocument, page_count};
pub use geometry::{PageGeometry, PdfPoint, Rotation, ScreenPoint};
pub use page_index::PageIndex;
pub use render::{
    DEFAULT_RENDER_SCALE, PageRenderer, PageSize, encode_png, encode_webp, placeholder_image,
    render_file_page,
};
pub use standard_font::StandardFamily;
