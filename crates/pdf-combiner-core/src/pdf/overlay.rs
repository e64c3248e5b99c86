//! Burning overlay text into PDF pages.
//!
//! # Content Isolation
//!
//! The page's existing content may leave the graphics state in any shape
//! (a translated CTM, an odd fill color, an open clip). Overlays are drawn
//! in a clean state by wrapping the original content:
//! ```text
//! Contents = [ "q" , <original streams...> , "Q <overlay>" ]
//! ```
//! The original streams are referenced, never rewritten.
//!
//! # Placement
//!
//! A record's position is the top-left corner of its text block as the
//! user saw it. Each line is drawn with a text matrix that keeps it upright
//! on the displayed page, at
//! ```text
//! baseline(i) = position + down * (ASCENT * size + i * LEADING * size)
//! ```
//! where `down` is the user-space direction of "down" on the rotated page.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::model::OverlayRecord;
use super::geometry::{PageGeometry, inherited_attribute, resolve};
use super::standard_font::{ASCENT_FACTOR, LINE_HEIGHT_FACTOR, encode_win_ansi};

/// Page attributes that may live on an ancestor `/Pages` node.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Prefix for font resource names added to pages.
const FONT_PREFIX: &str = "PCF";

/// Copy a page dictionary with its inherited attributes made explicit.
///
/// The copy can be moved into a different page tree without losing its
/// resources or box. `/Parent` is dropped; the caller sets a new one.
pub(crate) fn materialize_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary> {
    let mut dict = doc
        .get_dictionary(page_id)
        .map_err(|e| Error::Lopdf(format!("Failed to read page object: {e}")))?
        .clone();

    for key in INHERITABLE {
        if dict.has(key) {
            continue;
        }
        if let Some(value) = inherited_attribute(doc, page_id, key) {
            dict.set(key.to_vec(), value.clone());
        }
    }

    if !dict.has(b"MediaBox") {
        dict.set(
            "MediaBox",
            Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
        );
    }

    dict.remove(b"Parent");
    Ok(dict)
}

/// Draw `records` onto a materialized page dictionary.
///
/// New font and content objects are added to `output`; `source` is the
/// document the page's own references point into (already renumbered to
/// share `output`'s id space).
pub(crate) fn burn_in(
    output: &mut Document,
    source: &Document,
    page: &mut Dictionary,
    geometry: &PageGeometry,
    records: &[OverlayRecord],
) -> Result<()> {
    if records.is_empty() {
        return Ok(());
    }

    let mut resources = owned_dictionary(source, page.get(b"Resources").ok());
    let mut fonts = owned_dictionary(source, resources.get(b"Font").ok());

    // One resource name per distinct base font
    let mut names: BTreeMap<&'static str, Vec<u8>> = BTreeMap::new();
    for record in records {
        let base_font = record.font.base_font();
        if names.contains_key(base_font) {
            continue;
        }
        let name = free_name(&fonts);
        let font_id = output.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(base_font.as_bytes().to_vec())),
            ("Encoding", Object::Name(b"WinAnsiEncoding".to_vec())),
        ]));
        fonts.set(name.clone(), Object::Reference(font_id));
        names.insert(base_font, name);
    }

    resources.set("Font", Object::Dictionary(fonts));
    page.set("Resources", Object::Dictionary(resources));

    let operations = overlay_operations(records, geometry, &names);
    let overlay = Content { operations }
        .encode()
        .map_err(|e| Error::PdfOverlay(format!("Failed to encode overlay content: {e}")))?;

    let mut suffix = b"Q\n".to_vec();
    suffix.extend_from_slice(&overlay);

    let existing = existing_contents(source, page.get(b"Contents").ok());
    let prefix_id = output.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let suffix_id = output.add_object(Stream::new(Dictionary::new(), suffix));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(prefix_id));
    contents.extend(existing);
    contents.push(Object::Reference(suffix_id));
    page.set("Contents", Object::Array(contents));

    Ok(())
}

/// Content-stream operations drawing every record, last one topmost.
fn overlay_operations(
    records: &[OverlayRecord],
    geometry: &PageGeometry,
    names: &BTreeMap<&'static str, Vec<u8>>,
) -> Vec<Operation> {
    let [a, b, c, d] = geometry.rotation.text_matrix();
    let [down_x, down_y] = geometry.rotation.down_vector();

    let mut ops = vec![Operation::new("q", vec![])];
    for record in records {
        let Some(name) = names.get(record.font.base_font()) else {
            continue;
        };
        let size = record.font.size;
        let color = record.color;

        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new(
            "Tf",
            vec![Object::Name(name.clone()), size.into()],
        ));
        ops.push(Operation::new(
            "rg",
            vec![color.r.into(), color.g.into(), color.b.into()],
        ));

        for (i, line) in record.lines().enumerate() {
            #[allow(clippy::cast_precision_loss)]
            let drop = size.mul_add(ASCENT_FACTOR, i as f32 * size * LINE_HEIGHT_FACTOR);
            let x = down_x.mul_add(drop, record.position.x);
            let y = down_y.mul_add(drop, record.position.y);
            ops.push(Operation::new(
                "Tm",
                vec![a.into(), b.into(), c.into(), d.into(), x.into(), y.into()],
            ));
            ops.push(Operation::new(
                "Tj",
                vec![Object::string_literal(encode_win_ansi(line))],
            ));
        }
        ops.push(Operation::new("ET", vec![]));
    }
    ops.push(Operation::new("Q", vec![]));
    ops
}

/// A directly owned copy of a dictionary that may be held by reference.
fn owned_dictionary(doc: &Document, object: Option<&Object>) -> Dictionary {
    object
        .map(|o| resolve(doc, o))
        .and_then(|o| o.as_dict().ok())
        .cloned()
        .unwrap_or_else(Dictionary::new)
}

/// Content stream references of a page, flattening an indirect array.
fn existing_contents(doc: &Document, contents: Option<&Object>) -> Vec<Object> {
    match contents {
        Some(Object::Array(items)) => items.clone(),
        Some(reference @ Object::Reference(_)) => match resolve(doc, reference) {
            Object::Array(items) => items.clone(),
            _ => vec![reference.clone()],
        },
        _ => Vec::new(),
    }
}

/// First `PCF<n>` name not already used in a font dictionary.
fn free_name(fonts: &Dictionary) -> Vec<u8> {
    (1..)
        .map(|n| format!("{FONT_PREFIX}{n}").into_bytes())
        .find(|name| !fonts.has(name))
        .unwrap_or_else(|| FONT_PREFIX.as_bytes().to_vec())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::TextColor;
    use crate::model::{FontSpec, RecordId};
    use crate::pdf::geometry::{PdfPoint, Rotation};

    fn record(text: &str, x: f32, y: f32, font: FontSpec) -> OverlayRecord {
        OverlayRecord {
            id: RecordId(1),
            text: text.to_string(),
            position: PdfPoint::new(x, y),
            font,
            color: TextColor::red(),
        }
    }

    /// One page under a `/Pages` node that carries the resources and box.
    fn inherited_doc() -> (Document, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), b"0 0 m 1 1 l S".to_vec()));
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
        ]));
        let fonts = Dictionary::from_iter([("PCF1", Object::Name(b"Taken".to_vec()))]);
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(vec![Object::Reference(page_id)])),
                ("Count", Object::Integer(1)),
                ("Resources", Object::Dictionary(Dictionary::from_iter([("Font", Object::Dictionary(fonts))]))),
                ("MediaBox", Object::Array(vec![0.into(), 0.into(), 300.into(), 400.into()])),
                ("Rotate", Object::Integer(90)),
            ])),
        );
        (doc, page_id)
    }

    #[test]
    fn test_materialize_copies_inherited_attributes() {
        let (doc, page_id) = inherited_doc();
        let dict = materialize_page(&doc, page_id).unwrap();
        assert!(dict.has(b"Resources"));
        assert!(dict.has(b"MediaBox"));
        assert_eq!(dict.get(b"Rotate").unwrap().as_i64().unwrap(), 90);
        assert!(!dict.has(b"Parent"));
    }

    #[test]
    fn test_burn_in_wraps_content_and_adds_font() {
        let (doc, page_id) = inherited_doc();
        let mut page = materialize_page(&doc, page_id).unwrap();
        let geometry = PageGeometry::from_page(&doc, page_id);
        let mut output = Document::with_version("1.5");
        output.max_id = doc.max_id;

        let records = [record("Hi", 10.0, 20.0, FontSpec::new("Arial", 12.0))];
        burn_in(&mut output, &doc, &mut page, &geometry, &records).unwrap();

        let Object::Array(contents) = page.get(b"Contents").unwrap() else {
            panic!("contents should be an array");
        };
        assert_eq!(contents.len(), 3);

        let prefix = output.get_object(contents[0].as_reference().unwrap()).unwrap();
        assert_eq!(prefix.as_stream().unwrap().content, b"q\n");
        let suffix = output.get_object(contents[2].as_reference().unwrap()).unwrap();
        let suffix = String::from_utf8_lossy(&suffix.as_stream().unwrap().content).into_owned();
        assert!(suffix.starts_with("Q\n"));
        assert!(suffix.contains("(Hi) Tj"));
        assert!(suffix.contains("/PCF2"));

        // The inherited font name is kept, ours avoids it
        let fonts = page
            .get(b"Resources")
            .and_then(Object::as_dict)
            .and_then(|r| r.get(b"Font"))
            .and_then(Object::as_dict)
            .unwrap();
        assert!(fonts.has(b"PCF1"));
        let ours = output
            .get_dictionary(fonts.get(b"PCF2").unwrap().as_reference().unwrap())
            .unwrap();
        assert_eq!(ours.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica");
    }

    #[test]
    fn test_no_records_leaves_page_untouched() {
        let (doc, page_id) = inherited_doc();
        let mut page = materialize_page(&doc, page_id).unwrap();
        let before = page.clone();
        let mut output = Document::with_version("1.5");
        burn_in(&mut output, &doc, &mut page, &PageGeometry::default(), &[]).unwrap();
        assert_eq!(format!("{before:?}"), format!("{page:?}"));
        assert!(output.objects.is_empty());
    }

    #[test]
    fn test_baselines_follow_rotation() {
        let font = FontSpec::new("Courier", 10.0);
        let records = [record("a\nb", 100.0, 200.0, font)];
        let names = BTreeMap::from([("Courier", b"PCF1".to_vec())]);

        let upright = PageGeometry::from_box([0.0, 0.0, 612.0, 792.0], Rotation::None);
        let ops = overlay_operations(&records, &upright, &names);
        let tms: Vec<&Operation> = ops.iter().filter(|o| o.operator == "Tm").collect();
        assert_eq!(tms.len(), 2);
        // First baseline 8pt below the top, second one leading (12.5pt) further
        assert_eq!(tms[0].operands[5].as_float().unwrap(), 192.0);
        assert_eq!(tms[1].operands[5].as_float().unwrap(), 179.5);

        let quarter = PageGeometry::from_box([0.0, 0.0, 612.0, 792.0], Rotation::Cw90);
        let ops = overlay_operations(&records, &quarter, &names);
        let tm = ops.iter().find(|o| o.operator == "Tm").unwrap();
        // Down on a clockwise quarter turn is +x in user space
        assert_eq!(tm.operands[4].as_float().unwrap(), 108.0);
        assert_eq!(tm.operands[5].as_float().unwrap(), 200.0);
        assert_eq!(tm.operands[1].as_float().unwrap(), 1.0);
    }

    #[test]
    fn test_free_name_skips_used() {
        let fonts = Dictionary::from_iter([("PCF1", Object::Null), ("PCF2", Object::Null)]);
        assert_eq!(free_name(&fonts), b"PCF3".to_vec());
        assert_eq!(free_name(&Dictionary::new()), b"PCF1".to_vec());
    }
}
