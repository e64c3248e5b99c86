//! Export: re-read every source page, burn in its overlays, merge in order.
//!
//! Each distinct source file is parsed once and renumbered into a shared
//! object-id space. Every exported page gets a fresh page dictionary (with
//! inherited attributes copied in), so the same source page can appear
//! more than once. The source's other objects are carried over and
//! unreferenced ones are pruned before saving. Source page objects are not
//! carried over, so annotations lose their `/P` back-reference and any
//! link or GoTo action that targets a source page.
//!
//! The whole document is built in memory first. [`Exporter::export_to_file`]
//! only touches the destination once that succeeded, and then replaces it
//! atomically.

use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::ExportConfig;
use crate::error::{Error, Result};
use crate::model::{OverlayRecord, PageEntry, SourceRef};
use crate::pdf::overlay::{burn_in, materialize_page};
use crate::pdf::{PageGeometry, PageIndex};
use crate::util::fingerprint;

/// Progress callback, called with `(pages done, total pages)`.
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send>;

/// Object types that belong to a source's document structure, not to its pages.
const STRUCTURAL_TYPES: [&[u8]; 7] = [
    b"Catalog", b"Pages", b"Page", b"Outlines", b"Outline", b"XRef", b"ObjStm",
];

/// What the exporter needs from a page entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportPage {
    pub source: SourceRef,
    pub overlays: Vec<OverlayRecord>,
}

impl From<&PageEntry> for ExportPage {
    fn from(entry: &PageEntry) -> Self {
        Self {
            source: entry.source().clone(),
            overlays: entry.overlays().to_vec(),
        }
    }
}

/// A merged document held in memory.
#[derive(Debug, Clone)]
pub struct ExportOutput {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Sources whose contents changed since they were loaded
    pub changed_sources: Vec<PathBuf>,
}

/// Result of writing a merged document to disk.
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub path: PathBuf,
    pub page_count: usize,
    pub byte_len: usize,
    pub changed_sources: Vec<PathBuf>,
}

/// Builds the combined PDF.
pub struct Exporter {
    config: ExportConfig,
    progress: Option<ProgressCallback>,
}

impl Exporter {
    pub const fn new(config: ExportConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, callback: impl Fn(usize, usize) + Send + 'static) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    pub const fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Build the merged document in memory.
    pub fn export_to_bytes(&self, pages: &[ExportPage]) -> Result<ExportOutput> {
        if pages.is_empty() {
            return Err(Error::ExportEmpty);
        }
        let total = pages.len();

        // Parse every distinct source once, in order of first use
        let mut sources: Vec<SourceDoc> = Vec::new();
        let mut by_path: HashMap<&Path, usize> = HashMap::new();
        let mut slots = Vec::with_capacity(total);
        let mut changed_sources: Vec<PathBuf> = Vec::new();
        let mut next_id = 1;

        for (i, page) in pages.iter().enumerate() {
            let path = page.source.path.as_path();
            let slot = if let Some(&slot) = by_path.get(path) {
                slot
            } else {
                let source = SourceDoc::load(path, next_id)
                    .map_err(|reason| export_error(i, path, reason))?;
                next_id = source.doc.max_id + 1;
                sources.push(source);
                by_path.insert(path, sources.len() - 1);
                sources.len() - 1
            };

            let expected = &page.source.fingerprint;
            if !expected.is_empty()
                && *expected != sources[slot].fingerprint
                && !changed_sources.iter().any(|p| p == path)
            {
                warn!("{} changed since it was loaded", path.display());
                changed_sources.push(path.to_path_buf());
            }
            slots.push(slot);
        }

        let mut output = Document::with_version(self.config.pdf_version.as_str());
        output.max_id = next_id - 1;
        let pages_id = output.new_object_id();

        let mut kids = Vec::with_capacity(total);
        for (i, (page, &slot)) in pages.iter().zip(&slots).enumerate() {
            let dict = sources[slot]
                .page_dictionary(page, pages_id, &mut output)
                .map_err(|e| export_error(i, &page.source.path, e.to_string()))?;
            kids.push(Object::Reference(output.add_object(dict)));

            debug!(
                "Exported page {}/{} ({} page {}, {} overlays)",
                i + 1,
                total,
                page.source.path.display(),
                page.source.page_index + 1,
                page.overlays.len()
            );
            if let Some(callback) = &self.progress {
                callback(i + 1, total);
            }
        }

        for source in sources {
            for (object_id, mut object) in source.doc.objects {
                let type_name = object.type_name().unwrap_or(b"");
                if STRUCTURAL_TYPES.contains(&type_name) {
                    continue;
                }
                if let Object::Dictionary(dict) = &mut object
                    && is_annotation(dict)
                {
                    source.links.detach(dict);
                }
                output.objects.insert(object_id, object);
            }
        }

        #[allow(clippy::cast_possible_wrap)]
        let count = total as i64;
        output.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(count)),
            ])),
        );
        let catalog_id = output.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        output.trailer.set("Root", Object::Reference(catalog_id));

        output.prune_objects();
        output.renumber_objects();
        if self.config.compress {
            output.compress();
        }

        let mut bytes = Vec::new();
        output
            .save_to(&mut bytes)
            .map_err(|e| Error::PdfSave(format!("Failed to save combined PDF: {e}")))?;

        Ok(ExportOutput {
            bytes,
            page_count: total,
            changed_sources,
        })
    }

    /// Build the merged document and atomically write it to `dest`.
    ///
    /// On any failure `dest` is left as it was.
    pub fn export_to_file(&self, pages: &[ExportPage], dest: &Path) -> Result<ExportSummary> {
        let output = self.export_to_bytes(pages)?;
        write_atomic(dest, &output.bytes)?;

        info!(
            "Exported {} pages to {} ({} bytes)",
            output.page_count,
            dest.display(),
            output.bytes.len()
        );

        Ok(ExportSummary {
            path: dest.to_path_buf(),
            page_count: output.page_count,
            byte_len: output.bytes.len(),
            changed_sources: output.changed_sources,
        })
    }
}

/// Write `bytes` to a temporary file next to `dest`, then rename it over `dest`.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let failed = |reason: String| Error::ExportDestination {
        path: dest.to_path_buf(),
        reason,
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".pdf-combiner-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| failed(e.to_string()))?;
    tmp.write_all(bytes).map_err(|e| failed(e.to_string()))?;
    tmp.as_file().sync_all().map_err(|e| failed(e.to_string()))?;
    tmp.persist(dest).map_err(|e| failed(e.error.to_string()))?;
    Ok(())
}

fn export_error(index: usize, path: &Path, reason: String) -> Error {
    Error::Export {
        page: index + 1,
        path: path.to_path_buf(),
        reason,
    }
}

/// A parsed source file, renumbered into the output's id space.
struct SourceDoc {
    doc: Document,
    pages: BTreeMap<u32, ObjectId>,
    links: PageLinks,
    fingerprint: String,
}

/// A source's page objects and the GoTo actions that point at them.
#[derive(Debug, Default)]
struct PageLinks {
    pages: HashSet<ObjectId>,
    actions: HashSet<ObjectId>,
}

impl PageLinks {
    fn collect(doc: &Document, pages: &BTreeMap<u32, ObjectId>) -> Self {
        let mut links = Self {
            pages: pages.values().copied().collect(),
            actions: HashSet::new(),
        };
        let actions = doc
            .objects
            .iter()
            .filter_map(|(&id, object)| {
                let action = object.as_dict().ok()?;
                action
                    .get(b"D")
                    .is_ok_and(|dest| links.targets_page(dest))
                    .then_some(id)
            })
            .collect();
        links.actions = actions;
        links
    }

    /// Explicit destination (`[page /Fit ...]`) on one of the source's pages.
    fn targets_page(&self, dest: &Object) -> bool {
        dest.as_array()
            .ok()
            .and_then(|items| items.first())
            .and_then(|first| first.as_reference().ok())
            .is_some_and(|id| self.pages.contains(&id))
    }

    /// Remove everything in `annot` that refers to a source page.
    fn detach(&self, annot: &mut Dictionary) {
        annot.remove(b"P");
        if annot.get(b"Dest").is_ok_and(|dest| self.targets_page(dest)) {
            annot.remove(b"Dest");
        }
        let page_action = match annot.get(b"A") {
            Ok(Object::Reference(id)) => self.actions.contains(id),
            Ok(Object::Dictionary(action)) => {
                action.get(b"D").is_ok_and(|dest| self.targets_page(dest))
            }
            _ => false,
        };
        if page_action {
            annot.remove(b"A");
        }
    }
}

fn is_annotation(dict: &Dictionary) -> bool {
    dict.has(b"Subtype") && dict.has(b"Rect")
}

impl SourceDoc {
    fn load(path: &Path, first_id: u32) -> std::result::Result<Self, String> {
        let bytes = std::fs::read(path).map_err(|e| format!("cannot read source: {e}"))?;
        let mut doc =
            Document::load_mem(&bytes).map_err(|e| format!("cannot parse source: {e}"))?;
        if doc.is_encrypted() {
            return Err("source is password-protected".to_string());
        }

        doc.renumber_objects_with(first_id);
        let pages = doc.get_pages();
        let links = PageLinks::collect(&doc, &pages);
        Ok(Self {
            doc,
            pages,
            links,
            fingerprint: fingerprint(&bytes),
        })
    }

    fn page_dictionary(
        &self,
        page: &ExportPage,
        parent: ObjectId,
        output: &mut Document,
    ) -> Result<Dictionary> {
        let index = PageIndex::try_from_page_num(page.source.page_index, self.pages.len())?;
        let page_id = self
            .pages
            .get(&index.as_lopdf_page_number())
            .copied()
            .ok_or(Error::PdfInvalidPage {
                page: page.source.page_index,
                total: self.pages.len(),
            })?;

        let mut dict = materialize_page(&self.doc, page_id)?;
        if let Ok(Object::Array(annots)) = dict.get_mut(b"Annots") {
            for annot in annots {
                if let Object::Dictionary(annot) = annot {
                    self.links.detach(annot);
                }
            }
        }
        let geometry = PageGeometry::from_page(&self.doc, page_id);
        burn_in(output, &self.doc, &mut dict, &geometry, &page.overlays)?;
        dict.set("Parent", Object::Reference(parent));
        Ok(dict)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::TextColor;
    use crate::model::{FontSpec, RecordId};
    use crate::pdf::PdfPoint;
    use lopdf::Stream;
    use lopdf::content::{Content, Operation};
    use std::sync::{Arc, Mutex};

    /// One page per entry of `texts`, each drawing its text.
    fn write_pdf(dir: &Path, name: &str, texts: &[&str]) -> PathBuf {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ]));
        let resources_id = doc.add_object(Dictionary::from_iter([(
            "Font",
            Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
        )]));

        let kids: Vec<Object> = texts
            .iter()
            .map(|text| {
                let content = Content {
                    operations: vec![
                        Operation::new("BT", vec![]),
                        Operation::new("Tf", vec!["F1".into(), 24.into()]),
                        Operation::new("Td", vec![100.into(), 700.into()]),
                        Operation::new("Tj", vec![Object::string_literal(*text)]),
                        Operation::new("ET", vec![]),
                    ],
                };
                let content_id =
                    doc.add_object(Stream::new(Dictionary::new(), content.encode().unwrap()));
                Object::Reference(doc.add_object(Dictionary::from_iter([
                    ("Type", Object::Name(b"Page".to_vec())),
                    ("Parent", Object::Reference(pages_id)),
                    ("Contents", Object::Reference(content_id)),
                ])))
            })
            .collect();

        #[allow(clippy::cast_possible_wrap)]
        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(count)),
                ("Resources", Object::Reference(resources_id)),
                (
                    "MediaBox",
                    Object::Array(vec![0.into(), 0.into(), 612.into(), 792.into()]),
                ),
            ])),
        );
        let catalog_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let path = dir.join(name);
        doc.save(&path).unwrap();
        path
    }

    fn page(path: &Path, page_index: usize) -> ExportPage {
        ExportPage {
            source: SourceRef {
                path: path.to_path_buf(),
                page_index,
                fingerprint: String::new(),
            },
            overlays: Vec::new(),
        }
    }

    fn uncompressed() -> Exporter {
        Exporter::new(ExportConfig {
            compress: false,
            ..ExportConfig::default()
        })
    }

    fn page_contents(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|&id| String::from_utf8_lossy(&doc.get_page_content(id).unwrap()).into_owned())
            .collect()
    }

    #[test]
    fn test_export_follows_document_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", &["A1", "A2"]);
        let b = write_pdf(dir.path(), "b.pdf", &["B1"]);

        let order = [page(&a, 0), page(&b, 0), page(&a, 1)];
        let output = uncompressed().export_to_bytes(&order).unwrap();
        assert_eq!(output.page_count, 3);

        let contents = page_contents(&output.bytes);
        assert_eq!(contents.len(), 3);
        assert!(contents[0].contains("(A1)"));
        assert!(contents[1].contains("(B1)"));
        assert!(contents[2].contains("(A2)"));
    }

    #[test]
    fn test_same_page_twice() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", &["A1"]);
        let output = uncompressed().export_to_bytes(&[page(&a, 0), page(&a, 0)]).unwrap();
        assert_eq!(page_contents(&output.bytes).len(), 2);
    }

    #[test]
    fn test_overlays_are_burned_in() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", &["A1"]);
        let mut entry = page(&a, 0);
        entry.overlays.push(OverlayRecord {
            id: RecordId(1),
            text: "Approved".to_string(),
            position: PdfPoint::new(72.0, 720.0),
            font: FontSpec::new("Times New Roman", 14.0).with_style(true, false),
            color: TextColor::blue(),
        });

        let output = uncompressed().export_to_bytes(&[entry]).unwrap();
        let contents = page_contents(&output.bytes);
        assert!(contents[0].contains("(A1)"));
        assert!(contents[0].contains("(Approved) Tj"));

        let doc = Document::load_mem(&output.bytes).unwrap();
        assert!(doc.objects.values().any(|o| {
            o.as_dict()
                .and_then(|d| d.get(b"BaseFont"))
                .and_then(Object::as_name)
                .is_ok_and(|name| name == b"Times-Bold")
        }));
    }

    #[test]
    fn test_no_overlays_keeps_content_identical() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", &["A1", "A2"]);
        let source = Document::load(&a).unwrap();
        let source_id = *source.get_pages().get(&2).unwrap();
        let original = source.get_page_content(source_id).unwrap();

        let output = uncompressed().export_to_bytes(&[page(&a, 1)]).unwrap();
        let doc = Document::load_mem(&output.bytes).unwrap();
        let id = *doc.get_pages().get(&1).unwrap();
        assert_eq!(doc.get_page_content(id).unwrap(), original);
    }

    #[test]
    fn test_missing_source_names_page_and_file() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", &["A1"]);
        let b = write_pdf(dir.path(), "b.pdf", &["B1"]);
        std::fs::remove_file(&b).unwrap();

        let dest = dir.path().join("out.pdf");
        std::fs::write(&dest, b"previous export").unwrap();

        let err = uncompressed()
            .export_to_file(&[page(&a, 0), page(&b, 0)], &dest)
            .unwrap_err();
        match &err {
            Error::Export { page, path, .. } => {
                assert_eq!(*page, 2);
                assert_eq!(path, &b);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("b.pdf"));
        assert_eq!(std::fs::read(&dest).unwrap(), b"previous export");
    }

    #[test]
    fn test_failed_export_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", &["A1"]);
        let dest = dir.path().join("out.pdf");

        assert!(uncompressed().export_to_file(&[page(&a, 5)], &dest).is_err());
        assert!(!dest.exists());
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_empty_export() {
        assert!(matches!(
            uncompressed().export_to_bytes(&[]),
            Err(Error::ExportEmpty)
        ));
    }

    #[test]
    fn test_unwritable_destination() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", &["A1"]);
        let dest = dir.path().join("missing-dir").join("out.pdf");
        let err = uncompressed().export_to_file(&[page(&a, 0)], &dest).unwrap_err();
        assert!(matches!(err, Error::ExportDestination { .. }));
    }

    #[test]
    fn test_progress_and_changed_sources() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", &["A1", "A2"]);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let exporter = uncompressed().with_progress(move |done, total| {
            sink.lock().unwrap().push((done, total));
        });

        let mut first = page(&a, 0);
        first.source.fingerprint = "stale".to_string();
        let summary = exporter
            .export_to_file(&[first, page(&a, 1)], &dir.path().join("out.pdf"))
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), [(1, 2), (2, 2)]);
        assert_eq!(summary.changed_sources, [a]);
        assert_eq!(summary.page_count, 2);
        assert!(summary.byte_len > 0);
    }

    /// Give the first page three links: to page 2, via a GoTo action to
    /// page 2, and to a web address.
    fn add_links(path: &Path) {
        let mut doc = Document::load(path).unwrap();
        let pages: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        let (first, second) = (pages[0], pages[1]);
        let fit = || Object::Array(vec![Object::Reference(second), Object::Name(b"Fit".to_vec())]);
        let rect = || Object::Array(vec![0.into(), 0.into(), 10.into(), 10.into()]);

        let to_page = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Annot".to_vec())),
            ("Subtype", Object::Name(b"Link".to_vec())),
            ("Rect", rect()),
            ("P", Object::Reference(first)),
            ("Dest", fit()),
        ]));
        let goto = doc.add_object(Dictionary::from_iter([
            ("S", Object::Name(b"GoTo".to_vec())),
            ("D", fit()),
        ]));
        let via_action = doc.add_object(Dictionary::from_iter([
            ("Subtype", Object::Name(b"Link".to_vec())),
            ("Rect", rect()),
            ("P", Object::Reference(first)),
            ("A", Object::Reference(goto)),
        ]));
        let to_web = doc.add_object(Dictionary::from_iter([
            ("Subtype", Object::Name(b"Link".to_vec())),
            ("Rect", rect()),
            ("P", Object::Reference(first)),
            (
                "A",
                Object::Dictionary(Dictionary::from_iter([
                    ("S", Object::Name(b"URI".to_vec())),
                    ("URI", Object::string_literal("https://example.org")),
                ])),
            ),
        ]));

        doc.get_object_mut(first)
            .and_then(Object::as_dict_mut)
            .unwrap()
            .set(
                "Annots",
                Object::Array(vec![
                    Object::Reference(to_page),
                    Object::Reference(via_action),
                    Object::Reference(to_web),
                ]),
            );
        doc.save(path).unwrap();
    }

    fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
        match object {
            Object::Reference(id) => out.push(*id),
            Object::Array(items) => items.iter().for_each(|o| collect_references(o, out)),
            Object::Dictionary(dict) => dict.iter().for_each(|(_, o)| collect_references(o, out)),
            Object::Stream(stream) => {
                stream.dict.iter().for_each(|(_, o)| collect_references(o, out));
            }
            _ => {}
        }
    }

    #[test]
    fn test_annotations_do_not_point_at_source_pages() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_pdf(dir.path(), "a.pdf", &["one", "two"]);
        add_links(&a);

        let output = uncompressed().export_to_bytes(&[page(&a, 0)]).unwrap();
        let doc = Document::load_mem(&output.bytes).unwrap();

        let page_id = *doc.get_pages().values().next().unwrap();
        let annots = doc
            .get_dictionary(page_id)
            .unwrap()
            .get(b"Annots")
            .unwrap()
            .as_array()
            .unwrap()
            .clone();
        assert_eq!(annots.len(), 3);

        let annots: Vec<&Dictionary> = annots
            .iter()
            .map(|a| doc.get_dictionary(a.as_reference().unwrap()).unwrap())
            .collect();
        assert!(annots.iter().all(|annot| !annot.has(b"P")));
        assert!(!annots[0].has(b"Dest"));
        assert!(!annots[1].has(b"A"));
        assert!(annots[2].has(b"A"));

        let mut references = Vec::new();
        for object in doc.objects.values() {
            collect_references(object, &mut references);
        }
        for id in references {
            assert!(doc.objects.contains_key(&id), "dangling reference {id:?}");
        }
    }
}
