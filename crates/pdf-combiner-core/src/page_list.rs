//! Page list controller: the thumbnail strip and its selection.

use tracing::debug;

use crate::config::OverlayDefaults;
use crate::editor::OverlayEditor;
use crate::error::{Error, Result};
use crate::model::{EntryId, PageEntry, PageModel};

/// One row of the thumbnail strip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListItem {
    pub id: EntryId,
    /// 0-based position in the document order
    pub position: usize,
    pub label: String,
    pub selected: bool,
    pub overlay_count: usize,
    /// Set when the thumbnail is a placeholder
    pub render_error: Option<String>,
}

/// Selection state plus the list actions that depend on it.
#[derive(Debug, Clone, Default)]
pub struct PageListController {
    selected: Option<EntryId>,
}

impl PageListController {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn selected(&self) -> Option<EntryId> {
        self.selected
    }

    pub fn select(&mut self, model: &PageModel, id: EntryId) -> Result<()> {
        model.entry(id)?;
        self.selected = Some(id);
        Ok(())
    }

    /// Select by position; out-of-range positions clear the selection.
    pub fn select_position(&mut self, model: &PageModel, position: usize) -> Option<EntryId> {
        self.selected = model.entries().get(position).map(PageEntry::id);
        self.selected
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// Drop the selection if its entry is gone.
    pub fn sync(&mut self, model: &PageModel) {
        if self.selected.is_some_and(|id| model.get(id).is_none()) {
            self.selected = None;
        }
    }

    /// Move the selected entry up. The selection follows it.
    pub fn move_up(&mut self, model: &mut PageModel) -> Result<bool> {
        let Some(id) = self.selected else {
            return Ok(false);
        };
        model.move_up(id)
    }

    /// Move the selected entry down. The selection follows it.
    pub fn move_down(&mut self, model: &mut PageModel) -> Result<bool> {
        let Some(id) = self.selected else {
            return Ok(false);
        };
        model.move_down(id)
    }

    /// Remove the selected entry and select its successor (or the new last entry).
    pub fn remove_selected(&mut self, model: &mut PageModel) -> Result<Option<PageEntry>> {
        let Some(id) = self.selected else {
            return Ok(None);
        };
        let position = model.position_of(id).ok_or(Error::EntryNotFound(id.0))?;
        let removed = model.remove(id)?;
        debug!("Removed {}", removed.label());

        let next = position.min(model.len().saturating_sub(1));
        self.select_position(model, next);
        Ok(Some(removed))
    }

    /// Open the overlay editor on the selected entry.
    pub fn activate(
        &self,
        model: &PageModel,
        scale: f32,
        defaults: OverlayDefaults,
    ) -> Result<OverlayEditor> {
        let id = self.selected.ok_or(Error::NoSelection)?;
        OverlayEditor::open(model, id, scale, defaults)
    }

    /// Rows for the thumbnail strip, in document order.
    pub fn items(&self, model: &PageModel) -> Vec<ListItem> {
        model
            .entries()
            .iter()
            .enumerate()
            .map(|(position, entry)| ListItem {
                id: entry.id(),
                position,
                label: entry.label(),
                selected: self.selected == Some(entry.id()),
                overlay_count: entry.overlays().len(),
                render_error: entry.thumbnail().failure_reason().map(str::to_string),
            })
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{LoadedPage, LoadedSource, Thumbnail};
    use crate::pdf::{PageGeometry, placeholder_image};
    use std::path::PathBuf;

    fn model() -> PageModel {
        let mut model = PageModel::new();
        for (name, pages) in [("a.pdf", 2), ("b.pdf", 1)] {
            model.append_source(LoadedSource {
                path: PathBuf::from(name),
                fingerprint: String::new(),
                pages: (0..pages)
                    .map(|page_index| LoadedPage {
                        page_index,
                        geometry: PageGeometry::default(),
                        thumbnail: Thumbnail::Rendered(placeholder_image(2, 2)),
                    })
                    .collect(),
            });
        }
        model
    }

    fn labels(list: &PageListController, model: &PageModel) -> Vec<String> {
        list.items(model).into_iter().map(|i| i.label).collect()
    }

    #[test]
    fn test_selection_follows_moved_entry() {
        let mut model = model();
        let mut list = PageListController::new();
        let b0 = list.select_position(&model, 2).unwrap();

        assert!(list.move_up(&mut model).unwrap());
        assert_eq!(
            labels(&list, &model),
            ["a.pdf - Page 1", "b.pdf - Page 1", "a.pdf - Page 2"]
        );
        assert_eq!(list.selected(), Some(b0));
        let items = list.items(&model);
        assert!(items[1].selected);
        assert!(!items[2].selected);
    }

    #[test]
    fn test_moves_without_selection_are_noops() {
        let mut model = model();
        let mut list = PageListController::new();
        assert!(!list.move_up(&mut model).unwrap());
        assert!(!list.move_down(&mut model).unwrap());
        assert!(list.remove_selected(&mut model).unwrap().is_none());
        assert!(matches!(
            list.activate(&model, 2.0, OverlayDefaults::default()),
            Err(Error::NoSelection)
        ));
    }

    #[test]
    fn test_remove_selects_neighbour() {
        let mut model = model();
        let mut list = PageListController::new();

        list.select_position(&model, 1);
        let removed = list.remove_selected(&mut model).unwrap().unwrap();
        assert_eq!(removed.label(), "a.pdf - Page 2");
        // b.pdf slid into position 1
        assert_eq!(list.selected(), Some(model.ids()[1]));

        list.remove_selected(&mut model).unwrap();
        assert_eq!(list.selected(), Some(model.ids()[0]));

        list.remove_selected(&mut model).unwrap();
        assert!(model.is_empty());
        assert_eq!(list.selected(), None);
    }

    #[test]
    fn test_activate_opens_editor_and_marks_label() {
        let mut model = model();
        let mut list = PageListController::new();
        let first = list.select_position(&model, 0).unwrap();

        let editor = list.activate(&model, 2.0, OverlayDefaults::default()).unwrap();
        assert_eq!(editor.entry_id(), first);
        editor.add_text(&mut model).unwrap();

        let items = list.items(&model);
        assert_eq!(items[0].label, "a.pdf - Page 1 (Text Added)");
        assert_eq!(items[0].overlay_count, 1);
    }

    #[test]
    fn test_sync_drops_stale_selection() {
        let mut model = model();
        let mut list = PageListController::new();
        let id = list.select_position(&model, 0).unwrap();
        model.remove(id).unwrap();
        list.sync(&model);
        assert_eq!(list.selected(), None);
        assert!(list.select(&model, id).is_err());
    }
}
