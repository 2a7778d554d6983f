use std::collections::BTreeSet;

use log::trace;

use crate::fs::DirectoryEntry;

/// Selected paths plus the anchor used for shift-click ranges.
///
/// The anchor is a position in the current listing, not a path. Pruning and
/// re-sorting leave it where it was, so after the listing changes underneath
/// it a range selection may pivot from a different row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionEngine {
    selected: BTreeSet<String>,
    anchor: Option<usize>,
}

impl SelectionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> &BTreeSet<String> {
        &self.selected
    }

    pub fn contains(&self, path: &str) -> bool {
        self.selected.contains(path)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    pub fn anchor_index(&self) -> Option<usize> {
        self.anchor
    }

    pub fn select_single(&mut self, path: &str, index: usize) {
        self.selected.clear();
        self.selected.insert(path.to_string());
        self.anchor = Some(index);
    }

    pub fn toggle(&mut self, path: &str, index: usize) {
        if !self.selected.remove(path) {
            self.selected.insert(path.to_string());
        }
        self.anchor = Some(index);
    }

    /// Selects the inclusive span between the anchor and `index`.
    ///
    /// The anchor does not move. Without a usable anchor this behaves like
    /// [`Self::select_single`] on the target row.
    pub fn select_range(&mut self, entries: &[DirectoryEntry], index: usize, additive: bool) {
        let Some(target) = entries.get(index) else {
            return;
        };
        let anchor = match self.anchor {
            Some(anchor) if anchor < entries.len() => anchor,
            _ => {
                self.select_single(&target.path, index);
                return;
            }
        };

        let (start, end) = (anchor.min(index), anchor.max(index));
        trace!("range selection {start}..={end} additive={additive}");
        if !additive {
            self.selected.clear();
        }
        self.selected
            .extend(entries[start..=end].iter().map(|entry| entry.path.clone()));
    }

    pub fn select_all(&mut self, entries: &[DirectoryEntry]) {
        self.selected = entries.iter().map(|entry| entry.path.clone()).collect();
    }

    pub fn clear(&mut self) {
        self.selected.clear();
        self.anchor = None;
    }

    /// Drops selected paths that are no longer listed.
    pub fn prune(&mut self, entries: &[DirectoryEntry]) {
        let surviving: BTreeSet<&str> = entries.iter().map(|entry| entry.path.as_str()).collect();
        self.selected.retain(|path| surviving.contains(path.as_str()));
    }
}
