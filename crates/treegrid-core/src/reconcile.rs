use std::collections::HashSet;

use crate::error::GridError;
use crate::model::ItemId;

// ── RowChange ────────────────────────────────────────────────────────

/// An edit applied to the flat rows, in the order the host must replay it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowChange {
    /// `items` now occupy rows `index..index + items.len()`.
    Added { index: usize, items: Vec<ItemId> },
    /// `items` used to occupy rows `index..index + items.len()`.
    Removed { index: usize, items: Vec<ItemId> },
    /// `item` was taken out of row `from` and reinserted at row `to`.
    Moved { item: ItemId, from: usize, to: usize },
    /// Same item, but its presentation changed (expander glyph).
    Replaced { index: usize, item: ItemId },
    /// Every row is gone.
    Reset,
}

/// Collects the edits of one reconciliation, merging neighbours when
/// coalescing is on.
#[derive(Debug)]
pub struct ChangeBatch {
    changes: Vec<RowChange>,
    coalesce: bool,
}

impl ChangeBatch {
    pub fn new(coalesce: bool) -> Self {
        Self {
            changes: Vec::new(),
            coalesce,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn into_vec(self) -> Vec<RowChange> {
        self.changes
    }

    fn added(&mut self, index: usize, item: ItemId) {
        if self.coalesce {
            if let Some(RowChange::Added { index: start, items }) = self.changes.last_mut() {
                if *start + items.len() == index {
                    items.push(item);
                    return;
                }
            }
        }
        self.changes.push(RowChange::Added {
            index,
            items: vec![item],
        });
    }

    fn removed(&mut self, index: usize, removed: Vec<ItemId>) {
        if removed.is_empty() {
            return;
        }
        if self.coalesce {
            if let Some(RowChange::Removed { index: start, items }) = self.changes.last_mut() {
                if *start == index {
                    items.extend(removed);
                    return;
                }
            }
        } else if removed.len() > 1 {
            for item in removed {
                self.changes.push(RowChange::Removed {
                    index,
                    items: vec![item],
                });
            }
            return;
        }
        self.changes.push(RowChange::Removed {
            index,
            items: removed,
        });
    }

    fn moved(&mut self, item: ItemId, from: usize, to: usize) {
        self.changes.push(RowChange::Moved { item, from, to });
    }

    pub(crate) fn reset(&mut self) {
        self.changes.push(RowChange::Reset);
    }

    pub(crate) fn replaced(&mut self, index: usize, item: ItemId) {
        self.changes.push(RowChange::Replaced { index, item });
    }
}

/// Edit counts of one reconciliation, for logging.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileStats {
    pub added: usize,
    pub removed: usize,
    pub moved: usize,
}

impl ReconcileStats {
    pub fn is_noop(&self) -> bool {
        self.added == 0 && self.removed == 0 && self.moved == 0
    }
}

// ── FlatCache ────────────────────────────────────────────────────────

/// The visible rows handed to the renderer, one item handle per row.
///
/// Only [`FlatCache::reconcile`] and [`FlatCache::clear`] mutate it, so a row
/// keeps its handle until the tree actually changes around it.
#[derive(Debug, Default, Clone)]
pub struct FlatCache {
    rows: Vec<ItemId>,
}

impl FlatCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<ItemId> {
        self.rows.get(row).copied()
    }

    pub fn index_of(&self, item: ItemId) -> Option<usize> {
        self.rows.iter().position(|r| *r == item)
    }

    pub fn as_slice(&self) -> &[ItemId] {
        &self.rows
    }

    pub(crate) fn clear(&mut self, changes: &mut ChangeBatch) {
        self.rows.clear();
        changes.reset();
    }

    /// Edit the cache in place until it equals `target`, recording each edit.
    ///
    /// Rows are matched by handle. A row that is no longer wanted is removed
    /// and the same position re-tested; a wanted row that is elsewhere in the
    /// cache is moved up; anything else is inserted. Trailing leftovers are
    /// trimmed as one run.
    pub fn reconcile(
        &mut self,
        target: &[ItemId],
        changes: &mut ChangeBatch,
    ) -> Result<ReconcileStats, GridError> {
        let wanted: HashSet<ItemId> = target.iter().copied().collect();
        let mut stats = ReconcileStats::default();

        let mut index = 0;
        while index < target.len() {
            let item = target[index];

            if index == self.rows.len() {
                log::trace!("add {item} at {index}");
                self.rows.push(item);
                changes.added(index, item);
                stats.added += 1;
                index += 1;
                continue;
            }

            let cached = self.rows[index];
            if cached == item {
                index += 1;
                continue;
            }

            if !wanted.contains(&cached) {
                log::trace!("remove {cached} at {index}");
                self.rows.remove(index);
                changes.removed(index, vec![cached]);
                stats.removed += 1;
                continue;
            }

            // Rows before `index` already match `target`, so only look after it
            match self.rows[index + 1..].iter().position(|r| *r == item) {
                None => {
                    log::trace!("insert {item} at {index}");
                    self.rows.insert(index, item);
                    changes.added(index, item);
                    stats.added += 1;
                }
                Some(offset) => {
                    let from = index + 1 + offset;
                    log::trace!("move {item} from {from} to {index}");
                    self.rows.remove(from);
                    self.rows.insert(index, item);
                    changes.moved(item, from, index);
                    stats.moved += 1;
                }
            }
            index += 1;
        }

        if self.rows.len() > target.len() {
            let trimmed: Vec<ItemId> = self.rows.drain(target.len()..).collect();
            log::trace!("trim {} rows at {}", trimmed.len(), target.len());
            stats.removed += trimmed.len();
            changes.removed(target.len(), trimmed);
        }

        self.verify(target)?;
        Ok(stats)
    }

    fn verify(&self, target: &[ItemId]) -> Result<(), GridError> {
        let rows = self.rows.len().max(target.len());
        for row in 0..rows {
            let expected = target.get(row).copied();
            let found = self.get(row);
            if expected != found {
                return Err(GridError::ReconcileMismatch {
                    row,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
