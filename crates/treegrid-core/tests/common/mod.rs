#![allow(dead_code)]

use treegrid_core::{CollectionKey, ItemCancelEvent, ItemId, RowChange, TreeHost, TreeModel};

/// Host that records everything the grid tells it.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub changes: Vec<RowChange>,
    pub events: Vec<String>,
    pub selected: Option<ItemId>,
    pub multi_select: bool,
    pub veto_expand: bool,
    pub veto_collapse: bool,
    pub selected_rows: Vec<usize>,
    /// Children to create when a lazily-expandable item expands.
    pub lazy_children: Vec<&'static str>,
}

impl RecordingHost {
    pub fn take_changes(&mut self) -> Vec<RowChange> {
        std::mem::take(&mut self.changes)
    }
}

impl TreeHost<&'static str> for RecordingHost {
    fn selected_item(&self) -> Option<ItemId> {
        self.selected
    }

    fn allow_multiple_selection(&self) -> bool {
        self.multi_select
    }

    fn pre_reset_tree(&mut self) {
        self.events.push("pre_reset".to_string());
    }

    fn post_reset_tree(&mut self) {
        self.events.push("post_reset".to_string());
    }

    fn select_row(&mut self, row: usize) {
        self.selected_rows.push(row);
    }

    fn expanding(&mut self, model: &mut TreeModel<&'static str>, event: &mut ItemCancelEvent) {
        self.events.push(format!("expanding {}", model.get(event.item()).unwrap()));
        if self.veto_expand {
            event.cancel();
            return;
        }
        if model.children(event.item()).is_empty() {
            for name in self.lazy_children.drain(..) {
                let child = model.create(name);
                model.push(CollectionKey::Children(event.item()), child).unwrap();
            }
        }
    }

    fn collapsing(&mut self, model: &mut TreeModel<&'static str>, event: &mut ItemCancelEvent) {
        self.events.push(format!("collapsing {}", model.get(event.item()).unwrap()));
        if self.veto_collapse {
            event.cancel();
        }
    }

    fn expanded(&mut self, _item: ItemId) {
        self.events.push("expanded".to_string());
    }

    fn collapsed(&mut self, _item: ItemId) {
        self.events.push("collapsed".to_string());
    }

    fn rows_changed(&mut self, change: &RowChange) {
        self.changes.push(change.clone());
    }
}

/// The tree used throughout: roots `[A, B, C]`, `B` expanded over `[B1, B2]`.
pub struct Abc {
    pub model: TreeModel<&'static str>,
    pub a: ItemId,
    pub b: ItemId,
    pub b1: ItemId,
    pub b2: ItemId,
    pub c: ItemId,
}

pub fn add(model: &mut TreeModel<&'static str>, key: CollectionKey, name: &'static str) -> ItemId {
    let id = model.create(name);
    model.push(key, id).unwrap();
    id
}

pub fn abc() -> Abc {
    let mut model = TreeModel::new();
    let a = add(&mut model, CollectionKey::Root, "A");
    let b = add(&mut model, CollectionKey::Root, "B");
    let c = add(&mut model, CollectionKey::Root, "C");
    let b1 = add(&mut model, CollectionKey::Children(b), "B1");
    let b2 = add(&mut model, CollectionKey::Children(b), "B2");
    model.set_expanded(b, true).unwrap();
    Abc {
        model,
        a,
        b,
        b1,
        b2,
        c,
    }
}

/// Names of the grid's rows, for readable assertions.
pub fn names(model: &TreeModel<&'static str>, rows: &[ItemId]) -> Vec<&'static str> {
    rows.iter().map(|id| *model.get(*id).unwrap()).collect()
}
