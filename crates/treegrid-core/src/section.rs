use crate::model::{CollectionKey, ItemId, TreeModel};
use crate::subscription::{Role, Subscriptions};

// ── RowNode ──────────────────────────────────────────────────────────

/// Where a flat row sits in the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowNode {
    pub item: ItemId,
    /// Owner of the collection holding `item` (`None` at the top level).
    pub parent: Option<ItemId>,
    /// Position of `item` among its siblings.
    pub index: usize,
    /// Number of siblings, `item` included.
    pub sibling_count: usize,
    /// Nesting depth relative to the bound store.
    pub level: usize,
}

impl RowNode {
    pub fn is_first(&self) -> bool {
        self.index == 0
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.sibling_count
    }
}

// ── Section ──────────────────────────────────────────────────────────

/// One expanded level of the tree, mapped onto a contiguous run of rows.
///
/// A section mirrors a collection (`store`) and keeps one child section per
/// expanded item of that collection, sorted by the item's index. The child
/// section's rows follow directly after its item's row, so all row math is
/// relative: row 0 is this section's first item.
///
/// Sections are a derived index over the model. Whenever in doubt,
/// `reset_sections` throws the children away and rebuilds them from the
/// current `expanded` flags.
#[derive(Debug)]
pub struct Section {
    store: CollectionKey,
    /// Index, in the parent section's store, of the item owning `store`.
    start_row: usize,
    children: Vec<Section>,
    /// Collections this section attached; detach walks this, not the store,
    /// since the store may have changed since.
    watched: Vec<CollectionKey>,
}

struct Located<'a> {
    section: &'a Section,
    index: usize,
    level: usize,
}

impl Section {
    pub(crate) fn new(store: CollectionKey, start_row: usize) -> Self {
        Self {
            store,
            start_row,
            children: Vec::new(),
            watched: Vec::new(),
        }
    }

    pub fn store(&self) -> CollectionKey {
        self.store
    }

    pub fn start_row(&self) -> usize {
        self.start_row
    }

    pub fn sections(&self) -> &[Section] {
        &self.children
    }

    /// Number of live sections in this subtree, this one included.
    pub fn total_sections(&self) -> usize {
        1 + self.children.iter().map(Section::total_sections).sum::<usize>()
    }

    /// Rows contributed by this section: its store plus every expanded
    /// descendant. Recomputed from the model on every call.
    pub fn count<T>(&self, model: &TreeModel<T>) -> usize {
        model.len(self.store) + self.children.iter().map(|s| s.count(model)).sum::<usize>()
    }

    fn locate<T>(&self, model: &TreeModel<T>, mut row: usize, level: usize) -> Option<Located<'_>> {
        for section in &self.children {
            if row <= section.start_row {
                break;
            }
            let count = section.count(model);
            if row <= section.start_row + count {
                return section.locate(model, row - section.start_row - 1, level + 1);
            }
            row -= count;
        }
        (row < model.len(self.store)).then_some(Located {
            section: self,
            index: row,
            level,
        })
    }

    /// Item shown at `row`, or `None` past the end.
    pub fn item_at_row<T>(&self, model: &TreeModel<T>, row: usize) -> Option<ItemId> {
        let found = self.locate(model, row, 0)?;
        model.get_at(found.section.store, found.index)
    }

    /// Nesting depth at `row`; 0 for items of this section's own store.
    pub fn level_at_row<T>(&self, model: &TreeModel<T>, row: usize) -> Option<usize> {
        self.locate(model, row, 0).map(|found| found.level)
    }

    pub fn node_at_row<T>(&self, model: &TreeModel<T>, row: usize) -> Option<RowNode> {
        let found = self.locate(model, row, 0)?;
        let store = found.section.store;
        Some(RowNode {
            item: model.get_at(store, found.index)?,
            parent: store.owner(),
            index: found.index,
            sibling_count: model.len(store),
            level: found.level,
        })
    }

    /// Append every row of this section, in order, to `out`.
    pub fn flatten<T>(&self, model: &TreeModel<T>, out: &mut Vec<ItemId>) {
        let mut sections = self.children.iter().peekable();
        for (index, &item) in model.collection(self.store).iter().enumerate() {
            out.push(item);
            if let Some(section) = sections.next_if(|s| s.start_row == index) {
                section.flatten(model, out);
            }
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub(crate) fn attach<T>(&mut self, model: &mut TreeModel<T>, subs: &mut Subscriptions) {
        subs.attach(model, self.store, Role::Section);
        if !self.watched.contains(&self.store) {
            self.watched.push(self.store);
        }
    }

    /// Drop the listeners this section owns. The store listener only goes
    /// when `force` is set; descendant sections always lose all of theirs.
    pub(crate) fn detach<T>(&mut self, model: &mut TreeModel<T>, subs: &mut Subscriptions, force: bool) {
        let store = self.store;
        self.watched.retain(|&key| {
            if force || key != store {
                subs.detach(model, key);
                false
            } else {
                true
            }
        });
        for section in &mut self.children {
            section.detach(model, subs, true);
        }
    }

    /// Point this section at another collection, moving its listeners along.
    pub(crate) fn rebind<T>(
        &mut self,
        model: &mut TreeModel<T>,
        subs: &mut Subscriptions,
        store: CollectionKey,
        track_expanders: bool,
    ) {
        self.detach(model, subs, true);
        self.children.clear();
        self.store = store;
        self.attach(model, subs);
        self.reset_sections(model, subs, track_expanders);
    }

    /// Rebuild the child sections from the store's current `expanded` flags.
    pub(crate) fn reset_sections<T>(
        &mut self,
        model: &mut TreeModel<T>,
        subs: &mut Subscriptions,
        track_expanders: bool,
    ) {
        self.detach(model, subs, false);
        self.children.clear();

        let items = model.collection(self.store).to_vec();
        for (row, item) in items.into_iter().enumerate() {
            let key = CollectionKey::Children(item);
            if model.is_expanded(item) {
                let mut section = Section::new(key, row);
                section.attach(model, subs);
                section.reset_sections(model, subs, track_expanders);
                self.children.push(section);
            } else if track_expanders {
                subs.attach(model, key, Role::Expander);
                self.watched.push(key);
            }
        }
        debug_assert!(
            self.children.windows(2).all(|w| w[0].start_row < w[1].start_row),
            "sections out of order"
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        model: TreeModel<&'static str>,
        subs: Subscriptions,
        a: ItemId,
        b: ItemId,
        b1: ItemId,
        b2: ItemId,
        c: ItemId,
    }

    /// `[A, B, C]` with `B` expanded over `[B1, B2]`.
    fn fixture() -> Fixture {
        let mut model = TreeModel::new();
        let subs = Subscriptions::new(&mut model);
        let add = |model: &mut TreeModel<&'static str>, key, name| {
            let id = model.create(name);
            model.push(key, id).unwrap();
            id
        };
        let a = add(&mut model, CollectionKey::Root, "A");
        let b = add(&mut model, CollectionKey::Root, "B");
        let c = add(&mut model, CollectionKey::Root, "C");
        let b1 = add(&mut model, CollectionKey::Children(b), "B1");
        let b2 = add(&mut model, CollectionKey::Children(b), "B2");
        model.set_expanded(b, true).unwrap();
        Fixture {
            model,
            subs,
            a,
            b,
            b1,
            b2,
            c,
        }
    }

    fn root_section(f: &mut Fixture) -> Section {
        let mut root = Section::new(CollectionKey::Root, 0);
        root.attach(&mut f.model, &mut f.subs);
        root.reset_sections(&mut f.model, &mut f.subs, true);
        root
    }

    #[test]
    fn test_count_and_rows() {
        let mut f = fixture();
        let root = root_section(&mut f);

        assert_eq!(root.count(&f.model), 5);
        assert_eq!(root.sections().len(), 1);
        assert_eq!(root.sections()[0].start_row(), 1);

        let rows: Vec<_> = (0..6).map(|r| root.item_at_row(&f.model, r)).collect();
        assert_eq!(
            rows,
            vec![Some(f.a), Some(f.b), Some(f.b1), Some(f.b2), Some(f.c), None]
        );
    }

    #[test]
    fn test_levels() {
        let mut f = fixture();
        let root = root_section(&mut f);

        assert_eq!(root.level_at_row(&f.model, 1), Some(0));
        assert_eq!(root.level_at_row(&f.model, 3), Some(1));
        assert_eq!(root.level_at_row(&f.model, 4), Some(0));
        assert_eq!(root.level_at_row(&f.model, 5), None);
    }

    #[test]
    fn test_node_at_row() {
        let mut f = fixture();
        let root = root_section(&mut f);

        let node = root.node_at_row(&f.model, 3).unwrap();
        assert_eq!(node.item, f.b2);
        assert_eq!(node.parent, Some(f.b));
        assert_eq!(node.index, 1);
        assert_eq!(node.sibling_count, 2);
        assert!(node.is_last());
        assert!(!node.is_first());

        let node = root.node_at_row(&f.model, 0).unwrap();
        assert_eq!(node.parent, None);
        assert!(node.is_first());
    }

    #[test]
    fn test_flatten_matches_model_walk() {
        let mut f = fixture();
        let b11 = f.model.create("B11");
        f.model.push(CollectionKey::Children(f.b1), b11).unwrap();
        f.model.set_expanded(f.b1, true).unwrap();
        let root = root_section(&mut f);

        let mut flat = Vec::new();
        root.flatten(&f.model, &mut flat);
        assert_eq!(flat, f.model.visible_items(CollectionKey::Root));
        assert_eq!(flat.len(), root.count(&f.model));
        assert_eq!(root.item_at_row(&f.model, 3), Some(b11));
        assert_eq!(root.level_at_row(&f.model, 3), Some(2));
        assert_eq!(root.total_sections(), 3);
    }

    #[test]
    fn test_empty_expanded_section() {
        let mut f = fixture();
        f.model.clear(CollectionKey::Children(f.b)).unwrap();
        let root = root_section(&mut f);

        assert_eq!(root.count(&f.model), 3);
        assert_eq!(root.item_at_row(&f.model, 2), Some(f.c));
        assert_eq!(root.level_at_row(&f.model, 2), Some(0));
    }

    #[test]
    fn test_watches_sections_and_expanders() {
        let mut f = fixture();
        let mut root = root_section(&mut f);

        assert_eq!(f.subs.role_of(CollectionKey::Root), Some(Role::Section));
        assert_eq!(f.subs.role_of(CollectionKey::Children(f.b)), Some(Role::Section));
        assert_eq!(f.subs.role_of(CollectionKey::Children(f.a)), Some(Role::Expander));
        assert_eq!(f.subs.role_of(CollectionKey::Children(f.b1)), Some(Role::Expander));
        assert_eq!(f.subs.len(), 6);

        // Collapse B: its section goes away, B1/B2 watches with it
        f.model.set_expanded(f.b, false).unwrap();
        root.reset_sections(&mut f.model, &mut f.subs, true);
        assert_eq!(f.subs.role_of(CollectionKey::Children(f.b)), Some(Role::Expander));
        assert_eq!(f.subs.role_of(CollectionKey::Children(f.b1)), None);
        assert_eq!(f.subs.len(), 4);

        root.detach(&mut f.model, &mut f.subs, true);
        assert!(f.subs.is_empty());
    }

    #[test]
    fn test_detach_covers_removed_items() {
        let mut f = fixture();
        let mut root = root_section(&mut f);

        // A leaves the store while still watched as an expander
        f.model.remove(CollectionKey::Root, 0).unwrap();
        root.reset_sections(&mut f.model, &mut f.subs, true);
        assert_eq!(f.subs.role_of(CollectionKey::Children(f.a)), None);
        assert_eq!(root.sections()[0].start_row(), 0);
    }

    #[test]
    fn test_rebind_moves_listeners() {
        let mut f = fixture();
        let mut root = root_section(&mut f);

        root.rebind(&mut f.model, &mut f.subs, CollectionKey::Children(f.b), true);
        assert_eq!(root.store(), CollectionKey::Children(f.b));
        assert_eq!(f.subs.role_of(CollectionKey::Root), None);
        assert_eq!(f.subs.role_of(CollectionKey::Children(f.b)), Some(Role::Section));
        assert_eq!(root.count(&f.model), 2);
    }
}
