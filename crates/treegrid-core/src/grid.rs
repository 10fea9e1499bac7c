use crate::config::GridOptions;
use crate::error::{GridError, ModelError, Result};
use crate::model::{ChangeKind, CollectionKey, ItemId, TreeModel};
use crate::reconcile::{ChangeBatch, FlatCache, RowChange};
use crate::section::{RowNode, Section};
use crate::subscription::{Role, Subscriptions};

// ── Host interface ───────────────────────────────────────────────────

/// A proposed expand or collapse that the host may veto.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemCancelEvent {
    item: ItemId,
    cancel: bool,
}

impl ItemCancelEvent {
    pub fn new(item: ItemId) -> Self {
        Self {
            item,
            cancel: false,
        }
    }

    pub fn item(&self) -> ItemId {
        self.item
    }

    pub fn cancel(&mut self) {
        self.cancel = true;
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel
    }
}

/// The rendering/selection layer driving a [`TreeGrid`].
///
/// Every method has a no-op default so hosts only implement what they use.
pub trait TreeHost<T> {
    /// Current selection, used to keep it visible across a collapse.
    fn selected_item(&self) -> Option<ItemId> {
        None
    }

    fn allow_multiple_selection(&self) -> bool {
        false
    }

    /// Called before a full reset so the host can suspend its own bookkeeping.
    fn pre_reset_tree(&mut self) {}

    fn post_reset_tree(&mut self) {}

    /// Select `row` after a collapse swallowed the previous selection.
    fn select_row(&mut self, _row: usize) {}

    /// An item is about to expand. The host may populate its children here,
    /// or veto with [`ItemCancelEvent::cancel`].
    fn expanding(&mut self, _model: &mut TreeModel<T>, _event: &mut ItemCancelEvent) {}

    /// An item is about to collapse; veto with [`ItemCancelEvent::cancel`].
    fn collapsing(&mut self, _model: &mut TreeModel<T>, _event: &mut ItemCancelEvent) {}

    fn expanded(&mut self, _item: ItemId) {}

    fn collapsed(&mut self, _item: ItemId) {}

    /// One edit of the flat rows, delivered in replay order.
    fn rows_changed(&mut self, _change: &RowChange) {}
}

/// A host that ignores every event and never vetoes.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullHost;

impl<T> TreeHost<T> for NullHost {}

/// Outcome of an expand or collapse request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Committed,
    /// The host canceled the transition; nothing changed.
    Vetoed,
    /// The row is past the end of the grid.
    NoSuchRow,
}

impl Transition {
    pub fn is_success(self) -> bool {
        self == Self::Committed
    }
}

#[derive(Debug, Default)]
struct Pending {
    refresh: bool,
    force: bool,
    /// Items whose expander glyph changed.
    glyphs: Vec<ItemId>,
}

// ── TreeGrid ─────────────────────────────────────────────────────────

/// Flat, index-addressable view over the visible part of a [`TreeModel`].
///
/// The grid watches the model's collections and turns structural changes
/// into minimal row edits for the host. It never owns the model: every call
/// that may touch it takes the model (and the host) explicitly. After
/// mutating the model directly, call [`TreeGrid::sync`], or wrap the mutation
/// in [`TreeGrid::edit`].
#[derive(Debug)]
pub struct TreeGrid {
    options: GridOptions,
    subs: Subscriptions,
    root: Option<Section>,
    cache: FlatCache,
}

impl TreeGrid {
    pub fn new<T>(model: &mut TreeModel<T>) -> Self {
        Self::with_options(model, GridOptions::default())
    }

    pub fn with_options<T>(model: &mut TreeModel<T>, options: GridOptions) -> Self {
        Self {
            options,
            subs: Subscriptions::new(model),
            root: None,
            cache: FlatCache::new(),
        }
    }

    /// Detach every listener this grid holds on `model`.
    pub fn release<T>(self, model: &mut TreeModel<T>) {
        self.subs.release(model);
    }

    pub fn options(&self) -> GridOptions {
        self.options
    }

    /// The bound store, if any.
    pub fn root(&self) -> Option<CollectionKey> {
        self.root.as_ref().map(Section::store)
    }

    /// Root of the section tree.
    pub fn section(&self) -> Option<&Section> {
        self.root.as_ref()
    }

    pub fn subscriptions(&self) -> &Subscriptions {
        &self.subs
    }

    // ── Binding ──────────────────────────────────────────────────────

    /// Bind `store` as the grid's top level and rebuild every row.
    pub fn initialize_items<T, H: TreeHost<T>>(
        &mut self,
        model: &mut TreeModel<T>,
        host: &mut H,
        store: CollectionKey,
    ) -> Result<()> {
        if let Some(owner) = store.owner() {
            if !model.contains(owner) {
                return Err(ModelError::UnknownItem(owner).into());
            }
        }

        let track = self.options.track_expanders;
        match &mut self.root {
            Some(root) => root.rebind(model, &mut self.subs, store, track),
            None => {
                let mut root = Section::new(store, 0);
                root.attach(model, &mut self.subs);
                self.root = Some(root);
            }
        }
        // Anything queued before binding is covered by the full rebuild
        model.take_changes(self.subs.listener());

        log::debug!("initialize_items: bound {store}");
        self.refresh(model, host, true)
    }

    /// Throw away every row and rebuild, bracketed by the host's reset hooks.
    pub fn reload_data<T, H: TreeHost<T>>(&mut self, model: &mut TreeModel<T>, host: &mut H) -> Result<()> {
        host.pre_reset_tree();
        let result = self
            .drain_pending(model)
            .and_then(|_| self.refresh(model, host, true));
        host.post_reset_tree();
        result
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Number of visible rows.
    pub fn count(&self) -> usize {
        self.cache.len()
    }

    pub fn rows(&self) -> &[ItemId] {
        self.cache.as_slice()
    }

    pub fn item_at_row(&self, row: usize) -> Option<ItemId> {
        self.cache.get(row)
    }

    pub fn index_of(&self, item: ItemId) -> Option<usize> {
        self.cache.index_of(item)
    }

    /// Nesting depth at `row`, relative to the bound store.
    pub fn level_at_row<T>(&self, model: &TreeModel<T>, row: usize) -> Option<usize> {
        self.root.as_ref()?.level_at_row(model, row)
    }

    /// Position of `row` in the tree. `None` if out of range, or if the model
    /// changed and the grid has not been synced since.
    pub fn node_at_row<T>(&self, model: &TreeModel<T>, row: usize) -> Option<RowNode> {
        self.root
            .as_ref()?
            .node_at_row(model, row)
            .filter(|node| self.cache.get(row) == Some(node.item))
    }

    pub fn is_expanded<T>(&self, model: &TreeModel<T>, row: usize) -> bool {
        self.cache
            .get(row)
            .is_some_and(|item| model.is_expandable(item) && model.is_expanded(item))
    }

    // ── Transitions ──────────────────────────────────────────────────

    pub fn expand_row<T, H: TreeHost<T>>(
        &mut self,
        model: &mut TreeModel<T>,
        host: &mut H,
        row: usize,
    ) -> Result<Transition> {
        if self.root.is_none() {
            return Err(GridError::Unbound);
        }
        let Some(item) = self.cache.get(row) else {
            return Ok(Transition::NoSuchRow);
        };

        let mut event = ItemCancelEvent::new(item);
        host.expanding(model, &mut event);
        if event.is_canceled() {
            log::debug!("expand of row {row} ({item}) vetoed");
            return Ok(Transition::Vetoed);
        }

        model.set_expanded(item, true)?;
        self.process(model, host, true)?;
        host.expanded(item);
        Ok(Transition::Committed)
    }

    pub fn collapse_row<T, H: TreeHost<T>>(
        &mut self,
        model: &mut TreeModel<T>,
        host: &mut H,
        row: usize,
    ) -> Result<Transition> {
        if self.root.is_none() {
            return Err(GridError::Unbound);
        }
        let Some(item) = self.cache.get(row) else {
            return Ok(Transition::NoSuchRow);
        };

        let mut event = ItemCancelEvent::new(item);
        host.collapsing(model, &mut event);
        if event.is_canceled() {
            log::debug!("collapse of row {row} ({item}) vetoed");
            return Ok(Transition::Vetoed);
        }

        let reselect = !host.allow_multiple_selection()
            && host
                .selected_item()
                .is_some_and(|selected| model.is_descendant_of(selected, item));

        model.set_expanded(item, false)?;
        host.collapsed(item);
        self.process(model, host, true)?;

        if reselect {
            if let Some(row) = self.cache.index_of(item) {
                host.select_row(row);
            }
        }
        Ok(Transition::Committed)
    }

    /// Collapse the row if it is expanded, expand it otherwise.
    pub fn toggle_row<T, H: TreeHost<T>>(
        &mut self,
        model: &mut TreeModel<T>,
        host: &mut H,
        row: usize,
    ) -> Result<Transition> {
        if self.cache.get(row).is_some_and(|item| model.is_expanded(item)) {
            self.collapse_row(model, host, row)
        } else {
            self.expand_row(model, host, row)
        }
    }

    /// Expand every collapsed ancestor of `item`, outermost first, until it is
    /// visible. Stops at the first veto. Returns how many rows were expanded.
    pub fn expand_to_item<T, H: TreeHost<T>>(
        &mut self,
        model: &mut TreeModel<T>,
        host: &mut H,
        item: ItemId,
    ) -> Result<usize> {
        let store_owner = self.root().ok_or(GridError::Unbound)?.owner();
        let mut chain: Vec<ItemId> = model
            .ancestors(item)
            .into_iter()
            .take_while(|a| Some(*a) != store_owner)
            .collect();
        chain.reverse();

        let mut expanded = 0;
        for ancestor in chain {
            if model.is_expanded(ancestor) {
                continue;
            }
            let Some(row) = self.cache.index_of(ancestor) else {
                break;
            };
            if !self.expand_row(model, host, row)?.is_success() {
                break;
            }
            expanded += 1;
        }
        Ok(expanded)
    }

    // ── Change processing ────────────────────────────────────────────

    /// Apply every change the model queued since the last call.
    pub fn sync<T, H: TreeHost<T>>(&mut self, model: &mut TreeModel<T>, host: &mut H) -> Result<()> {
        if self.root.is_none() {
            return Err(GridError::Unbound);
        }
        self.process(model, host, false)
    }

    /// Run `f` against the model, then [`sync`](Self::sync).
    pub fn edit<T, H: TreeHost<T>, R>(
        &mut self,
        model: &mut TreeModel<T>,
        host: &mut H,
        f: impl FnOnce(&mut TreeModel<T>) -> R,
    ) -> Result<R> {
        let out = f(model);
        self.sync(model, host)?;
        Ok(out)
    }

    fn drain_pending<T>(&mut self, model: &mut TreeModel<T>) -> Result<Pending> {
        let mut pending = Pending::default();
        let root_store = self.root();

        for change in model.take_changes(self.subs.listener()) {
            let Some(role) = self.subs.role_of(change.collection) else {
                log::error!("change for unowned {}: {:?}", change.collection, change.kind);
                return Err(GridError::UnownedCollection(change.collection));
            };
            if role == Role::Section {
                pending.refresh = true;
                if change.kind == ChangeKind::Reset && Some(change.collection) == root_store {
                    pending.force = true;
                    if change.collection.owner().is_some_and(|owner| !model.contains(owner)) {
                        log::warn!("bound store {} was discarded", change.collection);
                    }
                }
            }
            if change.emptiness_flipped() {
                if let Some(owner) = change.collection.owner() {
                    if !pending.glyphs.contains(&owner) {
                        pending.glyphs.push(owner);
                    }
                }
            }
        }
        Ok(pending)
    }

    fn process<T, H: TreeHost<T>>(
        &mut self,
        model: &mut TreeModel<T>,
        host: &mut H,
        must_refresh: bool,
    ) -> Result<()> {
        let pending = self.drain_pending(model)?;
        if pending.refresh || must_refresh {
            self.refresh(model, host, pending.force)?;
        }

        if !pending.glyphs.is_empty() {
            let mut batch = ChangeBatch::new(self.options.coalesce);
            for item in pending.glyphs {
                if let Some(row) = self.cache.index_of(item) {
                    batch.replaced(row, item);
                }
            }
            for change in batch.into_vec() {
                host.rows_changed(&change);
            }
        }
        Ok(())
    }

    /// Rebuild the section tree, then reconcile the cache against it.
    fn refresh<T, H: TreeHost<T>>(&mut self, model: &mut TreeModel<T>, host: &mut H, force: bool) -> Result<()> {
        let Self {
            options,
            subs,
            root,
            cache,
        } = self;
        let root = root.as_mut().ok_or(GridError::Unbound)?;

        let mut batch = ChangeBatch::new(options.coalesce);
        if force {
            cache.clear(&mut batch);
        }

        root.reset_sections(model, subs, options.track_expanders);
        let mut target = Vec::with_capacity(cache.len());
        root.flatten(model, &mut target);
        debug_assert_eq!(target.len(), root.count(model));

        let stats = cache.reconcile(&target, &mut batch).inspect_err(|err| {
            log::error!("reconciliation failed: {err}");
        })?;
        log::debug!(
            "reconciled {} rows: +{} -{} ~{} ({} sections, {} watched)",
            target.len(),
            stats.added,
            stats.removed,
            stats.moved,
            root.total_sections(),
            subs.len()
        );

        for change in batch.into_vec() {
            host.rows_changed(&change);
        }
        Ok(())
    }
}
