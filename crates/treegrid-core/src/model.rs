use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::ModelError;

// ── Handles ──────────────────────────────────────────────────────────

/// Handle to an item owned by a [`TreeModel`].
///
/// Two handles are the same row iff they are equal; a discarded slot gets a
/// new generation, so stale handles never alias the item that reuses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    index: u32,
    generation: u32,
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// Identifies one ordered collection in the model: the top level, or the
/// children of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKey {
    Root,
    Children(ItemId),
}

impl CollectionKey {
    /// The item owning this collection (`None` for the root collection).
    pub fn owner(self) -> Option<ItemId> {
        match self {
            Self::Root => None,
            Self::Children(id) => Some(id),
        }
    }
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root => write!(f, "root collection"),
            Self::Children(id) => write!(f, "children of {id}"),
        }
    }
}

/// A registered observer of collection changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u32);

// ── Change notices ───────────────────────────────────────────────────

/// What happened to a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted { index: usize, items: Vec<ItemId> },
    Removed { index: usize, items: Vec<ItemId> },
    Moved { item: ItemId, from: usize, to: usize },
    Replaced { index: usize, old: ItemId, new: ItemId },
    /// The collection was cleared.
    Reset,
}

/// A structural change queued for a listener subscribed to `collection`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionChange {
    pub collection: CollectionKey,
    pub kind: ChangeKind,
    /// Collection length right after the change.
    pub len: usize,
}

impl CollectionChange {
    /// Whether the collection went from empty to non-empty or back.
    pub fn emptiness_flipped(&self) -> bool {
        match &self.kind {
            ChangeKind::Inserted { items, .. } => !items.is_empty() && self.len == items.len(),
            ChangeKind::Removed { items, .. } => !items.is_empty() && self.len == 0,
            ChangeKind::Moved { .. } | ChangeKind::Replaced { .. } => false,
            ChangeKind::Reset => true,
        }
    }
}

#[derive(Debug, Default)]
struct Observers {
    next_listener: u32,
    subscriptions: HashMap<CollectionKey, Vec<ListenerId>>,
    queues: HashMap<ListenerId, Vec<CollectionChange>>,
}

impl Observers {
    fn register(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.queues.insert(id, Vec::new());
        id
    }

    fn unregister(&mut self, listener: ListenerId) {
        self.queues.remove(&listener);
        self.subscriptions.retain(|_, listeners| {
            listeners.retain(|l| *l != listener);
            !listeners.is_empty()
        });
    }

    fn subscribe(&mut self, listener: ListenerId, key: CollectionKey) -> bool {
        if !self.queues.contains_key(&listener) {
            return false;
        }
        let listeners = self.subscriptions.entry(key).or_default();
        if listeners.contains(&listener) {
            return false;
        }
        listeners.push(listener);
        true
    }

    fn unsubscribe(&mut self, listener: ListenerId, key: CollectionKey) -> bool {
        let Some(listeners) = self.subscriptions.get_mut(&key) else {
            return false;
        };
        let before = listeners.len();
        listeners.retain(|l| *l != listener);
        let removed = listeners.len() != before;
        if listeners.is_empty() {
            self.subscriptions.remove(&key);
        }
        if removed {
            if let Some(queue) = self.queues.get_mut(&listener) {
                queue.retain(|c| c.collection != key);
            }
        }
        removed
    }

    fn is_subscribed(&self, listener: ListenerId, key: CollectionKey) -> bool {
        self.subscriptions
            .get(&key)
            .is_some_and(|listeners| listeners.contains(&listener))
    }

    /// Drop every subscription and queued change for a collection that no
    /// longer exists. Former subscribers get a final `Reset` for it.
    fn forget(&mut self, key: CollectionKey) {
        let listeners = self.subscriptions.remove(&key).unwrap_or_default();
        for queue in self.queues.values_mut() {
            queue.retain(|c| c.collection != key);
        }
        for listener in listeners {
            if let Some(queue) = self.queues.get_mut(&listener) {
                queue.push(CollectionChange {
                    collection: key,
                    kind: ChangeKind::Reset,
                    len: 0,
                });
            }
        }
    }

    fn publish(&mut self, change: CollectionChange) {
        let Some(listeners) = self.subscriptions.get(&change.collection) else {
            return;
        };
        for listener in listeners {
            if let Some(queue) = self.queues.get_mut(listener) {
                queue.push(change.clone());
            }
        }
    }

    fn take(&mut self, listener: ListenerId) -> Vec<CollectionChange> {
        self.queues
            .get_mut(&listener)
            .map(std::mem::take)
            .unwrap_or_default()
    }
}

// ── Arena ────────────────────────────────────────────────────────────

#[derive(Debug)]
struct Node<T> {
    value: T,
    /// The collection this item currently sits in, if any.
    home: Option<CollectionKey>,
    children: Vec<ItemId>,
    expanded: bool,
    lazy_expandable: bool,
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    node: Option<Node<T>>,
}

/// Owns every tree item: their values, ordered child collections, and
/// expansion flags.
///
/// Items are created detached and become part of the tree once inserted into
/// a collection. Removing an item only detaches it; the subtree stays alive
/// until [`TreeModel::discard`] so it can be re-inserted elsewhere with the
/// same identity.
#[derive(Debug)]
pub struct TreeModel<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    roots: Vec<ItemId>,
    observers: Observers,
}

impl<T> Default for TreeModel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TreeModel<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
            observers: Observers::default(),
        }
    }

    /// Create a detached item.
    pub fn create(&mut self, value: T) -> ItemId {
        let node = Node {
            value,
            home: None,
            children: Vec::new(),
            expanded: false,
            lazy_expandable: false,
        };
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.node = Some(node);
            ItemId {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                node: Some(node),
            });
            ItemId {
                index,
                generation: 0,
            }
        }
    }

    fn node(&self, id: ItemId) -> Option<&Node<T>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_ref())
    }

    fn node_mut(&mut self, id: ItemId) -> Option<&mut Node<T>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.node.as_mut())
    }

    fn require(&self, id: ItemId) -> Result<&Node<T>, ModelError> {
        self.node(id).ok_or(ModelError::UnknownItem(id))
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.node(id).is_some()
    }

    pub fn get(&self, id: ItemId) -> Option<&T> {
        self.node(id).map(|n| &n.value)
    }

    pub fn get_mut(&mut self, id: ItemId) -> Option<&mut T> {
        self.node_mut(id).map(|n| &mut n.value)
    }

    // ── Structure queries ────────────────────────────────────────────

    /// The item's parent, or `None` for root-level and detached items.
    pub fn parent(&self, id: ItemId) -> Option<ItemId> {
        self.location(id).and_then(CollectionKey::owner)
    }

    /// The collection the item currently sits in.
    pub fn location(&self, id: ItemId) -> Option<CollectionKey> {
        self.node(id).and_then(|n| n.home)
    }

    /// Items of a collection in order. Unknown collections are empty.
    pub fn collection(&self, key: CollectionKey) -> &[ItemId] {
        match key {
            CollectionKey::Root => &self.roots,
            CollectionKey::Children(owner) => self
                .node(owner)
                .map(|n| n.children.as_slice())
                .unwrap_or(&[]),
        }
    }

    pub fn children(&self, id: ItemId) -> &[ItemId] {
        self.collection(CollectionKey::Children(id))
    }

    pub fn roots(&self) -> &[ItemId] {
        &self.roots
    }

    pub fn len(&self, key: CollectionKey) -> usize {
        self.collection(key).len()
    }

    pub fn is_empty(&self, key: CollectionKey) -> bool {
        self.collection(key).is_empty()
    }

    pub fn get_at(&self, key: CollectionKey, index: usize) -> Option<ItemId> {
        self.collection(key).get(index).copied()
    }

    /// Position of an item inside the collection it sits in.
    pub fn index_in_parent(&self, id: ItemId) -> Option<usize> {
        let home = self.location(id)?;
        self.collection(home).iter().position(|c| *c == id)
    }

    pub fn is_expanded(&self, id: ItemId) -> bool {
        self.node(id).is_some_and(|n| n.expanded)
    }

    /// Whether the item has, or declares it may have, children.
    pub fn is_expandable(&self, id: ItemId) -> bool {
        self.node(id)
            .is_some_and(|n| n.lazy_expandable || !n.children.is_empty())
    }

    /// Ancestors from the nearest parent up to the top level.
    pub fn ancestors(&self, id: ItemId) -> Vec<ItemId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    pub fn is_descendant_of(&self, id: ItemId, ancestor: ItemId) -> bool {
        let mut current = self.parent(id);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.parent(p);
        }
        false
    }

    /// Number of ancestors.
    pub fn depth(&self, id: ItemId) -> usize {
        self.ancestors(id).len()
    }

    /// Whether the item hangs off the root collection and every ancestor is
    /// expanded.
    pub fn is_visible(&self, id: ItemId) -> bool {
        let mut current = id;
        loop {
            match self.location(current) {
                Some(CollectionKey::Root) => return true,
                Some(CollectionKey::Children(parent)) => {
                    if !self.is_expanded(parent) {
                        return false;
                    }
                    current = parent;
                }
                None => return false,
            }
        }
    }

    /// Pre-order walk of every item under `key` whose ancestors (below `key`)
    /// are all expanded.
    pub fn visible_items(&self, key: CollectionKey) -> Vec<ItemId> {
        fn walk<T>(model: &TreeModel<T>, items: &[ItemId], out: &mut Vec<ItemId>) {
            for &id in items {
                out.push(id);
                if model.is_expanded(id) {
                    walk(model, model.children(id), out);
                }
            }
        }
        let mut out = Vec::new();
        walk(self, self.collection(key), &mut out);
        out
    }

    // ── Flags ────────────────────────────────────────────────────────

    /// Set the expansion flag directly.
    ///
    /// Bound grids only see this on their next reconciliation; prefer
    /// `TreeGrid::expand_row` / `collapse_row` for items already on screen.
    pub fn set_expanded(&mut self, id: ItemId, expanded: bool) -> Result<(), ModelError> {
        let node = self.node_mut(id).ok_or(ModelError::UnknownItem(id))?;
        node.expanded = expanded;
        Ok(())
    }

    /// Mark an item as expandable even while it has no children, e.g. when
    /// children are loaded on demand.
    pub fn set_lazy_expandable(&mut self, id: ItemId, lazy: bool) -> Result<(), ModelError> {
        let node = self.node_mut(id).ok_or(ModelError::UnknownItem(id))?;
        node.lazy_expandable = lazy;
        Ok(())
    }

    // ── Mutations ────────────────────────────────────────────────────

    fn check_key(&self, key: CollectionKey) -> Result<(), ModelError> {
        match key {
            CollectionKey::Root => Ok(()),
            CollectionKey::Children(owner) => self.require(owner).map(|_| ()),
        }
    }

    fn items_mut(&mut self, key: CollectionKey) -> Result<&mut Vec<ItemId>, ModelError> {
        match key {
            CollectionKey::Root => Ok(&mut self.roots),
            CollectionKey::Children(owner) => self
                .node_mut(owner)
                .map(|n| &mut n.children)
                .ok_or(ModelError::UnknownItem(owner)),
        }
    }

    fn check_index(&self, key: CollectionKey, index: usize, inclusive: bool) -> Result<(), ModelError> {
        let len = self.len(key);
        let ok = if inclusive { index <= len } else { index < len };
        if ok {
            Ok(())
        } else {
            Err(ModelError::IndexOutOfRange {
                collection: key,
                index,
                len,
            })
        }
    }

    fn check_insertable(&self, key: CollectionKey, id: ItemId) -> Result<(), ModelError> {
        let node = self.require(id)?;
        if node.home.is_some() {
            return Err(ModelError::AlreadyAttached(id));
        }
        if let Some(owner) = key.owner() {
            if owner == id || self.is_descendant_of(owner, id) {
                return Err(ModelError::Cycle {
                    item: id,
                    collection: key,
                });
            }
        }
        Ok(())
    }

    fn set_home(&mut self, id: ItemId, home: Option<CollectionKey>) {
        if let Some(node) = self.node_mut(id) {
            node.home = home;
        }
    }

    fn publish(&mut self, collection: CollectionKey, kind: ChangeKind) {
        let len = self.len(collection);
        self.observers.publish(CollectionChange {
            collection,
            kind,
            len,
        });
    }

    /// Insert a detached item at `index`.
    pub fn insert(&mut self, key: CollectionKey, index: usize, id: ItemId) -> Result<(), ModelError> {
        self.insert_many(key, index, [id])
    }

    /// Insert a run of detached items starting at `index`, as one change.
    pub fn insert_many(
        &mut self,
        key: CollectionKey,
        index: usize,
        items: impl IntoIterator<Item = ItemId>,
    ) -> Result<(), ModelError> {
        let items: Vec<ItemId> = items.into_iter().collect();
        self.check_key(key)?;
        self.check_index(key, index, true)?;
        let mut seen = HashSet::with_capacity(items.len());
        for &id in &items {
            self.check_insertable(key, id)?;
            if !seen.insert(id) {
                return Err(ModelError::AlreadyAttached(id));
            }
        }
        if items.is_empty() {
            return Ok(());
        }

        let collection = self.items_mut(key)?;
        collection.splice(index..index, items.iter().copied());
        for &id in &items {
            self.set_home(id, Some(key));
        }
        self.publish(key, ChangeKind::Inserted { index, items });
        Ok(())
    }

    /// Append a detached item.
    pub fn push(&mut self, key: CollectionKey, id: ItemId) -> Result<(), ModelError> {
        let len = self.len(key);
        self.insert(key, len, id)
    }

    /// Detach the item at `index`. The item and its subtree stay alive.
    pub fn remove(&mut self, key: CollectionKey, index: usize) -> Result<ItemId, ModelError> {
        self.check_key(key)?;
        self.check_index(key, index, false)?;
        let id = self.items_mut(key)?.remove(index);
        self.set_home(id, None);
        self.publish(
            key,
            ChangeKind::Removed {
                index,
                items: vec![id],
            },
        );
        Ok(id)
    }

    /// Detach an item from wherever it sits. Returns its former location.
    pub fn detach(&mut self, id: ItemId) -> Result<Option<(CollectionKey, usize)>, ModelError> {
        self.require(id)?;
        let Some(home) = self.location(id) else {
            return Ok(None);
        };
        let index = self
            .index_in_parent(id)
            .ok_or(ModelError::UnknownItem(id))?;
        self.remove(home, index)?;
        Ok(Some((home, index)))
    }

    /// Reorder an item within its collection.
    pub fn move_within(&mut self, key: CollectionKey, from: usize, to: usize) -> Result<(), ModelError> {
        self.check_key(key)?;
        self.check_index(key, from, false)?;
        self.check_index(key, to, false)?;
        if from == to {
            return Ok(());
        }
        let collection = self.items_mut(key)?;
        let item = collection.remove(from);
        collection.insert(to, item);
        self.publish(key, ChangeKind::Moved { item, from, to });
        Ok(())
    }

    /// Swap the item at `index` for a detached one. Returns the displaced item.
    pub fn replace(&mut self, key: CollectionKey, index: usize, id: ItemId) -> Result<ItemId, ModelError> {
        self.check_key(key)?;
        self.check_index(key, index, false)?;
        self.check_insertable(key, id)?;
        let collection = self.items_mut(key)?;
        let old = std::mem::replace(&mut collection[index], id);
        self.set_home(old, None);
        self.set_home(id, Some(key));
        self.publish(key, ChangeKind::Replaced { index, old, new: id });
        Ok(old)
    }

    /// Detach every item of a collection. Clearing an empty collection
    /// publishes nothing.
    pub fn clear(&mut self, key: CollectionKey) -> Result<Vec<ItemId>, ModelError> {
        self.check_key(key)?;
        let removed = std::mem::take(self.items_mut(key)?);
        if removed.is_empty() {
            return Ok(removed);
        }
        for &id in &removed {
            self.set_home(id, None);
        }
        self.publish(key, ChangeKind::Reset);
        Ok(removed)
    }

    /// Free a detached item and its whole subtree.
    pub fn discard(&mut self, id: ItemId) -> Result<(), ModelError> {
        let node = self.require(id)?;
        if node.home.is_some() {
            return Err(ModelError::StillAttached(id));
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let slot = &mut self.slots[current.index as usize];
            if let Some(node) = slot.node.take() {
                stack.extend(node.children);
            }
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(current.index);
            self.observers.forget(CollectionKey::Children(current));
        }
        Ok(())
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn register_listener(&mut self) -> ListenerId {
        self.observers.register()
    }

    /// Remove a listener together with all its subscriptions and queued
    /// changes.
    pub fn unregister_listener(&mut self, listener: ListenerId) {
        self.observers.unregister(listener);
    }

    /// Start queueing changes of `key` for `listener`. Returns `false` if it
    /// was already subscribed.
    pub fn subscribe(&mut self, listener: ListenerId, key: CollectionKey) -> bool {
        self.observers.subscribe(listener, key)
    }

    /// Stop queueing changes of `key` for `listener` and drop any that are
    /// still pending. Returns `false` if it was not subscribed.
    pub fn unsubscribe(&mut self, listener: ListenerId, key: CollectionKey) -> bool {
        self.observers.unsubscribe(listener, key)
    }

    pub fn is_subscribed(&self, listener: ListenerId, key: CollectionKey) -> bool {
        self.observers.is_subscribed(listener, key)
    }

    /// Number of listeners subscribed to `key`.
    pub fn subscriber_count(&self, key: CollectionKey) -> usize {
        self.observers.subscriptions.get(&key).map_or(0, Vec::len)
    }

    /// Drain the changes queued for `listener`, oldest first.
    pub fn take_changes(&mut self, listener: ListenerId) -> Vec<CollectionChange> {
        self.observers.take(listener)
    }

    pub fn has_pending_changes(&self, listener: ListenerId) -> bool {
        self.observers
            .queues
            .get(&listener)
            .is_some_and(|q| !q.is_empty())
    }
}

// ── Tests ────────────────────────────────────────────────────────────
