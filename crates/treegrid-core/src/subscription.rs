use std::collections::HashMap;

use crate::model::{CollectionKey, ListenerId, TreeModel};

/// Why the engine watches a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Store of a live section: any change reshapes the visible rows.
    Section,
    /// Children of a visible collapsed item: only an empty/non-empty flip
    /// matters, since it changes the item's expander glyph.
    Expander,
}

/// The engine's ledger of collection listeners, keyed by collection.
///
/// At most one role per collection; `attach` and `detach` are idempotent so
/// sections can pair them without tracking what a sibling already did.
#[derive(Debug)]
pub struct Subscriptions {
    listener: ListenerId,
    owners: HashMap<CollectionKey, Role>,
}

impl Subscriptions {
    pub fn new<T>(model: &mut TreeModel<T>) -> Self {
        Self {
            listener: model.register_listener(),
            owners: HashMap::new(),
        }
    }

    pub fn listener(&self) -> ListenerId {
        self.listener
    }

    /// Watch `key` in the given role. Returns `true` if it was not watched
    /// before.
    pub fn attach<T>(&mut self, model: &mut TreeModel<T>, key: CollectionKey, role: Role) -> bool {
        match self.owners.insert(key, role) {
            Some(previous) if previous == role => false,
            Some(previous) => {
                log::warn!("{key} re-attached as {role:?} while still watched as {previous:?}");
                false
            }
            None => {
                model.subscribe(self.listener, key);
                log::trace!("attach {key} as {role:?}");
                true
            }
        }
    }

    /// Stop watching `key`. Queued changes for it are dropped.
    pub fn detach<T>(&mut self, model: &mut TreeModel<T>, key: CollectionKey) -> bool {
        if self.owners.remove(&key).is_none() {
            return false;
        }
        model.unsubscribe(self.listener, key);
        log::trace!("detach {key}");
        true
    }

    pub fn role_of(&self, key: CollectionKey) -> Option<Role> {
        self.owners.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn count_role(&self, role: Role) -> usize {
        self.owners.values().filter(|r| **r == role).count()
    }

    /// Detach everything and unregister the listener from the model.
    pub fn release<T>(mut self, model: &mut TreeModel<T>) {
        for key in self.owners.drain().map(|(key, _)| key) {
            model.unsubscribe(self.listener, key);
        }
        model.unregister_listener(self.listener);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attach_is_idempotent() {
        let mut model: TreeModel<()> = TreeModel::new();
        let mut subs = Subscriptions::new(&mut model);

        assert!(subs.attach(&mut model, CollectionKey::Root, Role::Section));
        assert!(!subs.attach(&mut model, CollectionKey::Root, Role::Section));
        assert_eq!(subs.len(), 1);
        assert_eq!(model.subscriber_count(CollectionKey::Root), 1);
        assert_eq!(subs.role_of(CollectionKey::Root), Some(Role::Section));
    }

    #[test]
    fn test_detach_unsubscribes() {
        let mut model: TreeModel<()> = TreeModel::new();
        let mut subs = Subscriptions::new(&mut model);
        let a = model.create(());
        model.push(CollectionKey::Root, a).unwrap();
        let key = CollectionKey::Children(a);

        subs.attach(&mut model, key, Role::Expander);
        assert!(model.is_subscribed(subs.listener(), key));

        assert!(subs.detach(&mut model, key));
        assert!(!subs.detach(&mut model, key));
        assert!(!model.is_subscribed(subs.listener(), key));
        assert!(subs.is_empty());
    }

    #[test]
    fn test_role_change_keeps_single_subscription() {
        let mut model: TreeModel<()> = TreeModel::new();
        let mut subs = Subscriptions::new(&mut model);
        let a = model.create(());
        let key = CollectionKey::Children(a);

        subs.attach(&mut model, key, Role::Expander);
        subs.attach(&mut model, key, Role::Section);
        assert_eq!(subs.role_of(key), Some(Role::Section));
        assert_eq!(model.subscriber_count(key), 1);
        assert_eq!(subs.count_role(Role::Expander), 0);
    }

    #[test]
    fn test_release_unregisters() {
        let mut model: TreeModel<()> = TreeModel::new();
        let mut subs = Subscriptions::new(&mut model);
        subs.attach(&mut model, CollectionKey::Root, Role::Section);
        let listener = subs.listener();

        subs.release(&mut model);
        assert_eq!(model.subscriber_count(CollectionKey::Root), 0);
        assert!(!model.subscribe(listener, CollectionKey::Root));
    }
}
