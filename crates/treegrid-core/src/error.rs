use thiserror::Error;

use crate::model::{CollectionKey, ItemId};

/// Rejected mutation of the item tree.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("item {0} does not exist (stale or discarded handle)")]
    UnknownItem(ItemId),

    #[error("index {index} is out of range for {collection} (len {len})")]
    IndexOutOfRange {
        collection: CollectionKey,
        index: usize,
        len: usize,
    },

    #[error("item {0} already has a parent; remove it first")]
    AlreadyAttached(ItemId),

    #[error("inserting {item} under {collection} would create a cycle")]
    Cycle {
        item: ItemId,
        collection: CollectionKey,
    },

    #[error("item {0} is still attached to the tree and cannot be discarded")]
    StillAttached(ItemId),
}

/// Failures raised by the grid engine.
///
/// `ReconcileMismatch` and `UnownedCollection` are broken internal invariants:
/// the flat rows the host is rendering can no longer be trusted, so callers
/// should treat them as bugs rather than retry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("reconciliation mismatch at row {row}: expected {expected:?}, found {found:?}")]
    ReconcileMismatch {
        row: usize,
        expected: Option<ItemId>,
        found: Option<ItemId>,
    },

    #[error("change received for {0}, which no section owns")]
    UnownedCollection(CollectionKey),

    #[error("grid has no bound store; call initialize_items first")]
    Unbound,
}

pub type Result<T, E = GridError> = std::result::Result<T, E>;
