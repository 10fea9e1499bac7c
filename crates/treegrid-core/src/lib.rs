//! Tree-to-flat-row engine for virtualized tree grids.
//!
//! A [`TreeModel`] owns the items. A [`TreeGrid`] keeps the visible part of
//! it as a flat list of rows, rebuilt through a tree of [`Section`]s and
//! patched by identity diff so the host only ever sees minimal
//! [`RowChange`]s.

pub mod config;
pub mod error;
pub mod grid;
pub mod model;
pub mod reconcile;
pub mod section;
pub mod subscription;

pub use config::GridOptions;
pub use error::{GridError, ModelError};
pub use grid::{ItemCancelEvent, NullHost, Transition, TreeGrid, TreeHost};
pub use model::{ChangeKind, CollectionChange, CollectionKey, ItemId, ListenerId, TreeModel};
pub use reconcile::{FlatCache, RowChange};
pub use section::{RowNode, Section};
pub use subscription::Role;
