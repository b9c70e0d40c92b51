//! # Storage Layer
//!
//! This module defines the local persistence abstraction for layouts. The
//! [`LocalStore`] trait is the durable key/value layer; [`NamespacedStore`]
//! binds it to one namespace and set of parent scopes.
//!
//! ## Namespaces
//!
//! A namespace is a storage partition. The manager uses three of them:
//!
//! | Namespace | Holds |
//! |-----------|-------|
//! | `local` | Layouts of a session with no remote configured |
//! | `remote-<workspace>` | Cache tracking a remote workspace |
//! | `local-backup` | Mirror of personal layouts for offline recovery |
//!
//! ## Parent Scopes
//!
//! Every record carries a `parent` (a user or project path). `list` only returns
//! records whose parent is one of the requested scopes. Legacy records with an
//! empty parent are visible in every scope, and `put` stamps an empty parent
//! with the first requested scope.
//!
//! ## Migration
//!
//! Two one-shot steps move data between partitions:
//! 1. **Un-namespaced records**: records written before namespaces existed are
//!    moved into a namespace. Records already present there win.
//! 2. **Import**: records from another namespace are moved in and flagged `new`
//!    so they upload on the next sync. Records the target already has win, and
//!    the source namespace is left empty either way.
//!
//! ## Implementations
//!
//! - [`fs_backend::FsStore`]: JSON file per record, atomic writes.
//! - [`mem_backend::MemoryStore`]: for testing logic without filesystem I/O.
//!
//! ## Storage Layout (FsStore)
//!
//! ```text
//! <root>/
//! ├── {id}.json                 # Legacy, un-namespaced records
//! ├── local/{id}.json
//! ├── remote-{workspace}/{id}.json
//! └── local-backup/{id}.json
//! ```

use crate::error::Result;
use crate::model::{Layout, LayoutId, SyncInfo};
use async_trait::async_trait;

pub mod fs_backend;
pub mod mem_backend;
pub mod namespaced;

pub use namespaced::{MigrationPlan, NamespacedStore, StoreGuard};

/// Report from the one-shot migration steps.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationReport {
    /// Records moved into the target namespace.
    pub migrated: usize,
    /// Records left alone because the target already had them.
    pub skipped: usize,
}

/// Durable, namespace- and parent-scoped key/value store for layouts.
///
/// Implementations must be safe to share across tasks; callers serialize
/// read-modify-write sequences themselves (see [`NamespacedStore::lock`]).
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// All records in `namespace` visible under `parents`.
    async fn list(&self, namespace: &str, parents: &[String]) -> Result<Vec<Layout>>;

    async fn get(&self, namespace: &str, parents: &[String], id: &LayoutId)
        -> Result<Option<Layout>>;

    /// Upsert. Returns the record as stored.
    async fn put(&self, namespace: &str, parents: &[String], layout: Layout) -> Result<Layout>;

    /// Remove a record. Missing records are not an error.
    async fn delete(&self, namespace: &str, parents: &[String], id: &LayoutId) -> Result<()>;

    /// Move records written before namespacing into `namespace`.
    async fn migrate_unnamespaced_layouts(&self, namespace: &str) -> Result<MigrationReport>;

    /// Move records from one namespace into another. Ids the target already
    /// holds keep the target's copy; the source record is dropped regardless.
    async fn import_layouts(
        &self,
        from_namespace: &str,
        to_namespace: &str,
    ) -> Result<MigrationReport>;
}

/// Whether a record is listed under the given parent scopes.
pub(crate) fn visible_in(layout: &Layout, parents: &[String]) -> bool {
    parents.is_empty() || layout.parent.is_empty() || parents.contains(&layout.parent)
}

/// Storage-layer normalization applied by every `put`.
pub(crate) fn normalize_for_put(mut layout: Layout, parents: &[String]) -> Layout {
    if layout.parent.is_empty() {
        if let Some(first) = parents.first() {
            layout.parent = first.clone();
        }
    }
    layout
}

/// Shape of a record moved by `import_layouts`: it has never been seen by the
/// target namespace's remote, so it must upload.
pub(crate) fn prepare_import(mut layout: Layout) -> Option<Layout> {
    if layout.is_hidden() {
        return None;
    }
    layout.sync_info = Some(SyncInfo::new_unsynced());
    Some(layout)
}
