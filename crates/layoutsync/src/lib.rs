//! # Layout Sync Architecture
//!
//! Layoutsync keeps a user's dashboard layouts available offline and in step
//! with a remote layout service. It is a **library**: hosts (a desktop shell, a
//! web view bridge, a test harness) own the UI and the transport, and talk to
//! the engine through [`LayoutManager`].
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Manager (manager.rs)                                       │
//! │  - Facade hosts call                                        │
//! │  - Busy/online/error state, single-flight sync, events      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - One module per operation                                 │
//! │  - Decides local vs remote-first per layout                 │
//! └─────────────────────────────────────────────────────────────┘
//!                 │                              │
//!                 ▼                              ▼
//! ┌──────────────────────────────┐  ┌──────────────────────────┐
//! │  Sync (sync/)                │  │  Remote (remote/)        │
//! │  - Pure diff                 │  │  - RemoteLayoutApi trait │
//! │  - Three-pass executor       │  │  - InMemoryRemote        │
//! └──────────────────────────────┘  └──────────────────────────┘
//!                 │
//!                 ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - LocalStore trait, namespaces, migration                  │
//! │  - FsStore (production), MemoryStore (testing)              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Baseline and Working Copy
//!
//! Each [`Layout`] carries a **baseline** (last saved version) and an optional
//! **working** copy (unsaved edits). Edits only touch the working copy;
//! [`LayoutManager::overwrite_layout`] promotes it and
//! [`LayoutManager::revert_layout`] drops it. A working copy equal to the
//! baseline is never stored.
//!
//! ## Sync Status
//!
//! Layouts cached for a remote carry [`SyncInfo`]:
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `new` | Created locally, never uploaded |
//! | `tracked` | Baseline matches the server as last seen |
//! | `updated` | Baseline changed locally, upload pending |
//! | `locally-deleted` | Deleted here, server delete pending |
//! | `remotely-deleted` | Gone on the server, kept for its unsaved edits |
//!
//! The last two are tombstones and never reach readers.
//!
//! ## Testing Strategy
//!
//! Commands carry most of the unit tests, against [`store::mem_backend::MemoryStore`]
//! and [`remote::InMemoryRemote`]. `tests/` drives whole sessions through the
//! public API, including the file store.
//!
//! ## Module Overview
//!
//! - [`manager`]: The facade and session state
//! - `commands`: Logic for each operation (crate-internal)
//! - [`sync`]: Diff and executor
//! - [`remote`]: Remote service abstraction
//! - [`store`]: Storage abstraction and implementations
//! - [`model`]: Core data types
//! - [`events`]: Change notifications
//! - [`config`]: Configuration management
//! - [`init`]: File-store session setup
//! - [`error`]: Error types

pub(crate) mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod init;
pub mod manager;
pub mod model;
pub mod remote;
pub mod store;
pub mod sync;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

pub use config::LayoutSyncConfig;
pub use error::{LayoutError, Result};
pub use events::LayoutEvent;
pub use manager::LayoutManager;
pub use model::{
    Layout, LayoutData, LayoutId, LayoutPermission, LayoutSnapshot, LayoutUpdate, NewLayout,
    PersonalCopy, RemoteLayout, SyncInfo, SyncStatus,
};
pub use remote::RemoteLayoutApi;
pub use store::LocalStore;
pub use sync::SyncReport;
