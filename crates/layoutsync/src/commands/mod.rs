//! # Command Layer
//!
//! The **core business logic** of every manager operation. Each command lives
//! in its own submodule as a plain async function over the manager's state.
//!
//! Commands:
//! - Read and write through [`NamespacedStore`](crate::store::NamespacedStore)
//!   guards so every read-modify-write is one critical section
//! - Call the remote service directly for operations that must be synchronous
//!   with the server (sharing, renaming or overwriting shared layouts)
//! - Return structured values; they never emit events or touch the busy flag.
//!   That is [`LayoutManager`](crate::manager::LayoutManager)'s job.
//!
//! ## Not-Found Is Not an Error
//!
//! A layout can vanish between the moment a host decides to act on it and the
//! moment the command runs (a sync erased it, another window deleted it).
//! Commands answer `Ok(None)` or do nothing in that case. The one exception
//! is [`copy`], which cannot produce a result without its source.
//!
//! ## Command Modules
//!
//! - [`get`]: List layouts and fetch one (with remote fallback)
//! - [`save`]: Create layouts
//! - [`update`]: Rename and edit the working copy
//! - [`delete`]: Delete, tombstone or erase
//! - [`overwrite`]: Promote the working copy to the baseline
//! - [`revert`]: Discard the working copy
//! - [`copy`]: Make a personal copy
//! - [`sync`]: Diff and reconcile with the server

use crate::error::Result;
use crate::manager::RemoteLink;
use crate::model::{Layout, LayoutData, SyncStatus};
use crate::remote::{UpdateLayoutParams, UpdateLayoutResponse};
use crate::sync::executor::adopt_server_copy;
use tracing::info;

pub mod copy;
pub mod delete;
pub mod get;
pub mod overwrite;
pub mod revert;
pub mod save;
pub mod sync;
pub mod update;

pub use copy::PersonalCopyOutcome;

/// Push a change of a shared layout to the server, optimistically.
///
/// On success the server copy becomes the baseline. On conflict the current
/// server copy is re-fetched and wins; `layout`'s working copy is kept, and
/// `unsaved` (the data that lost) becomes the working copy if there was none.
/// Returns whether the change was accepted.
pub(crate) async fn push_shared_change(
    link: &RemoteLink,
    layout: &mut Layout,
    mut params: UpdateLayoutParams,
    unsaved: Option<LayoutData>,
) -> Result<bool> {
    params.expected_saved_at = layout.last_remote_saved_at();
    match link.api.update_layout(params).await? {
        UpdateLayoutResponse::Success { new_layout } => {
            layout.apply_remote_baseline(&new_layout);
            Ok(true)
        }
        UpdateLayoutResponse::Conflict => {
            info!(layout_id = %layout.id, "shared layout changed remotely, adopting server copy");
            let server = link.api.get_layout(&layout.id, &layout.parent).await?;
            adopt_server_copy(layout, server.as_ref(), unsaved);
            Ok(false)
        }
    }
}

/// Shared layouts the server already knows about. Changes to these go to the
/// server immediately; anything else waits for the next sync.
pub(crate) fn is_live_shared(layout: &Layout) -> bool {
    layout.is_shared() && !matches!(layout.sync_status(), None | Some(SyncStatus::New))
}
