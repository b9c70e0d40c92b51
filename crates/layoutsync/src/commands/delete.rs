use crate::error::Result;
use crate::manager::ManagerState;
use crate::model::{LayoutId, SyncStatus};
use tracing::{debug, warn};

/// Delete a layout. Returns whether a visible layout went away.
///
/// | Layout | Effect |
/// |--------|--------|
/// | shared, live on the server | deleted remotely first, then tombstoned (synced session) or erased |
/// | shared, tombstoned | erased |
/// | personal, `tracked`/`updated` | tombstoned as `locally-deleted`, removed remotely on the next sync |
/// | personal, `locally-deleted` | left alone |
/// | personal, anything else | erased |
///
/// Personal deletions also drop the backup copy.
pub async fn run(state: &ManagerState, id: &LayoutId) -> Result<bool> {
    let guard = state.primary().lock().await;
    let Some(mut layout) = guard.get(id).await? else {
        return Ok(false);
    };
    let was_visible = !layout.is_hidden();

    if layout.is_shared() {
        if !layout.is_hidden() {
            let link = state.require_remote("delete a shared layout")?;
            let existed = link.api.delete_layout(&layout.id, &layout.parent).await?;
            if !existed {
                debug!(layout_id = %id, "shared layout was already gone remotely");
            }
        }
        if layout.sync_info.is_some() && !layout.is_hidden() {
            layout.set_sync_status(SyncStatus::RemotelyDeleted);
            guard.put(layout).await?;
        } else {
            guard.delete(id).await?;
        }
        return Ok(was_visible);
    }

    match layout.sync_status() {
        // Already pending removal; erasing it would lose the server delete.
        Some(SyncStatus::LocallyDeleted) => return Ok(false),
        Some(SyncStatus::Tracked | SyncStatus::Updated) => {
            layout.set_sync_status(SyncStatus::LocallyDeleted);
            guard.put(layout).await?;
        }
        _ => guard.delete(id).await?,
    }
    drop(guard);

    if let Err(err) = state.backup.delete(id).await {
        warn!(layout_id = %id, error = %err, "could not drop backup copy");
    }
    Ok(was_visible)
}
