use crate::error::Result;
use crate::manager::ManagerState;
use crate::model::{Layout, NewLayout};
use crate::remote::SaveNewLayoutParams;
use tracing::debug;

/// Create a layout.
///
/// Shared layouts exist on the server before they exist anywhere else: they
/// need a reachable remote and are cached as `tracked`. Personal layouts are
/// written locally, pending upload when the session syncs.
pub async fn run(state: &ManagerState, new: NewLayout) -> Result<Layout> {
    let NewLayout {
        display_name,
        data,
        permission,
    } = new;

    if permission.is_shared() {
        let link = state.require_remote("share a layout")?;
        let draft = Layout::new_local(
            display_name,
            data,
            permission,
            state.default_parent.clone(),
            true,
        );
        let server = link
            .api
            .save_new_layout(SaveNewLayoutParams {
                id: draft.id.clone(),
                display_name: draft.display_name.clone(),
                data: draft.baseline().data.clone(),
                permission,
                saved_at: draft.baseline().saved_at.unwrap_or_else(chrono::Utc::now),
                parent: draft.parent.clone(),
            })
            .await?;
        debug!(layout_id = %server.id, "created shared layout");
        return link.cache.put(Layout::from_remote(&server)).await;
    }

    let layout = Layout::new_local(
        display_name,
        data,
        permission,
        state.default_parent.clone(),
        state.syncs(),
    );
    state.primary().put(layout).await
}
