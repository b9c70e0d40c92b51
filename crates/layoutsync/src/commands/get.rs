use crate::error::Result;
use crate::manager::ManagerState;
use crate::model::{Layout, LayoutId};
use tracing::debug;

fn visible(layout: Layout) -> Option<Layout> {
    (!layout.is_hidden()).then_some(layout)
}

pub async fn list(state: &ManagerState) -> Result<Vec<Layout>> {
    Ok(state
        .primary()
        .list()
        .await?
        .into_iter()
        .filter_map(visible)
        .collect())
}

/// Cache first. On a miss the server is asked (if reachable) and its answer
/// cached, unless a sync cached the layout while we were waiting.
pub async fn one(state: &ManagerState, id: &LayoutId) -> Result<Option<Layout>> {
    let primary = state.primary();
    if let Some(found) = primary.get(id).await? {
        return Ok(visible(found));
    }

    let Some(link) = state.reachable_remote() else {
        return Ok(None);
    };
    let Some(server) = link.api.get_layout(id, &state.default_parent).await? else {
        return Ok(None);
    };

    let guard = primary.lock().await;
    if let Some(found) = guard.get(id).await? {
        return Ok(visible(found));
    }
    debug!(layout_id = %id, "caching layout fetched on demand");
    Ok(Some(guard.put(Layout::from_remote(&server)).await?))
}
