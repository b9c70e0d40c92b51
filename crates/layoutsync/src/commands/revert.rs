use crate::error::Result;
use crate::manager::ManagerState;
use crate::model::{Layout, LayoutId};

/// Discard the working copy. The baseline is left as it is.
pub async fn run(state: &ManagerState, id: &LayoutId) -> Result<Option<Layout>> {
    let guard = state.primary().lock().await;
    let Some(mut layout) = guard.get(id).await?.filter(|l| !l.is_hidden()) else {
        return Ok(None);
    };
    if layout.working().is_none() {
        return Ok(Some(layout));
    }
    layout.set_working(None);
    Ok(Some(guard.put(layout).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LayoutUpdate;
    use crate::test_utils::{sample_data, StateFixture};

    #[tokio::test]
    async fn test_revert_drops_working() {
        let fx = StateFixture::synced();
        let layout = fx.put_tracked("Doc").await;
        crate::commands::update::run(
            &fx.state,
            LayoutUpdate::data(layout.id.clone(), sample_data("draft")),
        )
        .await
        .unwrap();

        let reverted = run(&fx.state, &layout.id).await.unwrap().unwrap();

        assert!(reverted.working().is_none());
        assert_eq!(reverted.baseline(), layout.baseline());
        assert_eq!(reverted.sync_status(), layout.sync_status());
    }

    #[tokio::test]
    async fn test_revert_missing() {
        let fx = StateFixture::local_only();
        assert!(run(&fx.state, &LayoutId::generate()).await.unwrap().is_none());
    }
}
