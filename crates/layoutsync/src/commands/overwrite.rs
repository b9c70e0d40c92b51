use super::{is_live_shared, push_shared_change};
use crate::error::Result;
use crate::manager::ManagerState;
use crate::model::{Layout, LayoutId, LayoutSnapshot};
use crate::remote::UpdateLayoutParams;
use chrono::Utc;

/// Promote the working copy into the baseline.
///
/// For live shared layouts the promotion is an optimistic update on the
/// server. If another writer got there first, the server copy becomes the
/// baseline and the working copy stays put for the user to retry.
pub async fn run(state: &ManagerState, id: &LayoutId) -> Result<Option<Layout>> {
    let guard = state.primary().lock().await;
    let Some(mut layout) = guard.get(id).await?.filter(|l| !l.is_hidden()) else {
        return Ok(None);
    };
    let Some(working) = layout.working().cloned() else {
        return Ok(Some(layout));
    };

    if is_live_shared(&layout) {
        let link = state.require_remote("overwrite a shared layout")?;
        let params = UpdateLayoutParams {
            id: layout.id.clone(),
            display_name: None,
            data: Some(working.data),
            saved_at: Utc::now(),
            expected_saved_at: None,
            parent: layout.parent.clone(),
        };
        push_shared_change(link, &mut layout, params, None).await?;
    } else {
        layout.set_baseline(LayoutSnapshot::new(working.data, Some(Utc::now())));
        layout.mark_baseline_changed();
    }

    Ok(Some(guard.put(layout).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LayoutError;
    use crate::model::{LayoutUpdate, SyncStatus};
    use crate::test_utils::{sample_data, StateFixture};

    async fn edit(fx: &StateFixture, layout: &Layout, tag: &str) {
        let update = LayoutUpdate::data(layout.id.clone(), sample_data(tag));
        crate::commands::update::run(&fx.state, update).await.unwrap();
    }

    #[tokio::test]
    async fn test_personal_overwrite_promotes_and_flags_upload() {
        let fx = StateFixture::synced();
        let layout = fx.put_tracked("Doc").await;
        edit(&fx, &layout, "v2").await;

        let saved = run(&fx.state, &layout.id).await.unwrap().unwrap();

        assert_eq!(saved.baseline().data, sample_data("v2"));
        assert!(saved.working().is_none());
        assert_eq!(saved.sync_status(), Some(SyncStatus::Updated));
    }

    #[tokio::test]
    async fn test_nothing_to_promote_is_unchanged() {
        let fx = StateFixture::synced();
        let layout = fx.put_tracked("Doc").await;

        let same = run(&fx.state, &layout.id).await.unwrap().unwrap();
        assert_eq!(same, layout);
    }

    #[tokio::test]
    async fn test_shared_overwrite_updates_server() {
        let fx = StateFixture::synced();
        let layout = fx.put_shared("Team").await;
        edit(&fx, &layout, "v2").await;

        let saved = run(&fx.state, &layout.id).await.unwrap().unwrap();

        let server = fx.remote.layout(&layout.id).unwrap();
        assert_eq!(server.data, sample_data("v2"));
        assert_eq!(saved.baseline().data, sample_data("v2"));
        assert!(saved.working().is_none());
        assert_eq!(saved.sync_status(), Some(SyncStatus::Tracked));
        assert_eq!(saved.last_remote_saved_at(), Some(server.saved_at));
    }

    #[tokio::test]
    async fn test_shared_overwrite_conflict_keeps_working() {
        let fx = StateFixture::synced();
        let layout = fx.put_shared("Team").await;
        edit(&fx, &layout, "mine").await;
        let theirs = fx
            .remote
            .external_update(&layout.id, None, Some(sample_data("theirs")))
            .unwrap();

        let resolved = run(&fx.state, &layout.id).await.unwrap().unwrap();

        assert_eq!(resolved.baseline().data, theirs.data);
        assert_eq!(resolved.working().map(|w| &w.data), Some(&sample_data("mine")));
        assert_eq!(fx.remote.layout(&layout.id).unwrap().data, sample_data("theirs"));
    }

    #[tokio::test]
    async fn test_shared_overwrite_offline_fails() {
        let fx = StateFixture::synced();
        let layout = fx.put_shared("Team").await;
        edit(&fx, &layout, "v2").await;
        fx.go_offline();

        let err = run(&fx.state, &layout.id).await.unwrap_err();
        assert!(matches!(err, LayoutError::Offline(_)));
    }
}
