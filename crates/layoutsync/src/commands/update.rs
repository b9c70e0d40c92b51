use super::{is_live_shared, push_shared_change};
use crate::error::Result;
use crate::manager::ManagerState;
use crate::model::{Layout, LayoutSnapshot, LayoutUpdate, SyncStatus};
use crate::remote::UpdateLayoutParams;
use chrono::Utc;

/// Rename and/or edit a layout.
///
/// Data edits only touch the working copy; they reach the server when the
/// user overwrites or on the next sync. Renames of live shared layouts go to
/// the server right away (and need it online); other renames are local and
/// flag the layout for upload.
pub async fn run(state: &ManagerState, update: LayoutUpdate) -> Result<Option<Layout>> {
    let LayoutUpdate {
        id,
        display_name,
        data,
    } = update;

    let guard = state.primary().lock().await;
    let Some(mut layout) = guard.get(&id).await?.filter(|l| !l.is_hidden()) else {
        return Ok(None);
    };

    if let Some(name) = display_name.filter(|name| *name != layout.display_name) {
        if is_live_shared(&layout) {
            let link = state.require_remote("rename a shared layout")?;
            // A baseline not yet uploaded travels with the rename.
            let pending = (layout.sync_status() == Some(SyncStatus::Updated))
                .then(|| layout.baseline().data.clone());
            let params = UpdateLayoutParams {
                id: layout.id.clone(),
                display_name: Some(name),
                data: pending.clone(),
                saved_at: Utc::now(),
                expected_saved_at: None,
                parent: layout.parent.clone(),
            };
            push_shared_change(link, &mut layout, params, pending).await?;
        } else {
            layout.display_name = name;
            layout.mark_baseline_changed();
        }
    }

    if let Some(data) = data {
        layout.set_working(Some(LayoutSnapshot::now(data)));
    }

    Ok(Some(guard.put(layout).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LayoutError;
    use crate::model::{LayoutData, LayoutId};
    use crate::test_utils::{sample_data, StateFixture};

    #[tokio::test]
    async fn test_missing_layout_is_none() {
        let fx = StateFixture::synced();
        let result = run(&fx.state, LayoutUpdate::rename(LayoutId::generate(), "X"))
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_data_edit_sets_working_only() {
        let fx = StateFixture::synced();
        let layout = fx.put_tracked("Doc").await;

        let updated = run(&fx.state, LayoutUpdate::data(layout.id.clone(), sample_data("edit")))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.baseline(), layout.baseline());
        assert_eq!(updated.working().map(|w| &w.data), Some(&sample_data("edit")));
        assert_eq!(updated.sync_status(), Some(SyncStatus::Tracked));
        assert_eq!(fx.remote.calls().update_layout, 0);
    }

    #[tokio::test]
    async fn test_edit_back_to_baseline_collapses() {
        let fx = StateFixture::synced();
        let layout = fx.put_tracked("Doc").await;
        let original: LayoutData = layout.baseline().data.clone();

        run(&fx.state, LayoutUpdate::data(layout.id.clone(), sample_data("edit")))
            .await
            .unwrap();
        let back = run(&fx.state, LayoutUpdate::data(layout.id.clone(), original))
            .await
            .unwrap()
            .unwrap();

        assert!(back.working().is_none());
    }

    #[tokio::test]
    async fn test_rename_personal_flags_upload() {
        let fx = StateFixture::synced();
        let layout = fx.put_tracked("Doc").await;

        let renamed = run(&fx.state, LayoutUpdate::rename(layout.id.clone(), "Renamed"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(renamed.display_name, "Renamed");
        assert_eq!(renamed.sync_status(), Some(SyncStatus::Updated));
        assert_eq!(fx.remote.calls().update_layout, 0);
    }

    #[tokio::test]
    async fn test_rename_shared_goes_to_server() {
        let fx = StateFixture::synced();
        let layout = fx.put_shared("Team").await;

        let renamed = run(&fx.state, LayoutUpdate::rename(layout.id.clone(), "Renamed"))
            .await
            .unwrap()
            .unwrap();

        let server = fx.remote.layout(&layout.id).unwrap();
        assert_eq!(server.display_name, "Renamed");
        assert_eq!(renamed.sync_status(), Some(SyncStatus::Tracked));
        assert_eq!(renamed.last_remote_saved_at(), Some(server.saved_at));
    }

    #[tokio::test]
    async fn test_rename_shared_offline_changes_nothing() {
        let fx = StateFixture::synced();
        let layout = fx.put_shared("Team").await;
        fx.go_offline();

        let err = run(&fx.state, LayoutUpdate::rename(layout.id.clone(), "Renamed"))
            .await
            .unwrap_err();
        assert!(matches!(err, LayoutError::Offline(_)));

        let stored = fx.state.primary().get(&layout.id).await.unwrap().unwrap();
        assert_eq!(stored, layout);
    }

    #[tokio::test]
    async fn test_rename_conflict_keeps_working_and_adopts_server() {
        let fx = StateFixture::synced();
        let layout = fx.put_shared("Team").await;
        run(&fx.state, LayoutUpdate::data(layout.id.clone(), sample_data("mine")))
            .await
            .unwrap();
        let theirs = fx
            .remote
            .external_update(&layout.id, Some("Their name"), Some(sample_data("theirs")))
            .unwrap();

        let resolved = run(&fx.state, LayoutUpdate::rename(layout.id.clone(), "My name"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(resolved.display_name, "Their name");
        assert_eq!(resolved.baseline().data, theirs.data);
        assert_eq!(resolved.working().map(|w| &w.data), Some(&sample_data("mine")));
        assert_eq!(fx.remote.layout(&layout.id).unwrap().display_name, "Their name");
    }
}
