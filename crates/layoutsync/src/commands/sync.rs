use crate::error::{LayoutError, Result};
use crate::manager::ManagerState;
use crate::sync::executor::{execute, SyncTargets};
use crate::sync::{compute_sync_operations, SyncReport};
use futures::future::try_join;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// One full reconciliation: read both sides, diff, apply.
pub async fn run(state: &ManagerState, cancel: &CancellationToken) -> Result<SyncReport> {
    let link = state.require_remote("sync layouts")?;
    if cancel.is_cancelled() {
        return Err(LayoutError::Cancelled);
    }

    info!(namespace = %link.cache.namespace(), "starting layout sync");

    // 1. Both sides, concurrently
    let (local, remote) = try_join(
        link.cache.list(),
        link.api.get_layouts(&state.parents),
    )
    .await?;

    if cancel.is_cancelled() {
        return Err(LayoutError::Cancelled);
    }

    // 2. Diff
    let operations = compute_sync_operations(&local, &remote);

    // 3. Apply
    let targets = SyncTargets {
        primary: &link.cache,
        backup: &state.backup,
        remote: link.api.as_ref(),
    };
    let report = execute(&targets, operations, cancel).await?;

    info!(
        added = report.added_to_cache,
        baselines = report.baselines_updated,
        marked_deleted = report.marked_deleted,
        deleted_local = report.deleted_local,
        uploaded_new = report.uploaded_new,
        uploaded_updated = report.uploaded_updated,
        deleted_remote = report.deleted_remote,
        conflicts = report.conflicts,
        backed_up = report.backed_up,
        "layout sync finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LayoutUpdate, SyncStatus};
    use crate::test_utils::{personal_layout, remote_layout, sample_data, StateFixture};

    #[tokio::test]
    async fn test_second_run_is_empty() {
        let fx = StateFixture::synced();
        crate::commands::save::run(&fx.state, personal_layout("Mine"))
            .await
            .unwrap();
        fx.remote.insert(remote_layout("Theirs", "user:1"));

        let first = run(&fx.state, &CancellationToken::new()).await.unwrap();
        assert_eq!(first.uploaded_new, 1);
        assert_eq!(first.added_to_cache, 1);

        let second = run(&fx.state, &CancellationToken::new()).await.unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn test_locally_deleted_is_removed_everywhere() {
        let fx = StateFixture::synced();
        let layout = fx.put_tracked("Doc").await;
        crate::commands::delete::run(&fx.state, &layout.id)
            .await
            .unwrap();

        let report = run(&fx.state, &CancellationToken::new()).await.unwrap();

        assert_eq!(report.deleted_remote, 1);
        assert!(fx.remote.layout(&layout.id).is_none());
        assert!(fx.backend.raw_namespace("remote-acme").is_empty());
    }

    #[tokio::test]
    async fn test_remote_deletion_with_unsaved_edit_is_tombstoned() {
        let fx = StateFixture::synced();
        let layout = fx.put_tracked("Doc").await;
        crate::commands::update::run(
            &fx.state,
            LayoutUpdate::data(layout.id.clone(), sample_data("unsaved")),
        )
        .await
        .unwrap();
        fx.remote.external_delete(&layout.id);

        let report = run(&fx.state, &CancellationToken::new()).await.unwrap();
        assert_eq!(report.marked_deleted, 1);

        let raw = fx.backend.raw_namespace("remote-acme");
        assert_eq!(raw[0].sync_status(), Some(SyncStatus::RemotelyDeleted));
        assert_eq!(raw[0].working().map(|w| &w.data), Some(&sample_data("unsaved")));
        assert!(crate::commands::get::list(&fx.state).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_reading() {
        let fx = StateFixture::synced();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run(&fx.state, &cancel).await.unwrap_err();
        assert!(matches!(err, LayoutError::Cancelled));
        assert_eq!(fx.remote.calls().get_layouts, 0);
    }
}
