use super::{SyncOperation, SyncReport};
use crate::error::{LayoutError, Result};
use crate::model::{Layout, LayoutData, LayoutId, LayoutSnapshot, RemoteLayout, SyncStatus};
use crate::remote::{
    RemoteLayoutApi, SaveNewLayoutParams, UpdateLayoutParams, UpdateLayoutResponse,
};
use crate::store::{NamespacedStore, StoreGuard};
use chrono::Utc;
use futures::future::{join3, join_all};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything a sync run writes to.
pub struct SyncTargets<'a> {
    pub primary: &'a NamespacedStore,
    pub backup: &'a NamespacedStore,
    pub remote: &'a dyn RemoteLayoutApi,
}

enum LocalOp {
    AddToCache(RemoteLayout),
    UpdateBaseline(Layout, RemoteLayout),
    MarkDeleted(Layout),
    DeleteLocal(Layout),
}

impl LocalOp {
    fn id(&self) -> &LayoutId {
        match self {
            LocalOp::AddToCache(remote) => &remote.id,
            LocalOp::UpdateBaseline(local, _)
            | LocalOp::MarkDeleted(local)
            | LocalOp::DeleteLocal(local) => &local.id,
        }
    }

    fn affects_personal(&self) -> bool {
        match self {
            LocalOp::AddToCache(remote) | LocalOp::UpdateBaseline(_, remote) => {
                !remote.permission.is_shared()
            }
            LocalOp::MarkDeleted(local) | LocalOp::DeleteLocal(local) => !local.is_shared(),
        }
    }
}

enum RemoteOp {
    UploadNew(Layout),
    UploadUpdated(Layout),
    DeleteRemote(Layout),
}

/// Local follow-up of a finished server call.
enum LocalCleanup {
    Uploaded {
        server: RemoteLayout,
        uploaded: LayoutData,
        was_new: bool,
    },
    Conflict {
        id: LayoutId,
        server: Option<RemoteLayout>,
        lost: LayoutData,
    },
    Erase {
        id: LayoutId,
    },
}

fn route(operations: Vec<SyncOperation>) -> (Vec<LocalOp>, Vec<RemoteOp>) {
    let mut local = Vec::new();
    let mut remote = Vec::new();
    for op in operations {
        match op {
            SyncOperation::AddToCache { remote: server } => local.push(LocalOp::AddToCache(server)),
            SyncOperation::UpdateBaseline {
                local: layout,
                remote: server,
            } => local.push(LocalOp::UpdateBaseline(layout, server)),
            SyncOperation::MarkDeleted { local: layout } => {
                local.push(LocalOp::MarkDeleted(layout))
            }
            SyncOperation::DeleteLocal { local: layout } => {
                local.push(LocalOp::DeleteLocal(layout))
            }
            SyncOperation::UploadNew { local: layout } => remote.push(RemoteOp::UploadNew(layout)),
            SyncOperation::UploadUpdated { local: layout } => {
                remote.push(RemoteOp::UploadUpdated(layout))
            }
            SyncOperation::DeleteRemote { local: layout } => {
                remote.push(RemoteOp::DeleteRemote(layout))
            }
        }
    }
    (local, remote)
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(LayoutError::Cancelled);
    }
    Ok(())
}

/// Apply a diff. The three passes run concurrently and each runs to its own
/// end (or first error); the run fails if any pass failed. Work already written
/// is never rolled back.
///
/// Personal layouts rewritten by an upload are also mirrored to the backup,
/// once the remote group has finished.
pub async fn execute(
    targets: &SyncTargets<'_>,
    operations: Vec<SyncOperation>,
    cancel: &CancellationToken,
) -> Result<SyncReport> {
    let (local_ops, remote_ops) = route(operations);
    let backup_ops: Vec<&LocalOp> = local_ops.iter().filter(|op| op.affects_personal()).collect();

    let (local, remote, backup) = join3(
        apply_local(targets.primary, &local_ops, cancel),
        apply_remote(targets, &remote_ops, cancel),
        mirror_to_backup(targets.backup, &backup_ops, cancel),
    )
    .await;

    let mut report = SyncReport::default();
    report += local?;
    report += remote?;
    report += backup?;
    Ok(report)
}

async fn apply_local(
    store: &NamespacedStore,
    ops: &[LocalOp],
    cancel: &CancellationToken,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    if ops.is_empty() {
        return Ok(report);
    }

    let guard = store.lock().await;
    for op in ops {
        check_cancelled(cancel)?;
        debug!(
            namespace = %store.namespace(),
            layout_id = %op.id(),
            "applying local sync operation"
        );

        // Re-read each record: a user edit may have landed since the diff.
        match op {
            LocalOp::AddToCache(server) => {
                let layout = match guard.get(&server.id).await? {
                    Some(mut existing) => {
                        existing.apply_remote_baseline(server);
                        existing
                    }
                    None => Layout::from_remote(server),
                };
                guard.put(layout).await?;
                report.added_to_cache += 1;
            }
            LocalOp::UpdateBaseline(local, server) => {
                if let Some(mut current) = guard.get(&local.id).await? {
                    current.apply_remote_baseline(server);
                    guard.put(current).await?;
                    report.baselines_updated += 1;
                }
            }
            LocalOp::MarkDeleted(local) => {
                if let Some(mut current) = guard.get(&local.id).await? {
                    current.set_sync_status(SyncStatus::RemotelyDeleted);
                    guard.put(current).await?;
                    report.marked_deleted += 1;
                }
            }
            LocalOp::DeleteLocal(local) => {
                guard.delete(&local.id).await?;
                report.deleted_local += 1;
            }
        }
    }
    Ok(report)
}

async fn apply_remote(
    targets: &SyncTargets<'_>,
    ops: &[RemoteOp],
    cancel: &CancellationToken,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    if ops.is_empty() {
        return Ok(report);
    }
    check_cancelled(cancel)?;

    // Once issued, every call in the group runs to completion.
    let results = join_all(ops.iter().map(|op| call_remote(targets.remote, op))).await;

    let mut cleanups = Vec::with_capacity(results.len());
    let mut failure = None;
    for result in results {
        match result {
            Ok(cleanup) => cleanups.push(cleanup),
            Err(err) => {
                failure.get_or_insert(err);
            }
        }
    }

    // Cleanups for calls that succeeded are applied even when others failed,
    // so the cache agrees with what the server now holds. Cancellation is not
    // checked here for the same reason.
    let mut uploaded_personal = Vec::new();
    {
        let guard = targets.primary.lock().await;
        for cleanup in cleanups {
            if let Some(stored) = apply_cleanup(&guard, cleanup, &mut report).await? {
                if !stored.is_shared() && !stored.is_hidden() {
                    uploaded_personal.push(stored);
                }
            }
        }
    }

    if !uploaded_personal.is_empty() {
        let guard = targets.backup.lock().await;
        for layout in uploaded_personal {
            debug!(
                namespace = %targets.backup.namespace(),
                layout_id = %layout.id,
                "mirroring uploaded layout to backup"
            );
            guard.put(layout).await?;
            report.backed_up += 1;
        }
    }

    match failure {
        Some(err) => Err(err),
        None => Ok(report),
    }
}

async fn call_remote(remote: &dyn RemoteLayoutApi, op: &RemoteOp) -> Result<LocalCleanup> {
    match op {
        RemoteOp::UploadNew(local) => {
            debug!(layout_id = %local.id, "uploading new layout");
            let baseline = local.baseline();
            let server = remote
                .save_new_layout(SaveNewLayoutParams {
                    id: local.id.clone(),
                    display_name: local.display_name.clone(),
                    data: baseline.data.clone(),
                    permission: local.permission,
                    saved_at: baseline.saved_at.unwrap_or_else(Utc::now),
                    parent: local.parent.clone(),
                })
                .await?;
            Ok(LocalCleanup::Uploaded {
                server,
                uploaded: baseline.data.clone(),
                was_new: true,
            })
        }
        RemoteOp::UploadUpdated(local) => {
            debug!(layout_id = %local.id, "uploading updated layout");
            let response = remote
                .update_layout(UpdateLayoutParams {
                    id: local.id.clone(),
                    display_name: Some(local.display_name.clone()),
                    data: Some(local.baseline().data.clone()),
                    saved_at: Utc::now(),
                    expected_saved_at: local.last_remote_saved_at(),
                    parent: local.parent.clone(),
                })
                .await?;
            match response {
                UpdateLayoutResponse::Success { new_layout } => Ok(LocalCleanup::Uploaded {
                    server: new_layout,
                    uploaded: local.baseline().data.clone(),
                    was_new: false,
                }),
                UpdateLayoutResponse::Conflict => {
                    info!(layout_id = %local.id, "upload rejected as stale, adopting server copy");
                    let server = remote.get_layout(&local.id, &local.parent).await?;
                    Ok(LocalCleanup::Conflict {
                        id: local.id.clone(),
                        server,
                        lost: local.baseline().data.clone(),
                    })
                }
            }
        }
        RemoteOp::DeleteRemote(local) => {
            let existed = remote.delete_layout(&local.id, &local.parent).await?;
            if !existed {
                debug!(layout_id = %local.id, "layout was already gone remotely");
            }
            Ok(LocalCleanup::Erase {
                id: local.id.clone(),
            })
        }
    }
}

/// Returns the record as stored when an upload or conflict rewrote it.
async fn apply_cleanup(
    guard: &StoreGuard<'_>,
    cleanup: LocalCleanup,
    report: &mut SyncReport,
) -> Result<Option<Layout>> {
    let mut stored = None;
    match cleanup {
        LocalCleanup::Uploaded {
            server,
            uploaded,
            was_new,
        } => {
            if let Some(mut current) = guard.get(&server.id).await? {
                match current.sync_status() {
                    // Deleted while the upload was in flight: keep the tombstone.
                    Some(SyncStatus::LocallyDeleted) => {
                        record_server_time(&mut current, &server);
                    }
                    _ if current.baseline().data == uploaded => {
                        current.apply_remote_baseline(&server);
                    }
                    // Baseline replaced while the upload was in flight.
                    _ => {
                        current.set_sync_status(SyncStatus::Updated);
                        record_server_time(&mut current, &server);
                    }
                }
                stored = Some(guard.put(current).await?);
            }
            if was_new {
                report.uploaded_new += 1;
            } else {
                report.uploaded_updated += 1;
            }
        }
        LocalCleanup::Conflict { id, server, lost } => {
            if let Some(mut current) = guard.get(&id).await? {
                adopt_server_copy(&mut current, server.as_ref(), Some(lost));
                stored = Some(guard.put(current).await?);
            }
            report.conflicts += 1;
        }
        LocalCleanup::Erase { id } => {
            guard.delete(&id).await?;
            report.deleted_remote += 1;
        }
    }
    Ok(stored)
}

fn record_server_time(layout: &mut Layout, server: &RemoteLayout) {
    if let Some(info) = layout.sync_info.as_mut() {
        info.last_remote_saved_at = Some(server.saved_at);
    }
}

/// Resolve a lost optimistic update: the server copy becomes the baseline
/// (or, if the server no longer has the layout, the record is tombstoned).
/// An existing working copy survives; otherwise `unsaved` becomes one.
pub(crate) fn adopt_server_copy(
    layout: &mut Layout,
    server: Option<&RemoteLayout>,
    unsaved: Option<LayoutData>,
) {
    let working = layout
        .working()
        .cloned()
        .or_else(|| unsaved.map(LayoutSnapshot::now));
    match server {
        Some(server) => layout.apply_remote_baseline(server),
        None => layout.set_sync_status(SyncStatus::RemotelyDeleted),
    }
    layout.set_working(working);
}

async fn mirror_to_backup(
    store: &NamespacedStore,
    ops: &[&LocalOp],
    cancel: &CancellationToken,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    if ops.is_empty() {
        return Ok(report);
    }

    let guard = store.lock().await;
    for op in ops {
        check_cancelled(cancel)?;
        debug!(namespace = %store.namespace(), layout_id = %op.id(), "mirroring to backup");

        match op {
            LocalOp::AddToCache(server) => {
                guard.put(Layout::from_remote(server)).await?;
            }
            LocalOp::UpdateBaseline(local, server) => {
                let mut copy = guard.get(&local.id).await?.unwrap_or_else(|| local.clone());
                copy.apply_remote_baseline(server);
                guard.put(copy).await?;
            }
            LocalOp::MarkDeleted(local) => {
                let mut copy = guard.get(&local.id).await?.unwrap_or_else(|| local.clone());
                copy.set_sync_status(SyncStatus::RemotelyDeleted);
                guard.put(copy).await?;
            }
            LocalOp::DeleteLocal(local) => {
                guard.delete(&local.id).await?;
            }
        }
        report.backed_up += 1;
    }
    Ok(report)
}
