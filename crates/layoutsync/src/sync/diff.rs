//! Diffing the local cache against the server.
//!
//! [`compute_sync_operations`] is pure: it reads both layout sets and returns
//! what must happen, leaving all I/O to the executor.
//!
//! | local status | remote present | remote absent |
//! |--------------|----------------|---------------|
//! | none | skipped | skipped |
//! | `new` | update-baseline | upload-new |
//! | `tracked` | update-baseline if remote is newer | mark-deleted with working copy, else delete-local |
//! | `updated` | upload-updated | mark-deleted |
//! | `locally-deleted` | delete-remote | delete-local |
//! | `remotely-deleted` | update-baseline | delete-local without working copy, else kept |
//!
//! Remote layouts with no local record are added to the cache.

use crate::model::{Layout, LayoutId, RemoteLayout, SyncStatus};
use std::collections::{HashMap, HashSet};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncOperation {
    /// Cache a layout only the server has.
    AddToCache { remote: RemoteLayout },
    /// Adopt the server's copy as baseline, keeping any working copy.
    UpdateBaseline { local: Layout, remote: RemoteLayout },
    /// The server dropped it; keep the record as a tombstone.
    MarkDeleted { local: Layout },
    /// Nothing left worth keeping locally.
    DeleteLocal { local: Layout },
    UploadNew { local: Layout },
    UploadUpdated { local: Layout },
    DeleteRemote { local: Layout },
}

impl SyncOperation {
    /// Whether the operation touches local storage only.
    pub fn is_local(&self) -> bool {
        match self {
            SyncOperation::AddToCache { .. }
            | SyncOperation::UpdateBaseline { .. }
            | SyncOperation::MarkDeleted { .. }
            | SyncOperation::DeleteLocal { .. } => true,
            SyncOperation::UploadNew { .. }
            | SyncOperation::UploadUpdated { .. }
            | SyncOperation::DeleteRemote { .. } => false,
        }
    }

    pub fn layout_id(&self) -> &LayoutId {
        match self {
            SyncOperation::AddToCache { remote } => &remote.id,
            SyncOperation::UpdateBaseline { local, .. }
            | SyncOperation::MarkDeleted { local }
            | SyncOperation::DeleteLocal { local }
            | SyncOperation::UploadNew { local }
            | SyncOperation::UploadUpdated { local }
            | SyncOperation::DeleteRemote { local } => &local.id,
        }
    }

    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            SyncOperation::AddToCache { .. } => "add-to-cache",
            SyncOperation::UpdateBaseline { .. } => "update-baseline",
            SyncOperation::MarkDeleted { .. } => "mark-deleted",
            SyncOperation::DeleteLocal { .. } => "delete-local",
            SyncOperation::UploadNew { .. } => "upload-new",
            SyncOperation::UploadUpdated { .. } => "upload-updated",
            SyncOperation::DeleteRemote { .. } => "delete-remote",
        }
    }
}

/// Compare every local record against the server's set.
///
/// Output order: local operations (local-list order), then add-to-cache
/// (remote-list order), then remote operations.
pub fn compute_sync_operations(local: &[Layout], remote: &[RemoteLayout]) -> Vec<SyncOperation> {
    let remote_by_id: HashMap<&LayoutId, &RemoteLayout> =
        remote.iter().map(|r| (&r.id, r)).collect();
    let local_ids: HashSet<&LayoutId> = local.iter().map(|l| &l.id).collect();

    let mut local_ops = Vec::new();
    let mut remote_ops = Vec::new();

    for layout in local {
        let Some(info) = layout.sync_info.as_ref() else {
            warn!(layout_id = %layout.id, "layout has no sync info, skipping");
            continue;
        };
        let found = remote_by_id.get(&layout.id).copied();

        let op = match (info.status, found) {
            (SyncStatus::New, Some(server)) => Some(update_baseline(layout, server)),
            (SyncStatus::New, None) => Some(SyncOperation::UploadNew {
                local: layout.clone(),
            }),

            (SyncStatus::Tracked, Some(server)) => {
                let newer = info
                    .last_remote_saved_at
                    .map_or(true, |seen| server.saved_at > seen);
                newer.then(|| update_baseline(layout, server))
            }
            (SyncStatus::Tracked, None) if layout.working().is_some() => {
                Some(SyncOperation::MarkDeleted {
                    local: layout.clone(),
                })
            }
            (SyncStatus::Tracked, None) => Some(SyncOperation::DeleteLocal {
                local: layout.clone(),
            }),

            (SyncStatus::Updated, Some(_)) => Some(SyncOperation::UploadUpdated {
                local: layout.clone(),
            }),
            (SyncStatus::Updated, None) => Some(SyncOperation::MarkDeleted {
                local: layout.clone(),
            }),

            (SyncStatus::LocallyDeleted, Some(_)) => Some(SyncOperation::DeleteRemote {
                local: layout.clone(),
            }),
            (SyncStatus::LocallyDeleted, None) => Some(SyncOperation::DeleteLocal {
                local: layout.clone(),
            }),

            (SyncStatus::RemotelyDeleted, Some(server)) => Some(update_baseline(layout, server)),
            (SyncStatus::RemotelyDeleted, None) => {
                layout.working().is_none().then(|| SyncOperation::DeleteLocal {
                    local: layout.clone(),
                })
            }
        };

        match op {
            Some(op) if op.is_local() => local_ops.push(op),
            Some(op) => remote_ops.push(op),
            None => {}
        }
    }

    for server in remote {
        if !local_ids.contains(&server.id) {
            local_ops.push(SyncOperation::AddToCache {
                remote: server.clone(),
            });
        }
    }

    local_ops.extend(remote_ops);
    local_ops
}

fn update_baseline(local: &Layout, remote: &RemoteLayout) -> SyncOperation {
    SyncOperation::UpdateBaseline {
        local: local.clone(),
        remote: remote.clone(),
    }
}
