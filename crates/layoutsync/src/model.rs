//! # Domain Model: Layouts, Baselines and Working Copies
//!
//! A [`Layout`] is the unit of synchronization. Its document ([`LayoutData`]) is
//! opaque to this crate: we never look inside it, we only compare and copy it.
//!
//! ## Baseline vs Working Copy
//!
//! ```text
//! working   <-- uncommitted local edit (optional)
//! baseline  <-- last state known to be persisted (locally authored or fetched)
//! ```
//!
//! The working copy exists **only** when its data differs from the baseline.
//! Setting a working copy identical to the baseline collapses it to `None`.
//! This rule is enforced in exactly one place, [`Layout::set_working`]; every
//! other mutation that can affect it (new baseline, remote refresh) routes
//! through that method.
//!
//! ## Sync Info
//!
//! `sync_info` is `None` for layouts that never sync (no remote configured).
//! Otherwise it tracks where the record stands relative to the server:
//!
//! | Status | Meaning |
//! |--------|---------|
//! | `new` | Created locally, never uploaded |
//! | `tracked` | Baseline matches the server as of `last_remote_saved_at` |
//! | `updated` | Baseline changed locally, upload pending |
//! | `locally-deleted` | Deleted locally, remote delete pending |
//! | `remotely-deleted` | Gone from the server; kept as a tombstone |
//!
//! Tombstones (`locally-deleted`, `remotely-deleted`) are hidden from readers.
//!
//! ## Legacy Records
//!
//! Records written before namespacing used `name` instead of `displayName` and
//! had no permission or parent. The custom [`Deserialize`] impl fills those in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque, immutable layout identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutId(String);

impl LayoutId {
    /// Mint a fresh identifier for a locally created layout.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayoutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for LayoutId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<&str> for LayoutId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// The layout document. Compared structurally, never interpreted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutData(serde_json::Value);

impl LayoutData {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

impl From<serde_json::Value> for LayoutData {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutPermission {
    /// Lives only in the owner's namespace.
    #[default]
    Personal,
    SharedRead,
    SharedWrite,
}

impl LayoutPermission {
    pub fn is_shared(self) -> bool {
        !matches!(self, LayoutPermission::Personal)
    }
}

/// A document plus the time it was persisted (if it ever was).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutSnapshot {
    pub data: LayoutData,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl LayoutSnapshot {
    pub fn new(data: LayoutData, saved_at: Option<DateTime<Utc>>) -> Self {
        Self { data, saved_at }
    }

    pub fn now(data: LayoutData) -> Self {
        Self::new(data, Some(Utc::now()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    New,
    Tracked,
    Updated,
    LocallyDeleted,
    RemotelyDeleted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncInfo {
    pub status: SyncStatus,
    #[serde(default)]
    pub last_remote_saved_at: Option<DateTime<Utc>>,
}

impl SyncInfo {
    pub fn new_unsynced() -> Self {
        Self {
            status: SyncStatus::New,
            last_remote_saved_at: None,
        }
    }

    pub fn tracked(saved_at: DateTime<Utc>) -> Self {
        Self {
            status: SyncStatus::Tracked,
            last_remote_saved_at: Some(saved_at),
        }
    }
}

/// A layout as the remote service reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteLayout {
    pub id: LayoutId,
    pub display_name: String,
    pub permission: LayoutPermission,
    pub data: LayoutData,
    pub saved_at: DateTime<Utc>,
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub id: LayoutId,
    pub display_name: String,
    pub permission: LayoutPermission,
    /// Scope path (user, project, ...) the layout is listed under.
    pub parent: String,
    baseline: LayoutSnapshot,
    working: Option<LayoutSnapshot>,
    pub sync_info: Option<SyncInfo>,
}

impl<'de> Deserialize<'de> for Layout {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let helper = LayoutHelper::deserialize(deserializer)?;

        let mut layout = Layout {
            id: helper.id,
            display_name: helper.display_name,
            permission: helper.permission.unwrap_or_default(),
            parent: helper.parent.unwrap_or_default(),
            baseline: helper.baseline,
            working: None,
            sync_info: helper.sync_info,
        };
        // Records on disk may predate the collapse rule.
        layout.set_working(helper.working);
        Ok(layout)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LayoutHelper {
    id: LayoutId,
    #[serde(alias = "name")]
    display_name: String,
    #[serde(default)]
    permission: Option<LayoutPermission>,
    #[serde(default)]
    parent: Option<String>,
    baseline: LayoutSnapshot,
    #[serde(default)]
    working: Option<LayoutSnapshot>,
    #[serde(default)]
    sync_info: Option<SyncInfo>,
}

impl Layout {
    /// A locally authored layout with a fresh id. `syncs` decides whether it
    /// starts as `new` (pending upload) or carries no sync info at all.
    pub fn new_local(
        display_name: impl Into<String>,
        data: LayoutData,
        permission: LayoutPermission,
        parent: impl Into<String>,
        syncs: bool,
    ) -> Self {
        Self {
            id: LayoutId::generate(),
            display_name: display_name.into(),
            permission,
            parent: parent.into(),
            baseline: LayoutSnapshot::now(data),
            working: None,
            sync_info: syncs.then(SyncInfo::new_unsynced),
        }
    }

    /// A cache entry for a layout fetched from the server.
    pub fn from_remote(remote: &RemoteLayout) -> Self {
        Self {
            id: remote.id.clone(),
            display_name: remote.display_name.clone(),
            permission: remote.permission,
            parent: remote.parent.clone(),
            baseline: LayoutSnapshot::new(remote.data.clone(), Some(remote.saved_at)),
            working: None,
            sync_info: Some(SyncInfo::tracked(remote.saved_at)),
        }
    }

    pub fn baseline(&self) -> &LayoutSnapshot {
        &self.baseline
    }

    pub fn working(&self) -> Option<&LayoutSnapshot> {
        self.working.as_ref()
    }

    /// Replace the working copy. Collapses to `None` when the data equals the baseline.
    pub fn set_working(&mut self, working: Option<LayoutSnapshot>) {
        self.working = working.filter(|w| w.data != self.baseline.data);
    }

    /// Replace the baseline, keeping the working copy unless it now matches.
    pub fn set_baseline(&mut self, baseline: LayoutSnapshot) {
        self.baseline = baseline;
        let working = self.working.take();
        self.set_working(working);
    }

    /// Builder form of [`Layout::set_working`], handy in fixtures.
    pub fn with_working(mut self, data: LayoutData) -> Self {
        self.set_working(Some(LayoutSnapshot::now(data)));
        self
    }

    /// The document the user currently sees: working copy if any, else baseline.
    pub fn effective_data(&self) -> &LayoutData {
        self.working
            .as_ref()
            .map(|w| &w.data)
            .unwrap_or(&self.baseline.data)
    }

    pub fn is_shared(&self) -> bool {
        self.permission.is_shared()
    }

    pub fn sync_status(&self) -> Option<SyncStatus> {
        self.sync_info.as_ref().map(|info| info.status)
    }

    pub fn last_remote_saved_at(&self) -> Option<DateTime<Utc>> {
        self.sync_info
            .as_ref()
            .and_then(|info| info.last_remote_saved_at)
    }

    /// Tombstoned records stay on disk but are absent to readers.
    pub fn is_hidden(&self) -> bool {
        matches!(
            self.sync_status(),
            Some(SyncStatus::LocallyDeleted | SyncStatus::RemotelyDeleted)
        )
    }

    /// Adopt the server's copy as the new baseline. Name and permission follow
    /// the server; the working copy is left alone.
    pub fn apply_remote_baseline(&mut self, remote: &RemoteLayout) {
        self.display_name = remote.display_name.clone();
        self.permission = remote.permission;
        self.parent = remote.parent.clone();
        self.sync_info = Some(SyncInfo::tracked(remote.saved_at));
        self.set_baseline(LayoutSnapshot::new(
            remote.data.clone(),
            Some(remote.saved_at),
        ));
    }

    /// Local baseline changed: flag it for upload unless it was never uploaded.
    pub fn mark_baseline_changed(&mut self) {
        if let Some(info) = self.sync_info.as_mut() {
            if matches!(info.status, SyncStatus::Tracked) {
                info.status = SyncStatus::Updated;
            }
        }
    }

    pub fn set_sync_status(&mut self, status: SyncStatus) {
        match self.sync_info.as_mut() {
            Some(info) => info.status = status,
            None => {
                self.sync_info = Some(SyncInfo {
                    status,
                    last_remote_saved_at: None,
                })
            }
        }
    }
}

/// Input for [`crate::manager::LayoutManager::save_new_layout`].
#[derive(Debug, Clone)]
pub struct NewLayout {
    pub display_name: String,
    pub data: LayoutData,
    pub permission: LayoutPermission,
}

/// Input for [`crate::manager::LayoutManager::update_layout`].
#[derive(Debug, Clone)]
pub struct LayoutUpdate {
    pub id: LayoutId,
    pub display_name: Option<String>,
    pub data: Option<LayoutData>,
}

impl LayoutUpdate {
    pub fn rename(id: LayoutId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: Some(display_name.into()),
            data: None,
        }
    }

    pub fn data(id: LayoutId, data: LayoutData) -> Self {
        Self {
            id,
            display_name: None,
            data: Some(data),
        }
    }
}

/// Input for [`crate::manager::LayoutManager::make_personal_copy`].
#[derive(Debug, Clone)]
pub struct PersonalCopy {
    pub id: LayoutId,
    pub display_name: String,
}
