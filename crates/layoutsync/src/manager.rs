//! # Layout Manager
//!
//! [`LayoutManager`] is the single entry point hosts talk to. Like any facade
//! it mostly dispatches: the logic of each operation lives in `commands/*.rs`.
//! What the manager adds on top is session state:
//!
//! - **Busy tracking**: every public operation holds a [`BusyGuard`] for its
//!   whole body, so the busy flag drops back even on early returns and errors.
//! - **Single-flight sync**: concurrent [`LayoutManager::sync_with_remote`]
//!   calls share one run. The run honors the cancellation token of the caller
//!   that started it, and runs on its own task: dropping every caller's future
//!   does not stop it.
//! - **Online flag**: set by the host; operations that need the server fail
//!   fast with [`LayoutError::Offline`] while it is off.
//! - **Sticky error**: a failed sync is remembered until a later sync succeeds.
//! - **Events**: see [`LayoutEvent`].
//!
//! ## Stores
//!
//! | Store | Namespace | Used when |
//! |-------|-----------|-----------|
//! | personal | `local` | No remote service is configured |
//! | tracking | `remote-<workspace>` | A remote is configured (imports `local` once) |
//! | backup | `local-backup` | Always; mirrors personal layouts during sync |
//!
//! The manager is cheap to clone; clones share all state.

use crate::commands::{self, PersonalCopyOutcome};
use crate::config::LayoutSyncConfig;
use crate::error::{LayoutError, Result};
use crate::events::{BusyGuard, BusyTracker, EventBus, LayoutEvent};
use crate::model::{Layout, LayoutId, LayoutUpdate, NewLayout, PersonalCopy};
use crate::remote::RemoteLayoutApi;
use crate::store::{LocalStore, MigrationPlan, NamespacedStore};
use crate::sync::SyncReport;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

type SyncOutcome = std::result::Result<SyncReport, Arc<LayoutError>>;
type SharedSync = Shared<BoxFuture<'static, SyncOutcome>>;

/// The configured remote service and the cache that tracks it.
pub(crate) struct RemoteLink {
    pub(crate) api: Arc<dyn RemoteLayoutApi>,
    pub(crate) cache: NamespacedStore,
}

pub(crate) struct ManagerState {
    pub(crate) personal: NamespacedStore,
    pub(crate) backup: NamespacedStore,
    pub(crate) remote: Option<RemoteLink>,
    pub(crate) parents: Vec<String>,
    pub(crate) default_parent: String,
    pub(crate) events: EventBus,
    busy: Arc<BusyTracker>,
    online: AtomicBool,
    error: Mutex<Option<Arc<LayoutError>>>,
    in_flight: Mutex<Option<SharedSync>>,
}

impl ManagerState {
    pub(crate) fn new(
        store: Arc<dyn LocalStore>,
        remote: Option<Arc<dyn RemoteLayoutApi>>,
        config: &LayoutSyncConfig,
    ) -> Self {
        let parents = config.parent_scopes();
        let events = EventBus::new(config.event_capacity());

        let personal = NamespacedStore::new(
            store.clone(),
            config.local_namespace.clone(),
            parents.clone(),
            MigrationPlan {
                migrate_unnamespaced: remote.is_none(),
                import_from: None,
            },
        );
        let backup = NamespacedStore::new(
            store.clone(),
            config.backup_namespace.clone(),
            parents.clone(),
            MigrationPlan::default(),
        );
        let remote = remote.map(|api| RemoteLink {
            api,
            cache: NamespacedStore::new(
                store,
                config
                    .remote_namespace()
                    .unwrap_or_else(|| "remote-default".to_string()),
                parents.clone(),
                MigrationPlan {
                    migrate_unnamespaced: true,
                    import_from: Some(config.local_namespace.clone()),
                },
            ),
        });

        Self {
            personal,
            backup,
            remote,
            default_parent: config.default_parent(),
            parents,
            busy: Arc::new(BusyTracker::new(events.clone())),
            events,
            online: AtomicBool::new(true),
            error: Mutex::new(None),
            in_flight: Mutex::new(None),
        }
    }

    /// The store readers and writers target in this session.
    pub(crate) fn primary(&self) -> &NamespacedStore {
        match &self.remote {
            Some(link) => &link.cache,
            None => &self.personal,
        }
    }

    /// Whether new local layouts start out pending upload.
    pub(crate) fn syncs(&self) -> bool {
        self.remote.is_some()
    }

    pub(crate) fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub(crate) fn set_online(&self, online: bool) {
        let was = self.online.swap(online, Ordering::SeqCst);
        if was != online {
            info!(online, "layout manager connectivity changed");
            self.events.emit(LayoutEvent::OnlineChange { online });
        }
    }

    /// The remote, if one is configured and reachable. For best-effort reads.
    pub(crate) fn reachable_remote(&self) -> Option<&RemoteLink> {
        self.remote.as_ref().filter(|_| self.is_online())
    }

    /// The remote for an operation that cannot proceed without it.
    pub(crate) fn require_remote(&self, action: &str) -> Result<&RemoteLink> {
        let link = self
            .remote
            .as_ref()
            .ok_or_else(|| LayoutError::RemoteNotConfigured(action.to_string()))?;
        if !self.is_online() {
            return Err(LayoutError::Offline(action.to_string()));
        }
        Ok(link)
    }

    fn enter(&self) -> BusyGuard {
        self.busy.enter()
    }

    fn set_error(&self, next: Option<Arc<LayoutError>>) {
        let mut current = self.error.lock();
        if current.is_none() && next.is_none() {
            return;
        }
        *current = next.clone();
        drop(current);
        self.events.emit(LayoutEvent::ErrorChange { error: next });
    }

    fn changed(&self, layout: &Layout) {
        self.events.emit(LayoutEvent::Change {
            updated_layout: Some(layout.clone()),
        });
    }
}

#[derive(Clone)]
pub struct LayoutManager {
    inner: Arc<ManagerState>,
}

impl LayoutManager {
    /// Construct once per session. `remote` is `None` for a local-only session.
    pub fn new(
        store: Arc<dyn LocalStore>,
        remote: Option<Arc<dyn RemoteLayoutApi>>,
        config: &LayoutSyncConfig,
    ) -> Self {
        Self {
            inner: Arc::new(ManagerState::new(store, remote, config)),
        }
    }

    /// Visible layouts. Tombstones are left out.
    pub async fn get_layouts(&self) -> Result<Vec<Layout>> {
        let _busy = self.inner.enter();
        commands::get::list(&self.inner).await
    }

    /// Local first; on a miss, asks the server (when online) and caches the answer.
    pub async fn get_layout(&self, id: &LayoutId) -> Result<Option<Layout>> {
        let _busy = self.inner.enter();
        commands::get::one(&self.inner, id).await
    }

    pub async fn save_new_layout(&self, new: NewLayout) -> Result<Layout> {
        let _busy = self.inner.enter();
        let layout = commands::save::run(&self.inner, new).await?;
        self.inner.changed(&layout);
        Ok(layout)
    }

    /// `Ok(None)` when the layout no longer exists.
    pub async fn update_layout(&self, update: LayoutUpdate) -> Result<Option<Layout>> {
        let _busy = self.inner.enter();
        let updated = commands::update::run(&self.inner, update).await?;
        if let Some(layout) = &updated {
            self.inner.changed(layout);
        }
        Ok(updated)
    }

    /// Deleting a missing layout is a no-op.
    pub async fn delete_layout(&self, id: &LayoutId) -> Result<()> {
        let _busy = self.inner.enter();
        if commands::delete::run(&self.inner, id).await? {
            self.inner.events.emit(LayoutEvent::Delete {
                layout_id: id.clone(),
            });
        }
        Ok(())
    }

    /// Promote the working copy to the baseline.
    pub async fn overwrite_layout(&self, id: &LayoutId) -> Result<Option<Layout>> {
        let _busy = self.inner.enter();
        let updated = commands::overwrite::run(&self.inner, id).await?;
        if let Some(layout) = &updated {
            self.inner.changed(layout);
        }
        Ok(updated)
    }

    /// Discard the working copy.
    pub async fn revert_layout(&self, id: &LayoutId) -> Result<Option<Layout>> {
        let _busy = self.inner.enter();
        let reverted = commands::revert::run(&self.inner, id).await?;
        if let Some(layout) = &reverted {
            self.inner.changed(layout);
        }
        Ok(reverted)
    }

    pub async fn make_personal_copy(&self, request: PersonalCopy) -> Result<Layout> {
        let _busy = self.inner.enter();
        let PersonalCopyOutcome { copy, source } =
            commands::copy::run(&self.inner, request).await?;
        self.inner.changed(&source);
        self.inner.changed(&copy);
        Ok(copy)
    }

    /// Reconcile the cache with the server.
    ///
    /// At most one run is in flight: a call made while another is running
    /// awaits that run instead of starting a new one. Failures come back wrapped
    /// in [`LayoutError::Sync`] (use [`LayoutError::root`]) and stay readable
    /// through [`LayoutManager::error`] until a later run succeeds.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn sync_with_remote(&self, cancel: CancellationToken) -> Result<SyncReport> {
        let run = {
            let mut in_flight = self.inner.in_flight.lock();
            match in_flight.as_ref() {
                Some(run) => run.clone(),
                None => {
                    let run = Self::start_sync(Arc::clone(&self.inner), cancel);
                    *in_flight = Some(run.clone());
                    run
                }
            }
        };
        run.await.map_err(LayoutError::Sync)
    }

    /// Spawns the run so it finishes (and clears `in_flight`) even if every
    /// caller stops polling. Must be called with `in_flight` locked.
    fn start_sync(state: Arc<ManagerState>, cancel: CancellationToken) -> SharedSync {
        let busy = state.enter();
        let handle = tokio::spawn(async move {
            let _busy = busy;
            let result = commands::sync::run(&state, &cancel).await.map_err(Arc::new);
            state.in_flight.lock().take();

            match &result {
                Ok(report) => {
                    state.set_error(None);
                    if !report.is_empty() {
                        state.events.emit(LayoutEvent::Change {
                            updated_layout: None,
                        });
                    }
                }
                Err(err) => {
                    error!(error = %err, "layout sync failed");
                    state.set_error(Some(Arc::clone(err)));
                }
            }
            result
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(err) => Err(Arc::new(LayoutError::Task(err.to_string()))),
            }
        }
        .boxed()
        .shared()
    }

    /// Set by the host when connectivity changes.
    pub fn set_online(&self, online: bool) {
        self.inner.set_online(online);
    }

    pub fn is_online(&self) -> bool {
        self.inner.is_online()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.is_busy()
    }

    /// The error of the last failed sync, if no sync has succeeded since.
    pub fn error(&self) -> Option<Arc<LayoutError>> {
        self.inner.error.lock().clone()
    }

    /// Whether shared layouts can be created (a remote service is configured).
    pub fn supports_sharing(&self) -> bool {
        self.inner.syncs()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LayoutEvent> {
        self.inner.events.subscribe()
    }

    /// Layouts held by the backup mirror, for recovery after cache loss.
    pub async fn backup_layouts(&self) -> Result<Vec<Layout>> {
        let _busy = self.inner.enter();
        Ok(self
            .inner
            .backup
            .list()
            .await?
            .into_iter()
            .filter(|layout| !layout.is_hidden())
            .collect())
    }
}
