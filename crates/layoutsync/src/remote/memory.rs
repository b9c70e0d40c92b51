use super::{RemoteLayoutApi, SaveNewLayoutParams, UpdateLayoutParams, UpdateLayoutResponse};
use crate::error::{LayoutError, Result};
use crate::model::{LayoutData, LayoutId, RemoteLayout};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Number of calls served per endpoint.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RemoteCallCounts {
    pub get_layouts: usize,
    pub get_layout: usize,
    pub save_new_layout: usize,
    pub update_layout: usize,
    pub delete_layout: usize,
}

#[derive(Default)]
struct Counters {
    get_layouts: AtomicUsize,
    get_layout: AtomicUsize,
    save_new_layout: AtomicUsize,
    update_layout: AtomicUsize,
    delete_layout: AtomicUsize,
}

/// In-process layout service.
///
/// Assigns server timestamps that strictly increase, so two writes in the same
/// millisecond still compare as ordered. Supports failure injection and an
/// artificial latency for exercising concurrent callers.
#[derive(Default)]
pub struct InMemoryRemote {
    layouts: Mutex<BTreeMap<LayoutId, RemoteLayout>>,
    last_saved_at: Mutex<Option<DateTime<Utc>>>,
    simulate_failure: AtomicBool,
    latency: Mutex<Option<std::time::Duration>>,
    calls: Counters,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with a transport error.
    pub fn set_simulate_failure(&self, simulate: bool) {
        self.simulate_failure.store(simulate, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<std::time::Duration>) {
        *self.latency.lock() = latency;
    }

    pub fn calls(&self) -> RemoteCallCounts {
        let c = &self.calls;
        RemoteCallCounts {
            get_layouts: c.get_layouts.load(Ordering::SeqCst),
            get_layout: c.get_layout.load(Ordering::SeqCst),
            save_new_layout: c.save_new_layout.load(Ordering::SeqCst),
            update_layout: c.update_layout.load(Ordering::SeqCst),
            delete_layout: c.delete_layout.load(Ordering::SeqCst),
        }
    }

    /// Server-side view of one layout, bypassing counters and failure injection.
    pub fn layout(&self, id: &LayoutId) -> Option<RemoteLayout> {
        self.layouts.lock().get(id).cloned()
    }

    pub fn layouts(&self) -> Vec<RemoteLayout> {
        self.layouts.lock().values().cloned().collect()
    }

    /// Store a layout as-is, e.g. one created by another client.
    pub fn insert(&self, layout: RemoteLayout) {
        {
            let mut last = self.last_saved_at.lock();
            if last.map_or(true, |prev| prev < layout.saved_at) {
                *last = Some(layout.saved_at);
            }
        }
        self.layouts.lock().insert(layout.id.clone(), layout);
    }

    /// Simulate another writer changing a layout. Returns the new server copy.
    pub fn external_update(
        &self,
        id: &LayoutId,
        display_name: Option<&str>,
        data: Option<LayoutData>,
    ) -> Option<RemoteLayout> {
        let saved_at = self.next_saved_at();
        let mut layouts = self.layouts.lock();
        let layout = layouts.get_mut(id)?;
        if let Some(name) = display_name {
            layout.display_name = name.to_string();
        }
        if let Some(data) = data {
            layout.data = data;
        }
        layout.saved_at = saved_at;
        Some(layout.clone())
    }

    /// Simulate another writer deleting a layout.
    pub fn external_delete(&self, id: &LayoutId) -> Option<RemoteLayout> {
        self.layouts.lock().remove(id)
    }

    fn next_saved_at(&self) -> DateTime<Utc> {
        let mut last = self.last_saved_at.lock();
        let now = Utc::now();
        let next = match *last {
            Some(prev) if prev >= now => prev + Duration::milliseconds(1),
            _ => now,
        };
        *last = Some(next);
        next
    }

    async fn serve(&self, counter: &AtomicUsize) -> Result<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.simulate_failure.load(Ordering::SeqCst) {
            return Err(LayoutError::Remote("Simulated remote failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteLayoutApi for InMemoryRemote {
    async fn get_layouts(&self, parents: &[String]) -> Result<Vec<RemoteLayout>> {
        self.serve(&self.calls.get_layouts).await?;
        Ok(self
            .layouts
            .lock()
            .values()
            .filter(|l| parents.is_empty() || parents.contains(&l.parent))
            .cloned()
            .collect())
    }

    async fn get_layout(&self, id: &LayoutId, _parent: &str) -> Result<Option<RemoteLayout>> {
        self.serve(&self.calls.get_layout).await?;
        Ok(self.layouts.lock().get(id).cloned())
    }

    async fn save_new_layout(&self, params: SaveNewLayoutParams) -> Result<RemoteLayout> {
        self.serve(&self.calls.save_new_layout).await?;
        let saved_at = self.next_saved_at();
        let mut layouts = self.layouts.lock();
        if layouts.contains_key(&params.id) {
            return Err(LayoutError::Remote(format!(
                "Layout {} already exists",
                params.id
            )));
        }
        let layout = RemoteLayout {
            id: params.id,
            display_name: params.display_name,
            permission: params.permission,
            data: params.data,
            saved_at,
            parent: params.parent,
        };
        layouts.insert(layout.id.clone(), layout.clone());
        Ok(layout)
    }

    async fn update_layout(&self, params: UpdateLayoutParams) -> Result<UpdateLayoutResponse> {
        self.serve(&self.calls.update_layout).await?;
        let saved_at = self.next_saved_at();
        let mut layouts = self.layouts.lock();
        let Some(layout) = layouts.get_mut(&params.id) else {
            return Ok(UpdateLayoutResponse::Conflict);
        };
        if let Some(expected) = params.expected_saved_at {
            if expected != layout.saved_at {
                return Ok(UpdateLayoutResponse::Conflict);
            }
        }
        if let Some(name) = params.display_name {
            layout.display_name = name;
        }
        if let Some(data) = params.data {
            layout.data = data;
        }
        layout.saved_at = saved_at;
        Ok(UpdateLayoutResponse::Success {
            new_layout: layout.clone(),
        })
    }

    async fn delete_layout(&self, id: &LayoutId, _parent: &str) -> Result<bool> {
        self.serve(&self.calls.delete_layout).await?;
        Ok(self.layouts.lock().remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LayoutPermission;
    use serde_json::json;

    fn params(name: &str) -> SaveNewLayoutParams {
        SaveNewLayoutParams {
            id: LayoutId::generate(),
            display_name: name.to_string(),
            data: LayoutData::new(json!({"v": 1})),
            permission: LayoutPermission::SharedWrite,
            saved_at: Utc::now(),
            parent: "org:1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_save_and_list_by_parent() {
        let remote = InMemoryRemote::new();
        remote.save_new_layout(params("Shared")).await.unwrap();

        assert_eq!(remote.get_layouts(&["org:1".to_string()]).await.unwrap().len(), 1);
        assert!(remote.get_layouts(&["org:2".to_string()]).await.unwrap().is_empty());
        assert_eq!(remote.calls().get_layouts, 2);
    }

    #[tokio::test]
    async fn test_timestamps_strictly_increase() {
        let remote = InMemoryRemote::new();
        let first = remote.save_new_layout(params("A")).await.unwrap();
        let second = remote.save_new_layout(params("B")).await.unwrap();
        assert!(second.saved_at > first.saved_at);
    }

    #[tokio::test]
    async fn test_stale_update_conflicts() {
        let remote = InMemoryRemote::new();
        let saved = remote.save_new_layout(params("A")).await.unwrap();
        remote.external_update(&saved.id, Some("Theirs"), None);

        let response = remote
            .update_layout(UpdateLayoutParams {
                id: saved.id.clone(),
                display_name: Some("Mine".into()),
                data: None,
                saved_at: Utc::now(),
                expected_saved_at: Some(saved.saved_at),
                parent: saved.parent.clone(),
            })
            .await
            .unwrap();

        assert_eq!(response, UpdateLayoutResponse::Conflict);
        assert_eq!(remote.layout(&saved.id).unwrap().display_name, "Theirs");
    }

    #[tokio::test]
    async fn test_current_update_succeeds() {
        let remote = InMemoryRemote::new();
        let saved = remote.save_new_layout(params("A")).await.unwrap();

        let response = remote
            .update_layout(UpdateLayoutParams {
                id: saved.id.clone(),
                display_name: Some("Renamed".into()),
                data: None,
                saved_at: Utc::now(),
                expected_saved_at: Some(saved.saved_at),
                parent: saved.parent.clone(),
            })
            .await
            .unwrap();

        let UpdateLayoutResponse::Success { new_layout } = response else {
            panic!("expected success");
        };
        assert_eq!(new_layout.display_name, "Renamed");
        assert!(new_layout.saved_at > saved.saved_at);
    }

    #[tokio::test]
    async fn test_simulated_failure() {
        let remote = InMemoryRemote::new();
        remote.set_simulate_failure(true);
        let result = remote.get_layouts(&[]).await;
        assert!(matches!(result, Err(LayoutError::Remote(_))));
    }

    #[tokio::test]
    async fn test_delete_reports_absence() {
        let remote = InMemoryRemote::new();
        let saved = remote.save_new_layout(params("A")).await.unwrap();
        assert!(remote.delete_layout(&saved.id, "org:1").await.unwrap());
        assert!(!remote.delete_layout(&saved.id, "org:1").await.unwrap());
    }
}
