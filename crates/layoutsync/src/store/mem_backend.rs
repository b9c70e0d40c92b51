use super::{normalize_for_put, prepare_import, visible_in, LocalStore, MigrationReport};
use crate::error::{LayoutError, Result};
use crate::model::{Layout, LayoutId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};

/// In-memory local store for testing.
///
/// Records are kept in `BTreeMap`s so listings come back in a stable order.
#[derive(Default)]
pub struct MemoryStore {
    namespaces: Mutex<HashMap<String, BTreeMap<LayoutId, Layout>>>,
    unnamespaced: Mutex<BTreeMap<LayoutId, Layout>>,
    simulate_write_error: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable write error simulation for testing error handling.
    pub fn set_simulate_write_error(&self, simulate: bool) {
        self.simulate_write_error.store(simulate, Ordering::SeqCst);
    }

    /// Test helper: plant a record as if written before namespaces existed.
    pub fn seed_unnamespaced(&self, layout: Layout) {
        self.unnamespaced.lock().insert(layout.id.clone(), layout);
    }

    /// Test helper: every record in a namespace, ignoring parent scopes.
    pub fn raw_namespace(&self, namespace: &str) -> Vec<Layout> {
        self.namespaces
            .lock()
            .get(namespace)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    fn check_writable(&self) -> Result<()> {
        if self.simulate_write_error.load(Ordering::SeqCst) {
            return Err(LayoutError::Store("Simulated write error".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LocalStore for MemoryStore {
    async fn list(&self, namespace: &str, parents: &[String]) -> Result<Vec<Layout>> {
        let namespaces = self.namespaces.lock();
        Ok(namespaces
            .get(namespace)
            .map(|records| {
                records
                    .values()
                    .filter(|l| visible_in(l, parents))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn get(
        &self,
        namespace: &str,
        parents: &[String],
        id: &LayoutId,
    ) -> Result<Option<Layout>> {
        let namespaces = self.namespaces.lock();
        Ok(namespaces
            .get(namespace)
            .and_then(|records| records.get(id))
            .filter(|l| visible_in(l, parents))
            .cloned())
    }

    async fn put(&self, namespace: &str, parents: &[String], layout: Layout) -> Result<Layout> {
        self.check_writable()?;
        let layout = normalize_for_put(layout, parents);
        self.namespaces
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .insert(layout.id.clone(), layout.clone());
        Ok(layout)
    }

    async fn delete(&self, namespace: &str, _parents: &[String], id: &LayoutId) -> Result<()> {
        self.check_writable()?;
        if let Some(records) = self.namespaces.lock().get_mut(namespace) {
            records.remove(id);
        }
        Ok(())
    }

    async fn migrate_unnamespaced_layouts(&self, namespace: &str) -> Result<MigrationReport> {
        self.check_writable()?;
        let legacy = std::mem::take(&mut *self.unnamespaced.lock());
        let mut namespaces = self.namespaces.lock();
        let target = namespaces.entry(namespace.to_string()).or_default();

        let mut report = MigrationReport::default();
        for (id, layout) in legacy {
            if target.contains_key(&id) {
                report.skipped += 1;
            } else {
                target.insert(id, layout);
                report.migrated += 1;
            }
        }
        Ok(report)
    }

    async fn import_layouts(
        &self,
        from_namespace: &str,
        to_namespace: &str,
    ) -> Result<MigrationReport> {
        self.check_writable()?;
        let mut namespaces = self.namespaces.lock();
        let source: Vec<Layout> = namespaces
            .remove(from_namespace)
            .map(|records| records.into_values().collect())
            .unwrap_or_default();
        let target = namespaces.entry(to_namespace.to_string()).or_default();

        let mut report = MigrationReport::default();
        for layout in source {
            if target.contains_key(&layout.id) {
                report.skipped += 1;
                continue;
            }
            if let Some(imported) = prepare_import(layout) {
                target.insert(imported.id.clone(), imported);
                report.migrated += 1;
            }
        }
        Ok(report)
    }
}
