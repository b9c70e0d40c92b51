use super::{normalize_for_put, prepare_import, visible_in, LocalStore, MigrationReport};
use crate::error::{LayoutError, Result};
use crate::model::{Layout, LayoutId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

const RECORD_EXT: &str = "json";

/// Filesystem local store: one JSON document per layout.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn namespace_dir(&self, namespace: &str) -> Result<PathBuf> {
        check_path_component(namespace, "namespace")?;
        Ok(self.root.join(namespace))
    }

    fn record_path(&self, dir: &Path, id: &LayoutId) -> Result<PathBuf> {
        check_path_component(id.as_str(), "layout id")?;
        Ok(dir.join(format!("{}.{}", id, RECORD_EXT)))
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if fs::try_exists(path).await? {
            return Ok(());
        }
        fs::create_dir_all(path).await.map_err(LayoutError::Io)
    }

    async fn read_record(&self, path: &Path) -> Result<Option<Layout>> {
        if !fs::try_exists(path).await? {
            return Ok(None);
        }
        let content = fs::read_to_string(path).await?;
        let layout = serde_json::from_str(&content)?;
        Ok(Some(layout))
    }

    async fn write_record(&self, dir: &Path, layout: &Layout) -> Result<()> {
        self.ensure_dir(dir).await?;
        let target = self.record_path(dir, &layout.id)?;
        let content = serde_json::to_string_pretty(layout)?;

        // Atomic write
        let tmp = dir.join(format!(".layout-{}.tmp", Uuid::new_v4()));
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &target).await?;
        Ok(())
    }

    /// Every parseable record file directly inside `dir`. Unreadable files are
    /// logged and skipped so one corrupt record cannot hide the rest.
    async fn read_dir_records(&self, dir: &Path) -> Result<Vec<(PathBuf, Layout)>> {
        if !fs::try_exists(dir).await? {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_record = path.extension().is_some_and(|ext| ext == RECORD_EXT)
                && entry.file_type().await?.is_file();
            if !is_record {
                continue;
            }
            match self.read_record(&path).await {
                Ok(Some(layout)) => records.push((path, layout)),
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable layout record")
                }
            }
        }
        records.sort_by(|(_, a), (_, b)| a.id.cmp(&b.id));
        Ok(records)
    }
}

fn check_path_component(value: &str, what: &str) -> Result<()> {
    let invalid = value.is_empty()
        || value == "."
        || value == ".."
        || value.contains(['/', '\\']);
    if invalid {
        return Err(LayoutError::Store(format!("Invalid {}: {:?}", what, value)));
    }
    Ok(())
}

#[async_trait]
impl LocalStore for FsStore {
    async fn list(&self, namespace: &str, parents: &[String]) -> Result<Vec<Layout>> {
        let dir = self.namespace_dir(namespace)?;
        Ok(self
            .read_dir_records(&dir)
            .await?
            .into_iter()
            .map(|(_, layout)| layout)
            .filter(|layout| visible_in(layout, parents))
            .collect())
    }

    async fn get(
        &self,
        namespace: &str,
        parents: &[String],
        id: &LayoutId,
    ) -> Result<Option<Layout>> {
        let dir = self.namespace_dir(namespace)?;
        let path = self.record_path(&dir, id)?;
        Ok(self
            .read_record(&path)
            .await?
            .filter(|layout| visible_in(layout, parents)))
    }

    async fn put(&self, namespace: &str, parents: &[String], layout: Layout) -> Result<Layout> {
        let dir = self.namespace_dir(namespace)?;
        let layout = normalize_for_put(layout, parents);
        self.write_record(&dir, &layout).await?;
        Ok(layout)
    }

    async fn delete(&self, namespace: &str, _parents: &[String], id: &LayoutId) -> Result<()> {
        let dir = self.namespace_dir(namespace)?;
        let path = self.record_path(&dir, id)?;
        if fs::try_exists(&path).await? {
            fs::remove_file(path).await?;
        }
        Ok(())
    }

    async fn migrate_unnamespaced_layouts(&self, namespace: &str) -> Result<MigrationReport> {
        let target_dir = self.namespace_dir(namespace)?;
        let legacy = self.read_dir_records(&self.root).await?;

        let mut report = MigrationReport::default();
        if legacy.is_empty() {
            return Ok(report);
        }
        self.ensure_dir(&target_dir).await?;

        for (legacy_path, layout) in legacy {
            let target = self.record_path(&target_dir, &layout.id)?;
            if fs::try_exists(&target).await? {
                fs::remove_file(&legacy_path).await?;
                report.skipped += 1;
            } else {
                // Re-serialize rather than rename so legacy field names are upgraded.
                self.write_record(&target_dir, &layout).await?;
                fs::remove_file(&legacy_path).await?;
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
        let from_dir = self.namespace_dir(from_namespace)?;
        let to_dir = self.namespace_dir(to_namespace)?;

        let mut report = MigrationReport::default();
        for (source, layout) in self.read_dir_records(&from_dir).await? {
            let target = self.record_path(&to_dir, &layout.id)?;
            if fs::try_exists(&target).await? {
                report.skipped += 1;
            } else if let Some(imported) = prepare_import(layout) {
                self.write_record(&to_dir, &imported).await?;
                report.migrated += 1;
            }
            // A move: the source must not be imported again next session.
            fs::remove_file(&source).await?;
        }
        Ok(report)
    }
}
