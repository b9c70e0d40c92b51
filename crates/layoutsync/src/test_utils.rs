//! Fixtures shared by unit tests and, behind the `test_utils` feature, by
//! downstream crates.

use crate::config::LayoutSyncConfig;
use crate::manager::LayoutManager;
use crate::model::{LayoutData, LayoutId, LayoutPermission, NewLayout, RemoteLayout};
use crate::remote::RemoteLayoutApi;
use crate::store::fs_backend::FsStore;
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// A file-backed store rooted in a temporary directory.
pub struct TestEnv {
    // Held so the directory outlives the test.
    pub _temp_dir: TempDir,
    pub store: Arc<FsStore>,
    pub root: PathBuf,
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        let store = Arc::new(FsStore::new(root.clone()));
        Self {
            _temp_dir: temp_dir,
            store,
            root,
        }
    }

    /// A manager over this environment's store.
    pub fn manager(
        &self,
        remote: Option<Arc<dyn RemoteLayoutApi>>,
        config: &LayoutSyncConfig,
    ) -> LayoutManager {
        LayoutManager::new(self.store.clone(), remote, config)
    }
}

pub fn sample_data(tag: &str) -> LayoutData {
    LayoutData::new(json!({
        "panels": [{ "id": tag, "type": "plot" }],
        "tag": tag,
    }))
}

pub fn personal_layout(name: &str) -> NewLayout {
    NewLayout {
        display_name: name.to_string(),
        data: sample_data(name),
        permission: LayoutPermission::Personal,
    }
}

pub fn shared_layout(name: &str) -> NewLayout {
    NewLayout {
        permission: LayoutPermission::SharedWrite,
        ..personal_layout(name)
    }
}

/// A personal layout as another client would have uploaded it.
pub fn remote_layout(name: &str, parent: &str) -> RemoteLayout {
    RemoteLayout {
        id: LayoutId::generate(),
        display_name: name.to_string(),
        permission: LayoutPermission::Personal,
        data: sample_data(name),
        saved_at: Utc::now(),
        parent: parent.to_string(),
    }
}

#[cfg(test)]
pub(crate) use state::StateFixture;
