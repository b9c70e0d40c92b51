//! # Session Setup
//!
//! Hosts that are happy with the file store call [`initialize`] once per
//! session. Hosts with their own storage build a [`LayoutManager`] directly.
//!
//! ## Storage Root Resolution
//!
//! 1. `storage_root` from [`LayoutSyncConfig`] (which also covers
//!    `LAYOUTSYNC_STORAGE_ROOT`).
//! 2. `LAYOUTSYNC_DATA`, mostly so tests can isolate their state.
//! 3. The OS data directory, via the `directories` crate.
//!
//! Records then live under `<root>/<namespace>/<id>.json`.

use crate::config::LayoutSyncConfig;
use crate::error::{LayoutError, Result};
use crate::manager::LayoutManager;
use crate::remote::RemoteLayoutApi;
use crate::store::fs_backend::FsStore;
use directories::ProjectDirs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

pub const DATA_ENV: &str = "LAYOUTSYNC_DATA";

pub fn storage_root(config: &LayoutSyncConfig) -> Result<PathBuf> {
    if let Some(root) = &config.storage_root {
        return Ok(root.clone());
    }
    if let Some(root) = std::env::var_os(DATA_ENV) {
        return Ok(PathBuf::from(root));
    }
    ProjectDirs::from("com", "layoutsync", "layoutsync")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or_else(|| LayoutError::Config("could not determine a data directory".to_string()))
}

/// Build a manager over the file store. `remote` is `None` for a local-only session.
pub fn initialize(
    config: &LayoutSyncConfig,
    remote: Option<Arc<dyn RemoteLayoutApi>>,
) -> Result<LayoutManager> {
    let root = storage_root(config)?;
    debug!(root = %root.display(), "opening layout store");
    let store = Arc::new(FsStore::new(root));
    Ok(LayoutManager::new(store, remote, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{personal_layout, TestEnv};

    #[test]
    fn test_configured_root_wins() {
        let config = LayoutSyncConfig {
            storage_root: Some(PathBuf::from("/tmp/layouts")),
            ..Default::default()
        };
        assert_eq!(storage_root(&config).unwrap(), PathBuf::from("/tmp/layouts"));
    }

    #[tokio::test]
    async fn test_initialize_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = LayoutSyncConfig {
            storage_root: Some(dir.path().to_path_buf()),
            ..Default::default()
        };

        let manager = initialize(&config, None).unwrap();
        let layout = manager.save_new_layout(personal_layout("Doc")).await.unwrap();

        let path = dir.path().join("local").join(format!("{}.json", layout.id));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_layouts_survive_a_new_session() {
        let env = TestEnv::new();
        let config = LayoutSyncConfig::default();

        let first = env.manager(None, &config);
        let saved = first.save_new_layout(personal_layout("Kept")).await.unwrap();
        drop(first);

        let second = env.manager(None, &config);
        let listed = second.get_layouts().await.unwrap();
        assert_eq!(listed, vec![saved]);
    }
}
