//! # Configuration
//!
//! Layout sync configuration is managed by [`confique`], which handles layered
//! loading from TOML files, environment variables and compiled defaults.
//!
//! ## Resolution Order
//!
//! 1. **Environment variables**: `LAYOUTSYNC_WORKSPACE`, `LAYOUTSYNC_STORAGE_ROOT`, etc.
//! 2. **Config file**: whatever path the host passes to [`LayoutSyncConfig::load`].
//! 3. **Compiled defaults**: `#[config(default = ...)]`.
//!
//! ## Available Settings
//!
//! | Key | Default | Description |
//! |-----|---------|-------------|
//! | `storage_root` | OS data dir | Where `FsStore` keeps its records |
//! | `workspace` | none | Remote workspace slug; selects the `remote-<workspace>` cache |
//! | `parent_scopes` | `["personal"]` | Scopes listed; the first one owns new layouts |
//! | `local_namespace` | `local` | Namespace used when no remote is configured |
//! | `backup_namespace` | `local-backup` | Mirror of personal layouts |
//! | `event_capacity` | `64` | Buffered events per subscriber before lagging |

use crate::error::Result;
use confique::Config;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_parent_scopes() -> Vec<String> {
    vec!["personal".to_string()]
}

/// Configuration for the layout sync engine, stored in `layoutsync.toml`.
#[derive(Config, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LayoutSyncConfig {
    /// Directory holding the local layout records.
    #[config(env = "LAYOUTSYNC_STORAGE_ROOT")]
    pub storage_root: Option<PathBuf>,

    /// Remote workspace slug. Layouts synced with it are cached in `remote-<workspace>`.
    #[config(env = "LAYOUTSYNC_WORKSPACE")]
    pub workspace: Option<String>,

    /// Parent scopes to list. When absent, defaults to ["personal"].
    pub parent_scopes: Option<Vec<String>>,

    #[config(default = "local", env = "LAYOUTSYNC_LOCAL_NAMESPACE")]
    pub local_namespace: String,

    #[config(default = "local-backup", env = "LAYOUTSYNC_BACKUP_NAMESPACE")]
    pub backup_namespace: String,

    #[config(default = 64, env = "LAYOUTSYNC_EVENT_CAPACITY")]
    pub event_capacity: usize,
}

impl Default for LayoutSyncConfig {
    fn default() -> Self {
        Self {
            storage_root: None,
            workspace: None,
            parent_scopes: None,
            local_namespace: "local".to_string(),
            backup_namespace: "local-backup".to_string(),
            event_capacity: 64,
        }
    }
}

impl LayoutSyncConfig {
    /// Load from environment, then `path` (if it exists), then defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Self::builder().env();
        if let Some(path) = path {
            builder = builder.file(path);
        }
        Ok(builder.load()?)
    }

    /// Get parent scopes, using defaults if not configured or empty.
    pub fn parent_scopes(&self) -> Vec<String> {
        match &self.parent_scopes {
            Some(scopes) if !scopes.is_empty() => scopes.clone(),
            _ => default_parent_scopes(),
        }
    }

    /// The parent assigned to layouts created in this session.
    pub fn default_parent(&self) -> String {
        self.parent_scopes()
            .into_iter()
            .next()
            .unwrap_or_default()
    }

    /// Namespace caching the configured remote workspace, if any.
    pub fn remote_namespace(&self) -> Option<String> {
        self.workspace
            .as_deref()
            .filter(|ws| !ws.is_empty())
            .map(|ws| format!("remote-{}", ws))
    }

    /// Broadcast channels reject a zero capacity.
    pub fn event_capacity(&self) -> usize {
        self.event_capacity.max(1)
    }
}
