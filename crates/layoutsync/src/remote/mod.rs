//! # Remote Layout Service
//!
//! [`RemoteLayoutApi`] is the client the engine calls; the host supplies the
//! implementation (HTTP, RPC, ...). Transport and server failures are reported as
//! [`LayoutError::Remote`](crate::error::LayoutError::Remote).
//!
//! ## Optimistic Updates
//!
//! `update_layout` carries the `saved_at` the caller last saw. When the server's
//! copy has moved on since then it answers [`UpdateLayoutResponse::Conflict`]
//! and writes nothing; the caller must re-fetch and adopt the server's record.
//!
//! [`memory::InMemoryRemote`] is a complete in-process implementation used by
//! tests and by hosts that run without a backend.

use crate::error::Result;
use crate::model::{LayoutData, LayoutId, LayoutPermission, RemoteLayout};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;

pub use memory::InMemoryRemote;

#[derive(Debug, Clone, PartialEq)]
pub struct SaveNewLayoutParams {
    pub id: LayoutId,
    pub display_name: String,
    pub data: LayoutData,
    pub permission: LayoutPermission,
    pub saved_at: DateTime<Utc>,
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateLayoutParams {
    pub id: LayoutId,
    pub display_name: Option<String>,
    pub data: Option<LayoutData>,
    /// Time of this write.
    pub saved_at: DateTime<Utc>,
    /// The server `saved_at` this write was based on. `None` skips the check.
    pub expected_saved_at: Option<DateTime<Utc>>,
    pub parent: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpdateLayoutResponse {
    Success { new_layout: RemoteLayout },
    Conflict,
}

#[async_trait]
pub trait RemoteLayoutApi: Send + Sync {
    /// Every layout listed under any of `parents`.
    async fn get_layouts(&self, parents: &[String]) -> Result<Vec<RemoteLayout>>;

    async fn get_layout(&self, id: &LayoutId, parent: &str) -> Result<Option<RemoteLayout>>;

    async fn save_new_layout(&self, params: SaveNewLayoutParams) -> Result<RemoteLayout>;

    async fn update_layout(&self, params: UpdateLayoutParams) -> Result<UpdateLayoutResponse>;

    /// Returns `false` when the layout was already gone.
    async fn delete_layout(&self, id: &LayoutId, parent: &str) -> Result<bool>;
}
