use crate::model::LayoutId;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Layout not found: {0}")]
    LayoutNotFound(LayoutId),

    #[error("Cannot {0} while offline")]
    Offline(String),

    #[error("Cannot {0}: no remote layout service is configured")]
    RemoteNotConfigured(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Sync was cancelled")]
    Cancelled,

    #[error("Background task failed: {0}")]
    Task(String),

    /// A sync failure shared between every caller awaiting the same run.
    #[error(transparent)]
    Sync(Arc<LayoutError>),
}

impl LayoutError {
    /// Strips the [`LayoutError::Sync`] wrapper(s), if any.
    pub fn root(&self) -> &LayoutError {
        match self {
            LayoutError::Sync(inner) => inner.root(),
            other => other,
        }
    }
}

impl From<confique::Error> for LayoutError {
    fn from(err: confique::Error) -> Self {
        LayoutError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LayoutError>;
