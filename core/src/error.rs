use std::path::PathBuf;

use thiserror::Error;

use crate::index::IndexError;
use crate::model::{LabelId, TreeId};
use crate::store::StoreError;
use crate::uri::Uri;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Document store error")]
    Store(#[from] StoreError),

    #[error("Index error")]
    Index(#[from] IndexError),

    /// Informational: the URI (or a tree covering it) is already in the index.
    #[error("Already linked: {0}")]
    AlreadyLinked(Uri),

    #[error("Not linked: {0}")]
    NotLinked(Uri),

    #[error("No linked tree with id {0}")]
    TreeNotFound(TreeId),

    #[error("No label with id {0}")]
    LabelNotFound(LabelId),

    #[error("Invalid label name: {0:?}")]
    InvalidLabel(String),

    #[error("Invalid URI '{input}': {reason}")]
    InvalidUri { input: String, reason: String },

    #[error("Configuration file is missing or invalid: {0}")]
    InvalidConfig(PathBuf),

    #[error("Data directory is already initialized: {0}")]
    AlreadyInitialized(PathBuf),

    #[error("Serialization error")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for store failures caused by a vanished document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Store(e) if e.is_not_found())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
