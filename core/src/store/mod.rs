//! The external document provider, seen through the capabilities the engine needs.
//!
//! A [`DocumentStore`] owns file bytes and directory structure. Every call addresses a
//! document or directory by an opaque [`Uri`] handed out by the provider itself; the
//! engine never constructs provider URIs on its own.
//!
//! Two implementations ship with the crate:
//!
//! *   [`FsStore`]: the local filesystem through `tokio::fs`, addressed with `file://` URIs.
//! *   [`MemoryStore`]: an in-process provider that hands out `content://` URIs in the
//!     layout used by document-provider frameworks (a file picked on its own and the same
//!     file discovered below a picked directory get different URIs). It supports fault
//!     injection and backs most of the engine tests.

pub use self::fs::FsStore;
pub use self::memory::MemoryStore;

mod fs;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::uri::Uri;

/// Name and text body of a document as read from the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentContent {
    pub name: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One child of a directory, as returned by [`DocumentStore::list_children`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub uri: Uri,
    pub name: String,
    pub kind: EntryKind,
}

impl Entry {
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_hidden(&self) -> bool {
        self.name.starts_with('.')
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The document vanished or was moved.
    #[error("Document not found: {0}")]
    NotFound(Uri),

    /// The access grant is missing or was revoked.
    #[error("Permission denied: {0}")]
    PermissionDenied(Uri),

    /// The provider lacks the capability.
    #[error("Operation '{operation}' is not supported for {uri}")]
    Unsupported { operation: &'static str, uri: Uri },

    #[error("Cannot name {uri} '{name}': a document with that name already exists")]
    AlreadyExists { uri: Uri, name: String },

    #[error("Provider produced an invalid URI: {0}")]
    InvalidUri(String),

    #[error("IO error on {uri}")]
    Io {
        uri: Uri,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoreError::PermissionDenied(_))
    }

    /// Classifies an I/O error raised while accessing `uri`.
    pub(crate) fn from_io(uri: &Uri, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(uri.clone()),
            std::io::ErrorKind::PermissionDenied => StoreError::PermissionDenied(uri.clone()),
            std::io::ErrorKind::AlreadyExists => StoreError::AlreadyExists {
                uri: uri.clone(),
                name: String::new(),
            },
            _ => StoreError::Io {
                uri: uri.clone(),
                source,
            },
        }
    }
}

/// Capability interface of a permission-gated document provider.
///
/// All methods may block on I/O. Implementations are responsible for their own
/// timeouts; the engine imposes none.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads the display name and text content of a document.
    async fn read(&self, uri: &Uri) -> Result<DocumentContent, StoreError>;

    /// Replaces the content of an existing document.
    async fn write(&self, uri: &Uri, content: &str) -> Result<(), StoreError>;

    /// Renames a document in place and returns its URI afterwards.
    ///
    /// Providers that implement renaming by re-creating the document return a URI
    /// different from the one passed in.
    async fn rename(&self, uri: &Uri, new_name: &str) -> Result<Uri, StoreError>;

    async fn delete(&self, uri: &Uri) -> Result<(), StoreError>;

    /// Lists the direct children of a directory. Not recursive.
    async fn list_children(&self, directory: &Uri) -> Result<Vec<Entry>, StoreError>;

    /// Asks the provider to keep the read-write grant for `uri` across sessions.
    async fn persist_permission(&self, uri: &Uri) -> Result<(), StoreError>;

    /// Gives up a grant previously persisted with [`persist_permission`](Self::persist_permission).
    async fn release_permission(&self, uri: &Uri) -> Result<(), StoreError>;
}
