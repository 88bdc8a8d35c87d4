//! The local index: a keyed store of [`Document`], [`Tree`] and [`Label`] records.
//!
//! [`Index`] is the capability the engine consumes. Implementations enforce the
//! structural rules of the data model on every write, so a bug in a caller surfaces as
//! an [`IndexError`] instead of a corrupted index:
//!
//! *   document URIs are unique;
//! *   a tree-scoped document must reference an existing tree;
//! *   a document's label must exist;
//! *   deleting a tree deletes its documents, deleting a label clears references to it.
//!
//! [`MemoryIndex`] keeps everything in memory; [`FileIndex`] additionally writes a JSON
//! snapshot after every mutation, or once per batch (see [`Index::begin_batch`]).

pub use self::file::FileIndex;
pub use self::memory::MemoryIndex;
pub use self::query::{ArchivedFilter, DocumentQuery, SortKey, SortOrder};
pub use self::state::IndexState;

mod file;
mod memory;
mod query;
mod state;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Document, Label, LabelId, Tree, TreeId};
use crate::uri::{PathKey, Uri};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("A document with URI {0} is already indexed")]
    DuplicateUri(Uri),

    #[error("A tree with URI {0} is already indexed")]
    DuplicateTree(Uri),

    #[error("Document {uri} references missing tree {tree}")]
    MissingTree { uri: Uri, tree: TreeId },

    #[error("Document {uri} references missing label {label}")]
    MissingLabel { uri: Uri, label: LabelId },

    #[error("No indexed document with URI {0}")]
    NotFound(Uri),

    #[error("No label with id {0}")]
    LabelNotFound(LabelId),

    #[error("A label named '{0}' already exists")]
    DuplicateLabel(String),

    #[error("Index file {path} is malformed")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Index IO error")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IndexError>;

#[async_trait]
pub trait Index: Send + Sync {
    async fn document(&self, uri: &Uri) -> Result<Option<Document>>;

    async fn contains_document(&self, uri: &Uri) -> Result<bool> {
        Ok(self.document(uri).await?.is_some())
    }

    /// All documents, ordered by URI.
    async fn documents(&self) -> Result<Vec<Document>>;

    async fn documents_in_tree(&self, tree: TreeId) -> Result<Vec<Document>>;

    /// Documents reachable through another URI for the same file, i.e. whose
    /// [`PathKey`] matches `key`. Never returns anything for an empty key.
    async fn documents_by_path_key(&self, key: &PathKey) -> Result<Vec<Document>>;

    /// Inserts a new document. Fails with [`IndexError::DuplicateUri`] if the URI is taken.
    async fn insert_document(&self, document: Document) -> Result<()>;

    /// Replaces an existing document. Fails with [`IndexError::NotFound`] if absent.
    async fn update_document(&self, document: Document) -> Result<()>;

    /// Inserts the document if its URI is absent, replaces it otherwise.
    async fn upsert_document(&self, document: Document) -> Result<()> {
        if self.contains_document(&document.uri).await? {
            self.update_document(document).await
        } else {
            self.insert_document(document).await
        }
    }

    async fn delete_document(&self, uri: &Uri) -> Result<Option<Document>>;

    /// Deletes every document belonging to `tree`, returning them.
    async fn delete_documents_in_tree(&self, tree: TreeId) -> Result<Vec<Document>>;

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>>;

    async fn tree(&self, id: TreeId) -> Result<Option<Tree>>;

    async fn trees(&self) -> Result<Vec<Tree>>;

    async fn insert_tree(&self, tree: Tree) -> Result<()>;

    /// Deletes a tree together with its documents.
    async fn delete_tree(&self, id: TreeId) -> Result<Option<Tree>>;

    async fn label(&self, id: LabelId) -> Result<Option<Label>>;

    async fn labels(&self) -> Result<Vec<Label>>;

    async fn insert_label(&self, label: Label) -> Result<()>;

    async fn update_label(&self, label: Label) -> Result<()>;

    /// Deletes a label and clears it from every document carrying it.
    async fn delete_label(&self, id: LabelId) -> Result<Option<Label>>;

    /// Starts a batch of mutations. A persistent index may defer writing until the
    /// matching [`end_batch`](Self::end_batch). Batches nest.
    async fn begin_batch(&self) {}

    /// Ends a batch started with [`begin_batch`](Self::begin_batch), persisting pending
    /// changes once the outermost batch ends.
    async fn end_batch(&self) -> Result<()> {
        Ok(())
    }
}
