//! The reconciliation engine.
//!
//! [`Engine`] coordinates a [`DocumentStore`] (the external provider owning file bytes)
//! and an [`Index`] (the local cache owning everything else). It holds no state of its
//! own beyond the two collaborators and its walk options.
//!
//! # Invariants maintained
//!
//! *   **Dedup:** at most one document row per external file. Rows are keyed by URI, and
//!     the same file reached through two URIs (picked on its own and discovered below a
//!     linked directory) is detected through [`PathKey`](crate::uri::PathKey) and
//!     collapsed into one tree-scoped row that keeps the user's metadata.
//! *   **No orphans:** every tree-scoped row references an existing tree.
//! *   **No overlapping trees:** linking a directory inside a linked tree is refused;
//!     linking an ancestor of linked trees supersedes them.
//!
//! # Failure handling
//!
//! Bulk operations ([`link_tree`](Engine::link_tree), [`sync_all`](Engine::sync_all))
//! count per-item failures instead of aborting. Best-effort steps that fail (persisting
//! a grant, renaming before a save) emit a [`Notice`] on [`Engine::on`] and are logged.
//!
//! The engine takes no locks across multi-step sequences. Callers serialize
//! conflicting operations; an interrupted operation is converged by the next sync.

mod edit;
mod link;
mod save;
mod sync;
mod unlink;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::index::Index;
use crate::model::{Document, Tree, TreeId};
use crate::notice::{DocumentRemoved, Notice, RemovalReason, define_listeners};
use crate::store::DocumentStore;
use crate::uri::Uri;

define_listeners! {
    /// Listener lists for everything an [`Engine`] reports outside its return values.
    EngineEvents {
        notice: Notice,
        document_removed: DocumentRemoved,
    }
}

/// How directory trees are walked during extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkOptions {
    /// Skip files and directories whose name starts with `.`.
    pub skip_hidden: bool,
    /// Directory levels below the tree root to descend into. `Some(0)` reads only the
    /// root's own files.
    pub max_depth: Option<usize>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        WalkOptions {
            skip_hidden: true,
            max_depth: None,
        }
    }
}

#[derive(Debug)]
pub struct Engine<S, I> {
    store: S,
    index: I,
    options: WalkOptions,
    pub on: EngineEvents,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked(Document),
    /// The document, or a tree-scoped row for the same file, was already indexed.
    AlreadyLinked(Document),
}

impl LinkOutcome {
    pub fn document(&self) -> &Document {
        match self {
            LinkOutcome::Linked(d) | LinkOutcome::AlreadyLinked(d) => d,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted,
    /// An independent row for the same file was replaced; its metadata was carried over.
    Migrated { from: Uri },
    /// The independent row at the same URI was moved into the candidate's tree.
    Adopted,
    /// A row with this URI already exists.
    Present,
}

/// Counts from one extraction walk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Files encountered, including unreadable ones.
    pub found: usize,
    /// Files that resulted in an inserted, migrated or adopted row.
    pub added: usize,
    /// Unreadable files and directories that could not be listed.
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeImport {
    pub tree: Tree,
    /// Every document the tree covers after the import.
    pub documents: Vec<Document>,
    pub skipped: usize,
    /// Trees removed because the new tree contains them.
    pub superseded: Vec<TreeId>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub refreshed: usize,
    pub unchanged: usize,
    /// Rows dropped because the backing file is gone.
    pub removed: usize,
    /// Rows kept because the file could not be read for another reason.
    pub failed: usize,
    /// Entries skipped while re-walking trees.
    pub skipped: usize,
    pub orphans_removed: usize,
    /// Trees unlinked because their root directory is gone.
    pub trees_removed: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub document: Document,
    /// Set when the provider moved the document to a new URI.
    pub renamed_from: Option<Uri>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRemoval {
    pub tree: Tree,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnlinkOutcome {
    Document(Document),
    /// The document was tree-scoped, so its whole tree went with it.
    Tree(TreeRemoval),
}

impl<S: DocumentStore, I: Index> Engine<S, I> {
    pub fn new(store: S, index: I) -> Self {
        Engine {
            store,
            index,
            options: WalkOptions::default(),
            on: EngineEvents::new(),
        }
    }

    pub fn with_options(mut self, options: WalkOptions) -> Self {
        self.options = options;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    pub fn options(&self) -> WalkOptions {
        self.options
    }

    fn warn(&self, uri: &Uri, message: impl Into<String>) {
        let message = message.into();
        warn!(%uri, "{}", message);
        let notice = Notice::Warning {
            uri: uri.clone(),
            message,
        };
        self.on.notice.dispatch(&notice);
    }

    fn removed(&self, uri: &Uri, reason: RemovalReason) {
        debug!(%uri, ?reason, "Removed document row");
        let event = DocumentRemoved {
            uri: uri.clone(),
            reason,
        };
        self.on.document_removed.dispatch(&event);
    }

    /// Closes an index batch opened by the caller. A failed flush is reported unless
    /// the batched work failed first.
    async fn end_batch<T>(&self, result: Result<T>) -> Result<T> {
        let flushed = self.index.end_batch().await;
        let value = result?;
        flushed?;
        Ok(value)
    }

    async fn persist_grant(&self, uri: &Uri) {
        if let Err(e) = self.store.persist_permission(uri).await {
            self.warn(uri, format!("Could not persist access permission: {e}"));
        }
    }

    async fn release_grant(&self, uri: &Uri) {
        if let Err(e) = self.store.release_permission(uri).await {
            self.warn(uri, format!("Could not release access permission: {e}"));
        }
    }
}
