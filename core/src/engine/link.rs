use tracing::{debug, instrument};

use super::{AddOutcome, Engine, Extraction, LinkOutcome, TreeImport};
use crate::error::{Error, Result};
use crate::index::Index;
use crate::model::{Document, Origin, Tree, TreeId};
use crate::notice::{Notice, RemovalReason};
use crate::store::DocumentStore;
use crate::uri::Uri;

impl<S: DocumentStore, I: Index> Engine<S, I> {
    /// Links a single document.
    ///
    /// If the file is already indexed, on its own or through a linked tree, nothing is
    /// read and the existing row is returned as [`LinkOutcome::AlreadyLinked`].
    #[instrument(skip(self), fields(uri = %uri))]
    pub async fn link_document(&self, uri: &Uri) -> Result<LinkOutcome> {
        self.persist_grant(uri).await;

        if let Some(existing) = self.find_linked(uri).await? {
            debug!(existing = %existing.uri, "Document already linked");
            // Only the existing independent row at this very URI relies on the grant.
            if !(existing.origin.is_independent() && existing.uri == *uri) {
                self.release_grant(uri).await;
            }
            self.on.notice.dispatch(&Notice::AlreadyLinked(uri.clone()));
            return Ok(LinkOutcome::AlreadyLinked(existing));
        }

        let content = match self.store.read(uri).await {
            Ok(content) => content,
            Err(e) => {
                self.release_grant(uri).await;
                return Err(e.into());
            }
        };
        let document = Document::from_content(uri.clone(), content, Origin::Independent);
        self.index.insert_document(document.clone()).await?;
        debug!("Linked document '{}'", document.display_name);
        Ok(LinkOutcome::Linked(document))
    }

    /// Links a directory and extracts every document below it.
    ///
    /// Refused with [`Error::AlreadyLinked`] if a linked tree already covers `uri`.
    /// Linked trees that `uri` covers are superseded: their rows are taken over by the
    /// new tree, keeping user metadata, and rows the new walk does not reach are dropped.
    #[instrument(skip(self), fields(uri = %uri))]
    pub async fn link_tree(&self, uri: &Uri) -> Result<TreeImport> {
        self.index.begin_batch().await;
        let result = self.import_tree(uri).await;
        self.end_batch(result).await
    }

    async fn import_tree(&self, uri: &Uri) -> Result<TreeImport> {
        let key = uri.path_key();
        let trees = self.index.trees().await?;
        if let Some(existing) = trees.iter().find(|t| t.path_key().contains(&key)) {
            debug!(existing = %existing.uri, "Directory already covered by a linked tree");
            self.on.notice.dispatch(&Notice::AlreadyLinked(uri.clone()));
            return Err(Error::AlreadyLinked(existing.uri.clone()));
        }

        // Fail before touching the index if the directory is unreachable.
        self.store.list_children(uri).await?;

        let nested: Vec<Tree> = trees
            .into_iter()
            .filter(|t| key.contains(&t.path_key()))
            .collect();
        let mut demoted = Vec::new();
        for old in &nested {
            demoted.extend(self.demote_tree(old).await?);
        }

        self.persist_grant(uri).await;
        let tree = Tree::new(uri.clone());
        self.index.insert_tree(tree.clone()).await?;
        let walk = self.extract_tree(&tree).await?;

        for (document, old_tree) in demoted {
            let still_independent = self
                .index
                .document(&document)
                .await?
                .is_some_and(|d| d.origin.is_independent());
            if still_independent {
                self.index.delete_document(&document).await?;
                self.removed(&document, RemovalReason::TreeUnlinked(old_tree));
            }
        }

        let documents = self.index.documents_in_tree(tree.id).await?;
        debug!(
            documents = documents.len(),
            skipped = walk.skipped,
            superseded = nested.len(),
            "Linked tree"
        );
        Ok(TreeImport {
            tree,
            documents,
            skipped: walk.skipped,
            superseded: nested.iter().map(|t| t.id).collect(),
        })
    }

    /// Walks `tree` depth-first and adds every readable document through
    /// [`add_if_absent`](Self::add_if_absent).
    ///
    /// Only a failure to list the root is an error. Everything below it that cannot be
    /// listed or read is counted as skipped.
    #[instrument(skip(self, tree), fields(tree = %tree.uri))]
    pub async fn extract_tree(&self, tree: &Tree) -> Result<Extraction> {
        self.index.begin_batch().await;
        let result = self.walk_tree(tree).await;
        self.end_batch(result).await
    }

    async fn walk_tree(&self, tree: &Tree) -> Result<Extraction> {
        let mut summary = Extraction::default();
        let mut pending = vec![(tree.uri.clone(), 0usize)];

        while let Some((directory, depth)) = pending.pop() {
            let entries = match self.store.list_children(&directory).await {
                Ok(entries) => entries,
                Err(e) if directory == tree.uri => return Err(e.into()),
                Err(e) => {
                    self.warn(
                        &directory,
                        format!("Skipping directory that cannot be listed: {e}"),
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            let mut subdirectories = Vec::new();
            for entry in entries {
                if self.options.skip_hidden && entry.is_hidden() {
                    debug!(name = %entry.name, "Skipping hidden entry");
                    continue;
                }
                if entry.is_dir() {
                    if self.options.max_depth.is_some_and(|max| depth >= max) {
                        debug!(name = %entry.name, "Maximum depth reached");
                    } else {
                        subdirectories.push((entry.uri, depth + 1));
                    }
                    continue;
                }

                summary.found += 1;
                match self.store.read(&entry.uri).await {
                    Ok(content) => {
                        let origin = Origin::Tree(tree.id);
                        let candidate = Document::from_content(entry.uri, content, origin);
                        if self.add_if_absent(candidate).await? != AddOutcome::Present {
                            summary.added += 1;
                        }
                    }
                    Err(e) => {
                        self.warn(&entry.uri, format!("Skipping unreadable document: {e}"));
                        summary.skipped += 1;
                    }
                }
            }
            // Reversed so the stack yields them in listing order.
            pending.extend(subdirectories.into_iter().rev());
        }

        debug!(
            found = summary.found,
            added = summary.added,
            skipped = summary.skipped,
            "Extraction finished"
        );
        Ok(summary)
    }

    /// Inserts `candidate` unless its file is already indexed.
    ///
    /// An independent row for the same file under another URI is replaced by the
    /// candidate, which inherits its user metadata. An independent row under the same
    /// URI is moved into the candidate's tree.
    #[instrument(skip(self, candidate), fields(uri = %candidate.uri))]
    pub async fn add_if_absent(&self, candidate: Document) -> Result<AddOutcome> {
        if let Some(mut existing) = self.index.document(&candidate.uri).await? {
            if existing.origin.is_independent() && !candidate.origin.is_independent() {
                existing.origin = candidate.origin;
                existing.display_name = candidate.display_name;
                existing.content = candidate.content;
                self.index.update_document(existing).await?;
                self.release_grant(&candidate.uri).await;
                debug!("Adopted independent document into tree");
                return Ok(AddOutcome::Adopted);
            }
            return Ok(AddOutcome::Present);
        }

        let twin = self
            .index
            .documents_by_path_key(&candidate.path_key())
            .await?
            .into_iter()
            .find(|d| d.origin.is_independent());

        match twin {
            Some(old) => {
                let mut document = candidate;
                document.copy_user_metadata_from(&old);
                self.index.delete_document(&old.uri).await?;
                self.index.insert_document(document).await?;
                self.release_grant(&old.uri).await;
                self.removed(&old.uri, RemovalReason::Migrated);
                debug!(from = %old.uri, "Migrated independent document");
                Ok(AddOutcome::Migrated { from: old.uri })
            }
            None => {
                self.index.insert_document(candidate).await?;
                Ok(AddOutcome::Inserted)
            }
        }
    }

    /// Exact URI first, then the same file reached through another URI.
    async fn find_linked(&self, uri: &Uri) -> Result<Option<Document>> {
        if let Some(document) = self.index.document(uri).await? {
            return Ok(Some(document));
        }
        let aliases = self.index.documents_by_path_key(&uri.path_key()).await?;
        Ok(aliases.into_iter().next())
    }

    /// Turns the rows of a superseded tree into independent rows and removes the tree.
    /// Returns the demoted URIs together with the tree they came from.
    async fn demote_tree(&self, tree: &Tree) -> Result<Vec<(Uri, TreeId)>> {
        debug!(tree = %tree.uri, "Superseding nested tree");
        let documents = self.index.documents_in_tree(tree.id).await?;
        let mut demoted = Vec::with_capacity(documents.len());
        for mut document in documents {
            document.origin = Origin::Independent;
            demoted.push((document.uri.clone(), tree.id));
            self.index.update_document(document).await?;
        }
        self.index.delete_tree(tree.id).await?;
        self.release_grant(&tree.uri).await;
        Ok(demoted)
    }
}
