use tracing::{debug, instrument};

use super::{Engine, TreeRemoval, UnlinkOutcome};
use crate::error::{Error, Result};
use crate::index::Index;
use crate::model::{Origin, TreeId};
use crate::notice::RemovalReason;
use crate::store::DocumentStore;
use crate::uri::Uri;

impl<S: DocumentStore, I: Index> Engine<S, I> {
    /// Removes a document from the index without touching the file.
    ///
    /// A tree-scoped document cannot leave its tree on its own; unlinking it unlinks
    /// the whole tree.
    #[instrument(skip(self), fields(uri = %uri))]
    pub async fn unlink_document(&self, uri: &Uri) -> Result<UnlinkOutcome> {
        self.unlink_as(uri, RemovalReason::Unlinked).await
    }

    /// Deletes the backing file, then unlinks it like
    /// [`unlink_document`](Self::unlink_document).
    ///
    /// A file that is already gone is not an error. Any other provider failure leaves
    /// the index untouched.
    #[instrument(skip(self), fields(uri = %uri))]
    pub async fn delete_document(&self, uri: &Uri) -> Result<UnlinkOutcome> {
        if self.index.document(uri).await?.is_none() {
            return Err(Error::NotLinked(uri.clone()));
        }
        match self.store.delete(uri).await {
            Ok(()) => debug!("Deleted file"),
            Err(e) if e.is_not_found() => debug!("File was already gone"),
            Err(e) => return Err(e.into()),
        }
        self.unlink_as(uri, RemovalReason::Deleted).await
    }

    async fn unlink_as(&self, uri: &Uri, reason: RemovalReason) -> Result<UnlinkOutcome> {
        let document = self
            .index
            .document(uri)
            .await?
            .ok_or_else(|| Error::NotLinked(uri.clone()))?;
        match document.origin {
            Origin::Independent => {
                self.index.delete_document(uri).await?;
                self.release_grant(uri).await;
                self.removed(uri, reason);
                Ok(UnlinkOutcome::Document(document))
            }
            Origin::Tree(tree) => match self.unlink_tree(tree).await {
                Ok(removal) => Ok(UnlinkOutcome::Tree(removal)),
                Err(Error::TreeNotFound(_)) => {
                    self.index.delete_document(uri).await?;
                    self.removed(uri, RemovalReason::Orphaned);
                    Ok(UnlinkOutcome::Document(document))
                }
                Err(e) => Err(e),
            },
        }
    }

    /// Removes a tree and every document extracted from it, and releases its grant.
    #[instrument(skip(self))]
    pub async fn unlink_tree(&self, id: TreeId) -> Result<TreeRemoval> {
        let tree = self.index.tree(id).await?.ok_or(Error::TreeNotFound(id))?;
        let documents = self.index.delete_documents_in_tree(id).await?;
        self.index.delete_tree(id).await?;
        self.release_grant(&tree.uri).await;
        for document in &documents {
            self.removed(&document.uri, RemovalReason::TreeUnlinked(id));
        }
        debug!(tree = %tree.uri, documents = documents.len(), "Unlinked tree");
        Ok(TreeRemoval { tree, documents })
    }
}
