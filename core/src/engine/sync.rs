use std::collections::BTreeSet;

use tracing::{debug, instrument};

use super::{Engine, SyncReport};
use crate::error::{Error, Result};
use crate::index::Index;
use crate::model::TreeId;
use crate::notice::RemovalReason;
use crate::store::DocumentStore;

impl<S: DocumentStore, I: Index> Engine<S, I> {
    /// Brings the index in line with the provider.
    ///
    /// Re-walks every linked tree, drops orphaned rows, then re-reads every indexed
    /// document. Only name and content are refreshed; user metadata is never touched.
    /// Running it twice without external changes leaves the index as it was.
    #[instrument(skip(self))]
    pub async fn sync_all(&self) -> Result<SyncReport> {
        self.index.begin_batch().await;
        let result = self.reconcile().await;
        self.end_batch(result).await
    }

    async fn reconcile(&self) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        for tree in self.index.trees().await? {
            match self.extract_tree(&tree).await {
                Ok(walk) => report.skipped += walk.skipped,
                Err(e) if e.is_not_found() => {
                    self.warn(&tree.uri, "Linked directory is gone, unlinking it");
                    self.unlink_tree(tree.id).await?;
                    report.trees_removed += 1;
                }
                Err(Error::Store(e)) => {
                    self.warn(&tree.uri, format!("Could not walk linked directory: {e}"));
                    report.skipped += 1;
                }
                Err(e) => return Err(e),
            }
        }

        report.orphans_removed = self.remove_orphans().await?;

        for mut document in self.index.documents().await? {
            match self.store.read(&document.uri).await {
                Ok(fresh) => {
                    if document.refresh(&fresh) {
                        self.index.update_document(document).await?;
                        report.refreshed += 1;
                    } else {
                        report.unchanged += 1;
                    }
                }
                Err(e) if e.is_not_found() => {
                    self.index.delete_document(&document.uri).await?;
                    if document.origin.is_independent() {
                        self.release_grant(&document.uri).await;
                    }
                    self.removed(&document.uri, RemovalReason::Vanished);
                    report.removed += 1;
                }
                Err(e) => {
                    self.warn(&document.uri, format!("Could not refresh document: {e}"));
                    report.failed += 1;
                }
            }
        }

        debug!(?report, "Sync finished");
        Ok(report)
    }

    /// Deletes every tree-scoped row whose tree no longer exists.
    #[instrument(skip(self))]
    pub async fn remove_orphans(&self) -> Result<usize> {
        let trees: BTreeSet<TreeId> = self
            .index
            .trees()
            .await?
            .into_iter()
            .map(|t| t.id)
            .collect();
        let mut removed = 0;
        for document in self.index.documents().await? {
            let orphaned = document.tree().is_some_and(|tree| !trees.contains(&tree));
            if orphaned {
                self.index.delete_document(&document.uri).await?;
                self.removed(&document.uri, RemovalReason::Orphaned);
                removed += 1;
            }
        }
        if removed > 0 {
            debug!(removed, "Removed orphaned documents");
        }
        Ok(removed)
    }
}
