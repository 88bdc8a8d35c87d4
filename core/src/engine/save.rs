use tracing::{debug, instrument};

use super::{Engine, SaveOutcome};
use crate::error::Result;
use crate::index::Index;
use crate::model::Document;
use crate::notice::RemovalReason;
use crate::store::DocumentStore;
use crate::uri::Uri;

impl<S: DocumentStore, I: Index> Engine<S, I> {
    /// Writes an edited document back to the provider and records it in the index.
    ///
    /// With `renamed`, the provider is asked to rename the file to
    /// `edited.display_name` first. A provider may answer with a new URI, in which case
    /// the row moves to that URI. A failed rename never loses the edit: the content is
    /// written under the old URI and name, and the failure is reported in
    /// [`SaveOutcome::warnings`].
    #[instrument(skip(self, edited), fields(uri = %edited.uri, renamed))]
    pub async fn save_document(&self, edited: &Document, renamed: bool) -> Result<SaveOutcome> {
        let original = edited.uri.clone();
        let mut document = edited.clone();
        let mut warnings = Vec::new();

        if renamed {
            match self.store.rename(&original, &edited.display_name).await {
                Ok(uri) => document.uri = uri,
                Err(e) => {
                    let message = format!(
                        "Could not rename to '{}', kept the old name: {e}",
                        edited.display_name
                    );
                    self.warn(&original, message.clone());
                    warnings.push(message);
                    document.display_name = self
                        .current_name(&original, &edited.display_name)
                        .await?;
                }
            }
        }

        if let Err(e) = self.store.write(&document.uri, &document.content).await {
            if document.uri != original {
                // The file already lives at the new URI; keep the row pointing at it.
                self.relocate(&original, &document.uri, &document.display_name)
                    .await?;
            }
            return Err(e.into());
        }

        let renamed_from = if document.uri != original {
            self.index.delete_document(&original).await?;
            if document.origin.is_independent() {
                self.move_grant(&original, &document.uri).await;
            }
            self.removed(&original, RemovalReason::Renamed);
            debug!(new_uri = %document.uri, "Provider moved the document");
            Some(original)
        } else {
            None
        };

        self.index.upsert_document(document.clone()).await?;
        Ok(SaveOutcome {
            document,
            renamed_from,
            warnings,
        })
    }

    /// Name of the document as last known, falling back to asking the provider.
    async fn current_name(&self, uri: &Uri, fallback: &str) -> Result<String> {
        if let Some(indexed) = self.index.document(uri).await? {
            return Ok(indexed.display_name);
        }
        Ok(match self.store.read(uri).await {
            Ok(content) => content.name,
            Err(_) => fallback.to_string(),
        })
    }

    async fn relocate(&self, from: &Uri, to: &Uri, name: &str) -> Result<()> {
        if let Some(mut row) = self.index.delete_document(from).await? {
            let independent = row.origin.is_independent();
            row.uri = to.clone();
            row.display_name = name.to_string();
            self.index.upsert_document(row).await?;
            if independent {
                self.move_grant(from, to).await;
            }
            self.removed(from, RemovalReason::Renamed);
        }
        Ok(())
    }

    /// Hands an independent document's grant over to the URI it was renamed to.
    async fn move_grant(&self, from: &Uri, to: &Uri) {
        self.persist_grant(to).await;
        self.release_grant(from).await;
    }
}
