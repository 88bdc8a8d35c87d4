use chrono::Utc;
use tracing::{debug, instrument};

use super::Engine;
use crate::error::{Error, Result};
use crate::index::{DocumentQuery, Index};
use crate::model::{Document, Label, LabelId, Tree, TreeId};
use crate::store::DocumentStore;
use crate::uri::Uri;

impl<S: DocumentStore, I: Index> Engine<S, I> {
    pub async fn document(&self, uri: &Uri) -> Result<Option<Document>> {
        Ok(self.index.document(uri).await?)
    }

    pub async fn documents(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        Ok(self.index.query(query).await?)
    }

    /// Case-insensitive search over names and content, with the default listing order.
    pub async fn search(&self, text: &str) -> Result<Vec<Document>> {
        let query = DocumentQuery::default().containing(text);
        self.documents(&query).await
    }

    pub async fn trees(&self) -> Result<Vec<Tree>> {
        Ok(self.index.trees().await?)
    }

    pub async fn tree_documents(&self, id: TreeId) -> Result<Vec<Document>> {
        if self.index.tree(id).await?.is_none() {
            return Err(Error::TreeNotFound(id));
        }
        Ok(self.index.documents_in_tree(id).await?)
    }

    pub async fn set_pinned(&self, uri: &Uri, pinned: bool) -> Result<Document> {
        self.edit(uri, |d| d.pinned = pinned).await
    }

    pub async fn set_archived(&self, uri: &Uri, archived: bool) -> Result<Document> {
        self.edit(uri, |d| d.archived = archived).await
    }

    pub async fn set_color(&self, uri: &Uri, color: u8) -> Result<Document> {
        self.edit(uri, |d| d.color = color).await
    }

    pub async fn set_label(&self, uri: &Uri, label: Option<LabelId>) -> Result<Document> {
        if let Some(id) = label {
            if self.index.label(id).await?.is_none() {
                return Err(Error::LabelNotFound(id));
            }
        }
        self.edit(uri, |d| d.label = label).await
    }

    pub async fn mark_opened(&self, uri: &Uri) -> Result<Document> {
        let now = Utc::now();
        self.edit(uri, |d| d.last_opened_at = Some(now)).await
    }

    pub async fn labels(&self) -> Result<Vec<Label>> {
        Ok(self.index.labels().await?)
    }

    #[instrument(skip(self))]
    pub async fn create_label(&self, name: &str) -> Result<Label> {
        let label = Label::new(label_name(name)?);
        self.index.insert_label(label.clone()).await?;
        debug!(id = %label.id, "Created label");
        Ok(label)
    }

    #[instrument(skip(self))]
    pub async fn rename_label(&self, id: LabelId, name: &str) -> Result<Label> {
        let mut label = self
            .index
            .label(id)
            .await?
            .ok_or(Error::LabelNotFound(id))?;
        label.name = label_name(name)?;
        self.index.update_label(label.clone()).await?;
        Ok(label)
    }

    /// Deletes a label. Documents carrying it keep existing without a label.
    #[instrument(skip(self))]
    pub async fn delete_label(&self, id: LabelId) -> Result<Label> {
        self.index
            .delete_label(id)
            .await?
            .ok_or(Error::LabelNotFound(id))
    }

    async fn edit(&self, uri: &Uri, change: impl FnOnce(&mut Document) + Send) -> Result<Document> {
        let mut document = self
            .index
            .document(uri)
            .await?
            .ok_or_else(|| Error::NotLinked(uri.clone()))?;
        change(&mut document);
        self.index.update_document(document.clone()).await?;
        Ok(document)
    }
}

fn label_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidLabel(name.to_string()));
    }
    Ok(trimmed.to_string())
}
