use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DocumentQuery, Index, IndexState, Result};
use crate::model::{Document, Label, LabelId, Tree, TreeId};
use crate::uri::{PathKey, Uri};

/// Volatile index. Everything is lost when the value is dropped.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    state: RwLock<IndexState>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        MemoryIndex::default()
    }

    /// Copy of the current content, for comparisons in tests and diagnostics.
    pub async fn snapshot(&self) -> IndexState {
        self.state.read().await.clone()
    }
}

impl From<IndexState> for MemoryIndex {
    fn from(state: IndexState) -> Self {
        MemoryIndex {
            state: RwLock::new(state),
        }
    }
}

#[async_trait]
impl Index for MemoryIndex {
    async fn document(&self, uri: &Uri) -> Result<Option<Document>> {
        Ok(self.state.read().await.document(uri).cloned())
    }

    async fn documents(&self) -> Result<Vec<Document>> {
        Ok(self.state.read().await.documents().cloned().collect())
    }

    async fn documents_in_tree(&self, tree: TreeId) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state.documents_in_tree(tree).cloned().collect())
    }

    async fn documents_by_path_key(&self, key: &PathKey) -> Result<Vec<Document>> {
        let state = self.state.read().await;
        Ok(state.documents_by_path_key(key).cloned().collect())
    }

    async fn insert_document(&self, document: Document) -> Result<()> {
        self.state.write().await.insert_document(document)
    }

    async fn update_document(&self, document: Document) -> Result<()> {
        self.state.write().await.update_document(document)
    }

    async fn delete_document(&self, uri: &Uri) -> Result<Option<Document>> {
        Ok(self.state.write().await.delete_document(uri))
    }

    async fn delete_documents_in_tree(&self, tree: TreeId) -> Result<Vec<Document>> {
        Ok(self.state.write().await.delete_documents_in_tree(tree))
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        Ok(self.state.read().await.query(query))
    }

    async fn tree(&self, id: TreeId) -> Result<Option<Tree>> {
        Ok(self.state.read().await.tree(id).cloned())
    }

    async fn trees(&self) -> Result<Vec<Tree>> {
        let state = self.state.read().await;
        Ok(state.trees().into_iter().cloned().collect())
    }

    async fn insert_tree(&self, tree: Tree) -> Result<()> {
        self.state.write().await.insert_tree(tree)
    }

    async fn delete_tree(&self, id: TreeId) -> Result<Option<Tree>> {
        Ok(self.state.write().await.delete_tree(id))
    }

    async fn label(&self, id: LabelId) -> Result<Option<Label>> {
        Ok(self.state.read().await.label(id).cloned())
    }

    async fn labels(&self) -> Result<Vec<Label>> {
        let state = self.state.read().await;
        Ok(state.labels().into_iter().cloned().collect())
    }

    async fn insert_label(&self, label: Label) -> Result<()> {
        self.state.write().await.insert_label(label)
    }

    async fn update_label(&self, label: Label) -> Result<()> {
        self.state.write().await.update_label(label)
    }

    async fn delete_label(&self, id: LabelId) -> Result<Option<Label>> {
        Ok(self.state.write().await.delete_label(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexError;
    use crate::model::Origin;

    fn doc(s: &str) -> Document {
        Document::new(
            Uri::parse(s).unwrap(),
            "a.md".into(),
            "body".into(),
            Origin::Independent,
        )
    }

    #[tokio::test]
    async fn upsert_inserts_then_updates() {
        let index = MemoryIndex::new();
        let mut d = doc("file:///a.md");
        index.upsert_document(d.clone()).await.unwrap();

        d.content = "changed".into();
        index.upsert_document(d.clone()).await.unwrap();

        let stored = index.document(&d.uri).await.unwrap().unwrap();
        assert_eq!(stored.content, "changed");
        assert_eq!(index.documents().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let index = MemoryIndex::new();
        let missing = doc("file:///a.md");
        let err = index.update_document(missing).await.unwrap_err();
        assert!(matches!(err, IndexError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_a_tree_cascades() {
        let index = MemoryIndex::new();
        let tree = Tree::new(Uri::parse("file:///notes").unwrap());
        let id = tree.id;
        index.insert_tree(tree).await.unwrap();

        let mut d = doc("file:///notes/a.md");
        d.origin = Origin::Tree(id);
        index.insert_document(d).await.unwrap();
        index.insert_document(doc("file:///b.md")).await.unwrap();

        assert!(index.delete_tree(id).await.unwrap().is_some());
        assert!(index.documents_in_tree(id).await.unwrap().is_empty());
        assert_eq!(index.documents().await.unwrap().len(), 1);
        assert!(index.delete_tree(id).await.unwrap().is_none());
    }
}
