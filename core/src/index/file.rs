use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

use super::{DocumentQuery, Index, IndexError, IndexState, Result};
use crate::model::{Document, Label, LabelId, Tree, TreeId};
use crate::persist::write_json;
use crate::uri::{PathKey, Uri};

/// Index persisted as a single JSON file.
///
/// Reads are served from memory. Mutations are applied in place and the whole
/// snapshot is rewritten after each one, or once when the outermost batch ends. If a
/// write fails the changes stay pending in memory and go out with the next write.
#[derive(Debug)]
pub struct FileIndex {
    path: PathBuf,
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    state: IndexState,
    batch_depth: usize,
    dirty: bool,
}

impl Inner {
    async fn flush(&mut self, path: &Path) -> Result<()> {
        if self.dirty && self.batch_depth == 0 {
            write_json(path, &self.state).await?;
            self.dirty = false;
        }
        Ok(())
    }
}

impl FileIndex {
    /// Loads the index from `path`. A missing file yields an empty index; the file is
    /// created on the first mutation.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| {
                IndexError::Serialization {
                    path: path.clone(),
                    source,
                }
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No index file yet, starting empty");
                IndexState::default()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(FileIndex {
            path,
            inner: RwLock::new(Inner {
                state,
                ..Inner::default()
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `op`, which reports whether it changed anything, and persists the
    /// result unless a batch is open.
    async fn mutate<T: Send>(
        &self,
        op: impl FnOnce(&mut IndexState) -> Result<(T, bool)> + Send,
    ) -> Result<T> {
        let mut inner = self.inner.write().await;
        let (value, changed) = op(&mut inner.state)?;
        inner.dirty |= changed;
        inner.flush(&self.path).await?;
        Ok(value)
    }
}

/// A successful insert or update always changes the state.
fn applied(result: Result<()>) -> Result<((), bool)> {
    result.map(|()| ((), true))
}

#[async_trait]
impl Index for FileIndex {
    async fn document(&self, uri: &Uri) -> Result<Option<Document>> {
        Ok(self.inner.read().await.state.document(uri).cloned())
    }

    async fn documents(&self) -> Result<Vec<Document>> {
        let inner = self.inner.read().await;
        Ok(inner.state.documents().cloned().collect())
    }

    async fn documents_in_tree(&self, tree: TreeId) -> Result<Vec<Document>> {
        let inner = self.inner.read().await;
        Ok(inner.state.documents_in_tree(tree).cloned().collect())
    }

    async fn documents_by_path_key(&self, key: &PathKey) -> Result<Vec<Document>> {
        let inner = self.inner.read().await;
        Ok(inner.state.documents_by_path_key(key).cloned().collect())
    }

    async fn insert_document(&self, document: Document) -> Result<()> {
        self.mutate(|s| applied(s.insert_document(document))).await
    }

    async fn update_document(&self, document: Document) -> Result<()> {
        self.mutate(|s| applied(s.update_document(document))).await
    }

    async fn delete_document(&self, uri: &Uri) -> Result<Option<Document>> {
        self.mutate(|s| {
            let removed = s.delete_document(uri);
            let changed = removed.is_some();
            Ok((removed, changed))
        })
        .await
    }

    async fn delete_documents_in_tree(&self, tree: TreeId) -> Result<Vec<Document>> {
        self.mutate(|s| {
            let removed = s.delete_documents_in_tree(tree);
            let changed = !removed.is_empty();
            Ok((removed, changed))
        })
        .await
    }

    async fn query(&self, query: &DocumentQuery) -> Result<Vec<Document>> {
        Ok(self.inner.read().await.state.query(query))
    }

    async fn tree(&self, id: TreeId) -> Result<Option<Tree>> {
        Ok(self.inner.read().await.state.tree(id).cloned())
    }

    async fn trees(&self) -> Result<Vec<Tree>> {
        let inner = self.inner.read().await;
        Ok(inner.state.trees().into_iter().cloned().collect())
    }

    async fn insert_tree(&self, tree: Tree) -> Result<()> {
        self.mutate(|s| applied(s.insert_tree(tree))).await
    }

    async fn delete_tree(&self, id: TreeId) -> Result<Option<Tree>> {
        self.mutate(|s| {
            let removed = s.delete_tree(id);
            let changed = removed.is_some();
            Ok((removed, changed))
        })
        .await
    }

    async fn label(&self, id: LabelId) -> Result<Option<Label>> {
        Ok(self.inner.read().await.state.label(id).cloned())
    }

    async fn labels(&self) -> Result<Vec<Label>> {
        let inner = self.inner.read().await;
        Ok(inner.state.labels().into_iter().cloned().collect())
    }

    async fn insert_label(&self, label: Label) -> Result<()> {
        self.mutate(|s| applied(s.insert_label(label))).await
    }

    async fn update_label(&self, label: Label) -> Result<()> {
        self.mutate(|s| applied(s.update_label(label))).await
    }

    async fn delete_label(&self, id: LabelId) -> Result<Option<Label>> {
        self.mutate(|s| {
            let removed = s.delete_label(id);
            let changed = removed.is_some();
            Ok((removed, changed))
        })
        .await
    }

    async fn begin_batch(&self) {
        self.inner.write().await.batch_depth += 1;
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn end_batch(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.batch_depth = inner.batch_depth.saturating_sub(1);
        if inner.batch_depth == 0 && inner.dirty {
            debug!("Writing batched index changes");
        }
        inner.flush(&self.path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Origin;
    use tempfile::tempdir;

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");

        let index = FileIndex::open(&path).await.unwrap();
        let tree = Tree::new(Uri::parse("file:///notes").unwrap());
        let id = tree.id;
        index.insert_tree(tree).await.unwrap();
        let doc = Document::new(
            Uri::parse("file:///notes/a.md").unwrap(),
            "a.md".into(),
            "hello".into(),
            Origin::Tree(id),
        );
        index.insert_document(doc.clone()).await.unwrap();
        drop(index);

        let reopened = FileIndex::open(&path).await.unwrap();
        let aliases = reopened
            .documents_by_path_key(&doc.path_key())
            .await
            .unwrap();
        assert_eq!(aliases, vec![doc.clone()]);
        assert_eq!(reopened.document(&doc.uri).await.unwrap(), Some(doc));
        assert_eq!(reopened.trees().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejected_mutation_does_not_touch_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = FileIndex::open(&path).await.unwrap();

        let orphan = Document::new(
            Uri::parse("file:///x.md").unwrap(),
            "x.md".into(),
            String::new(),
            Origin::Tree(TreeId::new()),
        );
        let err = index.insert_document(orphan).await.unwrap_err();
        assert!(matches!(err, IndexError::MissingTree { .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn batched_mutations_are_written_when_the_batch_ends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = FileIndex::open(&path).await.unwrap();

        index.begin_batch().await;
        index.begin_batch().await;
        index.insert_label(Label::new("work")).await.unwrap();
        index.end_batch().await.unwrap();
        assert!(!path.exists());

        index.end_batch().await.unwrap();
        let reopened = FileIndex::open(&path).await.unwrap();
        assert_eq!(reopened.labels().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_nothing_does_not_create_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        let index = FileIndex::open(&path).await.unwrap();

        let missing = Uri::parse("file:///x.md").unwrap();
        let removed = index.delete_document(&missing).await.unwrap();
        assert_eq!(removed, None);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn malformed_file_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.json");
        fs::write(&path, "not json").await.unwrap();

        let err = FileIndex::open(&path).await.unwrap_err();
        assert!(matches!(err, IndexError::Serialization { .. }));
    }
}
