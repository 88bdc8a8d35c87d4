use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::{DocumentQuery, IndexError, Result};
use crate::model::{Document, Label, LabelId, Tree, TreeId};
use crate::uri::{PathKey, Uri};

/// The complete content of an index, with the structural rules enforced on every
/// mutation.
///
/// Both [`MemoryIndex`](super::MemoryIndex) and [`FileIndex`](super::FileIndex) keep one
/// of these behind a lock. Serializes as a flat snapshot of three record lists; the
/// path-key lookup table is rebuilt on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Snapshot", into = "Snapshot")]
pub struct IndexState {
    documents: BTreeMap<Uri, Document>,
    trees: BTreeMap<TreeId, Tree>,
    labels: BTreeMap<LabelId, Label>,
    by_path_key: BTreeMap<PathKey, BTreeSet<Uri>>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    trees: Vec<Tree>,
    #[serde(default)]
    labels: Vec<Label>,
    #[serde(default)]
    documents: Vec<Document>,
}

impl From<Snapshot> for IndexState {
    fn from(snapshot: Snapshot) -> Self {
        let trees = snapshot.trees.into_iter().map(|t| (t.id, t));
        let labels = snapshot.labels.into_iter().map(|l| (l.id, l));
        let mut state = IndexState {
            documents: BTreeMap::new(),
            trees: trees.collect(),
            labels: labels.collect(),
            by_path_key: BTreeMap::new(),
        };
        for document in snapshot.documents {
            state.put(document);
        }
        state
    }
}

impl From<IndexState> for Snapshot {
    fn from(state: IndexState) -> Self {
        Snapshot {
            trees: state.trees.into_values().collect(),
            labels: state.labels.into_values().collect(),
            documents: state.documents.into_values().collect(),
        }
    }
}

impl IndexState {
    pub fn document(&self, uri: &Uri) -> Option<&Document> {
        self.documents.get(uri)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values()
    }

    pub fn documents_in_tree(&self, tree: TreeId) -> impl Iterator<Item = &Document> {
        self.documents
            .values()
            .filter(move |d| d.tree() == Some(tree))
    }

    /// Documents whose key [matches](PathKey::matches) `key`.
    pub fn documents_by_path_key(&self, key: &PathKey) -> impl Iterator<Item = &Document> {
        let uris = match key.as_str() {
            "" => None,
            _ => self.by_path_key.get(key),
        };
        uris.into_iter()
            .flatten()
            .filter_map(|uri| self.documents.get(uri))
    }

    pub fn tree(&self, id: TreeId) -> Option<&Tree> {
        self.trees.get(&id)
    }

    /// Trees in the order they were linked.
    pub fn trees(&self) -> Vec<&Tree> {
        let mut trees: Vec<&Tree> = self.trees.values().collect();
        trees.sort_by(|a, b| {
            a.linked_at
                .cmp(&b.linked_at)
                .then_with(|| a.uri.cmp(&b.uri))
        });
        trees
    }

    pub fn label(&self, id: LabelId) -> Option<&Label> {
        self.labels.get(&id)
    }

    /// Labels sorted by name.
    pub fn labels(&self) -> Vec<&Label> {
        let mut labels: Vec<&Label> = self.labels.values().collect();
        labels.sort_by(|a, b| a.name.cmp(&b.name));
        labels
    }

    pub fn query(&self, query: &DocumentQuery) -> Vec<Document> {
        query.apply(self.documents.values())
    }

    pub fn insert_document(&mut self, document: Document) -> Result<()> {
        if self.documents.contains_key(&document.uri) {
            return Err(IndexError::DuplicateUri(document.uri));
        }
        self.check_references(&document)?;
        self.put(document);
        Ok(())
    }

    pub fn update_document(&mut self, document: Document) -> Result<()> {
        if !self.documents.contains_key(&document.uri) {
            return Err(IndexError::NotFound(document.uri));
        }
        self.check_references(&document)?;
        self.documents.insert(document.uri.clone(), document);
        Ok(())
    }

    pub fn delete_document(&mut self, uri: &Uri) -> Option<Document> {
        let document = self.documents.remove(uri)?;
        let key = document.path_key();
        if let Some(uris) = self.by_path_key.get_mut(&key) {
            uris.remove(uri);
            if uris.is_empty() {
                self.by_path_key.remove(&key);
            }
        }
        Some(document)
    }

    pub fn delete_documents_in_tree(&mut self, tree: TreeId) -> Vec<Document> {
        let uris: Vec<Uri> = self
            .documents_in_tree(tree)
            .map(|d| d.uri.clone())
            .collect();
        uris.iter()
            .filter_map(|uri| self.delete_document(uri))
            .collect()
    }

    pub fn insert_tree(&mut self, tree: Tree) -> Result<()> {
        if self.trees.contains_key(&tree.id) || self.trees.values().any(|t| t.uri == tree.uri) {
            return Err(IndexError::DuplicateTree(tree.uri));
        }
        self.trees.insert(tree.id, tree);
        Ok(())
    }

    /// Removes a tree and every document scoped to it.
    pub fn delete_tree(&mut self, id: TreeId) -> Option<Tree> {
        let tree = self.trees.remove(&id)?;
        self.delete_documents_in_tree(id);
        Some(tree)
    }

    pub fn insert_label(&mut self, label: Label) -> Result<()> {
        if self.labels.values().any(|l| l.name == label.name) {
            return Err(IndexError::DuplicateLabel(label.name));
        }
        self.labels.insert(label.id, label);
        Ok(())
    }

    pub fn update_label(&mut self, label: Label) -> Result<()> {
        if !self.labels.contains_key(&label.id) {
            return Err(IndexError::LabelNotFound(label.id));
        }
        if self.labels.values().any(|l| l.id != label.id && l.name == label.name) {
            return Err(IndexError::DuplicateLabel(label.name));
        }
        self.labels.insert(label.id, label);
        Ok(())
    }

    /// Removes a label and clears it from the documents that carried it.
    pub fn delete_label(&mut self, id: LabelId) -> Option<Label> {
        let label = self.labels.remove(&id)?;
        for document in self.documents.values_mut().filter(|d| d.label == Some(id)) {
            document.label = None;
        }
        Some(label)
    }

    /// Inserts or replaces a row, keeping the path-key table in step. The key depends
    /// only on the URI, so a replaced row keeps its entry.
    fn put(&mut self, document: Document) {
        self.by_path_key
            .entry(document.path_key())
            .or_default()
            .insert(document.uri.clone());
        self.documents.insert(document.uri.clone(), document);
    }

    fn check_references(&self, document: &Document) -> Result<()> {
        if let Some(tree) = document.tree() {
            if !self.trees.contains_key(&tree) {
                return Err(IndexError::MissingTree {
                    uri: document.uri.clone(),
                    tree,
                });
            }
        }
        if let Some(label) = document.label {
            if !self.labels.contains_key(&label) {
                return Err(IndexError::MissingLabel {
                    uri: document.uri.clone(),
                    label,
                });
            }
        }
        Ok(())
    }
}
