use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use tokio::sync::RwLock;
use tracing::debug;

use crate::store::{DocumentContent, DocumentStore, Entry, EntryKind, StoreError};
use crate::uri::Uri;

/// Characters escaped inside a document id. `:` and `/` are escaped like real providers do.
const ID_ESCAPE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'.')
    .remove(b'-')
    .remove(b'_')
    .remove(b'~');

/// In-process document provider handing out `content://` URIs.
///
/// Paths passed to the helper methods are relative and slash-separated
/// (`"Notes/a.md"`). The provider derives document ids from them by prefixing a
/// volume (`primary:Notes/a.md`), and builds URIs the way document-provider
/// frameworks do:
///
/// * [`document_uri`](Self::document_uri): a file picked on its own,
///   `content://<authority>/document/<id>`.
/// * [`tree_uri`](Self::tree_uri): a picked directory, `content://<authority>/tree/<id>`.
/// * children listed below a tree URI: `content://<authority>/tree/<root id>/document/<id>`.
///
/// Renaming changes the id, so it always yields a new URI.
#[derive(Debug)]
pub struct MemoryStore {
    authority: String,
    volume: String,
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    nodes: BTreeMap<String, Node>,
    denied: BTreeSet<String>,
    grants: BTreeSet<Uri>,
    rename_unsupported: bool,
    deny_grants: bool,
}

#[derive(Debug, Clone)]
enum Node {
    Directory,
    File(String),
}

impl MemoryStore {
    pub fn new(authority: impl Into<String>) -> Self {
        MemoryStore {
            authority: authority.into(),
            volume: "primary".to_string(),
            state: RwLock::new(State::default()),
        }
    }

    /// Creates a file, including any missing parent directories.
    pub async fn add_file(&self, path: &str, content: &str) {
        let path = normalize(path);
        let mut state = self.state.write().await;
        for ancestor in ancestors(&path) {
            state.nodes.entry(ancestor).or_insert(Node::Directory);
        }
        state.nodes.insert(path, Node::File(content.to_string()));
    }

    /// Creates a directory, including any missing parents.
    pub async fn add_dir(&self, path: &str) {
        let path = normalize(path);
        let mut state = self.state.write().await;
        for ancestor in ancestors(&path) {
            state.nodes.entry(ancestor).or_insert(Node::Directory);
        }
        state.nodes.insert(path, Node::Directory);
    }

    /// Deletes a file or directory subtree as if done by another application.
    pub async fn remove(&self, path: &str) {
        let path = normalize(path);
        let mut state = self.state.write().await;
        state.nodes.retain(|p, _| !is_within(p, &path));
    }

    /// Replaces a file's content as if done by another application.
    pub async fn set_content(&self, path: &str, content: &str) {
        let path = normalize(path);
        if let Some(node) = self.state.write().await.nodes.get_mut(&path) {
            *node = Node::File(content.to_string());
        }
    }

    pub async fn content_of(&self, path: &str) -> Option<String> {
        match self.state.read().await.nodes.get(&normalize(path)) {
            Some(Node::File(content)) => Some(content.clone()),
            _ => None,
        }
    }

    /// Makes every access at or below `path` fail with `PermissionDenied`. Persisting a
    /// grant is not affected; see [`set_grants_denied`](Self::set_grants_denied).
    pub async fn deny(&self, path: &str) {
        self.state.write().await.denied.insert(normalize(path));
    }

    pub async fn set_rename_supported(&self, supported: bool) {
        self.state.write().await.rename_unsupported = !supported;
    }

    /// Makes [`persist_permission`](DocumentStore::persist_permission) fail.
    pub async fn set_grants_denied(&self, denied: bool) {
        self.state.write().await.deny_grants = denied;
    }

    pub async fn is_granted(&self, uri: &Uri) -> bool {
        self.state.read().await.grants.contains(uri)
    }

    pub fn document_uri(&self, path: &str) -> Result<Uri, StoreError> {
        self.build_uri(None, &self.id_for(&normalize(path)))
    }

    pub fn tree_uri(&self, path: &str) -> Result<Uri, StoreError> {
        let id = self.id_for(&normalize(path));
        Uri::parse(&format!("content://{}/tree/{}", self.authority, escape(&id)))
            .map_err(|e| StoreError::InvalidUri(e.to_string()))
    }

    fn id_for(&self, path: &str) -> String {
        format!("{}:{}", self.volume, path)
    }

    fn build_uri(&self, tree_root: Option<&str>, id: &str) -> Result<Uri, StoreError> {
        let raw = match tree_root {
            Some(root) => format!(
                "content://{}/tree/{}/document/{}",
                self.authority,
                escape(root),
                escape(id)
            ),
            None => format!("content://{}/document/{}", self.authority, escape(id)),
        };
        Uri::parse(&raw)
            .map_err(|e| StoreError::InvalidUri(e.to_string()))
    }

    /// Splits a URI into its tree root id (if any) and the path it addresses.
    fn resolve(&self, uri: &Uri) -> Result<(Option<String>, String), StoreError> {
        let url = uri.as_url();
        if url.scheme() != "content" || url.host_str() != Some(self.authority.as_str()) {
            return Err(StoreError::NotFound(uri.clone()));
        }
        // Ids this store hands out are always UTF-8; anything else is not ours.
        let segments: Vec<String> = url
            .path_segments()
            .and_then(|s| s.map(decode_segment).collect::<Option<Vec<_>>>())
            .ok_or_else(|| StoreError::NotFound(uri.clone()))?;

        let (root, id) = match segments.as_slice() {
            [tree, root, document, id] if tree == "tree" && document == "document" => {
                (Some(root.clone()), id.clone())
            }
            [tree, root] if tree == "tree" => (Some(root.clone()), root.clone()),
            [document, id] if document == "document" => (None, id.clone()),
            _ => return Err(StoreError::NotFound(uri.clone())),
        };
        let prefix = format!("{}:", self.volume);
        match id.strip_prefix(&prefix) {
            Some(path) => Ok((root, normalize(path))),
            None => Err(StoreError::NotFound(uri.clone())),
        }
    }
}

impl State {
    fn check_access(&self, path: &str, uri: &Uri) -> Result<(), StoreError> {
        if self.denied.iter().any(|d| is_within(path, d)) {
            return Err(StoreError::PermissionDenied(uri.clone()));
        }
        Ok(())
    }

    fn node(&self, path: &str, uri: &Uri) -> Result<&Node, StoreError> {
        self.check_access(path, uri)?;
        self.nodes
            .get(path)
            .ok_or_else(|| StoreError::NotFound(uri.clone()))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(&self, uri: &Uri) -> Result<DocumentContent, StoreError> {
        let (_, path) = self.resolve(uri)?;
        let state = self.state.read().await;
        match state.node(&path, uri)? {
            Node::File(content) => Ok(DocumentContent {
                name: base_name(&path).to_string(),
                content: content.clone(),
            }),
            Node::Directory => Err(StoreError::Unsupported {
                operation: "read a directory",
                uri: uri.clone(),
            }),
        }
    }

    async fn write(&self, uri: &Uri, content: &str) -> Result<(), StoreError> {
        let (_, path) = self.resolve(uri)?;
        let mut state = self.state.write().await;
        if matches!(state.node(&path, uri)?, Node::Directory) {
            return Err(StoreError::Unsupported {
                operation: "write to a directory",
                uri: uri.clone(),
            });
        }
        state.nodes.insert(path, Node::File(content.to_string()));
        Ok(())
    }

    async fn rename(&self, uri: &Uri, new_name: &str) -> Result<Uri, StoreError> {
        let (root, path) = self.resolve(uri)?;
        let mut state = self.state.write().await;
        if state.rename_unsupported {
            return Err(StoreError::Unsupported {
                operation: "rename",
                uri: uri.clone(),
            });
        }
        state.node(&path, uri)?;
        if new_name.is_empty() || new_name.contains('/') {
            return Err(StoreError::Unsupported {
                operation: "rename across directories",
                uri: uri.clone(),
            });
        }

        let target = match path.rsplit_once('/') {
            Some((parent, _)) => format!("{parent}/{new_name}"),
            None => new_name.to_string(),
        };
        if target == path {
            return Ok(uri.clone());
        }
        if state.nodes.contains_key(&target) {
            return Err(StoreError::AlreadyExists {
                uri: uri.clone(),
                name: new_name.to_string(),
            });
        }

        let moved: Vec<(String, Node)> = state
            .nodes
            .iter()
            .filter(|(p, _)| is_within(p, &path))
            .map(|(p, n)| (format!("{}{}", target, &p[path.len()..]), n.clone()))
            .collect();
        state.nodes.retain(|p, _| !is_within(p, &path));
        state.nodes.extend(moved);
        debug!("Renamed {} -> {}", path, target);

        self.build_uri(root.as_deref(), &self.id_for(&target))
    }

    async fn delete(&self, uri: &Uri) -> Result<(), StoreError> {
        let (_, path) = self.resolve(uri)?;
        let mut state = self.state.write().await;
        state.node(&path, uri)?;
        state.nodes.retain(|p, _| !is_within(p, &path));
        Ok(())
    }

    async fn list_children(&self, directory: &Uri) -> Result<Vec<Entry>, StoreError> {
        let (root, path) = self.resolve(directory)?;
        let state = self.state.read().await;
        if let Node::File(_) = state.node(&path, directory)? {
            return Err(StoreError::Unsupported {
                operation: "list a file",
                uri: directory.clone(),
            });
        }

        let mut entries = Vec::new();
        for (child, node) in state.nodes.iter() {
            if parent_of(child) != path.as_str() {
                continue;
            }
            entries.push(Entry {
                uri: self.build_uri(root.as_deref(), &self.id_for(child))?,
                name: base_name(child).to_string(),
                kind: match node {
                    Node::Directory => EntryKind::Directory,
                    Node::File(_) => EntryKind::File,
                },
            });
        }
        Ok(entries)
    }

    async fn persist_permission(&self, uri: &Uri) -> Result<(), StoreError> {
        let (_, path) = self.resolve(uri)?;
        let mut state = self.state.write().await;
        if state.deny_grants {
            return Err(StoreError::PermissionDenied(uri.clone()));
        }
        if !state.nodes.contains_key(&path) {
            return Err(StoreError::NotFound(uri.clone()));
        }
        state.grants.insert(uri.clone());
        Ok(())
    }

    async fn release_permission(&self, uri: &Uri) -> Result<(), StoreError> {
        self.state.write().await.grants.remove(uri);
        Ok(())
    }
}

fn escape(id: &str) -> String {
    utf8_percent_encode(id, ID_ESCAPE).to_string()
}

fn decode_segment(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_within(path: &str, ancestor: &str) -> bool {
    ancestor.is_empty()
        || path == ancestor
        || path
            .strip_prefix(ancestor)
            .is_some_and(|rest| rest.starts_with('/'))
}

fn parent_of(path: &str) -> &str {
    path.rsplit_once('/')
        .map(|(parent, _)| parent)
        .unwrap_or("")
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Proper ancestors of `path`, outermost first.
fn ancestors(path: &str) -> Vec<String> {
    let segments: Vec<&str> = path.split('/').collect();
    (1..segments.len())
        .map(|n| segments[..n].join("/"))
        .collect()
}
