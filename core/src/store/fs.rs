use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};
use crate::persist::{read_json, write_json};
use crate::store::{DocumentContent, DocumentStore, Entry, EntryKind, StoreError};
use crate::uri::Uri;

/// Document store backed by the local filesystem.
///
/// Documents are addressed with `file://` URIs. The filesystem has no notion of
/// persisted grants, so granting access only verifies that the path is reachable and
/// records the URI. When opened with a grants file, the recorded set survives restarts.
#[derive(Debug, Default)]
pub struct FsStore {
    grants_file: Option<PathBuf>,
    grants: RwLock<BTreeSet<Uri>>,
}

impl FsStore {
    /// Creates a store that keeps grants in memory only.
    pub fn new() -> Self {
        FsStore::default()
    }

    /// Creates a store whose grants are loaded from and saved to `grants_file`.
    #[instrument(skip(grants_file), fields(grants_file = %grants_file.display()))]
    pub async fn open(grants_file: PathBuf) -> Result<Self> {
        let grants: BTreeSet<Uri> = read_json(&grants_file)
            .await
            .map_err(|e| {
                warn!("Failed to read grants file '{}': {}", grants_file.display(), e);
                Error::InvalidConfig(grants_file.clone())
            })?
            .unwrap_or_default();
        debug!("Loaded {} persisted grants", grants.len());
        Ok(FsStore {
            grants_file: Some(grants_file),
            grants: RwLock::new(grants),
        })
    }

    /// Returns the URIs currently holding a persisted grant.
    pub async fn grants(&self) -> Vec<Uri> {
        self.grants.read().await.iter().cloned().collect()
    }

    async fn save_grants(
        &self,
        grants: &BTreeSet<Uri>,
        uri: &Uri,
    ) -> std::result::Result<(), StoreError> {
        if let Some(path) = &self.grants_file {
            write_json(path, grants).await.map_err(|source| StoreError::Io {
                uri: uri.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

fn local_path(uri: &Uri) -> std::result::Result<PathBuf, StoreError> {
    uri.to_file_path().ok_or_else(|| StoreError::Unsupported {
        operation: "resolve non-file URI",
        uri: uri.clone(),
    })
}

fn file_uri(path: &Path) -> std::result::Result<Uri, StoreError> {
    Uri::from_file_path(path)
        .map_err(|e| StoreError::InvalidUri(e.to_string()))
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl DocumentStore for FsStore {
    #[instrument(skip(self), fields(uri = %uri))]
    async fn read(&self, uri: &Uri) -> std::result::Result<DocumentContent, StoreError> {
        let path = local_path(uri)?;
        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::from_io(uri, e))?;
        Ok(DocumentContent {
            name: file_name(&path),
            content,
        })
    }

    #[instrument(skip(self, content), fields(uri = %uri))]
    async fn write(&self, uri: &Uri, content: &str) -> std::result::Result<(), StoreError> {
        let path = local_path(uri)?;
        // Writing must not resurrect a document that was deleted behind our back.
        let meta = fs::metadata(&path)
            .await
            .map_err(|e| StoreError::from_io(uri, e))?;
        if !meta.is_file() {
            return Err(StoreError::Unsupported {
                operation: "write to a directory",
                uri: uri.clone(),
            });
        }
        fs::write(&path, content)
            .await
            .map_err(|e| StoreError::from_io(uri, e))
    }

    #[instrument(skip(self), fields(uri = %uri))]
    async fn rename(&self, uri: &Uri, new_name: &str) -> std::result::Result<Uri, StoreError> {
        let path = local_path(uri)?;
        if new_name.is_empty() || new_name.contains(['/', '\\']) {
            return Err(StoreError::Unsupported {
                operation: "rename across directories",
                uri: uri.clone(),
            });
        }
        let target = match path.parent() {
            Some(parent) => parent.join(new_name),
            None => return Err(StoreError::NotFound(uri.clone())),
        };
        if target == path {
            return Ok(uri.clone());
        }

        fs::metadata(&path)
            .await
            .map_err(|e| StoreError::from_io(uri, e))?;
        let taken = fs::try_exists(&target)
            .await
            .map_err(|e| StoreError::from_io(uri, e))?;
        if taken {
            return Err(StoreError::AlreadyExists {
                uri: uri.clone(),
                name: new_name.to_string(),
            });
        }

        debug!("Renaming {} -> {}", path.display(), target.display());
        fs::rename(&path, &target)
            .await
            .map_err(|e| StoreError::from_io(uri, e))?;
        file_uri(&target)
    }

    #[instrument(skip(self), fields(uri = %uri))]
    async fn delete(&self, uri: &Uri) -> std::result::Result<(), StoreError> {
        let path = local_path(uri)?;
        fs::remove_file(&path)
            .await
            .map_err(|e| StoreError::from_io(uri, e))
    }

    #[instrument(skip(self), fields(uri = %directory))]
    async fn list_children(
        &self,
        directory: &Uri,
    ) -> std::result::Result<Vec<Entry>, StoreError> {
        let path = local_path(directory)?;
        let io_error = |e| StoreError::from_io(directory, e);
        let mut read_dir = fs::read_dir(&path).await.map_err(io_error)?;

        let mut entries = Vec::new();
        while let Some(dir_entry) = read_dir.next_entry().await.map_err(io_error)? {
            let child = dir_entry.path();
            // Follows symlinks, so a linked directory is walked like a real one.
            let meta = match fs::metadata(&child).await {
                Ok(meta) => meta,
                Err(e) => {
                    warn!("Skipping unreadable entry '{}': {}", child.display(), e);
                    continue;
                }
            };
            let kind = if meta.is_dir() {
                EntryKind::Directory
            } else if meta.is_file() {
                EntryKind::File
            } else {
                continue;
            };
            entries.push(Entry {
                uri: file_uri(&child)?,
                name: dir_entry.file_name().to_string_lossy().into_owned(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!("Found {} entries", entries.len());
        Ok(entries)
    }

    #[instrument(skip(self), fields(uri = %uri))]
    async fn persist_permission(&self, uri: &Uri) -> std::result::Result<(), StoreError> {
        let path = local_path(uri)?;
        fs::metadata(&path)
            .await
            .map_err(|e| StoreError::from_io(uri, e))?;

        let mut grants = self.grants.write().await;
        if grants.insert(uri.clone()) {
            self.save_grants(&grants, uri).await?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(uri = %uri))]
    async fn release_permission(&self, uri: &Uri) -> std::result::Result<(), StoreError> {
        let mut grants = self.grants.write().await;
        if grants.remove(uri) {
            self.save_grants(&grants, uri).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn create_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .expect("Failed to create parent dir");
        }
        fs::write(path, content)
            .await
            .expect("Failed to create file");
    }

    fn uri(path: &Path) -> Uri {
        Uri::from_file_path(path).unwrap()
    }

    #[tokio::test]
    async fn read_returns_name_and_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("note.md");
        create_file(&path, "# Hello").await;

        let content = FsStore::new().read(&uri(&path)).await.unwrap();
        assert_eq!(content.name, "note.md");
        assert_eq!(content.content, "# Hello");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let store = FsStore::new();
        let missing = uri(&dir.path().join("gone.md"));

        assert!(store.read(&missing).await.unwrap_err().is_not_found());
        let err = store.write(&missing, "x").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(store.delete(&missing).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn rename_returns_new_uri_and_refuses_collisions() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.md");
        let b = dir.path().join("b.md");
        create_file(&a, "a").await;
        create_file(&b, "b").await;
        let store = FsStore::new();

        let err = store.rename(&uri(&a), "b.md").await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));

        let renamed = store.rename(&uri(&a), "c.md").await.unwrap();
        assert_eq!(renamed, uri(&dir.path().join("c.md")));
        assert!(!a.exists());
    }

    #[tokio::test]
    async fn list_children_is_sorted_and_typed() {
        let dir = tempdir().unwrap();
        create_file(&dir.path().join("b.md"), "").await;
        create_file(&dir.path().join("a.md"), "").await;
        create_file(&dir.path().join("sub").join("c.md"), "").await;

        let entries = FsStore::new()
            .list_children(&uri(dir.path()))
            .await
            .unwrap();
        let names: Vec<_> = entries
            .iter()
            .map(|e| (e.name.as_str(), e.is_dir()))
            .collect();
        assert_eq!(names, vec![("a.md", false), ("b.md", false), ("sub", true)]);
    }

    #[tokio::test]
    async fn grants_survive_reopen() {
        let dir = tempdir().unwrap();
        let grants_file = dir.path().join("grants.json");
        let doc = dir.path().join("a.md");
        create_file(&doc, "").await;

        let store = FsStore::open(grants_file.clone()).await.unwrap();
        store.persist_permission(&uri(&doc)).await.unwrap();
        drop(store);

        let reopened = FsStore::open(grants_file.clone()).await.unwrap();
        assert_eq!(reopened.grants().await, vec![uri(&doc)]);

        reopened.release_permission(&uri(&doc)).await.unwrap();
        let again = FsStore::open(grants_file).await.unwrap();
        assert!(again.grants().await.is_empty());
    }

    #[tokio::test]
    async fn granting_a_missing_path_fails() {
        let dir = tempdir().unwrap();
        let missing = uri(&dir.path().join("nope"));
        let err = FsStore::new()
            .persist_permission(&missing)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
