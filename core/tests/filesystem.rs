use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};
use tokio::fs;

use tether_core::config::Config;
use tether_core::engine::{Engine, LinkOutcome};
use tether_core::index::{FileIndex, Index};
use tether_core::model::Origin;
use tether_core::store::FsStore;
use tether_core::uri::Uri;

async fn create_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .await
            .expect("Test helper: Failed to create parent dir");
    }
    fs::write(path, content)
        .await
        .expect("Test helper: Failed to create file");
}

fn file_uri(path: impl AsRef<Path>) -> Uri {
    Uri::from_file_path(path)
        .expect("Test helper: Failed to build file URI")
}

/// A canonical temporary root, so `file://` URIs built from it are stable.
fn root() -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = std::fs::canonicalize(dir.path()).unwrap();
    (dir, path)
}

async fn open_engine(data_dir: &Path) -> Engine<FsStore, FileIndex> {
    let config = Config::load(data_dir).await.unwrap();
    let store = FsStore::open(config.grants_path(data_dir)).await.unwrap();
    let index = FileIndex::open(config.index_path(data_dir)).await.unwrap();
    Engine::new(store, index)
        .with_options(config.walk_options())
}

/// An engine without a data directory: grants stay in memory.
async fn scratch_engine(root: &Path) -> Engine<FsStore, FileIndex> {
    let index = FileIndex::open(root.join("index.json")).await.unwrap();
    Engine::new(FsStore::new(), index)
}

#[tokio::test]
async fn link_sync_and_reopen_on_the_local_filesystem() {
    let (_dir, root) = root();
    let data_dir = root.join(".tether");
    let notes = root.join("notes");
    create_file(&notes.join("a.md"), "alpha").await;
    create_file(&notes.join("sub").join("b.md"), "beta").await;
    create_file(&notes.join(".hidden"), "nope").await;
    create_file(&root.join("loose.md"), "loose").await;
    Config::init(&data_dir).await.unwrap();

    let engine = open_engine(&data_dir).await;
    let loose = file_uri(root.join("loose.md"));
    engine.link_document(&loose).await.unwrap();
    let import = engine.link_tree(&file_uri(&notes)).await.unwrap();
    assert_eq!(import.documents.len(), 2);
    engine.set_pinned(&loose, true).await.unwrap();

    fs::remove_file(notes.join("a.md")).await.unwrap();
    let updated = notes.join("sub").join("b.md");
    fs::write(updated, "beta v2").await.unwrap();
    let report = engine.sync_all().await.unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(report.refreshed, 1);
    drop(engine);

    let reopened = open_engine(&data_dir).await;
    let documents = reopened.index().documents().await.unwrap();
    assert_eq!(documents.len(), 2);
    let b = documents.iter().find(|d| d.display_name == "b.md").unwrap();
    assert_eq!(b.content, "beta v2");
    assert_eq!(b.origin, Origin::Tree(import.tree.id));
    assert!(reopened.document(&loose).await.unwrap().unwrap().pinned);

    let grants = reopened.store().grants().await;
    assert!(grants.contains(&loose));
    assert!(grants.contains(&import.tree.uri));
}

#[tokio::test]
async fn linking_a_folder_adopts_files_linked_on_their_own() {
    let (_dir, root) = root();
    let notes = root.join("notes");
    create_file(&notes.join("a.md"), "alpha").await;
    let engine = scratch_engine(&root).await;

    let a = file_uri(notes.join("a.md"));
    engine.link_document(&a).await.unwrap();
    engine.set_color(&a, 3).await.unwrap();
    let import = engine.link_tree(&file_uri(&notes)).await.unwrap();

    assert_eq!(import.documents.len(), 1);
    let document = &import.documents[0];
    assert_eq!(document.uri, a);
    assert_eq!(document.origin, Origin::Tree(import.tree.id));
    assert_eq!(document.color, 3);
    assert!(!engine.store().grants().await.contains(&a));
}

#[tokio::test]
async fn save_with_rename_renames_the_file() {
    let (_dir, root) = root();
    create_file(&root.join("note.md"), "draft").await;
    let engine = scratch_engine(&root).await;
    let u1 = file_uri(root.join("note.md"));

    let linked = engine.link_document(&u1).await.unwrap();
    let mut edited = linked.document().clone();
    edited.display_name = "note2.md".into();
    edited.content = "final".into();
    let outcome = engine.save_document(&edited, true).await.unwrap();

    let u2 = file_uri(root.join("note2.md"));
    assert_eq!(outcome.document.uri, u2);
    let on_disk = fs::read_to_string(root.join("note2.md")).await.unwrap();
    assert_eq!(on_disk, "final");
    assert!(!root.join("note.md").exists());
    assert!(engine.document(&u1).await.unwrap().is_none());
    assert_eq!(engine.index().documents().await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_removes_the_file_from_disk() {
    let (_dir, root) = root();
    create_file(&root.join("a.md"), "a").await;
    let engine = scratch_engine(&root).await;
    let a = file_uri(root.join("a.md"));
    engine.link_document(&a).await.unwrap();

    engine.delete_document(&a).await.unwrap();

    assert!(!root.join("a.md").exists());
    assert!(engine.index().documents().await.unwrap().is_empty());
}

#[tokio::test]
async fn orphans_in_a_loaded_index_are_cleaned_up() {
    let (_dir, root) = root();
    create_file(&root.join("kept.md"), "kept").await;
    let kept = file_uri(root.join("kept.md"));
    let orphan = file_uri(root.join("gone").join("x.md"));
    // Written by hand: a row pointing at a tree the file does not contain.
    let snapshot = serde_json::json!({
        "trees": [],
        "labels": [],
        "documents": [
            {
                "uri": kept, "display_name": "kept.md", "content": "kept",
                "created_at": null, "last_opened_at": null,
                "pinned": false, "archived": false, "color": 0, "label": null,
                "origin": { "kind": "independent" }
            },
            {
                "uri": orphan, "display_name": "x.md", "content": "",
                "created_at": null, "last_opened_at": null,
                "pinned": false, "archived": false, "color": 0, "label": null,
                "origin": { "kind": "tree", "tree": "7c0e3d9e-2a65-4a55-9a61-1f5d8f3c9a10" }
            }
        ]
    });
    let bytes = serde_json::to_vec(&snapshot).unwrap();
    fs::write(root.join("index.json"), bytes).await.unwrap();

    let engine = scratch_engine(&root).await;
    let report = engine.sync_all().await.unwrap();

    assert_eq!(report.orphans_removed, 1);
    assert_eq!(report.unchanged, 1);
    let documents = engine.index().documents().await.unwrap();
    assert_eq!(documents.len(), 1);
    assert_eq!(documents[0].uri, kept);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn files_with_non_utf8_names_are_linked_separately() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let (_dir, root) = root();
    let ff = root.join(OsStr::from_bytes(b"\xff.md"));
    let fe = root.join(OsStr::from_bytes(b"\xfe.md"));
    create_file(&ff, "ff").await;
    create_file(&fe, "fe").await;
    let engine = scratch_engine(&root).await;

    for path in [&ff, &fe] {
        let outcome = engine.link_document(&file_uri(path)).await.unwrap();
        assert!(matches!(outcome, LinkOutcome::Linked(_)));
    }

    let documents = engine.index().documents().await.unwrap();
    assert_eq!(documents.len(), 2);
    assert_ne!(documents[0].path_key(), documents[1].path_key());
}
