use tether_core::Error;
use tether_core::engine::Engine;
use tether_core::index::{
    ArchivedFilter, DocumentQuery, Index, IndexError, MemoryIndex, SortKey, SortOrder,
};
use tether_core::model::{Document, LabelId};
use tether_core::store::MemoryStore;
use tether_core::uri::Uri;

type TestEngine = Engine<MemoryStore, MemoryIndex>;

async fn linked(files: &[(&str, &str)]) -> (TestEngine, Vec<Uri>) {
    let store = MemoryStore::new("com.example.documents");
    let engine = Engine::new(store, MemoryIndex::new());
    let mut uris = Vec::new();
    for (path, content) in files {
        engine.store().add_file(path, content).await;
        let uri = engine.store().document_uri(path).unwrap();
        engine.link_document(&uri).await.unwrap();
        uris.push(uri);
    }
    (engine, uris)
}

fn names(documents: Vec<Document>) -> Vec<String> {
    documents.into_iter().map(|d| d.display_name).collect()
}

#[tokio::test]
async fn metadata_edits_are_persisted() {
    let (engine, uris) = linked(&[("a.md", "")]).await;
    let a = &uris[0];

    engine.set_pinned(a, true).await.unwrap();
    engine.set_archived(a, true).await.unwrap();
    engine.set_color(a, 5).await.unwrap();
    let opened = engine.mark_opened(a).await.unwrap();

    let stored = engine.document(a).await.unwrap().unwrap();
    assert!(stored.pinned && stored.archived);
    assert_eq!(stored.color, 5);
    assert!(stored.last_opened_at.is_some());
    assert_eq!(stored, opened);
}

#[tokio::test]
async fn editing_an_unknown_document_fails() {
    let (engine, _) = linked(&[]).await;
    let uri = engine.store().document_uri("nope.md").unwrap();
    let pinned = engine.set_pinned(&uri, true).await;
    assert!(matches!(pinned, Err(Error::NotLinked(_))));
    let opened = engine.mark_opened(&uri).await;
    assert!(matches!(opened, Err(Error::NotLinked(_))));
}

#[tokio::test]
async fn labels_can_be_created_assigned_renamed_and_deleted() {
    let (engine, uris) = linked(&[("a.md", ""), ("b.md", "")]).await;
    let work = engine.create_label("  Work ").await.unwrap();
    assert_eq!(work.name, "Work");

    engine.set_label(&uris[0], Some(work.id)).await.unwrap();
    let query = DocumentQuery::default().with_label(work.id);
    let labelled = engine.documents(&query).await.unwrap();
    assert_eq!(labelled.len(), 1);
    assert_eq!(labelled[0].uri, uris[0]);

    let renamed = engine.rename_label(work.id, "Office").await.unwrap();
    assert_eq!(engine.labels().await.unwrap(), vec![renamed]);

    engine.delete_label(work.id).await.unwrap();
    assert!(engine.labels().await.unwrap().is_empty());
    let a = engine.document(&uris[0]).await.unwrap().unwrap();
    assert_eq!(a.label, None);
    assert_eq!(engine.index().documents().await.unwrap().len(), 2);
}

#[tokio::test]
async fn invalid_labels_are_rejected() {
    let (engine, uris) = linked(&[("a.md", "")]).await;
    let blank = engine.create_label("   ").await;
    assert!(matches!(blank, Err(Error::InvalidLabel(_))));

    engine.create_label("home").await.unwrap();
    let duplicate = engine.create_label("home").await.unwrap_err();
    assert!(matches!(duplicate, Error::Index(IndexError::DuplicateLabel(_))));

    let unknown = LabelId::new();
    let assigned = engine.set_label(&uris[0], Some(unknown)).await;
    assert!(matches!(assigned, Err(Error::LabelNotFound(_))));
    let renamed = engine.rename_label(unknown, "x").await;
    assert!(matches!(renamed, Err(Error::LabelNotFound(_))));
    let deleted = engine.delete_label(unknown).await;
    assert!(matches!(deleted, Err(Error::LabelNotFound(_))));
}

#[tokio::test]
async fn listing_sorts_filters_and_searches() {
    let (engine, uris) = linked(&[
        ("b.md", "shopping list"),
        ("a.md", "meeting notes"),
        ("c.md", "more notes"),
    ])
    .await;
    engine.set_pinned(&uris[2], true).await.unwrap();
    engine.set_archived(&uris[0], true).await.unwrap();

    let default = engine.documents(&DocumentQuery::default()).await.unwrap();
    assert_eq!(names(default), vec!["c.md", "a.md"]);

    let everything = DocumentQuery::default()
        .archived(ArchivedFilter::Include)
        .sorted_by(SortKey::Name, SortOrder::Descending);
    let all = engine.documents(&everything).await.unwrap();
    assert_eq!(names(all), vec!["c.md", "b.md", "a.md"]);

    let found = engine.search("NOTES").await.unwrap();
    assert_eq!(names(found), vec!["c.md", "a.md"]);
}
