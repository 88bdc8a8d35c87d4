use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{LabelId, TreeId};
use crate::store::DocumentContent;
use crate::uri::{PathKey, Uri};

/// How a document came to be in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tree", rename_all = "snake_case")]
pub enum Origin {
    /// Linked on its own.
    Independent,
    /// Discovered while extracting a linked tree.
    Tree(TreeId),
}

impl Origin {
    pub fn tree(&self) -> Option<TreeId> {
        match self {
            Origin::Independent => None,
            Origin::Tree(id) => Some(*id),
        }
    }

    pub fn is_independent(&self) -> bool {
        matches!(self, Origin::Independent)
    }
}

/// One linked external file together with its cached content and user metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub uri: Uri,
    pub display_name: String,
    pub content: String,
    pub created_at: Option<DateTime<Utc>>,
    pub last_opened_at: Option<DateTime<Utc>>,
    pub pinned: bool,
    pub archived: bool,
    pub color: u8,
    pub label: Option<LabelId>,
    pub origin: Origin,
}

impl Document {
    pub fn new(uri: Uri, display_name: String, content: String, origin: Origin) -> Self {
        Document {
            uri,
            display_name,
            content,
            created_at: Some(Utc::now()),
            last_opened_at: None,
            pinned: false,
            archived: false,
            color: 0,
            label: None,
            origin,
        }
    }

    pub fn from_content(uri: Uri, content: DocumentContent, origin: Origin) -> Self {
        Document::new(uri, content.name, content.content, origin)
    }

    pub fn path_key(&self) -> PathKey {
        self.uri.path_key()
    }

    pub fn tree(&self) -> Option<TreeId> {
        self.origin.tree()
    }

    /// Copies everything the user may have set on `other`, leaving identity, origin
    /// and cached content alone.
    pub fn copy_user_metadata_from(&mut self, other: &Document) {
        self.created_at = other.created_at;
        self.last_opened_at = other.last_opened_at;
        self.pinned = other.pinned;
        self.archived = other.archived;
        self.color = other.color;
        self.label = other.label;
    }

    /// Replaces the cached name and content. Returns `true` if anything changed.
    pub fn refresh(&mut self, fresh: &DocumentContent) -> bool {
        let changed = self.display_name != fresh.name || self.content != fresh.content;
        if changed {
            self.display_name.clone_from(&fresh.name);
            self.content.clone_from(&fresh.content);
        }
        changed
    }
}
