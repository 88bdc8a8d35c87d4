use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::TreeId;
use crate::uri::{PathKey, Uri};

/// A linked external directory. Every document found below it is indexed with
/// [`Origin::Tree`](crate::model::Origin::Tree) pointing back here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tree {
    pub id: TreeId,
    pub uri: Uri,
    pub linked_at: DateTime<Utc>,
}

impl Tree {
    pub fn new(uri: Uri) -> Self {
        Tree {
            id: TreeId::new(),
            uri,
            linked_at: Utc::now(),
        }
    }

    pub fn path_key(&self) -> PathKey {
        self.uri.path_key()
    }

    /// True if `uri` is this tree's root or lies below it.
    pub fn covers(&self, uri: &Uri) -> bool {
        self.path_key().contains(&uri.path_key())
    }
}
