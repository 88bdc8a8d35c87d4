use serde::{Deserialize, Serialize};

use crate::model::LabelId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub name: String,
}

impl Label {
    pub fn new(name: impl Into<String>) -> Self {
        Label {
            id: LabelId::new(),
            name: name.into(),
        }
    }
}
