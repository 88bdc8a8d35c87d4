use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::model::{Document, LabelId, TreeId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Display name, case-insensitive.
    #[default]
    Name,
    CreatedAt,
    /// Most recent use. Documents never opened sort last in either order.
    LastOpened,
    Color,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchivedFilter {
    #[default]
    Exclude,
    Only,
    Include,
}

/// Filter and ordering for a document listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentQuery {
    pub sort: SortKey,
    pub order: SortOrder,
    pub archived: ArchivedFilter,
    pub label: Option<LabelId>,
    pub tree: Option<TreeId>,
    /// Pinned documents precede the others; each group is sorted on its own.
    pub pinned_first: bool,
    /// Case-insensitive substring matched against display name and content.
    pub text: Option<String>,
}

impl Default for DocumentQuery {
    fn default() -> Self {
        DocumentQuery {
            sort: SortKey::default(),
            order: SortOrder::default(),
            archived: ArchivedFilter::default(),
            label: None,
            tree: None,
            pinned_first: true,
            text: None,
        }
    }
}

impl DocumentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sorted_by(mut self, sort: SortKey, order: SortOrder) -> Self {
        self.sort = sort;
        self.order = order;
        self
    }

    pub fn archived(mut self, filter: ArchivedFilter) -> Self {
        self.archived = filter;
        self
    }

    pub fn with_label(mut self, label: LabelId) -> Self {
        self.label = Some(label);
        self
    }

    pub fn in_tree(mut self, tree: TreeId) -> Self {
        self.tree = Some(tree);
        self
    }

    pub fn containing(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn matches(&self, document: &Document) -> bool {
        let archived_ok = match self.archived {
            ArchivedFilter::Exclude => !document.archived,
            ArchivedFilter::Only => document.archived,
            ArchivedFilter::Include => true,
        };
        if !archived_ok {
            return false;
        }
        if self.label.is_some() && document.label != self.label {
            return false;
        }
        if self.tree.is_some() && document.tree() != self.tree {
            return false;
        }
        match self.needle() {
            Some(needle) => {
                document.display_name.to_lowercase().contains(&needle)
                    || document.content.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }

    /// Filters and sorts `documents`.
    pub fn apply<'a>(&self, documents: impl IntoIterator<Item = &'a Document>) -> Vec<Document> {
        let mut selected: Vec<Document> = documents
            .into_iter()
            .filter(|d| self.matches(d))
            .cloned()
            .collect();
        selected.sort_by(|a, b| self.compare(a, b));
        selected
    }

    fn needle(&self) -> Option<String> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
    }

    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        if self.pinned_first && a.pinned != b.pinned {
            return b.pinned.cmp(&a.pinned);
        }
        let ordering = match self.sort {
            SortKey::Name => {
                let (a, b) = (a.display_name.to_lowercase(), b.display_name.to_lowercase());
                directed(self.order, a.cmp(&b))
            }
            SortKey::Color => directed(self.order, a.color.cmp(&b.color)),
            SortKey::CreatedAt => nulls_last(self.order, a.created_at, b.created_at),
            SortKey::LastOpened => nulls_last(self.order, a.last_opened_at, b.last_opened_at),
        };
        ordering.then_with(|| a.uri.cmp(&b.uri))
    }
}

fn directed(order: SortOrder, ordering: Ordering) -> Ordering {
    match order {
        SortOrder::Ascending => ordering,
        SortOrder::Descending => ordering.reverse(),
    }
}

fn nulls_last<T: Ord>(order: SortOrder, a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => directed(order, a.cmp(&b)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::*;
    use crate::model::Origin;
    use crate::uri::Uri;

    fn doc(name: &str, content: &str) -> Document {
        let uri = Uri::parse(&format!("file:///notes/{name}")).unwrap();
        Document::new(uri, name.into(), content.into(), Origin::Independent)
    }

    fn names(docs: &[Document]) -> Vec<&str> {
        docs.iter().map(|d| d.display_name.as_str()).collect()
    }

    #[test]
    fn default_query_hides_archived_and_puts_pinned_first() {
        let a = doc("alpha.md", "");
        let mut b = doc("Beta.md", "");
        b.pinned = true;
        let mut c = doc("charlie.md", "");
        c.archived = true;
        let d = doc("delta.md", "");

        let result = DocumentQuery::default().apply([&a, &b, &c, &d]);
        assert_eq!(names(&result), vec!["Beta.md", "alpha.md", "delta.md"]);
    }

    #[test]
    fn name_sort_ignores_case_and_can_be_reversed() {
        let docs = [doc("b.md", ""), doc("A.md", ""), doc("c.md", "")];
        let query = DocumentQuery::default()
            .sorted_by(SortKey::Name, SortOrder::Descending);
        assert_eq!(names(&query.apply(&docs)), vec!["c.md", "b.md", "A.md"]);
    }

    #[test]
    fn never_opened_documents_sort_last_in_both_orders() {
        let now = Utc::now();
        let mut old = doc("old.md", "");
        old.last_opened_at = Some(now - Duration::days(2));
        let mut recent = doc("recent.md", "");
        recent.last_opened_at = Some(now);
        let never = doc("never.md", "");
        let docs = [never, old, recent];

        let asc = DocumentQuery::default()
            .sorted_by(SortKey::LastOpened, SortOrder::Ascending);
        assert_eq!(
            names(&asc.apply(&docs)),
            vec!["old.md", "recent.md", "never.md"]
        );

        let desc = DocumentQuery::default()
            .sorted_by(SortKey::LastOpened, SortOrder::Descending);
        assert_eq!(
            names(&desc.apply(&docs)),
            vec!["recent.md", "old.md", "never.md"]
        );
    }

    #[test]
    fn text_filter_searches_name_and_content() {
        let docs = [
            doc("groceries.md", "milk, eggs"),
            doc("todo.md", "Buy MILK"),
            doc("other.md", ""),
        ];
        let result = DocumentQuery::default().containing("milk").apply(&docs);
        assert_eq!(names(&result), vec!["groceries.md", "todo.md"]);

        let blank = DocumentQuery::default().containing("   ").apply(&docs);
        assert_eq!(blank.len(), 3);
    }

    #[test]
    fn label_tree_and_archive_filters_combine() {
        let label = LabelId::new();
        let tree = TreeId::new();
        let mut a = doc("a.md", "");
        a.label = Some(label);
        a.origin = Origin::Tree(tree);
        let mut b = doc("b.md", "");
        b.label = Some(label);
        b.archived = true;
        let c = doc("c.md", "");
        let docs = [a, b, c];

        let labelled = DocumentQuery::default()
            .with_label(label)
            .archived(ArchivedFilter::Include);
        assert_eq!(names(&labelled.apply(&docs)), vec!["a.md", "b.md"]);

        let archived = DocumentQuery::default().archived(ArchivedFilter::Only);
        assert_eq!(names(&archived.apply(&docs)), vec!["b.md"]);

        let in_tree = DocumentQuery::default().in_tree(tree);
        assert_eq!(names(&in_tree.apply(&docs)), vec!["a.md"]);
    }
}
