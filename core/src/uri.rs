//! Opaque document URIs and the best-effort path keys used to compare them.
//!
//! Providers hand out URIs whose layout is not standardized. The same physical file
//! can be reachable through several URIs, e.g. picked on its own
//! (`content://auth/document/primary%3ANotes%2Fa.md`) or discovered below a linked
//! directory (`content://auth/tree/primary%3ANotes/document/primary%3ANotes%2Fa.md`).
//! [`PathKey`] reduces a URI to a comparable, slash-separated path so that such
//! aliases can be recognized, and so that directory URIs can be tested for nesting.
//!
//! # Key derivation
//!
//! * `content://` URIs: the percent-decoded id following the *last* `document` or
//!   `tree` path segment, with a leading volume prefix (`primary:`, `1A2B-3C4D:`)
//!   removed.
//! * Every other scheme (notably `file://`): the percent-decoded URI path.
//!
//! In both cases backslashes become `/`, empty and `.` segments are dropped, and the
//! key carries the scheme and authority it was derived from. Keys from different
//! providers never match.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

static VOLUME_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*:").unwrap());

/// Identifier of an external document or directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Uri(Url);

impl Uri {
    /// Parses an absolute URI string.
    pub fn parse(input: &str) -> Result<Self> {
        Url::parse(input).map(Uri).map_err(|e| Error::InvalidUri {
            input: input.to_string(),
            reason: e.to_string(),
        })
    }

    /// Builds a `file://` URI from an absolute filesystem path.
    pub fn from_file_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        Url::from_file_path(path).map(Uri).map_err(|()| Error::InvalidUri {
            input: path.display().to_string(),
            reason: "path is not absolute".to_string(),
        })
    }

    /// Returns the filesystem path for `file://` URIs.
    pub fn to_file_path(&self) -> Option<PathBuf> {
        if self.0.scheme() == "file" {
            self.0.to_file_path().ok()
        } else {
            None
        }
    }

    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }

    pub fn path_key(&self) -> PathKey {
        PathKey::from_uri(self)
    }
}

impl From<Url> for Uri {
    fn from(url: Url) -> Self {
        Uri(url)
    }
}

impl FromStr for Uri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uri::parse(s)
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Comparable path derived from a [`Uri`]. See the module docs for the derivation rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathKey {
    provider: String,
    path: String,
}

impl PathKey {
    pub fn from_uri(uri: &Uri) -> Self {
        let url = uri.as_url();
        let provider = format!("{}://{}", url.scheme(), url.host_str().unwrap_or(""));

        let raw = if url.scheme() == "content" {
            match content_document_id(url) {
                Some(id) => VOLUME_PREFIX.replace(&id, "").into_owned(),
                None => decode(url.path()),
            }
        } else {
            decode(url.path())
        };

        PathKey {
            provider,
            path: normalize(&raw),
        }
    }

    /// The normalized path, without provider.
    pub fn as_str(&self) -> &str {
        &self.path
    }

    /// True if both keys name the same file of the same provider.
    ///
    /// An empty path identifies nothing in particular and never matches.
    pub fn matches(&self, other: &PathKey) -> bool {
        !self.path.is_empty() && self.provider == other.provider && self.path == other.path
    }

    /// True if `other` is this key or lies below it at a segment boundary.
    ///
    /// `Notes` contains `Notes` and `Notes/a.md`, but not `Notes2/a.md`.
    pub fn contains(&self, other: &PathKey) -> bool {
        if self.provider != other.provider {
            return false;
        }
        if self.path.is_empty() {
            return true;
        }
        match other.path.strip_prefix(&self.path) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.rsplit('/').next().filter(|s| !s.is_empty())
    }

    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// True if any segment is a dot-file or dot-directory.
    pub fn is_hidden(&self) -> bool {
        self.segments().any(|s| s.starts_with('.'))
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.path)
    }
}

/// Id following the last `document` or `tree` segment of a content URI, decoded.
fn content_document_id(url: &Url) -> Option<String> {
    let segments: Vec<&str> = url.path_segments()?.collect();
    segments
        .windows(2)
        .rev()
        .find(|pair| pair[0] == "document" || pair[0] == "tree")
        .map(|pair| decode(pair[1]))
}

/// Percent-decodes `raw` without losing information: bytes that are not valid UTF-8
/// stay escaped as `%XX`, and so does a decoded `%`, so distinct byte strings always
/// yield distinct results.
fn decode(raw: &str) -> String {
    let bytes: Vec<u8> = percent_decode_str(raw).collect();
    let mut decoded = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        for c in chunk.valid().chars() {
            match c {
                '%' => decoded.push_str("%25"),
                c => decoded.push(c),
            }
        }
        for byte in chunk.invalid() {
            decoded.push_str(&format!("%{byte:02X}"));
        }
    }
    decoded
}

fn normalize(raw: &str) -> String {
    raw.replace('\\', "/")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> PathKey {
        Uri::parse(s).unwrap().path_key()
    }

    #[test]
    fn content_document_and_tree_child_share_a_key() {
        let picked = key("content://com.example.docs/document/primary%3ANotes%2Fa.md");
        let discovered = key(
            "content://com.example.docs/tree/primary%3ANotes/document/primary%3ANotes%2Fa.md",
        );
        assert_eq!(picked.as_str(), "Notes/a.md");
        assert!(picked.matches(&discovered));
    }

    #[test]
    fn tree_uri_key_strips_volume() {
        let tree = key(
            "content://com.android.externalstorage.documents/tree/1A2B-3C4D%3ABooks%2FDrafts",
        );
        assert_eq!(tree.as_str(), "Books/Drafts");
        assert_eq!(tree.file_name(), Some("Drafts"));
    }

    #[test]
    fn file_uri_key_is_decoded_path() {
        let k = key("file:///home/me/My%20Notes/a.md");
        assert_eq!(k.as_str(), "home/me/My Notes/a.md");
        assert_eq!(k.file_name(), Some("a.md"));
    }

    #[test]
    fn undecodable_names_keep_distinct_keys() {
        let ff = key("file:///data/%FF.md");
        let fe = key("file:///data/%FE.md");
        assert_eq!(ff.as_str(), "data/%FF.md");
        assert!(!ff.matches(&fe));
        assert!(ff.matches(&key("file:///data/%ff.md")));

        // A literal "%FF.md" is a different file again.
        let literal = key("file:///data/%25FF.md");
        assert_eq!(literal.as_str(), "data/%25FF.md");
        assert!(!literal.matches(&ff));

        let picked = key("content://p/document/primary%3ANotes%2F%FF.md");
        let discovered = key("content://p/tree/primary%3ANotes/document/primary%3ANotes%2F%FE.md");
        assert!(!picked.matches(&discovered));
    }

    #[test]
    fn contains_respects_segment_boundaries() {
        let notes = key("file:///data/Notes");
        assert!(notes.contains(&key("file:///data/Notes")));
        assert!(notes.contains(&key("file:///data/Notes/sub/a.md")));
        assert!(!notes.contains(&key("file:///data/Notes2/a.md")));
        assert!(!key("file:///data/Notes/sub").contains(&notes));
    }

    #[test]
    fn keys_from_different_providers_never_match() {
        let a = key("content://one.provider/document/primary%3ANotes%2Fa.md");
        let b = key("content://other.provider/document/primary%3ANotes%2Fa.md");
        assert!(!a.matches(&b));
        assert!(!a.contains(&b));
    }

    #[test]
    fn hidden_segments_are_detected() {
        assert!(key("file:///data/.git/config").is_hidden());
        assert!(!key("file:///data/notes/a.md").is_hidden());
    }

    #[test]
    fn invalid_input_is_rejected() {
        assert!(matches!(Uri::parse("not a uri"), Err(Error::InvalidUri { .. })));
        assert!(matches!(
            Uri::from_file_path("relative/path"),
            Err(Error::InvalidUri { .. })
        ));
    }
}
