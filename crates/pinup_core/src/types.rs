//! Core type definitions for the vault.
//!
//! These are the records that cross the request surface. Identifiers are
//! opaque strings, timestamps are epoch milliseconds and the pinned/archived
//! flags travel as `0`/`1`.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

/// A stored text artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    /// Opaque unique id.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Content.
    pub body: String,
    /// Language hint (e.g. `rust`, `plaintext`).
    pub language: Option<String>,
    /// Where the snippet came from.
    pub source: Option<String>,
    /// Link back to the origin.
    pub source_url: Option<String>,
    /// Pinned to the top of listings.
    #[serde(with = "flag")]
    pub pinned: bool,
    /// Hidden from default listings and search.
    #[serde(with = "flag")]
    pub archived: bool,
    /// SHA-256 of the body, hex encoded.
    pub content_hash: String,
    /// Normalized names of attached tags.
    pub tags: Vec<String>,
    /// Names of collections containing the snippet.
    pub collections: Vec<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time, never earlier than `created_at`.
    pub updated_at: Timestamp,
}

/// A label attached to snippets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Opaque unique id.
    pub id: String,
    /// Trimmed, lowercased name.
    pub name: String,
    /// Hex color.
    pub color: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Number of snippets carrying the tag.
    #[serde(default)]
    pub snippet_count: u64,
}

/// A named group of snippets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    /// Opaque unique id.
    pub id: String,
    /// Name, unique ignoring case.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Icon identifier.
    pub icon: Option<String>,
    /// Hex color.
    pub color: Option<String>,
    /// Creation time.
    pub created_at: Timestamp,
    /// Last modification time.
    pub updated_at: Timestamp,
    /// Number of snippets in the collection.
    #[serde(default)]
    pub snippet_count: u64,
}

/// Input for creating a snippet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewSnippet {
    /// Optional title; derived from the body when absent.
    pub title: Option<String>,
    /// Required content.
    pub body: String,
    /// Language hint.
    pub language: Option<String>,
    /// Origin label.
    pub source: Option<String>,
    /// Origin link.
    pub source_url: Option<String>,
    /// Tag names; unknown names are created.
    pub tags: Vec<String>,
    /// Collection names; unknown names are created.
    pub collections: Vec<String>,
}

impl NewSnippet {
    /// Creates input with just a body.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Sets the title.
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Sets the source label.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Sets the language.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Adds a tag name.
    #[must_use]
    pub fn tag(mut self, name: impl Into<String>) -> Self {
        self.tags.push(name.into());
        self
    }

    /// Adds a collection name.
    #[must_use]
    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }
}

/// Partial update of a snippet. `None` fields are left untouched.
///
/// When `tags` or `collections` is present it replaces the whole set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetPatch {
    /// New title.
    pub title: Option<String>,
    /// New body.
    pub body: Option<String>,
    /// New language.
    pub language: Option<String>,
    /// New source label.
    pub source: Option<String>,
    /// New source link.
    pub source_url: Option<String>,
    /// Replacement tag set.
    pub tags: Option<Vec<String>>,
    /// Replacement collection set.
    pub collections: Option<Vec<String>>,
}

/// Filters for listing snippets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnippetFilter {
    /// Only snippets carrying this tag (case-insensitive).
    pub tag: Option<String>,
    /// Only snippets in this collection (case-insensitive).
    pub collection: Option<String>,
    /// Only pinned / unpinned snippets.
    pub pinned: Option<bool>,
    /// Only archived / live snippets.
    pub archived: Option<bool>,
}

/// One page of results plus the unpaginated total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total matching items ignoring limit/offset.
    pub total: u64,
    /// Applied limit.
    pub limit: u32,
    /// Applied offset.
    pub offset: u32,
}

/// Input for creating a tag directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewTag {
    /// Name; trimmed and lowercased before storage.
    pub name: String,
    /// Hex color.
    pub color: Option<String>,
}

/// Partial update of a tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagPatch {
    /// New name.
    pub name: Option<String>,
    /// New color.
    pub color: Option<String>,
}

/// Input for creating a collection directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewCollection {
    /// Name; trimmed before storage.
    pub name: String,
    /// Description.
    pub description: Option<String>,
    /// Icon identifier.
    pub icon: Option<String>,
    /// Hex color.
    pub color: Option<String>,
}

/// Partial update of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionPatch {
    /// New name.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New icon.
    pub icon: Option<String>,
    /// New color.
    pub color: Option<String>,
}

/// Serializes a `bool` as `0`/`1` and accepts either form when reading.
pub mod flag {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Writes `true` as `1` and `false` as `0`.
    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    /// Reads `0`/`1` or a JSON boolean.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Int(i64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bool(b) => b,
            Raw::Int(i) => i != 0,
        })
    }
}
