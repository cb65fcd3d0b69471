use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;

use super::{NoteKey, TagKind};
use crate::title::find_note_title;

/// A note with its content and ordered tags.
///
/// Notes are owned by the note store. The report engine receives them,
/// rewrites `content` and `tags` in place and hands them back for persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier assigned by the store.
    pub key: NoteKey,
    /// Title derived from the content.
    pub title: String,
    /// Raw markdown content.
    pub content: String,
    /// Tags in insertion order.
    pub tags: Vec<String>,
    /// Whether the note sits in the trash.
    pub is_trashed: bool,
    /// Storage the note belongs to.
    pub storage: String,
    /// Folder inside the storage.
    pub folder: String,
    /// When this note was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// When this note was last updated.
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Note {
    /// Returns true if the note carries the given tag.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Returns true if the note carries a "finished" sentinel tag.
    pub fn is_finished(&self) -> bool {
        self.tags
            .iter()
            .any(|t| matches!(TagKind::parse(t), TagKind::Finished))
    }

    /// Replaces the content and re-derives the title from it.
    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
        self.title = find_note_title(&self.content).unwrap_or_default();
    }

    /// SHA-256 over content and tags, used to skip no-op write-backs.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.content.as_bytes());
        for tag in &self.tags {
            hasher.update([0u8]);
            hasher.update(tag.as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Builder for constructing `Note` instances with optional fields.
///
/// # Examples
///
/// ```
/// use steep::NoteBuilder;
///
/// let note = NoteBuilder::new()
///     .key("k1")
///     .content("# Sencha Asahi\n")
///     .tags(["`green", "Japan"])
///     .build();
///
/// assert_eq!(note.title, "Sencha Asahi");
/// assert!(note.has_tag("Japan"));
/// assert!(!note.is_trashed);
/// ```
#[derive(Debug, Default)]
pub struct NoteBuilder {
    key: Option<NoteKey>,
    content: Option<String>,
    tags: Option<Vec<String>>,
    is_trashed: bool,
    storage: Option<String>,
    folder: Option<String>,
    created_at: Option<OffsetDateTime>,
    updated_at: Option<OffsetDateTime>,
}

impl NoteBuilder {
    /// Creates a new `NoteBuilder`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the note key.
    pub fn key(mut self, key: impl Into<NoteKey>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Sets the note content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Sets the tags, keeping their order.
    pub fn tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Marks the note as trashed.
    pub fn trashed(mut self, is_trashed: bool) -> Self {
        self.is_trashed = is_trashed;
        self
    }

    /// Sets the storage id.
    pub fn storage(mut self, storage: impl Into<String>) -> Self {
        self.storage = Some(storage.into());
        self
    }

    /// Sets the folder id.
    pub fn folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = Some(folder.into());
        self
    }

    /// Sets the created timestamp.
    pub fn created_at(mut self, created_at: OffsetDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Sets the updated timestamp.
    pub fn updated_at(mut self, updated_at: OffsetDateTime) -> Self {
        self.updated_at = Some(updated_at);
        self
    }

    /// Builds the `Note`, using defaults for optional fields.
    ///
    /// A missing key is generated from the content; the title is always
    /// derived from the content.
    pub fn build(self) -> Note {
        let now = OffsetDateTime::now_utc();
        let content = self.content.unwrap_or_default();
        let key = self
            .key
            .unwrap_or_else(|| NoteKey::generate(&content, now.unix_timestamp_nanos()));
        let title = find_note_title(&content).unwrap_or_default();

        Note {
            key,
            title,
            content,
            tags: self.tags.unwrap_or_default(),
            is_trashed: self.is_trashed,
            storage: self.storage.unwrap_or_else(|| "default".to_string()),
            folder: self.folder.unwrap_or_else(|| "default".to_string()),
            created_at: self.created_at.unwrap_or(now),
            updated_at: self.updated_at.unwrap_or(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_builder_creates_note_with_default_empty_tags() {
        let note = NoteBuilder::new().key("n1").content("Test note").build();

        assert_eq!(note.key, NoteKey::new("n1"));
        assert_eq!(note.content, "Test note");
        assert_eq!(note.title, "Test note");
        assert!(note.tags.is_empty());
    }

    #[test]
    fn test_note_builder_generates_missing_key() {
        let note = NoteBuilder::new().content("# Gyokuro").build();
        assert_eq!(note.key.as_str().len(), 20);
        assert_eq!(note.title, "Gyokuro");
    }

    #[test]
    fn test_note_serialization_roundtrip() {
        let now = OffsetDateTime::from_unix_timestamp(1_760_000_000).unwrap();
        let note = NoteBuilder::new()
            .key("n1")
            .content("# Test content")
            .tags(["a", "b"])
            .created_at(now)
            .updated_at(now)
            .build();

        let json = serde_json::to_string(&note).unwrap();
        let deserialized: Note = serde_json::from_str(&json).unwrap();

        assert_eq!(note, deserialized);
    }

    #[test]
    fn test_finished_sentinel_in_either_spelling() {
        let crossed = NoteBuilder::new().key("a").tags(["⃠⃠⃠"]).build();
        let boxed = NoteBuilder::new().key("b").tags(["⌧⌧⌧"]).build();
        let open = NoteBuilder::new().key("c").tags(["⚖05"]).build();

        assert!(crossed.is_finished());
        assert!(boxed.is_finished());
        assert!(!open.is_finished());
    }

    #[test]
    fn test_digest_changes_with_tag_order() {
        let a = NoteBuilder::new().key("a").content("x").tags(["1", "2"]).build();
        let b = NoteBuilder::new().key("a").content("x").tags(["2", "1"]).build();
        assert_ne!(a.digest(), b.digest());
        assert_eq!(a.digest(), a.clone().digest());
    }

    #[test]
    fn test_set_content_refreshes_title() {
        let mut note = NoteBuilder::new().key("a").content("# Old").build();
        note.set_content("## New title\nbody");
        assert_eq!(note.title, "New title");
    }
}
