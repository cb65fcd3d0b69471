use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Unique identifier for a note.
///
/// Keys are opaque strings owned by the note store. Wrapping them keeps note
/// keys from being mixed up with tag names or titles, which are strings too.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteKey(String);

impl NoteKey {
    /// Creates a note key from an existing identifier.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derives a fresh key from note content and a nanosecond timestamp.
    ///
    /// The key is the first 20 hex digits of the SHA-256 digest.
    pub fn generate(content: &str, nanos: i128) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hasher.update(nanos.to_le_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(digest[..20].to_string())
    }

    /// Returns the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NoteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for NoteKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl From<&str> for NoteKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_key_serializes_as_raw_string() {
        let key = NoteKey::new("a1b2c3");
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, r#""a1b2c3""#);

        let deserialized: NoteKey = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, key);
    }

    #[test]
    fn generated_keys_are_twenty_hex_digits() {
        let key = NoteKey::generate("# Sencha", 42);
        assert_eq!(key.as_str().len(), 20);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_keys_differ_by_timestamp() {
        let first = NoteKey::generate("# Sencha", 1);
        let second = NoteKey::generate("# Sencha", 2);
        assert_ne!(first, second);
    }
}
