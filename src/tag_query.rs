//! Include/exclude tag filters.
//!
//! A query is written as space-separated terms, `+tag` to require a tag and
//! `-tag` to forbid it, optionally behind a `/tags/` route prefix:
//!
//! ```
//! use steep::TagQuery;
//!
//! let query = TagQuery::parse("/tags/+`green -⃠⃠⃠");
//! assert!(query.is_matched_by(&["`green".to_string(), "Japan".to_string()]));
//! assert!(!query.is_matched_by(&["`green".to_string(), "⃠⃠⃠".to_string()]));
//! assert_eq!(query.to_string(), "+`green -⃠⃠⃠");
//! ```

use std::fmt;

use crate::models::Note;
use crate::store::NoteMap;

const ROUTE_PREFIX: &str = "/tags/";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagQuery {
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl TagQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `+tag -tag ...`; terms without a sign are ignored.
    pub fn parse(path: &str) -> Self {
        let terms = path.strip_prefix(ROUTE_PREFIX).unwrap_or(path);
        let mut query = Self::new();

        for term in terms.split(' ') {
            if let Some(tag) = term.strip_prefix('+') {
                query.includes.push(tag.to_string());
            } else if let Some(tag) = term.strip_prefix('-') {
                query.excludes.push(tag.to_string());
            }
        }

        query
    }

    /// Every include present and no exclude present.
    pub fn is_matched_by(&self, tags: &[String]) -> bool {
        self.includes.iter().all(|tag| tags.contains(tag))
            && !self.excludes.iter().any(|tag| tags.contains(tag))
    }

    /// Non-trashed notes matched by the query, in store order.
    pub fn matching_notes<'a>(&'a self, notes: &'a NoteMap) -> impl Iterator<Item = &'a Note> {
        notes
            .iter()
            .filter(move |note| !note.is_trashed && self.is_matched_by(&note.tags))
    }
}

impl fmt::Display for TagQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let terms: Vec<String> = self
            .includes
            .iter()
            .map(|tag| format!("+{tag}"))
            .chain(self.excludes.iter().map(|tag| format!("-{tag}")))
            .collect();
        write!(f, "{}", terms.join(" "))
    }
}
