//! In-memory views over the note store and the write-back contract.
//!
//! The report engine never talks to persistence directly. It works on a
//! [`NoteMap`] snapshot, collects its mutations into a [`WriteBatch`] and
//! leaves it to a [`NoteStore`] to persist them and to an [`EventSink`] to
//! hear about them.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use anyhow::Result;
use tracing::{debug, info};

use crate::models::{Note, NoteKey};

/// Ordered mapping from note key to note.
///
/// Iteration follows insertion order, which is the order the store listed
/// the notes in.
#[derive(Debug, Clone, Default)]
pub struct NoteMap {
    notes: Vec<Note>,
    index: HashMap<NoteKey, usize>,
}

impl NoteMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a note, replacing any note with the same key in place.
    pub fn insert(&mut self, note: Note) {
        match self.index.get(&note.key) {
            Some(&position) => self.notes[position] = note,
            None => {
                self.index.insert(note.key.clone(), self.notes.len());
                self.notes.push(note);
            }
        }
    }

    pub fn get(&self, key: &NoteKey) -> Option<&Note> {
        self.index.get(key).map(|&position| &self.notes[position])
    }

    pub fn get_mut(&mut self, key: &NoteKey) -> Option<&mut Note> {
        let position = *self.index.get(key)?;
        self.notes.get_mut(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Note> {
        self.notes.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Note> {
        self.notes.iter_mut()
    }

    pub fn keys(&self) -> impl Iterator<Item = &NoteKey> {
        self.notes.iter().map(|note| &note.key)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// First non-trashed note with exactly this title.
    pub fn find_by_title(&self, title: &str) -> Option<&Note> {
        self.notes
            .iter()
            .find(|note| !note.is_trashed && note.title == title)
    }

    /// Key of the first non-trashed note with exactly this title.
    pub fn key_for_title(&self, title: &str) -> Option<NoteKey> {
        self.find_by_title(title).map(|note| note.key.clone())
    }
}

impl FromIterator<Note> for NoteMap {
    fn from_iter<I: IntoIterator<Item = Note>>(iter: I) -> Self {
        let mut map = NoteMap::new();
        for note in iter {
            map.insert(note);
        }
        map
    }
}

/// Mapping from tag string to the keys of the notes carrying it.
#[derive(Debug, Clone, Default)]
pub struct TagIndex {
    tags: HashMap<String, BTreeSet<NoteKey>>,
}

impl TagIndex {
    /// Indexes the tags of every non-trashed note.
    pub fn build(notes: &NoteMap) -> Self {
        let mut tags: HashMap<String, BTreeSet<NoteKey>> = HashMap::new();
        for note in notes.iter().filter(|note| !note.is_trashed) {
            for tag in &note.tags {
                tags.entry(tag.clone()).or_default().insert(note.key.clone());
            }
        }
        Self { tags }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains_key(tag)
    }

    /// Keys of notes tagged with `tag`, empty if the tag is unknown.
    pub fn notes_for(&self, tag: &str) -> impl Iterator<Item = &NoteKey> {
        self.tags.get(tag).into_iter().flatten()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// Pending note writes, at most one per note key.
///
/// Staging a note that is already queued replaces the queued state, so each
/// key is written once with its final content.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    pending: BTreeMap<NoteKey, Note>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the current state of a note.
    pub fn stage(&mut self, note: &Note) {
        debug!(note_key = %note.key, "staging note write");
        self.pending.insert(note.key.clone(), note.clone());
    }

    pub fn get(&self, key: &NoteKey) -> Option<&Note> {
        self.pending.get(key)
    }

    pub fn contains(&self, key: &NoteKey) -> bool {
        self.pending.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &NoteKey> {
        self.pending.keys()
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.pending.values()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Signals emitted after notes are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A single note was written.
    NoteUpdated(NoteKey),
    /// Views listing notes should reload.
    RefreshNotes,
}

/// Receiver of store events.
pub trait EventSink {
    fn emit(&mut self, event: StoreEvent);
}

impl EventSink for Vec<StoreEvent> {
    fn emit(&mut self, event: StoreEvent) {
        self.push(event);
    }
}

/// Event sink that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&mut self, event: StoreEvent) {
        match event {
            StoreEvent::NoteUpdated(key) => info!(note_key = %key, "note updated"),
            StoreEvent::RefreshNotes => debug!("refresh notes"),
        }
    }
}

/// Persistence contract the engine runs against.
pub trait NoteStore {
    /// Snapshot of every note, in store order.
    fn note_map(&self) -> Result<NoteMap>;

    /// Persists the content, tags and trash flag of an existing note.
    fn update_note(&self, note: &Note) -> Result<Note>;

    /// Removes a note permanently.
    fn delete_note(&self, key: &NoteKey) -> Result<()>;

    /// Persists every note of a batch.
    ///
    /// The default writes notes one after another; stores with transactions
    /// should override it so a batch lands entirely or not at all.
    fn write_batch(&self, batch: &WriteBatch) -> Result<Vec<Note>> {
        batch.notes().map(|note| self.update_note(note)).collect()
    }
}

/// Writes a batch and emits one `NoteUpdated` per note plus a final
/// `RefreshNotes`. Empty batches write and emit nothing.
pub fn commit<S: NoteStore + ?Sized>(
    store: &S,
    batch: &WriteBatch,
    sink: &mut dyn EventSink,
) -> Result<Vec<Note>> {
    if batch.is_empty() {
        debug!("nothing to write");
        return Ok(Vec::new());
    }

    let written = store.write_batch(batch)?;
    info!(count = written.len(), "wrote notes");

    for note in &written {
        sink.emit(StoreEvent::NoteUpdated(note.key.clone()));
    }
    sink.emit(StoreEvent::RefreshNotes);

    Ok(written)
}
