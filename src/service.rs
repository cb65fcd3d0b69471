use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use rusqlite::OptionalExtension;
use time::{Date, OffsetDateTime};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::store::{self, EventSink, NoteMap, NoteStore, WriteBatch};
use crate::tea::{self, RemainingSummary, ReportError};
use crate::title::find_note_title;
use crate::{Database, Note, NoteBuilder, NoteKey, TagQuery};

/// Row of the `notes` table before its tags are attached.
struct NoteRow {
    key: String,
    storage: String,
    folder: String,
    content: String,
    is_trashed: bool,
    created_at: i64,
    updated_at: i64,
}

impl NoteRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            storage: row.get(1)?,
            folder: row.get(2)?,
            content: row.get(3)?,
            is_trashed: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn into_note(self, tags: Vec<String>) -> Result<Note> {
        Ok(NoteBuilder::new()
            .key(self.key)
            .storage(self.storage)
            .folder(self.folder)
            .content(self.content)
            .tags(tags)
            .trashed(self.is_trashed)
            .created_at(OffsetDateTime::from_unix_timestamp(self.created_at)?)
            .updated_at(OffsetDateTime::from_unix_timestamp(self.updated_at)?)
            .build())
    }
}

const NOTE_COLUMNS: &str = "key, storage, folder, content, is_trashed, created_at, updated_at";

/// Service layer providing note management operations.
///
/// NoteService owns a Database instance, provides CRUD over notes and their
/// ordered tags, and runs the report engine against the stored notes.
///
/// # Examples
///
/// ```
/// use steep::{Database, NoteService};
///
/// # fn main() -> anyhow::Result<()> {
/// let db = Database::in_memory()?;
/// let service = NoteService::new(db);
/// # Ok(())
/// # }
/// ```
pub struct NoteService {
    db: Database,
}

impl NoteService {
    /// Creates a new NoteService with the given database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns a reference to the underlying database.
    ///
    /// Useful for testing or advanced operations that need direct database access.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Runs `f` inside a transaction, rolling back if it fails.
    fn in_transaction<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let conn = self.db.connection();
        conn.execute("BEGIN TRANSACTION", [])?;

        match f() {
            Ok(value) => {
                conn.execute("COMMIT", [])?;
                Ok(value)
            }
            Err(e) => {
                conn.execute("ROLLBACK", []).ok();
                Err(e)
            }
        }
    }

    /// Creates a new note with the given content and tags.
    ///
    /// The key is derived from the content and the creation time. Duplicate
    /// tags keep their first position.
    ///
    /// # Examples
    ///
    /// ```
    /// use steep::{Database, NoteService};
    ///
    /// # fn main() -> anyhow::Result<()> {
    /// let service = NoteService::new(Database::in_memory()?);
    ///
    /// let note = service.create_note("# Sencha\n", &["`green", "Japan"])?;
    /// assert_eq!(note.title, "Sencha");
    /// assert_eq!(note.tags, vec!["`green", "Japan"]);
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_note(&self, content: &str, tags: &[&str]) -> Result<Note> {
        if content.trim().is_empty() {
            anyhow::bail!("Note content cannot be empty");
        }

        let now = OffsetDateTime::now_utc();
        let timestamp = now.unix_timestamp();
        let key = NoteKey::generate(content, now.unix_timestamp_nanos());
        let title = find_note_title(content).unwrap_or_default();
        let tags = dedup_tags(tags.iter().copied());

        self.in_transaction(|| {
            self.db.connection().execute(
                "INSERT INTO notes (key, title, content, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?4)",
                (key.as_str(), &title, content, timestamp),
            )?;
            self.set_note_tags(&key, &tags)?;

            Ok(NoteBuilder::new()
                .key(key.clone())
                .content(content)
                .tags(tags.clone())
                .created_at(OffsetDateTime::from_unix_timestamp(timestamp)?)
                .updated_at(OffsetDateTime::from_unix_timestamp(timestamp)?)
                .build())
        })
    }

    /// Retrieves a note by its key.
    ///
    /// Returns `None` if no note exists with the given key. This is not
    /// considered an error condition.
    pub fn get_note(&self, key: &NoteKey) -> Result<Option<Note>> {
        let conn = self.db.connection();

        let row = conn
            .query_row(
                &format!("SELECT {NOTE_COLUMNS} FROM notes WHERE key = ?1"),
                [key.as_str()],
                NoteRow::from_row,
            )
            .optional()?;

        match row {
            Some(row) => {
                let tags = self.note_tags(key)?;
                Ok(Some(row.into_note(tags)?))
            }
            None => Ok(None),
        }
    }

    /// Lists non-trashed notes matched by `query`, oldest first.
    ///
    /// An empty query lists every non-trashed note.
    pub fn list_notes(&self, query: &TagQuery) -> Result<Vec<Note>> {
        let notes = self.note_map()?;
        Ok(query.matching_notes(&notes).cloned().collect())
    }

    /// Persists the content, tags and trash flag of an existing note.
    ///
    /// Returns the stored note with its title re-derived and `updated_at`
    /// set to now. Fails if no note has this key.
    pub fn update_note(&self, note: &Note) -> Result<Note> {
        self.in_transaction(|| self.write_note(note))
    }

    /// Moves a note to the trash.
    pub fn trash_note(&self, key: &NoteKey) -> Result<Note> {
        let mut note = self
            .get_note(key)?
            .with_context(|| format!("Note not found: {key}"))?;
        note.is_trashed = true;
        self.update_note(&note)
    }

    /// Deletes a note by its key.
    ///
    /// This operation is idempotent: deleting a non-existent note returns
    /// `Ok(())` without error. Foreign key constraints remove the note's tag
    /// associations.
    pub fn delete_note(&self, key: &NoteKey) -> Result<()> {
        self.db
            .connection()
            .execute("DELETE FROM notes WHERE key = ?1", [key.as_str()])?;
        Ok(())
    }

    /// Snapshot of every note, trashed ones included, in creation order.
    pub fn note_map(&self) -> Result<NoteMap> {
        Ok(self.load_notes()?.into_iter().collect())
    }

    /// Remaining stock of the non-trashed notes matched by `query`.
    pub fn remaining_summary(&self, query: &TagQuery) -> Result<RemainingSummary> {
        let notes = self.list_notes(query)?;
        Ok(tea::remaining_summary(&notes))
    }

    /// Regenerates consumption reports for the given two-digit years, or for
    /// every year found in the brew logs when `years` is empty.
    pub fn generate_consumption(
        &self,
        config: &EngineConfig,
        years: &[u8],
        sink: &mut dyn EventSink,
    ) -> Result<Vec<Note>> {
        self.run_engine(sink, |notes| {
            tea::generate_selected_consumption(notes, config, years)
        })
    }

    /// Regenerates the consumption report of the year of `today`.
    pub fn generate_current_consumption(
        &self,
        config: &EngineConfig,
        today: Date,
        sink: &mut dyn EventSink,
    ) -> Result<Vec<Note>> {
        self.run_engine(sink, |notes| {
            tea::generate_current_consumption(notes, config, today)
        })
    }

    /// Adds today's snapshot to the reserve report.
    pub fn generate_reserve(
        &self,
        config: &EngineConfig,
        today: Date,
        sink: &mut dyn EventSink,
    ) -> Result<Vec<Note>> {
        self.run_engine(sink, |notes| tea::generate_reserve(notes, config, today))
    }

    /// Regenerates the purchase report.
    pub fn generate_purchase(
        &self,
        config: &EngineConfig,
        today: Date,
        sink: &mut dyn EventSink,
    ) -> Result<Vec<Note>> {
        self.run_engine(sink, |notes| tea::generate_purchase(notes, config, today))
    }

    /// Back-propagates mix brews into their ingredient notes.
    pub fn update_mixes(&self, sink: &mut dyn EventSink) -> Result<Vec<Note>> {
        self.run_engine(sink, |notes| {
            let mut batch = WriteBatch::new();
            tea::update_mixes(notes, &mut batch);
            Ok(batch)
        })
    }

    /// Brings remaining annotations and derived tags up to date.
    pub fn update_remaining(
        &self,
        config: &EngineConfig,
        today: Date,
        sink: &mut dyn EventSink,
    ) -> Result<Vec<Note>> {
        self.run_engine(sink, |notes| {
            let mut batch = WriteBatch::new();
            tea::update_all_remaining(notes, &mut batch, today, config.tolerance);
            Ok(batch)
        })
    }

    /// Runs one engine pass over a fresh snapshot and commits its batch.
    fn run_engine(
        &self,
        sink: &mut dyn EventSink,
        generate: impl FnOnce(&mut NoteMap) -> Result<WriteBatch, ReportError>,
    ) -> Result<Vec<Note>> {
        let mut notes = self.note_map()?;
        let batch = generate(&mut notes)?;
        store::commit(self, &batch, sink)
    }

    /// Updates one note without opening a transaction.
    fn write_note(&self, note: &Note) -> Result<Note> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let title = find_note_title(&note.content).unwrap_or_default();

        let changed = self.db.connection().execute(
            "UPDATE notes SET title = ?1, content = ?2, is_trashed = ?3, updated_at = ?4
             WHERE key = ?5",
            (&title, &note.content, note.is_trashed, now, note.key.as_str()),
        )?;
        if changed == 0 {
            anyhow::bail!("Note not found: {}", note.key);
        }

        let tags = dedup_tags(note.tags.iter().map(String::as_str));
        self.set_note_tags(&note.key, &tags)?;
        debug!(note_key = %note.key, "note written");

        let mut written = note.clone();
        written.title = title;
        written.tags = tags;
        written.updated_at = OffsetDateTime::from_unix_timestamp(now)?;
        Ok(written)
    }

    /// Returns the id of the tag with this exact name, creating it if needed.
    fn get_or_create_tag(&self, name: &str) -> Result<i64> {
        let conn = self.db.connection();

        if let Some(id) = conn
            .query_row("SELECT id FROM tags WHERE name = ?1", [name], |row| row.get(0))
            .optional()?
        {
            return Ok(id);
        }

        conn.execute("INSERT INTO tags (name) VALUES (?1)", [name])?;
        Ok(conn.last_insert_rowid())
    }

    /// Replaces the tags of a note, keeping their order.
    fn set_note_tags(&self, key: &NoteKey, tags: &[String]) -> Result<()> {
        let conn = self.db.connection();
        conn.execute("DELETE FROM note_tags WHERE note_key = ?1", [key.as_str()])?;

        for (position, tag) in tags.iter().enumerate() {
            let tag_id = self.get_or_create_tag(tag)?;
            conn.execute(
                "INSERT INTO note_tags (note_key, tag_id, position) VALUES (?1, ?2, ?3)",
                (key.as_str(), tag_id, position as i64),
            )?;
        }
        Ok(())
    }

    fn note_tags(&self, key: &NoteKey) -> Result<Vec<String>> {
        let mut stmt = self.db.connection().prepare(
            "SELECT t.name FROM note_tags nt
             JOIN tags t ON t.id = nt.tag_id
             WHERE nt.note_key = ?1
             ORDER BY nt.position",
        )?;
        let tags = stmt
            .query_map([key.as_str()], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(tags)
    }

    /// Loads every note with its tags in two queries.
    fn load_notes(&self) -> Result<Vec<Note>> {
        let conn = self.db.connection();

        let mut tag_stmt = conn.prepare(
            "SELECT nt.note_key, t.name FROM note_tags nt
             JOIN tags t ON t.id = nt.tag_id
             ORDER BY nt.note_key, nt.position",
        )?;
        let mut tags: HashMap<String, Vec<String>> = HashMap::new();
        let tag_rows = tag_stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in tag_rows {
            let (key, name) = row?;
            tags.entry(key).or_default().push(name);
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTE_COLUMNS} FROM notes ORDER BY created_at, rowid"
        ))?;
        let rows = stmt
            .query_map([], NoteRow::from_row)?
            .collect::<rusqlite::Result<Vec<NoteRow>>>()?;

        rows.into_iter()
            .map(|row| {
                let note_tags = tags.remove(&row.key).unwrap_or_default();
                row.into_note(note_tags)
            })
            .collect()
    }
}

impl NoteStore for NoteService {
    fn note_map(&self) -> Result<NoteMap> {
        NoteService::note_map(self)
    }

    fn update_note(&self, note: &Note) -> Result<Note> {
        NoteService::update_note(self, note)
    }

    fn delete_note(&self, key: &NoteKey) -> Result<()> {
        NoteService::delete_note(self, key)
    }

    /// Writes the whole batch in one transaction.
    fn write_batch(&self, batch: &WriteBatch) -> Result<Vec<Note>> {
        let written = self.in_transaction(|| {
            batch
                .notes()
                .map(|note| self.write_note(note))
                .collect::<Result<Vec<Note>>>()
        })?;
        info!(count = written.len(), "batch committed");
        Ok(written)
    }
}

/// Removes repeated tags, keeping the first occurrence of each.
fn dedup_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .filter(|tag| seen.insert(*tag))
        .map(String::from)
        .collect()
}

#[cfg(test)]
#[path = "service/tests.rs"]
mod tests;
