mod schema;

use std::path::Path;

use anyhow::Result;
use rusqlite::Connection;

use schema::INITIAL_SCHEMA;

/// SQLite connection holding notes, tags and their ordered links.
///
/// Every constructor enables foreign keys before touching the schema.
/// SQLite leaves them off per connection, and without them deleting a note
/// would leave its `note_tags` rows behind instead of cascading.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a scratch store that lives as long as the connection.
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    /// Opens the store file at `path`, creating it on first use.
    ///
    /// Reopening an existing file keeps its notes: the schema only creates
    /// what is missing.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::with_connection(Connection::open(path)?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(INITIAL_SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn in_memory_opens_successfully() {
        let result = Database::in_memory();
        assert!(result.is_ok());
    }

    #[test]
    fn schema_tables_exist() {
        let db = Database::in_memory().unwrap();

        let tables: Vec<String> = db
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"notes".to_string()));
        assert!(tables.contains(&"tags".to_string()));
        assert!(tables.contains(&"note_tags".to_string()));
    }

    #[test]
    fn schema_indexes_exist() {
        let db = Database::in_memory().unwrap();

        let indexes: Vec<String> = db
            .connection()
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND name LIKE 'idx_%' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(indexes.contains(&"idx_notes_created".to_string()));
        assert!(indexes.contains(&"idx_notes_title".to_string()));
        assert!(indexes.contains(&"idx_note_tags_note".to_string()));
        assert!(indexes.contains(&"idx_note_tags_tag".to_string()));
    }

    #[test]
    fn foreign_keys_enabled() {
        let db = Database::in_memory().unwrap();

        let fk_enabled: i32 = db
            .connection()
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();

        assert_eq!(fk_enabled, 1);
    }

    #[test]
    fn deleting_a_note_drops_its_tag_links() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        conn.execute(
            "INSERT INTO notes (key, content, created_at, updated_at) VALUES ('k', '# Tea', 0, 0)",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO tags (id, name) VALUES (1, '`green')", []).unwrap();
        conn.execute(
            "INSERT INTO note_tags (note_key, tag_id, position) VALUES ('k', 1, 0)",
            [],
        )
        .unwrap();

        conn.execute("DELETE FROM notes WHERE key = 'k'", []).unwrap();

        let links: i64 = conn
            .query_row("SELECT COUNT(*) FROM note_tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(links, 0);
    }

    #[test]
    fn file_database_reopens_with_existing_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.db");

        {
            let db = Database::open(&path).unwrap();
            db.connection()
                .execute(
                    "INSERT INTO notes (key, content, created_at, updated_at) VALUES ('k', '# Tea', 0, 0)",
                    [],
                )
                .unwrap();
        }

        let db = Database::open(&path).unwrap();
        let count: i64 = db
            .connection()
            .query_row("SELECT COUNT(*) FROM notes", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn tag_names_are_case_sensitive() {
        let db = Database::in_memory().unwrap();
        let conn = db.connection();
        conn.execute("INSERT INTO tags (name) VALUES ('`green')", []).unwrap();
        conn.execute("INSERT INTO tags (name) VALUES ('`Green')", []).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }
}
