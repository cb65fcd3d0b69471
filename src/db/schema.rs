/// Complete database schema for the note store.
///
/// Uses CREATE TABLE/INDEX IF NOT EXISTS for idempotent execution.
pub const INITIAL_SCHEMA: &str = r#"
-- Notes table: markdown content addressed by an opaque key
CREATE TABLE IF NOT EXISTS notes (
    key TEXT PRIMARY KEY,
    storage TEXT NOT NULL DEFAULT 'default',
    folder TEXT NOT NULL DEFAULT 'default',
    title TEXT NOT NULL DEFAULT '',
    content TEXT NOT NULL,
    is_trashed INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Tags table: unique tag strings, case-sensitive since reserved prefixes matter
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

-- Junction table: ordered tags of each note
CREATE TABLE IF NOT EXISTS note_tags (
    note_key TEXT NOT NULL,
    tag_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (note_key, tag_id),
    FOREIGN KEY (note_key) REFERENCES notes(key) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

-- Index for listing notes by creation date
CREATE INDEX IF NOT EXISTS idx_notes_created ON notes(created_at);

-- Index for title lookups of report notes
CREATE INDEX IF NOT EXISTS idx_notes_title ON notes(title);

-- Indexes for efficient junction table lookups
CREATE INDEX IF NOT EXISTS idx_note_tags_note ON note_tags(note_key, position);
CREATE INDEX IF NOT EXISTS idx_note_tags_tag ON note_tags(tag_id);
"#;
