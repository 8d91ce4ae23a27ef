//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the catalog database.
//! Foreign keys are deferred so a batch may reference rows it inserts later
//! in the same transaction.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Category hierarchy, ids assigned upstream
CREATE TABLE IF NOT EXISTS catalog_groups (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    diagrams_url TEXT,
    parent_group_id INTEGER REFERENCES catalog_groups(id)
        ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
    first_seen_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_groups_parent ON catalog_groups(parent_group_id);

-- Illustrated panels, identified by owning group and panel position
CREATE TABLE IF NOT EXISTS catalog_diagrams (
    group_id INTEGER NOT NULL REFERENCES catalog_groups(id)
        ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED,
    ordinal INTEGER NOT NULL,
    legacy_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    img_url TEXT,
    first_seen_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (group_id, ordinal)
);

CREATE INDEX IF NOT EXISTS idx_diagrams_legacy ON catalog_diagrams(legacy_id);

-- Line items of a diagram
CREATE TABLE IF NOT EXISTS catalog_parts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    group_id INTEGER NOT NULL,
    ordinal INTEGER NOT NULL,
    parent_diagram_id INTEGER NOT NULL,
    number TEXT NOT NULL,
    name TEXT NOT NULL,
    note TEXT NOT NULL DEFAULT '',
    date_range TEXT NOT NULL DEFAULT '',
    amount INTEGER,
    first_seen_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    FOREIGN KEY (group_id, ordinal) REFERENCES catalog_diagrams(group_id, ordinal)
        ON DELETE CASCADE DEFERRABLE INITIALLY DEFERRED
);

CREATE INDEX IF NOT EXISTS idx_parts_diagram ON catalog_parts(group_id, ordinal, number);

-- Rendered diagrams pages for offline re-extraction
CREATE TABLE IF NOT EXISTS page_cache (
    group_id INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    html TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    fetched_at TEXT NOT NULL
);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
