//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CatalogStore trait.

use crate::model::{Diagram, DiagramKey, Group, Part};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{CatalogStore, StorageResult};
use crate::storage::{
    CachedPage, CatalogCounts, CommitMode, Pagination, PartIdentity, UpsertCounts,
};
use crate::HarvestError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::path::Path;

const GROUP_COLUMNS: &str = "id, name, diagrams_url, parent_group_id";
const DIAGRAM_COLUMNS: &str = "group_id, ordinal, legacy_id, name, img_url";
const PART_COLUMNS: &str =
    "id, group_id, ordinal, parent_diagram_id, number, name, note, date_range, amount";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Runs `write` over every row, either inside one transaction or
    /// committing each row on its own
    fn write_batch<T>(
        &mut self,
        rows: &[T],
        mode: CommitMode,
        mut write: impl FnMut(&Connection, &T, &str) -> StorageResult<bool>,
    ) -> StorageResult<UpsertCounts> {
        let now = Utc::now().to_rfc3339();
        let mut counts = UpsertCounts::default();
        let mut record = |inserted: bool| {
            if inserted {
                counts.inserted += 1;
            } else {
                counts.updated += 1;
            }
        };

        match mode {
            CommitMode::Transaction => {
                let tx = self.conn.transaction()?;
                for row in rows {
                    record(write(&*tx, row, &now)?);
                }
                tx.commit()?;
            }
            CommitMode::PerRow => {
                for row in rows {
                    record(write(&self.conn, row, &now)?);
                }
            }
        }

        Ok(counts)
    }

    /// Deletes every row of `table` and returns how many it held
    ///
    /// The change count of a DELETE leaves out rows removed by cascade,
    /// so the table is counted inside the same transaction first.
    fn wipe_table(&mut self, table: &str) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;
        let count: i64 = tx.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
            row.get(0)
        })?;
        tx.execute(&format!("DELETE FROM {}", table), [])?;
        tx.commit()?;
        Ok(count as usize)
    }

    fn count(&self, sql: &str) -> StorageResult<usize> {
        let count: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        id: row.get(0)?,
        name: row.get(1)?,
        diagrams_url: row.get(2)?,
        parent_group_id: row.get(3)?,
    })
}

fn diagram_from_row(row: &Row<'_>) -> rusqlite::Result<Diagram> {
    Ok(Diagram {
        key: DiagramKey::new(row.get(0)?, row.get(1)?),
        id: row.get(2)?,
        name: row.get(3)?,
        img_url: row.get(4)?,
    })
}

fn part_from_row(row: &Row<'_>) -> rusqlite::Result<Part> {
    Ok(Part {
        id: Some(row.get(0)?),
        diagram: DiagramKey::new(row.get(1)?, row.get(2)?),
        parent_diagram_id: row.get(3)?,
        number: row.get(4)?,
        name: row.get(5)?,
        note: row.get(6)?,
        date_range: row.get(7)?,
        amount: row.get(8)?,
    })
}

/// Inserts or updates one group; returns true on insert
fn write_group(conn: &Connection, group: &Group, now: &str) -> StorageResult<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM catalog_groups WHERE id = ?1",
            params![group.id],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    conn.execute(
        "INSERT INTO catalog_groups (id, name, diagrams_url, parent_group_id, first_seen_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            diagrams_url = excluded.diagrams_url,
            parent_group_id = excluded.parent_group_id,
            updated_at = excluded.updated_at",
        params![group.id, group.name, group.diagrams_url, group.parent_group_id, now],
    )?;

    Ok(!exists)
}

fn write_diagram(conn: &Connection, diagram: &Diagram, now: &str) -> StorageResult<bool> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM catalog_diagrams WHERE group_id = ?1 AND ordinal = ?2",
            params![diagram.key.group_id, diagram.key.ordinal],
            |_| Ok(()),
        )
        .optional()?
        .is_some();

    conn.execute(
        "INSERT INTO catalog_diagrams (group_id, ordinal, legacy_id, name, img_url, first_seen_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(group_id, ordinal) DO UPDATE SET
            legacy_id = excluded.legacy_id,
            name = excluded.name,
            img_url = excluded.img_url,
            updated_at = excluded.updated_at",
        params![
            diagram.key.group_id,
            diagram.key.ordinal,
            diagram.id,
            diagram.name,
            diagram.img_url,
            now
        ],
    )?;

    Ok(!exists)
}

fn write_part(
    conn: &Connection,
    part: &Part,
    now: &str,
    identity: PartIdentity,
) -> StorageResult<bool> {
    let existing: Option<i64> = match identity {
        PartIdentity::Fresh => None,
        PartIdentity::NaturalKey => conn
            .query_row(
                "SELECT id FROM catalog_parts
                 WHERE group_id = ?1 AND ordinal = ?2 AND number = ?3
                 ORDER BY id LIMIT 1",
                params![part.diagram.group_id, part.diagram.ordinal, part.number],
                |row| row.get(0),
            )
            .optional()?,
    };

    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE catalog_parts SET
                    parent_diagram_id = ?1, name = ?2, note = ?3, date_range = ?4,
                    amount = ?5, updated_at = ?6
                 WHERE id = ?7",
                params![
                    part.parent_diagram_id,
                    part.name,
                    part.note,
                    part.date_range,
                    part.amount,
                    now,
                    id
                ],
            )?;
            Ok(false)
        }
        None => {
            conn.execute(
                "INSERT INTO catalog_parts
                    (group_id, ordinal, parent_diagram_id, number, name, note, date_range,
                     amount, first_seen_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
                params![
                    part.diagram.group_id,
                    part.diagram.ordinal,
                    part.parent_diagram_id,
                    part.number,
                    part.name,
                    part.note,
                    part.date_range,
                    part.amount,
                    now
                ],
            )?;
            Ok(true)
        }
    }
}

fn content_hash(html: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(html.as_bytes());
    hex::encode(hasher.finalize())
}

impl CatalogStore for SqliteStorage {
    // ===== Groups =====

    fn get_groups(&self, page: Pagination) -> StorageResult<Vec<Group>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM catalog_groups ORDER BY id LIMIT ?1 OFFSET ?2",
            GROUP_COLUMNS
        ))?;
        let groups = stmt
            .query_map(params![page.sql_limit(), page.sql_offset()], group_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    fn get_groups_with_diagrams(&self, page: Pagination) -> StorageResult<Vec<Group>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM catalog_groups WHERE diagrams_url IS NOT NULL
             ORDER BY id LIMIT ?1 OFFSET ?2",
            GROUP_COLUMNS
        ))?;
        let groups = stmt
            .query_map(params![page.sql_limit(), page.sql_offset()], group_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(groups)
    }

    fn get_group_by_id(&self, id: i64) -> StorageResult<Option<Group>> {
        let group = self
            .conn
            .query_row(
                &format!("SELECT {} FROM catalog_groups WHERE id = ?1", GROUP_COLUMNS),
                params![id],
                group_from_row,
            )
            .optional()?;
        Ok(group)
    }

    fn get_group_edges(&self) -> StorageResult<Vec<(i64, Option<i64>)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, parent_group_id FROM catalog_groups")?;
        let edges = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(edges)
    }

    fn upsert_groups(&mut self, groups: &[Group], mode: CommitMode) -> StorageResult<UpsertCounts> {
        self.write_batch(groups, mode, write_group)
    }

    fn wipe_groups(&mut self) -> StorageResult<usize> {
        self.wipe_table("catalog_groups")
    }

    // ===== Diagrams =====

    fn get_diagrams(&self, page: Pagination) -> StorageResult<Vec<Diagram>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM catalog_diagrams ORDER BY group_id, ordinal LIMIT ?1 OFFSET ?2",
            DIAGRAM_COLUMNS
        ))?;
        let diagrams = stmt
            .query_map(params![page.sql_limit(), page.sql_offset()], diagram_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(diagrams)
    }

    fn get_diagrams_for_group(&self, group_id: i64) -> StorageResult<Vec<Diagram>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM catalog_diagrams WHERE group_id = ?1 ORDER BY ordinal",
            DIAGRAM_COLUMNS
        ))?;
        let diagrams = stmt
            .query_map(params![group_id], diagram_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(diagrams)
    }

    fn get_diagram_by_key(&self, key: DiagramKey) -> StorageResult<Option<Diagram>> {
        let diagram = self
            .conn
            .query_row(
                &format!(
                    "SELECT {} FROM catalog_diagrams WHERE group_id = ?1 AND ordinal = ?2",
                    DIAGRAM_COLUMNS
                ),
                params![key.group_id, key.ordinal],
                diagram_from_row,
            )
            .optional()?;
        Ok(diagram)
    }

    fn upsert_diagrams(
        &mut self,
        diagrams: &[Diagram],
        mode: CommitMode,
    ) -> StorageResult<UpsertCounts> {
        self.write_batch(diagrams, mode, write_diagram)
    }

    fn wipe_diagrams(&mut self) -> StorageResult<usize> {
        self.wipe_table("catalog_diagrams")
    }

    // ===== Parts =====

    fn get_parts(&self, page: Pagination) -> StorageResult<Vec<Part>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM catalog_parts ORDER BY id LIMIT ?1 OFFSET ?2",
            PART_COLUMNS
        ))?;
        let parts = stmt
            .query_map(params![page.sql_limit(), page.sql_offset()], part_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts)
    }

    fn get_parts_for_diagram(&self, key: DiagramKey) -> StorageResult<Vec<Part>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM catalog_parts WHERE group_id = ?1 AND ordinal = ?2 ORDER BY id",
            PART_COLUMNS
        ))?;
        let parts = stmt
            .query_map(params![key.group_id, key.ordinal], part_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(parts)
    }

    fn upsert_parts(
        &mut self,
        parts: &[Part],
        mode: CommitMode,
        identity: PartIdentity,
    ) -> StorageResult<UpsertCounts> {
        self.write_batch(parts, mode, |conn, part, now| {
            write_part(conn, part, now, identity)
        })
    }

    fn wipe_parts(&mut self) -> StorageResult<usize> {
        self.wipe_table("catalog_parts")
    }

    // ===== Page cache =====

    fn get_cached_page_html(&self, group_id: i64) -> StorageResult<Option<CachedPage>> {
        let page = self
            .conn
            .query_row(
                "SELECT group_id, url, html, content_hash, fetched_at
                 FROM page_cache WHERE group_id = ?1",
                params![group_id],
                |row| {
                    Ok(CachedPage {
                        group_id: row.get(0)?,
                        url: row.get(1)?,
                        html: row.get(2)?,
                        content_hash: row.get(3)?,
                        fetched_at: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(page)
    }

    fn save_page_html(&mut self, group_id: i64, url: &str, html: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO page_cache (group_id, url, html, content_hash, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(group_id) DO UPDATE SET
                url = excluded.url,
                html = excluded.html,
                content_hash = excluded.content_hash,
                fetched_at = excluded.fetched_at",
            params![group_id, url, html, content_hash(html), now],
        )?;
        Ok(())
    }

    fn wipe_page_cache(&mut self) -> StorageResult<usize> {
        self.wipe_table("page_cache")
    }

    // ===== Statistics =====

    fn counts(&self) -> StorageResult<CatalogCounts> {
        Ok(CatalogCounts {
            groups: self.count("SELECT COUNT(*) FROM catalog_groups")?,
            groups_with_diagrams: self
                .count("SELECT COUNT(*) FROM catalog_groups WHERE diagrams_url IS NOT NULL")?,
            diagrams: self.count("SELECT COUNT(*) FROM catalog_diagrams")?,
            parts: self.count("SELECT COUNT(*) FROM catalog_parts")?,
            cached_pages: self.count("SELECT COUNT(*) FROM page_cache")?,
        })
    }
}
