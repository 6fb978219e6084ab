// ============================================
// history.rs - Analysis History (SQLite)
// ============================================
// Most recent analyses, newest first. The store
// never holds more than `max_entries` rows.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::export::iso_timestamp;
use crate::fields::extract_fields;

pub const DEFAULT_MAX_ENTRIES: usize = 12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// ISO-8601 timestamp of the analysis; unique per entry.
    pub id: String,
    pub plant_name: String,
    /// `data:` URL of the analysed image, if one was kept.
    pub thumbnail: Option<String>,
    pub date: String,
    pub report_markdown: String,
}

impl HistoryEntry {
    pub fn new(report_markdown: impl Into<String>, thumbnail: Option<String>) -> Self {
        Self::new_at(report_markdown, thumbnail, Utc::now())
    }

    /// The plant name is read from the report's `Plant Type` field.
    pub fn new_at(
        report_markdown: impl Into<String>,
        thumbnail: Option<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let report_markdown = report_markdown.into();
        let timestamp = iso_timestamp(at);
        Self {
            id: timestamp.clone(),
            plant_name: extract_fields(&report_markdown).plant_type,
            thumbnail,
            date: timestamp,
            report_markdown,
        }
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            plant_name: row.get(1)?,
            thumbnail: row.get(2)?,
            date: row.get(3)?,
            report_markdown: row.get(4)?,
        })
    }
}

/// History store
pub struct HistoryStore {
    conn: Connection,
    max_entries: usize,
}

impl HistoryStore {
    /// Open or create the history database
    pub fn open<P: AsRef<Path>>(path: P, max_entries: usize) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create history directory: {:?}", parent))?;
        }

        info!("Opening history database: {:?}", path);

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .context("Failed to open history database")?;

        Self::with_connection(conn, max_entries)
    }

    pub fn open_in_memory(max_entries: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn, max_entries)
    }

    fn with_connection(conn: Connection, max_entries: usize) -> Result<Self> {
        let store = Self {
            conn,
            max_entries: max_entries.max(1),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        debug!("Initializing history schema");

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS history (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                plant_name TEXT NOT NULL,
                thumbnail TEXT,
                date TEXT NOT NULL,
                report_markdown TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Insert an entry, evict the oldest beyond the cap, and return the
    /// resulting list (newest first). Re-adding an id replaces it.
    pub fn add(&self, entry: &HistoryEntry) -> Result<Vec<HistoryEntry>> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO history (id, plant_name, thumbnail, date, report_markdown)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    entry.id,
                    entry.plant_name,
                    entry.thumbnail,
                    entry.date,
                    entry.report_markdown
                ],
            )
            .context("Failed to save history entry")?;

        let evicted = self.conn.execute(
            "DELETE FROM history WHERE seq NOT IN
                (SELECT seq FROM history ORDER BY seq DESC LIMIT ?1)",
            params![self.max_entries as i64],
        )?;
        if evicted > 0 {
            debug!("Evicted {} old history entries", evicted);
        }

        self.list()
    }

    /// All entries, newest first.
    pub fn list(&self) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, plant_name, thumbnail, date, report_markdown
             FROM history ORDER BY seq DESC",
        )?;

        let rows = stmt.query_map([], HistoryEntry::from_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }

    pub fn get(&self, id: &str) -> Result<Option<HistoryEntry>> {
        self.conn
            .query_row(
                "SELECT id, plant_name, thumbnail, date, report_markdown
                 FROM history WHERE id = ?1",
                params![id],
                HistoryEntry::from_row,
            )
            .optional()
            .context("Failed to read history entry")
    }

    /// Remove every entry; returns how many were deleted.
    pub fn clear(&self) -> Result<usize> {
        let deleted = self.conn.execute("DELETE FROM history", [])?;
        info!("Cleared {} history entries", deleted);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn entry(n: i64) -> HistoryEntry {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap() + Duration::minutes(n);
        HistoryEntry::new_at(format!("**Plant Type:** Plant {}", n), None, at)
    }

    #[test]
    fn test_entry_reads_plant_name() {
        let at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();
        let e = HistoryEntry::new_at(
            "**Plant Type:** Rose Bush\n**Detected Disease:** Black Spot",
            Some("data:image/png;base64,AA==".to_string()),
            at,
        );
        assert_eq!(e.plant_name, "Rose Bush");
        assert_eq!(e.id, "2024-06-01T08:00:00.000Z");
        assert_eq!(e.date, e.id);

        let unknown = HistoryEntry::new_at("no fields here", None, at);
        assert_eq!(unknown.plant_name, "N/A");
    }

    #[test]
    fn test_add_returns_newest_first() {
        let store = HistoryStore::open_in_memory(DEFAULT_MAX_ENTRIES).unwrap();
        store.add(&entry(1)).unwrap();
        let entries = store.add(&entry(2)).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].plant_name, "Plant 2");
        assert_eq!(entries[1].plant_name, "Plant 1");
    }

    #[test]
    fn test_cap_evicts_oldest() {
        let store = HistoryStore::open_in_memory(3).unwrap();
        for n in 0..5 {
            store.add(&entry(n)).unwrap();
        }

        let names: Vec<String> = store.list().unwrap().into_iter().map(|e| e.plant_name).collect();
        assert_eq!(names, vec!["Plant 4", "Plant 3", "Plant 2"]);
        assert!(store.get(&entry(0).id).unwrap().is_none());
    }

    #[test]
    fn test_get_and_clear() {
        let store = HistoryStore::open_in_memory(DEFAULT_MAX_ENTRIES).unwrap();
        let e = entry(7);
        store.add(&e).unwrap();

        assert_eq!(store.get(&e.id).unwrap(), Some(e));
        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_persists_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.db");

        {
            let store = HistoryStore::open(&path, DEFAULT_MAX_ENTRIES).unwrap();
            store.add(&entry(1)).unwrap();
        }

        let reopened = HistoryStore::open(&path, DEFAULT_MAX_ENTRIES).unwrap();
        assert_eq!(reopened.list().unwrap().len(), 1);
    }
}
