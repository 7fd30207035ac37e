use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use affinity_core::now_iso8601;

use crate::error::Result;
use crate::schema;

/// SQLite-backed blob store: one profile blob per user id plus a small
/// metadata table.
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM metadata WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Profile blobs ---

    pub fn get_profile_blob(&self, user_id: &str) -> Result<Option<String>> {
        let blob = self
            .conn
            .query_row(
                "SELECT blob FROM profiles WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob)
    }

    /// Last write wins.
    pub fn put_profile_blob(&self, user_id: &str, blob: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO profiles (user_id, blob, updated_at) VALUES (?1, ?2, ?3)",
            params![user_id, blob, now_iso8601()],
        )?;
        Ok(())
    }

    pub fn profile_updated_at(&self, user_id: &str) -> Result<Option<String>> {
        let ts = self
            .conn
            .query_row(
                "SELECT updated_at FROM profiles WHERE user_id = ?1",
                [user_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(ts)
    }

    pub fn user_ids(&self) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT user_id FROM profiles ORDER BY user_id")?;
        let ids: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<_, _>>()?;
        Ok(ids)
    }

    /// Flush the WAL into the main database file and truncate it.
    pub fn checkpoint_truncate(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
        Ok(())
    }
}
