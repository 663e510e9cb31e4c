/*
 * SPDX-FileCopyrightText: 2026 Wallfeed Project
 * SPDX-License-Identifier: AGPL-3.0-only
 */

use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

const SYNC_SINCE_KEY: &str = "wall_sync_since";

#[derive(Clone)]
pub struct WallDb {
    path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WallPostRow {
    pub message_id: String,
    pub from_id: String,
    pub from_name: String,
    pub message: Option<String>,
    pub post_type: String,
    pub created_time: String,
    pub created_at_ms: i64,
    pub place_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CollectionPage<T> {
    pub total: u64,
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl WallDb {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&path).with_context(|| format!("open db: {}", path.display()))?;
        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            CREATE TABLE IF NOT EXISTS wall_posts (
              message_id TEXT PRIMARY KEY,
              from_id TEXT NOT NULL,
              from_name TEXT NOT NULL,
              message TEXT NULL,
              post_type TEXT NOT NULL,
              created_time TEXT NOT NULL,
              created_at_ms INTEGER NOT NULL,
              fetched_at_ms INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_wall_posts_created ON wall_posts(created_at_ms DESC);

            CREATE TABLE IF NOT EXISTS local_meta (
              key TEXT PRIMARY KEY,
              value TEXT NOT NULL
            );
            "#,
        )?;
        ensure_columns(&conn, "wall_posts", &[
            ("place_name", "TEXT NULL"),
        ])?;
        Ok(Self { path })
    }

    pub fn health_check(&self) -> Result<()> {
        let conn = Connection::open(&self.path)?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    /// Upsert keyed on `message_id`: re-fetching an already-seen window is
    /// idempotent, and an edited post refreshes in place.
    pub fn upsert_wall_post(&self, post: &WallPostRow) -> Result<()> {
        let conn = Connection::open(&self.path)?;
        conn.execute(
            r#"
            INSERT INTO wall_posts(message_id, from_id, from_name, message, post_type, created_time, created_at_ms, place_name, fetched_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ON CONFLICT(message_id) DO UPDATE SET
              from_id=excluded.from_id,
              from_name=excluded.from_name,
              message=excluded.message,
              post_type=excluded.post_type,
              created_time=excluded.created_time,
              created_at_ms=excluded.created_at_ms,
              place_name=excluded.place_name,
              fetched_at_ms=excluded.fetched_at_ms
            "#,
            params![
                post.message_id,
                post.from_id,
                post.from_name,
                post.message,
                post.post_type,
                post.created_time,
                post.created_at_ms,
                post.place_name,
                now_ms(),
            ],
        )?;
        Ok(())
    }

    pub fn list_wall_posts(&self, limit: u32, cursor_ms: Option<i64>) -> Result<CollectionPage<WallPostRow>> {
        let conn = Connection::open(&self.path)?;
        let total: u64 = conn.query_row("SELECT COUNT(*) FROM wall_posts", [], |r| r.get(0))?;
        let limit = limit.clamp(1, 200);
        let (sql, params_vec): (String, Vec<rusqlite::types::Value>) = if let Some(c) = cursor_ms {
            (
                "SELECT message_id, from_id, from_name, message, post_type, created_time, created_at_ms, place_name FROM wall_posts WHERE created_at_ms < ?1 ORDER BY created_at_ms DESC LIMIT ?2"
                    .to_string(),
                vec![c.into(), (limit as i64).into()],
            )
        } else {
            (
                "SELECT message_id, from_id, from_name, message, post_type, created_time, created_at_ms, place_name FROM wall_posts ORDER BY created_at_ms DESC LIMIT ?1"
                    .to_string(),
                vec![(limit as i64).into()],
            )
        };

        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(rusqlite::params_from_iter(params_vec))?;
        let mut items = Vec::new();
        let mut last_created: Option<i64> = None;
        while let Some(row) = rows.next()? {
            let created_at_ms: i64 = row.get(6)?;
            last_created = Some(created_at_ms);
            items.push(WallPostRow {
                message_id: row.get(0)?,
                from_id: row.get(1)?,
                from_name: row.get(2)?,
                message: row.get(3)?,
                post_type: row.get(4)?,
                created_time: row.get(5)?,
                created_at_ms,
                place_name: row.get(7)?,
            });
        }

        let next = if items.len() as u32 == limit {
            last_created.map(|v| v.to_string())
        } else {
            None
        };
        Ok(CollectionPage { total, items, next })
    }

    pub fn count_wall_posts(&self) -> Result<u64> {
        let conn = Connection::open(&self.path)?;
        let total: u64 = conn.query_row("SELECT COUNT(*) FROM wall_posts", [], |r| r.get(0))?;
        Ok(total)
    }

    /// Logout path: drop every cached post.
    pub fn clear_wall_posts(&self) -> Result<u64> {
        let conn = Connection::open(&self.path)?;
        let n = conn.execute("DELETE FROM wall_posts", [])?;
        Ok(n as u64)
    }

    pub fn get_local_meta(&self, key: &str) -> Result<Option<String>> {
        let conn = Connection::open(&self.path)?;
        conn.query_row(
            "SELECT value FROM local_meta WHERE key=?1",
            params![key],
            |r| r.get(0),
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn set_local_meta(&self, key: &str, value: &str) -> Result<()> {
        let conn = Connection::open(&self.path)?;
        conn.execute(
            "INSERT OR REPLACE INTO local_meta(key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_local_meta(&self, key: &str) -> Result<()> {
        let conn = Connection::open(&self.path)?;
        conn.execute("DELETE FROM local_meta WHERE key=?1", params![key])?;
        Ok(())
    }

    /// Sync watermark in epoch seconds (the wire `since` parameter).
    pub fn get_sync_since(&self) -> Result<Option<i64>> {
        Ok(self
            .get_local_meta(SYNC_SINCE_KEY)?
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|v| *v > 0))
    }

    pub fn set_sync_since(&self, since_secs: i64) -> Result<()> {
        self.set_local_meta(SYNC_SINCE_KEY, &since_secs.to_string())
    }

    pub fn clear_sync_since(&self) -> Result<()> {
        self.delete_local_meta(SYNC_SINCE_KEY)
    }
}

fn ensure_columns(conn: &Connection, table: &str, cols: &[(&str, &str)]) -> Result<()> {
    let mut existing = std::collections::HashSet::new();
    {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(1)?;
            existing.insert(name);
        }
    }
    for (name, ty) in cols {
        if !existing.contains(*name) {
            conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {name} {ty}"), [])?;
        }
    }
    Ok(())
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str, created_at_ms: i64) -> WallPostRow {
        WallPostRow {
            message_id: id.to_string(),
            from_id: "100".to_string(),
            from_name: "Alice".to_string(),
            message: Some(format!("post {id}")),
            post_type: "status".to_string(),
            created_time: "2014-05-01T10:00:00+0000".to_string(),
            created_at_ms,
            place_name: None,
        }
    }

    fn open_temp() -> (tempfile::TempDir, WallDb) {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = WallDb::open(dir.path().join("wallfeed.db")).expect("open db");
        (dir, db)
    }

    #[test]
    fn upsert_and_list_newest_first() {
        let (_dir, db) = open_temp();
        db.upsert_wall_post(&post("a", 1000)).unwrap();
        db.upsert_wall_post(&post("b", 3000)).unwrap();
        db.upsert_wall_post(&post("c", 2000)).unwrap();

        let page = db.list_wall_posts(10, None).unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<&str> = page.items.iter().map(|p| p.message_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
        assert!(page.next.is_none());
    }

    #[test]
    fn upsert_same_id_is_idempotent() {
        let (_dir, db) = open_temp();
        db.upsert_wall_post(&post("a", 1000)).unwrap();
        let mut edited = post("a", 1000);
        edited.message = Some("edited".to_string());
        db.upsert_wall_post(&edited).unwrap();

        let page = db.list_wall_posts(10, None).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].message.as_deref(), Some("edited"));
    }

    #[test]
    fn cursor_pages_through_feed() {
        let (_dir, db) = open_temp();
        for i in 0..5i64 {
            db.upsert_wall_post(&post(&format!("p{i}"), 1000 + i)).unwrap();
        }
        let first = db.list_wall_posts(2, None).unwrap();
        assert_eq!(first.items.len(), 2);
        let cursor: i64 = first.next.as_deref().unwrap().parse().unwrap();
        let second = db.list_wall_posts(2, Some(cursor)).unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(second.items[0].created_at_ms < first.items[1].created_at_ms);
    }

    #[test]
    fn clear_wall_posts_empties_table() {
        let (_dir, db) = open_temp();
        db.upsert_wall_post(&post("a", 1000)).unwrap();
        db.upsert_wall_post(&post("b", 2000)).unwrap();
        assert_eq!(db.clear_wall_posts().unwrap(), 2);
        assert_eq!(db.count_wall_posts().unwrap(), 0);
    }

    #[test]
    fn sync_since_roundtrip_and_clear() {
        let (_dir, db) = open_temp();
        assert_eq!(db.get_sync_since().unwrap(), None);
        db.set_sync_since(1_400_000_000).unwrap();
        assert_eq!(db.get_sync_since().unwrap(), Some(1_400_000_000));
        db.clear_sync_since().unwrap();
        assert_eq!(db.get_sync_since().unwrap(), None);
    }

    #[test]
    fn reopen_keeps_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("wallfeed.db");
        {
            let db = WallDb::open(&path).unwrap();
            db.upsert_wall_post(&post("a", 1000)).unwrap();
        }
        let db = WallDb::open(&path).unwrap();
        assert_eq!(db.count_wall_posts().unwrap(), 1);
    }
}
