//! SQLite storage layer for cached block payloads and viewer state.
//!
//! Uses WAL mode so the block service can read while `fetch` writes. The
//! connection sits behind a mutex so one store can be shared across the
//! service's request handlers.

use std::sync::{Mutex, MutexGuard};

use eyre::{eyre, Context, Result};
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;

use crate::types::{parse_quantity, CachedBlock};

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Creates or opens a SQLite database with WAL mode enabled.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrations fail.
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .wrap_err_with(|| format!("failed to open SQLite database at {path}"))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| eyre!("store connection mutex poisoned"))
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS blocks (
                block_number INTEGER PRIMARY KEY,
                block_hash TEXT,
                transaction_count INTEGER,
                payload TEXT NOT NULL,
                fetched_at TEXT
            );

            CREATE TABLE IF NOT EXISTS viewer_state (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;
        Ok(())
    }

    /// Insert or replace the raw `eth_getBlockByNumber` result for a block.
    ///
    /// # Errors
    /// Returns error if the payload cannot be serialized or the insert fails.
    pub fn insert_block(&self, block_number: u64, payload: &Value) -> Result<()> {
        let block_hash = payload
            .get("hash")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let transaction_count = payload
            .get("transactions")
            .and_then(Value::as_array)
            .map(|txs| txs.len() as u64)
            .unwrap_or(0);
        let text = serde_json::to_string(payload).wrap_err("failed to encode block payload")?;

        self.conn()?.execute(
            "
            INSERT OR REPLACE INTO blocks (
                block_number, block_hash, transaction_count, payload, fetched_at
            ) VALUES (?, ?, ?, ?, ?)
            ",
            rusqlite::params![
                block_number,
                block_hash,
                transaction_count,
                text,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Fetch the cached payload for a block, if present.
    ///
    /// # Errors
    /// Returns error if the query fails or the stored payload is not JSON.
    pub fn get_block(&self, block_number: u64) -> Result<Option<Value>> {
        let text: Option<String> = self
            .conn()?
            .query_row(
                "SELECT payload FROM blocks WHERE block_number = ?",
                rusqlite::params![block_number],
                |row| row.get(0),
            )
            .optional()?;

        text.map(|t| {
            serde_json::from_str(&t)
                .wrap_err_with(|| format!("cached payload for block {block_number} is corrupt"))
        })
        .transpose()
    }

    /// True when every block in `start..=end` is cached.
    pub fn block_range_exists(&self, start: u64, end: u64) -> Result<bool> {
        if start > end {
            return Ok(false);
        }
        let count: u64 = self.conn()?.query_row(
            "SELECT COUNT(*) FROM blocks WHERE block_number BETWEEN ? AND ?",
            rusqlite::params![start, end],
            |row| row.get(0),
        )?;
        Ok(count == end - start + 1)
    }

    /// List cached blocks in ascending block order.
    pub fn cached_blocks(&self) -> Result<Vec<CachedBlock>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "
            SELECT block_number, block_hash, transaction_count, fetched_at
            FROM blocks ORDER BY block_number
            ",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(CachedBlock {
                    block_number: row.get(0)?,
                    block_hash: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    transaction_count: row.get::<_, Option<u64>>(2)?.unwrap_or(0),
                    fetched_at: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Read a viewer state value.
    pub fn get_state(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn()?
            .query_row(
                "SELECT value FROM viewer_state WHERE key = ?",
                rusqlite::params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Write a viewer state value, replacing any previous one.
    pub fn set_state(&self, key: &str, value: &str) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO viewer_state (key, value) VALUES (?, ?)",
            rusqlite::params![key, value],
        )?;
        Ok(())
    }
}

/// Block number recorded inside a payload, if the node supplied one.
pub fn payload_block_number(payload: &Value) -> Option<u64> {
    payload
        .get("number")
        .and_then(Value::as_str)
        .and_then(parse_quantity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_payload(number: u64) -> Value {
        json!({
            "number": format!("0x{number:x}"),
            "hash": format!("0x{number:064x}"),
            "transactions": [
                { "hash": "0x01", "from": "0xa", "to": "0xb" },
                { "hash": "0x02", "from": "0xb", "to": "0xc" }
            ]
        })
    }

    #[test]
    fn migrations_create_tables() {
        let store = Store::new(":memory:").expect("in-memory store should always open");
        let conn = store.conn().expect("lock should succeed");
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .expect("query should prepare");

        let tables: Vec<String> = stmt
            .query_map([], |row| row.get(0))
            .expect("query_map should succeed")
            .collect::<Result<Vec<_>, _>>()
            .expect("all rows should parse");

        assert!(tables.contains(&"blocks".to_string()));
        assert!(tables.contains(&"viewer_state".to_string()));
    }

    #[test]
    fn insert_then_get_block() {
        let store = Store::new(":memory:").expect("in-memory store should always open");
        let payload = sample_payload(100);

        store.insert_block(100, &payload).expect("insert should succeed");

        let cached = store.get_block(100).expect("query should succeed");
        assert_eq!(cached, Some(payload));
        assert_eq!(store.get_block(101).expect("query should succeed"), None);
    }

    #[test]
    fn insert_block_replaces_existing() {
        let store = Store::new(":memory:").expect("in-memory store should always open");
        store
            .insert_block(100, &json!({ "transactions": [] }))
            .expect("insert should succeed");
        store
            .insert_block(100, &sample_payload(100))
            .expect("replace should succeed");

        let blocks = store.cached_blocks().expect("list should succeed");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].transaction_count, 2);
    }

    #[test]
    fn block_range_exists_requires_every_block() {
        let store = Store::new(":memory:").expect("in-memory store should always open");
        store.insert_block(10, &sample_payload(10)).unwrap();
        store.insert_block(12, &sample_payload(12)).unwrap();

        assert!(store.block_range_exists(10, 10).unwrap());
        assert!(!store.block_range_exists(10, 12).unwrap());

        store.insert_block(11, &sample_payload(11)).unwrap();
        assert!(store.block_range_exists(10, 12).unwrap());
        assert!(!store.block_range_exists(12, 10).unwrap());
    }

    #[test]
    fn viewer_state_round_trip() {
        let store = Store::new(":memory:").expect("in-memory store should always open");
        assert_eq!(store.get_state("current_block").unwrap(), None);

        store.set_state("current_block", "19258329").unwrap();
        store.set_state("current_block", "19258330").unwrap();

        assert_eq!(
            store.get_state("current_block").unwrap().as_deref(),
            Some("19258330")
        );
    }

    #[test]
    fn persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("blockflow.sqlite");
        let path = path.to_str().expect("utf-8 path");

        {
            let store = Store::new(path).expect("store should open");
            store.insert_block(7, &sample_payload(7)).unwrap();
            store.set_state("current_block", "7").unwrap();
        }

        let store = Store::new(path).expect("store should reopen");
        assert!(store.get_block(7).unwrap().is_some());
        assert_eq!(store.get_state("current_block").unwrap().as_deref(), Some("7"));
    }

    #[test]
    fn payload_block_number_reads_hex() {
        assert_eq!(payload_block_number(&sample_payload(255)), Some(255));
        assert_eq!(payload_block_number(&json!({})), None);
    }
}
