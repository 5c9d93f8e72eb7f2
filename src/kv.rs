//! Key-value storage port.
//!
//! The quote store persists everything as serialized text under a handful of
//! string keys. Anything that can get and set strings can back it:
//! - `MemoryStore` for session-scoped data and tests
//! - `SqliteStore` for durable storage across restarts

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{QuoteError, QuoteResult};

/// Key holding the serialized quote sequence
pub const QUOTES_KEY: &str = "quotes";
/// Key holding the last category filter chosen by the user
pub const SELECTED_CATEGORY_KEY: &str = "selectedCategory";
/// Key holding the pending conflict list
pub const CONFLICTS_KEY: &str = "conflicts";
/// Session key holding the most recently shown quote
pub const LAST_VIEWED_QUOTE_KEY: &str = "lastViewedQuote";

/// String-to-string storage used by the quote store.
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`, if any
    fn get(&self, key: &str) -> QuoteResult<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> QuoteResult<()>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> QuoteResult<()>;
}

fn poisoned(what: &str) -> QuoteError {
    QuoteError::Other(format!("{} lock poisoned", what))
}

/// In-memory store. Contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every key (end of session)
    pub fn clear(&self) -> QuoteResult<()> {
        self.entries.lock().map_err(|_| poisoned("memory store"))?.clear();
        Ok(())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> QuoteResult<Option<String>> {
        let entries = self.entries.lock().map_err(|_| poisoned("memory store"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> QuoteResult<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned("memory store"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> QuoteResult<()> {
        let mut entries = self.entries.lock().map_err(|_| poisoned("memory store"))?;
        entries.remove(key);
        Ok(())
    }
}

/// SQLite-backed durable store with a single `kv` table.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a store at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P) -> QuoteResult<Self> {
        let conn = Connection::open(db_path)?;

        // WAL keeps readers from blocking the periodic sync writer
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn new_in_memory() -> QuoteResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> QuoteResult<()> {
        let conn = self.conn.lock().map_err(|_| poisoned("sqlite store"))?;
        conn.execute_batch(
            r#"
            -- Timestamps are Unix seconds
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                modified_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
            );
            "#,
        )?;
        Ok(())
    }

    /// All keys currently stored, sorted
    pub fn keys(&self) -> QuoteResult<Vec<String>> {
        let conn = self.conn.lock().map_err(|_| poisoned("sqlite store"))?;
        let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get(0))?;

        let mut keys = Vec::new();
        for row in rows {
            keys.push(row?);
        }
        Ok(keys)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> QuoteResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| poisoned("sqlite store"))?;
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> QuoteResult<()> {
        let conn = self.conn.lock().map_err(|_| poisoned("sqlite store"))?;
        conn.execute(
            "INSERT INTO kv (key, value, modified_at) VALUES (?, ?, strftime('%s', 'now')) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, modified_at = excluded.modified_at",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> QuoteResult<()> {
        let conn = self.conn.lock().map_err(|_| poisoned("sqlite store"))?;
        conn.execute("DELETE FROM kv WHERE key = ?", [key])?;
        Ok(())
    }
}
