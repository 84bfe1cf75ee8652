//! Cache storage trait and its implementations.
//!
//! A storage backend is a flat string key/value tier shared by everything
//! that persists data for the application. The cache store namespaces its own
//! keys on top of it, so backends never see cache semantics.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Trait for durable key/value backends.
pub trait Storage: Send + Sync {
  /// Read the raw value stored under `key`.
  fn get_item(&self, key: &str) -> Result<Option<String>>;

  /// Store `value` under `key`, replacing any previous value.
  fn set_item(&self, key: &str, value: &str) -> Result<()>;

  /// Delete `key`. Deleting a missing key is not an error.
  fn remove_item(&self, key: &str) -> Result<()>;

  /// All keys currently stored, in no particular order.
  fn keys(&self) -> Result<Vec<String>>;
}

impl<S: Storage + ?Sized> Storage for Box<S> {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    (**self).get_item(key)
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    (**self).set_item(key, value)
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    (**self).remove_item(key)
  }

  fn keys(&self) -> Result<Vec<String>> {
    (**self).keys()
  }
}

/// Storage implementation that doesn't store anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl Storage for NoopStorage {
  fn get_item(&self, _key: &str) -> Result<Option<String>> {
    Ok(None) // Always miss
  }

  fn set_item(&self, _key: &str, _value: &str) -> Result<()> {
    Ok(()) // Discard
  }

  fn remove_item(&self, _key: &str) -> Result<()> {
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    Ok(Vec::new())
  }
}

/// In-process storage with an optional byte quota.
///
/// The quota counts key and value bytes and makes `set_item` fail once
/// exceeded, the same way a full browser storage area does.
#[derive(Default)]
pub struct MemoryStorage {
  items: Mutex<BTreeMap<String, String>>,
  quota: Option<usize>,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_quota(quota: usize) -> Self {
    Self {
      items: Mutex::new(BTreeMap::new()),
      quota: Some(quota),
    }
  }
}

impl Storage for MemoryStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(items.get(key).cloned())
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let mut items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    if let Some(quota) = self.quota {
      let used: usize = items
        .iter()
        .filter(|(k, _)| k.as_str() != key)
        .map(|(k, v)| k.len() + v.len())
        .sum();
      if used + key.len() + value.len() > quota {
        return Err(eyre!("Storage quota of {} bytes exceeded", quota));
      }
    }

    items.insert(key.to_string(), value.to_string());
    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let mut items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    items.remove(key);
    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let items = self
      .items
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(items.keys().cloned().collect())
  }
}

/// SQLite-based storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open storage at the default location.
  pub fn open() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open_at(&path)
  }

  /// Open storage at `path`, creating the file and its directory if needed.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// Storage that lives only as long as this value.
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("dnsdash").join("cache.db"))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STORAGE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for the key/value table.
const STORAGE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL
);
"#;

impl Storage for SqliteStorage {
  fn get_item(&self, key: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", key, e))
  }

  fn set_item(&self, key: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value) VALUES (?, ?)",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write {}: {}", key, e))?;

    Ok(())
  }

  fn remove_item(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete {}: {}", key, e))?;

    Ok(())
  }

  fn keys(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT key FROM kv_store")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let keys = stmt
      .query_map([], |row| row.get::<_, String>(0))
      .map_err(|e| eyre!("Failed to list keys: {}", e))?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(|e| eyre!("Failed to read key: {}", e))?;

    Ok(keys)
  }
}
