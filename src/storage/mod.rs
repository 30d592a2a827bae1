//! Persistent key-value storage shared by every list screen.
//!
//! Entries are raw JSON text keyed by strings built from entity ids. The store
//! has no eviction of its own: callers remove keys explicitly when a mutation
//! makes a cached value wrong.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use time::OffsetDateTime;

use crate::config::{ConfigPaths, StorageOptions};

mod schema;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    pub key: String,
    pub value: String,
    pub written_at: i64,
}

/// Synchronous key-value storage. Concurrent writers are last-write-wins.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StoredEntry>>;

    fn put_at(&self, key: &str, value: &str, written_at: i64) -> Result<()>;

    fn put(&self, key: &str, value: &str) -> Result<()> {
        self.put_at(key, value, OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Returns whether the key existed.
    fn remove(&self, key: &str) -> Result<bool>;

    /// Returns the number of removed entries.
    fn remove_prefix(&self, prefix: &str) -> Result<usize>;

    /// Keys starting with `prefix`, sorted.
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Copy)]
pub struct WalCheckpointStats {
    pub busy_frames: i64,
    pub wal_frames: i64,
    pub checkpointed_frames: i64,
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    pub fn run_wal_health_check(&self) -> Result<WalCheckpointStats> {
        self.with_connection(|conn| {
            conn.query_row("PRAGMA wal_checkpoint(PASSIVE)", [], |row| {
                Ok(WalCheckpointStats {
                    busy_frames: row.get(0)?,
                    wal_frames: row.get(1)?,
                    checkpointed_frames: row.get(2)?,
                })
            })
            .context("executing wal checkpoint pragma")
        })
    }

    pub fn entries(&self, prefix: &str) -> Result<Vec<StoredEntry>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value, written_at
                 FROM kv_entries
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key",
            )?;
            let rows = stmt.query_map(params![prefix], |row| {
                Ok(StoredEntry {
                    key: row.get(0)?,
                    value: row.get(1)?,
                    written_at: row.get(2)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()
                .context("listing cache entries")
        })
    }
}

impl KeyValueStore for StorageHandle {
    fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT key, value, written_at FROM kv_entries WHERE key = ?1",
                params![key],
                |row| {
                    Ok(StoredEntry {
                        key: row.get(0)?,
                        value: row.get(1)?,
                        written_at: row.get(2)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("reading cache key {key}"))
        })
    }

    fn put_at(&self, key: &str, value: &str, written_at: i64) -> Result<()> {
        self.with_connection(|conn| {
            conn.execute(
                "INSERT INTO kv_entries (key, value, written_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value,
                                                written_at = excluded.written_at",
                params![key, value, written_at],
            )
            .with_context(|| format!("writing cache key {key}"))?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<bool> {
        self.with_connection(|conn| {
            let removed = conn
                .execute("DELETE FROM kv_entries WHERE key = ?1", params![key])
                .with_context(|| format!("removing cache key {key}"))?;
            Ok(removed > 0)
        })
    }

    fn remove_prefix(&self, prefix: &str) -> Result<usize> {
        self.with_connection(|conn| {
            let removed = conn
                .execute(
                    "DELETE FROM kv_entries WHERE substr(key, 1, length(?1)) = ?1",
                    params![prefix],
                )
                .with_context(|| format!("removing cache keys under {prefix}"))?;
            Ok(removed)
        })
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries(prefix)?
            .into_iter()
            .map(|entry| entry.key)
            .collect())
    }
}

/// In-process store used by tests and by `--ephemeral` runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<BTreeMap<String, (String, i64)>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<StoredEntry>> {
        Ok(self
            .entries
            .lock()
            .get(key)
            .map(|(value, written_at)| StoredEntry {
                key: key.to_string(),
                value: value.clone(),
                written_at: *written_at,
            }))
    }

    fn put_at(&self, key: &str, value: &str, written_at: i64) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), (value.to_string(), written_at));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    fn remove_prefix(&self, prefix: &str) -> Result<usize> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .lock()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = if storage.database_path.as_os_str().is_empty() {
        &paths.database_path
    } else {
        &storage.database_path
    };
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    tracing::debug!(path = %db_path.display(), "cache database ready");
    Ok(StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
    })
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    conn.busy_timeout(std::time::Duration::from_millis(storage.busy_timeout_ms))
        .context("setting busy timeout")?;
    Ok(())
}
