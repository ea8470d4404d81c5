//! SQLite-backed record store.
//!
//! Records are JSON objects stored under a string key. The `FetchRecord`
//! capability reads the key from the payload and merges the stored record's
//! fields over it.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::debug;

use crate::domain::Payload;

use super::{Capability, CapabilityError};

/// Default payload field holding the lookup key
pub const DEFAULT_KEY_FIELD: &str = "age";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS records (
    key TEXT PRIMARY KEY NOT NULL,
    body TEXT NOT NULL,
    updated_at TEXT NOT NULL
)";

/// Keyed record storage
#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl RecordStore {
    /// Open (or create) a record database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create record store directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open record store: {}", path.display()))?;
        Self::from_connection(conn)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory record store")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute(SCHEMA, [])
            .context("Failed to initialise record store schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert or replace a record
    pub async fn put(&self, key: &str, record: Payload) -> Result<()> {
        let body = serde_json::to_string(&record).context("Failed to serialize record")?;
        let key = key.to_string();
        let now = chrono::Utc::now().to_rfc3339();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO records (key, body, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                params![key, body, now],
            )
            .map(|_| ())
            .context("Failed to write record")
        })
        .await
    }

    /// Read a record by key
    pub async fn get(&self, key: &str) -> Result<Option<Payload>> {
        let key = key.to_string();
        let body: Option<String> = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT body FROM records WHERE key = ?1",
                    params![key],
                    |row| row.get(0),
                )
                .optional()
                .context("Failed to read record")
            })
            .await?;

        match body {
            Some(text) => {
                let record = Payload::from_json_str(&text).context("Stored record is corrupt")?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Delete a record, returning whether it existed
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM records WHERE key = ?1", params![key])
                .map(|n| n > 0)
                .context("Failed to delete record")
        })
        .await
    }

    /// Run a blocking closure against the connection off the async runtime
    async fn with_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("Record store connection poisoned"))?;
            f(&*guard)
        })
        .await
        .context("Record store task panicked")?
    }
}

/// Capability reading the record whose key is found in the payload
pub struct FetchRecord {
    store: RecordStore,
    key_field: String,
}

impl FetchRecord {
    pub fn new(store: RecordStore) -> Self {
        Self::with_key_field(store, DEFAULT_KEY_FIELD)
    }

    pub fn with_key_field(store: RecordStore, key_field: impl Into<String>) -> Self {
        Self {
            store,
            key_field: key_field.into(),
        }
    }

    /// Extract the lookup key; numbers are accepted and stringified
    fn lookup_key(&self, payload: &Payload) -> Result<String, CapabilityError> {
        match payload.get(&self.key_field) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(_) => Err(CapabilityError::InvalidInput(format!(
                "field '{}' must be a non-empty string or number",
                self.key_field
            ))),
            None => Err(CapabilityError::InvalidInput(format!(
                "missing lookup key field '{}'",
                self.key_field
            ))),
        }
    }
}

#[async_trait]
impl Capability for FetchRecord {
    fn name(&self) -> &str {
        "record_store"
    }

    async fn invoke(&self, input: Payload) -> Result<Payload, CapabilityError> {
        let key = self.lookup_key(&input)?;
        debug!(key_field = %self.key_field, %key, "Fetching record");

        let record = self
            .store
            .get(&key)
            .await
            .map_err(|e| CapabilityError::Invocation(format!("{:#}", e)))?
            .ok_or_else(|| CapabilityError::NotFound(format!("{}={}", self.key_field, key)))?;

        let mut output = input;
        output.merge(record);
        Ok(output)
    }
}
