//! SQLite-backed token storage
//!
//! Both slots live as rows of one `oauth_state` table keyed by
//! `(namespace, slot)`, so several clients can share a database file without
//! seeing each other's tokens. Connection access runs on the blocking pool.

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::{Connection, OptionalExtension, params};
use tokio::task;
use tracing::debug;

use super::{StorageFuture, TokenStorage, now_millis, stamped};
use crate::error::{Error, Result};
use crate::token::TokenSet;

const TOKENS_SLOT: &str = "tokens";
const VERIFIER_SLOT: &str = "code_verifier";

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS oauth_state (
    namespace  TEXT    NOT NULL,
    slot       TEXT    NOT NULL,
    value      TEXT    NOT NULL,
    updated_at INTEGER NOT NULL,
    PRIMARY KEY (namespace, slot)
)";

/// Token storage in a SQLite database.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    namespace: String,
}

impl SqliteStorage {
    /// Open (or create) the database at `path` and scope all rows to `namespace`.
    pub fn open(path: impl AsRef<Path>, namespace: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| Error::Storage(format!("opening {}: {e}", path.display())))?;
        Self::with_connection(conn, namespace.into())
    }

    /// Database that lives only as long as this value.
    pub fn open_in_memory(namespace: impl Into<String>) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("opening in-memory database: {e}")))?;
        Self::with_connection(conn, namespace.into())
    }

    fn with_connection(conn: Connection, namespace: String) -> Result<Self> {
        conn.execute(SCHEMA, params![])
            .map_err(|e| Error::Storage(format!("creating oauth_state table: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            namespace,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn put(&self, slot: &'static str, value: String) -> Result<()> {
        let namespace = self.namespace.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO oauth_state (namespace, slot, value, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT (namespace, slot)
                 DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![namespace, slot, value, now_millis() as i64],
            )
            .map(|_| ())
        })
        .await?;
        debug!(namespace = %self.namespace, slot, "persisted storage row");
        Ok(())
    }

    async fn get(&self, slot: &'static str) -> Result<Option<String>> {
        let namespace = self.namespace.clone();
        self.run(move |conn| {
            conn.query_row(
                "SELECT value FROM oauth_state WHERE namespace = ?1 AND slot = ?2",
                params![namespace, slot],
                |row| row.get::<_, String>(0),
            )
            .optional()
        })
        .await
    }

    async fn delete(&self, slot: &'static str) -> Result<()> {
        let namespace = self.namespace.clone();
        self.run(move |conn| {
            conn.execute(
                "DELETE FROM oauth_state WHERE namespace = ?1 AND slot = ?2",
                params![namespace, slot],
            )
            .map(|_| ())
        })
        .await
    }

    async fn run<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|_| Error::Storage("database connection lock poisoned".into()))?;
            f(&*conn).map_err(|e| Error::Storage(e.to_string()))
        })
        .await
        .map_err(|e| Error::Storage(format!("storage task failed: {e}")))?
    }
}

impl TokenStorage for SqliteStorage {
    fn store_tokens<'a>(&'a self, tokens: &'a TokenSet) -> StorageFuture<'a, ()> {
        Box::pin(async move {
            let json = serde_json::to_string(&stamped(tokens))
                .map_err(|e| Error::Serialization(format!("serializing token set: {e}")))?;
            self.put(TOKENS_SLOT, json).await
        })
    }

    fn get_tokens(&self) -> StorageFuture<'_, Option<TokenSet>> {
        Box::pin(async move {
            match self.get(TOKENS_SLOT).await? {
                Some(json) => serde_json::from_str(&json)
                    .map(Some)
                    .map_err(|e| Error::Serialization(format!("parsing stored token set: {e}"))),
                None => Ok(None),
            }
        })
    }

    fn clear_tokens(&self) -> StorageFuture<'_, ()> {
        Box::pin(self.delete(TOKENS_SLOT))
    }

    fn store_code_verifier<'a>(&'a self, verifier: &'a str) -> StorageFuture<'a, ()> {
        Box::pin(self.put(VERIFIER_SLOT, verifier.to_string()))
    }

    fn get_code_verifier(&self) -> StorageFuture<'_, Option<String>> {
        Box::pin(self.get(VERIFIER_SLOT))
    }

    fn clear_code_verifier(&self) -> StorageFuture<'_, ()> {
        Box::pin(self.delete(VERIFIER_SLOT))
    }
}
