//! libSQL-backed key-value store

use libsql::Connection;

use crate::error::Result;
use crate::storage::KeyValueStore;
use crate::util::unix_timestamp_millis;

/// libSQL implementation of `KeyValueStore` over the `kv_store` table
#[derive(Clone)]
pub struct LibSqlKeyValueStore {
    conn: Connection,
}

impl LibSqlKeyValueStore {
    /// Create a new store with the given connection
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl KeyValueStore for LibSqlKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query("SELECT value FROM kv_store WHERE key = ?", [key])
            .await?;

        if let Some(row) = rows.next().await? {
            let value: String = row.get(0)?;
            Ok(Some(value))
        } else {
            Ok(None)
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
                libsql::params![key, value, unix_timestamp_millis()],
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM kv_store WHERE key = ?", [key])
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use tempfile::tempdir;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_missing_key_reads_as_none() {
        let db = Database::open_in_memory().await.unwrap();
        let store = db.key_value_store();
        assert_eq!(store.get("absent").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_set_replaces_and_remove_deletes() {
        let db = Database::open_in_memory().await.unwrap();
        let store = db.key_value_store();

        store.set("app_sync_queue", "[1]").await.unwrap();
        store.set("app_sync_queue", "[1,2]").await.unwrap();
        assert_eq!(
            store.get("app_sync_queue").await.unwrap().as_deref(),
            Some("[1,2]")
        );

        store.remove("app_sync_queue").await.unwrap();
        store.remove("app_sync_queue").await.unwrap();
        assert_eq!(store.get("app_sync_queue").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_values_survive_reopen() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("tally.db");
        {
            let db = Database::open(&path).await.unwrap();
            db.key_value_store().set("k", "persisted").await.unwrap();
        }

        let db = Database::open(&path).await.unwrap();
        assert_eq!(
            db.key_value_store().get("k").await.unwrap().as_deref(),
            Some("persisted")
        );
    }
}
