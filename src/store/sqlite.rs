use std::str::FromStr;

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{
    Row, SqlitePool,
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow, SqliteSynchronous},
    types::Json,
};

use crate::store::{
    Document, DocumentPath, DocumentStore, Snapshot, SnapshotStream, StoreError, WriteOutcome,
    listeners::Listeners,
};

/// Document store backed by a single SQLite table.
///
/// Every row carries a version counter; conditional writes compare it in the
/// `WHERE` clause so concurrent writers race on the database, not on us.
/// Listeners only see commits made through this handle.
pub struct SqliteStore {
    pool: SqlitePool,
    listeners: Listeners,
}

impl SqliteStore {
    pub async fn connect(uri: &str) -> Result<Self, StoreError> {
        let in_memory = uri.contains(":memory:") || uri.contains("mode=memory");

        let mut opts = SqliteConnectOptions::from_str(uri)
            .map_err(unavailable)?
            .create_if_missing(true);
        if !in_memory {
            opts = opts
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
        }

        // An in-memory database lives and dies with its connection.
        let pool_opts = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new()
        };

        let pool = pool_opts.connect_with(opts).await.map_err(unavailable)?;
        Self::from_pool(pool).await
    }

    pub async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        init_documents_table(&pool).await?;

        Ok(SqliteStore {
            pool,
            listeners: Listeners::new(),
        })
    }

    /// All documents of a collection, ordered by path.
    pub async fn documents(
        &self,
        collection: &str,
    ) -> Result<Vec<(DocumentPath, Snapshot)>, StoreError> {
        let mut rows =
            sqlx::query("SELECT path, version, body FROM documents WHERE path LIKE ? ORDER BY path")
                .bind(format!("{}/%", collection))
                .fetch(&self.pool);

        let mut documents = Vec::new();
        while let Some(row) = rows.try_next().await.map_err(unavailable)? {
            let path = DocumentPath::from_stored(row.try_get("path").map_err(unavailable)?);
            if path.in_collection(collection) {
                let snapshot = decode_snapshot(&path, &row)?;
                documents.push((path, snapshot));
            }
        }

        Ok(documents)
    }

    pub fn listener_count(&self, path: &DocumentPath) -> usize {
        self.listeners.listener_count(path)
    }
}

async fn init_documents_table(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS documents
            (
                path    text                         NOT NULL,
                version integer CHECK (version >= 1) NOT NULL,
                body    text                         NOT NULL,
                PRIMARY KEY (path)
            );",
    )
    .execute(pool)
    .await
    .map_err(unavailable)?;

    Ok(())
}

fn unavailable(e: impl std::fmt::Display) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

fn decode_snapshot(path: &DocumentPath, row: &SqliteRow) -> Result<Snapshot, StoreError> {
    let corrupt = |e: sqlx::Error| StoreError::Corrupt(path.clone(), e.to_string());

    let version: i64 = row.try_get("version").map_err(corrupt)?;
    let Json(body): Json<Document> = row.try_get("body").map_err(corrupt)?;
    let version = u64::try_from(version)
        .map_err(|e| StoreError::Corrupt(path.clone(), e.to_string()))?;

    Ok(Snapshot { version, body })
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_document(&self, path: &DocumentPath) -> Result<Option<Snapshot>, StoreError> {
        let row = sqlx::query("SELECT version, body FROM documents WHERE path = ?")
            .bind(path.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;

        row.map(|row| decode_snapshot(path, &row)).transpose()
    }

    async fn subscribe_document(&self, path: &DocumentPath) -> Result<SnapshotStream, StoreError> {
        let updates = self.listeners.subscribe(path);
        if let Some(current) = self.get_document(path).await? {
            self.listeners.publish(path, current);
        }

        Ok(updates)
    }

    async fn write_if_version(
        &self,
        path: &DocumentPath,
        expected: Option<u64>,
        body: Document,
    ) -> Result<WriteOutcome, StoreError> {
        let result = match expected {
            None => {
                sqlx::query(
                    "INSERT INTO documents (path, version, body) VALUES (?, 1, ?)
                        ON CONFLICT (path) DO NOTHING",
                )
                .bind(path.as_str())
                .bind(Json(&body))
                .execute(&self.pool)
                .await
            }
            Some(version) => {
                let version = i64::try_from(version).map_err(unavailable)?;
                sqlx::query(
                    "UPDATE documents SET version = version + 1, body = ?
                        WHERE path = ? AND version = ?",
                )
                .bind(Json(&body))
                .bind(path.as_str())
                .bind(version)
                .execute(&self.pool)
                .await
            }
        }
        .map_err(unavailable)?;

        if result.rows_affected() != 1 {
            return Ok(WriteOutcome::Conflict);
        }

        let version = expected.map_or(1, |v| v + 1);
        self.listeners.publish(path, Snapshot { version, body });

        Ok(WriteOutcome::Committed(version))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use serde_json::json;

    use super::*;

    async fn store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn insert_then_update_by_version() {
        let store = store().await;
        let path = DocumentPath::new("users", "u-1");

        assert_eq!(
            store.write_if_version(&path, None, json!({ "n": 1 })).await,
            Ok(WriteOutcome::Committed(1))
        );
        assert_eq!(
            store.write_if_version(&path, None, json!({ "n": 9 })).await,
            Ok(WriteOutcome::Conflict)
        );
        assert_eq!(
            store.write_if_version(&path, Some(1), json!({ "n": 2 })).await,
            Ok(WriteOutcome::Committed(2))
        );
        assert_eq!(
            store.write_if_version(&path, Some(1), json!({ "n": 3 })).await,
            Ok(WriteOutcome::Conflict)
        );

        let snapshot = store.get_document(&path).await.unwrap().unwrap();
        assert_eq!(snapshot.version, 2);
        assert_eq!(snapshot.body, json!({ "n": 2 }));
    }

    #[tokio::test]
    async fn missing_document_reads_as_none() {
        let store = store().await;

        assert_eq!(
            store.get_document(&DocumentPath::new("users", "nobody")).await,
            Ok(None)
        );
    }

    #[tokio::test]
    async fn lists_collection_in_path_order() {
        let store = store().await;
        for id in ["b", "a"] {
            store
                .write_if_version(&DocumentPath::new("users", id), None, json!({ "id": id }))
                .await
                .unwrap();
        }
        store
            .write_if_version(&DocumentPath::new("other", "c"), None, json!({}))
            .await
            .unwrap();

        let paths: Vec<String> = store
            .documents("users")
            .await
            .unwrap()
            .into_iter()
            .map(|(path, _)| path.to_string())
            .collect();

        assert_eq!(paths, vec!["users/a", "users/b"]);
    }

    #[tokio::test]
    async fn subscription_sees_commits() {
        let store = store().await;
        let path = DocumentPath::new("users", "u-1");
        store
            .write_if_version(&path, None, json!({ "n": 1 }))
            .await
            .unwrap();

        let mut updates = store.subscribe_document(&path).await.unwrap();
        assert_eq!(updates.next().await.unwrap().unwrap().unwrap().version, 1);

        store
            .write_if_version(&path, Some(1), json!({ "n": 2 }))
            .await
            .unwrap();
        let next = updates.next().await.unwrap().unwrap().unwrap();
        assert_eq!(next.body, json!({ "n": 2 }));
    }
}
