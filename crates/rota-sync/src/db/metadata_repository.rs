//! Sync metadata repository implementation

use async_trait::async_trait;
use libsql::{params, Connection, Row, Value};

use crate::error::Result;
use crate::models::EntityKind;
use crate::sync::{MetadataStore, SyncMetadata};

/// libSQL implementation of `MetadataStore`
#[derive(Clone)]
pub struct LibSqlSyncMetadataRepository {
    conn: Connection,
}

impl LibSqlSyncMetadataRepository {
    /// Create a new repository over a shared connection
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

const COLUMNS: &str = "entity_type, last_pull_at, last_push_at, last_duration_ms, last_error,
    bytes_transferred, last_pull_count, last_push_count, updated_at";

#[async_trait]
impl MetadataStore for LibSqlSyncMetadataRepository {
    async fn load(&self, kind: EntityKind) -> Result<SyncMetadata> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {COLUMNS} FROM sync_metadata WHERE entity_type = ?"),
                [kind.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => row_to_metadata(&row),
            None => Ok(SyncMetadata::new(kind)),
        }
    }

    async fn save(&self, metadata: &SyncMetadata) -> Result<()> {
        let last_error = metadata
            .last_error
            .clone()
            .map_or(Value::Null, Value::Text);

        self.conn
            .execute(
                &format!(
                    "INSERT INTO sync_metadata ({COLUMNS})
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                     ON CONFLICT(entity_type) DO UPDATE SET
                        last_pull_at = excluded.last_pull_at,
                        last_push_at = excluded.last_push_at,
                        last_duration_ms = excluded.last_duration_ms,
                        last_error = excluded.last_error,
                        bytes_transferred = excluded.bytes_transferred,
                        last_pull_count = excluded.last_pull_count,
                        last_push_count = excluded.last_push_count,
                        updated_at = excluded.updated_at"
                ),
                params![
                    metadata.entity_type.as_str(),
                    metadata.last_pull_at,
                    metadata.last_push_at,
                    metadata.last_duration_ms,
                    last_error,
                    metadata.bytes_transferred,
                    metadata.last_pull_count,
                    metadata.last_push_count,
                    metadata.updated_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn reset(&self, kind: EntityKind) -> Result<()> {
        self.conn
            .execute(
                "UPDATE sync_metadata
                 SET last_pull_at = 0, last_push_at = 0, last_error = NULL
                 WHERE entity_type = ?",
                [kind.as_str()],
            )
            .await?;
        tracing::info!(entity = %kind, "Sync metadata reset");
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<SyncMetadata>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {COLUMNS} FROM sync_metadata ORDER BY entity_type"),
                (),
            )
            .await?;

        let mut all = Vec::new();
        while let Some(row) = rows.next().await? {
            all.push(row_to_metadata(&row)?);
        }
        Ok(all)
    }
}

fn row_to_metadata(row: &Row) -> Result<SyncMetadata> {
    let last_error = match row.get_value(4)? {
        Value::Text(text) => Some(text),
        _ => None,
    };

    Ok(SyncMetadata {
        entity_type: row.get(0)?,
        last_pull_at: row.get(1)?,
        last_push_at: row.get(2)?,
        last_duration_ms: row.get(3)?,
        last_error,
        bytes_transferred: row.get(5)?,
        last_pull_count: row.get(6)?,
        last_push_count: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;

    async fn setup() -> (Database, LibSqlSyncMetadataRepository) {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlSyncMetadataRepository::new(db.connection().clone());
        (db, repo)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_load_unknown_entity_is_fresh() {
        let (_db, repo) = setup().await;

        let metadata = repo.load(EntityKind::Client).await.unwrap();
        assert_eq!(metadata, SyncMetadata::new(EntityKind::Client));
        assert!(!metadata.has_pulled());
        assert!(repo.list_all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_save_updates_in_place() {
        let (_db, repo) = setup().await;
        let mut metadata = SyncMetadata::new(EntityKind::Settlement);
        metadata.last_pull_at = 1_000;
        metadata.last_error = Some("2 failed".to_string());
        metadata.bytes_transferred = 512;
        repo.save(&metadata).await.unwrap();

        metadata.last_pull_at = 2_000;
        metadata.last_error = None;
        repo.save(&metadata).await.unwrap();

        let loaded = repo.load(EntityKind::Settlement).await.unwrap();
        assert_eq!(loaded, metadata);
        assert_eq!(repo.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reset_clears_watermarks_only() {
        let (_db, repo) = setup().await;
        let mut metadata = SyncMetadata::new(EntityKind::Route);
        metadata.last_pull_at = 10;
        metadata.last_push_at = 20;
        metadata.bytes_transferred = 99;
        repo.save(&metadata).await.unwrap();

        repo.reset(EntityKind::Route).await.unwrap();

        let loaded = repo.load(EntityKind::Route).await.unwrap();
        assert_eq!(loaded.last_pull_at, 0);
        assert_eq!(loaded.last_push_at, 0);
        assert_eq!(loaded.bytes_transferred, 99);
    }
}
