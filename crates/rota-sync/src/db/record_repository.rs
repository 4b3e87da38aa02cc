//! Local record store backed by the libSQL `records` table

use async_trait::async_trait;
use libsql::{params, Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{EntityKind, RecordId};
use crate::remote::Document;

/// A local row: the typed entity as JSON plus sync bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalRecord {
    pub id: RecordId,
    /// Last modification (epoch ms)
    pub updated_at: i64,
    /// Server timestamp of the version last exchanged with the remote store
    pub remote_version: Option<i64>,
    pub payload: Document,
}

impl LocalRecord {
    /// A row mirroring the remote version stamped at `server_ts`.
    #[must_use]
    pub fn from_remote(id: RecordId, server_ts: i64, payload: Document) -> Self {
        Self {
            id,
            updated_at: server_ts,
            remote_version: Some(server_ts),
            payload,
        }
    }

    /// A row changed locally and not yet pushed.
    #[must_use]
    pub const fn local(id: RecordId, updated_at: i64, payload: Document) -> Self {
        Self {
            id,
            updated_at,
            remote_version: None,
            payload,
        }
    }

    /// Whether this row holds changes the remote store has not seen.
    #[must_use]
    pub fn has_unpushed_changes(&self) -> bool {
        self.remote_version
            .is_none_or(|remote_version| self.updated_at > remote_version)
    }
}

/// Storage operations the sync engine needs from the device database.
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn get(&self, kind: EntityKind, id: RecordId) -> Result<Option<LocalRecord>>;

    async fn exists(&self, kind: EntityKind, id: RecordId) -> Result<bool>;

    async fn count(&self, kind: EntityKind) -> Result<u64>;

    /// Rows ordered by id, starting after `after_id`.
    async fn page(
        &self,
        kind: EntityKind,
        after_id: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<LocalRecord>>;

    /// Rows with unpushed changes made after `since`, ordered by id.
    async fn changed_since(
        &self,
        kind: EntityKind,
        since: i64,
        after_id: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<LocalRecord>>;

    /// Insert a new row. Fails if the id is taken.
    async fn insert(&self, kind: EntityKind, record: &LocalRecord) -> Result<()>;

    /// Replace an existing row. Fails with `NotFound` if it is missing.
    async fn update(&self, kind: EntityKind, record: &LocalRecord) -> Result<()>;

    async fn upsert(&self, kind: EntityKind, record: &LocalRecord) -> Result<()>;

    /// Rows whose payload `parent_field` equals `parent_id`.
    async fn children(
        &self,
        kind: EntityKind,
        parent_field: &str,
        parent_id: RecordId,
    ) -> Result<Vec<LocalRecord>>;

    /// Record that the version modified at `pushed_updated_at` was accepted
    /// remotely at `server_ts`. A row edited since then is left untouched.
    ///
    /// With `pending` the row stays one millisecond ahead of the remote
    /// version, so it is pushed again and its own echo does not overwrite it.
    async fn mark_pushed(
        &self,
        kind: EntityKind,
        id: RecordId,
        pushed_updated_at: i64,
        server_ts: i64,
        pending: bool,
    ) -> Result<bool>;
}

/// libSQL implementation of `LocalStore`
#[derive(Clone)]
pub struct LibSqlLocalStore {
    conn: Connection,
}

impl LibSqlLocalStore {
    /// Create a new store over a shared connection
    pub const fn new(conn: Connection) -> Self {
        Self { conn }
    }

    async fn collect(&self, sql: &str, params: Vec<Value>) -> Result<Vec<LocalRecord>> {
        let mut rows = self.conn.query(sql, params).await?;
        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            records.push(row_to_record(&row)?);
        }
        Ok(records)
    }
}

const COLUMNS: &str = "id, updated_at, remote_version, payload";

#[async_trait]
impl LocalStore for LibSqlLocalStore {
    async fn get(&self, kind: EntityKind, id: RecordId) -> Result<Option<LocalRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {COLUMNS} FROM records WHERE kind = ? AND id = ?"),
                params![kind.as_str(), id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(row_to_record(&row)?)),
            None => Ok(None),
        }
    }

    async fn exists(&self, kind: EntityKind, id: RecordId) -> Result<bool> {
        let mut rows = self
            .conn
            .query(
                "SELECT EXISTS(SELECT 1 FROM records WHERE kind = ? AND id = ?)",
                params![kind.as_str(), id],
            )
            .await?;

        Ok(match rows.next().await? {
            Some(row) => row.get::<i64>(0)? != 0,
            None => false,
        })
    }

    async fn count(&self, kind: EntityKind) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM records WHERE kind = ?",
                params![kind.as_str()],
            )
            .await?;

        let count = match rows.next().await? {
            Some(row) => row.get::<i64>(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn page(
        &self,
        kind: EntityKind,
        after_id: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<LocalRecord>> {
        self.collect(
            &format!(
                "SELECT {COLUMNS} FROM records
                 WHERE kind = ? AND id > ?
                 ORDER BY id ASC
                 LIMIT ?"
            ),
            vec![
                Value::from(kind.as_str()),
                Value::Integer(after_id.unwrap_or(i64::MIN)),
                Value::Integer(limit_param(limit)),
            ],
        )
        .await
    }

    async fn changed_since(
        &self,
        kind: EntityKind,
        since: i64,
        after_id: Option<RecordId>,
        limit: usize,
    ) -> Result<Vec<LocalRecord>> {
        self.collect(
            &format!(
                "SELECT {COLUMNS} FROM records
                 WHERE kind = ? AND id > ? AND updated_at > ?
                   AND (remote_version IS NULL OR updated_at > remote_version)
                 ORDER BY id ASC
                 LIMIT ?"
            ),
            vec![
                Value::from(kind.as_str()),
                Value::Integer(after_id.unwrap_or(i64::MIN)),
                Value::Integer(since),
                Value::Integer(limit_param(limit)),
            ],
        )
        .await
    }

    async fn insert(&self, kind: EntityKind, record: &LocalRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO records (kind, id, updated_at, remote_version, payload)
                 VALUES (?, ?, ?, ?, ?)",
                record_params(kind, record)?,
            )
            .await?;
        Ok(())
    }

    async fn update(&self, kind: EntityKind, record: &LocalRecord) -> Result<()> {
        let [kind_value, id, updated_at, remote_version, payload] = record_params(kind, record)?;
        let changed = self
            .conn
            .execute(
                "UPDATE records
                 SET updated_at = ?, remote_version = ?, payload = ?
                 WHERE kind = ? AND id = ?",
                vec![updated_at, remote_version, payload, kind_value, id],
            )
            .await?;

        if changed == 0 {
            return Err(Error::NotFound(format!("{kind}/{}", record.id)));
        }
        Ok(())
    }

    async fn upsert(&self, kind: EntityKind, record: &LocalRecord) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO records (kind, id, updated_at, remote_version, payload)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(kind, id) DO UPDATE SET
                    updated_at = excluded.updated_at,
                    remote_version = excluded.remote_version,
                    payload = excluded.payload",
                record_params(kind, record)?,
            )
            .await?;
        Ok(())
    }

    async fn children(
        &self,
        kind: EntityKind,
        parent_field: &str,
        parent_id: RecordId,
    ) -> Result<Vec<LocalRecord>> {
        self.collect(
            &format!(
                "SELECT {COLUMNS} FROM records
                 WHERE kind = ? AND json_extract(payload, ?) = ?
                 ORDER BY id ASC"
            ),
            vec![
                Value::from(kind.as_str()),
                Value::from(format!("$.{parent_field}")),
                Value::Integer(parent_id),
            ],
        )
        .await
    }

    async fn mark_pushed(
        &self,
        kind: EntityKind,
        id: RecordId,
        pushed_updated_at: i64,
        server_ts: i64,
        pending: bool,
    ) -> Result<bool> {
        let updated_at = if pending { server_ts + 1 } else { server_ts };
        let changed = self
            .conn
            .execute(
                "UPDATE records
                 SET remote_version = ?1,
                     updated_at = ?2,
                     payload = json_set(payload, '$.updated_at', ?2)
                 WHERE kind = ?3 AND id = ?4 AND updated_at = ?5",
                params![server_ts, updated_at, kind.as_str(), id, pushed_updated_at],
            )
            .await?;
        Ok(changed > 0)
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

fn record_params(kind: EntityKind, record: &LocalRecord) -> Result<[Value; 5]> {
    let mut payload = record.payload.clone();
    // the envelope column is authoritative for the modification time
    payload.insert("updated_at".to_string(), record.updated_at.into());
    Ok([
        Value::from(kind.as_str()),
        Value::Integer(record.id),
        Value::Integer(record.updated_at),
        record.remote_version.map_or(Value::Null, Value::Integer),
        Value::Text(serde_json::to_string(&payload)?),
    ])
}

fn row_to_record(row: &Row) -> Result<LocalRecord> {
    let id: i64 = row.get(0)?;
    let updated_at: i64 = row.get(1)?;
    let remote_version = match row.get_value(2)? {
        Value::Integer(value) => Some(value),
        Value::Null => None,
        other => {
            return Err(Error::Database(format!(
                "Unexpected remote_version value: {other:?}"
            )))
        }
    };
    let payload: String = row.get(3)?;
    let payload: Document = serde_json::from_str(&payload)?;

    Ok(LocalRecord {
        id,
        updated_at,
        remote_version,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn setup() -> (Database, LibSqlLocalStore) {
        let db = Database::open_in_memory().await.unwrap();
        let store = LibSqlLocalStore::new(db.connection().clone());
        (db, store)
    }

    fn doc(value: serde_json::Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_insert_and_get() {
        let (_db, store) = setup().await;
        let record = LocalRecord::local(1, 100, doc(json!({"id": 1, "name": "Bar do Zé"})));

        store.insert(EntityKind::Client, &record).await.unwrap();

        let loaded = store.get(EntityKind::Client, 1).await.unwrap().unwrap();
        assert_eq!(loaded.updated_at, 100);
        assert_eq!(loaded.remote_version, None);
        assert_eq!(loaded.payload["name"], json!("Bar do Zé"));
        assert_eq!(loaded.payload["updated_at"], json!(100));

        assert!(store.exists(EntityKind::Client, 1).await.unwrap());
        assert!(!store.exists(EntityKind::Route, 1).await.unwrap());
        assert!(store.insert(EntityKind::Client, &record).await.is_err());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_update_missing_row_is_not_found() {
        let (_db, store) = setup().await;
        let record = LocalRecord::local(9, 1, Document::new());

        let err = store.update(EntityKind::Table, &record).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_page_walks_ids_in_order() {
        let (_db, store) = setup().await;
        for id in [5, 1, 3, 2, 4] {
            store
                .upsert(EntityKind::Route, &LocalRecord::local(id, 10, Document::new()))
                .await
                .unwrap();
        }

        let first = store.page(EntityKind::Route, None, 2).await.unwrap();
        let ids: Vec<_> = first.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![1, 2]);

        let rest = store.page(EntityKind::Route, Some(2), 10).await.unwrap();
        let ids: Vec<_> = rest.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![3, 4, 5]);
        assert_eq!(store.count(EntityKind::Route).await.unwrap(), 5);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_changed_since_skips_remote_mirrors() {
        let (_db, store) = setup().await;
        store
            .upsert(EntityKind::Client, &LocalRecord::local(1, 200, Document::new()))
            .await
            .unwrap();
        store
            .upsert(
                EntityKind::Client,
                &LocalRecord::from_remote(2, 300, Document::new()),
            )
            .await
            .unwrap();
        store
            .upsert(EntityKind::Client, &LocalRecord::local(3, 50, Document::new()))
            .await
            .unwrap();

        let pending = store
            .changed_since(EntityKind::Client, 100, None, 10)
            .await
            .unwrap();
        let ids: Vec<_> = pending.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_children_match_payload_field() {
        let (_db, store) = setup().await;
        for (id, settlement_id) in [(1, 10), (2, 10), (3, 11)] {
            let payload = doc(json!({"id": id, "settlement_id": settlement_id}));
            store
                .upsert(EntityKind::SettlementItem, &LocalRecord::local(id, 1, payload))
                .await
                .unwrap();
        }

        let items = store
            .children(EntityKind::SettlementItem, "settlement_id", 10)
            .await
            .unwrap();
        let ids: Vec<_> = items.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_pushed_ignores_concurrent_edit() {
        let (_db, store) = setup().await;
        store
            .upsert(EntityKind::Expense, &LocalRecord::local(1, 100, Document::new()))
            .await
            .unwrap();

        assert!(!store.mark_pushed(EntityKind::Expense, 1, 99, 500, false).await.unwrap());
        assert!(store.mark_pushed(EntityKind::Expense, 1, 100, 500, false).await.unwrap());

        let loaded = store.get(EntityKind::Expense, 1).await.unwrap().unwrap();
        assert_eq!(loaded.remote_version, Some(500));
        assert_eq!(loaded.updated_at, 500);
        assert_eq!(loaded.payload["updated_at"], json!(500));
        assert!(!loaded.has_unpushed_changes());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_mark_pushed_pending_keeps_row_ahead() {
        let (_db, store) = setup().await;
        store
            .upsert(EntityKind::Expense, &LocalRecord::local(1, 100, Document::new()))
            .await
            .unwrap();

        assert!(store.mark_pushed(EntityKind::Expense, 1, 100, 500, true).await.unwrap());

        let loaded = store.get(EntityKind::Expense, 1).await.unwrap().unwrap();
        assert_eq!(loaded.remote_version, Some(500));
        assert_eq!(loaded.updated_at, 501);
        assert!(loaded.has_unpushed_changes());
    }
}
