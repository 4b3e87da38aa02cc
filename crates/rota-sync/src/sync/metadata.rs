//! Per-entity sync bookkeeping

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::EntityKind;

/// One row per entity type, updated in place after every pull and push.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncMetadata {
    pub entity_type: String,
    /// Watermark of the last pull (server time, epoch ms). `0` means never.
    pub last_pull_at: i64,
    /// Start time of the last push (epoch ms). `0` means never.
    pub last_push_at: i64,
    pub last_duration_ms: i64,
    pub last_error: Option<String>,
    /// Cumulative bytes exchanged with the remote store
    pub bytes_transferred: i64,
    pub last_pull_count: i64,
    pub last_push_count: i64,
    /// Wall-clock time of the last write to this row
    pub updated_at: i64,
}

impl SyncMetadata {
    #[must_use]
    pub fn new(kind: EntityKind) -> Self {
        Self {
            entity_type: kind.as_str().to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn has_pulled(&self) -> bool {
        self.last_pull_at > 0
    }
}

#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Metadata for `kind`, or a fresh record if it was never synced.
    async fn load(&self, kind: EntityKind) -> Result<SyncMetadata>;

    async fn save(&self, metadata: &SyncMetadata) -> Result<()>;

    /// Forget the watermarks of `kind` so the next sync is a full one.
    async fn reset(&self, kind: EntityKind) -> Result<()>;

    async fn list_all(&self) -> Result<Vec<SyncMetadata>>;
}
