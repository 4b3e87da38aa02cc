//! Entity synchronization between the local store and the remote store.
//!
//! Every entity type gets an [`EntitySync`] handler built from its
//! [`SyncEntity`] description. Handlers share one strategy:
//!
//! - **pull**: incremental query after the stored watermark, with a full
//!   query as fallback; each candidate goes through mapping, the referential
//!   integrity gate, the tenant filter and last-writer-wins before it is
//!   written.
//! - **push**: rows changed since the last push are uploaded with their
//!   photos and stamped with the server timestamp.
//!
//! Per-record problems are tallied in a [`SyncReport`]; only whole-batch
//! failures come back as [`SyncError`].

mod clock;
mod connectivity;
mod engine;
mod entity;
pub mod mapping;
mod metadata;
mod registry;


use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::EntityKind;
use crate::tenant::TenantScope;

pub use clock::{Clock, ManualClock, SystemClock};
pub use connectivity::{Connectivity, ConnectivityFlag};
pub use engine::{ChildSync, EntitySync, PullBatch, SyncContext};
pub use entity::{
    EntityDescriptor, Fallback, FieldAlias, ForeignKey, KeyRule, ParentLink, ProtectedField,
    RouteRef, SyncEntity,
};
pub use metadata::{MetadataStore, SyncMetadata};
pub use registry::{EntitySummary, SyncRegistry};

/// Whole-batch sync failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("No network connectivity")]
    Connectivity,

    #[error("Remote query failed for {entity}: {message}")]
    RemoteQuery { entity: EntityKind, message: String },

    #[error("Record mapping failed: {0}")]
    RecordMapping(String),

    #[error("Referential integrity violation: {0}")]
    ReferentialIntegrity(String),

    #[error("Asset transfer failed: {0}")]
    AssetTransfer(String),

    #[error("Write failed for {entity}: {message}")]
    Write { entity: EntityKind, message: String },

    #[error("Sync metadata unavailable for {entity}: {message}")]
    Metadata { entity: EntityKind, message: String },

    #[error("Local store error: {0}")]
    Local(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Pull,
    Push,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pull => f.write_str("pull"),
            Self::Push => f.write_str("push"),
        }
    }
}

/// Outcome of one pull or push of one entity type (children included).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    pub entity: EntityKind,
    pub direction: Direction,
    /// Records written locally (pull) or accepted remotely (push)
    pub synced: usize,
    /// Records left out on purpose: out of scope, older, missing references
    pub skipped: usize,
    /// Records that could not be mapped or written
    pub failed: usize,
    pub asset_failures: usize,
    pub bytes: u64,
    pub duration_ms: i64,
    /// Whether the pull ran as a full query
    pub full_pull: bool,
    /// First failure messages, capped
    pub failures: Vec<String>,
    pub children: Vec<SyncReport>,
}

impl SyncReport {
    #[must_use]
    pub const fn new(entity: EntityKind, direction: Direction) -> Self {
        Self {
            entity,
            direction,
            synced: 0,
            skipped: 0,
            failed: 0,
            asset_failures: 0,
            bytes: 0,
            duration_ms: 0,
            full_pull: false,
            failures: Vec::new(),
            children: Vec::new(),
        }
    }

    pub(crate) fn record_failure(&mut self, message: String, cap: usize) {
        self.failed += 1;
        if self.failures.len() < cap {
            self.failures.push(message);
        }
    }

    /// Records synced by child handlers.
    #[must_use]
    pub fn child_synced(&self) -> usize {
        self.children.iter().map(|child| child.synced).sum()
    }

    /// Whether anything went wrong, in this report or its children.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.failed > 0
            || self.asset_failures > 0
            || self.children.iter().any(Self::has_errors)
    }

    /// One-line error text for the metadata record, `None` when clean.
    #[must_use]
    pub fn error_summary(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.failed > 0 {
            parts.push(format!("{} failed", self.failed));
        }
        if self.asset_failures > 0 {
            parts.push(format!("{} asset transfers failed", self.asset_failures));
        }
        for child in &self.children {
            if let Some(summary) = child.error_summary() {
                parts.push(format!("{}: {summary}", child.entity));
            }
        }
        if parts.is_empty() {
            return None;
        }

        let mut summary = parts.join("; ");
        if let Some(first) = self.failures.first() {
            summary.push_str(" (");
            summary.push_str(&crate::util::compact_text(first));
            summary.push(')');
        }
        Some(summary)
    }
}

/// The contract every entity handler implements.
#[async_trait]
pub trait SyncHandler: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Remote → local. `timestamp_override` replaces the computed watermark.
    async fn pull(
        &self,
        scope: &TenantScope,
        timestamp_override: Option<i64>,
    ) -> Result<SyncReport, SyncError>;

    /// Local → remote.
    async fn push(&self, scope: &TenantScope) -> Result<SyncReport, SyncError>;
}

#[cfg(test)]
mod report_tests {
    use super::*;

    #[test]
    fn error_summary_includes_children() {
        let mut report = SyncReport::new(EntityKind::Settlement, Direction::Pull);
        assert_eq!(report.error_summary(), None);

        let mut child = SyncReport::new(EntityKind::SettlementItem, Direction::Pull);
        child.asset_failures = 1;
        report.children.push(child);
        report.record_failure("settlements 4 is malformed".to_string(), 1);
        report.record_failure("settlements 5 is malformed".to_string(), 1);

        assert!(report.has_errors());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.error_summary().unwrap(),
            "2 failed; settlement_items: 1 asset transfers failed (settlements 4 is malformed)"
        );
    }
}
