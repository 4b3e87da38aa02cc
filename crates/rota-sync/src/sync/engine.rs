//! The generic pull/push strategy shared by every entity type.

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::entity::{RouteRef, SyncEntity};
use super::mapping::{self, MappingError};
use super::metadata::{MetadataStore, SyncMetadata};
use super::{Clock, Connectivity, Direction, SyncError, SyncHandler, SyncReport};
use crate::assets::{outgoing_document, AssetReconciler};
use crate::config::SyncSettings;
use crate::db::{LocalRecord, LocalStore};
use crate::integrity::{self, Verdict};
use crate::models::{flexible, EntityKind, RecordId};
use crate::remote::{RemoteDocument, RemoteStore};
use crate::storage::BlobStore;
use crate::tenant::{self, Resolution, TenantScope};

/// Collaborators shared by every handler of one device.
#[derive(Clone)]
pub struct SyncContext {
    pub local: Arc<dyn LocalStore>,
    pub remote: Arc<dyn RemoteStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub connectivity: Arc<dyn Connectivity>,
    pub clock: Arc<dyn Clock>,
    pub settings: SyncSettings,
}

/// Running tally of one pull over one entity type.
pub struct PullBatch {
    report: SyncReport,
    /// Highest server timestamp fetched
    newest: Option<i64>,
    /// Earliest server timestamp of a candidate that must be fetched again
    oldest_retry: Option<i64>,
    /// A remote query failed, so candidates may be missing entirely
    stalled: bool,
    seen: BTreeSet<RecordId>,
}

impl PullBatch {
    fn new(kind: EntityKind) -> Self {
        Self {
            report: SyncReport::new(kind, Direction::Pull),
            newest: None,
            oldest_retry: None,
            stalled: false,
            seen: BTreeSet::new(),
        }
    }

    fn observe(&mut self, server_ts: Option<i64>) {
        if let Some(ts) = server_ts {
            self.newest = Some(self.newest.map_or(ts, |newest| newest.max(ts)));
        }
    }

    fn retry(&mut self, server_ts: Option<i64>) {
        if let Some(ts) = server_ts {
            self.oldest_retry = Some(self.oldest_retry.map_or(ts, |oldest| oldest.min(ts)));
        }
    }

    /// The next watermark. It never moves backwards and never passes a
    /// candidate that has to be fetched again.
    fn watermark(&self, previous: i64, timestamp_override: Option<i64>) -> i64 {
        if self.stalled {
            return previous;
        }
        let computed = timestamp_override.or_else(|| {
            self.newest.map(|newest| match self.oldest_retry {
                Some(retry) => newest.min(retry - 1),
                None => newest,
            })
        });
        computed.map_or(previous, |next| next.max(previous))
    }
}

/// Running tally of one push over one entity type.
struct PushBatch {
    report: SyncReport,
    /// Earliest local modification that must be pushed again
    oldest_retry: Option<i64>,
}

impl PushBatch {
    fn new(kind: EntityKind) -> Self {
        Self {
            report: SyncReport::new(kind, Direction::Push),
            oldest_retry: None,
        }
    }

    fn retry(&mut self, updated_at: i64) {
        self.oldest_retry = Some(self.oldest_retry.map_or(updated_at, |oldest| oldest.min(updated_at)));
    }

    fn watermark(&self, previous: i64, started_at: i64) -> i64 {
        let next = match self.oldest_retry {
            Some(retry) => started_at.min(retry - 1),
            None => started_at,
        };
        next.max(previous)
    }
}

/// A child entity synced through its parent's handler.
#[async_trait]
pub trait ChildSync: Send + Sync {
    fn kind(&self) -> EntityKind;

    /// Pull the children of one parent that was just written locally.
    async fn pull_for_parent(&self, scope: &TenantScope, parent_id: RecordId, batch: &mut PullBatch);

    /// Pick up child-only remote changes, then persist the child watermark.
    async fn finish_pull(&self, scope: &TenantScope, batch: PullBatch) -> SyncReport;

    /// Push changed children whose parents are known remotely.
    async fn push_changed(&self, scope: &TenantScope) -> SyncReport;

    /// Fresh tally for a parent pull.
    fn begin_pull(&self) -> PullBatch {
        PullBatch::new(self.kind())
    }
}

/// Sync handler for one entity type.
pub struct EntitySync<T> {
    ctx: SyncContext,
    assets: AssetReconciler,
    children: Vec<Arc<dyn ChildSync>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T: SyncEntity> EntitySync<T> {
    pub fn new(ctx: SyncContext) -> Self {
        let assets = AssetReconciler::new(ctx.blobs.clone());
        Self {
            ctx,
            assets,
            children: Vec::new(),
            _entity: PhantomData,
        }
    }

    #[must_use]
    pub fn with_child(mut self, child: Arc<dyn ChildSync>) -> Self {
        self.children.push(child);
        self
    }

    fn entity_kind() -> EntityKind {
        T::descriptor().kind
    }

    fn failure_cap(&self) -> usize {
        self.ctx.settings.max_reported_failures
    }

    /// Save an entity edited on this device.
    ///
    /// The modification time is the current time, bumped past the stored row
    /// and its remote version so the change is always picked up by the next
    /// push and wins against its own echo.
    pub async fn save_local(&self, entity: &T) -> crate::Result<LocalRecord> {
        let kind = Self::entity_kind();
        let existing = self.ctx.local.get(kind, entity.id()).await?;

        let mut updated_at = self.ctx.clock.now_millis();
        let mut remote_version = None;
        let mut base = None;
        if let Some(existing) = &existing {
            updated_at = updated_at.max(existing.updated_at + 1);
            if let Some(version) = existing.remote_version {
                updated_at = updated_at.max(version + 1);
            }
            remote_version = existing.remote_version;
            base = Some(&existing.payload);
        }

        let payload = mapping::encode(entity, base)
            .map_err(|MappingError(message)| crate::Error::InvalidInput(message))?;
        let record = LocalRecord {
            id: entity.id(),
            updated_at,
            remote_version,
            payload,
        };
        self.ctx.local.upsert(kind, &record).await?;
        debug!(entity = %kind, id = record.id, updated_at, "Saved local change");
        Ok(record)
    }

    /// Load a stored entity.
    pub async fn load_local(&self, id: RecordId) -> crate::Result<Option<T>> {
        let Some(record) = self.ctx.local.get(Self::entity_kind(), id).await? else {
            return Ok(None);
        };
        mapping::decode(&record.payload)
            .map(Some)
            .map_err(|MappingError(message)| crate::Error::InvalidInput(message))
    }

    async fn load_metadata(&self) -> Result<SyncMetadata, SyncError> {
        self.ctx
            .metadata
            .load(Self::entity_kind())
            .await
            .map_err(|error| SyncError::Metadata {
                entity: Self::entity_kind(),
                message: error.to_string(),
            })
    }

    async fn save_metadata(&self, metadata: &SyncMetadata) {
        if let Err(error) = self.ctx.metadata.save(metadata).await {
            warn!(entity = %Self::entity_kind(), %error, "Failed to save sync metadata");
        }
    }

    async fn record_batch_error(&self, mut metadata: SyncMetadata, error: &SyncError) {
        metadata.last_error = Some(error.to_string());
        metadata.updated_at = self.ctx.clock.now_millis();
        self.save_metadata(&metadata).await;
    }

    // -----------------------------------------------------------------------
    // Pull
    // -----------------------------------------------------------------------

    /// Query the remote store once per route chunk and merge by document key.
    async fn fetch(&self, scope: &TenantScope, since: Option<i64>) -> crate::Result<Vec<RemoteDocument>> {
        let descriptor = T::descriptor();
        let collection = descriptor.collection();
        let mut merged = BTreeMap::new();

        for filter in scope.query_filters(descriptor.route_field, self.ctx.settings.where_in_limit) {
            let documents = match since {
                Some(since) => {
                    self.ctx
                        .remote
                        .get_modified_since(collection, filter.as_ref(), since)
                        .await?
                }
                None => self.ctx.remote.get_all(collection, filter.as_ref()).await?,
            };
            for document in documents {
                merged.insert(document.id.clone(), document);
            }
        }

        Ok(merged.into_values().collect())
    }

    async fn full_fetch(&self, scope: &TenantScope) -> Result<Vec<RemoteDocument>, SyncError> {
        self.fetch(scope, None)
            .await
            .map_err(|error| SyncError::RemoteQuery {
                entity: Self::entity_kind(),
                message: error.to_string(),
            })
    }

    /// Candidate documents and whether they came from a full query.
    async fn select_candidates(
        &self,
        scope: &TenantScope,
        metadata: &SyncMetadata,
    ) -> Result<(Vec<RemoteDocument>, bool), SyncError> {
        let kind = Self::entity_kind();
        if !metadata.has_pulled() {
            return self.full_fetch(scope).await.map(|documents| (documents, true));
        }

        match self.fetch(scope, Some(metadata.last_pull_at)).await {
            Ok(documents) if documents.is_empty() => {
                let local_count = self
                    .ctx
                    .local
                    .count(kind)
                    .await
                    .map_err(|error| SyncError::Local(error.to_string()))?;
                if local_count == 0 {
                    return Ok((documents, false));
                }
                debug!(entity = %kind, local_count, "Incremental pull empty, checking with a full query");
                self.full_fetch(scope).await.map(|documents| (documents, true))
            }
            Ok(documents) => Ok((documents, false)),
            Err(error) => {
                warn!(entity = %kind, %error, "Incremental query failed, falling back to a full query");
                self.full_fetch(scope).await.map(|documents| (documents, true))
            }
        }
    }

    /// Whether a rejected candidate is worth fetching again: only when it
    /// would belong to this device once its references arrive.
    async fn worth_retrying(&self, scope: &TenantScope, route_ref: RouteRef) -> bool {
        match tenant::resolve(self.ctx.local.as_ref(), route_ref).await {
            Ok(Resolution::Route(route_id)) => scope.contains(route_id),
            Ok(Resolution::Unscoped) | Err(_) => true,
            Ok(Resolution::Unresolved) => scope.sees_everything(),
        }
    }

    /// Run one remote document through mapping, the integrity gate, the
    /// tenant filter and last-writer-wins, and write it if it survives.
    /// Returns the id of a written record.
    async fn apply_candidate(
        &self,
        scope: &TenantScope,
        remote: &RemoteDocument,
        batch: &mut PullBatch,
    ) -> Option<RecordId> {
        let kind = Self::entity_kind();
        let descriptor = T::descriptor();
        let cap = self.failure_cap();
        let server_ts = remote.modified_at();
        batch.observe(server_ts);
        batch.report.bytes += remote.approx_bytes();

        let (id, mut document) = match mapping::canonical_document(descriptor, remote) {
            Ok(mapped) => mapped,
            Err(MappingError(message)) => {
                warn!(entity = %kind, key = %remote.id, %message, "Unmappable remote document");
                batch.report.record_failure(SyncError::RecordMapping(message).to_string(), cap);
                batch.retry(server_ts);
                return None;
            }
        };
        if !batch.seen.insert(id) {
            return None;
        }

        let original: T = match mapping::decode(&document) {
            Ok(entity) => entity,
            Err(MappingError(message)) => {
                warn!(entity = %kind, id, %message, "Malformed remote document");
                batch.report.record_failure(SyncError::RecordMapping(message).to_string(), cap);
                batch.retry(server_ts);
                return None;
            }
        };
        let original_ref = original.route_ref();

        let verdict = match integrity::check(self.ctx.local.as_ref(), scope, &original.foreign_keys()).await {
            Ok(verdict) => verdict,
            Err(error) => {
                batch.report.record_failure(SyncError::Local(error.to_string()).to_string(), cap);
                batch.retry(server_ts);
                return None;
            }
        };
        let substitutions = match verdict {
            Verdict::Pass { substitutions } => substitutions,
            rejected @ Verdict::Reject { .. } => {
                let missing = rejected.describe_missing();
                warn!(entity = %kind, id, %missing, "Skipping record with missing references");
                batch.report.skipped += 1;
                if self.worth_retrying(scope, original_ref).await {
                    batch.retry(server_ts);
                }
                return None;
            }
        };
        integrity::apply(kind, id, &substitutions, &mut document);

        // a reassigned reference never widens visibility: the scope is judged
        // on the record as it arrived unless it carried no route at all
        let route_ref = if original_ref == RouteRef::Unknown && !substitutions.is_empty() {
            match mapping::decode::<T>(&document) {
                Ok(entity) => entity.route_ref(),
                Err(_) => original_ref,
            }
        } else {
            original_ref
        };
        match tenant::resolve(self.ctx.local.as_ref(), route_ref).await {
            Ok(resolution) if scope.admits(resolution) => {}
            Ok(resolution) => {
                debug!(entity = %kind, id, ?resolution, "Outside tenant scope");
                batch.report.skipped += 1;
                return None;
            }
            Err(error) => {
                batch.report.record_failure(SyncError::Local(error.to_string()).to_string(), cap);
                batch.retry(server_ts);
                return None;
            }
        }

        let local = match self.ctx.local.get(kind, id).await {
            Ok(local) => local,
            Err(error) => {
                batch.report.record_failure(SyncError::Local(error.to_string()).to_string(), cap);
                batch.retry(server_ts);
                return None;
            }
        };
        let remote_ts = server_ts.unwrap_or_else(|| original.updated_at());
        if let Some(existing) = &local {
            let threshold = existing.updated_at.saturating_add(self.ctx.settings.conflict_grace_ms);
            if remote_ts <= threshold {
                debug!(entity = %kind, id, remote_ts, local_ts = existing.updated_at, "Local copy is current");
                batch.report.skipped += 1;
                self.restore_assets(existing, server_ts, batch).await;
                return None;
            }
            mapping::preserve_protected(descriptor, &existing.payload, &mut document);
        }

        let base = local.as_ref().map(|record| &record.payload);
        let encoded = mapping::decode::<T>(&document).and_then(|entity| mapping::encode(&entity, base));
        let mut stored = match encoded {
            Ok(stored) => stored,
            Err(MappingError(message)) => {
                batch.report.record_failure(SyncError::RecordMapping(message).to_string(), cap);
                batch.retry(server_ts);
                return None;
            }
        };

        let outcome = self
            .assets
            .on_pull(kind, id, descriptor.assets, base, &mut stored)
            .await;
        batch.report.asset_failures += outcome.failures;
        if outcome.failures > 0 {
            batch.retry(server_ts);
        }

        let record = LocalRecord::from_remote(id, remote_ts, stored);
        if let Err(error) = self.ctx.local.upsert(kind, &record).await {
            warn!(entity = %kind, id, %error, "Failed to write pulled record");
            let error = SyncError::Write {
                entity: kind,
                message: error.to_string(),
            };
            batch.report.record_failure(error.to_string(), cap);
            batch.retry(server_ts);
            return None;
        }

        debug!(entity = %kind, id, remote_ts, "Pulled record");
        batch.report.synced += 1;
        Some(id)
    }

    /// Download assets a current local row still lacks and store them without
    /// touching its timestamps.
    async fn restore_assets(&self, existing: &LocalRecord, server_ts: Option<i64>, batch: &mut PullBatch) {
        let kind = Self::entity_kind();
        let assets = T::descriptor().assets;
        if assets.is_empty() {
            return;
        }

        let mut payload = existing.payload.clone();
        let outcome = self.assets.restore(kind, existing.id, assets, &mut payload).await;
        batch.report.asset_failures += outcome.failures;
        if outcome.failures > 0 {
            batch.retry(server_ts);
        }
        if !outcome.rewritten {
            return;
        }

        let restored = LocalRecord {
            payload,
            ..existing.clone()
        };
        if let Err(error) = self.ctx.local.update(kind, &restored).await {
            warn!(entity = %kind, id = existing.id, %error, "Failed to store restored assets");
            let error = SyncError::Write {
                entity: kind,
                message: error.to_string(),
            };
            batch.report.record_failure(error.to_string(), self.failure_cap());
            batch.retry(server_ts);
        }
    }

    async fn run_pull(
        &self,
        scope: &TenantScope,
        timestamp_override: Option<i64>,
    ) -> Result<SyncReport, SyncError> {
        let kind = Self::entity_kind();
        let started = Instant::now();
        let mut metadata = self.load_metadata().await?;

        let (documents, full_pull) = match self.select_candidates(scope, &metadata).await {
            Ok(selected) => selected,
            Err(error) => {
                self.record_batch_error(metadata, &error).await;
                return Err(error);
            }
        };

        let mut batch = PullBatch::new(kind);
        batch.report.full_pull = full_pull;
        let mut child_batches: Vec<PullBatch> =
            self.children.iter().map(|child| child.begin_pull()).collect();

        for document in &documents {
            let Some(id) = self.apply_candidate(scope, document, &mut batch).await else {
                continue;
            };
            for (child, child_batch) in self.children.iter().zip(child_batches.iter_mut()) {
                child.pull_for_parent(scope, id, child_batch).await;
            }
        }

        for (child, child_batch) in self.children.iter().zip(child_batches) {
            let child_report = child.finish_pull(scope, child_batch).await;
            batch.report.children.push(child_report);
        }

        let watermark = batch.watermark(metadata.last_pull_at, timestamp_override);
        let mut report = batch.report;
        report.duration_ms = elapsed_ms(started);

        metadata.last_pull_at = watermark;
        metadata.last_pull_count = count(report.synced);
        metadata.last_duration_ms = report.duration_ms;
        metadata.bytes_transferred += bytes(report.bytes);
        metadata.last_error = report.error_summary();
        metadata.updated_at = self.ctx.clock.now_millis();
        self.save_metadata(&metadata).await;

        info!(
            entity = %kind,
            synced = report.synced,
            skipped = report.skipped,
            failed = report.failed,
            children = report.child_synced(),
            full_pull,
            watermark,
            "Pull complete"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Push
    // -----------------------------------------------------------------------

    /// Whether a child's parent has reached the remote store.
    async fn parent_is_remote(&self, payload: &crate::remote::Document) -> crate::Result<bool> {
        let Some(parent) = T::descriptor().parent else {
            return Ok(true);
        };
        let Some(parent_id) = payload.get(parent.field).and_then(flexible::value_to_i64) else {
            return Ok(false);
        };
        Ok(self
            .ctx
            .local
            .get(parent.kind, parent_id)
            .await?
            .is_some_and(|record| record.remote_version.is_some()))
    }

    async fn push_record(&self, scope: &TenantScope, record: LocalRecord, batch: &mut PushBatch) {
        let kind = Self::entity_kind();
        let descriptor = T::descriptor();
        let cap = self.failure_cap();

        let entity: T = match mapping::decode(&record.payload) {
            Ok(entity) => entity,
            Err(MappingError(message)) => {
                warn!(entity = %kind, id = record.id, %message, "Local row cannot be pushed");
                batch.report.record_failure(SyncError::RecordMapping(message).to_string(), cap);
                batch.retry(record.updated_at);
                return;
            }
        };

        match tenant::resolve(self.ctx.local.as_ref(), entity.route_ref()).await {
            Ok(resolution) if scope.admits(resolution) => {}
            Ok(resolution) => {
                debug!(entity = %kind, id = record.id, ?resolution, "Outside tenant scope, not pushed");
                batch.report.skipped += 1;
                return;
            }
            Err(error) => {
                batch.report.record_failure(SyncError::Local(error.to_string()).to_string(), cap);
                batch.retry(record.updated_at);
                return;
            }
        }

        if descriptor.parent.is_some() {
            let gate = match integrity::check(self.ctx.local.as_ref(), scope, &entity.foreign_keys()).await {
                Ok(verdict) => verdict,
                Err(error) => {
                    batch.report.record_failure(SyncError::Local(error.to_string()).to_string(), cap);
                    batch.retry(record.updated_at);
                    return;
                }
            };
            if let rejected @ Verdict::Reject { .. } = gate {
                let missing = rejected.describe_missing();
                warn!(entity = %kind, id = record.id, %missing, "Not pushing record with missing references");
                batch.report.skipped += 1;
                return;
            }
            match self.parent_is_remote(&record.payload).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(entity = %kind, id = record.id, "Parent not pushed yet, deferring");
                    batch.report.skipped += 1;
                    batch.retry(record.updated_at);
                    return;
                }
                Err(error) => {
                    batch.report.record_failure(SyncError::Local(error.to_string()).to_string(), cap);
                    batch.retry(record.updated_at);
                    return;
                }
            }
        }

        let mut document = record.payload.clone();
        let outcome = self
            .assets
            .on_push(kind, record.id, descriptor.assets, &mut document)
            .await;
        let mut asset_failures = outcome.failures;
        if outcome.rewritten {
            let rewritten = LocalRecord {
                payload: document.clone(),
                ..record.clone()
            };
            if let Err(error) = self.ctx.local.update(kind, &rewritten).await {
                // the row keeps its local paths, so the next push uploads again
                warn!(entity = %kind, id = record.id, %error, "Failed to store uploaded asset URLs");
                asset_failures += 1;
            }
        }
        batch.report.asset_failures += asset_failures;

        let outgoing = outgoing_document(self.ctx.blobs.as_ref(), descriptor.assets, &document);
        let size = serde_json::to_vec(&outgoing).map_or(0, |encoded| encoded.len() as u64);
        let server_ts = match self
            .ctx
            .remote
            .upsert(descriptor.collection(), &record.id.to_string(), outgoing)
            .await
        {
            Ok(server_ts) => server_ts,
            Err(error) => {
                warn!(entity = %kind, id = record.id, %error, "Remote write failed");
                let error = SyncError::Write {
                    entity: kind,
                    message: error.to_string(),
                };
                batch.report.record_failure(error.to_string(), cap);
                batch.retry(record.updated_at);
                return;
            }
        };

        let pending = asset_failures > 0;
        match self
            .ctx
            .local
            .mark_pushed(kind, record.id, record.updated_at, server_ts, pending)
            .await
        {
            Ok(true) => {}
            Ok(false) => debug!(entity = %kind, id = record.id, "Row changed during push"),
            Err(error) => warn!(entity = %kind, id = record.id, %error, "Failed to mark row as pushed"),
        }
        if pending {
            batch.retry(record.updated_at.min(server_ts));
        }

        debug!(entity = %kind, id = record.id, server_ts, "Pushed record");
        batch.report.synced += 1;
        batch.report.bytes += size;
    }

    async fn run_push(&self, scope: &TenantScope) -> Result<SyncReport, SyncError> {
        let kind = Self::entity_kind();
        let started = Instant::now();
        let started_at = self.ctx.clock.now_millis();
        let mut metadata = self.load_metadata().await?;
        let mut batch = PushBatch::new(kind);
        let page_size = self.ctx.settings.page_size.max(1);

        let mut after_id = None;
        loop {
            let page = match self
                .ctx
                .local
                .changed_since(kind, metadata.last_push_at, after_id, page_size)
                .await
            {
                Ok(page) => page,
                Err(error) => {
                    let error = SyncError::Local(error.to_string());
                    self.record_batch_error(metadata, &error).await;
                    return Err(error);
                }
            };
            let Some(last) = page.last() else {
                break;
            };
            after_id = Some(last.id);
            let exhausted = page.len() < page_size;

            for record in page {
                self.push_record(scope, record, &mut batch).await;
            }
            if exhausted {
                break;
            }
        }

        for child in &self.children {
            batch.report.children.push(child.push_changed(scope).await);
        }

        let watermark = batch.watermark(metadata.last_push_at, started_at);
        let mut report = batch.report;
        report.duration_ms = elapsed_ms(started);

        metadata.last_push_at = watermark;
        metadata.last_push_count = count(report.synced);
        metadata.last_duration_ms = report.duration_ms;
        metadata.bytes_transferred += bytes(report.bytes);
        metadata.last_error = report.error_summary();
        metadata.updated_at = self.ctx.clock.now_millis();
        self.save_metadata(&metadata).await;

        info!(
            entity = %kind,
            synced = report.synced,
            skipped = report.skipped,
            failed = report.failed,
            children = report.child_synced(),
            "Push complete"
        );
        Ok(report)
    }

    fn ensure_connected(&self) -> Result<(), SyncError> {
        if self.ctx.connectivity.is_connected() {
            Ok(())
        } else {
            warn!(entity = %Self::entity_kind(), "Skipping sync while offline");
            Err(SyncError::Connectivity)
        }
    }
}

#[async_trait]
impl<T: SyncEntity> SyncHandler for EntitySync<T> {
    fn kind(&self) -> EntityKind {
        Self::entity_kind()
    }

    async fn pull(
        &self,
        scope: &TenantScope,
        timestamp_override: Option<i64>,
    ) -> Result<SyncReport, SyncError> {
        self.ensure_connected()?;
        self.run_pull(scope, timestamp_override).await
    }

    async fn push(&self, scope: &TenantScope) -> Result<SyncReport, SyncError> {
        self.ensure_connected()?;
        self.run_push(scope).await
    }
}

#[async_trait]
impl<T: SyncEntity> ChildSync for EntitySync<T> {
    fn kind(&self) -> EntityKind {
        Self::entity_kind()
    }

    async fn pull_for_parent(&self, scope: &TenantScope, parent_id: RecordId, batch: &mut PullBatch) {
        let Some(parent) = T::descriptor().parent else {
            return;
        };
        let collection = T::descriptor().collection();

        match self
            .ctx
            .remote
            .get_where(collection, parent.field, &Value::from(parent_id))
            .await
        {
            Ok(documents) => {
                for document in &documents {
                    self.apply_candidate(scope, document, batch).await;
                }
            }
            Err(error) => {
                warn!(entity = %Self::entity_kind(), parent_id, %error, "Child query failed");
                let error = SyncError::RemoteQuery {
                    entity: Self::entity_kind(),
                    message: error.to_string(),
                };
                batch.report.record_failure(error.to_string(), self.failure_cap());
                batch.stalled = true;
            }
        }
    }

    async fn finish_pull(&self, scope: &TenantScope, mut batch: PullBatch) -> SyncReport {
        let kind = Self::entity_kind();
        let started = Instant::now();
        let mut metadata = match self.load_metadata().await {
            Ok(metadata) => metadata,
            Err(error) => {
                warn!(entity = %kind, %error, "Child metadata unavailable");
                batch.report.record_failure(error.to_string(), self.failure_cap());
                return batch.report;
            }
        };

        // children edited remotely without touching their parent, or every
        // child when a per-parent query failed
        let collection = T::descriptor().collection();
        let swept = if batch.stalled {
            Some(self.ctx.remote.get_all(collection, None).await)
        } else if metadata.has_pulled() {
            match self
                .ctx
                .remote
                .get_modified_since(collection, None, metadata.last_pull_at)
                .await
            {
                Ok(documents) => Some(Ok(documents)),
                Err(error) => {
                    warn!(entity = %kind, %error, "Child incremental query failed, falling back to full query");
                    Some(self.ctx.remote.get_all(collection, None).await)
                }
            }
        } else {
            None
        };
        match swept {
            Some(Ok(documents)) => {
                for document in &documents {
                    self.apply_candidate(scope, document, &mut batch).await;
                }
                batch.stalled = false;
            }
            Some(Err(error)) => {
                warn!(entity = %kind, %error, "Child query failed, keeping the watermark");
                let error = SyncError::RemoteQuery {
                    entity: kind,
                    message: error.to_string(),
                };
                batch.report.record_failure(error.to_string(), self.failure_cap());
                batch.stalled = true;
            }
            None => {}
        }

        let watermark = batch.watermark(metadata.last_pull_at, None);
        let mut report = batch.report;
        report.duration_ms = elapsed_ms(started);

        metadata.last_pull_at = watermark;
        metadata.last_pull_count = count(report.synced);
        metadata.last_duration_ms = report.duration_ms;
        metadata.bytes_transferred += bytes(report.bytes);
        metadata.last_error = report.error_summary();
        metadata.updated_at = self.ctx.clock.now_millis();
        self.save_metadata(&metadata).await;
        report
    }

    async fn push_changed(&self, scope: &TenantScope) -> SyncReport {
        match self.run_push(scope).await {
            Ok(report) => report,
            Err(error) => {
                let mut report = SyncReport::new(Self::entity_kind(), Direction::Push);
                report.record_failure(error.to_string(), self.failure_cap());
                report
            }
        }
    }
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

fn count(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn bytes(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
