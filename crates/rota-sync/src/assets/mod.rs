//! Photo reconciliation between local files and the blob store.
//!
//! An asset field holds either a local file path or a remote URL. Its
//! companion `<field>_url` is local-only and remembers the remote URL the
//! local file corresponds to.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::models::{EntityKind, RecordId};
use crate::remote::Document;
use crate::storage::{build_object_key, local_file_name_for_url, BlobStore};

/// An entity field carrying a photo reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetField {
    pub field: &'static str,
    /// Object key prefix in the blob store
    pub folder: &'static str,
}

impl AssetField {
    /// Name of the local-only side channel.
    #[must_use]
    pub fn url_field(&self) -> String {
        format!("{}_url", self.field)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetOutcome {
    pub failures: usize,
    /// Whether a reference was rewritten by a transfer
    pub rewritten: bool,
}

pub struct AssetReconciler {
    blobs: Arc<dyn BlobStore>,
}

impl AssetReconciler {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Fetch remote photos of an accepted record into local storage.
    pub async fn on_pull(
        &self,
        kind: EntityKind,
        id: RecordId,
        assets: &[AssetField],
        local: Option<&Document>,
        incoming: &mut Document,
    ) -> AssetOutcome {
        let mut outcome = AssetOutcome::default();

        for asset in assets {
            let url_field = asset.url_field();
            let Some(url) = text(incoming, asset.field) else {
                incoming.insert(url_field, Value::Null);
                continue;
            };
            if !self.blobs.is_remote_url(&url) {
                // a path that only exists on the device that wrote it
                continue;
            }

            if let Some(path) = local.and_then(|local| existing_copy(local, asset, &url)) {
                incoming.insert(asset.field.to_string(), Value::String(path));
                incoming.insert(url_field, Value::String(url));
                continue;
            }

            self.download_into(kind, id, asset, url, incoming, &mut outcome).await;
        }

        outcome
    }

    /// Download photos a stored row still lacks: a reference left on its
    /// remote URL by a failed download, or a downloaded copy whose file is gone.
    pub async fn restore(
        &self,
        kind: EntityKind,
        id: RecordId,
        assets: &[AssetField],
        document: &mut Document,
    ) -> AssetOutcome {
        let mut outcome = AssetOutcome::default();

        for asset in assets {
            if let Some(url) = self.missing_copy(asset, document) {
                self.download_into(kind, id, asset, url, document, &mut outcome).await;
            }
        }

        outcome
    }

    fn missing_copy(&self, asset: &AssetField, document: &Document) -> Option<String> {
        let value = text(document, asset.field)?;
        if self.blobs.is_remote_url(&value) {
            return Some(value);
        }
        let path = Path::new(&value);
        if path.is_file() {
            return None;
        }
        text(document, &asset.url_field()).filter(|url| is_copy_of(path, url))
    }

    async fn download_into(
        &self,
        kind: EntityKind,
        id: RecordId,
        asset: &AssetField,
        url: String,
        document: &mut Document,
        outcome: &mut AssetOutcome,
    ) {
        match self.blobs.download(&url).await {
            Ok(path) => {
                debug!(entity = %kind, id, field = asset.field, "Downloaded asset");
                document.insert(
                    asset.field.to_string(),
                    Value::String(path.to_string_lossy().to_string()),
                );
                document.insert(asset.url_field(), Value::String(url));
                outcome.rewritten = true;
            }
            Err(error) => {
                warn!(entity = %kind, id, field = asset.field, %error, "Asset download failed");
                outcome.failures += 1;
            }
        }
    }

    /// Upload local photos of a record and point its fields at the uploads.
    pub async fn on_push(
        &self,
        kind: EntityKind,
        id: RecordId,
        assets: &[AssetField],
        document: &mut Document,
    ) -> AssetOutcome {
        let mut outcome = AssetOutcome::default();

        for asset in assets {
            let url_field = asset.url_field();
            let Some(value) = text(document, asset.field) else {
                continue;
            };
            if self.blobs.is_remote_url(&value) {
                continue;
            }

            let path = Path::new(&value);
            if let Some(url) = text(document, &url_field).filter(|url| is_copy_of(path, url)) {
                document.insert(asset.field.to_string(), Value::String(url));
                outcome.rewritten = true;
                continue;
            }

            let uploaded = match build_object_key(asset.folder, id, path) {
                Ok(key) => self.blobs.upload(path, &key).await,
                Err(error) => Err(error),
            };
            match uploaded {
                Ok(url) => {
                    debug!(entity = %kind, id, field = asset.field, "Uploaded asset");
                    document.insert(asset.field.to_string(), Value::String(url.clone()));
                    document.insert(url_field, Value::String(url));
                    outcome.rewritten = true;
                }
                Err(error) => {
                    warn!(entity = %kind, id, field = asset.field, %error, "Asset upload failed");
                    outcome.failures += 1;
                }
            }
        }

        outcome
    }
}

/// Remove local-only side channels from an outgoing document.
pub fn strip_side_channels(assets: &[AssetField], document: &mut Document) {
    for asset in assets {
        document.remove(&asset.url_field());
    }
}

/// The document as other devices should see it.
///
/// A reference still pointing at a local file (its upload failed) is sent as
/// the last known remote URL, or as null.
pub fn outgoing_document(
    blobs: &dyn BlobStore,
    assets: &[AssetField],
    document: &Document,
) -> Document {
    let mut outgoing = document.clone();
    for asset in assets {
        let is_local_path = text(&outgoing, asset.field).is_some_and(|value| !blobs.is_remote_url(&value));
        if is_local_path {
            let previous = text(&outgoing, &asset.url_field()).map_or(Value::Null, Value::String);
            outgoing.insert(asset.field.to_string(), previous);
        }
    }
    strip_side_channels(assets, &mut outgoing);
    outgoing
}

fn text(document: &Document, field: &str) -> Option<String> {
    document
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(ToOwned::to_owned)
}

/// Local path already holding the file behind `url`, if the file still exists.
fn existing_copy(local: &Document, asset: &AssetField, url: &str) -> Option<String> {
    let side = text(local, &asset.url_field())?;
    let path = text(local, asset.field)?;
    (side == url && !crate::util::is_http_url(&path) && Path::new(&path).is_file()).then_some(path)
}

/// Whether a local path is the downloaded copy of `url`.
fn is_copy_of(path: &Path, url: &str) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name == local_file_name_for_url(url))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryBlobStore;
    use serde_json::json;

    const RECEIPT: AssetField = AssetField {
        field: "receipt_photo",
        folder: "expenses",
    };

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn push_uploads_local_file_once() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(MemoryBlobStore::new(dir.path()));
        let reconciler = AssetReconciler::new(blobs.clone());

        let photo = dir.path().join("receipt.jpg");
        tokio::fs::write(&photo, b"receipt").await.unwrap();
        let mut document = doc(json!({"receipt_photo": photo.to_string_lossy()}));

        let outcome = reconciler
            .on_push(EntityKind::Expense, 3, &[RECEIPT], &mut document)
            .await;
        assert!(outcome.rewritten);
        assert_eq!(outcome.failures, 0);
        let url = document["receipt_photo"].as_str().unwrap().to_string();
        assert!(url.starts_with("https://blob.test/expenses/3/"));
        assert_eq!(document["receipt_photo_url"], json!(url));

        // already a URL: nothing to do
        let outcome = reconciler
            .on_push(EntityKind::Expense, 3, &[RECEIPT], &mut document)
            .await;
        assert!(!outcome.rewritten);
        assert_eq!(blobs.upload_count(), 1);

        strip_side_channels(&[RECEIPT], &mut document);
        assert!(!document.contains_key("receipt_photo_url"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pull_downloads_and_reuses_existing_copy() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(MemoryBlobStore::new(dir.path()));
        let url = blobs.put("expenses/3/receipt.jpg", b"bytes".to_vec()).await;
        let reconciler = AssetReconciler::new(blobs.clone());

        let mut first = doc(json!({"receipt_photo": url}));
        let outcome = reconciler
            .on_pull(EntityKind::Expense, 3, &[RECEIPT], None, &mut first)
            .await;
        assert_eq!(outcome.failures, 0);
        let path = first["receipt_photo"].as_str().unwrap().to_string();
        assert!(Path::new(&path).is_file());
        assert_eq!(first["receipt_photo_url"], json!(url));

        let mut second = doc(json!({"receipt_photo": url}));
        reconciler
            .on_pull(EntityKind::Expense, 3, &[RECEIPT], Some(&first), &mut second)
            .await;
        assert_eq!(second["receipt_photo"], json!(path));
        assert_eq!(blobs.download_count(), 1);

        // a downloaded copy pushes back as its URL without uploading
        let outcome = reconciler
            .on_push(EntityKind::Expense, 3, &[RECEIPT], &mut second)
            .await;
        assert!(outcome.rewritten);
        assert_eq!(second["receipt_photo"], json!(url));
        assert_eq!(blobs.upload_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failures_are_counted_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(MemoryBlobStore::new(dir.path()));
        blobs.fail_downloads(true);
        let reconciler = AssetReconciler::new(blobs.clone());

        let mut document = doc(json!({"receipt_photo": "https://blob.test/missing.jpg"}));
        let outcome = reconciler
            .on_pull(EntityKind::Expense, 1, &[RECEIPT], None, &mut document)
            .await;
        assert_eq!(outcome.failures, 1);
        assert_eq!(document["receipt_photo"], json!("https://blob.test/missing.jpg"));

        let mut document = doc(json!({"receipt_photo": "/nowhere/photo.jpg"}));
        let outcome = reconciler
            .on_push(EntityKind::Expense, 1, &[RECEIPT], &mut document)
            .await;
        assert_eq!(outcome.failures, 1);
        assert_eq!(document["receipt_photo"], json!("/nowhere/photo.jpg"));

        let outgoing = outgoing_document(blobs.as_ref(), &[RECEIPT], &document);
        assert_eq!(outgoing["receipt_photo"], json!(null));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn restore_fetches_missing_copies_only() {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(MemoryBlobStore::new(dir.path()));
        let url = blobs.put("expenses/4/receipt.jpg", b"bytes".to_vec()).await;
        let reconciler = AssetReconciler::new(blobs.clone());

        let mut document = doc(json!({"receipt_photo": url}));
        let outcome = reconciler
            .restore(EntityKind::Expense, 4, &[RECEIPT], &mut document)
            .await;
        assert!(outcome.rewritten);
        let path = document["receipt_photo"].as_str().unwrap().to_string();
        assert!(Path::new(&path).is_file());

        // present copy: nothing to do
        let outcome = reconciler
            .restore(EntityKind::Expense, 4, &[RECEIPT], &mut document)
            .await;
        assert!(!outcome.rewritten);
        assert_eq!(blobs.download_count(), 1);

        // the file disappeared: fetched again from the side channel
        tokio::fs::remove_file(&path).await.unwrap();
        let outcome = reconciler
            .restore(EntityKind::Expense, 4, &[RECEIPT], &mut document)
            .await;
        assert!(outcome.rewritten);
        assert!(Path::new(document["receipt_photo"].as_str().unwrap()).is_file());
        assert_eq!(blobs.download_count(), 2);

        // a local photo that was never uploaded is left alone
        let mut own = doc(json!({"receipt_photo": "/nowhere/mine.jpg"}));
        let outcome = reconciler
            .restore(EntityKind::Expense, 4, &[RECEIPT], &mut own)
            .await;
        assert_eq!(outcome, AssetOutcome::default());
    }
}
