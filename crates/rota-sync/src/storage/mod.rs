//! Blob storage for photos and signatures.

mod memory;
mod r2;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::RecordId;
use crate::util::{is_http_url, sanitize_file_name, sanitize_token};
use crate::{Error, Result};

pub use memory::MemoryBlobStore;
pub use r2::{R2BlobStore, R2Config};

/// Object storage holding the binary side of asset references.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload a local file under `object_key` and return its remote URL.
    async fn upload(&self, local_path: &Path, object_key: &str) -> Result<String>;

    /// Fetch a remote URL into local storage and return the local path.
    async fn download(&self, url: &str) -> Result<PathBuf>;

    /// Whether a stored reference points at remote storage.
    fn is_remote_url(&self, value: &str) -> bool {
        is_http_url(value.trim())
    }
}

/// Build a unique object key for a record's asset.
pub fn build_object_key(folder: &str, record_id: RecordId, local_path: &Path) -> Result<String> {
    let folder = sanitize_token(folder);
    if folder.is_empty() {
        return Err(Error::InvalidInput("Asset folder cannot be empty".to_string()));
    }

    let file_name = local_path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let file_name = sanitize_file_name(file_name);
    let ts = Utc::now().timestamp_millis();
    let id = Uuid::now_v7();

    Ok(format!("{folder}/{record_id}/{ts}-{id}-{file_name}"))
}

/// Deterministic local file name for a downloaded URL.
///
/// The same URL always lands on the same file, so repeated downloads
/// overwrite instead of piling up copies.
pub fn local_file_name_for_url(url: &str) -> String {
    let without_query = url.split(['?', '#']).next().unwrap_or_default();
    let path = without_query
        .split_once("://")
        .map_or(without_query, |(_, rest)| rest);
    let path = path.split_once('/').map_or("", |(_, path)| path);

    let (dir, file) = path.rsplit_once('/').unwrap_or(("", path));
    let dir = sanitize_token(dir);
    let file = sanitize_file_name(file);
    if dir.is_empty() {
        file
    } else {
        format!("{dir}-{file}")
    }
}

/// Write downloaded bytes into the media directory.
pub(crate) async fn write_media_file(media_dir: &Path, url: &str, bytes: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(media_dir).await?;
    let path = media_dir.join(local_file_name_for_url(url));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

/// Best-effort content type from a file extension.
pub(crate) fn content_type_for(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}
