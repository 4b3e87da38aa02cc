//! In-process blob store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{write_media_file, BlobStore};
use crate::{Error, Result};

const BASE_URL: &str = "https://blob.test";

/// Blob store keeping objects in memory. Each device gets its own instance
/// (its own `media_dir`) over a shared object map.
pub struct MemoryBlobStore {
    objects: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    media_dir: PathBuf,
    uploads: AtomicUsize,
    downloads: AtomicUsize,
    fail_uploads: AtomicBool,
    fail_downloads: AtomicBool,
}

impl MemoryBlobStore {
    pub fn new(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            objects: Arc::default(),
            media_dir: media_dir.into(),
            uploads: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
            fail_downloads: AtomicBool::new(false),
        }
    }

    /// Another device's view of the same objects.
    pub fn sharing_with(&self, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            objects: self.objects.clone(),
            ..Self::new(media_dir)
        }
    }

    /// Place an object directly, returning its URL.
    pub async fn put(&self, object_key: &str, bytes: impl Into<Vec<u8>>) -> String {
        let url = format!("{BASE_URL}/{}", object_key.trim_matches('/'));
        self.objects.lock().await.insert(url.clone(), bytes.into());
        url
    }

    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_downloads(&self, fail: bool) {
        self.fail_downloads.store(fail, Ordering::SeqCst);
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, local_path: &Path, object_key: &str) -> Result<String> {
        if self.fail_uploads.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("upload of {object_key} refused")));
        }
        let bytes = tokio::fs::read(local_path).await?;
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(self.put(object_key, bytes).await)
    }

    async fn download(&self, url: &str) -> Result<PathBuf> {
        if self.fail_downloads.load(Ordering::SeqCst) {
            return Err(Error::Storage(format!("download of {url} refused")));
        }
        let bytes = self
            .objects
            .lock()
            .await
            .get(url)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("blob {url}")))?;
        self.downloads.fetch_add(1, Ordering::SeqCst);
        write_media_file(&self.media_dir, url, &bytes).await
    }
}
