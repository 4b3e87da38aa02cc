//! Cloudflare R2 blob store.

use std::env;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream, Client};
use aws_types::region::Region;
use tracing::debug;

use super::{content_type_for, write_media_file, BlobStore};
use crate::util::{is_http_url, normalize_text_option};
use crate::{Error, Result};

const ENV_ACCOUNT_ID: &str = "R2_ACCOUNT_ID";
const ENV_BUCKET: &str = "R2_BUCKET";
const ENV_ACCESS_KEY_ID: &str = "R2_ACCESS_KEY_ID";
const ENV_SECRET_ACCESS_KEY: &str = "R2_SECRET_ACCESS_KEY";
const ENV_PUBLIC_BASE_URL: &str = "R2_PUBLIC_BASE_URL";

/// Cloudflare R2 configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct R2Config {
    /// Cloudflare account identifier.
    pub account_id: String,
    /// R2 bucket name.
    pub bucket: String,
    /// Access key id for S3-compatible auth.
    pub access_key_id: String,
    /// Secret access key for S3-compatible auth.
    pub secret_access_key: String,
    /// Optional public URL base for serving photos.
    pub public_base_url: Option<String>,
}

impl R2Config {
    /// Load R2 configuration from environment variables.
    ///
    /// Returns `Ok(None)` when no R2 variables are set.
    /// Returns an error when only a partial configuration is provided.
    pub fn from_env() -> Result<Option<Self>> {
        parse_config(|key| env::var(key).ok())
    }

    /// Cloudflare R2 S3-compatible endpoint URL.
    #[must_use]
    pub fn endpoint_url(&self) -> String {
        format!("https://{}.r2.cloudflarestorage.com", self.account_id)
    }

    /// Base under which object URLs are published.
    #[must_use]
    pub fn object_base_url(&self) -> String {
        self.public_base_url
            .clone()
            .unwrap_or_else(|| format!("{}/{}", self.endpoint_url(), self.bucket))
    }
}

/// R2-backed blob store. Downloads land in `media_dir`.
#[derive(Clone, Debug)]
pub struct R2BlobStore {
    config: R2Config,
    media_dir: PathBuf,
    client: Client,
    http: reqwest::Client,
}

impl R2BlobStore {
    #[must_use]
    pub fn new(config: R2Config, media_dir: impl Into<PathBuf>) -> Self {
        let client = build_s3_client(&config);
        Self {
            config,
            media_dir: media_dir.into(),
            client,
            http: reqwest::Client::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &R2Config {
        &self.config
    }

    /// Check that the configured bucket is reachable with current credentials.
    pub async fn bucket_is_reachable(&self) -> Result<()> {
        self.client
            .head_bucket()
            .bucket(&self.config.bucket)
            .send()
            .await
            .map_err(|error| storage_error("head_bucket", &self.config.bucket, None, error))?;
        Ok(())
    }

    /// Public URL of an object key.
    #[must_use]
    pub fn object_url(&self, object_key: &str) -> Option<String> {
        let key = object_key.trim_matches('/');
        if key.is_empty() {
            return None;
        }
        Some(format!("{}/{key}", self.config.object_base_url()))
    }

    /// Object key of a URL served from this bucket, if it is one.
    #[must_use]
    pub fn object_key_for_url(&self, url: &str) -> Option<String> {
        let base = self.config.object_base_url();
        let key = url.trim().strip_prefix(base.as_str())?.trim_start_matches('/');
        let key = key.split(['?', '#']).next().unwrap_or_default();
        (!key.is_empty()).then(|| key.to_string())
    }

    async fn upload_bytes(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<()> {
        let object_key = normalize_object_key(object_key)?;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        request.send().await.map_err(|error| {
            storage_error("put_object", &self.config.bucket, Some(&object_key), error)
        })?;

        Ok(())
    }

    async fn download_object(&self, object_key: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get_object()
            .bucket(&self.config.bucket)
            .key(object_key)
            .send()
            .await
            .map_err(|error| {
                storage_error("get_object", &self.config.bucket, Some(object_key), error)
            })?;

        let payload = response.body.collect().await.map_err(|error| {
            storage_error(
                "get_object_body",
                &self.config.bucket,
                Some(object_key),
                error,
            )
        })?;

        Ok(payload.into_bytes().to_vec())
    }

    /// Fetch a URL that is not served from this bucket (legacy storage).
    async fn download_foreign(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|error| Error::Storage(format!("GET {url} failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Storage(format!("GET {url} returned {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|error| Error::Storage(format!("GET {url} body failed: {error}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl BlobStore for R2BlobStore {
    async fn upload(&self, local_path: &Path, object_key: &str) -> Result<String> {
        let bytes = tokio::fs::read(local_path).await?;
        self.upload_bytes(object_key, bytes, content_type_for(local_path))
            .await?;
        debug!(object_key, "Uploaded asset to R2");
        self.object_url(object_key)
            .ok_or_else(|| Error::InvalidInput("Asset object_key cannot be empty".to_string()))
    }

    async fn download(&self, url: &str) -> Result<PathBuf> {
        let bytes = match self.object_key_for_url(url) {
            Some(object_key) => self.download_object(&object_key).await?,
            None => self.download_foreign(url).await?,
        };
        write_media_file(&self.media_dir, url, &bytes).await
    }
}

fn parse_config(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<R2Config>> {
    let value = |key: &str| normalize_text_option(lookup(key));
    let required = [ENV_ACCOUNT_ID, ENV_BUCKET, ENV_ACCESS_KEY_ID, ENV_SECRET_ACCESS_KEY];
    let values: Vec<Option<String>> = required.iter().map(|key| value(key)).collect();
    let public_base_url = value(ENV_PUBLIC_BASE_URL);

    if values.iter().all(Option::is_none) && public_base_url.is_none() {
        return Ok(None);
    }

    let missing: Vec<&str> = required
        .iter()
        .zip(&values)
        .filter(|(_, value)| value.is_none())
        .map(|(key, _)| *key)
        .collect();
    if !missing.is_empty() {
        return Err(Error::InvalidInput(format!(
            "R2 configuration is incomplete. Missing: {}",
            missing.join(", ")
        )));
    }

    let mut values = values.into_iter().flatten();
    let mut next = || values.next().unwrap_or_default();
    Ok(Some(R2Config {
        account_id: next(),
        bucket: next(),
        access_key_id: next(),
        secret_access_key: next(),
        public_base_url: normalize_public_base_url(public_base_url)?,
    }))
}

fn build_s3_client(config: &R2Config) -> Client {
    let credentials = Credentials::new(
        config.access_key_id.clone(),
        config.secret_access_key.clone(),
        None,
        None,
        "rota-sync-r2-blob-store",
    );

    let sdk_config = aws_sdk_s3::config::Builder::new()
        .region(Region::new("auto"))
        .credentials_provider(credentials)
        .endpoint_url(config.endpoint_url())
        .force_path_style(true)
        .build();

    Client::from_conf(sdk_config)
}

fn storage_error(
    operation: &str,
    bucket: &str,
    object_key: Option<&str>,
    error: impl std::fmt::Display,
) -> Error {
    let target = object_key.map_or_else(|| bucket.to_string(), |key| format!("{bucket}/{key}"));
    Error::Storage(format!("R2 {operation} failed for {target}: {error}"))
}

fn normalize_object_key(object_key: &str) -> Result<String> {
    let object_key = object_key.trim().trim_matches('/').to_string();
    if object_key.is_empty() {
        return Err(Error::InvalidInput(
            "Asset object_key cannot be empty".to_string(),
        ));
    }
    Ok(object_key)
}

fn normalize_public_base_url(public_base_url: Option<String>) -> Result<Option<String>> {
    let Some(value) = public_base_url else {
        return Ok(None);
    };
    if !is_http_url(&value) {
        return Err(Error::InvalidInput(
            "R2_PUBLIC_BASE_URL must start with http:// or https://".to_string(),
        ));
    }

    Ok(Some(value.trim_end_matches('/').to_string()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::storage::build_object_key;

    fn parse_from_map(map: &HashMap<&str, &str>) -> Result<Option<R2Config>> {
        parse_config(|key| map.get(key).map(|value| (*value).to_string()))
    }

    fn config(public_base_url: Option<&str>) -> R2Config {
        R2Config {
            account_id: "account-1".to_string(),
            bucket: "bucket-a".to_string(),
            access_key_id: "AKID123".to_string(),
            secret_access_key: "SECRET123".to_string(),
            public_base_url: public_base_url.map(ToOwned::to_owned),
        }
    }

    #[test]
    fn parse_config_is_all_or_nothing() {
        assert!(parse_from_map(&HashMap::new()).unwrap().is_none());

        let partial = HashMap::from([(ENV_ACCOUNT_ID, "account"), (ENV_BUCKET, " bucket ")]);
        let Error::InvalidInput(message) = parse_from_map(&partial).unwrap_err() else {
            panic!("expected invalid input");
        };
        assert!(message.contains(ENV_ACCESS_KEY_ID));
        assert!(message.contains(ENV_SECRET_ACCESS_KEY));
        assert!(!message.contains(ENV_BUCKET));
    }

    #[test]
    fn parse_config_trims_values_and_public_url() {
        let mut map = HashMap::from([
            (ENV_ACCOUNT_ID, "account-1"),
            (ENV_BUCKET, " bucket-a "),
            (ENV_ACCESS_KEY_ID, "AKID123"),
            (ENV_SECRET_ACCESS_KEY, "SECRET123"),
            (ENV_PUBLIC_BASE_URL, "https://cdn.example.com/media/"),
        ]);

        let parsed = parse_from_map(&map).unwrap().unwrap();
        assert_eq!(parsed, config(Some("https://cdn.example.com/media")));

        map.insert(ENV_PUBLIC_BASE_URL, "cdn.example.com/media");
        let err = parse_from_map(&map).unwrap_err();
        assert!(err.to_string().contains(ENV_PUBLIC_BASE_URL));
    }

    #[test]
    fn object_url_round_trips_to_key() {
        let store = R2BlobStore::new(config(Some("https://cdn.example.com/media")), "/tmp");

        let url = store.object_url("/expenses/7/file.png").unwrap();
        assert_eq!(url, "https://cdn.example.com/media/expenses/7/file.png");
        assert_eq!(
            store.object_key_for_url(&url).as_deref(),
            Some("expenses/7/file.png")
        );
        assert_eq!(
            store.object_key_for_url("https://firebasestorage.googleapis.com/v0/b/x.png"),
            None
        );
    }

    #[test]
    fn object_url_without_public_base_uses_bucket_endpoint() {
        let store = R2BlobStore::new(config(None), "/tmp");
        let key = build_object_key("contracts", 3, Path::new("sig.png")).unwrap();
        let url = store.object_url(&key).unwrap();
        assert!(url.starts_with("https://account-1.r2.cloudflarestorage.com/bucket-a/contracts/3/"));
        assert_eq!(store.object_key_for_url(&url), Some(key));
    }

    #[test]
    fn normalize_object_key_rejects_empty() {
        let err = normalize_object_key("   ").unwrap_err();
        match err {
            Error::InvalidInput(message) => assert!(message.contains("object_key")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    #[ignore = "Requires local R2 env vars in process environment or .env"]
    fn from_env_loads_real_r2_config() {
        let _ = dotenvy::dotenv();

        let config = R2Config::from_env()
            .expect("R2 env parsing should not error")
            .expect("R2 config should be present");

        assert!(!config.bucket.trim().is_empty());
        assert_eq!(
            config.endpoint_url(),
            format!("https://{}.r2.cloudflarestorage.com", config.account_id)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "Requires local R2 env vars plus network access"]
    async fn r2_asset_roundtrip_upload_download() {
        let _ = dotenvy::dotenv();

        let config = R2Config::from_env()
            .expect("R2 env parsing should not error")
            .expect("R2 config should be present");
        let media = tempfile::tempdir().unwrap();
        let store = R2BlobStore::new(config, media.path());

        store.bucket_is_reachable().await.unwrap();

        let source = media.path().join("roundtrip.txt");
        tokio::fs::write(&source, b"r2-roundtrip-test").await.unwrap();
        let key = build_object_key("integration", 1, &source).unwrap();

        let url = store.upload(&source, &key).await.unwrap();
        let downloaded = store.download(&url).await.unwrap();
        assert_eq!(
            tokio::fs::read(downloaded).await.unwrap(),
            b"r2-roundtrip-test"
        );
    }
}
