use super::LOG_TARGET;
use crate::Result;
use crate::config::StorageConfig;
use ohno::{IntoAppError, bail};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable holding the storage service key.
pub const STORAGE_KEY_ENV: &str = "STORAGE_SERVICE_KEY";

/// Makes a finished report available to readers and returns where it can be found.
pub trait Publisher: Send + Sync + 'static {
    fn publish(&self, report: &Path, object_name: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Copies reports into a local directory tree.
#[derive(Debug, Clone)]
pub struct LocalPublisher {
    root: PathBuf,
}

impl LocalPublisher {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Publisher for LocalPublisher {
    async fn publish(&self, report: &Path, object_name: &str) -> Result<String> {
        let dest = self.root.join(object_name);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .into_app_err_with(|| format!("could not create directory '{}'", parent.display()))?;
        }

        let _ = tokio::fs::copy(report, &dest)
            .await
            .into_app_err_with(|| format!("could not copy '{}' to '{}'", report.display(), dest.display()))?;

        let dest = std::path::absolute(&dest).into_app_err("could not resolve the published report path")?;
        let url = Url::parse(&format!("file://{}", dest.display()))
            .into_app_err_with(|| format!("'{}' cannot be expressed as a file URL", dest.display()))?;

        log::info!(target: LOG_TARGET, "Published report to '{url}'");
        Ok(url.into())
    }
}

/// Uploads reports to an object storage bucket over its REST interface.
#[derive(Debug, Clone)]
pub struct StorageBucketPublisher {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
}

impl StorageBucketPublisher {
    pub fn new(base_url: &str, bucket: &str, service_key: &str) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {service_key}")).into_app_err("invalid storage service key")?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        let _ = headers.insert(AUTHORIZATION, auth);
        let _ = headers.insert("x-upsert", HeaderValue::from_static("true"));

        let client = reqwest::Client::builder()
            .user_agent("ci-miner")
            .default_headers(headers)
            .build()
            .into_app_err("could not create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
        })
    }

    /// Build a publisher from configuration, taking the key from the environment.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let key = std::env::var(STORAGE_KEY_ENV).into_app_err_with(|| format!("{STORAGE_KEY_ENV} must be set to publish to storage"))?;
        Self::new(&config.base_url, &config.bucket, &key)
    }

    #[must_use]
    pub fn public_url(&self, object_name: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{object_name}", self.base_url, self.bucket)
    }
}

impl Publisher for StorageBucketPublisher {
    async fn publish(&self, report: &Path, object_name: &str) -> Result<String> {
        let body = tokio::fs::read(report)
            .await
            .into_app_err_with(|| format!("could not read report '{}'", report.display()))?;

        let upload_url = format!("{}/storage/v1/object/{}/{object_name}", self.base_url, self.bucket);
        log::info!(target: LOG_TARGET, "Uploading {} bytes to '{upload_url}'", body.len());

        let response = self
            .client
            .post(&upload_url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .into_app_err_with(|| format!("sending upload request to {upload_url}"))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("upload to {upload_url} failed with HTTP status {status}: {}", detail.trim());
        }

        Ok(self.public_url(object_name))
    }
}

/// The publisher selected by configuration.
#[derive(Debug, Clone)]
pub enum ConfiguredPublisher {
    Local(LocalPublisher),
    Bucket(StorageBucketPublisher),
}

impl ConfiguredPublisher {
    /// Storage bucket when configured, otherwise a local `published` directory under `work_dir`.
    pub fn from_config(storage: Option<&StorageConfig>, work_dir: &Path) -> Result<Self> {
        match storage {
            Some(storage) => Ok(Self::Bucket(StorageBucketPublisher::from_config(storage)?)),
            None => Ok(Self::Local(LocalPublisher::new(work_dir.join("published")))),
        }
    }
}

impl Publisher for ConfiguredPublisher {
    async fn publish(&self, report: &Path, object_name: &str) -> Result<String> {
        match self {
            Self::Local(p) => p.publish(report, object_name).await,
            Self::Bucket(p) => p.publish(report, object_name).await,
        }
    }
}
