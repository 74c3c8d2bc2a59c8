//! Retrieval of alert images from object storage.
//!
//! Grafana uploads panel screenshots to an S3-compatible bucket and puts the
//! object URL in the alert's `imageURL`. The URL it publishes is often not
//! reachable from where the relay runs, so the host and port can be replaced
//! with a configured endpoint before downloading. When credentials are
//! configured, requests are signed with AWS Signature Version 4.

pub mod sigv4;

use crate::config::StorageConfig;
use crate::core::ImageFetcher;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Url};
use sigv4::Credentials;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid image URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("image URL path '{0}' does not name a bucket and an object")]
    InvalidPath(String),

    #[error("image download failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("image download returned status {0}")]
    Status(u16),

    #[error("cannot store downloaded image: {0}")]
    Io(#[from] std::io::Error),
}

/// A downloaded file that is deleted when the guard is dropped.
#[derive(Debug)]
pub struct Attachment {
    path: PathBuf,
}

impl Attachment {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Attachment {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "Removed downloaded image"),
            Err(e) => debug!(
                path = %self.path.display(),
                error = %e,
                "Could not remove downloaded image"
            ),
        }
    }
}

/// Downloads images over plain HTTP(S) from an S3-compatible endpoint.
pub struct HttpImageFetcher {
    client: Client,
    host: Option<String>,
    port: Option<u16>,
    credentials: Option<Credentials>,
    download_dir: PathBuf,
    sequence: AtomicU64,
}

impl HttpImageFetcher {
    pub fn new(config: &StorageConfig) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;
        let credentials = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) if !access_key.is_empty() => Some(Credentials {
                access_key: access_key.clone(),
                secret_key: secret_key.clone(),
                region: config.region.clone(),
            }),
            _ => None,
        };
        Ok(Self {
            client,
            host: config.host.clone().filter(|h| !h.is_empty()),
            port: config.port,
            credentials,
            download_dir: config.download_dir.clone(),
            sequence: AtomicU64::new(0),
        })
    }

    /// Applies the endpoint override and extracts the object's file name.
    fn resolve(&self, image_url: &str) -> Result<(Url, String), FetchError> {
        let invalid = |reason: String| FetchError::InvalidUrl {
            url: image_url.to_string(),
            reason,
        };

        let mut url = Url::parse(image_url).map_err(|e| invalid(e.to_string()))?;
        if let Some(host) = &self.host {
            url.set_host(Some(host)).map_err(|e| invalid(e.to_string()))?;
        }
        if let Some(port) = self.port {
            url.set_port(Some(port))
                .map_err(|_| invalid("URL cannot carry a port".to_string()))?;
        }

        let path = url.path().trim_start_matches('/');
        let file_name = match path.split_once('/') {
            Some((bucket, object)) if !bucket.is_empty() && !object.is_empty() => object
                .rsplit('/')
                .next()
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            _ => None,
        }
        .ok_or_else(|| FetchError::InvalidPath(path.to_string()))?;

        Ok((url, file_name))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    #[instrument(skip(self))]
    async fn fetch(&self, image_url: &str) -> Result<Option<Attachment>, FetchError> {
        if image_url.is_empty() {
            return Ok(None);
        }
        let (url, file_name) = self.resolve(image_url)?;
        debug!(%url, signed = self.credentials.is_some(), "Downloading alert image");

        let mut request = self.client.get(url.clone());
        if let Some(credentials) = &self.credentials {
            let signed = credentials.sign_get(&url, Utc::now());
            request = request
                .header("authorization", signed.authorization)
                .header("x-amz-date", signed.amz_date)
                .header("x-amz-content-sha256", signed.content_sha256);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let bytes = response.bytes().await?;

        // Concurrent alerts may reference objects with the same name.
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        let path = self
            .download_dir
            .join(format!("alert-relay-{}-{}-{}", std::process::id(), n, file_name));
        tokio::fs::write(&path, &bytes).await?;
        debug!(path = %path.display(), bytes = bytes.len(), "Alert image stored");
        Ok(Some(Attachment::new(path)))
    }
}
