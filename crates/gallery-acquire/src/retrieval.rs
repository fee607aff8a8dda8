//! Downloading image bytes for a resolved image URL.

use crate::error::AcquireError;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER};
use reqwest::{StatusCode, Url};
use std::time::Duration;

const IMAGE_ACCEPT: &str = "image/avif,image/webp,image/apng,image/*,*/*;q=0.8";

/// Raw bytes of a downloaded image.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadResult {
    pub bytes: Vec<u8>,
    /// Absolute URL the bytes came from.
    pub url: String,
    /// File extension including the dot, e.g. `.png`.
    pub extension: String,
}

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch `url` (possibly relative to `base_url`) and check it is an image.
    async fn fetch(&self, url: &str, base_url: &str) -> Result<DownloadResult, AcquireError>;
}

/// [`ImageFetcher`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, AcquireError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str, base_url: &str) -> Result<DownloadResult, AcquireError> {
        let absolute = resolve_url(url, base_url)?;

        let response = self
            .client
            .get(absolute.clone())
            .header(ACCEPT, IMAGE_ACCEPT)
            .header(REFERER, base_url)
            .send()
            .await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let extension = accept_image(response.status(), &content_type)?;

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(AcquireError::NotAnImage {
                status: StatusCode::OK.as_u16(),
                content_type,
            });
        }

        tracing::debug!(url = %absolute, bytes = bytes.len(), "Downloaded image");
        Ok(DownloadResult {
            bytes,
            url: absolute.to_string(),
            extension,
        })
    }
}

/// Resolve a possibly relative URL against the page URL.
pub fn resolve_url(url: &str, base_url: &str) -> Result<Url, AcquireError> {
    let url = url.trim();
    let resolved = match Url::parse(base_url) {
        Ok(base) => base.join(url),
        Err(_) => Url::parse(url),
    };
    resolved.map_err(|e| AcquireError::NetworkFailure(format!("invalid url '{url}': {e}")))
}

/// Only `200` responses with an `image/*` content type count; returns the
/// extension for the content type.
pub fn accept_image(status: StatusCode, content_type: &str) -> Result<String, AcquireError> {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if status != StatusCode::OK || !essence.starts_with("image/") {
        return Err(AcquireError::NotAnImage {
            status: status.as_u16(),
            content_type: content_type.to_string(),
        });
    }
    Ok(extension_for(&essence).to_string())
}

fn extension_for(essence: &str) -> &'static str {
    match essence {
        "image/jpeg" | "image/jpg" | "image/pjpeg" => ".jpg",
        "image/png" => ".png",
        "image/gif" => ".gif",
        "image/webp" => ".webp",
        "image/avif" => ".avif",
        "image/bmp" | "image/x-ms-bmp" => ".bmp",
        "image/tiff" => ".tiff",
        "image/svg+xml" => ".svg",
        "image/x-icon" | "image/vnd.microsoft.icon" => ".ico",
        _ => ".jpg",
    }
}
