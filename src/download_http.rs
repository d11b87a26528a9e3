//! Built-in HTTP(S) download provider.
//!
//! Produces a single descriptor per URL (no alternate representations, no
//! supplied checksums) and streams the response body to the destination
//! file. Registered last so more specific providers win resolution.

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use url::Url;

use crate::download::{ContentDescriptor, DownloadProvider};

const USER_AGENT: &str = concat!("magpie/", env!("CARGO_PKG_VERSION"));

pub struct HttpDownloadProvider {
    client: reqwest::Client,
}

impl HttpDownloadProvider {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DownloadProvider for HttpDownloadProvider {
    fn name(&self) -> &str {
        "http"
    }

    fn handles(&self, url: &str) -> bool {
        matches!(
            Url::parse(url).map(|u| u.scheme().to_string()),
            Ok(scheme) if scheme == "http" || scheme == "https"
        )
    }

    async fn descriptors(&self, url: &str) -> Result<Vec<ContentDescriptor>> {
        let parsed = Url::parse(url).with_context(|| format!("Invalid URL: {url}"))?;

        let filename = parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .unwrap_or("index.html")
            .to_string();

        Ok(vec![ContentDescriptor {
            url: url.to_string(),
            filename,
            ranking: 0,
            checksums: vec![],
        }])
    }

    async fn materialize(&self, descriptor: &ContentDescriptor, dest: &Path) -> Result<()> {
        let response = self
            .client
            .get(&descriptor.url)
            .send()
            .await
            .with_context(|| format!("Request failed for {}", descriptor.url))?
            .error_for_status()
            .with_context(|| format!("Bad response status for {}", descriptor.url))?;

        let mut file = tokio::fs::File::create(dest)
            .await
            .with_context(|| format!("Failed to open {} for writing", dest.display()))?;

        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.with_context(|| format!("Body read failed for {}", descriptor.url))?;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        Ok(())
    }
}
