//! The download capability contract.
//!
//! The fetch engine is deliberately ignorant of transport: it asks a
//! [`DownloadRegistry`] to resolve a URL to a provider, the provider
//! describes zero or more downloadable representations as
//! [`ContentDescriptor`]s with its own ranking, and the engine materializes
//! the best one to a local file. Everything else (placement, checksums,
//! lifecycle marks) stays in the core.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::hasher::HashAlgorithm;

/// An expected checksum supplied by a download descriptor, used to verify a
/// pre-existing destination file during placement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppliedChecksum {
    pub algorithm: HashAlgorithm,
    pub value: String,
}

/// One candidate downloadable representation of a URL.
#[derive(Debug, Clone)]
pub struct ContentDescriptor {
    /// The URL to materialize (may differ from the artifact URL, e.g. a
    /// direct media link extracted from a page).
    pub url: String,
    /// Filename the provider would give these bytes; its extension carries
    /// over to the placed file.
    pub filename: String,
    /// Provider-defined quality ranking; higher is better. Meaning is opaque
    /// to the fetch engine, which only compares values from one provider.
    pub ranking: i64,
    /// Expected checksums for the bytes, possibly empty.
    pub checksums: Vec<SuppliedChecksum>,
}

impl ContentDescriptor {
    /// The filename's extension, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
    }
}

/// A transport capable of describing and materializing content for some
/// family of URLs.
#[async_trait]
pub trait DownloadProvider: Send + Sync {
    /// Short provider name for logs and `magpie sources`.
    fn name(&self) -> &str;

    /// True if this provider can handle the URL. Must be cheap — called for
    /// every fetched artifact during resolution.
    fn handles(&self, url: &str) -> bool;

    /// Describe the downloadable representations of a URL.
    ///
    /// An empty result means the provider recognized the URL but found
    /// nothing to download; the fetch engine records the artifact as
    /// unhandled. Errors are treated as transient and retried on a later
    /// pass.
    async fn descriptors(&self, url: &str) -> Result<Vec<ContentDescriptor>>;

    /// Download the descriptor's bytes into `dest`, replacing its contents.
    async fn materialize(&self, descriptor: &ContentDescriptor, dest: &Path) -> Result<()>;
}

/// Ordered collection of providers; the first that handles a URL wins.
#[derive(Default, Clone)]
pub struct DownloadRegistry {
    providers: Vec<Arc<dyn DownloadProvider>>,
}

impl DownloadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, provider: Arc<dyn DownloadProvider>) {
        self.providers.push(provider);
    }

    /// Resolve a URL to the first provider that handles it.
    pub fn resolve(&self, url: &str) -> Option<&Arc<dyn DownloadProvider>> {
        self.providers.iter().find(|p| p.handles(url))
    }

    pub fn providers(&self) -> &[Arc<dyn DownloadProvider>] {
        &self.providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_extension_comes_from_filename() {
        let descriptor = ContentDescriptor {
            url: "https://example.com/cat.jpg".into(),
            filename: "cat.jpg".into(),
            ranking: 0,
            checksums: vec![],
        };
        assert_eq!(descriptor.extension(), Some("jpg"));

        let bare = ContentDescriptor {
            url: "https://example.com/raw".into(),
            filename: "raw".into(),
            ranking: 0,
            checksums: vec![],
        };
        assert_eq!(bare.extension(), None);
    }
}
