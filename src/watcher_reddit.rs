//! Built-in subreddit watcher.
//!
//! Polls a subreddit's public JSON listing endpoint and yields each
//! submission's target URL as a discovery candidate. One listing page per
//! pass — recurring passes pick up newer submissions, and the store's dedup
//! rule absorbs the overlap between passes.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::watch::Watcher;

const LISTING_LIMIT: u32 = 100;
const USER_AGENT: &str = concat!("magpie/", env!("CARGO_PKG_VERSION"));

/// Arguments accepted by a `type = "subreddit"` watch entry.
#[derive(Debug, Deserialize)]
struct SubredditArgs {
    subreddit: String,
    /// Listing strategy: `"new"` (default) or `"hot"`.
    #[serde(default = "default_listing")]
    listing: String,
}

fn default_listing() -> String {
    "new".to_string()
}

impl SubredditArgs {
    fn from_value(args: &toml::Value) -> Result<Self> {
        let parsed: SubredditArgs = args
            .clone()
            .try_into()
            .context("expected { subreddit, listing? }")?;
        if parsed.subreddit.is_empty() {
            anyhow::bail!("subreddit must not be empty");
        }
        match parsed.listing.as_str() {
            "new" | "hot" => {}
            other => anyhow::bail!("Unknown listing strategy '{}'. Must be new or hot.", other),
        }
        Ok(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    children: Vec<ListingChild>,
}

#[derive(Debug, Deserialize)]
struct ListingChild {
    data: Submission,
}

#[derive(Debug, Deserialize)]
struct Submission {
    url: String,
}

pub struct SubredditWatcher {
    client: reqwest::Client,
    base_url: String,
}

impl SubredditWatcher {
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://www.reddit.com")
    }

    /// Point the watcher at an alternate listing host (used by tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    async fn fetch_listing(&self, args: &SubredditArgs) -> Result<Vec<Submission>> {
        let endpoint = format!(
            "{}/r/{}/{}.json?limit={}",
            self.base_url, args.subreddit, args.listing, LISTING_LIMIT
        );
        debug!(endpoint = %endpoint, "Fetching subreddit listing");

        let listing: Listing = self
            .client
            .get(&endpoint)
            .send()
            .await
            .with_context(|| format!("Listing request failed for r/{}", args.subreddit))?
            .error_for_status()
            .with_context(|| format!("Bad listing status for r/{}", args.subreddit))?
            .json()
            .await
            .with_context(|| format!("Malformed listing body for r/{}", args.subreddit))?;

        Ok(listing
            .data
            .children
            .into_iter()
            .map(|child| child.data)
            .collect())
    }
}

#[async_trait]
impl Watcher for SubredditWatcher {
    fn type_name(&self) -> &str {
        "subreddit"
    }

    fn validate_args(&self, args: &toml::Value) -> Result<()> {
        SubredditArgs::from_value(args).map(|_| ())
    }

    async fn discover<'a>(
        &'a self,
        args: &toml::Value,
    ) -> Result<BoxStream<'a, Result<String>>> {
        let args = SubredditArgs::from_value(args)?;
        let submissions = self.fetch_listing(&args).await?;
        debug!(
            subreddit = %args.subreddit,
            count = submissions.len(),
            "Listing fetched"
        );

        Ok(futures::stream::iter(
            submissions.into_iter().map(|submission| Ok(submission.url)),
        )
        .boxed())
    }
}
