use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;

use crate::listing::RawListing;

/// Provider of the current batch of raw listings, in page order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawListing>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FeedLocation {
    File(PathBuf),
    Url(String),
}

// Accept either a bare array or `{ "listings": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum FeedDocument {
    Bare(Vec<RawListing>),
    Wrapped { listings: Vec<RawListing> },
}

impl FeedDocument {
    fn into_listings(self) -> Vec<RawListing> {
        match self {
            Self::Bare(listings) | Self::Wrapped { listings } => listings,
        }
    }
}

/// Reads already-extracted listing fields as JSON from a file or URL.
pub struct JsonFeedSource {
    location: FeedLocation,
    client: Client,
}

impl JsonFeedSource {
    pub fn new(feed: &str) -> Self {
        let location = if feed.starts_with("http://") || feed.starts_with("https://") {
            FeedLocation::Url(feed.to_string())
        } else {
            FeedLocation::File(PathBuf::from(feed))
        };
        Self {
            location,
            client: Client::new(),
        }
    }

    async fn read_document(&self) -> Result<Vec<u8>> {
        match &self.location {
            FeedLocation::File(path) => tokio::fs::read(path)
                .await
                .with_context(|| format!("Failed to read feed {}", path.display())),
            FeedLocation::Url(url) => {
                let response = self.client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(anyhow::anyhow!("Feed request failed: {} ({})", status, url));
                }
                Ok(response.bytes().await?.to_vec())
            }
        }
    }
}

#[async_trait]
impl ListingSource for JsonFeedSource {
    async fn fetch(&self) -> Result<Vec<RawListing>> {
        let bytes = self.read_document().await?;
        let document: FeedDocument =
            serde_json::from_slice(&bytes).context("Feed is not a JSON listing array")?;
        let listings = document.into_listings();
        tracing::info!("📊 Found {} listings", listings.len());
        Ok(listings)
    }
}
