use async_trait::async_trait;
use reqwest::Client;

use crate::error::FetchError;
use crate::utils::http::fetch_text;

mod olx;

pub use olx::ListingExtractor;

/// Retrieves the raw markup of a listing page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Single-attempt HTTP fetcher. Retrying is left to the next scheduled run.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        fetch_text(&self.client, url).await
    }
}
