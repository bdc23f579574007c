//! The external HTTP-fetch-with-retry/caching collaborator.
//! The crate only specifies the contract plus a thin default implementation;
//! a production caller is expected to bring its own retrying/caching fetcher.

use async_trait::async_trait;

use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub content: String,
    pub url: String,
    pub status_code: u16,
    pub cached: bool,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError>;
}

/// A minimal, non-retrying, non-caching `reqwest`-backed fetcher. Sufficient
/// for local development and the `demos/` example; production deployments
/// should supply their own `Fetcher` with retry/backoff and a response cache
/// -- this crate deliberately scopes that concern out.
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for ReqwestFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Http { url: url.to_string(), source: Box::new(e) }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { url: url.to_string(), status: status.as_u16() });
        }

        let content = response
            .text()
            .await
            .map_err(|e| FetchError::Http { url: url.to_string(), source: Box::new(e) })?;

        Ok(FetchedPage { content, url: url.to_string(), status_code: status.as_u16(), cached: false })
    }
}
