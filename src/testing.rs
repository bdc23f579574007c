//! Mock collaborators for testing the pipeline without a live fetcher,
//! manifest store, or LLM.
//!
//! These are useful for testing pipeline configurations without making real
//! network or LLM calls.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::analyze::{LlmClient, LlmCompletion, LlmOptions, PromptClient, PromptTemplate};
use crate::error::{FetchError, LlmError, PromptError, StoreError};
use crate::fetch::{FetchedPage, Fetcher};
use crate::manifest::{DataType, ManifestId, StructuralManifest};
use crate::store::ManifestStore;

/// A mock fetcher returning predefined page content by URL.
#[derive(Default)]
pub struct MockFetcher {
    pages: Arc<RwLock<HashMap<String, String>>>,
    fail_urls: Arc<RwLock<Vec<String>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the HTML body returned for `url`.
    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), html.into());
        self
    }

    pub fn fail_url(self, url: impl Into<String>) -> Self {
        self.fail_urls.write().unwrap().push(url.into());
        self
    }

    /// URLs fetched, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, FetchError> {
        self.calls.write().unwrap().push(url.to_string());

        if self.fail_urls.read().unwrap().contains(&url.to_string()) {
            return Err(FetchError::Status { url: url.to_string(), status: 503 });
        }

        self.pages
            .read()
            .unwrap()
            .get(url)
            .cloned()
            .map(|content| FetchedPage { content, url: url.to_string(), status_code: 200, cached: false })
            .ok_or_else(|| FetchError::Status { url: url.to_string(), status: 404 })
    }
}

/// A mock prompt client returning the same template text for every
/// [`DataType`], unless a per-type override has been registered.
pub struct MockPromptClient {
    default_text: String,
    overrides: Arc<RwLock<HashMap<DataType, String>>>,
}

impl Default for MockPromptClient {
    fn default() -> Self {
        Self { default_text: "mock prompt template".to_string(), overrides: Arc::default() }
    }
}

impl MockPromptClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_template(self, data_type: DataType, text: impl Into<String>) -> Self {
        self.overrides.write().unwrap().insert(data_type, text.into());
        self
    }
}

#[async_trait]
impl PromptClient for MockPromptClient {
    async fn get_prompt(&self, data_type: DataType) -> Result<PromptTemplate, PromptError> {
        let text = self
            .overrides
            .read()
            .unwrap()
            .get(&data_type)
            .cloned()
            .unwrap_or_else(|| self.default_text.clone());
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Ok(PromptTemplate { text, hash: hex::encode(hasher.finalize()) })
    }
}

/// A mock LLM client that returns a fixed completion body for every call, or
/// a queue of responses consumed in order if `with_responses` was used.
#[derive(Default)]
pub struct MockLlmClient {
    responses: Arc<RwLock<Vec<String>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always return this body, regardless of how many times `complete` is called.
    pub fn with_fixed_response(self, body: impl Into<String>) -> Self {
        self.responses.write().unwrap().push(body.into());
        self
    }

    /// Queue up responses to be returned one per call, in order. Once
    /// exhausted, the last response repeats.
    pub fn with_responses(self, bodies: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.responses.write().unwrap().extend(bodies.into_iter().map(Into::into));
        self
    }

    /// Prompts passed to `complete`, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &str, _opts: LlmOptions) -> Result<LlmCompletion, LlmError> {
        self.calls.write().unwrap().push(prompt.to_string());

        let responses = self.responses.read().unwrap();
        let call_index = self.calls.read().unwrap().len() - 1;
        let text = responses
            .get(call_index)
            .or_else(|| responses.last())
            .cloned()
            .ok_or_else(|| LlmError::Request(Box::new(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no mock response registered",
            ))))?;

        Ok(LlmCompletion { text, tokens_used: Some(0), model: None, provider: Some("mock".to_string()) })
    }
}

/// Record of a call made to [`MockManifestStore`], for assertions that care
/// about call order or counts rather than just final state.
#[derive(Debug, Clone)]
pub enum MockStoreCall {
    FindLatest { region_id: String, source_url: String },
    Save { id: ManifestId },
    IncrementSuccess { id: ManifestId, item_count: usize },
    IncrementFailure { id: ManifestId },
}

/// A [`ManifestStore`] wrapping an in-memory backend with call tracking.
/// Prefer [`crate::stores::MemoryManifestStore`] directly when call tracking
/// isn't needed.
#[derive(Default)]
pub struct MockManifestStore {
    inner: crate::stores::MemoryManifestStore,
    calls: Arc<RwLock<Vec<MockStoreCall>>>,
}

impl MockManifestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<MockStoreCall> {
        self.calls.read().unwrap().clone()
    }
}

#[async_trait]
impl ManifestStore for MockManifestStore {
    async fn find_latest(
        &self,
        region_id: &str,
        source_url: &str,
        data_type: DataType,
    ) -> Result<Option<StructuralManifest>, StoreError> {
        self.calls.write().unwrap().push(MockStoreCall::FindLatest {
            region_id: region_id.to_string(),
            source_url: source_url.to_string(),
        });
        self.inner.find_latest(region_id, source_url, data_type).await
    }

    async fn save(&self, manifest: StructuralManifest) -> Result<(), StoreError> {
        self.calls.write().unwrap().push(MockStoreCall::Save { id: manifest.id });
        self.inner.save(manifest).await
    }

    async fn increment_success(&self, id: ManifestId, item_count: usize) -> Result<(), StoreError> {
        self.calls.write().unwrap().push(MockStoreCall::IncrementSuccess { id, item_count });
        self.inner.increment_success(id, item_count).await
    }

    async fn increment_failure(&self, id: ManifestId) -> Result<(), StoreError> {
        self.calls.write().unwrap().push(MockStoreCall::IncrementFailure { id });
        self.inner.increment_failure(id).await
    }

    async fn mark_checked(&self, id: ManifestId) -> Result<(), StoreError> {
        self.inner.mark_checked(id).await
    }

    async fn get_history(
        &self,
        region_id: &str,
        source_url: &str,
        data_type: DataType,
        limit: usize,
    ) -> Result<Vec<StructuralManifest>, StoreError> {
        self.inner.get_history(region_id, source_url, data_type, limit).await
    }
}
