//! Typed errors for the pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to provide
//! strongly-typed, composable error handling.

use thiserror::Error;

/// Errors raised by a [`crate::fetch::Fetcher`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error fetching {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("non-2xx status {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("timeout fetching {url}")]
    Timeout { url: String },
}

/// Errors raised by a [`crate::analyze::PromptClient`].
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("no prompt template registered for data type {0:?}")]
    Unknown(crate::manifest::DataType),
}

/// Errors raised by a [`crate::analyze::LlmClient`].
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("LLM response was not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// Errors raised by a [`crate::store::ManifestStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("manifest id already exists: {0}")]
    Conflict(String),

    #[error("no manifest with id {0}")]
    NotFound(String),

    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Errors raised while validating a [`crate::config::DeclarativeRegionConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{path}: {message}")]
pub struct ConfigError {
    pub path: String,
    pub message: String,
}

impl ConfigError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// The analyzer produced a response that could not be interpreted as
/// extraction rules. Surfaced as a pipeline failure; no manifest is saved.
#[derive(Debug, Error)]
#[error("malformed structural analysis: {0}")]
pub struct MalformedAnalysisError(pub String);

/// Top-level pipeline error. `Pipeline::execute` never returns this to its
/// caller -- every failure mode is folded into `ExtractionResult.errors`
/// instead -- but collaborators raise it internally so the orchestrator has
/// one type to match on.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("missing bulk configuration for source")]
    MissingBulkConfig,

    #[error("missing api configuration for source")]
    MissingApiConfig,

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Analysis(#[from] MalformedAnalysisError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Llm(#[from] LlmError),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
