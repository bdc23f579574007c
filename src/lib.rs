//! # civic-ingest-pipeline
//!
//! A self-healing, manifest-cached scraping pipeline for civic open data:
//! propositions, meetings, representatives, and campaign finance records.
//!
//! ## Design Philosophy
//!
//! **Derive once, reuse until the page changes.**
//!
//! | Principle | Description |
//! |-----------|--------------|
//! | **LLM-derived, version-controlled** | An LLM reads the page once and emits CSS-selector extraction rules; the rules, not the LLM, run on every subsequent fetch |
//! | **Structure-hash gated** | A manifest is only re-derived when the page's DOM skeleton or the prompt template changes |
//! | **Self-healing** | A single failed extraction triggers one re-derivation before the pipeline gives up |
//! | **Never panics, never raises to the caller** | Every collaborator folds failure into `warnings`/`errors` on the returned result |
//!
//! ## Architecture
//!
//! ```text
//! fetch -> structure hash -> manifest lookup -> compare
//!   -> (reuse) ------------------------------------+
//!   -> (derive) analyze (LLM) -> save manifest -----+
//!                                                    v
//!                              extract -> validate -> heal? -> domain map
//! ```
//!
//! Bulk file downloads and paginated JSON APIs skip the manifest/LLM path
//! entirely -- see [`ingestors`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use civic_ingest_pipeline::config::DataSourceConfig;
//! use civic_ingest_pipeline::manifest::{DataType, SourceType};
//! use civic_ingest_pipeline::fetch::ReqwestFetcher;
//! use civic_ingest_pipeline::analyze::{StaticPromptClient, ReqwestLlmClient};
//! use civic_ingest_pipeline::stores::MemoryManifestStore;
//! use civic_ingest_pipeline::Pipeline;
//!
//! let fetcher = ReqwestFetcher::new();
//! let store = MemoryManifestStore::new();
//! let prompts = StaticPromptClient;
//! let llm = ReqwestLlmClient::new(None);
//! let pipeline = Pipeline::new(&fetcher, &store, &prompts, &llm);
//!
//! let source = DataSourceConfig {
//!     url: "https://example.gov/propositions".into(),
//!     data_type: DataType::Propositions,
//!     content_goal: "extract ballot propositions".into(),
//!     source_type: SourceType::Html,
//!     category: None,
//!     hints: None,
//!     bulk: None,
//!     api: None,
//! };
//! let result = pipeline.execute(&source, "mn").await;
//! ```
//!
//! ## Modules
//!
//! - [`config`] - declarative region/source configuration and validation
//! - [`manifest`] - cached extraction rules and the comparator that decides reuse
//! - [`hash`] - structure hashing
//! - [`analyze`] - LLM-backed structural analysis
//! - [`extract`] - deterministic rule-driven extraction
//! - [`transform`] - per-field value normalization
//! - [`validate`] - post-extraction quality checks
//! - [`heal`] - the self-healing decision
//! - [`domain`] - typed civic record mapping
//! - [`store`] / [`stores`] - manifest persistence
//! - [`fetch`] - the external HTTP-fetch collaborator
//! - [`ingestors`] - bulk file and paginated API ingest paths
//! - [`pipeline`] - the orchestrator tying every collaborator together
//! - [`testing`] - mock collaborators for testing without live network/LLM calls

pub mod analyze;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod hash;
pub mod heal;
pub mod ingestors;
pub mod manifest;
pub mod pipeline;
pub mod store;
pub mod stores;
pub mod testing;
pub mod transform;
pub mod validate;

pub use analyze::{LlmClient, LlmCompletion, LlmOptions, PromptClient, PromptTemplate, StaticPromptClient};
pub use config::{ApiConfig, BulkConfig, DataSourceConfig, DeclarativeRegionConfig, PaginationType, validate_region_config};
pub use domain::{DomainRecord, MappingOutput};
pub use error::{ConfigError, FetchError, LlmError, MalformedAnalysisError, PipelineError, PromptError, StoreError};
pub use fetch::{FetchedPage, Fetcher, ReqwestFetcher};
pub use manifest::{DataType, ExtractionResult, ManifestId, SourceType, StructuralManifest};
pub use pipeline::Pipeline;
pub use store::ManifestStore;
pub use stores::MemoryManifestStore;

#[cfg(feature = "postgres")]
pub use stores::PostgresManifestStore;

pub use testing::{MockFetcher, MockLlmClient, MockManifestStore, MockPromptClient};
