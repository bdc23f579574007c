//! Region runner - reference implementation
//!
//! Demonstrates wiring a [`DeclarativeRegionConfig`] to a [`Pipeline`] and
//! running every configured data source once. Copy this file and customize
//! for your own deployment:
//! - Swap `MemoryManifestStore` for `PostgresManifestStore` (feature `postgres`)
//! - Swap `ReqwestLlmClient` for whichever provider you've configured
//! - Add your own retry/backoff `Fetcher` instead of `ReqwestFetcher`
//!
//! ```bash
//! cargo run --example run_region
//! ```

use civic_ingest_pipeline::analyze::{ReqwestLlmClient, StaticPromptClient};
use civic_ingest_pipeline::config::{validate_region_config, DataSourceConfig, DeclarativeRegionConfig};
use civic_ingest_pipeline::fetch::ReqwestFetcher;
use civic_ingest_pipeline::manifest::{DataType, SourceType};
use civic_ingest_pipeline::stores::MemoryManifestStore;
use civic_ingest_pipeline::Pipeline;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let region = DeclarativeRegionConfig {
        region_id: "minneapolis".to_string(),
        region_name: "Minneapolis".to_string(),
        description: "City of Minneapolis open civic data".to_string(),
        timezone: "America/Chicago".to_string(),
        data_sources: vec![DataSourceConfig {
            url: "https://www.minneapolismn.gov/ballot-propositions".to_string(),
            data_type: DataType::Propositions,
            content_goal: "extract ballot propositions up for vote this cycle".to_string(),
            source_type: SourceType::Html,
            category: None,
            hints: None,
            bulk: None,
            api: None,
        }],
        rate_limit: None,
        cache_ttl_ms: None,
        request_timeout_ms: None,
    };

    if let Err(errors) = validate_region_config(&region) {
        for error in errors {
            eprintln!("config error: {error}");
        }
        std::process::exit(1);
    }

    let fetcher = ReqwestFetcher::new();
    let store = MemoryManifestStore::new();
    let prompts = StaticPromptClient;
    let llm = ReqwestLlmClient::new(std::env::var("ANTHROPIC_API_KEY").ok());
    let pipeline = Pipeline::new(&fetcher, &store, &prompts, &llm);

    for source in &region.data_sources {
        let result = pipeline.execute(source, &region.region_id).await;
        println!(
            "{}: {} items, manifest v{}, {} warning(s), {} error(s)",
            source.url,
            result.items.len(),
            result.manifest_version,
            result.warnings.len(),
            result.errors.len(),
        );
    }
}
