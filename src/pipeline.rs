//! The single entry point that sequences
//! fetch, comparator, analyzer, extractor, self-healing, and domain mapping.
//! Never returns `Result::Err` -- every failure mode folds into the returned
//! [`ExtractionResult`], same as every collaborator it calls.

use std::time::Instant;

use crate::analyze::{self, LlmClient, PromptClient};
use crate::config::DataSourceConfig;
use crate::domain;
use crate::error::PipelineError;
use crate::fetch::Fetcher;
use crate::hash::compute_structure_hash;
use crate::heal;
use crate::ingestors::{api as api_ingestor, bulk as bulk_ingestor};
use crate::manifest::comparator;
use crate::manifest::{DataType, ExtractionResult, StructuralManifest};
use crate::store::ManifestStore;
use crate::{extract, validate};

use domain::DomainRecord;

pub struct Pipeline<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub store: &'a dyn ManifestStore,
    pub prompt_client: &'a dyn PromptClient,
    pub llm_client: &'a dyn LlmClient,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        fetcher: &'a dyn Fetcher,
        store: &'a dyn ManifestStore,
        prompt_client: &'a dyn PromptClient,
        llm_client: &'a dyn LlmClient,
    ) -> Self {
        Self { fetcher, store, prompt_client, llm_client }
    }

    pub async fn execute(&self, source: &DataSourceConfig, region_id: &str) -> ExtractionResult<DomainRecord> {
        let started = Instant::now();

        match source.source_type {
            crate::manifest::SourceType::BulkDownload => {
                let Some(bulk) = &source.bulk else {
                    return failure(0, vec![PipelineError::MissingBulkConfig.to_string()], started);
                };
                let raw = bulk_ingestor::ingest(source, bulk).await;
                finish(raw, source, 0, started)
            }
            crate::manifest::SourceType::Api => {
                let Some(api) = &source.api else {
                    return failure(0, vec![PipelineError::MissingApiConfig.to_string()], started);
                };
                let raw = api_ingestor::ingest(source, api).await;
                finish(raw, source, 0, started)
            }
            crate::manifest::SourceType::Html => self.execute_html(source, region_id, started).await,
        }
    }

    async fn execute_html(
        &self,
        source: &DataSourceConfig,
        region_id: &str,
        started: Instant,
    ) -> ExtractionResult<DomainRecord> {
        let page = match self.fetcher.fetch(&source.url).await {
            Ok(p) => p,
            Err(e) => return failure(0, vec![e.to_string()], started),
        };

        let current_structure_hash = compute_structure_hash(&page.content);
        let current_prompt_hash = match analyze::get_current_prompt_hash(self.prompt_client, source.data_type).await {
            Ok(h) => h,
            Err(e) => return failure(0, vec![e.to_string()], started),
        };

        let existing = match self.store.find_latest(region_id, &source.url, source.data_type).await {
            Ok(m) => m,
            Err(e) => return failure(0, vec![e.to_string()], started),
        };

        let comparison = comparator::compare(existing.as_ref(), &current_structure_hash, &current_prompt_hash);

        let mut manifest = if comparison.can_reuse {
            existing.expect("can_reuse implies an existing manifest")
        } else {
            match self.derive_and_save(source, region_id, &page.content, existing.as_ref(), &current_structure_hash).await {
                Ok(m) => m,
                Err(e) => return failure(0, vec![e.to_string()], started),
            }
        };

        let previous_item_count = manifest.last_item_count.map(|n| n as usize);

        let raw = extract::extract(&page.content, &manifest, Some(&source.url));
        let decision = heal::evaluate(&raw, &manifest, previous_item_count, false);

        let (final_raw, final_manifest) = if decision.should_heal {
            match self.heal_once(source, region_id, &page.content, &manifest, previous_item_count).await {
                Ok((r, m)) => (r, m),
                Err(e) => {
                    let _ = self.store.increment_failure(manifest.id).await;
                    return failure(manifest.version, vec![e.to_string()], started);
                }
            }
        } else {
            if decision.validation.valid {
                let _ = self.store.increment_success(manifest.id, raw.items.len()).await;
            } else {
                let _ = self.store.increment_failure(manifest.id).await;
            }
            let _ = self.store.mark_checked(manifest.id).await;
            (raw, manifest.clone())
        };

        manifest = final_manifest;
        let output = domain::map(&final_raw, source.data_type, source.category.as_deref());

        ExtractionResult {
            items: output.records,
            manifest_version: manifest.version,
            success: final_raw.success,
            warnings: output.warnings,
            errors: final_raw.errors,
            extraction_time_ms: started.elapsed().as_millis() as u64,
        }
    }

    async fn derive_and_save(
        &self,
        source: &DataSourceConfig,
        region_id: &str,
        html: &str,
        existing: Option<&StructuralManifest>,
        structure_hash: &str,
    ) -> Result<StructuralManifest, PipelineError> {
        let mut manifest = analyze::analyze(html, source, region_id, self.prompt_client, self.llm_client).await?;
        manifest.region_id = region_id.to_string();
        manifest.version = existing.map(|m| m.version + 1).unwrap_or(1);
        manifest.structure_hash = structure_hash.to_string();
        self.store.save(manifest.clone()).await?;
        Ok(manifest)
    }

    /// One forced re-derivation + re-extraction, never called a second time
    /// for the same invocation.
    async fn heal_once(
        &self,
        source: &DataSourceConfig,
        region_id: &str,
        html: &str,
        manifest: &StructuralManifest,
        previous_item_count: Option<usize>,
    ) -> Result<(crate::manifest::RawExtractionResult, StructuralManifest), PipelineError> {
        let healed_manifest = self.derive_and_save(source, region_id, html, Some(manifest), &manifest.structure_hash).await?;
        let healed_raw = extract::extract(html, &healed_manifest, Some(&source.url));
        let second = heal::evaluate(&healed_raw, &healed_manifest, previous_item_count, true);

        if second.validation.valid {
            self.store.increment_success(healed_manifest.id, healed_raw.items.len()).await?;
        } else {
            self.store.increment_failure(healed_manifest.id).await?;
        }
        self.store.mark_checked(healed_manifest.id).await?;

        Ok((healed_raw, healed_manifest))
    }
}

fn finish(raw: crate::manifest::RawExtractionResult, source: &DataSourceConfig, manifest_version: u32, started: Instant) -> ExtractionResult<DomainRecord> {
    let output = domain::map(&raw, source.data_type, source.category.as_deref());
    ExtractionResult {
        items: output.records,
        manifest_version,
        success: raw.success,
        warnings: output.warnings,
        errors: raw.errors,
        extraction_time_ms: started.elapsed().as_millis() as u64,
    }
}

fn failure(manifest_version: u32, errors: Vec<String>, started: Instant) -> ExtractionResult<DomainRecord> {
    let mut result = ExtractionResult::failure(manifest_version, errors, started.elapsed().as_millis() as u64);
    result.items = Vec::new();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::{LlmCompletion, LlmOptions, PromptTemplate};
    use crate::config::DataSourceConfig;
    use crate::error::{LlmError, PromptError};
    use crate::fetch::FetchedPage;
    use crate::manifest::{DataType, SourceType};
    use crate::stores::MemoryManifestStore;
    use async_trait::async_trait;

    struct StaticFetcher(&'static str);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage, crate::error::FetchError> {
            Ok(FetchedPage { content: self.0.to_string(), url: url.to_string(), status_code: 200, cached: false })
        }
    }

    struct FixedPromptClient;

    #[async_trait]
    impl PromptClient for FixedPromptClient {
        async fn get_prompt(&self, _data_type: DataType) -> Result<PromptTemplate, PromptError> {
            Ok(PromptTemplate { text: "template".into(), hash: "prompt-hash".into() })
        }
    }

    struct FixedLlmClient;

    #[async_trait]
    impl LlmClient for FixedLlmClient {
        async fn complete(&self, _prompt: &str, _opts: LlmOptions) -> Result<LlmCompletion, LlmError> {
            let body = r#"{"containerSelector": ".list", "itemSelector": ".item", "fieldMappings": [
                {"fieldName": "externalId", "selector": ".id", "extractionMethod": "text", "required": true},
                {"fieldName": "title", "selector": ".title", "extractionMethod": "text", "required": true}
            ]}"#;
            Ok(LlmCompletion { text: body.to_string(), tokens_used: Some(1), model: None, provider: None })
        }
    }

    fn source() -> DataSourceConfig {
        DataSourceConfig {
            url: "https://example.com/props".into(),
            data_type: DataType::Propositions,
            content_goal: "extract ballot propositions".into(),
            source_type: SourceType::Html,
            category: None,
            hints: None,
            bulk: None,
            api: None,
        }
    }

    #[tokio::test]
    async fn first_run_derives_and_extracts() {
        let html = r#"<html><body><ul class="list">
            <li class="item"><span class="id">p-1</span><span class="title">Prop One</span></li>
            <li class="item"><span class="id">p-2</span><span class="title">Prop Two</span></li>
        </ul></body></html>"#;
        let fetcher = StaticFetcher(html);
        let store = MemoryManifestStore::new();
        let pipeline = Pipeline::new(&fetcher, &store, &FixedPromptClient, &FixedLlmClient);

        let result = pipeline.execute(&source(), "mn").await;

        assert!(result.success);
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.manifest_version, 1);
    }

    #[tokio::test]
    async fn second_run_with_identical_html_reuses_manifest() {
        let html = r#"<html><body><ul class="list">
            <li class="item"><span class="id">p-1</span><span class="title">Prop One</span></li>
        </ul></body></html>"#;
        let fetcher = StaticFetcher(html);
        let store = MemoryManifestStore::new();
        let pipeline = Pipeline::new(&fetcher, &store, &FixedPromptClient, &FixedLlmClient);

        let first = pipeline.execute(&source(), "mn").await;
        let second = pipeline.execute(&source(), "mn").await;

        assert_eq!(first.manifest_version, second.manifest_version);
        let history = store.get_history("mn", &source().url, DataType::Propositions, 10).await.unwrap();
        assert_eq!(history.len(), 1, "a cache hit must not persist a new manifest version");
    }

    #[tokio::test]
    async fn bulk_source_without_config_fails_with_missing_bulk_message() {
        let mut source = source();
        source.source_type = SourceType::BulkDownload;
        let fetcher = StaticFetcher("");
        let store = MemoryManifestStore::new();
        let pipeline = Pipeline::new(&fetcher, &store, &FixedPromptClient, &FixedLlmClient);

        let result = pipeline.execute(&source, "mn").await;

        assert!(!result.success);
        assert!(result.errors.iter().any(|e| e.contains("bulk")));
    }
}
