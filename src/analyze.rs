//! Derives a fresh [`StructuralManifest`]
//! from raw HTML by asking an LLM to infer extraction rules from the page's
//! skeleton. The LLM/prompt-template collaborators are injected traits --
//! this crate owns only the prompt construction and response validation.

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::config::DataSourceConfig;
use crate::error::{LlmError, MalformedAnalysisError, PromptError};
use crate::hash::compute_structure_hash;
use crate::manifest::{AnalysisDiagnostics, DataType, ExtractionRules, StructuralManifest};

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub text: String,
    pub hash: String,
}

/// External collaborator providing the raw, uninterpolated prompt template
/// text for a data type. Deterministic per template version.
#[async_trait]
pub trait PromptClient: Send + Sync {
    async fn get_prompt(&self, data_type: DataType) -> Result<PromptTemplate, PromptError>;
}

#[derive(Debug, Clone)]
pub struct LlmCompletion {
    pub text: String,
    pub tokens_used: Option<u32>,
    pub model: Option<String>,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct LlmOptions {
    pub json_schema: bool,
    pub model: Option<String>,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, opts: LlmOptions) -> Result<LlmCompletion, LlmError>;
}

/// Static, built-in prompt templates, one per data type. Hashing happens on
/// the raw template text *before* interpolation, so two sources that share a
/// data type share a `prompt_hash` even though their rendered prompts differ.
pub struct StaticPromptClient;

impl StaticPromptClient {
    fn template_for(data_type: DataType) -> &'static str {
        match data_type {
            DataType::Propositions => include_str!("prompts/propositions.txt"),
            DataType::Meetings => include_str!("prompts/meetings.txt"),
            DataType::Representatives => include_str!("prompts/representatives.txt"),
            DataType::CampaignFinance => include_str!("prompts/campaign_finance.txt"),
        }
    }
}

#[async_trait]
impl PromptClient for StaticPromptClient {
    async fn get_prompt(&self, data_type: DataType) -> Result<PromptTemplate, PromptError> {
        let text = Self::template_for(data_type).to_string();
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        Ok(PromptTemplate { text, hash: hex::encode(hasher.finalize()) })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisResponse {
    container_selector: String,
    item_selector: String,
    field_mappings: Vec<crate::manifest::FieldMapping>,
    #[serde(default)]
    preprocessing: Option<Vec<crate::manifest::PreprocessingStep>>,
}

/// Compute the hash of the raw, uninterpolated template text the analyzer
/// would use for `data_type`, without running a full analysis. Used by the
/// orchestrator to decide reuse before spending an LLM call.
pub async fn get_current_prompt_hash(
    prompt_client: &dyn PromptClient,
    data_type: DataType,
) -> Result<String, PromptError> {
    Ok(prompt_client.get_prompt(data_type).await?.hash)
}

fn build_prompt(template: &str, html_skeleton: &str, source: &DataSourceConfig) -> String {
    let mut prompt = template
        .replace("{url}", &source.url)
        .replace("{contentGoal}", &source.content_goal)
        .replace("{category}", source.category.as_deref().unwrap_or(""))
        .replace("{hints}", source.hints.as_deref().unwrap_or(""));
    prompt.push_str("\n\n---\n\n");
    prompt.push_str(html_skeleton);
    prompt
}

/// Derive a fresh manifest for `source` from `html`. `version` is left at 1;
/// the orchestrator overrides it once it knows the identity's prior version.
pub async fn analyze(
    html: &str,
    source: &DataSourceConfig,
    region_id: &str,
    prompt_client: &dyn PromptClient,
    llm_client: &dyn LlmClient,
) -> Result<StructuralManifest, MalformedAnalysisError> {
    let structure_hash = compute_structure_hash(html);

    let template = prompt_client
        .get_prompt(source.data_type)
        .await
        .map_err(|e| MalformedAnalysisError(e.to_string()))?;

    let prompt = build_prompt(&template.text, &structure_skeleton(html), source);

    let completion = llm_client
        .complete(&prompt, LlmOptions { json_schema: true, model: None })
        .await
        .map_err(|e| MalformedAnalysisError(e.to_string()))?;

    let parsed: AnalysisResponse = parse_llm_json(&completion.text)
        .map_err(|e| MalformedAnalysisError(format!("could not parse analysis response: {e}")))?;

    for field in &parsed.field_mappings {
        if field.field_name.is_empty() || field.selector.is_empty() {
            return Err(MalformedAnalysisError("field mapping missing fieldName or selector".into()));
        }
    }

    let rules = ExtractionRules {
        container_selector: parsed.container_selector,
        item_selector: parsed.item_selector,
        field_mappings: parsed.field_mappings,
        preprocessing: parsed.preprocessing,
        pagination: None,
    };

    let diagnostics = AnalysisDiagnostics {
        confidence: 1.0,
        llm_provider: completion.provider,
        llm_model: completion.model,
        llm_tokens_used: completion.tokens_used,
        analysis_time_ms: None,
    };

    Ok(StructuralManifest::fresh(
        region_id,
        &source.url,
        source.data_type,
        structure_hash,
        template.hash,
        rules,
        diagnostics,
    ))
}

/// LLMs occasionally wrap their JSON response in a markdown code fence or
/// return a JSON-encoded string instead of a native object; tolerate both.
fn parse_llm_json<T: for<'de> Deserialize<'de>>(text: &str) -> Result<T, serde_json::Error> {
    let trimmed = text.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```").trim();
    match serde_json::from_str::<T>(trimmed) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            if let Ok(as_string) = serde_json::from_str::<String>(trimmed) {
                serde_json::from_str::<T>(&as_string)
            } else {
                Err(first_err)
            }
        }
    }
}

fn structure_skeleton(html: &str) -> String {
    // The analyzer sees the same skeleton representation the hasher hashes,
    // so the LLM's selectors are grounded in exactly what changed detection
    // is keyed on.
    html.chars().take(20_000).collect()
}

#[derive(Default)]
pub struct ReqwestLlmClient {
    client: reqwest::Client,
    api_key: Option<secrecy::SecretString>,
}

impl ReqwestLlmClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), api_key: api_key.map(secrecy::SecretString::from) }
    }
}

#[async_trait]
impl LlmClient for ReqwestLlmClient {
    async fn complete(&self, prompt: &str, _opts: LlmOptions) -> Result<LlmCompletion, LlmError> {
        use secrecy::ExposeSecret;
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::Request("no API key configured".into()))?;

        let response = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("x-api-key", api_key.expose_secret())
            .header("anthropic-version", "2023-06-01")
            .json(&serde_json::json!({
                "model": "claude-haiku-4-5",
                "max_tokens": 4096,
                "messages": [{"role": "user", "content": prompt}],
            }))
            .send()
            .await
            .map_err(|e| LlmError::Request(Box::new(e)))?;

        let body: serde_json::Value = response.json().await.map_err(|e| LlmError::Request(Box::new(e)))?;
        let text = body["content"][0]["text"].as_str().unwrap_or_default().to_string();
        let tokens_used = body["usage"]["output_tokens"].as_u64().map(|n| n as u32);

        Ok(LlmCompletion {
            text,
            tokens_used,
            model: Some("claude-haiku-4-5".to_string()),
            provider: Some("anthropic".to_string()),
        })
    }
}

impl From<String> for LlmError {
    fn from(message: String) -> Self {
        LlmError::Request(message.into())
    }
}
