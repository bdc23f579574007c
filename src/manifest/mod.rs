//! Core manifest types: the cached, versioned extraction rules the pipeline
//! derives once per (region, source, data type) identity and reuses until the
//! page's HTML skeleton or the prompt template changes.

pub mod comparator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity for a [`StructuralManifest`]. UUIDv7 so manifest history sorts
/// chronologically by id as well as by `version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ManifestId(pub Uuid);

impl ManifestId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ManifestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ManifestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The four civic data types this pipeline knows how to derive rules for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Propositions,
    Meetings,
    Representatives,
    CampaignFinance,
}

/// How a [`crate::config::DataSourceConfig`] should be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    #[default]
    Html,
    BulkDownload,
    Api,
}

/// How a field's raw value should be pulled out of a matched DOM node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Text,
    Attribute,
    Html,
    Regex,
}

/// A normalization or reformatting step applied to a field's raw value after
/// extraction. Pure, dispatched in `crate::transform`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldTransform {
    Trim,
    Lowercase,
    Uppercase,
    StripHtml,
    UrlResolve,
    RegexReplace {
        pattern: String,
        #[serde(default)]
        replacement: Option<String>,
        #[serde(default)]
        flags: Option<String>,
    },
    NameFormat,
    DateParse,
}

/// One field's selector + extraction + (optional) transform rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    pub field_name: String,
    pub selector: String,
    pub extraction_method: ExtractionMethod,
    #[serde(default)]
    pub attribute: Option<String>,
    #[serde(default)]
    pub regex_pattern: Option<String>,
    #[serde(default)]
    pub regex_group: Option<u32>,
    pub required: bool,
    #[serde(default)]
    pub transform: Option<FieldTransform>,
    #[serde(default)]
    pub default_value: Option<String>,
}

/// A document-shaping step applied before container/item selectors run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreprocessingStep {
    RemoveElements { selector: String },
    UnwrapElements { selector: String },
    MergeTables { selector: String },
}

/// Pagination hints attached to extraction rules (rarely used -- most HTML
/// sources in this pipeline are single-page; pagination is primarily an API
/// ingest concern). Carried through verbatim if the analyzer emits one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionPagination {
    pub next_page_selector: Option<String>,
    pub max_pages: Option<u32>,
}

/// The cached, deterministic extraction recipe for one page structure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRules {
    pub container_selector: String,
    pub item_selector: String,
    pub field_mappings: Vec<FieldMapping>,
    #[serde(default)]
    pub preprocessing: Option<Vec<PreprocessingStep>>,
    #[serde(default)]
    pub pagination: Option<ExtractionPagination>,
}

/// Diagnostics recorded from the LLM call that produced `extraction_rules`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisDiagnostics {
    pub confidence: f32,
    pub llm_provider: Option<String>,
    pub llm_model: Option<String>,
    pub llm_tokens_used: Option<u32>,
    pub analysis_time_ms: Option<u64>,
}

/// A cached, versioned set of extraction rules for one
/// `(region_id, source_url, data_type)` identity.
///
/// Invariants:
/// - at most one `is_active = true` manifest per identity
/// - `version` is 1-based and monotonically increasing, never reused
/// - a cache hit implies `structure_hash`/`prompt_hash` are byte-identical
///   to the manifest's recorded values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralManifest {
    pub id: ManifestId,
    pub region_id: String,
    pub source_url: String,
    pub data_type: DataType,
    pub version: u32,

    pub structure_hash: String,
    pub prompt_hash: String,

    pub extraction_rules: ExtractionRules,
    pub diagnostics: AnalysisDiagnostics,

    pub success_count: u64,
    pub failure_count: u64,
    /// Item count from the most recent successful extraction against this
    /// identity, carried across versions -- feeds the Validator's count-drop
    /// check on the *next* run, not this one.
    pub last_item_count: Option<u64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl StructuralManifest {
    /// Construct a fresh, never-persisted manifest (version/id/timestamps
    /// left for the caller, since only the orchestrator knows the correct
    /// version number for this identity).
    pub fn fresh(
        region_id: impl Into<String>,
        source_url: impl Into<String>,
        data_type: DataType,
        structure_hash: String,
        prompt_hash: String,
        extraction_rules: ExtractionRules,
        diagnostics: AnalysisDiagnostics,
    ) -> Self {
        Self {
            id: ManifestId::new(),
            region_id: region_id.into(),
            source_url: source_url.into(),
            data_type,
            version: 1,
            structure_hash,
            prompt_hash,
            extraction_rules,
            diagnostics,
            success_count: 0,
            failure_count: 0,
            last_item_count: None,
            is_active: true,
            created_at: Utc::now(),
            last_used_at: None,
            last_checked_at: None,
        }
    }
}

/// Raw, untyped extraction output -- one record per matched item, field
/// values as loosely-typed JSON. Never raises; all failure surfaces here as
/// `warnings`/`errors` strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExtractionResult {
    pub items: Vec<serde_json::Map<String, serde_json::Value>>,
    pub success: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

/// The final, typed pipeline output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult<T> {
    pub items: Vec<T>,
    pub manifest_version: u32,
    pub success: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub extraction_time_ms: u64,
}

impl<T> ExtractionResult<T> {
    pub fn failure(manifest_version: u32, errors: Vec<String>, extraction_time_ms: u64) -> Self {
        Self {
            items: Vec::new(),
            manifest_version,
            success: false,
            warnings: Vec::new(),
            errors,
            extraction_time_ms,
        }
    }
}
