//! Declarative region/source configuration and its pre-execution validation.
//! `ConfigInvalid` errors are accumulated, not fail-fast, so a caller sees
//! every problem in one pass.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::manifest::{DataType, SourceType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaginationType {
    Offset,
    Page,
    Cursor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPaginationConfig {
    #[serde(rename = "type")]
    pub kind: PaginationType,
    pub limit: Option<u32>,
    pub page_param: Option<String>,
    pub limit_param: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkConfig {
    pub format: String,
    pub file_pattern: Option<String>,
    pub delimiter: Option<String>,
    pub header_lines: Option<u32>,
    pub column_mappings: std::collections::BTreeMap<String, String>,
    pub filters: Option<std::collections::BTreeMap<String, String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    pub results_path: String,
    pub method: Option<String>,
    pub query_params: Option<std::collections::BTreeMap<String, String>>,
    pub api_key_env_var: Option<String>,
    pub api_key_header: Option<String>,
    pub pagination: Option<ApiPaginationConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConfig {
    pub url: String,
    pub data_type: DataType,
    pub content_goal: String,
    #[serde(default)]
    pub source_type: SourceType,
    pub category: Option<String>,
    pub hints: Option<String>,
    pub bulk: Option<BulkConfig>,
    pub api: Option<ApiConfig>,
}

impl DataSourceConfig {
    /// `sourceSystem` is inferred from `category`, not stored directly --
    /// "cal-access*" prefixes map to `cal_access`, "fec*" to `fec`.
    pub fn infer_source_system(&self) -> Option<&'static str> {
        let category = self.category.as_deref()?.to_lowercase();
        if category.starts_with("cal-access") || category.starts_with("cal_access") {
            Some("cal_access")
        } else if category.starts_with("fec") {
            Some("fec")
        } else {
            None
        }
    }

    fn validate(&self, path: &str, errors: &mut Vec<ConfigError>) {
        if self.url.is_empty() {
            errors.push(ConfigError::new(format!("{path}.url"), "url is required"));
        } else if !self.url.starts_with("https://") {
            errors.push(ConfigError::new(format!("{path}.url"), "url must use https"));
        }

        if self.content_goal.trim().len() < 10 {
            errors.push(ConfigError::new(
                format!("{path}.contentGoal"),
                "contentGoal must be at least 10 characters",
            ));
        }

        match self.source_type {
            SourceType::BulkDownload if self.bulk.is_none() => {
                errors.push(ConfigError::new(format!("{path}.bulk"), "bulk configuration is required for sourceType=bulk_download"));
            }
            SourceType::Api if self.api.is_none() => {
                errors.push(ConfigError::new(format!("{path}.api"), "api configuration is required for sourceType=api"));
            }
            _ => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarativeRegionConfig {
    pub region_id: String,
    pub region_name: String,
    pub description: String,
    pub timezone: String,
    pub data_sources: Vec<DataSourceConfig>,
    pub rate_limit: Option<u32>,
    pub cache_ttl_ms: Option<u64>,
    pub request_timeout_ms: Option<u64>,
}

fn is_valid_region_id(region_id: &str) -> bool {
    let mut chars = region_id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {}
        _ => return false,
    }
    region_id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Validate a region config's semantic rules, accumulating every problem
/// found rather than stopping at the first.
pub fn validate_region_config(config: &DeclarativeRegionConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !is_valid_region_id(&config.region_id) {
        errors.push(ConfigError::new(
            "regionId",
            "must be lowercase alphanumeric/hyphen and start with a letter",
        ));
    }

    if config.data_sources.is_empty() {
        errors.push(ConfigError::new("dataSources", "at least one data source is required"));
    }

    let mut seen = std::collections::HashSet::new();
    for (i, source) in config.data_sources.iter().enumerate() {
        let path = format!("dataSources[{i}]");
        source.validate(&path, &mut errors);

        let key = (source.url.clone(), source.data_type, source.category.clone().unwrap_or_default());
        if !seen.insert(key) {
            errors.push(ConfigError::new(path, "(url, dataType, category) triple is not unique"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_source() -> DataSourceConfig {
        DataSourceConfig {
            url: "https://example.com/props".into(),
            data_type: DataType::Propositions,
            content_goal: "extract all ballot propositions".into(),
            source_type: SourceType::Html,
            category: None,
            hints: None,
            bulk: None,
            api: None,
        }
    }

    fn base_region(sources: Vec<DataSourceConfig>) -> DeclarativeRegionConfig {
        DeclarativeRegionConfig {
            region_id: "minneapolis".into(),
            region_name: "Minneapolis".into(),
            description: "".into(),
            timezone: "America/Chicago".into(),
            data_sources: sources,
            rate_limit: None,
            cache_ttl_ms: None,
            request_timeout_ms: None,
        }
    }

    #[test]
    fn valid_config_passes() {
        assert!(validate_region_config(&base_region(vec![base_source()])).is_ok());
    }

    #[test]
    fn http_url_is_rejected() {
        let mut source = base_source();
        source.url = "http://example.com".into();
        let errors = validate_region_config(&base_region(vec![source])).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("https")));
    }

    #[test]
    fn short_content_goal_is_rejected() {
        let mut source = base_source();
        source.content_goal = "short".into();
        let errors = validate_region_config(&base_region(vec![source])).unwrap_err();
        assert!(errors.iter().any(|e| e.path.contains("contentGoal")));
    }

    #[test]
    fn duplicate_triples_are_rejected() {
        let errors = validate_region_config(&base_region(vec![base_source(), base_source()])).unwrap_err();
        assert!(errors.iter().any(|e| e.message.contains("unique")));
    }

    #[test]
    fn bulk_source_without_bulk_config_is_rejected() {
        let mut source = base_source();
        source.source_type = SourceType::BulkDownload;
        let errors = validate_region_config(&base_region(vec![source])).unwrap_err();
        assert!(errors.iter().any(|e| e.path.contains("bulk")));
    }

    #[test]
    fn region_id_format_is_checked() {
        let errors = validate_region_config(&base_region_with_id("MN-1", vec![base_source()])).unwrap_err();
        assert!(errors.iter().any(|e| e.path == "regionId"));
    }

    fn base_region_with_id(id: &str, sources: Vec<DataSourceConfig>) -> DeclarativeRegionConfig {
        let mut r = base_region(sources);
        r.region_id = id.into();
        r
    }

    #[test]
    fn source_system_inference() {
        let mut source = base_source();
        source.category = Some("cal-access-committee".into());
        assert_eq!(source.infer_source_system(), Some("cal_access"));
        source.category = Some("fec-contribution".into());
        assert_eq!(source.infer_source_system(), Some("fec"));
    }
}
