//! Paginated JSON fetching into a
//! [`RawExtractionResult`]. Paginates up to [`MAX_PAGES`], sleeping briefly
//! between requests to stay polite to the upstream API.

use std::time::Duration;

use tracing::{debug, warn};

use crate::config::{ApiConfig, DataSourceConfig, PaginationType};
use crate::error::FetchError;
use crate::manifest::RawExtractionResult;

pub const MAX_PAGES: u32 = 10;
const INTER_PAGE_SLEEP: Duration = Duration::from_millis(250);
const PAGE_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_PAGE_LIMIT: u32 = 100;

pub async fn ingest(source: &DataSourceConfig, api: &ApiConfig) -> RawExtractionResult {
    let mut result = RawExtractionResult::default();

    let client = match reqwest::Client::builder().timeout(PAGE_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            result.errors.push(format!("failed to build http client: {e}"));
            return result;
        }
    };

    let mut cursor: Option<String> = None;

    for page in 0..MAX_PAGES {
        let url = match build_page_url(source, api, page, cursor.as_deref()) {
            Ok(u) => u,
            Err(e) => {
                result.errors.push(e);
                return result;
            }
        };

        debug!(url = %url, page, "api page fetch starting");
        let body: serde_json::Value = match client.get(&url).send().await {
            Ok(response) if response.status().is_success() => match response.json().await {
                Ok(json) => json,
                Err(e) => {
                    result.errors.push(format!("api response was not valid JSON: {e}"));
                    return result;
                }
            },
            Ok(response) => {
                result.errors.push(FetchError::Status { url: url.clone(), status: response.status().as_u16() }.to_string());
                return result;
            }
            Err(e) => {
                result.errors.push(FetchError::Http { url: url.clone(), source: Box::new(e) }.to_string());
                return result;
            }
        };

        let items = navigate_results_path(&body, &api.results_path);
        let page_count = items.len();

        let limit = api.pagination.as_ref().and_then(|p| p.limit);
        for item in items {
            let Some(mut record) = item.as_object().cloned() else { continue };
            if let Some(source_system) = source.infer_source_system() {
                record.insert("sourceSystem".into(), serde_json::Value::String(source_system.into()));
            }
            result.items.push(record);
        }

        let Some(pagination) = &api.pagination else {
            break;
        };

        let should_continue = match pagination.kind {
            PaginationType::Cursor => {
                cursor = next_cursor(&body);
                cursor.is_some()
            }
            PaginationType::Offset | PaginationType::Page => {
                page_count >= limit.unwrap_or(DEFAULT_PAGE_LIMIT) as usize
            }
        };

        if !should_continue {
            break;
        }

        if page + 1 == MAX_PAGES {
            result.warnings.push("reached max page limit — more data may be available".into());
            break;
        }

        tokio::time::sleep(INTER_PAGE_SLEEP).await;
    }

    result.success = true;
    result
}

fn build_page_url(
    source: &DataSourceConfig,
    api: &ApiConfig,
    page: u32,
    cursor: Option<&str>,
) -> Result<String, String> {
    let mut url = url::Url::parse(&source.url).map_err(|e| format!("invalid api url {:?}: {e}", source.url))?;

    {
        let mut query_pairs = url.query_pairs_mut();
        if let Some(params) = &api.query_params {
            for (key, value) in params {
                query_pairs.append_pair(key, value);
            }
        }

        if let Some(env_var) = &api.api_key_env_var {
            match std::env::var(env_var) {
                Ok(key_value) => {
                    let header_name = api.api_key_header.as_deref().unwrap_or("api_key");
                    query_pairs.append_pair(header_name, &key_value);
                }
                Err(_) => {
                    warn!(env_var, "api key env var not set, proceeding unauthenticated");
                }
            }
        }

        if let Some(pagination) = &api.pagination {
            let limit = pagination.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
            match pagination.kind {
                PaginationType::Offset => {
                    let page_param = pagination.page_param.as_deref().unwrap_or("offset");
                    let limit_param = pagination.limit_param.as_deref().unwrap_or("per_page");
                    query_pairs.append_pair(page_param, &(page * limit).to_string());
                    query_pairs.append_pair(limit_param, &limit.to_string());
                }
                PaginationType::Page => {
                    let page_param = pagination.page_param.as_deref().unwrap_or("page");
                    query_pairs.append_pair(page_param, &(page + 1).to_string());
                }
                PaginationType::Cursor => {
                    if let Some(cursor) = cursor {
                        query_pairs.append_pair("last_index", cursor);
                    }
                }
            }
        }
    }

    Ok(url.to_string())
}

fn navigate_results_path(body: &serde_json::Value, results_path: &str) -> Vec<serde_json::Value> {
    let mut current = body;
    for key in results_path.split('.') {
        match current.get(key) {
            Some(next) => current = next,
            None => return Vec::new(),
        }
    }
    current.as_array().cloned().unwrap_or_default()
}

fn next_cursor(body: &serde_json::Value) -> Option<String> {
    let candidates = [
        &["pagination", "last_indexes", "last_index"][..],
        &["pagination", "last_index"][..],
        &["pagination", "cursor"][..],
        &["pagination", "next_cursor"][..],
        &["pagination", "next"][..],
    ];

    for path in candidates {
        let mut current = body;
        let mut found = true;
        for key in path {
            match current.get(key) {
                Some(next) => current = next,
                None => {
                    found = false;
                    break;
                }
            }
        }
        if found {
            if let Some(s) = current.as_str() {
                return Some(s.to_string());
            }
            if let Some(n) = current.as_i64() {
                return Some(n.to_string());
            }
        }
    }
    None
}
