//! End-to-end pipeline scenarios, mirroring the literal cases the design
//! notes enumerate: cache hit, first run, self-healing, bulk CSV ingest,
//! API cursor pagination, and CSV filtering. No live network or LLM calls --
//! HTML scenarios use mock collaborators, bulk/API scenarios use a local
//! wiremock server.

use civic_ingest_pipeline::config::{ApiConfig, ApiPaginationConfig, BulkConfig, DataSourceConfig};
use civic_ingest_pipeline::manifest::{DataType, SourceType};
use civic_ingest_pipeline::testing::{MockFetcher, MockLlmClient, MockManifestStore, MockPromptClient};
use civic_ingest_pipeline::{DomainRecord, Pipeline};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html_source(url: &str) -> DataSourceConfig {
    DataSourceConfig {
        url: url.to_string(),
        data_type: DataType::Propositions,
        content_goal: "extract ballot propositions from the city clerk site".to_string(),
        source_type: SourceType::Html,
        category: None,
        hints: None,
        bulk: None,
        api: None,
    }
}

const ANALYSIS_RESPONSE: &str = r#"{
    "containerSelector": ".items",
    "itemSelector": ".item",
    "fieldMappings": [
        {"fieldName": "externalId", "selector": ".id", "extractionMethod": "text", "required": true},
        {"fieldName": "title", "selector": ".title", "extractionMethod": "text", "required": true}
    ]
}"#;

fn two_item_html() -> &'static str {
    r#"<html><body><ul class="items">
        <li class="item"><span class="id">prop-001</span><span class="title">Prop One</span></li>
        <li class="item"><span class="id">prop-002</span><span class="title">Prop Two</span></li>
    </ul></body></html>"#
}

#[tokio::test]
async fn scenario_1_cache_hit_skips_analyzer_and_extracts_from_existing_manifest() {
    let url = "https://clerk.example.gov/propositions";
    let fetcher = MockFetcher::new().with_page(url, two_item_html());
    let store = MockManifestStore::new();
    let prompts = MockPromptClient::new();
    let llm = MockLlmClient::new().with_fixed_response(ANALYSIS_RESPONSE);
    let pipeline = Pipeline::new(&fetcher, &store, &prompts, &llm);
    let source = html_source(url);

    let first = pipeline.execute(&source, "mn").await;
    assert_eq!(first.manifest_version, 1);
    assert_eq!(llm.calls().len(), 1, "first run must call the analyzer once");

    let second = pipeline.execute(&source, "mn").await;

    assert_eq!(second.manifest_version, 1);
    assert_eq!(second.items.len(), 2);
    assert!(second.warnings.is_empty());
    assert_eq!(llm.calls().len(), 1, "cache hit must not re-invoke the analyzer");
}

#[tokio::test]
async fn scenario_2_first_run_derives_manifest_and_extracts_two_propositions() {
    let url = "https://clerk.example.gov/propositions";
    let fetcher = MockFetcher::new().with_page(url, two_item_html());
    let store = MockManifestStore::new();
    let prompts = MockPromptClient::new();
    let llm = MockLlmClient::new().with_fixed_response(ANALYSIS_RESPONSE);
    let pipeline = Pipeline::new(&fetcher, &store, &prompts, &llm);

    let result = pipeline.execute(&html_source(url), "mn").await;

    assert_eq!(result.manifest_version, 1);
    assert!(result.success);
    assert_eq!(result.items.len(), 2);
    let ids: Vec<&str> = result
        .items
        .iter()
        .map(|r| match r {
            DomainRecord::Proposition(p) => p.external_id.as_str(),
            _ => panic!("expected a proposition"),
        })
        .collect();
    assert_eq!(ids, vec!["prop-001", "prop-002"]);

    let saves = store.calls().into_iter().filter(|c| matches!(c, civic_ingest_pipeline::testing::MockStoreCall::Save { .. })).count();
    assert_eq!(saves, 1);
}

#[tokio::test]
async fn scenario_3_zero_items_triggers_self_heal_to_a_working_manifest() {
    let url = "https://clerk.example.gov/propositions";
    let stale_html = r#"<html><body><ul class="nothing-matches"></ul></body></html>"#;
    let fetcher = MockFetcher::new().with_page(url, stale_html);
    let store = MockManifestStore::new();
    let prompts = MockPromptClient::new();
    // First analysis call yields selectors that don't match `stale_html`
    // either (simulating a fully stale structure); healing re-derives with
    // the same LLM client, which in this scenario is primed to succeed the
    // second time once the page content itself changes mid-flight.
    let broken_response = r#"{
        "containerSelector": ".items",
        "itemSelector": ".item",
        "fieldMappings": [
            {"fieldName": "externalId", "selector": ".id", "extractionMethod": "text", "required": true}
        ]
    }"#;
    let llm = MockLlmClient::new().with_responses(vec![broken_response, ANALYSIS_RESPONSE]);
    let pipeline = Pipeline::new(&fetcher, &store, &prompts, &llm);

    let result = pipeline.execute(&html_source(url), "mn").await;

    // Both derivations run against the same (empty-matching) HTML, so the
    // healed extraction also yields zero items -- this exercises that
    // self-healing fires exactly once and does not loop.
    assert_eq!(result.manifest_version, 2, "healing re-derives to a new manifest version");
    assert_eq!(llm.calls().len(), 2, "self-healing invokes the analyzer exactly once more");
}

#[tokio::test]
async fn scenario_3b_self_heal_recovers_when_the_second_derivation_matches() {
    let url = "https://clerk.example.gov/propositions";
    let fetcher = MockFetcher::new().with_page(url, two_item_html());
    let store = MockManifestStore::new();
    let prompts = MockPromptClient::new();
    let stale_response = r#"{
        "containerSelector": ".does-not-exist",
        "itemSelector": ".item",
        "fieldMappings": [
            {"fieldName": "externalId", "selector": ".id", "extractionMethod": "text", "required": true},
            {"fieldName": "title", "selector": ".title", "extractionMethod": "text", "required": true}
        ]
    }"#;
    let llm = MockLlmClient::new().with_responses(vec![stale_response, ANALYSIS_RESPONSE]);
    let pipeline = Pipeline::new(&fetcher, &store, &prompts, &llm);

    let result = pipeline.execute(&html_source(url), "mn").await;

    assert_eq!(result.manifest_version, 2);
    assert_eq!(result.items.len(), 2, "the re-derived manifest's selectors match the page");
    assert!(result.success);
}

#[tokio::test]
async fn scenario_4_bulk_csv_maps_columns_and_injects_source_system() {
    let server = MockServer::start().await;
    let csv = "TRAN_ID,CMTE_ID,NAME,AMOUNT,DATE\nC-1,COM-1,Jane Doe,500,01/15/2025\nC-2,COM-1,John Smith,250,02/20/2025";
    Mock::given(method("GET"))
        .and(path("/contributions.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(csv))
        .mount(&server)
        .await;

    let source = DataSourceConfig {
        url: format!("{}/contributions.csv", server.uri()),
        data_type: DataType::CampaignFinance,
        content_goal: "extract campaign contributions from the state bulk export".to_string(),
        source_type: SourceType::BulkDownload,
        category: Some("cal-access-contributions".to_string()),
        hints: None,
        bulk: Some(BulkConfig {
            format: "csv".to_string(),
            file_pattern: None,
            delimiter: None,
            header_lines: Some(0),
            column_mappings: std::collections::BTreeMap::from([
                ("TRAN_ID".to_string(), "externalId".to_string()),
                ("CMTE_ID".to_string(), "committeeId".to_string()),
                ("NAME".to_string(), "donorName".to_string()),
                ("AMOUNT".to_string(), "amount".to_string()),
                ("DATE".to_string(), "date".to_string()),
            ]),
            filters: None,
        }),
        api: None,
    };

    let fetcher = MockFetcher::new();
    let store = MockManifestStore::new();
    let prompts = MockPromptClient::new();
    let llm = MockLlmClient::new();
    let pipeline = Pipeline::new(&fetcher, &store, &prompts, &llm);

    let result = pipeline.execute(&source, "ca").await;

    assert!(result.success);
    assert_eq!(result.items.len(), 2);
    for record in &result.items {
        match record {
            DomainRecord::Contribution(c) => {
                assert_eq!(c.source_system, civic_ingest_pipeline::domain::SourceSystem::CalAccess);
            }
            other => panic!("expected a contribution, got {other:?}"),
        }
    }
    let amounts: Vec<f64> = result
        .items
        .iter()
        .map(|r| match r {
            DomainRecord::Contribution(c) => c.amount,
            _ => unreachable!(),
        })
        .collect();
    assert_eq!(amounts, vec![500.0, 250.0]);
}

#[tokio::test]
async fn scenario_5_api_cursor_pagination_stops_after_two_pages() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/records"))
        .and(query_param("last_index", "x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{"externalId": "B", "name": "Rep B"}],
            "pagination": {}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/records"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{"externalId": "A", "name": "Rep A"}],
            "pagination": {"last_indexes": {"last_index": "x"}}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    let source = DataSourceConfig {
        url: format!("{}/records", server.uri()),
        data_type: DataType::Representatives,
        content_goal: "extract representatives from the FEC-style paginated api".to_string(),
        source_type: SourceType::Api,
        category: None,
        hints: None,
        bulk: None,
        api: Some(ApiConfig {
            results_path: "results".to_string(),
            method: None,
            query_params: None,
            api_key_env_var: None,
            api_key_header: None,
            pagination: Some(ApiPaginationConfig {
                kind: civic_ingest_pipeline::config::PaginationType::Cursor,
                limit: None,
                page_param: None,
                limit_param: None,
            }),
        }),
    };

    let fetcher = MockFetcher::new();
    let store = MockManifestStore::new();
    let prompts = MockPromptClient::new();
    let llm = MockLlmClient::new();
    let pipeline = Pipeline::new(&fetcher, &store, &prompts, &llm);

    let result = pipeline.execute(&source, "federal").await;

    assert!(result.success);
    assert_eq!(result.items.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2, "exactly two HTTP GETs, no third call");
}

#[tokio::test]
async fn scenario_5b_offset_pagination_with_no_limit_configured_stops_on_a_short_page() {
    let server = MockServer::start().await;

    // Default page size is 100 when `limit` is unset. A full first page
    // (100 items) must continue; a short second page (3 items) must stop
    // rather than burn through MAX_PAGES.
    let full_page: Vec<_> = (0..100).map(|i| serde_json::json!({"externalId": format!("r-{i}")})).collect();
    let short_page: Vec<_> = (0..3).map(|i| serde_json::json!({"externalId": format!("s-{i}")})).collect();

    Mock::given(method("GET"))
        .and(path("/records"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": full_page})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/records"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"results": short_page})))
        .mount(&server)
        .await;

    let source = DataSourceConfig {
        url: format!("{}/records", server.uri()),
        data_type: DataType::CampaignFinance,
        content_goal: "extract campaign finance rows from a paginated api".to_string(),
        source_type: SourceType::Api,
        category: None,
        hints: None,
        bulk: None,
        api: Some(ApiConfig {
            results_path: "results".to_string(),
            method: None,
            query_params: None,
            api_key_env_var: None,
            api_key_header: None,
            pagination: Some(ApiPaginationConfig {
                kind: civic_ingest_pipeline::config::PaginationType::Offset,
                limit: None,
                page_param: None,
                limit_param: None,
            }),
        }),
    };

    let raw = civic_ingest_pipeline::ingestors::api::ingest(&source, source.api.as_ref().unwrap()).await;

    assert!(raw.success);
    assert_eq!(raw.items.len(), 103, "both pages collected before stopping");
    assert_eq!(server.received_requests().await.unwrap().len(), 2, "stops after the short page, no third call");
}

#[tokio::test]
async fn scenario_6_filter_excludes_non_matching_rows() {
    let server = MockServer::start().await;
    let csv = "ID,STATE\nr-1,CA\nr-2,NY\nr-3,CA";
    Mock::given(method("GET"))
        .and(path("/rows.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(csv))
        .mount(&server)
        .await;

    let source = DataSourceConfig {
        url: format!("{}/rows.csv", server.uri()),
        data_type: DataType::Representatives,
        content_goal: "extract representatives filtered to California rows only".to_string(),
        source_type: SourceType::BulkDownload,
        category: None,
        hints: None,
        bulk: Some(BulkConfig {
            format: "csv".to_string(),
            file_pattern: None,
            delimiter: None,
            header_lines: Some(0),
            column_mappings: std::collections::BTreeMap::from([("ID".to_string(), "externalId".to_string())]),
            filters: Some(std::collections::BTreeMap::from([("STATE".to_string(), "CA".to_string())])),
        }),
        api: None,
    };

    // Exercised at the bulk ingest level directly -- the filter/column-mapping
    // behavior this scenario cares about lives entirely in the Bulk Download
    // Handler, before the Domain Mapper's typed field requirements apply.
    let raw = civic_ingest_pipeline::ingestors::bulk::ingest(&source, source.bulk.as_ref().unwrap()).await;

    assert!(raw.success);
    assert_eq!(raw.items.len(), 2);
    let ids: Vec<&str> = raw.items.iter().map(|item| item["externalId"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["r-1", "r-3"]);
}
