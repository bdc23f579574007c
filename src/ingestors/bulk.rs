//! Downloads a CSV/TSV file -- raw or
//! inside a ZIP archive -- and parses it into a [`RawExtractionResult`] the
//! same shape the HTML extractor produces, so [`crate::domain::map`] doesn't
//! need to know which ingest path produced its input.
//!
//! Deliberately hand-rolls delimited parsing instead of pulling in the `csv`
//! crate: the source files here don't carry RFC4180 multiline quoted fields,
//! and a plain split-on-delimiter matches what upstream data providers
//! actually emit far more predictably than a strict RFC4180 parser would.

use std::collections::BTreeMap;
use std::io::Read as _;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::{BulkConfig, DataSourceConfig};
use crate::error::FetchError;
use crate::manifest::RawExtractionResult;

const BULK_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const MAX_LISTED_ENTRIES: usize = 20;

pub async fn ingest(source: &DataSourceConfig, bulk: &BulkConfig) -> RawExtractionResult {
    let mut result = RawExtractionResult::default();

    let client = match reqwest::Client::builder().timeout(BULK_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            result.errors.push(format!("failed to build http client: {e}"));
            return result;
        }
    };

    debug!(url = %source.url, "bulk download starting");
    let bytes = match client.get(&source.url).send().await {
        Ok(response) if response.status().is_success() => match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                result.errors.push(format!("failed reading bulk response body: {e}"));
                return result;
            }
        },
        Ok(response) => {
            result.errors.push(
                FetchError::Status { url: source.url.clone(), status: response.status().as_u16() }.to_string(),
            );
            return result;
        }
        Err(e) => {
            result.errors.push(FetchError::Http { url: source.url.clone(), source: Box::new(e) }.to_string());
            return result;
        }
    };

    let text = match extract_text(&bytes, bulk) {
        Ok(t) => t,
        Err(e) => {
            result.errors.push(e);
            return result;
        }
    };

    parse_rows(&text, source, bulk, &mut result);
    result.success = result.errors.is_empty();
    result
}

fn parse_rows(text: &str, source: &DataSourceConfig, bulk: &BulkConfig, result: &mut RawExtractionResult) {
    let delimiter = resolve_delimiter(bulk);
    let header_lines = bulk.header_lines.unwrap_or(0) as usize;

    let mut lines = text.lines().skip(header_lines);
    let Some(header_line) = lines.next() else {
        result.errors.push("bulk file has no header row".into());
        return;
    };
    let header: Vec<String> = parse_delimited_line(header_line, delimiter);

    let data_rows: Vec<&str> = lines.filter(|l| !l.trim().is_empty()).collect();
    info!(row_count = data_rows.len(), "bulk file parsed into rows");

    let mut warned_unknown_columns = std::collections::HashSet::new();

    for row in data_rows {
        let fields = parse_delimited_line(row, delimiter);
        let by_column: BTreeMap<&str, &str> =
            header.iter().map(String::as_str).zip(fields.iter().map(String::as_str)).collect();

        if let Some(filters) = &bulk.filters {
            let passes = filters.iter().all(|(column, expected)| {
                by_column.get(column.as_str()).map(|actual| actual.trim() == expected).unwrap_or(false)
            });
            if !passes {
                continue;
            }
        }

        let mut record = serde_json::Map::new();
        for (column, target_field) in &bulk.column_mappings {
            match by_column.get(column.as_str()) {
                Some(value) => {
                    record.insert(target_field.clone(), serde_json::Value::String(value.to_string()));
                }
                None => {
                    if warned_unknown_columns.insert(column.clone()) {
                        result.warnings.push(format!("column {column:?} not found in bulk file header"));
                    }
                }
            }
        }

        let had_source_system = source.infer_source_system().is_some();
        if let Some(source_system) = source.infer_source_system() {
            record.insert("sourceSystem".into(), serde_json::Value::String(source_system.into()));
        }

        let min_fields = if had_source_system { 2 } else { 1 };
        if record.len() < min_fields {
            result.warnings.push("row dropped: produced no mapped fields".into());
            continue;
        }

        result.items.push(record);
    }
}

fn extract_text(bytes: &[u8], bulk: &BulkConfig) -> Result<String, String> {
    if bulk.format.to_lowercase().starts_with("zip_") {
        extract_from_zip(bytes, bulk.file_pattern.as_deref())
    } else {
        String::from_utf8(bytes.to_vec()).map_err(|e| format!("bulk file is not valid UTF-8: {e}"))
    }
}

fn extract_from_zip(bytes: &[u8], file_pattern: Option<&str>) -> Result<String, String> {
    let reader = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| format!("could not open zip archive: {e}"))?;

    let mut names: Vec<String> = (0..archive.len())
        .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
        .collect();

    let chosen = match file_pattern {
        Some(pattern) => names
            .iter()
            .find(|n| n.as_str() == pattern)
            .or_else(|| names.iter().find(|n| n.ends_with(&format!("/{pattern}"))))
            .or_else(|| names.iter().find(|n| n.to_lowercase() == pattern.to_lowercase()))
            .cloned(),
        None => names.iter().find(|n| n.to_lowercase().ends_with(".csv") || n.to_lowercase().ends_with(".tsv")).cloned(),
    };

    let Some(chosen) = chosen else {
        names.truncate(MAX_LISTED_ENTRIES);
        return Err(format!(
            "no entry matching {:?} found in zip archive; available entries: {}",
            file_pattern.unwrap_or("<any csv/tsv>"),
            names.join(", ")
        ));
    };

    let mut entry = archive.by_name(&chosen).map_err(|e| format!("could not read zip entry {chosen}: {e}"))?;
    let mut out = String::new();
    entry.read_to_string(&mut out).map_err(|e| format!("zip entry {chosen} is not valid UTF-8: {e}"))?;
    Ok(out)
}

fn resolve_delimiter(bulk: &BulkConfig) -> char {
    if let Some(explicit) = &bulk.delimiter {
        return explicit.chars().next().unwrap_or(',');
    }
    let format = bulk.format.to_lowercase();
    if format == "tsv" || format == "zip_tsv" {
        '\t'
    } else {
        ','
    }
}

fn parse_delimited_line(line: &str, delimiter: char) -> Vec<String> {
    line.split(delimiter)
        .map(|field| {
            let trimmed = field.trim();
            trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')).unwrap_or(trimmed).trim().to_string()
        })
        .collect()
}
