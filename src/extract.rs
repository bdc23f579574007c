//! Deterministic application of a cached
//! [`StructuralManifest`] to raw HTML. Never panics and never returns
//! `Result::Err` -- every failure mode is recorded in
//! [`RawExtractionResult`] as a warning or error string.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::manifest::{ExtractionMethod, ExtractionRules, PreprocessingStep, RawExtractionResult, StructuralManifest};
use crate::transform;

/// Apply `manifest.extraction_rules` to `html`. `base_url` is forwarded to
/// the `url_resolve` field transform.
pub fn extract(html: &str, manifest: &StructuralManifest, base_url: Option<&str>) -> RawExtractionResult {
    let rules = &manifest.extraction_rules;
    let mut warnings = Vec::new();
    let mut errors = Vec::new();

    let preprocessed = preprocess(html, rules.preprocessing.as_deref());
    let document = Html::parse_document(&preprocessed);

    let Some(container_selector) = parse_selector(&rules.container_selector) else {
        errors.push(format!("invalid container selector: {}", rules.container_selector));
        return RawExtractionResult { items: Vec::new(), success: false, warnings, errors };
    };
    let containers: Vec<ElementRef> = document.select(&container_selector).collect();
    if containers.is_empty() {
        errors.push("no container matched containerSelector".to_string());
        return RawExtractionResult { items: Vec::new(), success: false, warnings, errors };
    }
    if containers.len() > 1 {
        warnings.push(format!(
            "containerSelector matched {} elements, using the first",
            containers.len()
        ));
    }
    let container = containers[0];

    let Some(item_selector) = parse_selector(&rules.item_selector) else {
        errors.push(format!("invalid item selector: {}", rules.item_selector));
        return RawExtractionResult { items: Vec::new(), success: false, warnings, errors };
    };
    let item_elements: Vec<ElementRef> = container.select(&item_selector).collect();
    if item_elements.is_empty() {
        errors.push("no items matched itemSelector".to_string());
        return RawExtractionResult { items: Vec::new(), success: false, warnings, errors };
    }

    let mut items = Vec::new();
    for item in item_elements {
        let mut record = serde_json::Map::new();
        let mut any_required_present = false;
        let mut all_required_present = true;
        let has_required = rules.field_mappings.iter().any(|f| f.required);

        for field in &rules.field_mappings {
            let mut value = extract_field_value(item, field);
            if let Some(v) = &value {
                if v.trim().is_empty() {
                    value = None;
                }
            }
            let mut value = value.map(|v| match &field.transform {
                Some(t) => transform::apply(t, &v, base_url),
                None => v,
            });
            if value.as_deref().map(str::is_empty).unwrap_or(true) {
                if let Some(default) = &field.default_value {
                    value = Some(default.clone());
                }
            }

            match &value {
                Some(v) => {
                    record.insert(field.field_name.clone(), Value::String(v.clone()));
                    if field.required {
                        any_required_present = true;
                    }
                }
                None => {
                    if field.required {
                        all_required_present = false;
                        warnings.push(format!("required field '{}' missing", field.field_name));
                    }
                }
            }
        }

        // step 6: skip items where ALL required fields are missing, keep
        // items where at least one required field is present (or there were
        // no required fields to begin with).
        if !has_required || any_required_present || all_required_present {
            items.push(record);
        }
    }

    RawExtractionResult { items, success: true, warnings, errors }
}

fn parse_selector(selector: &str) -> Option<Selector> {
    Selector::parse(selector).ok()
}

fn extract_field_value(item: ElementRef, field: &crate::manifest::FieldMapping) -> Option<String> {
    let selector = parse_selector(&field.selector)?;
    let matched = item.select(&selector).next()?;

    match field.extraction_method {
        ExtractionMethod::Text => Some(matched.text().collect::<String>().trim().to_string()),
        ExtractionMethod::Attribute => field
            .attribute
            .as_deref()
            .and_then(|name| matched.value().attr(name))
            .map(str::to_string),
        ExtractionMethod::Html => Some(matched.inner_html()),
        ExtractionMethod::Regex => {
            let text = matched.text().collect::<String>();
            let pattern = field.regex_pattern.as_deref()?;
            let re = Regex::new(pattern).ok()?;
            let group = field.regex_group.unwrap_or(1) as usize;
            re.captures(&text)
                .and_then(|caps| caps.get(group))
                .map(|m| m.as_str().to_string())
        }
    }
}

/// Apply document-shaping steps in order. Since `scraper`'s DOM is immutable,
/// removal/unwrap/merge operate on the raw HTML string (select, take the
/// matched element's outer HTML, splice it out or replace it) and the result
/// is re-parsed by the caller.
fn preprocess(html: &str, steps: Option<&[PreprocessingStep]>) -> String {
    let Some(steps) = steps else {
        return html.to_string();
    };

    let mut current = html.to_string();
    for step in steps {
        current = match step {
            PreprocessingStep::RemoveElements { selector } => remove_elements(&current, selector),
            PreprocessingStep::UnwrapElements { selector } => unwrap_elements(&current, selector),
            PreprocessingStep::MergeTables { selector } => merge_tables(&current, selector),
        };
    }
    current
}

fn remove_elements(html: &str, selector: &str) -> String {
    let Some(sel) = parse_selector(selector) else {
        return html.to_string();
    };
    let document = Html::parse_document(html);
    let mut result = html.to_string();
    for el in document.select(&sel) {
        let outer = el.html();
        result = result.replace(&outer, "");
    }
    result
}

fn unwrap_elements(html: &str, selector: &str) -> String {
    let Some(sel) = parse_selector(selector) else {
        return html.to_string();
    };
    let document = Html::parse_document(html);
    let mut result = html.to_string();
    for el in document.select(&sel) {
        let outer = el.html();
        let inner = el.inner_html();
        result = result.replacen(&outer, &inner, 1);
    }
    result
}

/// If more than one element matches `selector`, append the `<tr>` rows of
/// tables 2..N into the first, then drop 2..N entirely.
fn merge_tables(html: &str, selector: &str) -> String {
    let Some(sel) = parse_selector(selector) else {
        return html.to_string();
    };
    let document = Html::parse_document(html);
    let tables: Vec<ElementRef> = document.select(&sel).collect();
    if tables.len() < 2 {
        return html.to_string();
    }

    let row_selector = Selector::parse("tr").unwrap();
    let mut extra_rows = String::new();
    for table in &tables[1..] {
        for row in table.select(&row_selector) {
            extra_rows.push_str(&row.html());
        }
    }

    let first_outer = tables[0].html();
    let merged = if let Some(idx) = first_outer.rfind("</table>") {
        let mut m = first_outer[..idx].to_string();
        m.push_str(&extra_rows);
        m.push_str(&first_outer[idx..]);
        m
    } else {
        first_outer.clone()
    };

    let mut result = html.replacen(&first_outer, &merged, 1);
    for table in &tables[1..] {
        result = result.replace(&table.html(), "");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{AnalysisDiagnostics, DataType, ExtractionRules, FieldMapping};

    fn manifest(rules: ExtractionRules) -> StructuralManifest {
        StructuralManifest::fresh(
            "mn",
            "https://example.com",
            DataType::Propositions,
            "hash".into(),
            "prompt".into(),
            rules,
            AnalysisDiagnostics::default(),
        )
    }

    fn field(name: &str, selector: &str, required: bool) -> FieldMapping {
        FieldMapping {
            field_name: name.into(),
            selector: selector.into(),
            extraction_method: ExtractionMethod::Text,
            attribute: None,
            regex_pattern: None,
            regex_group: None,
            required,
            transform: None,
            default_value: None,
        }
    }

    #[test]
    fn happy_path_extracts_two_items() {
        let html = r#"<html><body><ul class="list">
            <li class="item"><span class="title">prop-001</span></li>
            <li class="item"><span class="title">prop-002</span></li>
        </ul></body></html>"#;
        let m = manifest(ExtractionRules {
            container_selector: ".list".into(),
            item_selector: ".item".into(),
            field_mappings: vec![field("title", ".title", true)],
            preprocessing: None,
            pagination: None,
        });
        let result = extract(html, &m, None);
        assert!(result.success);
        assert_eq!(result.items.len(), 2);
        assert_eq!(result.items[0]["title"], Value::String("prop-001".into()));
    }

    #[test]
    fn missing_container_is_an_error_not_a_panic() {
        let html = "<html><body></body></html>";
        let m = manifest(ExtractionRules {
            container_selector: ".nope".into(),
            item_selector: ".item".into(),
            field_mappings: vec![],
            preprocessing: None,
            pagination: None,
        });
        let result = extract(html, &m, None);
        assert!(!result.success);
        assert!(!result.errors.is_empty());
    }

    #[test]
    fn item_survives_when_one_required_field_present() {
        let html = r#"<html><body><div class="list">
            <div class="item"><span class="title">t</span></div>
        </div></body></html>"#;
        let m = manifest(ExtractionRules {
            container_selector: ".list".into(),
            item_selector: ".item".into(),
            field_mappings: vec![field("title", ".title", true), field("subtitle", ".subtitle", true)],
            preprocessing: None,
            pagination: None,
        });
        let result = extract(html, &m, None);
        assert_eq!(result.items.len(), 1);
        assert!(result.warnings.iter().any(|w| w.contains("subtitle")));
    }

    #[test]
    fn item_dropped_when_all_required_fields_missing() {
        let html = r#"<html><body><div class="list">
            <div class="item"><span class="other">x</span></div>
        </div></body></html>"#;
        let m = manifest(ExtractionRules {
            container_selector: ".list".into(),
            item_selector: ".item".into(),
            field_mappings: vec![field("title", ".title", true)],
            preprocessing: None,
            pagination: None,
        });
        let result = extract(html, &m, None);
        assert_eq!(result.items.len(), 0);
    }

    #[test]
    fn remove_elements_strips_matching_nodes() {
        let html = r#"<html><body><div class="list"><nav>skip</nav><div class="item"><span class="title">t</span></div></div></body></html>"#;
        let m = manifest(ExtractionRules {
            container_selector: ".list".into(),
            item_selector: ".item".into(),
            field_mappings: vec![field("title", ".title", true)],
            preprocessing: Some(vec![PreprocessingStep::RemoveElements { selector: "nav".into() }]),
            pagination: None,
        });
        let result = extract(html, &m, None);
        assert_eq!(result.items.len(), 1);
    }
}
