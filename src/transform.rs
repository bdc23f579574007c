//! Pure, per-value normalization dispatched on `FieldTransform::type`.
//! Never panics; unparseable input is returned unchanged rather than
//! dropped or erroring out.

use regex::Regex;

use crate::manifest::FieldTransform;

/// Apply a field transform to a raw extracted value. `base_url` is used by
/// `url_resolve` only.
pub fn apply(transform: &FieldTransform, value: &str, base_url: Option<&str>) -> String {
    match transform {
        FieldTransform::Trim => value.trim().to_string(),
        FieldTransform::Lowercase => value.to_lowercase(),
        FieldTransform::Uppercase => value.to_uppercase(),
        FieldTransform::StripHtml => strip_html(value),
        FieldTransform::UrlResolve => url_resolve(value, base_url),
        FieldTransform::RegexReplace {
            pattern,
            replacement,
            flags,
        } => regex_replace(value, pattern, replacement.as_deref().unwrap_or(""), flags.as_deref()),
        FieldTransform::NameFormat => name_format(value),
        FieldTransform::DateParse => date_parse(value),
    }
}

/// Remove everything between `<` and `>` via a linear scan -- no regex, to
/// avoid catastrophic backtracking on pathological markup.
fn strip_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut in_tag = false;
    for c in value.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Resolve a relative URL against `base_url`. Absolute http(s) URLs pass
/// through unchanged. Any resolution failure (missing base, unparseable
/// base/relative combination) falls back to the original value unchanged --
/// this deliberately differs from the API handler's page-URL builder, which
/// propagates such errors instead -- a bad field value shouldn't sink an
/// otherwise-good record, but a bad page URL sinks the whole fetch anyway.
fn url_resolve(value: &str, base_url: Option<&str>) -> String {
    if value.starts_with("http://") || value.starts_with("https://") {
        return value.to_string();
    }
    let Some(base) = base_url else {
        return value.to_string();
    };
    match url::Url::parse(base).and_then(|b| b.join(value)) {
        Ok(resolved) => resolved.to_string(),
        Err(_) => value.to_string(),
    }
}

/// `flags` supports only `"i"` (case-insensitive); anything else is ignored.
/// A pattern that fails to compile leaves the value unchanged.
fn regex_replace(value: &str, pattern: &str, replacement: &str, flags: Option<&str>) -> String {
    let case_insensitive = flags.map(|f| f.contains('i')).unwrap_or(false);
    let built = if case_insensitive {
        format!("(?i){pattern}")
    } else {
        pattern.to_string()
    };
    match Regex::new(&built) {
        Ok(re) => re.replace_all(value, replacement).into_owned(),
        Err(_) => value.to_string(),
    }
}

/// "Last, First" -> "First Last"; anything else has its whitespace
/// normalized to single spaces.
fn name_format(value: &str) -> String {
    let trimmed = value.trim();
    if let Some((last, first)) = trimmed.split_once(',') {
        let last = last.trim();
        let first = first.trim();
        if !last.is_empty() && !first.is_empty() {
            return format!("{first} {last}");
        }
    }
    trimmed.split_whitespace().collect::<Vec<_>>().join(" ")
}

const MONTHS: &[&str] = &[
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Try, in order: long-form "MonthName [D]D[,] YYYY", "M/D/YY(YY)",
/// "YYYY-MM-DD", then a native RFC3339 parse. On total failure, the trimmed
/// input is returned unchanged (never an error).
fn date_parse(value: &str) -> String {
    let trimmed = value.trim();

    if let Some(iso) = parse_long_form(trimmed) {
        return iso;
    }
    if let Some(iso) = parse_slash_date(trimmed) {
        return iso;
    }
    if let Some(iso) = parse_iso_date(trimmed) {
        return iso;
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(trimmed) {
        return dt.with_timezone(&chrono::Utc).to_rfc3339();
    }

    trimmed.to_string()
}

fn to_midnight_utc_iso(year: i32, month: u32, day: u32) -> Option<String> {
    use chrono::{NaiveDate, TimeZone, Utc};
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let dt = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    Some(dt.to_rfc3339())
}

fn parse_long_form(value: &str) -> Option<String> {
    let cleaned = value.replace(',', " ");
    let parts: Vec<&str> = cleaned.split_whitespace().collect();
    if parts.len() != 3 {
        return None;
    }
    let month_idx = MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(parts[0]))?;
    let day: u32 = parts[1].parse().ok()?;
    let year: i32 = parts[2].parse().ok()?;
    to_midnight_utc_iso(year, (month_idx + 1) as u32, day)
}

fn parse_slash_date(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let month: u32 = parts[0].parse().ok()?;
    let day: u32 = parts[1].parse().ok()?;
    let mut year: i32 = parts[2].parse().ok()?;
    if year < 100 {
        year += 2000;
    }
    to_midnight_utc_iso(year, month, day)
}

fn parse_iso_date(value: &str) -> Option<String> {
    let parts: Vec<&str> = value.split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    let year: i32 = parts[0].parse().ok()?;
    let month: u32 = parts[1].parse().ok()?;
    let day: u32 = parts[2].parse().ok()?;
    to_midnight_utc_iso(year, month, day)
}
