//! Scores a [`RawExtractionResult`] against
//! the manifest that produced it. Pure, never panics. Depends only on
//! `items`/`success`/`warnings` and the manifest's required field names --
//! never on selector strings -- so validator behavior is stable across
//! manifest versions that only change selectors.

use crate::manifest::StructuralManifest;
use crate::manifest::RawExtractionResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub issues: Vec<Issue>,
    pub valid: bool,
}

impl ValidationReport {
    /// The message of the most severe issue (errors first), if any.
    pub fn most_severe_message(&self) -> Option<&str> {
        self.issues
            .iter()
            .find(|i| i.severity == Severity::Error)
            .or_else(|| self.issues.first())
            .map(|i| i.message.as_str())
    }
}

/// Evaluate `raw` against `manifest`'s required field mappings. `previous_item_count`,
/// if supplied, enables the count-drop checks.
pub fn validate(
    raw: &RawExtractionResult,
    manifest: &StructuralManifest,
    previous_item_count: Option<usize>,
) -> ValidationReport {
    let mut issues = Vec::new();

    if !raw.success {
        issues.push(Issue { severity: Severity::Error, message: "extraction failed".into() });
    }

    if raw.items.is_empty() {
        issues.push(Issue { severity: Severity::Error, message: "zero items extracted".into() });
    }

    let total = raw.items.len();
    if total > 0 {
        for field in manifest.extraction_rules.field_mappings.iter().filter(|f| f.required) {
            let missing = raw
                .items
                .iter()
                .filter(|item| !item.contains_key(&field.field_name))
                .count();
            let fraction = missing as f64 / total as f64;
            if fraction > 0.5 {
                issues.push(Issue {
                    severity: Severity::Error,
                    message: format!("required field '{}' missing from {:.0}% of items", field.field_name, fraction * 100.0),
                });
            } else if (0.1..=0.5).contains(&fraction) {
                issues.push(Issue {
                    severity: Severity::Warning,
                    message: format!("required field '{}' missing from {:.0}% of items", field.field_name, fraction * 100.0),
                });
            }
        }
    }

    if let Some(previous) = previous_item_count {
        if previous > 0 {
            let ratio = total as f64 / previous as f64;
            if ratio < 0.25 {
                issues.push(Issue { severity: Severity::Error, message: "item count dropped dramatically".into() });
            } else if ratio < 0.75 {
                issues.push(Issue { severity: Severity::Warning, message: "item count decreased".into() });
            }
        }
    }

    if raw.warnings.len() >= 10 {
        issues.push(Issue { severity: Severity::Warning, message: "high warning count".into() });
    }

    let valid = !issues.iter().any(|i| i.severity == Severity::Error);
    ValidationReport { issues, valid }
}
