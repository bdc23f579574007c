//! A thin policy wrapper around the validator. Fires at most once per
//! pipeline invocation.

use crate::manifest::{RawExtractionResult, StructuralManifest};
use crate::validate::{self, ValidationReport};

#[derive(Debug, Clone)]
pub struct HealingDecision {
    pub should_heal: bool,
    pub reason: Option<String>,
    pub validation: ValidationReport,
}

/// `second_attempt` must be `true` on the re-evaluation after a heal, which
/// forces `should_heal = false` regardless of the validation outcome --
/// there is deliberately no third attempt.
pub fn evaluate(
    raw: &RawExtractionResult,
    manifest: &StructuralManifest,
    previous_item_count: Option<usize>,
    second_attempt: bool,
) -> HealingDecision {
    let validation = validate::validate(raw, manifest, previous_item_count);
    let should_heal = !validation.valid && !second_attempt;
    let reason = if !validation.valid {
        validation.most_severe_message().map(str::to_string)
    } else {
        None
    };
    HealingDecision { should_heal, reason, validation }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{AnalysisDiagnostics, DataType, ExtractionRules};

    fn manifest() -> StructuralManifest {
        StructuralManifest::fresh(
            "mn",
            "https://example.com",
            DataType::Propositions,
            "h".into(),
            "p".into(),
            ExtractionRules {
                container_selector: ".c".into(),
                item_selector: ".i".into(),
                field_mappings: vec![],
                preprocessing: None,
                pagination: None,
            },
            AnalysisDiagnostics::default(),
        )
    }

    #[test]
    fn heals_on_first_failed_attempt() {
        let raw = RawExtractionResult { items: vec![], success: true, warnings: vec![], errors: vec![] };
        let decision = evaluate(&raw, &manifest(), None, false);
        assert!(decision.should_heal);
        assert!(decision.reason.is_some());
    }

    #[test]
    fn never_heals_twice() {
        let raw = RawExtractionResult { items: vec![], success: true, warnings: vec![], errors: vec![] };
        let decision = evaluate(&raw, &manifest(), None, true);
        assert!(!decision.should_heal);
    }

    #[test]
    fn does_not_heal_when_valid() {
        let raw = RawExtractionResult {
            items: vec![serde_json::Map::new()],
            success: true,
            warnings: vec![],
            errors: vec![],
        };
        let decision = evaluate(&raw, &manifest(), None, false);
        assert!(!decision.should_heal);
    }
}
