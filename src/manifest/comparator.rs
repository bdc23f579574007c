//! Pure decision of whether a cached manifest can be reused for the
//! current page.

use super::StructuralManifest;

/// Why a cached manifest can or cannot be reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReuseReason {
    NoManifest,
    StructureChanged,
    PromptChanged,
    BothChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComparisonResult {
    pub can_reuse: bool,
    pub reason: Option<ReuseReason>,
    pub structure_changed: bool,
    pub prompt_changed: bool,
}

/// Compare an (optional) existing manifest's cache keys against the page's
/// current structure hash and the analyzer's current prompt hash.
pub fn compare(
    existing: Option<&StructuralManifest>,
    current_structure_hash: &str,
    current_prompt_hash: &str,
) -> ComparisonResult {
    let Some(existing) = existing else {
        return ComparisonResult {
            can_reuse: false,
            reason: Some(ReuseReason::NoManifest),
            structure_changed: false,
            prompt_changed: false,
        };
    };

    let structure_changed = existing.structure_hash != current_structure_hash;
    let prompt_changed = existing.prompt_hash != current_prompt_hash;

    let reason = match (structure_changed, prompt_changed) {
        (false, false) => None,
        (true, false) => Some(ReuseReason::StructureChanged),
        (false, true) => Some(ReuseReason::PromptChanged),
        (true, true) => Some(ReuseReason::BothChanged),
    };

    ComparisonResult {
        can_reuse: !structure_changed && !prompt_changed,
        reason,
        structure_changed,
        prompt_changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{AnalysisDiagnostics, DataType, ExtractionRules, FieldMapping, StructuralManifest};

    fn manifest(structure_hash: &str, prompt_hash: &str) -> StructuralManifest {
        StructuralManifest::fresh(
            "mn",
            "https://example.com/props",
            DataType::Propositions,
            structure_hash.to_string(),
            prompt_hash.to_string(),
            ExtractionRules {
                container_selector: ".list".into(),
                item_selector: ".item".into(),
                field_mappings: vec![FieldMapping {
                    field_name: "title".into(),
                    selector: ".title".into(),
                    extraction_method: crate::manifest::ExtractionMethod::Text,
                    attribute: None,
                    regex_pattern: None,
                    regex_group: None,
                    required: true,
                    transform: None,
                    default_value: None,
                }],
                preprocessing: None,
                pagination: None,
            },
            AnalysisDiagnostics::default(),
        )
    }

    #[test]
    fn no_manifest_cannot_reuse() {
        let result = compare(None, "a", "b");
        assert!(!result.can_reuse);
        assert_eq!(result.reason, Some(ReuseReason::NoManifest));
    }

    #[test]
    fn identical_hashes_can_reuse() {
        let m = manifest("struct-a", "prompt-a");
        let result = compare(Some(&m), "struct-a", "prompt-a");
        assert!(result.can_reuse);
        assert_eq!(result.reason, None);
    }

    #[test]
    fn structure_change_forces_rederive() {
        let m = manifest("struct-a", "prompt-a");
        let result = compare(Some(&m), "struct-b", "prompt-a");
        assert!(!result.can_reuse);
        assert_eq!(result.reason, Some(ReuseReason::StructureChanged));
        assert!(result.structure_changed);
        assert!(!result.prompt_changed);
    }

    #[test]
    fn prompt_change_forces_rederive() {
        let m = manifest("struct-a", "prompt-a");
        let result = compare(Some(&m), "struct-a", "prompt-b");
        assert_eq!(result.reason, Some(ReuseReason::PromptChanged));
    }

    #[test]
    fn both_changed() {
        let m = manifest("struct-a", "prompt-a");
        let result = compare(Some(&m), "struct-b", "prompt-b");
        assert_eq!(result.reason, Some(ReuseReason::BothChanged));
    }

    #[test]
    fn compare_with_self_always_reuses() {
        let m = manifest("struct-a", "prompt-a");
        let result = compare(Some(&m), &m.structure_hash, &m.prompt_hash);
        assert!(result.can_reuse);
    }
}
