//! A deterministic hash of an HTML document's
//! tag/attribute skeleton, ignoring text content, scripting/style noise, and
//! comments. Two pages with the same layout but different copy hash
//! identically; a layout change changes the hash.

use ego_tree::NodeRef;
use scraper::{Html, Node};
use sha2::{Digest, Sha256};

const DROPPED_TAGS: &[&str] = &["script", "style", "noscript", "svg", "iframe", "link", "meta"];
const KEPT_ATTRS: &[&str] = &["class", "id", "role"];

/// Compute the 64-character lowercase hex SHA-256 of an HTML document's
/// skeleton. Pure. Never fails: a body-less or empty document hashes the
/// empty skeleton, which callers treat as a "nothing to extract here" signal
/// rather than an error.
pub fn compute_structure_hash(html: &str) -> String {
    let document = Html::parse_document(html);
    let skeleton = match document.tree.root().descendants().find(|n| {
        matches!(n.value(), Node::Element(el) if el.name() == "body")
    }) {
        Some(body) => emit_element(body),
        None => String::new(),
    };

    let mut hasher = Sha256::new();
    hasher.update(skeleton.as_bytes());
    hex::encode(hasher.finalize())
}

fn emit_element(node: NodeRef<'_, Node>) -> String {
    let Node::Element(el) = node.value() else {
        return String::new();
    };
    let tag = el.name();
    if DROPPED_TAGS.contains(&tag) {
        return String::new();
    }

    let mut attrs = String::new();
    for name in KEPT_ATTRS {
        if let Some(value) = el.attr(name) {
            attrs.push(' ');
            attrs.push_str(name);
            attrs.push_str("=\"");
            attrs.push_str(value);
            attrs.push('"');
        }
    }

    let mut children = String::new();
    for child in node.children() {
        match child.value() {
            Node::Element(_) => children.push_str(&emit_element(child)),
            Node::Comment(_) => {}
            _ => {}
        }
    }

    format!("<{tag}{attrs}>{children}</{tag}>")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_layout_different_text_same_hash() {
        let a = "<html><body><div class=\"item\">Alice</div></body></html>";
        let b = "<html><body><div class=\"item\">Bob</div></body></html>";
        assert_eq!(compute_structure_hash(a), compute_structure_hash(b));
    }

    #[test]
    fn different_layout_different_hash() {
        let a = "<html><body><div class=\"item\"></div></body></html>";
        let b = "<html><body><span class=\"item\"></span></body></html>";
        assert_ne!(compute_structure_hash(a), compute_structure_hash(b));
    }

    #[test]
    fn hash_is_64_char_lowercase_hex() {
        let h = compute_structure_hash("<html><body></body></html>");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn empty_and_bodyless_input_do_not_panic() {
        let empty = compute_structure_hash("");
        let no_body = compute_structure_hash("<html><head></head></html>");
        // both are the "skip" signal, not an error -- but they needn't be
        // equal to each other if the parser synthesizes an implicit <body>.
        assert_eq!(empty.len(), 64);
        assert_eq!(no_body.len(), 64);
    }

    #[test]
    fn scripts_styles_and_comments_are_ignored() {
        let a = "<html><body><div class=\"x\"></div></body></html>";
        let b = "<html><body><script>evil()</script><!-- hi --><div class=\"x\"></div><style>.x{}</style></body></html>";
        assert_eq!(compute_structure_hash(a), compute_structure_hash(b));
    }

    #[test]
    fn class_id_role_attrs_are_kept_other_attrs_are_not() {
        let a = "<html><body><div class=\"x\" data-foo=\"bar\"></div></body></html>";
        let b = "<html><body><div class=\"x\" data-foo=\"other\"></div></body></html>";
        assert_eq!(compute_structure_hash(a), compute_structure_hash(b));

        let c = "<html><body><div class=\"x\"></div></body></html>";
        let d = "<html><body><div class=\"y\"></div></body></html>";
        assert_ne!(compute_structure_hash(c), compute_structure_hash(d));
    }
}
