//! Stable CSS selector generation.
//!
//! Deterministic by construction: the same DOM subtree always yields a
//! byte-identical selector, which re-scan diffing relies on.

use crate::dom::{Document, NodeId};
use crate::RESERVED_CLASS_PREFIX;

/// Build a CSS path for an element, walking ancestors up to (but not
/// including) `body`.
///
/// Per ancestor: an `#id` wins and stops the walk (ids are assumed unique
/// and sufficient); otherwise `tag.class1.class2` (library-reserved
/// classes excluded) with a 1-based `:nth-child(n)` disambiguator when
/// the element has element siblings of the same tag. Segments join with
/// `" > "`.
pub fn generate_selector(doc: &Document, element: NodeId) -> String {
    let mut segments: Vec<String> = Vec::new();
    let mut current = Some(element);

    while let Some(node) = current {
        if node == doc.body() {
            break;
        }

        if let Some(id) = doc.id(node) {
            segments.push(format!("#{id}"));
            break;
        }

        segments.push(segment_for(doc, node));
        current = doc.parent(node);
    }

    segments.reverse();
    segments.join(" > ")
}

fn segment_for(doc: &Document, node: NodeId) -> String {
    let tag = doc.tag(node).unwrap_or_default();
    let mut segment = tag.to_string();

    for class in doc.classes(node) {
        if !class.starts_with(RESERVED_CLASS_PREFIX) {
            segment.push('.');
            segment.push_str(&class);
        }
    }

    if let Some(parent) = doc.parent(node) {
        let siblings = doc.element_children(parent);
        let same_tag = siblings
            .iter()
            .filter(|&&s| doc.tag(s) == Some(tag))
            .count();
        if same_tag > 1 {
            // nth-child counts element siblings of any tag, 1-based.
            let position = siblings.iter().position(|&s| s == node).unwrap_or(0) + 1;
            segment.push_str(&format!(":nth-child({position})"));
        }
    }

    segment
}
