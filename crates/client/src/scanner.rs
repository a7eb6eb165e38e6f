//! Content discovery: walk the page, assign stable identities, extract
//! text.
//!
//! The scanner only builds the map; diffing against the previously sent
//! map (to decide what changed) is the transport's job.

use std::collections::BTreeMap;

use crate::dom::{Document, NodeId};
use crate::selector::generate_selector;
use crate::{ID_ATTR, IGNORE_ATTR, OPT_IN_ATTR};

/// Tags scanned by default. Anything else needs the explicit opt-in
/// attribute.
const CANDIDATE_TAGS: &[&str] = &[
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "a", "li", "td", "th", "button", "label",
    "blockquote", "figcaption", "input", "textarea",
];

/// Tags whose entire subtree is skipped.
const SKIP_TAGS: &[&str] = &["script", "style", "noscript", "iframe", "object", "embed", "template"];

/// Strings that trim below this length are icons/whitespace, not content.
const MIN_CONTENT_LENGTH: usize = 2;

/// One discovered element.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedElement {
    /// Stable CSS path, recomputed on every scan.
    pub selector: String,
    /// Extracted text (value for form inputs, text content otherwise).
    pub content: String,
    /// Tag/kind hint for the dashboard.
    pub element_type: String,
}

/// Scan the document and return the content map keyed by element id.
///
/// Identity is sticky: an element keeps the id written onto it by a
/// previous scan; only unmarked elements get a fresh one minted (and
/// written back, so the next scan recognizes them).
pub fn scan(doc: &mut Document) -> BTreeMap<String, ScannedElement> {
    let mut map = BTreeMap::new();
    walk(doc, doc.body(), &mut map);
    map
}

fn walk(doc: &mut Document, node: NodeId, map: &mut BTreeMap<String, ScannedElement>) {
    let Some(tag) = doc.tag(node).map(str::to_string) else {
        return;
    };

    if SKIP_TAGS.contains(&tag.as_str()) {
        return;
    }
    if doc.attribute(node, IGNORE_ATTR).is_some() {
        return;
    }

    if node != doc.body() && is_editable_candidate(doc, node, &tag) {
        let content = extract_content(doc, node);
        if content.trim().len() >= MIN_CONTENT_LENGTH {
            let element_id = ensure_identity(doc, node);
            let selector = generate_selector(doc, node);
            map.insert(
                element_id,
                ScannedElement {
                    selector,
                    content,
                    element_type: tag.clone(),
                },
            );
        }
    }

    for child in doc.children(node).to_vec() {
        walk(doc, child, map);
    }
}

fn is_editable_candidate(doc: &Document, node: NodeId, tag: &str) -> bool {
    let opted_in = doc.attribute(node, OPT_IN_ATTR).is_some();

    if !CANDIDATE_TAGS.contains(&tag) && !opted_in {
        return false;
    }

    // Rich-text editors own their subtree; scanning inside them would
    // fight the editor over the same text.
    if doc.in_content_editable(node) {
        return false;
    }

    // Pure containers (element children, no direct text) are only
    // scanned when explicitly opted in.
    if !doc.is_input_like(node)
        && !doc.has_direct_text(node)
        && !doc.element_children(node).is_empty()
        && !opted_in
    {
        return false;
    }

    true
}

fn extract_content(doc: &Document, node: NodeId) -> String {
    if doc.is_input_like(node) {
        doc.value(node)
    } else {
        doc.text_content(node)
    }
}

/// Reuse the marker attribute if present, otherwise mint a new id and
/// write it back onto the element.
fn ensure_identity(doc: &mut Document, node: NodeId) -> String {
    if let Some(existing) = doc.attribute(node, ID_ATTR) {
        if !existing.is_empty() {
            return existing.to_string();
        }
    }
    let minted = format!("lt-{}", &uuid::Uuid::new_v4().simple().to_string()[..12]);
    doc.set_attribute(node, ID_ATTR, &minted);
    minted
}
