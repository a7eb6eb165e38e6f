//! A minimal in-memory DOM.
//!
//! The scanner, selector generator, and transport all operate on this
//! tree; in a browser build the same operations map onto the real DOM.
//! Nodes live in an arena indexed by [`NodeId`]; elements carry a tag and
//! a flat attribute map (`id` and `class` are ordinary attributes).
//!
//! Node additions bump a version published on a `watch` channel so the
//! transport can debounce re-scans, mirroring a childList mutation
//! observer. Attribute and text-value changes do not notify.

use std::collections::BTreeMap;

use tokio::sync::watch;

/// Index of a node in the document arena.
pub type NodeId = usize;

/// Node payload: an element with attributes, or a text node.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Element {
        tag: String,
        attributes: BTreeMap<String, String>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

/// An in-memory document rooted at a `body` element.
pub struct Document {
    nodes: Vec<Node>,
    body: NodeId,
    version: u64,
    mutations: watch::Sender<u64>,
}

impl Document {
    /// Create a document containing only an empty `body`.
    pub fn new() -> Self {
        let (mutations, _) = watch::channel(0);
        let body = Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Element {
                tag: "body".to_string(),
                attributes: BTreeMap::new(),
            },
        };
        Self {
            nodes: vec![body],
            body: 0,
            version: 0,
            mutations,
        }
    }

    /// The root `body` element.
    pub fn body(&self) -> NodeId {
        self.body
    }

    /// Subscribe to node-addition notifications (the re-scan trigger).
    pub fn subscribe_mutations(&self) -> watch::Receiver<u64> {
        self.mutations.subscribe()
    }

    // -----------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.push_node(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push_node(NodeKind::Text(text.to_string()))
    }

    /// Append a detached node as the last child of `parent`.
    ///
    /// Publishes a mutation notification: added nodes are what trigger a
    /// debounced re-scan.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
        self.notify_mutation();
    }

    fn push_node(&mut self, kind: NodeKind) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    fn notify_mutation(&mut self) {
        self.version += 1;
        let _ = self.mutations.send(self.version);
    }

    // -----------------------------------------------------------------
    // Inspection
    // -----------------------------------------------------------------

    /// Whether the node is an element (vs. a text node).
    pub fn is_element(&self, node: NodeId) -> bool {
        matches!(self.nodes[node].kind, NodeKind::Element { .. })
    }

    /// The element's lowercase tag name, or `None` for a text node.
    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.nodes[node].kind {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes[node].parent
    }

    /// All child nodes, elements and text alike.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node].children
    }

    /// Child nodes that are elements.
    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes[node]
            .children
            .iter()
            .copied()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    /// An attribute value on an element.
    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[node].kind {
            NodeKind::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            NodeKind::Text(_) => None,
        }
    }

    /// Set an attribute on an element. No-op on text nodes.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let NodeKind::Element { attributes, .. } = &mut self.nodes[node].kind {
            attributes.insert(name.to_string(), value.to_string());
        }
    }

    /// The element's `id` attribute.
    pub fn id(&self, node: NodeId) -> Option<&str> {
        self.attribute(node, "id").filter(|s| !s.is_empty())
    }

    /// The element's class list, in declaration order.
    pub fn classes(&self, node: NodeId) -> Vec<String> {
        self.attribute(node, "class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Add a class if not already present.
    pub fn add_class(&mut self, node: NodeId, class: &str) {
        let mut classes = self.classes(node);
        if !classes.iter().any(|c| c == class) {
            classes.push(class.to_string());
            self.set_attribute(node, "class", &classes.join(" "));
        }
    }

    /// Remove a class if present.
    pub fn remove_class(&mut self, node: NodeId, class: &str) {
        let classes: Vec<String> = self
            .classes(node)
            .into_iter()
            .filter(|c| c != class)
            .collect();
        self.set_attribute(node, "class", &classes.join(" "));
    }

    /// Concatenated text of all descendant text nodes, document order.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match &self.nodes[node].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { .. } => {
                for &child in &self.nodes[node].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Whether the element has a direct child text node with non-empty
    /// (trimmed) text.
    pub fn has_direct_text(&self, node: NodeId) -> bool {
        self.nodes[node].children.iter().any(|&c| {
            matches!(&self.nodes[c].kind, NodeKind::Text(t) if !t.trim().is_empty())
        })
    }

    /// Whether the element takes its content from a `value` (form inputs).
    pub fn is_input_like(&self, node: NodeId) -> bool {
        matches!(self.tag(node), Some("input") | Some("textarea"))
    }

    /// The element's `value` attribute (empty string when unset).
    pub fn value(&self, node: NodeId) -> String {
        self.attribute(node, "value").unwrap_or_default().to_string()
    }

    /// Set the element's `value` attribute.
    pub fn set_value(&mut self, node: NodeId, value: &str) {
        self.set_attribute(node, "value", value);
    }

    /// Replace the element's children with a single text node.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        for child in std::mem::take(&mut self.nodes[node].children) {
            self.nodes[child].parent = None;
        }
        let text_node = self.create_text(text);
        self.append_child(node, text_node);
    }

    /// Whether the node sits inside (or is) a `contenteditable` region.
    pub fn in_content_editable(&self, node: NodeId) -> bool {
        let mut current = self.nodes[node].parent;
        while let Some(id) = current {
            if self.attribute(id, "contenteditable") == Some("true") {
                return true;
            }
            current = self.nodes[id].parent;
        }
        false
    }

    /// Find the first element carrying `attribute_name == value`.
    pub fn find_by_attribute(&self, name: &str, value: &str) -> Option<NodeId> {
        (0..self.nodes.len()).find(|&id| self.attribute(id, name) == Some(value))
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_concatenates_descendants() {
        let mut doc = Document::new();
        let p = doc.create_element("p");
        let strong = doc.create_element("strong");
        let t1 = doc.create_text("Hello, ");
        let t2 = doc.create_text("world");
        doc.append_child(doc.body(), p);
        doc.append_child(p, t1);
        doc.append_child(p, strong);
        doc.append_child(strong, t2);

        assert_eq!(doc.text_content(p), "Hello, world");
        assert!(doc.has_direct_text(p));
        assert!(!doc.has_direct_text(doc.body()));
    }

    #[test]
    fn append_publishes_mutation_versions() {
        let mut doc = Document::new();
        let mut rx = doc.subscribe_mutations();
        assert_eq!(*rx.borrow_and_update(), 0);

        let p = doc.create_element("p");
        doc.append_child(doc.body(), p);
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);

        // Attribute writes are not mutations.
        doc.set_attribute(p, "class", "intro");
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn set_text_replaces_children() {
        let mut doc = Document::new();
        let h1 = doc.create_element("h1");
        let t = doc.create_text("Old");
        doc.append_child(doc.body(), h1);
        doc.append_child(h1, t);

        doc.set_text(h1, "New");
        assert_eq!(doc.text_content(h1), "New");
        assert_eq!(doc.children(h1).len(), 1);
    }

    #[test]
    fn content_editable_applies_to_descendants_only() {
        let mut doc = Document::new();
        let editor = doc.create_element("div");
        doc.set_attribute(editor, "contenteditable", "true");
        let p = doc.create_element("p");
        doc.append_child(doc.body(), editor);
        doc.append_child(editor, p);

        assert!(doc.in_content_editable(p));
        assert!(!doc.in_content_editable(editor));
    }
}
