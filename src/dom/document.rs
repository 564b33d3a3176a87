// ============================================================================
// spark-bind - In-memory Document
// ============================================================================

use indexmap::IndexMap;

use super::markup::{self, MarkupError, MarkupNode};
use super::{DomId, EventKind, UiTree};

#[derive(Debug, Clone, Default)]
struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    styles: IndexMap<String, String>,
    value: String,
    checked: bool,
    listeners: Vec<EventKind>,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct DomNode {
    kind: NodeKind,
    parent: Option<DomId>,
    children: Vec<DomId>,
}

/// Arena-backed UI tree. Detached nodes stay allocated so they can be
/// reinserted (conditional presence relies on this). Nothing is ever freed,
/// so discarded list clones keep their slots for the life of the document.
///
/// ```
/// use spark_bind::dom::{Document, UiTree};
///
/// let doc = Document::from_markup(r#"<p id="greet">hi</p>"#).unwrap();
/// let p = doc.query_id("greet").unwrap();
/// assert_eq!(doc.text_content(p), "hi");
/// assert_eq!(doc.tag(p).as_deref(), Some("p"));
/// ```
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<DomNode>,
    body: DomId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            body: DomId(0),
        };
        doc.body = doc.create_element("body");
        doc
    }

    /// Parse `markup` as the content of the document body.
    pub fn from_markup(markup: &str) -> Result<Self, MarkupError> {
        let mut doc = Self::new();
        let body = doc.body;
        doc.set_inner_markup(body, markup)?;
        Ok(doc)
    }

    pub fn body(&self) -> DomId {
        self.body
    }

    /// Attached element with the given `id` attribute.
    pub fn query_id(&self, id: &str) -> Option<DomId> {
        self.descendants(self.body)
            .into_iter()
            .find(|&node| self.attribute(node, "id").as_deref() == Some(id))
    }

    /// Attached elements with the given tag, in document order.
    pub fn query_tag(&self, tag: &str) -> Vec<DomId> {
        self.descendants(self.body)
            .into_iter()
            .filter(|&node| self.tag(node).as_deref() == Some(tag))
            .collect()
    }

    /// Concatenated text below `node`.
    pub fn text_content(&self, node: DomId) -> String {
        self.text_nodes(node)
            .into_iter()
            .map(|t| self.text(t))
            .collect()
    }

    pub fn outer_markup(&self, node: DomId) -> String {
        markup::serialize(&[self.to_markup(node)])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn alloc(&mut self, kind: NodeKind) -> DomId {
        let id = DomId(self.nodes.len());
        self.nodes.push(DomNode {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    fn element(&self, el: DomId) -> Option<&ElementData> {
        match &self.nodes.get(el.0)?.kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    fn element_mut(&mut self, el: DomId) -> Option<&mut ElementData> {
        match &mut self.nodes.get_mut(el.0)?.kind {
            NodeKind::Element(data) => Some(data),
            NodeKind::Text(_) => None,
        }
    }

    fn build(&mut self, node: MarkupNode, parent: DomId) {
        let id = match node {
            MarkupNode::Text(text) => self.alloc(NodeKind::Text(text)),
            MarkupNode::Element { tag, attrs, children } => {
                let value = attrs
                    .iter()
                    .find(|(n, _)| n == "value")
                    .map(|(_, v)| v.clone())
                    .unwrap_or_default();
                let checked = attrs.iter().any(|(n, _)| n == "checked");
                let id = self.alloc(NodeKind::Element(ElementData {
                    tag,
                    attrs,
                    value,
                    checked,
                    ..ElementData::default()
                }));
                for child in children {
                    self.build(child, id);
                }
                id
            }
        };
        self.insert_before(parent, id, None);
    }

    fn to_markup(&self, node: DomId) -> MarkupNode {
        match &self.nodes[node.0].kind {
            NodeKind::Text(text) => MarkupNode::Text(text.clone()),
            NodeKind::Element(data) => {
                let mut attrs = data.attrs.clone();
                if !data.styles.is_empty() {
                    let style = data
                        .styles
                        .iter()
                        .map(|(k, v)| format!("{}: {};", k, v))
                        .collect::<Vec<_>>()
                        .join(" ");
                    attrs.retain(|(n, _)| n != "style");
                    attrs.push(("style".to_string(), style));
                }
                MarkupNode::Element {
                    tag: data.tag.clone(),
                    attrs,
                    children: self.nodes[node.0]
                        .children
                        .iter()
                        .map(|&c| self.to_markup(c))
                        .collect(),
                }
            }
        }
    }
}

impl UiTree for Document {
    fn tag(&self, node: DomId) -> Option<String> {
        self.element(node).map(|d| d.tag.clone())
    }

    fn attributes(&self, el: DomId) -> Vec<(String, String)> {
        self.element(el).map(|d| d.attrs.clone()).unwrap_or_default()
    }

    fn attribute(&self, el: DomId, name: &str) -> Option<String> {
        self.element(el)?
            .attrs
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.clone())
    }

    fn set_attribute(&mut self, el: DomId, name: &str, value: &str) {
        if let Some(data) = self.element_mut(el) {
            match data.attrs.iter_mut().find(|(n, _)| n == name) {
                Some(slot) => slot.1 = value.to_string(),
                None => data.attrs.push((name.to_string(), value.to_string())),
            }
        }
    }

    fn remove_attribute(&mut self, el: DomId, name: &str) {
        if let Some(data) = self.element_mut(el) {
            data.attrs.retain(|(n, _)| n != name);
        }
    }

    fn parent(&self, node: DomId) -> Option<DomId> {
        self.nodes.get(node.0)?.parent
    }

    fn children(&self, node: DomId) -> Vec<DomId> {
        self.nodes
            .get(node.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn next_sibling(&self, node: DomId) -> Option<DomId> {
        let parent = self.parent(node)?;
        let siblings = &self.nodes[parent.0].children;
        let pos = siblings.iter().position(|&c| c == node)?;
        siblings.get(pos + 1).copied()
    }

    fn insert_before(&mut self, parent: DomId, child: DomId, before: Option<DomId>) {
        if child == parent || self.contains(child, parent) {
            tracing::warn!(%parent, %child, "refusing to insert a node into its own subtree");
            return;
        }
        self.remove(child);
        let siblings = &mut self.nodes[parent.0].children;
        let at = before
            .and_then(|b| siblings.iter().position(|&c| c == b))
            .unwrap_or(siblings.len());
        siblings.insert(at, child);
        self.nodes[child.0].parent = Some(parent);
    }

    fn remove(&mut self, node: DomId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != node);
        }
    }

    fn create_element(&mut self, tag: &str) -> DomId {
        self.alloc(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            ..ElementData::default()
        }))
    }

    fn create_text(&mut self, text: &str) -> DomId {
        self.alloc(NodeKind::Text(text.to_string()))
    }

    fn inner_markup(&self, el: DomId) -> String {
        let children: Vec<MarkupNode> = self
            .children(el)
            .into_iter()
            .map(|c| self.to_markup(c))
            .collect();
        markup::serialize(&children)
    }

    fn set_inner_markup(&mut self, el: DomId, markup: &str) -> Result<(), MarkupError> {
        let nodes = markup::parse_fragment(markup)?;
        for child in self.children(el) {
            self.remove(child);
        }
        for node in nodes {
            self.build(node, el);
        }
        Ok(())
    }

    fn is_text(&self, node: DomId) -> bool {
        matches!(self.nodes.get(node.0).map(|n| &n.kind), Some(NodeKind::Text(_)))
    }

    fn text(&self, node: DomId) -> String {
        match self.nodes.get(node.0).map(|n| &n.kind) {
            Some(NodeKind::Text(text)) => text.clone(),
            _ => String::new(),
        }
    }

    fn set_text(&mut self, node: DomId, text: &str) {
        if let Some(DomNode {
            kind: NodeKind::Text(current),
            ..
        }) = self.nodes.get_mut(node.0)
        {
            *current = text.to_string();
        }
    }

    fn value(&self, el: DomId) -> String {
        self.element(el).map(|d| d.value.clone()).unwrap_or_default()
    }

    fn set_value(&mut self, el: DomId, value: &str) {
        if let Some(data) = self.element_mut(el) {
            data.value = value.to_string();
        }
    }

    fn checked(&self, el: DomId) -> bool {
        self.element(el).is_some_and(|d| d.checked)
    }

    fn set_checked(&mut self, el: DomId, checked: bool) {
        if let Some(data) = self.element_mut(el) {
            data.checked = checked;
        }
    }

    fn style(&self, el: DomId, property: &str) -> Option<String> {
        self.element(el)?.styles.get(property).cloned()
    }

    fn set_style(&mut self, el: DomId, property: &str, value: Option<&str>) {
        if let Some(data) = self.element_mut(el) {
            match value {
                Some(v) => {
                    data.styles.insert(property.to_string(), v.to_string());
                }
                None => {
                    data.styles.shift_remove(property);
                }
            }
        }
    }

    fn listen(&mut self, el: DomId, kind: EventKind) {
        if let Some(data) = self.element_mut(el) {
            if !data.listeners.contains(&kind) {
                data.listeners.push(kind);
            }
        }
    }

    fn is_listening(&self, el: DomId, kind: EventKind) -> bool {
        self.element(el).is_some_and(|d| d.listeners.contains(&kind))
    }
}
