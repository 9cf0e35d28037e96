//! Arena-backed document trees.
//!
//! A [`Document`] owns every element of one XML tree in a dense `Vec`. Nodes
//! refer to each other by [`NodeId`] (an index into that vec), each holding
//! its parent index and the ordered indices of its children. Readers walk the
//! tree through [`NodeRef`] handles, which are `Copy` and borrow the document,
//! so there is no shared ownership and no reference cycle between parent and
//! child.
//!
//! Equality between documents is structural: two documents are equal when
//! their doctypes match and their root subtrees have the same tags, the same
//! attribute sets, the same text, and pairwise-equal children in order. The
//! arena layout (which ids were used) never takes part in comparison.

use std::fmt;

/// Index of a node inside its owning [`Document`].
pub type NodeId = usize;

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    attributes: Vec<(String, String)>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    text: Option<String>,
}

impl NodeData {
    fn element(tag: String, parent: Option<NodeId>) -> Self {
        Self {
            tag,
            attributes: Vec::new(),
            children: Vec::new(),
            parent,
            text: None,
        }
    }
}

/// One XML document: an element arena, its root, and an optional doctype.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    doctype: Option<String>,
}

impl Document {
    /// Create a document holding a single, empty root element.
    pub fn new(root_tag: impl Into<String>) -> Self {
        Self {
            nodes: vec![NodeData::element(root_tag.into(), None)],
            root: 0,
            doctype: None,
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.root
    }

    pub fn root(&self) -> NodeRef<'_> {
        self.node(self.root)
    }

    /// Handle for a node of this document.
    ///
    /// Panics if `id` was not produced by this document.
    pub fn node(&self, id: NodeId) -> NodeRef<'_> {
        assert!(id < self.nodes.len(), "node {id} does not belong to this document");
        NodeRef { doc: self, id }
    }

    /// Body of the `<!DOCTYPE ...>` declaration, if the document has one.
    pub fn doctype(&self) -> Option<&str> {
        self.doctype.as_deref()
    }

    pub fn set_doctype(&mut self, doctype: Option<String>) {
        self.doctype = doctype;
    }

    /// Number of elements reachable from the root.
    pub fn element_count(&self) -> usize {
        self.root().size()
    }

    /// Append a new empty element as the last child of `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: impl Into<String>) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(NodeData::element(tag.into(), Some(parent)));
        self.nodes[parent].children.push(id);
        id
    }

    /// Set an attribute, replacing the value in place when the name already
    /// exists so that the construction order of attributes is kept.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        let attributes = &mut self.nodes[id].attributes;
        match attributes.iter_mut().find(|(existing, _)| existing == name) {
            Some((_, slot)) => *slot = value,
            None => attributes.push((name.to_string(), value)),
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let attributes = &mut self.nodes[id].attributes;
        let position = attributes.iter().position(|(existing, _)| existing == name)?;
        Some(attributes.remove(position).1)
    }

    /// Set the element text. Empty text is stored as no text.
    pub fn set_text(&mut self, id: NodeId, text: Option<String>) {
        self.nodes[id].text = text.filter(|t| !t.is_empty());
    }

    pub fn rename(&mut self, id: NodeId, tag: impl Into<String>) {
        self.nodes[id].tag = tag.into();
    }

    /// Deep-copy `source` (which may live in another document) and append the
    /// copy as the last child of `parent`. Returns the id of the copied root.
    pub fn import_subtree(&mut self, parent: NodeId, source: NodeRef<'_>) -> NodeId {
        let id = self.append_element(parent, source.tag());
        self.nodes[id].attributes = source.data().attributes.clone();
        self.nodes[id].text = source.data().text.clone();
        for child in source.children() {
            self.import_subtree(id, child);
        }
        id
    }

    /// Unlink `id` from its parent. The node stays in the arena but is no
    /// longer reachable from the root. Detaching the root is a no-op.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent.take() {
            self.nodes[parent].children.retain(|child| *child != id);
        }
    }

    /// Copy the subtree rooted at `id` into a fresh, compact document.
    pub fn extract(&self, id: NodeId) -> Document {
        let source = self.node(id);
        let mut extracted = Document::new(source.tag());
        let root = extracted.root;
        extracted.nodes[root].attributes = source.data().attributes.clone();
        extracted.nodes[root].text = source.data().text.clone();
        for child in source.children() {
            extracted.import_subtree(root, child);
        }
        extracted
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        self.doctype == other.doctype && self.root().structurally_equal(other.root())
    }
}

impl Eq for Document {}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let xml = crate::writer::to_xml_string(self, crate::writer::DEFAULT_INDENT)
            .map_err(|_| fmt::Error)?;
        f.write_str(&xml)
    }
}

/// Lightweight read handle to one element of a [`Document`].
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    doc: &'a Document,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    fn data(&self) -> &'a NodeData {
        &self.doc.nodes[self.id]
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn document(&self) -> &'a Document {
        self.doc
    }

    pub fn tag(&self) -> &'a str {
        &self.data().tag
    }

    /// Attributes in construction order.
    pub fn attributes(self) -> impl ExactSizeIterator<Item = (&'a str, &'a str)> + 'a {
        self.data()
            .attributes
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn attribute(&self, name: &str) -> Option<&'a str> {
        self.data()
            .attributes
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> Option<&'a str> {
        self.data().text.as_deref()
    }

    pub fn children(self) -> impl ExactSizeIterator<Item = NodeRef<'a>> + 'a {
        let doc = self.doc;
        self.data()
            .children
            .iter()
            .map(move |&id| NodeRef { doc, id })
    }

    pub fn child_count(&self) -> usize {
        self.data().children.len()
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.data().parent.map(|id| NodeRef { doc: self.doc, id })
    }

    /// Number of elements in this subtree, including this one.
    pub fn size(&self) -> usize {
        1 + self.children().map(|c| c.size()).sum::<usize>()
    }

    /// Structural equality: tag, attribute set, text, and children in order.
    /// Attribute order does not matter since names are unique.
    pub fn structurally_equal(&self, other: NodeRef<'_>) -> bool {
        if self.tag() != other.tag() || self.text() != other.text() {
            return false;
        }
        if self.attributes().len() != other.attributes().len()
            || !self
                .attributes()
                .all(|(name, value)| other.attribute(name) == Some(value))
        {
            return false;
        }
        self.child_count() == other.child_count()
            && self
                .children()
                .zip(other.children())
                .all(|(a, b)| a.structurally_equal(b))
    }
}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id)
            .field("tag", &self.tag())
            .field("children", &self.child_count())
            .finish()
    }
}
