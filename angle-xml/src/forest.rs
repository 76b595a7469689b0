use std::cmp::Ordering;

use angle_name::Name;

use crate::xmlvalue::{
    Attribute, Comment, Document, Element, NodeKind, ProcessingInstruction, Text, Value,
};

/// A stable index into a [`Forest`].
///
/// Copyable and cheap to compare; node identity is the index, which stays
/// valid for the lifetime of the forest even when the node is detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Node(pub(crate) usize);

impl Node {
    #[inline]
    pub fn get(&self) -> usize {
        self.0
    }
}

#[derive(Debug)]
struct NodeData {
    value: Value,
    parent: Option<Node>,
    position: usize,
    children: Vec<Node>,
}

impl NodeData {
    fn new(value: Value) -> Self {
        NodeData {
            value,
            parent: None,
            position: 0,
            children: Vec::new(),
        }
    }
}

/// The arena owning every XML node.
///
/// All documents parsed or constructed through one forest share its arena, so
/// items can refer to nodes of different trees with plain [`Node`] ids.
#[derive(Debug, Default)]
pub struct Forest {
    nodes: Vec<NodeData>,
}

impl Forest {
    pub fn new() -> Self {
        Forest { nodes: Vec::new() }
    }

    fn alloc(&mut self, value: Value) -> Node {
        let node = Node(self.nodes.len());
        self.nodes.push(NodeData::new(value));
        node
    }

    #[inline]
    fn data(&self, node: Node) -> &NodeData {
        &self.nodes[node.0]
    }

    #[inline]
    fn data_mut(&mut self, node: Node) -> &mut NodeData {
        &mut self.nodes[node.0]
    }

    // --- creation

    pub fn new_document(&mut self) -> Node {
        self.alloc(Value::Document(Document::new()))
    }

    pub fn new_element(&mut self, name: Name) -> Node {
        self.alloc(Value::Element(Element::new(name)))
    }

    pub fn new_text(&mut self, content: impl Into<String>) -> Node {
        self.alloc(Value::Text(Text::new(content.into())))
    }

    pub fn new_cdata(&mut self, content: impl Into<String>) -> Node {
        self.alloc(Value::Cdata(Text::new(content.into())))
    }

    pub fn new_comment(&mut self, content: impl Into<String>) -> Node {
        self.alloc(Value::Comment(Comment::new(content.into())))
    }

    pub fn new_processing_instruction(
        &mut self,
        name: impl Into<String>,
        data: impl Into<String>,
        attributes: Vec<(String, String)>,
    ) -> Node {
        self.alloc(Value::ProcessingInstruction(ProcessingInstruction::new(
            name.into(),
            data.into(),
            attributes,
        )))
    }

    // --- accessors

    #[inline]
    pub fn value(&self, node: Node) -> &Value {
        &self.data(node).value
    }

    #[inline]
    pub fn value_mut(&mut self, node: Node) -> &mut Value {
        &mut self.data_mut(node).value
    }

    #[inline]
    pub fn kind(&self, node: Node) -> NodeKind {
        self.data(node).value.kind()
    }

    #[inline]
    pub fn parent(&self, node: Node) -> Option<Node> {
        self.data(node).parent
    }

    /// The node's index within its parent's child list, or an attribute's
    /// ordinal within its owner element.
    #[inline]
    pub fn position(&self, node: Node) -> usize {
        self.data(node).position
    }

    #[inline]
    pub fn children(&self, node: Node) -> &[Node] {
        &self.data(node).children
    }

    pub fn attributes(&self, node: Node) -> &[Node] {
        match self.value(node) {
            Value::Element(element) => &element.attributes,
            _ => &[],
        }
    }

    /// The qualified name of an element or attribute node.
    pub fn name(&self, node: Node) -> Option<&Name> {
        match self.value(node) {
            Value::Element(element) => Some(element.name()),
            Value::Attribute(attribute) => Some(attribute.name()),
            _ => None,
        }
    }

    pub fn is_element(&self, node: Node) -> bool {
        matches!(self.value(node), Value::Element(_))
    }

    pub fn is_document(&self, node: Node) -> bool {
        matches!(self.value(node), Value::Document(_))
    }

    pub fn element(&self, node: Node) -> Option<&Element> {
        match self.value(node) {
            Value::Element(element) => Some(element),
            _ => None,
        }
    }

    pub fn attribute_node(&self, node: Node) -> Option<&Attribute> {
        match self.value(node) {
            Value::Attribute(attribute) => Some(attribute),
            _ => None,
        }
    }

    /// The single element child of a document node.
    pub fn document_element(&self, node: Node) -> Option<Node> {
        if !self.is_document(node) {
            return None;
        }
        self.children(node)
            .iter()
            .copied()
            .find(|&child| self.is_element(child))
    }

    /// Walk parents up to the document (or detached subtree top).
    pub fn top(&self, node: Node) -> Node {
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Concatenated text content per the XDM string value rules.
    pub fn string_value(&self, node: Node) -> String {
        match self.value(node) {
            Value::Document(_) | Value::Element(_) => {
                let mut out = String::new();
                self.collect_text(node, &mut out);
                out
            }
            Value::Attribute(attribute) => attribute.value().to_string(),
            Value::Text(text) | Value::Cdata(text) => text.get().to_string(),
            Value::Comment(comment) => comment.get().to_string(),
            Value::ProcessingInstruction(pi) => pi.data().to_string(),
        }
    }

    fn collect_text(&self, node: Node, out: &mut String) {
        for &child in self.children(node) {
            match self.value(child) {
                Value::Text(text) | Value::Cdata(text) => out.push_str(text.get()),
                Value::Element(_) => self.collect_text(child, out),
                _ => {}
            }
        }
    }

    // --- attribute access

    pub fn attribute(&self, element: Node, name: &Name) -> Option<Node> {
        self.attributes(element)
            .iter()
            .copied()
            .find(|&a| self.attribute_node(a).map(Attribute::name) == Some(name))
    }

    /// Attribute value looked up by local name in no namespace.
    pub fn attribute_str(&self, element: Node, local: &str) -> Option<&str> {
        self.attributes(element).iter().copied().find_map(|a| {
            let attribute = self.attribute_node(a)?;
            if attribute.name().local_name() == local && attribute.name().uri().is_none() {
                Some(attribute.value())
            } else {
                None
            }
        })
    }

    // --- mutation

    fn renumber_children(&mut self, parent: Node, from: usize) {
        let children: Vec<Node> = self.data(parent).children[from..].to_vec();
        for (offset, child) in children.into_iter().enumerate() {
            self.data_mut(child).position = from + offset;
        }
    }

    fn renumber_attributes(&mut self, element: Node, from: usize) {
        let attributes: Vec<Node> = self.attributes(element)[from..].to_vec();
        for (offset, attribute) in attributes.into_iter().enumerate() {
            self.data_mut(attribute).position = from + offset;
        }
    }

    /// Append a detached node as the last child.
    pub fn append_child(&mut self, parent: Node, child: Node) {
        debug_assert!(self.parent(child).is_none());
        let position = self.data(parent).children.len();
        self.data_mut(parent).children.push(child);
        let data = self.data_mut(child);
        data.parent = Some(parent);
        data.position = position;
    }

    /// Insert a detached node at `index`, shifting later siblings.
    pub fn insert_child(&mut self, parent: Node, index: usize, child: Node) {
        debug_assert!(self.parent(child).is_none());
        self.data_mut(parent).children.insert(index, child);
        let data = self.data_mut(child);
        data.parent = Some(parent);
        data.position = index;
        self.renumber_children(parent, index + 1);
    }

    /// Detach a node (or attribute) from its parent, renumbering siblings.
    pub fn detach(&mut self, node: Node) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        let position = self.position(node);
        if self.kind(node) == NodeKind::Attribute {
            if let Value::Element(element) = self.value_mut(parent) {
                element.attributes.remove(position);
            }
            self.renumber_attributes(parent, position);
        } else {
            self.data_mut(parent).children.remove(position);
            self.renumber_children(parent, position);
        }
        let data = self.data_mut(node);
        data.parent = None;
        data.position = 0;
    }

    /// Replace `old` with the detached node `new`; `old` ends up detached.
    pub fn replace(&mut self, old: Node, new: Node) {
        debug_assert!(self.parent(new).is_none());
        let Some(parent) = self.parent(old) else {
            return;
        };
        let position = self.position(old);
        self.data_mut(parent).children[position] = new;
        {
            let data = self.data_mut(new);
            data.parent = Some(parent);
            data.position = position;
        }
        let data = self.data_mut(old);
        data.parent = None;
        data.position = 0;
    }

    /// Set an attribute, updating in place when the qualified name already
    /// exists so the ordinal is preserved.
    pub fn set_attribute(&mut self, element: Node, name: Name, value: impl Into<String>) -> Node {
        if let Some(existing) = self.attribute(element, &name) {
            if let Value::Attribute(attribute) = self.value_mut(existing) {
                attribute.set_value(value.into());
            }
            return existing;
        }
        let node = self.alloc(Value::Attribute(Attribute::new(name, value.into())));
        let position = self.attributes(element).len();
        if let Value::Element(el) = self.value_mut(element) {
            el.attributes.push(node);
        }
        let data = self.data_mut(node);
        data.parent = Some(element);
        data.position = position;
        node
    }

    pub fn remove_attribute(&mut self, element: Node, name: &Name) -> bool {
        if let Some(existing) = self.attribute(element, name) {
            self.detach(existing);
            true
        } else {
            false
        }
    }

    /// Deep-clone a subtree into the arena; the clone is detached.
    pub fn clone_node(&mut self, node: Node) -> Node {
        let value = self.value(node).clone();
        match value {
            Value::Element(element) => {
                let clone = self.new_element(element.name().clone());
                for attribute in element.attributes {
                    if let Value::Attribute(a) = self.value(attribute).clone() {
                        self.set_attribute(clone, a.name.clone(), a.value);
                    }
                }
                let children: Vec<Node> = self.children(node).to_vec();
                for child in children {
                    let child_clone = self.clone_node(child);
                    self.append_child(clone, child_clone);
                }
                clone
            }
            Value::Document(document) => {
                let clone = self.alloc(Value::Document(document));
                let children: Vec<Node> = self.children(node).to_vec();
                for child in children {
                    let child_clone = self.clone_node(child);
                    self.append_child(clone, child_clone);
                }
                clone
            }
            other => self.alloc(other),
        }
    }

    // --- identity and order

    /// The path identity of a node: node kind and name plus the position
    /// steps from the document root, such as `element(item)[0/2/1]`.
    /// Stable for the lifetime of the tree.
    pub fn path(&self, node: Node) -> String {
        let label = match self.value(node) {
            Value::Document(_) => "document()".to_string(),
            Value::Element(element) => format!("element({})", element.name()),
            Value::Attribute(attribute) => format!("attribute({})", attribute.name()),
            Value::Text(_) => "text()".to_string(),
            Value::Cdata(_) => "cdata()".to_string(),
            Value::Comment(_) => "comment()".to_string(),
            Value::ProcessingInstruction(pi) => {
                format!("processing-instruction({})", pi.name())
            }
        };
        let mut steps = Vec::new();
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            if self.kind(current) == NodeKind::Attribute {
                steps.push(format!("@{}", self.position(current)));
            } else {
                steps.push(self.position(current).to_string());
            }
            current = parent;
        }
        steps.reverse();
        format!("{}[{}]", label, steps.join("/"))
    }

    /// Key for document-order comparison: the owning tree's top node breaks
    /// ties across documents, then the position steps root to node compare
    /// lexicographically. Attributes order after their element and before its
    /// children.
    fn order_key(&self, node: Node) -> (usize, Vec<(u8, usize)>) {
        let mut steps = Vec::new();
        let mut current = node;
        while let Some(parent) = self.parent(current) {
            let class = if self.kind(current) == NodeKind::Attribute {
                0
            } else {
                1
            };
            steps.push((class, self.position(current)));
            current = parent;
        }
        steps.reverse();
        (current.0, steps)
    }

    pub fn cmp_document_order(&self, a: Node, b: Node) -> Ordering {
        if a == b {
            return Ordering::Equal;
        }
        self.order_key(a).cmp(&self.order_key(b))
    }

    /// Sort into document order and drop duplicate identities.
    pub fn sort_document_order(&self, nodes: &mut Vec<Node>) {
        nodes.sort_by_cached_key(|&node| self.order_key(node));
        nodes.dedup();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(forest: &mut Forest) -> (Node, Node, Node, Node) {
        let doc = forest.new_document();
        let root = forest.new_element(Name::local("root"));
        forest.append_child(doc, root);
        let a = forest.new_element(Name::local("a"));
        let b = forest.new_element(Name::local("b"));
        forest.append_child(root, a);
        forest.append_child(root, b);
        (doc, root, a, b)
    }

    #[test]
    fn test_parent_and_position_after_append() {
        let mut forest = Forest::new();
        let (_, root, a, b) = sample(&mut forest);
        assert_eq!(forest.parent(a), Some(root));
        assert_eq!(forest.position(a), 0);
        assert_eq!(forest.position(b), 1);
    }

    #[test]
    fn test_detach_renumbers() {
        let mut forest = Forest::new();
        let (_, root, a, b) = sample(&mut forest);
        forest.detach(a);
        assert_eq!(forest.children(root), &[b]);
        assert_eq!(forest.position(b), 0);
        assert_eq!(forest.parent(a), None);
    }

    #[test]
    fn test_insert_child_renumbers() {
        let mut forest = Forest::new();
        let (_, root, a, b) = sample(&mut forest);
        let c = forest.new_element(Name::local("c"));
        forest.insert_child(root, 1, c);
        assert_eq!(forest.children(root), &[a, c, b]);
        assert_eq!(forest.position(c), 1);
        assert_eq!(forest.position(b), 2);
    }

    #[test]
    fn test_replace() {
        let mut forest = Forest::new();
        let (_, root, a, b) = sample(&mut forest);
        let c = forest.new_element(Name::local("c"));
        forest.replace(a, c);
        assert_eq!(forest.children(root), &[c, b]);
        assert_eq!(forest.parent(a), None);
        assert_eq!(forest.position(c), 0);
    }

    #[test]
    fn test_set_attribute_updates_in_place() {
        let mut forest = Forest::new();
        let (_, root, _, _) = sample(&mut forest);
        let first = forest.set_attribute(root, Name::local("k"), "1");
        forest.set_attribute(root, Name::local("x"), "y");
        let again = forest.set_attribute(root, Name::local("k"), "2");
        assert_eq!(first, again);
        assert_eq!(forest.position(again), 0);
        assert_eq!(
            forest.attribute_node(again).unwrap().value(),
            "2"
        );
    }

    #[test]
    fn test_document_order() {
        let mut forest = Forest::new();
        let (doc, root, a, b) = sample(&mut forest);
        let attr = forest.set_attribute(root, Name::local("k"), "v");
        let mut nodes = vec![b, attr, doc, a, root];
        forest.sort_document_order(&mut nodes);
        assert_eq!(nodes, vec![doc, root, attr, a, b]);
    }

    #[test]
    fn test_sort_dedups_identity() {
        let mut forest = Forest::new();
        let (_, _, a, b) = sample(&mut forest);
        let mut nodes = vec![b, a, b, a];
        forest.sort_document_order(&mut nodes);
        assert_eq!(nodes, vec![a, b]);
    }

    #[test]
    fn test_clone_node_is_detached_deep_copy() {
        let mut forest = Forest::new();
        let (_, root, a, _) = sample(&mut forest);
        forest.set_attribute(root, Name::local("k"), "v");
        let clone = forest.clone_node(root);
        assert_eq!(forest.parent(clone), None);
        assert_ne!(clone, root);
        assert_eq!(forest.children(clone).len(), 2);
        assert_ne!(forest.children(clone)[0], a);
        assert_eq!(forest.attributes(clone).len(), 1);
    }

    #[test]
    fn test_string_value() {
        let mut forest = Forest::new();
        let (_, root, a, _) = sample(&mut forest);
        let t1 = forest.new_text("hello ");
        forest.append_child(a, t1);
        let t2 = forest.new_text("world");
        forest.append_child(root, t2);
        assert_eq!(forest.string_value(root), "hello world");
    }

    #[test]
    fn test_path_identity() {
        let mut forest = Forest::new();
        let (_, root, _, b) = sample(&mut forest);
        assert_eq!(forest.path(root), "element(root)[0]");
        assert_eq!(forest.path(b), "element(b)[0/1]");
    }
}
