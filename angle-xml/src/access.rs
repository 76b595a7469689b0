use crate::forest::{Forest, Node};
use crate::xmlvalue::NodeKind;

/// Node edges used by [`Forest::traverse`]: the start edge of an element is
/// its start tag, the end edge its end tag; other nodes get both edges
/// back to back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeEdge {
    Start(Node),
    End(Node),
}

/// ## Navigation
///
/// All iterators yield document order.
impl Forest {
    pub fn child_nodes(&self, node: Node) -> impl Iterator<Item = Node> + '_ {
        self.children(node).iter().copied()
    }

    pub fn ancestors(&self, node: Node) -> impl Iterator<Item = Node> + '_ {
        let mut current = self.parent(node);
        std::iter::from_fn(move || {
            let node = current?;
            current = self.parent(node);
            Some(node)
        })
    }

    /// Ancestors from the document root down to the node's parent.
    pub fn ancestors_in_document_order(&self, node: Node) -> Vec<Node> {
        let mut ancestors: Vec<Node> = self.ancestors(node).collect();
        ancestors.reverse();
        ancestors
    }

    /// Depth-first, left-to-right descendants, excluding the node itself.
    pub fn descendants(&self, node: Node) -> Descendants<'_> {
        let stack: Vec<Node> = self.children(node).iter().rev().copied().collect();
        Descendants {
            forest: self,
            stack,
        }
    }

    pub fn following_siblings(&self, node: Node) -> impl Iterator<Item = Node> + '_ {
        let siblings = match self.parent(node) {
            Some(parent) if self.kind(node) != NodeKind::Attribute => {
                &self.children(parent)[self.position(node) + 1..]
            }
            _ => &[],
        };
        siblings.iter().copied()
    }

    pub fn preceding_siblings(&self, node: Node) -> impl Iterator<Item = Node> + '_ {
        let siblings = match self.parent(node) {
            Some(parent) if self.kind(node) != NodeKind::Attribute => {
                &self.children(parent)[..self.position(node)]
            }
            _ => &[],
        };
        siblings.iter().copied()
    }

    /// Nodes after this one in document order, minus descendants.
    pub fn following(&self, node: Node) -> Vec<Node> {
        let mut result = Vec::new();
        let mut current = node;
        loop {
            for sibling in self.following_siblings(current) {
                result.push(sibling);
                result.extend(self.descendants(sibling));
            }
            match self.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        result
    }

    /// Nodes before this one in document order, minus ancestors.
    pub fn preceding(&self, node: Node) -> Vec<Node> {
        let mut chains: Vec<Vec<Node>> = Vec::new();
        let mut current = node;
        loop {
            let mut chain = Vec::new();
            for sibling in self.preceding_siblings(current) {
                chain.push(sibling);
                chain.extend(self.descendants(sibling));
            }
            chains.push(chain);
            match self.parent(current) {
                Some(parent) => current = parent,
                None => break,
            }
        }
        // outermost ancestors' siblings come first in document order
        chains.reverse();
        chains.into_iter().flatten().collect()
    }

    /// Start/end edge traversal over a subtree.
    pub fn traverse(&self, node: Node) -> Traverse<'_> {
        Traverse {
            forest: self,
            stack: vec![NodeEdge::Start(node)],
        }
    }

    /// Namespace declarations in scope at a node, outermost first; inner
    /// declarations of the same prefix win.
    pub fn namespaces_in_scope(&self, node: Node) -> Vec<(String, String)> {
        let mut chain = self.ancestors_in_document_order(node);
        chain.push(node);
        let mut declarations: Vec<(String, String)> = Vec::new();
        for element in chain {
            for &attribute in self.attributes(element) {
                if let crate::Value::Attribute(a) = self.value(attribute) {
                    if let Some(prefix) = a.declared_prefix() {
                        declarations.retain(|(p, _)| p != prefix);
                        declarations.push((prefix.to_string(), a.value().to_string()));
                    }
                }
            }
        }
        declarations
    }
}

pub struct Descendants<'a> {
    forest: &'a Forest,
    stack: Vec<Node>,
}

impl Iterator for Descendants<'_> {
    type Item = Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack
            .extend(self.forest.children(node).iter().rev().copied());
        Some(node)
    }
}

pub struct Traverse<'a> {
    forest: &'a Forest,
    stack: Vec<NodeEdge>,
}

impl Iterator for Traverse<'_> {
    type Item = NodeEdge;

    fn next(&mut self) -> Option<Self::Item> {
        let edge = self.stack.pop()?;
        if let NodeEdge::Start(node) = edge {
            self.stack.push(NodeEdge::End(node));
            self.stack.extend(
                self.forest
                    .children(node)
                    .iter()
                    .rev()
                    .map(|&child| NodeEdge::Start(child)),
            );
        }
        Some(edge)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use angle_name::Name;

    fn tree(forest: &mut Forest) -> (Node, Node, Node, Node, Node) {
        // <root><a><c/></a><b/></root>
        let doc = forest.new_document();
        let root = forest.new_element(Name::local("root"));
        forest.append_child(doc, root);
        let a = forest.new_element(Name::local("a"));
        forest.append_child(root, a);
        let c = forest.new_element(Name::local("c"));
        forest.append_child(a, c);
        let b = forest.new_element(Name::local("b"));
        forest.append_child(root, b);
        (doc, root, a, b, c)
    }

    #[test]
    fn test_descendants_depth_first() {
        let mut forest = Forest::new();
        let (doc, root, a, b, c) = tree(&mut forest);
        let descendants: Vec<Node> = forest.descendants(doc).collect();
        assert_eq!(descendants, vec![root, a, c, b]);
    }

    #[test]
    fn test_ancestors_reach_document() {
        let mut forest = Forest::new();
        let (doc, root, a, _, c) = tree(&mut forest);
        let ancestors: Vec<Node> = forest.ancestors(c).collect();
        assert_eq!(ancestors, vec![a, root, doc]);
    }

    #[test]
    fn test_following() {
        let mut forest = Forest::new();
        let (_, _, _, b, c) = tree(&mut forest);
        assert_eq!(forest.following(c), vec![b]);
    }

    #[test]
    fn test_preceding() {
        let mut forest = Forest::new();
        let (_, _, a, b, c) = tree(&mut forest);
        assert_eq!(forest.preceding(b), vec![a, c]);
    }

    #[test]
    fn test_namespaces_in_scope() {
        let mut forest = Forest::new();
        let doc = forest
            .parse(r#"<a xmlns:x="urn:outer" xmlns="urn:default"><b xmlns:x="urn:inner"/></a>"#)
            .unwrap();
        let a = forest.document_element(doc).unwrap();
        let b = forest.children(a)[0];
        let scope = forest.namespaces_in_scope(b);
        assert!(scope.contains(&("x".to_string(), "urn:inner".to_string())));
        assert!(scope.contains(&("".to_string(), "urn:default".to_string())));
        assert!(!scope.contains(&("x".to_string(), "urn:outer".to_string())));
    }

    #[test]
    fn test_traverse_edges() {
        let mut forest = Forest::new();
        let (_, root, a, b, c) = tree(&mut forest);
        let edges: Vec<NodeEdge> = forest.traverse(root).collect();
        assert_eq!(
            edges,
            vec![
                NodeEdge::Start(root),
                NodeEdge::Start(a),
                NodeEdge::Start(c),
                NodeEdge::End(c),
                NodeEdge::End(a),
                NodeEdge::Start(b),
                NodeEdge::End(b),
                NodeEdge::End(root),
            ]
        );
    }
}
