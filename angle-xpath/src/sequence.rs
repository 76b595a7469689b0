use angle_xml::{Forest, Node};
use itertools::Itertools;

use crate::atomic::Atomic;
use crate::error::{Error, Result};

/// A single member of a sequence: a node reference or an atomic value.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    Node(Node),
    Atomic(Atomic),
}

impl Item {
    pub fn to_node(&self) -> Result<Node> {
        match self {
            Item::Node(node) => Ok(*node),
            Item::Atomic(atomic) => Err(Error::type_error(format!(
                "expected a node, found {}",
                atomic.type_label()
            ))),
        }
    }

    pub fn to_atomic(&self) -> Result<Atomic> {
        match self {
            Item::Atomic(atomic) => Ok(atomic.clone()),
            Item::Node(_) => Err(Error::type_error("expected an atomic value, found a node")),
        }
    }

    /// Atomize: nodes contribute their string value as untyped data.
    pub fn atomized(&self, forest: &Forest) -> Atomic {
        match self {
            Item::Atomic(atomic) => atomic.clone(),
            Item::Node(node) => Atomic::Untyped(forest.string_value(*node).as_str().into()),
        }
    }

    pub fn string_value(&self, forest: &Forest) -> String {
        match self {
            Item::Atomic(atomic) => atomic.string_value(),
            Item::Node(node) => forest.string_value(*node),
        }
    }
}

impl From<Node> for Item {
    fn from(node: Node) -> Self {
        Item::Node(node)
    }
}

impl From<Atomic> for Item {
    fn from(atomic: Atomic) -> Self {
        Item::Atomic(atomic)
    }
}

impl From<bool> for Item {
    fn from(value: bool) -> Self {
        Item::Atomic(value.into())
    }
}

impl From<i64> for Item {
    fn from(value: i64) -> Self {
        Item::Atomic(value.into())
    }
}

impl From<usize> for Item {
    fn from(value: usize) -> Self {
        Item::Atomic(value.into())
    }
}

impl From<f64> for Item {
    fn from(value: f64) -> Self {
        Item::Atomic(value.into())
    }
}

impl From<&str> for Item {
    fn from(value: &str) -> Self {
        Item::Atomic(value.into())
    }
}

impl From<String> for Item {
    fn from(value: String) -> Self {
        Item::Atomic(value.into())
    }
}

/// The sole return type of every XPath expression: an ordered list of items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    items: Vec<Item>,
}

impl Sequence {
    pub fn new() -> Self {
        Sequence { items: Vec::new() }
    }

    pub fn singleton(item: impl Into<Item>) -> Self {
        Sequence {
            items: vec![item.into()],
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[inline]
    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Item> {
        self.items.iter()
    }

    pub fn push(&mut self, item: impl Into<Item>) {
        self.items.push(item.into());
    }

    pub fn extend(&mut self, other: Sequence) {
        self.items.extend(other.items);
    }

    pub fn first(&self) -> Option<&Item> {
        self.items.first()
    }

    /// The single item of a singleton sequence.
    pub fn one(&self) -> Result<&Item> {
        match self.items.as_slice() {
            [item] => Ok(item),
            _ => Err(Error::type_error(format!(
                "expected exactly one item, found {}",
                self.len()
            ))),
        }
    }

    /// Zero or one items.
    pub fn option(&self) -> Result<Option<&Item>> {
        match self.items.as_slice() {
            [] => Ok(None),
            [item] => Ok(Some(item)),
            _ => Err(Error::type_error(format!(
                "expected at most one item, found {}",
                self.len()
            ))),
        }
    }

    /// Effective boolean value of the whole sequence.
    pub fn effective_boolean_value(&self) -> Result<bool> {
        match self.items.as_slice() {
            [] => Ok(false),
            [Item::Node(_), ..] => Ok(true),
            [Item::Atomic(atomic)] => atomic.effective_boolean_value(),
            _ => Err(Error::type_error(
                "no effective boolean value for a sequence of several atomic values",
            )),
        }
    }

    pub fn atomized(&self, forest: &Forest) -> Vec<Atomic> {
        self.items.iter().map(|item| item.atomized(forest)).collect()
    }

    /// Atomize a sequence expected to hold at most one item.
    pub fn atomized_option(&self, forest: &Forest) -> Result<Option<Atomic>> {
        Ok(self.option()?.map(|item| item.atomized(forest)))
    }

    /// Atomize a sequence expected to hold exactly one item.
    pub fn atomized_one(&self, forest: &Forest) -> Result<Atomic> {
        Ok(self.one()?.atomized(forest))
    }

    /// All items as nodes; errors when an atomic is present.
    pub fn nodes(&self) -> Result<Vec<Node>> {
        self.items.iter().map(|item| item.to_node()).collect()
    }

    /// The string value of the whole sequence, items joined by `separator`.
    pub fn string_join(&self, forest: &Forest, separator: &str) -> String {
        self.items
            .iter()
            .map(|item| item.string_value(forest))
            .join(separator)
    }

    /// String value of an empty-or-singleton sequence; empty becomes "".
    pub fn string_value(&self, forest: &Forest) -> Result<String> {
        Ok(self
            .option()?
            .map(|item| item.string_value(forest))
            .unwrap_or_default())
    }

    pub fn contains_node(&self, node: Node) -> bool {
        self.items
            .iter()
            .any(|item| matches!(item, Item::Node(n) if *n == node))
    }
}

impl From<Vec<Item>> for Sequence {
    fn from(items: Vec<Item>) -> Self {
        Sequence { items }
    }
}

impl From<Vec<Node>> for Sequence {
    fn from(nodes: Vec<Node>) -> Self {
        Sequence {
            items: nodes.into_iter().map(Item::Node).collect(),
        }
    }
}

impl From<Atomic> for Sequence {
    fn from(atomic: Atomic) -> Self {
        Sequence::singleton(atomic)
    }
}

impl IntoIterator for Sequence {
    type Item = Item;
    type IntoIter = std::vec::IntoIter<Item>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl FromIterator<Item> for Sequence {
    fn from_iter<I: IntoIterator<Item = Item>>(iter: I) -> Self {
        Sequence {
            items: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_boolean_value() {
        assert!(!Sequence::new().effective_boolean_value().unwrap());
        assert!(Sequence::singleton(true).effective_boolean_value().unwrap());
        assert!(!Sequence::singleton(0i64).effective_boolean_value().unwrap());
        let several: Sequence = vec![Item::from(1i64), Item::from(2i64)].into();
        assert!(several.effective_boolean_value().is_err());
    }

    #[test]
    fn test_node_sequence_is_true() {
        let mut forest = Forest::new();
        let doc = forest.parse("<a/>").unwrap();
        assert!(Sequence::singleton(doc).effective_boolean_value().unwrap());
    }

    #[test]
    fn test_one_and_option() {
        let sequence = Sequence::singleton(1i64);
        assert!(sequence.one().is_ok());
        assert!(Sequence::new().one().is_err());
        assert_eq!(Sequence::new().option().unwrap(), None);
    }
}
