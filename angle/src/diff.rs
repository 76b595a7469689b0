use std::path::PathBuf;

use angle_xml::{Forest, Node, Value};
use clap::Parser;

use crate::common;

#[derive(Debug, Parser)]
pub(crate) struct Diff {
    /// left document (file or url)
    left: PathBuf,
    /// right document (file or url)
    right: PathBuf,
    /// Compare children in document order (default)
    #[arg(long, conflicts_with = "unordered")]
    ordered: bool,
    /// Match children regardless of their order
    #[arg(long)]
    unordered: bool,
    /// Print nothing; only the exit status reports the outcome
    #[arg(short = 'q', long)]
    quiet: bool,
}

impl Diff {
    pub(crate) fn run(&self) -> anyhow::Result<u8> {
        let left_text = common::read_input(Some(&self.left))?;
        let right_text = common::read_input(Some(&self.right))?;
        let mut forest = Forest::new();
        let left = forest.parse(&left_text)?;
        let right = forest.parse(&right_text)?;

        let comparer = Comparer {
            forest: &forest,
            ordered: !self.unordered,
        };
        match comparer.compare(left, right) {
            None => Ok(0),
            Some(difference) => {
                if !self.quiet {
                    common::write_output(None, &difference)?;
                }
                Ok(common::EXIT_UNSATISFIED)
            }
        }
    }
}

struct Comparer<'a> {
    forest: &'a Forest,
    ordered: bool,
}

impl Comparer<'_> {
    /// `None` when equal; otherwise a description of the first difference.
    fn compare(&self, left: Node, right: Node) -> Option<String> {
        let forest = self.forest;
        match (forest.value(left), forest.value(right)) {
            (Value::Document(_), Value::Document(_)) => self.compare_children(left, right),
            (Value::Element(a), Value::Element(b)) => {
                if a.name() != b.name() {
                    return Some(format!(
                        "element name differs at {}: {} vs {}",
                        forest.path(left),
                        a.name(),
                        b.name()
                    ));
                }
                self.compare_attributes(left, right)
                    .or_else(|| self.compare_children(left, right))
            }
            (Value::Text(a), Value::Text(b)) | (Value::Cdata(a), Value::Cdata(b)) => {
                if a.get() != b.get() {
                    Some(format!(
                        "text differs at {}: {:?} vs {:?}",
                        forest.path(left),
                        a.get(),
                        b.get()
                    ))
                } else {
                    None
                }
            }
            (Value::Comment(a), Value::Comment(b)) => {
                if a.get() != b.get() {
                    Some(format!("comment differs at {}", forest.path(left)))
                } else {
                    None
                }
            }
            (Value::ProcessingInstruction(a), Value::ProcessingInstruction(b)) => {
                if a.name() != b.name() || a.data() != b.data() {
                    Some(format!(
                        "processing instruction differs at {}",
                        forest.path(left)
                    ))
                } else {
                    None
                }
            }
            _ => Some(format!(
                "node kind differs at {}: {} vs {}",
                forest.path(left),
                forest.kind(left).as_str(),
                forest.kind(right).as_str()
            )),
        }
    }

    fn compare_attributes(&self, left: Node, right: Node) -> Option<String> {
        let forest = self.forest;
        let left_attrs = forest.attributes(left);
        let right_attrs = forest.attributes(right);
        if left_attrs.len() != right_attrs.len() {
            return Some(format!(
                "attribute count differs at {}: {} vs {}",
                forest.path(left),
                left_attrs.len(),
                right_attrs.len()
            ));
        }
        // attributes are unordered by definition
        for &attr in left_attrs {
            let a = forest.attribute_node(attr)?;
            match forest.attribute(right, a.name()) {
                Some(counterpart) => {
                    let b = forest.attribute_node(counterpart)?;
                    if a.value() != b.value() {
                        return Some(format!(
                            "attribute {} differs at {}: {:?} vs {:?}",
                            a.name(),
                            forest.path(left),
                            a.value(),
                            b.value()
                        ));
                    }
                }
                None => {
                    return Some(format!(
                        "attribute {} missing at {}",
                        a.name(),
                        forest.path(right)
                    ))
                }
            }
        }
        None
    }

    fn compare_children(&self, left: Node, right: Node) -> Option<String> {
        let forest = self.forest;
        let left_children: Vec<Node> = self.significant_children(left);
        let right_children: Vec<Node> = self.significant_children(right);
        if left_children.len() != right_children.len() {
            return Some(format!(
                "child count differs at {}: {} vs {}",
                forest.path(left),
                left_children.len(),
                right_children.len()
            ));
        }
        if self.ordered {
            for (a, b) in left_children.into_iter().zip(right_children) {
                if let Some(difference) = self.compare(a, b) {
                    return Some(difference);
                }
            }
            return None;
        }
        // unordered: greedy matching over the remaining candidates
        let mut remaining = right_children;
        for a in left_children {
            let position = remaining
                .iter()
                .position(|&b| self.compare(a, b).is_none());
            match position {
                Some(index) => {
                    remaining.remove(index);
                }
                None => {
                    return Some(format!(
                        "no matching sibling for {}",
                        forest.path(a)
                    ))
                }
            }
        }
        None
    }

    /// Whitespace-only text is insignificant for comparison.
    fn significant_children(&self, node: Node) -> Vec<Node> {
        self.forest
            .children(node)
            .iter()
            .copied()
            .filter(|&child| match self.forest.value(child) {
                Value::Text(text) => !text.get().trim().is_empty(),
                _ => true,
            })
            .collect()
    }
}
