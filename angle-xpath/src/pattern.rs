//! Match patterns: XPath expressions evaluated in reverse, asking "does this
//! node satisfy the pattern?".

use angle_name::Namespaces;
use angle_xml::Node;

use crate::ast::{Expr, KindTest, NameTest, NodeTest, PathExpr, PathRoot};
use crate::context::Context;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::parser::{parse, CompileOptions};
use crate::sequence::Item;

/// A compiled match pattern with its declared or syntax-derived priority.
#[derive(Debug, Clone)]
pub struct Pattern {
    expr: Expr,
    declared_priority: Option<f64>,
    default_priority: f64,
}

impl Pattern {
    pub fn parse(text: &str, namespaces: &Namespaces, strict: bool) -> Result<Pattern> {
        let options = CompileOptions {
            strict,
            ..CompileOptions::default()
        };
        let expr = parse(text, namespaces, &options)?;
        let default_priority = default_priority(&expr);
        Ok(Pattern {
            expr,
            declared_priority: None,
            default_priority,
        })
    }

    pub fn with_declared_priority(mut self, priority: Option<f64>) -> Pattern {
        self.declared_priority = priority;
        self
    }

    /// The priority before the depth bonus.
    pub fn base_priority(&self) -> f64 {
        self.declared_priority.unwrap_or(self.default_priority)
    }

    /// Match a candidate node by evaluating the pattern from the candidate
    /// and each of its ancestors; a context whose result contains the
    /// candidate by identity is a match. Returns the distance to the nearest
    /// matching context, which feeds the priority tiebreak.
    pub fn matches(&self, evaluator: &mut Evaluator, candidate: Node) -> Result<Option<usize>> {
        let mut chain = vec![candidate];
        chain.extend(evaluator.forest.ancestors(candidate));
        for (depth, &origin) in chain.iter().enumerate() {
            evaluator.env.cancellation.check()?;
            let context = Context::new(Item::Node(origin));
            let result = evaluator.evaluate(&self.expr, &context)?;
            if result.contains_node(candidate) {
                return Ok(Some(depth));
            }
        }
        Ok(None)
    }

    /// Declared (or default) priority plus the depth bonus.
    pub fn effective_priority(&self, depth: usize) -> f64 {
        self.base_priority() + depth as f64
    }
}

/// Default priorities derived from the pattern's syntax: exact names beat
/// namespace or local wildcards, which beat kind tests and `*`; multi-step
/// and predicated patterns rank above all of those.
fn default_priority(expr: &Expr) -> f64 {
    match expr {
        Expr::Root => -0.5,
        Expr::ContextItem => -1.0,
        Expr::Filter { .. } => 1.0,
        Expr::Path(path) => path_priority(path),
        Expr::Binary { left, right, .. } => {
            default_priority(left).max(default_priority(right))
        }
        Expr::SequenceExpr(exprs) => exprs
            .iter()
            .map(default_priority)
            .fold(f64::NEG_INFINITY, f64::max),
        _ => 0.5,
    }
}

fn path_priority(path: &PathExpr) -> f64 {
    if path.steps.is_empty() {
        return match path.root {
            PathRoot::Document | PathRoot::DocumentDescendant => -0.5,
            _ => 0.5,
        };
    }
    if path.steps.len() > 1 || !matches!(path.root, PathRoot::Relative) {
        return 0.5;
    }
    let step = &path.steps[0];
    if !step.predicates.is_empty() {
        return 0.5;
    }
    match &step.test {
        NodeTest::Name(NameTest::Name(_)) => 0.0,
        NodeTest::Name(NameTest::Namespace(_) | NameTest::LocalName(_)) => -0.25,
        NodeTest::Name(NameTest::Star) => -0.5,
        NodeTest::Kind(KindTest::ProcessingInstruction(Some(_))) => 0.0,
        NodeTest::Kind(KindTest::Element(Some(_)) | KindTest::Attribute(Some(_))) => 0.0,
        NodeTest::Kind(_) => -0.5,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Environment;
    use angle_xml::Forest;

    fn pattern(text: &str) -> Pattern {
        Pattern::parse(text, &Namespaces::default(), false).unwrap()
    }

    #[test]
    fn test_default_priorities() {
        assert_eq!(pattern("foo").base_priority(), 0.0);
        assert_eq!(pattern("*").base_priority(), -0.5);
        assert_eq!(pattern("/").base_priority(), -0.5);
        assert_eq!(pattern("node()").base_priority(), -0.5);
        assert_eq!(pattern("foo[1]").base_priority(), 0.5);
        assert_eq!(pattern("foo/bar").base_priority(), 0.5);
        assert_eq!(pattern("xs:*").base_priority(), -0.25);
    }

    #[test]
    fn test_declared_priority_wins() {
        let p = pattern("*").with_declared_priority(Some(2.0));
        assert_eq!(p.base_priority(), 2.0);
        assert_eq!(p.effective_priority(1), 3.0);
    }

    #[test]
    fn test_matches_by_identity_and_depth() {
        let mut forest = Forest::new();
        let doc = forest.parse("<r><a><c/></a><b><c/></b></r>").unwrap();
        let root = forest.document_element(doc).unwrap();
        let a = forest.children(root)[0];
        let c_in_a = forest.children(a)[0];

        let mut env = Environment::new();
        let mut evaluator = Evaluator::new(&forest, &mut env);

        // "c" matches any c element, from its parent
        assert_eq!(
            pattern("c").matches(&mut evaluator, c_in_a).unwrap(),
            Some(1)
        );
        // "a/c" only matches the c under a, and from deeper up
        assert_eq!(
            pattern("a/c").matches(&mut evaluator, c_in_a).unwrap(),
            Some(2)
        );
        let b = forest.children(root)[1];
        let c_in_b = forest.children(b)[0];
        assert_eq!(
            pattern("a/c").matches(&mut evaluator, c_in_b).unwrap(),
            None
        );
        // "/" matches the document itself
        assert_eq!(pattern("/").matches(&mut evaluator, doc).unwrap(), Some(0));
    }

    #[test]
    fn test_attribute_pattern() {
        let mut forest = Forest::new();
        let doc = forest.parse(r#"<r><n k="v"/></r>"#).unwrap();
        let root = forest.document_element(doc).unwrap();
        let n = forest.children(root)[0];
        let attr = forest.attributes(n)[0];

        let mut env = Environment::new();
        let mut evaluator = Evaluator::new(&forest, &mut env);
        assert_eq!(
            pattern("@k").matches(&mut evaluator, attr).unwrap(),
            Some(1)
        );
        assert_eq!(pattern("@k").matches(&mut evaluator, n).unwrap(), None);
    }
}
