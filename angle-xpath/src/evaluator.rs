use ahash::{HashSet, HashSetExt};
use angle_xml::{Forest, Node, NodeKind, Value};

use crate::ast::{
    Axis, BinaryOp, Binding, Expr, KindTest, Literal, NameTest, NodeTest, PathExpr, PathRoot,
    PrincipalNodeKind,
};
use crate::atomic::{compare_atomics, op_arithmetic, op_unary_minus, ArithOp, Atomic};
use crate::context::{Context, Environment};
use crate::error::{Error, Result};
use crate::sequence::{Item, Sequence};
use crate::types::XdmType;

/// Walks an expression tree against a context and environment.
///
/// The evaluator never mutates the forest; it holds plain node ids and owned
/// atomics only.
pub struct Evaluator<'a> {
    pub forest: &'a Forest,
    pub env: &'a mut Environment,
}

impl<'a> Evaluator<'a> {
    pub fn new(forest: &'a Forest, env: &'a mut Environment) -> Self {
        Evaluator { forest, env }
    }

    pub fn evaluate(&mut self, expr: &Expr, context: &Context) -> Result<Sequence> {
        match expr {
            Expr::Literal(literal) => Ok(Sequence::singleton(match literal {
                Literal::String(s) => Atomic::from(s.as_str()),
                Literal::Integer(i) => Atomic::Integer(*i),
                Literal::Decimal(d) => Atomic::Decimal(*d),
            })),
            Expr::ContextItem => Ok(Sequence::singleton(context.item.clone())),
            Expr::Root => {
                let node = context.node()?;
                Ok(Sequence::singleton(self.forest.top(node)))
            }
            Expr::Path(path) => self.eval_path(path, context),
            Expr::Filter { base, predicates } => {
                let items: Vec<Item> = self.evaluate(base, context)?.into_iter().collect();
                let filtered = self.apply_predicates(items, predicates)?;
                Ok(filtered.into_iter().collect())
            }
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, context),
            Expr::Negate(operand) => {
                let value = self.evaluate(operand, context)?;
                match value.atomized_option(self.forest)? {
                    None => Ok(Sequence::new()),
                    Some(atomic) => Ok(Sequence::singleton(op_unary_minus(&atomic)?)),
                }
            }
            Expr::SequenceExpr(exprs) => {
                let mut result = Sequence::new();
                for expr in exprs {
                    result.extend(self.evaluate(expr, context)?);
                }
                Ok(result)
            }
            Expr::If {
                condition,
                then,
                otherwise,
            } => {
                let test = self.evaluate(condition, context)?.effective_boolean_value()?;
                if test {
                    self.evaluate(then, context)
                } else {
                    self.evaluate(otherwise, context)
                }
            }
            Expr::Let { bindings, body } => {
                self.env.push_scope();
                let result = self.eval_let(bindings, body, context);
                self.env.pop_scope();
                result
            }
            Expr::For { bindings, body } => {
                self.env.push_scope();
                let mut result = Sequence::new();
                let outcome = self.eval_for(bindings, 0, body, context, &mut result);
                self.env.pop_scope();
                outcome.map(|()| result)
            }
            Expr::Quantified {
                every,
                bindings,
                satisfies,
            } => {
                self.env.push_scope();
                let outcome = self.eval_quantified(bindings, 0, satisfies, *every, context);
                self.env.pop_scope();
                Ok(Sequence::singleton(outcome?))
            }
            Expr::Call { name, args } => {
                self.env.cancellation.check()?;
                let implementation = self.env.functions.resolve(name, args.len())?;
                let mut arguments = Vec::with_capacity(args.len());
                for arg in args {
                    arguments.push(self.evaluate(arg, context)?);
                }
                implementation(self, context, &arguments)
            }
            Expr::VarRef(name) => self.env.lookup(name).cloned(),
            Expr::Cast {
                expr,
                target,
                optional,
            } => {
                let value = self.evaluate(expr, context)?;
                match value.atomized_option(self.forest)? {
                    None if *optional => Ok(Sequence::new()),
                    None => Err(Error::cast("cannot cast an empty sequence")),
                    Some(atomic) => Ok(Sequence::singleton(atomic.cast_to(*target)?)),
                }
            }
            Expr::Castable {
                expr,
                target,
                optional,
            } => {
                let value = self.evaluate(expr, context)?;
                let castable = match value.items() {
                    [] => *optional,
                    [item] => item.atomized(self.forest).castable_to(*target),
                    _ => false,
                };
                Ok(Sequence::singleton(castable))
            }
            Expr::InstanceOf {
                expr,
                target,
                optional,
            } => {
                let value = self.evaluate(expr, context)?;
                let result = match value.items() {
                    [] => *optional,
                    [item] => item_instance_of(item, *target),
                    _ => false,
                };
                Ok(Sequence::singleton(result))
            }
        }
    }

    fn eval_let(&mut self, bindings: &[Binding], body: &Expr, context: &Context) -> Result<Sequence> {
        for binding in bindings {
            let value = self.evaluate(&binding.expr, context)?;
            self.env.define(binding.name.clone(), value);
        }
        self.evaluate(body, context)
    }

    fn eval_for(
        &mut self,
        bindings: &[Binding],
        index: usize,
        body: &Expr,
        context: &Context,
        result: &mut Sequence,
    ) -> Result<()> {
        if index == bindings.len() {
            result.extend(self.evaluate(body, context)?);
            return Ok(());
        }
        let binding = &bindings[index];
        let sequence = self.evaluate(&binding.expr, context)?;
        for item in sequence {
            self.env.cancellation.check()?;
            self.env
                .define(binding.name.clone(), Sequence::singleton(item));
            self.eval_for(bindings, index + 1, body, context, result)?;
        }
        Ok(())
    }

    /// Lazy cross-product for `some`/`every`: stop at the first witness
    /// (`some`) or the first counterexample (`every`).
    fn eval_quantified(
        &mut self,
        bindings: &[Binding],
        index: usize,
        satisfies: &Expr,
        every: bool,
        context: &Context,
    ) -> Result<bool> {
        if index == bindings.len() {
            return self.evaluate(satisfies, context)?.effective_boolean_value();
        }
        let binding = &bindings[index];
        let sequence = self.evaluate(&binding.expr, context)?;
        for item in sequence {
            self.env.cancellation.check()?;
            self.env
                .define(binding.name.clone(), Sequence::singleton(item));
            let outcome = self.eval_quantified(bindings, index + 1, satisfies, every, context)?;
            if outcome != every {
                return Ok(!every);
            }
        }
        Ok(every)
    }

    // --- paths and axes

    fn eval_path(&mut self, path: &PathExpr, context: &Context) -> Result<Sequence> {
        let mut nodes: Vec<Node> = match &path.root {
            PathRoot::Document => vec![self.forest.top(context.node()?)],
            PathRoot::DocumentDescendant => {
                let top = self.forest.top(context.node()?);
                let mut nodes = vec![top];
                nodes.extend(self.forest.descendants(top));
                nodes
            }
            PathRoot::Relative => vec![context.node()?],
            PathRoot::Expr(expr) => {
                let mut nodes = self.evaluate(expr, context)?.nodes()?;
                self.forest.sort_document_order(&mut nodes);
                nodes
            }
        };
        for step in &path.steps {
            self.env.cancellation.check()?;
            let mut output: Vec<Node> = Vec::new();
            for &origin in &nodes {
                let candidates = self.axis_nodes(step.axis, &step.test, origin);
                let kept = self.apply_predicates_nodes(candidates, &step.predicates)?;
                output.extend(kept);
            }
            self.forest.sort_document_order(&mut output);
            nodes = output;
        }
        Ok(nodes.into())
    }

    /// Nodes of an axis from `origin`, in document order, with the node test
    /// applied.
    pub fn axis_nodes(&mut self, axis: Axis, test: &NodeTest, origin: Node) -> Vec<Node> {
        let forest = self.forest;
        let nodes: Vec<Node> = match axis {
            Axis::Child => forest.children(origin).to_vec(),
            Axis::Parent => forest.parent(origin).into_iter().collect(),
            Axis::SelfAxis => vec![origin],
            Axis::Ancestor => forest.ancestors_in_document_order(origin),
            Axis::AncestorOrSelf => {
                let mut nodes = forest.ancestors_in_document_order(origin);
                nodes.push(origin);
                nodes
            }
            Axis::Descendant => forest.descendants(origin).collect(),
            Axis::DescendantOrSelf => {
                let mut nodes = vec![origin];
                nodes.extend(forest.descendants(origin));
                nodes
            }
            Axis::FollowingSibling => forest.following_siblings(origin).collect(),
            Axis::PrecedingSibling => forest.preceding_siblings(origin).collect(),
            Axis::Following => forest.following(origin),
            Axis::Preceding => forest.preceding(origin),
            // the attribute axis skips namespace declarations
            Axis::Attribute => forest
                .attributes(origin)
                .iter()
                .copied()
                .filter(|&a| {
                    forest
                        .attribute_node(a)
                        .map(|attr| !attr.is_namespace_declaration())
                        .unwrap_or(false)
                })
                .collect(),
        };
        nodes
            .into_iter()
            .filter(|&node| node_test_matches(forest, axis, test, node))
            .collect()
    }

    // --- predicates

    fn apply_predicates_nodes(
        &mut self,
        nodes: Vec<Node>,
        predicates: &[Expr],
    ) -> Result<Vec<Node>> {
        if predicates.is_empty() {
            return Ok(nodes);
        }
        let items: Vec<Item> = nodes.into_iter().map(Item::Node).collect();
        let kept = self.apply_predicates(items, predicates)?;
        kept.into_iter().map(|item| item.to_node()).collect()
    }

    /// Filter items through each predicate in turn. Position and size are
    /// relative to the sequence as filtered so far.
    fn apply_predicates(&mut self, items: Vec<Item>, predicates: &[Expr]) -> Result<Vec<Item>> {
        let mut current = items;
        for predicate in predicates {
            let size = current.len();
            let mut kept = Vec::new();
            for (index, item) in current.into_iter().enumerate() {
                self.env.cancellation.check()?;
                let context = Context::with_focus(item.clone(), index + 1, size);
                let result = self.evaluate(predicate, &context)?;
                if self.predicate_keeps(&result, index + 1, size)? {
                    kept.push(item);
                }
            }
            current = kept;
        }
        Ok(current)
    }

    /// Decide whether one predicate result keeps the item at `position`.
    /// Numeric results select by index (negative wraps from the end),
    /// booleans and node sequences use their effective boolean value, other
    /// atomics are errors.
    fn predicate_keeps(&self, result: &Sequence, position: usize, size: usize) -> Result<bool> {
        match result.items() {
            [] => Ok(false),
            [Item::Atomic(atomic)] if atomic.is_numeric() => {
                let value = atomic.as_f64().expect("numeric atomic");
                if value != value.trunc() {
                    return Ok(false);
                }
                let selected = value as i64;
                let wanted = if selected < 0 {
                    size as i64 + selected + 1
                } else {
                    selected
                };
                Ok(wanted == position as i64)
            }
            [Item::Atomic(Atomic::Boolean(b))] => Ok(*b),
            [Item::Atomic(atomic)] => Err(Error::type_error(format!(
                "a {} predicate selects nothing",
                atomic.type_label()
            ))),
            _ => result.effective_boolean_value(),
        }
    }

    // --- binary operators

    fn eval_binary(
        &mut self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        context: &Context,
    ) -> Result<Sequence> {
        match op {
            BinaryOp::Or => {
                let value = self.evaluate(left, context)?.effective_boolean_value()?
                    || self.evaluate(right, context)?.effective_boolean_value()?;
                Ok(Sequence::singleton(value))
            }
            BinaryOp::And => {
                let value = self.evaluate(left, context)?.effective_boolean_value()?
                    && self.evaluate(right, context)?.effective_boolean_value()?;
                Ok(Sequence::singleton(value))
            }
            BinaryOp::GeneralEq
            | BinaryOp::GeneralNe
            | BinaryOp::GeneralLt
            | BinaryOp::GeneralLe
            | BinaryOp::GeneralGt
            | BinaryOp::GeneralGe => {
                let lhs = self.evaluate(left, context)?.atomized(self.forest);
                let rhs = self.evaluate(right, context)?.atomized(self.forest);
                for a in &lhs {
                    for b in &rhs {
                        self.env.cancellation.check()?;
                        if comparison_matches(op, a, b)? {
                            return Ok(Sequence::singleton(true));
                        }
                    }
                }
                Ok(Sequence::singleton(false))
            }
            BinaryOp::ValueEq
            | BinaryOp::ValueNe
            | BinaryOp::ValueLt
            | BinaryOp::ValueLe
            | BinaryOp::ValueGt
            | BinaryOp::ValueGe => {
                let lhs = self.evaluate(left, context)?.atomized_option(self.forest)?;
                let rhs = self.evaluate(right, context)?.atomized_option(self.forest)?;
                match (lhs, rhs) {
                    (Some(a), Some(b)) => {
                        Ok(Sequence::singleton(comparison_matches(op, &a, &b)?))
                    }
                    _ => Ok(Sequence::new()),
                }
            }
            BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply | BinaryOp::Divide
            | BinaryOp::Modulo => {
                let lhs = self.evaluate(left, context)?.atomized_option(self.forest)?;
                let rhs = self.evaluate(right, context)?.atomized_option(self.forest)?;
                match (lhs, rhs) {
                    (Some(a), Some(b)) => {
                        let arith = match op {
                            BinaryOp::Add => ArithOp::Add,
                            BinaryOp::Subtract => ArithOp::Subtract,
                            BinaryOp::Multiply => ArithOp::Multiply,
                            BinaryOp::Divide => ArithOp::Divide,
                            _ => ArithOp::Modulo,
                        };
                        Ok(Sequence::singleton(op_arithmetic(arith, &a, &b)?))
                    }
                    _ => Ok(Sequence::new()),
                }
            }
            BinaryOp::Concat => {
                let lhs = self.evaluate(left, context)?.string_value(self.forest)?;
                let rhs = self.evaluate(right, context)?.string_value(self.forest)?;
                Ok(Sequence::singleton(format!("{}{}", lhs, rhs)))
            }
            BinaryOp::Range => {
                let lhs = self.evaluate(left, context)?.atomized_option(self.forest)?;
                let rhs = self.evaluate(right, context)?.atomized_option(self.forest)?;
                match (lhs, rhs) {
                    (Some(a), Some(b)) => {
                        let start = match a.cast_to(XdmType::Integer)? {
                            Atomic::Integer(i) => i,
                            _ => unreachable!("integer cast yields an integer"),
                        };
                        let end = match b.cast_to(XdmType::Integer)? {
                            Atomic::Integer(i) => i,
                            _ => unreachable!("integer cast yields an integer"),
                        };
                        let mut result = Sequence::new();
                        for value in start..=end {
                            result.push(value);
                        }
                        Ok(result)
                    }
                    _ => Ok(Sequence::new()),
                }
            }
            BinaryOp::Union => {
                let mut nodes = self.evaluate(left, context)?.nodes()?;
                nodes.extend(self.evaluate(right, context)?.nodes()?);
                self.forest.sort_document_order(&mut nodes);
                Ok(nodes.into())
            }
            BinaryOp::Intersect => {
                let lhs = self.evaluate(left, context)?.nodes()?;
                let rhs: HashSet<Node> =
                    self.evaluate(right, context)?.nodes()?.into_iter().collect();
                let mut nodes: Vec<Node> =
                    lhs.into_iter().filter(|node| rhs.contains(node)).collect();
                self.forest.sort_document_order(&mut nodes);
                Ok(nodes.into())
            }
            BinaryOp::Except => {
                let lhs = self.evaluate(left, context)?.nodes()?;
                let rhs: HashSet<Node> =
                    self.evaluate(right, context)?.nodes()?.into_iter().collect();
                let mut nodes: Vec<Node> =
                    lhs.into_iter().filter(|node| !rhs.contains(node)).collect();
                self.forest.sort_document_order(&mut nodes);
                Ok(nodes.into())
            }
        }
    }
}

fn item_instance_of(item: &Item, target: XdmType) -> bool {
    match item {
        Item::Node(_) => XdmType::Node.is_subtype_of(target),
        Item::Atomic(atomic) => atomic.xdm_type().is_subtype_of(target),
    }
}

fn comparison_matches(op: BinaryOp, a: &Atomic, b: &Atomic) -> Result<bool> {
    use std::cmp::Ordering;
    let ordering = compare_atomics(a, b)?;
    Ok(match ordering {
        // incomparable (NaN): only != holds
        None => matches!(op, BinaryOp::GeneralNe | BinaryOp::ValueNe),
        Some(ordering) => match op {
            BinaryOp::GeneralEq | BinaryOp::ValueEq => ordering == Ordering::Equal,
            BinaryOp::GeneralNe | BinaryOp::ValueNe => ordering != Ordering::Equal,
            BinaryOp::GeneralLt | BinaryOp::ValueLt => ordering == Ordering::Less,
            BinaryOp::GeneralLe | BinaryOp::ValueLe => ordering != Ordering::Greater,
            BinaryOp::GeneralGt | BinaryOp::ValueGt => ordering == Ordering::Greater,
            BinaryOp::GeneralGe | BinaryOp::ValueGe => ordering != Ordering::Less,
            _ => unreachable!("not a comparison operator"),
        },
    })
}

/// Apply a node test, honoring the axis' principal node kind.
pub fn node_test_matches(forest: &Forest, axis: Axis, test: &NodeTest, node: Node) -> bool {
    match test {
        NodeTest::Name(name_test) => {
            let kind_matches = match axis.principal_node_kind() {
                PrincipalNodeKind::Element => forest.kind(node) == NodeKind::Element,
                PrincipalNodeKind::Attribute => forest.kind(node) == NodeKind::Attribute,
            };
            if !kind_matches {
                return false;
            }
            let name = forest.name(node).expect("elements and attributes are named");
            match name_test {
                NameTest::Name(wanted) => name == wanted,
                NameTest::Star => true,
                NameTest::Namespace(uri) => name.uri() == Some(uri.as_str()),
                NameTest::LocalName(local) => name.local_name() == local,
            }
        }
        NodeTest::Kind(kind_test) => kind_test_matches(forest, kind_test, node),
    }
}

fn kind_test_matches(forest: &Forest, test: &KindTest, node: Node) -> bool {
    match test {
        KindTest::Node => true,
        KindTest::Text => matches!(forest.kind(node), NodeKind::Text | NodeKind::Cdata),
        KindTest::Comment => forest.kind(node) == NodeKind::Comment,
        KindTest::Document => forest.kind(node) == NodeKind::Document,
        KindTest::ProcessingInstruction(target) => match forest.value(node) {
            Value::ProcessingInstruction(pi) => target
                .as_ref()
                .map(|wanted| pi.name() == wanted)
                .unwrap_or(true),
            _ => false,
        },
        KindTest::Element(name) => {
            forest.kind(node) == NodeKind::Element
                && name
                    .as_ref()
                    .map(|wanted| forest.name(node) == Some(wanted))
                    .unwrap_or(true)
        }
        KindTest::Attribute(name) => {
            forest.kind(node) == NodeKind::Attribute
                && name
                    .as_ref()
                    .map(|wanted| forest.name(node) == Some(wanted))
                    .unwrap_or(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse, CompileOptions};
    use angle_name::Namespaces;

    fn eval(doc_text: &str, query: &str) -> (Forest, Sequence) {
        let mut forest = Forest::new();
        let doc = forest.parse(doc_text).unwrap();
        let expr = parse(query, &Namespaces::default(), &CompileOptions::default()).unwrap();
        let mut env = Environment::new();
        let mut evaluator = Evaluator::new(&forest, &mut env);
        let result = evaluator.evaluate(&expr, &Context::new(doc)).unwrap();
        (forest, result)
    }

    #[test]
    fn test_path_child() {
        let (forest, result) = eval("<r><n>1</n><n>2</n></r>", "/r/n");
        assert_eq!(result.len(), 2);
        assert_eq!(result.string_join(&forest, ","), "1,2");
    }

    #[test]
    fn test_descendants_once_each_in_document_order() {
        let (forest, result) = eval("<a><b><c/></b><b><c/><c/></b></a>", "//*");
        let names: Vec<String> = result
            .iter()
            .map(|item| {
                let node = item.to_node().unwrap();
                forest.name(node).unwrap().local_name().to_string()
            })
            .collect();
        assert_eq!(names, vec!["a", "b", "c", "b", "c", "c"]);
    }

    #[test]
    fn test_positional_predicates() {
        let (forest, result) = eval("<r><n>1</n><n>2</n><n>3</n></r>", "/r/n[2]");
        assert_eq!(result.string_join(&forest, ","), "2");
        let (forest, result) = eval("<r><n>1</n><n>2</n><n>3</n></r>", "/r/n[-1]");
        assert_eq!(result.string_join(&forest, ","), "3");
        let (forest, result) = eval("<r><n>1</n><n>2</n><n>3</n></r>", "/r/n[position() > 1]");
        assert_eq!(result.string_join(&forest, ","), "2,3");
    }

    #[test]
    fn test_string_predicate_errors() {
        let mut forest = Forest::new();
        let doc = forest.parse("<r><n/></r>").unwrap();
        let expr = parse(
            "/r/n['x']",
            &Namespaces::default(),
            &CompileOptions::default(),
        )
        .unwrap();
        let mut env = Environment::new();
        let mut evaluator = Evaluator::new(&forest, &mut env);
        let err = evaluator.evaluate(&expr, &Context::new(doc)).unwrap_err();
        assert_eq!(err.cause(), Some(crate::EvaluationCause::Type));
    }

    #[test]
    fn test_attribute_axis() {
        let (forest, result) = eval(r#"<r><n k="a"/><n k="b"/></r>"#, "/r/n/@k");
        assert_eq!(result.string_join(&forest, ","), "a,b");
        // namespace declarations are not attributes on the attribute axis
        let (_, result) = eval(r#"<r xmlns:x="urn:n" k="v"/>"#, "/r/@*");
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_union_dedups_by_identity() {
        let (_, result) = eval("<r><a/><b/></r>", "/r/a | /r/* | /r/b");
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_intersect_except() {
        let (forest, result) = eval("<r><a/><b/><c/></r>", "/r/* except /r/b");
        let names: Vec<String> = result
            .iter()
            .map(|item| {
                forest
                    .name(item.to_node().unwrap())
                    .unwrap()
                    .local_name()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["a", "c"]);
        let (_, result) = eval("<r><a/><b/><c/></r>", "(/r/a | /r/b) intersect (/r/b | /r/c)");
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_arithmetic_and_division_by_zero() {
        let (forest, result) = eval("<r/>", "1 + 2 * 3");
        assert_eq!(result.string_join(&forest, ","), "7");
        let mut forest = Forest::new();
        let doc = forest.parse("<r/>").unwrap();
        let expr = parse(
            "1 div 0",
            &Namespaces::default(),
            &CompileOptions::default(),
        )
        .unwrap();
        let mut env = Environment::new();
        let mut evaluator = Evaluator::new(&forest, &mut env);
        let err = evaluator.evaluate(&expr, &Context::new(doc)).unwrap_err();
        assert_eq!(err.cause(), Some(crate::EvaluationCause::Zero));
    }

    #[test]
    fn test_general_comparison_atomizes() {
        let (_, result) = eval("<r><n>1</n><n>2</n></r>", "/r/n = 2");
        assert!(result.effective_boolean_value().unwrap());
        let (_, result) = eval("<r><n>1</n><n>2</n></r>", "/r/n = 5");
        assert!(!result.effective_boolean_value().unwrap());
    }

    #[test]
    fn test_value_comparison_requires_singleton() {
        let mut forest = Forest::new();
        let doc = forest.parse("<r><n>1</n><n>2</n></r>").unwrap();
        let expr = parse(
            "/r/n eq 1",
            &Namespaces::default(),
            &CompileOptions::default(),
        )
        .unwrap();
        let mut env = Environment::new();
        let mut evaluator = Evaluator::new(&forest, &mut env);
        assert!(evaluator.evaluate(&expr, &Context::new(doc)).is_err());
    }

    #[test]
    fn test_quantified() {
        let (_, result) = eval("<r/>", "some $x in (1, 2, 3) satisfies $x mod 2 = 0");
        assert!(result.effective_boolean_value().unwrap());
        let (_, result) = eval("<r/>", "every $x in (1, 2, 3) satisfies $x > 0");
        assert!(result.effective_boolean_value().unwrap());
        let (_, result) = eval("<r/>", "every $x in (1, 2, 3) satisfies $x > 1");
        assert!(!result.effective_boolean_value().unwrap());
    }

    #[test]
    fn test_let_and_for() {
        let (forest, result) = eval("<r/>", "let $x := 2 return $x * 3");
        assert_eq!(result.string_join(&forest, ","), "6");
        let (forest, result) = eval("<r/>", "for $x in (1, 2), $y in (10, 20) return $x * $y");
        assert_eq!(result.string_join(&forest, ","), "10,20,20,40");
    }

    #[test]
    fn test_range_and_filter() {
        let (forest, result) = eval("<r/>", "(1 to 5)[. mod 2 = 1]");
        assert_eq!(result.string_join(&forest, ","), "1,3,5");
    }

    #[test]
    fn test_concat_operator() {
        let (forest, result) = eval("<r><a>x</a></r>", "/r/a || '-' || 'y'");
        assert_eq!(result.string_join(&forest, ","), "x-y");
    }

    #[test]
    fn test_cast_and_instance() {
        let (_, result) = eval("<r/>", "'4' cast as xs:integer");
        assert_eq!(result.one().unwrap().to_atomic().unwrap(), Atomic::Integer(4));
        let (_, result) = eval("<r/>", "'x' castable as xs:integer");
        assert!(!result.effective_boolean_value().unwrap());
        let (_, result) = eval("<r/>", "3 instance of xs:decimal");
        assert!(result.effective_boolean_value().unwrap());
    }

    #[test]
    fn test_if_else() {
        let (forest, result) = eval("<r><n>5</n></r>", "if (/r/n > 3) then 'big' else 'small'");
        assert_eq!(result.string_join(&forest, ","), "big");
    }

    #[test]
    fn test_parent_and_ancestor() {
        let (forest, result) = eval("<r><a><c/></a></r>", "//c/ancestor::*");
        let names: Vec<String> = result
            .iter()
            .map(|item| {
                forest
                    .name(item.to_node().unwrap())
                    .unwrap()
                    .local_name()
                    .to_string()
            })
            .collect();
        assert_eq!(names, vec!["r", "a"]);
        let (forest, result) = eval("<r><a><c/></a></r>", "//c/..");
        assert_eq!(
            forest
                .name(result.one().unwrap().to_node().unwrap())
                .unwrap()
                .local_name(),
            "a"
        );
    }

    #[test]
    fn test_unbound_variable_errors() {
        let mut forest = Forest::new();
        let doc = forest.parse("<r/>").unwrap();
        let expr = parse("$nope", &Namespaces::default(), &CompileOptions::default()).unwrap();
        let mut env = Environment::new();
        let mut evaluator = Evaluator::new(&forest, &mut env);
        let err = evaluator.evaluate(&expr, &Context::new(doc)).unwrap_err();
        assert_eq!(err.cause(), Some(crate::EvaluationCause::Undefined));
    }

    #[test]
    fn test_cancellation_unwinds() {
        let mut forest = Forest::new();
        let doc = forest.parse("<r><n/><n/></r>").unwrap();
        let expr = parse("//n", &Namespaces::default(), &CompileOptions::default()).unwrap();
        let mut env = Environment::new();
        env.cancellation.cancel();
        let mut evaluator = Evaluator::new(&forest, &mut env);
        assert_eq!(
            evaluator.evaluate(&expr, &Context::new(doc)),
            Err(Error::Cancelled)
        );
    }
}
