// boolean and node addressing functions

use ahash::{HashSet, HashSetExt};
use angle_xml::Node;

use crate::context::Context;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::sequence::Sequence;

use super::{node_or_context, FunctionLibrary};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.register_fn("true", 0, Some(0), |_, _, _| Ok(Sequence::singleton(true)));
    library.register_fn("false", 0, Some(0), |_, _, _| {
        Ok(Sequence::singleton(false))
    });
    library.register_fn("boolean", 1, Some(1), |_, _, args| {
        Ok(Sequence::singleton(args[0].effective_boolean_value()?))
    });
    library.register_fn("not", 1, Some(1), |_, _, args| {
        Ok(Sequence::singleton(!args[0].effective_boolean_value()?))
    });
    library.register_fn("name", 0, Some(1), fn_name);
    library.register_fn("local-name", 0, Some(1), fn_local_name);
    library.register_fn("root", 0, Some(1), fn_root);
    library.register_fn("path", 0, Some(1), fn_path);
    library.register_fn("has-children", 0, Some(1), fn_has_children);
    library.register_fn("innermost", 1, Some(1), fn_innermost);
    library.register_fn("outermost", 1, Some(1), fn_outermost);
}

fn fn_name(
    evaluator: &mut Evaluator,
    context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let node = node_or_context(context, args, 0)?;
    let name = node
        .and_then(|node| evaluator.forest.name(node))
        .map(|name| name.full_name())
        .unwrap_or_default();
    Ok(Sequence::singleton(name))
}

fn fn_local_name(
    evaluator: &mut Evaluator,
    context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let node = node_or_context(context, args, 0)?;
    let name = node
        .and_then(|node| evaluator.forest.name(node))
        .map(|name| name.local_name().to_string())
        .unwrap_or_default();
    Ok(Sequence::singleton(name))
}

fn fn_root(
    evaluator: &mut Evaluator,
    context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    match node_or_context(context, args, 0)? {
        Some(node) => Ok(Sequence::singleton(evaluator.forest.top(node))),
        None => Ok(Sequence::new()),
    }
}

fn fn_path(
    evaluator: &mut Evaluator,
    context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    match node_or_context(context, args, 0)? {
        Some(node) => Ok(Sequence::singleton(evaluator.forest.path(node))),
        None => Ok(Sequence::new()),
    }
}

fn fn_has_children(
    evaluator: &mut Evaluator,
    context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let result = match node_or_context(context, args, 0)? {
        Some(node) => !evaluator.forest.children(node).is_empty(),
        None => false,
    };
    Ok(Sequence::singleton(result))
}

/// Nodes that have no descendant in the input set.
fn fn_innermost(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let mut nodes = args[0].nodes()?;
    evaluator.forest.sort_document_order(&mut nodes);
    let set: HashSet<Node> = nodes.iter().copied().collect();
    let kept: Vec<Node> = nodes
        .into_iter()
        .filter(|&node| {
            !evaluator
                .forest
                .descendants(node)
                .any(|descendant| set.contains(&descendant))
        })
        .collect();
    Ok(kept.into())
}

/// Nodes that have no ancestor in the input set.
fn fn_outermost(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let mut nodes = args[0].nodes()?;
    evaluator.forest.sort_document_order(&mut nodes);
    let set: HashSet<Node> = nodes.iter().copied().collect();
    let kept: Vec<Node> = nodes
        .into_iter()
        .filter(|&node| {
            !evaluator
                .forest
                .ancestors(node)
                .any(|ancestor| set.contains(&ancestor))
        })
        .collect();
    Ok(kept.into())
}
