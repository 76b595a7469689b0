// https://www.w3.org/TR/xpath-functions-31/#sequence-functions

use ahash::{HashSet, HashSetExt};

use crate::atomic::MapKey;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::sequence::{Item, Sequence};

use super::FunctionLibrary;

pub(super) fn register(library: &mut FunctionLibrary) {
    library.register_fn("zero-or-one", 1, Some(1), fn_zero_or_one);
    library.register_fn("one-or-more", 1, Some(1), fn_one_or_more);
    library.register_fn("exactly-one", 1, Some(1), fn_exactly_one);
    library.register_fn("position", 0, Some(0), |_, context, _| {
        Ok(Sequence::singleton(context.position))
    });
    library.register_fn("last", 0, Some(0), |_, context, _| {
        Ok(Sequence::singleton(context.size))
    });
    library.register_fn("exists", 1, Some(1), |_, _, args| {
        Ok(Sequence::singleton(!args[0].is_empty()))
    });
    library.register_fn("empty", 1, Some(1), |_, _, args| {
        Ok(Sequence::singleton(args[0].is_empty()))
    });
    library.register_fn("distinct-values", 1, Some(1), fn_distinct_values);
    library.register_fn("head", 1, Some(1), fn_head);
    library.register_fn("tail", 1, Some(1), fn_tail);
    library.register_fn("reverse", 1, Some(1), fn_reverse);
    // grouping state set up by for-each-group and merge
    library.register_fn("current-group", 0, Some(0), fn_current_group);
    library.register_fn("current-grouping-key", 0, Some(0), fn_current_grouping_key);
    library.register_fn("current-merge-group", 0, Some(1), fn_current_merge_group);
    library.register_fn("current-merge-key", 0, Some(0), fn_current_merge_key);
}

fn fn_zero_or_one(
    _evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    if args[0].len() > 1 {
        return Err(Error::type_error(format!(
            "zero-or-one: found {} items",
            args[0].len()
        )));
    }
    Ok(args[0].clone())
}

fn fn_one_or_more(
    _evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    if args[0].is_empty() {
        return Err(Error::type_error("one-or-more: empty sequence"));
    }
    Ok(args[0].clone())
}

fn fn_exactly_one(
    _evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    if args[0].len() != 1 {
        return Err(Error::type_error(format!(
            "exactly-one: found {} items",
            args[0].len()
        )));
    }
    Ok(args[0].clone())
}

/// First occurrence wins; equality follows the grouping key rules.
fn fn_distinct_values(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let mut seen: HashSet<MapKey> = HashSet::new();
    let mut result = Sequence::new();
    for atomic in args[0].atomized(evaluator.forest) {
        if seen.insert(atomic.map_key()) {
            result.push(atomic);
        }
    }
    Ok(result)
}

fn fn_head(
    _evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    Ok(args[0]
        .first()
        .cloned()
        .map(Sequence::singleton)
        .unwrap_or_default())
}

fn fn_tail(
    _evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    Ok(args[0].items().iter().skip(1).cloned().collect())
}

fn fn_reverse(
    _evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let mut items: Vec<Item> = args[0].items().to_vec();
    items.reverse();
    Ok(items.into_iter().collect())
}

fn fn_current_group(
    evaluator: &mut Evaluator,
    _context: &Context,
    _args: &[Sequence],
) -> Result<Sequence> {
    match evaluator.env.current_group() {
        Some(state) if !state.is_merge => Ok(state.current_group.clone()),
        _ => Err(Error::evaluation(
            crate::error::EvaluationCause::Undefined,
            "current-group() outside for-each-group",
        )),
    }
}

fn fn_current_grouping_key(
    evaluator: &mut Evaluator,
    _context: &Context,
    _args: &[Sequence],
) -> Result<Sequence> {
    match evaluator
        .env
        .current_group()
        .and_then(|state| state.current_grouping_key.clone())
    {
        Some(key) => Ok(Sequence::singleton(key)),
        None => Err(Error::evaluation(
            crate::error::EvaluationCause::Undefined,
            "current-grouping-key() outside for-each-group",
        )),
    }
}

/// With a source name, only that merge source's items of the group.
fn fn_current_merge_group(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let source = match args.first() {
        Some(sequence) => Some(sequence.string_value(evaluator.forest)?),
        None => None,
    };
    let state = evaluator.env.current_group().filter(|state| state.is_merge);
    match state {
        Some(state) => match source {
            Some(name) => Ok(state
                .merge_groups
                .get(&name)
                .cloned()
                .unwrap_or_default()),
            None => Ok(state.current_group.clone()),
        },
        None => Err(Error::evaluation(
            crate::error::EvaluationCause::Undefined,
            "current-merge-group() outside merge",
        )),
    }
}

fn fn_current_merge_key(
    evaluator: &mut Evaluator,
    _context: &Context,
    _args: &[Sequence],
) -> Result<Sequence> {
    match evaluator
        .env
        .current_group()
        .filter(|state| state.is_merge)
        .and_then(|state| state.current_merge_key.clone())
    {
        Some(key) => Ok(Sequence::singleton(key)),
        None => Err(Error::evaluation(
            crate::error::EvaluationCause::Undefined,
            "current-merge-key() outside merge",
        )),
    }
}
