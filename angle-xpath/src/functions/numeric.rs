// https://www.w3.org/TR/xpath-functions-31/#numeric-functions

use crate::atomic::Atomic;
use crate::context::Context;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::sequence::Sequence;
use crate::types::XdmType;

use super::{string_or_context, FunctionLibrary};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.register_fn("sum", 1, Some(2), fn_sum);
    library.register_fn("count", 1, Some(1), fn_count);
    library.register_fn("avg", 1, Some(1), fn_avg);
    library.register_fn("min", 1, Some(1), fn_min);
    library.register_fn("max", 1, Some(1), fn_max);
    library.register_fn("round", 1, Some(1), fn_round);
    library.register_fn("floor", 1, Some(1), fn_floor);
    library.register_fn("ceiling", 1, Some(1), fn_ceiling);
    library.register_fn("number", 0, Some(1), fn_number);
    library.register_fn("abs", 1, Some(1), fn_abs);
    library.register_fn("decimal", 1, Some(1), fn_decimal);
}

fn numbers(evaluator: &Evaluator, sequence: &Sequence) -> Result<Vec<f64>> {
    sequence
        .atomized(evaluator.forest)
        .iter()
        .map(|atomic| atomic.to_number())
        .collect()
}

/// Keep integer results integral when every operand was an integer.
fn numeric(value: f64, integral: bool) -> Atomic {
    if integral && value == value.trunc() && value.abs() < 9e15 {
        Atomic::Integer(value as i64)
    } else {
        Atomic::Decimal(value)
    }
}

fn all_integers(evaluator: &Evaluator, sequence: &Sequence) -> bool {
    sequence
        .atomized(evaluator.forest)
        .iter()
        .all(|atomic| matches!(atomic, Atomic::Integer(_)))
}

fn fn_sum(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    if args[0].is_empty() {
        // the default for an empty sequence is zero unless overridden
        return match args.get(1) {
            Some(fallback) => Ok(fallback.clone()),
            None => Ok(Sequence::singleton(0i64)),
        };
    }
    let values = numbers(evaluator, &args[0])?;
    let total: f64 = values.iter().sum();
    Ok(Sequence::singleton(numeric(
        total,
        all_integers(evaluator, &args[0]),
    )))
}

fn fn_count(
    _evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    Ok(Sequence::singleton(args[0].len()))
}

fn fn_avg(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    if args[0].is_empty() {
        return Ok(Sequence::new());
    }
    let values = numbers(evaluator, &args[0])?;
    let total: f64 = values.iter().sum();
    Ok(Sequence::singleton(Atomic::Decimal(
        total / values.len() as f64,
    )))
}

fn fn_min(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    extreme(evaluator, &args[0], false)
}

fn fn_max(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    extreme(evaluator, &args[0], true)
}

/// Numeric when every member converts; otherwise falls back to string
/// comparison.
fn extreme(evaluator: &Evaluator, sequence: &Sequence, want_max: bool) -> Result<Sequence> {
    if sequence.is_empty() {
        return Ok(Sequence::new());
    }
    let atomized = sequence.atomized(evaluator.forest);
    if let Ok(values) = atomized
        .iter()
        .map(|atomic| atomic.to_number())
        .collect::<Result<Vec<f64>>>()
    {
        let integral = atomized
            .iter()
            .all(|atomic| matches!(atomic, Atomic::Integer(_)));
        let chosen = values
            .into_iter()
            .reduce(|a, b| {
                if (b > a) == want_max {
                    b
                } else {
                    a
                }
            })
            .expect("sequence is not empty");
        return Ok(Sequence::singleton(numeric(chosen, integral)));
    }
    let strings: Vec<String> = atomized.iter().map(|atomic| atomic.string_value()).collect();
    let chosen = strings
        .into_iter()
        .reduce(|a, b| if (b > a) == want_max { b } else { a })
        .expect("sequence is not empty");
    Ok(Sequence::singleton(chosen))
}

fn fn_round(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    unary_numeric(evaluator, args, |value| {
        // half rounds toward positive infinity
        (value + 0.5).floor()
    })
}

fn fn_floor(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    unary_numeric(evaluator, args, f64::floor)
}

fn fn_ceiling(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    unary_numeric(evaluator, args, f64::ceil)
}

fn fn_abs(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    unary_numeric(evaluator, args, f64::abs)
}

fn unary_numeric(
    evaluator: &Evaluator,
    args: &[Sequence],
    op: impl Fn(f64) -> f64,
) -> Result<Sequence> {
    match args[0].atomized_option(evaluator.forest)? {
        None => Ok(Sequence::new()),
        Some(atomic) => {
            let value = op(atomic.to_number()?);
            let integral = matches!(atomic, Atomic::Integer(_)) || value == value.trunc();
            Ok(Sequence::singleton(numeric(value, integral)))
        }
    }
}

/// Unlike arithmetic, `number()` yields NaN instead of erroring.
fn fn_number(
    evaluator: &mut Evaluator,
    context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    if let Some(sequence) = args.first() {
        if let Some(atomic) = sequence.atomized_option(evaluator.forest)? {
            if let Some(value) = atomic.as_f64() {
                return Ok(Sequence::singleton(Atomic::Decimal(value)));
            }
        }
    }
    let text = string_or_context(evaluator, context, args, 0)?;
    let value = text.trim().parse::<f64>().unwrap_or(f64::NAN);
    Ok(Sequence::singleton(Atomic::Decimal(value)))
}

fn fn_decimal(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    match args[0].atomized_option(evaluator.forest)? {
        None => Ok(Sequence::new()),
        Some(atomic) => Ok(Sequence::singleton(atomic.cast_to(XdmType::Decimal)?)),
    }
}
