// https://www.w3.org/TR/xpath-functions-31/#string-functions

use std::cmp::Ordering;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::sequence::Sequence;

use super::{number_arg, string_arg, string_or_context, FunctionLibrary};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.register_fn("string", 0, Some(1), fn_string);
    library.register_fn("compare", 2, Some(2), fn_compare);
    library.register_fn("concat", 2, None, fn_concat);
    library.register_fn("string-join", 1, Some(2), fn_string_join);
    library.register_fn("substring", 2, Some(3), fn_substring);
    library.register_fn("string-length", 0, Some(1), fn_string_length);
    library.register_fn("normalize-space", 0, Some(1), fn_normalize_space);
    library.register_fn("upper-case", 1, Some(1), fn_upper_case);
    library.register_fn("lower-case", 1, Some(1), fn_lower_case);
    library.register_fn("translate", 3, Some(3), fn_translate);
    library.register_fn("contains", 2, Some(2), fn_contains);
    library.register_fn("starts-with", 2, Some(2), fn_starts_with);
    library.register_fn("ends-with", 2, Some(2), fn_ends_with);
    library.register_fn("substring-before", 2, Some(2), fn_substring_before);
    library.register_fn("substring-after", 2, Some(2), fn_substring_after);
    library.register_fn("tokenize", 1, Some(2), fn_tokenize);
    library.register_fn("matches", 2, Some(2), fn_matches);
}

fn fn_string(
    evaluator: &mut Evaluator,
    context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let value = string_or_context(evaluator, context, args, 0)?;
    Ok(Sequence::singleton(value))
}

fn fn_compare(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    if args[0].is_empty() || args[1].is_empty() {
        return Ok(Sequence::new());
    }
    let a = string_arg(evaluator, args, 0)?;
    let b = string_arg(evaluator, args, 1)?;
    let ordering = match a.cmp(&b) {
        Ordering::Less => -1i64,
        Ordering::Equal => 0,
        Ordering::Greater => 1,
    };
    Ok(Sequence::singleton(ordering))
}

fn fn_concat(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let mut out = String::new();
    for arg in args {
        out.push_str(&arg.string_value(evaluator.forest)?);
    }
    Ok(Sequence::singleton(out))
}

fn fn_string_join(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let separator = match args.get(1) {
        Some(sequence) => sequence.string_value(evaluator.forest)?,
        None => String::new(),
    };
    Ok(Sequence::singleton(
        args[0].string_join(evaluator.forest, &separator),
    ))
}

/// 1-based character offsets; the range is clipped to the string.
fn fn_substring(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let value = string_arg(evaluator, args, 0)?;
    let start = number_arg(evaluator, args, 1)?.round();
    let length = match args.get(2) {
        Some(_) => number_arg(evaluator, args, 2)?.round(),
        None => f64::INFINITY,
    };
    if start.is_nan() || length.is_nan() {
        return Ok(Sequence::singleton(String::new()));
    }
    let chars: Vec<char> = value.chars().collect();
    let from = (start - 1.0).max(0.0) as usize;
    let until = (start - 1.0 + length).max(0.0);
    let until = if until.is_infinite() {
        chars.len()
    } else {
        (until as usize).min(chars.len())
    };
    let out: String = if from < until {
        chars[from..until].iter().collect()
    } else {
        String::new()
    };
    Ok(Sequence::singleton(out))
}

fn fn_string_length(
    evaluator: &mut Evaluator,
    context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let value = string_or_context(evaluator, context, args, 0)?;
    Ok(Sequence::singleton(value.chars().count()))
}

fn fn_normalize_space(
    evaluator: &mut Evaluator,
    context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let value = string_or_context(evaluator, context, args, 0)?;
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    Ok(Sequence::singleton(normalized))
}

fn fn_upper_case(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    Ok(Sequence::singleton(
        string_arg(evaluator, args, 0)?.to_uppercase(),
    ))
}

fn fn_lower_case(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    Ok(Sequence::singleton(
        string_arg(evaluator, args, 0)?.to_lowercase(),
    ))
}

/// Replace characters of the map string by their counterparts; map
/// characters without a counterpart delete.
fn fn_translate(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let value = string_arg(evaluator, args, 0)?;
    let map: Vec<char> = string_arg(evaluator, args, 1)?.chars().collect();
    let replacements: Vec<char> = string_arg(evaluator, args, 2)?.chars().collect();
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match map.iter().position(|&m| m == c) {
            Some(index) => {
                if let Some(&replacement) = replacements.get(index) {
                    out.push(replacement);
                }
            }
            None => out.push(c),
        }
    }
    Ok(Sequence::singleton(out))
}

fn fn_contains(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let haystack = string_arg(evaluator, args, 0)?;
    let needle = string_arg(evaluator, args, 1)?;
    Ok(Sequence::singleton(haystack.contains(&needle)))
}

fn fn_starts_with(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let haystack = string_arg(evaluator, args, 0)?;
    let needle = string_arg(evaluator, args, 1)?;
    Ok(Sequence::singleton(haystack.starts_with(&needle)))
}

fn fn_ends_with(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let haystack = string_arg(evaluator, args, 0)?;
    let needle = string_arg(evaluator, args, 1)?;
    Ok(Sequence::singleton(haystack.ends_with(&needle)))
}

fn fn_substring_before(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let haystack = string_arg(evaluator, args, 0)?;
    let needle = string_arg(evaluator, args, 1)?;
    let out = haystack
        .find(&needle)
        .map(|index| haystack[..index].to_string())
        .unwrap_or_default();
    Ok(Sequence::singleton(out))
}

fn fn_substring_after(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let haystack = string_arg(evaluator, args, 0)?;
    let needle = string_arg(evaluator, args, 1)?;
    let out = haystack
        .find(&needle)
        .map(|index| haystack[index + needle.len()..].to_string())
        .unwrap_or_default();
    Ok(Sequence::singleton(out))
}

/// Without a pattern, split on runs of whitespace; with one, split on the
/// regular expression.
fn fn_tokenize(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let value = string_arg(evaluator, args, 0)?;
    let mut result = Sequence::new();
    match args.get(1) {
        None => {
            for token in value.split_whitespace() {
                result.push(token);
            }
        }
        Some(_) => {
            let pattern = string_arg(evaluator, args, 1)?;
            let regex = compile_regex(&pattern)?;
            for token in regex.split(&value) {
                result.push(token);
            }
        }
    }
    Ok(result)
}

fn fn_matches(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let value = string_arg(evaluator, args, 0)?;
    let pattern = string_arg(evaluator, args, 1)?;
    let regex = compile_regex(&pattern)?;
    Ok(Sequence::singleton(regex.is_match(&value)))
}

fn compile_regex(pattern: &str) -> Result<regex::Regex> {
    regex::Regex::new(pattern)
        .map_err(|err| Error::type_error(format!("invalid regular expression: {}", err)))
}
