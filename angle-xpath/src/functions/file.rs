// file:* opt-in group, backed by the local filesystem

use std::fs;

use crate::context::Context;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::sequence::Sequence;

use super::{string_arg, FunctionLibrary, FILE_NAMESPACE};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.register(FILE_NAMESPACE, "read", 1, Some(1), fn_read);
    library.register(FILE_NAMESPACE, "write", 2, Some(2), fn_write);
    library.register(FILE_NAMESPACE, "exists", 1, Some(1), fn_exists);
    library.register(FILE_NAMESPACE, "list", 1, Some(1), fn_list);
}

fn fn_read(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    let path = string_arg(evaluator, args, 0)?;
    let content = fs::read_to_string(&path)?;
    Ok(Sequence::singleton(content))
}

fn fn_write(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    let path = string_arg(evaluator, args, 0)?;
    let content = args[1].string_join(evaluator.forest, "");
    fs::write(&path, content)?;
    Ok(Sequence::new())
}

fn fn_exists(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let path = string_arg(evaluator, args, 0)?;
    Ok(Sequence::singleton(
        std::path::Path::new(&path).exists(),
    ))
}

fn fn_list(evaluator: &mut Evaluator, _context: &Context, args: &[Sequence]) -> Result<Sequence> {
    let path = string_arg(evaluator, args, 0)?;
    let mut names: Vec<String> = Vec::new();
    for entry in fs::read_dir(&path)? {
        let entry = entry?;
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort();
    let mut result = Sequence::new();
    for name in names {
        result.push(name);
    }
    Ok(result)
}
