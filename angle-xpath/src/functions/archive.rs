// archive:* opt-in group, zip archives only

use std::fs::File;
use std::io::Read;

use zip::ZipArchive;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::sequence::Sequence;

use super::{string_arg, FunctionLibrary, ARCHIVE_NAMESPACE};

pub(super) fn register(library: &mut FunctionLibrary) {
    library.register(ARCHIVE_NAMESPACE, "entries", 1, Some(1), fn_entries);
    library.register(ARCHIVE_NAMESPACE, "extract-text", 2, Some(2), fn_extract_text);
}

fn open(path: &str) -> Result<ZipArchive<File>> {
    let file = File::open(path)?;
    ZipArchive::new(file).map_err(|err| Error::Io(err.to_string()))
}

fn fn_entries(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let path = string_arg(evaluator, args, 0)?;
    let archive = open(&path)?;
    let mut result = Sequence::new();
    for name in archive.file_names() {
        result.push(name);
    }
    Ok(result)
}

fn fn_extract_text(
    evaluator: &mut Evaluator,
    _context: &Context,
    args: &[Sequence],
) -> Result<Sequence> {
    let path = string_arg(evaluator, args, 0)?;
    let entry = string_arg(evaluator, args, 1)?;
    let mut archive = open(&path)?;
    let mut file = archive
        .by_name(&entry)
        .map_err(|err| Error::Io(err.to_string()))?;
    let mut content = String::new();
    file.read_to_string(&mut content)?;
    Ok(Sequence::singleton(content))
}
